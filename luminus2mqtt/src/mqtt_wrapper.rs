use crate::mqtt_config::MqttConfig;

#[derive(Clone, Copy)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Decouples the publishers from a concrete MQTT client. Calling code
/// wraps its client of choice in a newtype implementing this trait; tests
/// substitute an in-memory fake.
pub trait MqttWrapper {
    fn subscribe(&mut self, topic: &str, qos: QoS) -> anyhow::Result<()>;

    fn publish<S, V>(&mut self, topic: S, qos: QoS, retain: bool, payload: V) -> anyhow::Result<()>
    where
        S: Clone + Into<String>,
        V: Clone + Into<Vec<u8>>;

    /// `suffix` keeps client ids distinct when one process opens several
    /// connections to the same broker.
    fn new(config: &MqttConfig, suffix: &str) -> Self;
}
