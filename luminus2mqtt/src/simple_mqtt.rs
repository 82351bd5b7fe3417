use chrono::Local;
use log::{debug, warn};

use crate::models::Snapshot;
use crate::mqtt_config::MqttConfig;
use crate::mqtt_wrapper::{MqttWrapper, QoS};
use crate::sensor::SensorRecord;
use crate::sensor_collector::SensorCollector;

/// Publishes every sensor on its own plain topic, for consumers that do
/// not speak the discovery protocol.
pub struct SimpleMqtt<MQTT: MqttWrapper> {
    client: MQTT,
}

impl<MQTT: MqttWrapper> SimpleMqtt<MQTT> {
    pub fn new(config: &MqttConfig) -> Self {
        let client = MQTT::new(config, "-sm");
        Self { client }
    }

    /// Hands the wrapped client back, mainly so tests can inspect what
    /// was published.
    pub fn into_client(self) -> MQTT {
        self.client
    }
}

fn topic_segment(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for (i, c) in field.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

impl<MQTT: MqttWrapper> SensorCollector for SimpleMqtt<MQTT> {
    fn publish(&mut self, snapshot: &Snapshot, records: &[SensorRecord]) {
        let fetched_local = snapshot
            .fetched_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        debug!("publishing {} sensor(s) fetched at {fetched_local}", records.len());

        for record in records {
            let topic = format!(
                "luminus/{}/{}",
                record.device_key,
                topic_segment(record.field)
            );
            match &record.value {
                Ok(value) => {
                    if let Err(e) = self
                        .client
                        .publish(topic, QoS::AtMostOnce, true, value.to_string())
                    {
                        warn!("mqtt error: {e:?}");
                    }
                }
                Err(e) => warn!("no value for {}: {e}", record.unique_id),
            }
        }

        if let Err(e) =
            self.client
                .publish("luminus/last_update", QoS::AtMostOnce, true, fetched_local)
        {
            warn!("mqtt error: {e:?}");
        }
    }
}
