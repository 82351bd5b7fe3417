use std::collections::BTreeMap;

use log::{debug, error, warn};
use serde_json::json;

use crate::home_assistant_config::{DeviceConfig, SensorConfig};
use crate::models::Snapshot;
use crate::mqtt_config::MqttConfig;
use crate::mqtt_wrapper::{MqttWrapper, QoS};
use crate::sensor::{SensorRecord, ACCOUNT_DEVICE};
use crate::sensor_collector::SensorCollector;

/// Publishes the projected sensors via the MQTT discovery protocol: one
/// device per metering point plus one for the account statement, each
/// with retained config topics and a single JSON state topic.
pub struct HomeAssistant<MQTT: MqttWrapper> {
    client: MQTT,
}

impl<MQTT: MqttWrapper> HomeAssistant<MQTT> {
    pub fn new(config: &MqttConfig) -> Self {
        let client = MQTT::new(config, "-ha");
        Self { client }
    }

    /// Hands the wrapped client back, mainly so tests can inspect what
    /// was published.
    pub fn into_client(self) -> MQTT {
        self.client
    }

    fn publish_json(&mut self, topic: &str, payload: serde_json::Value) {
        debug!("publishing to {topic} with payload {payload}");

        if let Err(e) = self
            .client
            .publish(topic, QoS::AtMostOnce, true, payload.to_string())
        {
            error!("failed to publish message: {e:?}");
        }
    }

    fn publish_device(&mut self, device_key: &str, records: &[&SensorRecord]) {
        let config_topic = format!("homeassistant/sensor/luminus_{device_key}");
        let state_topic = format!("luminus/{device_key}/state");

        let device_name = if device_key == ACCOUNT_DEVICE {
            "My Luminus Account".to_string()
        } else {
            format!("My Luminus {device_key}")
        };
        let device = DeviceConfig::new(device_name, vec![format!("luminus_{device_key}")]);

        // configs let home assistant know what sensors exist and where to
        // find their state
        for record in records {
            let config = sensor_config(&state_topic, &device, record);
            match serde_json::to_value(&config) {
                Ok(payload) => {
                    let topic = format!("{config_topic}/{}/config", config.unique_id);
                    self.publish_json(&topic, payload);
                }
                Err(e) => error!("failed to serialize discovery config: {e}"),
            }
        }

        // one state document per device; each sensor picks its field out
        // of it via its value_template
        let mut state = json!({});
        for record in records {
            match &record.value {
                Ok(value) => state[record.field] = json!(value.to_string()),
                Err(e) => warn!("no state for {}: {e}", record.unique_id),
            }
        }
        self.publish_json(&state_topic, state);
    }
}

fn sensor_config(state_topic: &str, device: &DeviceConfig, record: &SensorRecord) -> SensorConfig {
    match record.field {
        "NextInvoiceDate" => SensorConfig::invoice_date(
            state_topic,
            device,
            &record.unique_id,
            &record.name,
            record.field,
        ),
        "OpenSlices" => SensorConfig::slice_count(
            state_topic,
            device,
            &record.unique_id,
            &record.name,
            record.field,
        ),
        // CurrentAmount, IdealAmount, MinimumAmount, MaximumAmount,
        // CurrentSettlementAmount, SubTotal, AmountOpen
        _ => SensorConfig::monetary(
            state_topic,
            device,
            &record.unique_id,
            &record.name,
            record.field,
        ),
    }
}

impl<MQTT: MqttWrapper> SensorCollector for HomeAssistant<MQTT> {
    fn publish(&mut self, _snapshot: &Snapshot, records: &[SensorRecord]) {
        let mut by_device: BTreeMap<&str, Vec<&SensorRecord>> = BTreeMap::new();
        for record in records {
            by_device
                .entry(record.device_key.as_str())
                .or_default()
                .push(record);
        }

        for (device_key, group) in by_device {
            self.publish_device(device_key, &group);
        }
    }
}
