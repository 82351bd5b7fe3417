use serde::Serialize;

/// Device entry in the MQTT discovery protocol; groups the per-field
/// sensors of one metering point (or of the account) together.
#[derive(Serialize, Clone)]
pub struct DeviceConfig {
    name: String,
    model: String,
    identifiers: Vec<String>,
    manufacturer: String,
    sw_version: String,
}

impl DeviceConfig {
    pub fn new(name: String, identifiers: Vec<String>) -> Self {
        Self {
            name,
            model: "My Luminus".to_string(),
            identifiers,
            manufacturer: "Luminus".to_string(),
            sw_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Discovery payload for one sensor entity. The state lives in a JSON
/// document on the shared state topic; `value_template` picks the field
/// belonging to this sensor out of it.
#[derive(Serialize)]
pub struct SensorConfig {
    pub unique_id: String,
    name: String,
    state_topic: String,
    value_template: String,
    device: DeviceConfig,
    // omit the optionals entirely when not set
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<String>,
}

impl SensorConfig {
    #[allow(clippy::too_many_arguments)]
    fn new_sensor(
        state_topic: &str,
        device_config: &DeviceConfig,
        unique_id: &str,
        name: &str,
        field: &str,
        device_class: Option<String>,
        unit_of_measurement: Option<String>,
        icon: Option<String>,
    ) -> Self {
        SensorConfig {
            unique_id: unique_id.to_string(),
            name: name.to_string(),
            state_topic: state_topic.to_string(),
            value_template: format!("{{{{ value_json.{field} }}}}"),
            device: device_config.clone(),
            unit_of_measurement,
            device_class,
            icon,
        }
    }

    /// Billed amounts; monetary sensors carry their currency as the unit.
    pub fn monetary(
        state_topic: &str,
        device_config: &DeviceConfig,
        unique_id: &str,
        name: &str,
        field: &str,
    ) -> Self {
        Self::new_sensor(
            state_topic,
            device_config,
            unique_id,
            name,
            field,
            Some("monetary".to_string()),
            Some("EUR".to_string()),
            Some("mdi:cash-100".to_string()),
        )
    }

    /// Invoice dates, published as the raw date string.
    pub fn invoice_date(
        state_topic: &str,
        device_config: &DeviceConfig,
        unique_id: &str,
        name: &str,
        field: &str,
    ) -> Self {
        Self::new_sensor(
            state_topic,
            device_config,
            unique_id,
            name,
            field,
            None,
            None,
            Some("mdi:receipt-text".to_string()),
        )
    }

    /// Remaining budget slices.
    pub fn slice_count(
        state_topic: &str,
        device_config: &DeviceConfig,
        unique_id: &str,
        name: &str,
        field: &str,
    ) -> Self {
        Self::new_sensor(
            state_topic,
            device_config,
            unique_id,
            name,
            field,
            None,
            None,
            Some("mdi:circle-slice-6".to_string()),
        )
    }
}
