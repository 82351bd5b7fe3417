use std::{env, fs};

use log::warn;
use luminus2mqtt::mqtt_config::MqttConfig;
use serde_derive::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    pub username: String,
    pub password: String,
    pub home_assistant: Option<MqttConfig>,
    pub simple_mqtt: Option<MqttConfig>,
}

impl Config {
    pub fn is_valid(&self) -> bool {
        !self.username.is_empty()
            && !self.password.is_empty()
            && (self.home_assistant.as_ref().is_some_and(|x| x.is_valid())
                || self.simple_mqtt.as_ref().is_some_and(|x| x.is_valid()))
    }

    pub fn load() -> Config {
        // parse config from TOML file if present
        let filename = "config.toml";
        let contents = match fs::read_to_string(filename) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Could not read config.toml: {e}");
                "".into()
            }
        };
        let mut config = match toml::from_str::<Config>(&contents) {
            Ok(config) => config,
            Err(e) => {
                warn!("toml config unparsable: {e}");
                Config::default()
            }
        };

        // overwrite config if environment variables are set
        // $LUMINUS_USERNAME / $LUMINUS_PASSWORD
        if let Ok(username) = env::var("LUMINUS_USERNAME") {
            config.username = username;
        }
        if let Ok(password) = env::var("LUMINUS_PASSWORD") {
            config.password = password;
        }
        // $MQTT_BROKER_HOST
        let mut mqtt_config_overwritten = false;
        if let Ok(host) = env::var("MQTT_BROKER_HOST") {
            config
                .home_assistant
                .get_or_insert(MqttConfig::default())
                .host = host;
            mqtt_config_overwritten = true;
        }
        // $MQTT_USERNAME (optional)
        if let Ok(username) = env::var("MQTT_USERNAME") {
            config
                .home_assistant
                .get_or_insert(MqttConfig::default())
                .username = Some(username);
            mqtt_config_overwritten = true;
        }
        // $MQTT_PASSWORD (optional)
        if let Ok(password) = env::var("MQTT_PASSWORD") {
            config
                .home_assistant
                .get_or_insert(MqttConfig::default())
                .password = Some(password);
            mqtt_config_overwritten = true;
        }
        // $MQTT_PORT (optional)
        if let Ok(port) = env::var("MQTT_PORT") {
            config
                .home_assistant
                .get_or_insert(MqttConfig::default())
                .port = Some(port.parse().unwrap_or(1883));
            mqtt_config_overwritten = true;
        }
        // env-only deployments publish on both channels
        if mqtt_config_overwritten {
            config.simple_mqtt = config.home_assistant.clone();
        }
        config
    }
}
