mod config;
mod logging;
mod rumqttc_wrapper;

use std::sync::Arc;

use config::Config;
use log::{error, info, warn};
use luminus2mqtt::api::ApiClient;
use luminus2mqtt::coordinator::UPDATE_INTERVAL;
use luminus2mqtt::home_assistant::HomeAssistant;
use luminus2mqtt::models::Snapshot;
use luminus2mqtt::registry::{self, CoordinatorRegistry, CredentialsError};
use luminus2mqtt::sensor;
use luminus2mqtt::sensor_collector::SensorCollector;
use luminus2mqtt::simple_mqtt::SimpleMqtt;
use rumqttc_wrapper::RumqttcWrapper;

#[tokio::main]
async fn main() {
    logging::init_logger();
    info!("Running revision: {}", env!("GIT_HASH"));
    if std::env::args().len() > 1 {
        error!("Arguments passed. Tool is configured by config.toml in its path");
    }

    let config = Config::load();
    if !config.is_valid() {
        error!("config is invalid: username, password and at least one MQTT output are required");
        std::process::exit(1);
    }

    let client = match ApiClient::new(&config.username, &config.password) {
        Ok(client) => client,
        Err(e) => {
            error!("could not construct API client: {e}");
            std::process::exit(1);
        }
    };

    // reject bad credentials before opening any broker connection
    let token = match registry::validate_credentials(&client).await {
        Ok(token) => token,
        Err(e @ CredentialsError::InvalidAuth(_)) => {
            error!("{e}; check username/password in config.toml");
            std::process::exit(1);
        }
        Err(e) => {
            error!("credential check failed: {e}");
            std::process::exit(1);
        }
    };
    info!("credentials accepted for {}", config.username);

    // purely informational: log what the account has to offer
    match client.get_contracts(&token.access_token).await {
        Ok(contracts) => {
            for contract in &contracts.contracts {
                info!(
                    "contract {} ({} {})",
                    contract.ean,
                    contract.energy_type.as_deref().unwrap_or("?"),
                    contract.product.as_deref().unwrap_or("?"),
                );
            }
        }
        Err(e) => warn!("could not list contracts: {e}"),
    }
    match client.get_meters(&token.access_token).await {
        Ok(meters) => info!("{} meter(s) on this account", meters.meters.len()),
        Err(e) => warn!("could not list meters: {e}"),
    }

    let mut collectors: Vec<Box<dyn SensorCollector>> = Vec::new();
    if let Some(mqtt) = &config.home_assistant {
        info!("Publishing to Home Assistant");
        collectors.push(Box::new(HomeAssistant::<RumqttcWrapper>::new(mqtt)));
    }
    if let Some(mqtt) = &config.simple_mqtt {
        info!("Publishing to simple MQTT broker");
        collectors.push(Box::new(SimpleMqtt::<RumqttcWrapper>::new(mqtt)));
    }

    let mut registry = CoordinatorRegistry::new();
    let snapshot = match registry.setup(&config.username, client).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("initial refresh failed: {e}");
            std::process::exit(1);
        }
    };
    publish(&mut collectors, &snapshot);

    let mut interval = tokio::time::interval(UPDATE_INTERVAL);
    // the first tick fires immediately and that cycle already ran
    interval.tick().await;

    loop {
        interval.tick().await;
        let coordinator = registry
            .coordinator_mut(&config.username)
            .expect("account was set up above");
        match coordinator.refresh().await {
            Ok(snapshot) => publish(&mut collectors, &snapshot),
            Err(e) if e.needs_reauth() => {
                error!("{e}; update the credentials in config.toml and restart");
                std::process::exit(1);
            }
            Err(e) => warn!("refresh failed, keeping previous data until next cycle: {e}"),
        }
    }
}

fn publish(collectors: &mut [Box<dyn SensorCollector>], snapshot: &Arc<Snapshot>) {
    let records = sensor::project(snapshot);
    info!("publishing {} sensor(s)", records.len());
    collectors
        .iter_mut()
        .for_each(|collector| collector.publish(snapshot, &records));
}
