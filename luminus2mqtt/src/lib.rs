// externally visible interfaces
pub mod api;
pub mod coordinator;
pub mod home_assistant;
pub mod models;
pub mod mqtt_config;
pub mod mqtt_wrapper;
pub mod registry;
pub mod sensor;
pub mod sensor_collector;
pub mod simple_mqtt;

// internal interfaces
mod home_assistant_config;
