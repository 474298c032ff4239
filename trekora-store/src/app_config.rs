use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Postgres connection string; empty or absent selects the in-memory
    /// store.
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Operational knobs for the financial engine.
#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Cancellations inside this many days of departure are refused.
    #[serde(default = "default_buffer_days")]
    pub cancellation_buffer_days: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Whether to load demo catalog data into an empty store at startup.
    #[serde(default)]
    pub seed_demo_data: bool,
}

fn default_buffer_days() -> i64 {
    1
}

fn default_currency() -> String {
    "INR".to_string()
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of TREKORA)
            // Eg.. `TREKORA_SERVER__PORT=9000` would set the server port
            .add_source(config::Environment::with_prefix("TREKORA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
