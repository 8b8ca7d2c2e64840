//! The `config` module handles the application's configuration management.
//!
//! It defines the structure of the application settings, provides default
//! values, and implements the logic for loading configuration from files and
//! environment variables using the `config` crate.

pub mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::Settings;

pub use settings::ServerSettings;

/// Loads application settings from file, environment, and defaults.
///
/// Configuration values are read from:
/// 1. An optional `config/default` file (TOML/YAML/JSON).
/// 2. Environment variables with `_` separators (e.g., `SERVER_PORT`).
/// 3. A bare `PORT` environment variable, which overrides the listen port.
///
/// Missing fields are filled from `Settings::default()` (`0.0.0.0:9090`).
///
/// # Errors
///
/// Returns an error if the config file cannot be parsed or deserialized.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::default().separator("_"));

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();

    let mut settings = Settings {
        server: ServerSettings {
            host: partial
                .server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: partial
                .server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
        },
    };

    if let Ok(port) = std::env::var("PORT") {
        settings.server.port = port
            .parse()
            .map_err(|_| ConfigError::Message(format!("invalid PORT value: {port}")))?;
    }

    Ok(settings)
}
