use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// This struct aggregates the configuration parameters required to run the
/// topicast server. Buffer capacities and timeouts are compile-time
/// constants documented where they are defined; the configuration surface is
/// deliberately limited to network settings.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Configuration specific to the listening socket.
    pub server: ServerSettings,
}

/// Configuration settings for the server.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    /// The host address (e.g., "127.0.0.1" or "0.0.0.0") the server will bind to.
    pub host: String,
    /// The port number the server will listen on.
    pub port: u16,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled from
/// defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
}

/// Partial server settings.
#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 9090,
            },
        }
    }
}
