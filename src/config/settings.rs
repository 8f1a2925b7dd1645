use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the server, the router and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub router: RouterSettings,
    pub logging: LoggingSettings,
}

/// Configuration settings for the server.
///
/// Defines the address the server binds to and the shared credential clients
/// must present. Without a credential every client is accepted.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub credential: Option<String>,
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration settings for the router.
#[derive(Debug, Deserialize, Clone)]
pub struct RouterSettings {
    /// Number of messages the dispatch queue holds before `publish` waits.
    pub queue_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled from defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub router: Option<PartialRouterSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub credential: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialRouterSettings {
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                credential: None,
            },
            router: RouterSettings {
                queue_capacity: 1024,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}
