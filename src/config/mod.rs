mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{LoggingSettings, RouterSettings, ServerSettings, Settings};

/// Default configuration file, resolved relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Prefix of environment overrides, e.g. `RELAYMQ_ROUTER__QUEUE_CAPACITY=4096`.
pub const ENV_PREFIX: &str = "RELAYMQ";

/// Loads the configuration from the default file and environment variables.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(DEFAULT_CONFIG_FILE)
}

/// Loads `file` (optional, any format the `config` crate recognizes), layers
/// `RELAYMQ_*` environment variables on top and fills the gaps with defaults.
pub fn load_config_from(file: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(file).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    let default = Settings::default();

    let server = partial.server;
    let router = partial.router;
    let logging = partial.logging;

    Ok(Settings {
        server: ServerSettings {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
            credential: server
                .as_ref()
                .and_then(|s| s.credential.clone())
                .or(default.server.credential),
        },
        router: RouterSettings {
            queue_capacity: router
                .as_ref()
                .and_then(|r| r.queue_capacity)
                .unwrap_or(default.router.queue_capacity)
                .max(1),
        },
        logging: LoggingSettings {
            level: logging
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.logging.level),
        },
    })
}
