//! Settings for the pump, the sweeper and the outbox, loaded from YAML files
//! and the environment.

use serde::Deserialize;
use thiserror::Error;

use crate::outbox::{OutboxLimits, SweeperConfig};
use crate::pump::{DispatcherConfig, Subscription};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "courier.yaml";
/// Environment variable naming an extra configuration file.
pub const CONFIG_ENV_VAR: &str = "COURIER_CONFIG";
/// Prefix for configuration environment variables, e.g.
/// `COURIER_SWEEPER__BATCH_SIZE=50`.
pub const CONFIG_ENV_PREFIX: &str = "COURIER";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub subscriptions: Vec<Subscription>,
    pub sweeper: SweeperConfig,
    pub outbox: OutboxLimits,
    pub dispatcher: DispatcherConfig,
}

impl Settings {
    /// Load settings. Later sources override earlier ones:
    /// 1. `courier.yaml` in the current directory, if present
    /// 2. the file at `path`, if given
    /// 3. the file named by `COURIER_CONFIG`, if set
    /// 4. `COURIER_*` environment variables, `__` separating nested keys
    pub fn load(path: Option<&str>) -> Result<Self, SettingsError> {
        use ::config::{Config, Environment, File, FileFormat};

        let mut builder =
            Config::builder().add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));
        if let Some(path) = path {
            builder = builder.add_source(File::new(path, FileFormat::Yaml).required(true));
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&path, FileFormat::Yaml).required(true));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Names must be unique and every subscription needs a channel and at
    /// least one performer.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (index, subscription) in self.subscriptions.iter().enumerate() {
            if subscription.name.is_empty() || subscription.channel_name.is_empty() {
                return Err(SettingsError::Invalid(format!(
                    "subscription #{index} needs a name and a channel_name"
                )));
            }
            if subscription.no_of_performers == 0 {
                return Err(SettingsError::Invalid(format!(
                    "subscription {} has no performers",
                    subscription.name
                )));
            }
            if self.subscriptions[..index]
                .iter()
                .any(|other| other.name == subscription.name)
            {
                return Err(SettingsError::Invalid(format!(
                    "subscription {} is declared twice",
                    subscription.name
                )));
            }
        }
        Ok(())
    }
}
