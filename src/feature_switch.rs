//! Feature switches keyed by handler name.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSwitch {
    #[default]
    On,
    Off,
}

/// Runtime on/off table. Handlers that are not listed fall back to `default`.
///
/// Clones share the table, so a switch flipped at runtime is seen by every
/// processor holding the registry.
#[derive(Clone, Debug, Default)]
pub struct FeatureSwitchRegistry {
    switches: Arc<RwLock<HashMap<String, FeatureSwitch>>>,
    default: FeatureSwitch,
}

impl FeatureSwitchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry where unlisted handlers are off.
    pub fn default_off() -> Self {
        Self {
            default: FeatureSwitch::Off,
            ..Self::default()
        }
    }

    pub fn with(self, handler: impl Into<String>, switch: FeatureSwitch) -> Self {
        self.set(handler, switch);
        self
    }

    pub fn set(&self, handler: impl Into<String>, switch: FeatureSwitch) {
        if let Ok(mut switches) = self.switches.write() {
            switches.insert(handler.into(), switch);
        }
    }

    pub fn status(&self, handler: &str) -> FeatureSwitch {
        self.switches
            .read()
            .ok()
            .and_then(|switches| switches.get(handler).copied())
            .unwrap_or(self.default)
    }

    pub fn is_on(&self, handler: &str) -> bool {
        self.status(handler) == FeatureSwitch::On
    }
}
