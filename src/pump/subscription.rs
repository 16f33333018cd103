use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What a channel factory does when the queue behind a subscription is
/// missing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingInfrastructure {
    /// Declare it.
    #[default]
    Create,
    /// Fail with [`ChannelError::MissingInfrastructure`](crate::channel::ChannelError::MissingInfrastructure).
    Validate,
    /// Do not check. The first receive fails if it is really missing.
    Assume,
}

/// Static description of one consumption line.
///
/// Loaded from configuration at startup and never changed afterwards.
/// Durations are stored in milliseconds so the struct maps one to one onto
/// the config file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subscription {
    pub name: String,
    pub channel_name: String,
    pub routing_key: String,
    pub timeout_ms: u64,
    pub no_of_performers: usize,
    /// Failed handling attempts after which a deferred message is rejected.
    pub requeue_count: u32,
    pub requeue_delay_ms: u64,
    pub make_channels: MissingInfrastructure,
    /// Unacceptable messages a performer tolerates before it stops. 0 means
    /// no limit.
    pub unacceptable_message_limit: u32,
    pub empty_channel_delay_ms: u64,
    pub channel_failure_delay_ms: u64,
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            name: String::new(),
            channel_name: String::new(),
            routing_key: String::new(),
            timeout_ms: 300,
            no_of_performers: 1,
            requeue_count: 3,
            requeue_delay_ms: 0,
            make_channels: MissingInfrastructure::Create,
            unacceptable_message_limit: 0,
            empty_channel_delay_ms: 50,
            channel_failure_delay_ms: 1000,
        }
    }
}

impl Subscription {
    pub fn new(
        name: impl Into<String>,
        channel_name: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            channel_name: channel_name.into(),
            routing_key: routing_key.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = millis(timeout);
        self
    }

    /// Performers on one subscription share no ordering. Use one performer
    /// when messages must be handled in order.
    pub fn with_performers(mut self, count: usize) -> Self {
        self.no_of_performers = count;
        self
    }

    pub fn with_requeue_count(mut self, count: u32) -> Self {
        self.requeue_count = count;
        self
    }

    pub fn with_requeue_delay(mut self, delay: Duration) -> Self {
        self.requeue_delay_ms = millis(delay);
        self
    }

    pub fn with_make_channels(mut self, policy: MissingInfrastructure) -> Self {
        self.make_channels = policy;
        self
    }

    pub fn with_unacceptable_message_limit(mut self, limit: u32) -> Self {
        self.unacceptable_message_limit = limit;
        self
    }

    pub fn with_empty_channel_delay(mut self, delay: Duration) -> Self {
        self.empty_channel_delay_ms = millis(delay);
        self
    }

    pub fn with_channel_failure_delay(mut self, delay: Duration) -> Self {
        self.channel_failure_delay_ms = millis(delay);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn requeue_delay(&self) -> Duration {
        Duration::from_millis(self.requeue_delay_ms)
    }

    pub fn empty_channel_delay(&self) -> Duration {
        Duration::from_millis(self.empty_channel_delay_ms)
    }

    pub fn channel_failure_delay(&self) -> Duration {
        Duration::from_millis(self.channel_failure_delay_ms)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
