use serde::Deserialize;
use std::time::Duration;

/// Tunables for the signer session.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Delay before a declined or successful request is purged.
    #[serde(default = "default_short_grace_ms")]
    pub short_grace_ms: u64,
    /// Delay before a failed request is purged.
    #[serde(default = "default_error_grace_ms")]
    pub error_grace_ms: u64,
    /// Capacity of the broadcast channel feeding observers.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl SessionConfig {
    pub fn short_grace(&self) -> Duration {
        Duration::from_millis(self.short_grace_ms)
    }

    pub fn error_grace(&self) -> Duration {
        Duration::from_millis(self.error_grace_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            short_grace_ms: default_short_grace_ms(),
            error_grace_ms: default_error_grace_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_short_grace_ms() -> u64 {
    1_800
}

fn default_error_grace_ms() -> u64 {
    3_300
}

fn default_event_capacity() -> usize {
    256
}
