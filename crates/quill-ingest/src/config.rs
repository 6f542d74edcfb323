//! Configuration for the quill-ingest job client.

use std::time::Duration;

use serde::Deserialize;

/// Polling configuration.
///
/// Loaded from the `quill.toml` `[ingest]` section or
/// `QUILL__INGEST__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Wait between two polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Polls before giving up. Never exceeded.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl IngestConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    600
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}
