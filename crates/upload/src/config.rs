use std::time::Duration;

use cloudmux_protocol::HashAlgorithm;
use cloudmux_protocol::constants::DEFAULT_POLL_INTERVAL;
use cloudmux_transfer::EmptyFile;
use serde::{Deserialize, Serialize};

/// Fewest chunk workers used when concurrency is derived automatically.
pub const MIN_AUTO_CONCURRENCY: usize = 4;

/// Most chunk workers used when concurrency is derived automatically.
pub const MAX_AUTO_CONCURRENCY: usize = 16;

/// Tunables for one upload engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Chunk workers. `None` derives a value from available parallelism.
    pub concurrency: Option<usize>,
    pub poll_interval_ms: u64,
    /// `None` polls until the remote answers or the caller cancels.
    pub max_poll_attempts: Option<u32>,
    /// Which negotiated endpoint chunks go to.
    pub endpoint_index: usize,
    pub empty_file: EmptyFile,
    /// Overrides the digest the remote declares.
    pub hash_algorithm: Option<HashAlgorithm>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            max_poll_attempts: None,
            endpoint_index: 0,
            empty_file: EmptyFile::default(),
            hash_algorithm: None,
        }
    }
}

impl EngineConfig {
    /// Worker count actually used; an explicit 0 is treated as 1.
    pub fn effective_concurrency(&self) -> usize {
        match self.concurrency {
            Some(n) => n.max(1),
            None => auto_concurrency(num_cpus::get()),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Two workers per CPU, kept within
/// [`MIN_AUTO_CONCURRENCY`]..=[`MAX_AUTO_CONCURRENCY`].
pub fn auto_concurrency(cpus: usize) -> usize {
    cpus.saturating_mul(2)
        .clamp(MIN_AUTO_CONCURRENCY, MAX_AUTO_CONCURRENCY)
}
