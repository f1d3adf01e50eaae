//! Tuning settings (`settings.yaml`)

use crate::invoke::TimeoutPolicy;
use crate::relay::DEFAULT_RELAY_CAPACITY;
use crate::worker::WorkerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When the mapping snapshot is rebuilt from disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadPolicy {
    /// Only on the first prepare of a session (and on explicit reload)
    Once,
    /// On every prepare
    #[default]
    EveryPrepare,
}

/// Queue and worker settings
///
/// Every field has a default, so a partial file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookSettings {
    /// Relay queue capacity (rounded up to a power of two)
    pub queue_capacity: usize,
    /// Jobs taken per worker batch
    pub batch_size: usize,
    /// Worker sleep when the queue is empty
    pub idle_sleep_ms: u64,
    /// Maximum wait for one handler
    pub handler_timeout_ms: u64,
    /// Maximum wait for the worker thread on release
    pub stop_timeout_ms: u64,
    pub timeout_policy: TimeoutPolicy,
    pub reload_policy: ReloadPolicy,
}

impl Default for HookSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_RELAY_CAPACITY,
            batch_size: 32,
            idle_sleep_ms: 2,
            handler_timeout_ms: 2000,
            stop_timeout_ms: 1500,
            timeout_policy: TimeoutPolicy::Kill,
            reload_policy: ReloadPolicy::EveryPrepare,
        }
    }
}

impl HookSettings {
    /// Worker parameters derived from these settings
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            batch_size: self.batch_size.max(1),
            idle_sleep: Duration::from_millis(self.idle_sleep_ms),
            handler_timeout: Duration::from_millis(self.handler_timeout_ms),
        }
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}
