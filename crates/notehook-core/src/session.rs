//! Session lifecycle: prepare, reload, release
//!
//! A [`HookSession`] ties the pieces together for one host instance. Each
//! `prepare` builds a fresh relay queue, spawns a dispatch worker on the
//! consumer end and hands the producer end to the host inside a
//! [`HookProcessor`]. The mapping cell, sample rate and counters live for the
//! whole session and are shared with every processor it creates.
//!
//! ```text
//!            prepare()                      release()
//! (stopped) ──────────► worker running ────────────► (stopped)
//!                │                              ▲
//!                └────── prepare() again ───────┘  (releases first)
//! ```

use crate::config::{load_from_dir, ConfigReport, HookSettings, LoadedConfig, ReloadPolicy};
use crate::invoke::{HandlerInvoker, ProcessInvoker};
use crate::mapping::MappingCell;
use crate::processor::{HookProcessor, SampleRate};
use crate::relay::RelayQueue;
use crate::state::PluginState;
use crate::stats::DispatchStats;
use crate::status::StatusReport;
use crate::worker::{DispatchWorker, WorkerHandle, WorkerState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors from session lifecycle operations
#[derive(Error, Debug)]
pub enum HookError {
    /// The dispatch worker thread could not be started
    #[error("Failed to spawn dispatch worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

pub struct HookSession {
    config_dir: PathBuf,
    settings: HookSettings,
    state: PluginState,
    mapping: Arc<MappingCell>,
    sample_rate: Arc<SampleRate>,
    stats: Arc<DispatchStats>,
    /// Last configuration load, `None` until the first one
    loaded: Option<LoadedConfig>,
    worker: Option<WorkerHandle>,
}

impl HookSession {
    pub fn new(config_dir: impl Into<PathBuf>, settings: HookSettings, state: PluginState) -> Self {
        Self {
            config_dir: config_dir.into(),
            settings,
            state,
            mapping: Arc::new(MappingCell::default()),
            sample_rate: Arc::new(SampleRate::default()),
            stats: Arc::new(DispatchStats::new()),
            loaded: None,
            worker: None,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn settings(&self) -> &HookSettings {
        &self.settings
    }

    pub fn state(&self) -> &PluginState {
        &self.state
    }

    /// Change the handler executable; takes effect on the next prepare
    pub fn set_executable(&mut self, executable: impl Into<String>) {
        self.state.executable = executable.into();
    }

    /// Shared sample rate, for hosts that get rate-change notifications
    pub fn sample_rate(&self) -> Arc<SampleRate> {
        self.sample_rate.clone()
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        self.stats.clone()
    }

    /// Start dispatching with the default process invoker
    pub fn prepare(&mut self, sample_rate: f64) -> Result<HookProcessor, HookError> {
        let invoker = ProcessInvoker::new(&self.state.executable, self.settings.timeout_policy);
        self.prepare_with(sample_rate, invoker)
    }

    /// Start dispatching with a custom invoker
    ///
    /// Any previous run is released first. Jobs still queued from it are
    /// discarded along with its queue.
    pub fn prepare_with<I: HandlerInvoker>(
        &mut self,
        sample_rate: f64,
        invoker: I,
    ) -> Result<HookProcessor, HookError> {
        self.release();

        let needs_load = match self.settings.reload_policy {
            ReloadPolicy::EveryPrepare => true,
            ReloadPolicy::Once => self.loaded.is_none(),
        };
        if needs_load {
            self.reload();
        }

        self.sample_rate.set(sample_rate);

        let (producer, consumer) = RelayQueue::with_capacity(self.settings.queue_capacity);
        let handle = DispatchWorker::spawn(
            consumer,
            invoker,
            self.settings.worker_config(),
            self.stats.clone(),
        )
        .map_err(HookError::WorkerSpawn)?;
        self.worker = Some(handle);

        log::info!(
            "Prepared at {} Hz, queue capacity {}, executable {:?}",
            sample_rate,
            producer.capacity(),
            self.state.executable
        );

        Ok(HookProcessor::new(
            producer,
            self.mapping.clone(),
            self.sample_rate.clone(),
            self.stats.clone(),
        ))
    }

    /// Re-read `event.conf` and publish a new mapping snapshot
    ///
    /// Safe to call while a processor is running; it picks up the new
    /// snapshot on its next cycle.
    pub fn reload(&mut self) -> &ConfigReport {
        let loaded = load_from_dir(&self.config_dir);
        for warning in &loaded.report.warnings {
            log::warn!("{}", warning);
        }

        self.mapping.publish(loaded.note_map());
        &self.loaded.insert(loaded).report
    }

    /// Stop the worker; pending jobs are discarded
    pub fn release(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            let stopped = worker.stop(self.settings.stop_timeout());
            log::info!(
                "Released dispatch worker{}",
                if stopped { "" } else { " (detached)" }
            );
        }
    }

    pub fn is_prepared(&self) -> bool {
        self.worker.is_some()
    }

    pub fn status(&self) -> StatusReport {
        let warnings = self
            .loaded
            .as_ref()
            .map(|loaded| loaded.report.warnings.clone())
            .unwrap_or_default();
        let worker = self
            .worker
            .as_ref()
            .map(WorkerHandle::state)
            .unwrap_or(WorkerState::Stopped);

        StatusReport::new(
            self.config_dir.clone(),
            warnings,
            self.mapping.load_full().len(),
            worker,
            self.stats.snapshot(),
        )
    }
}

impl Drop for HookSession {
    fn drop(&mut self) {
        self.release();
    }
}
