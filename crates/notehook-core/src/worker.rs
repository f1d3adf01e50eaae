//! Dispatch worker: drains the relay queue and runs handlers
//!
//! A single dedicated thread polls the relay queue in batches. Handlers run
//! one at a time with a bounded wait, so a hung handler only delays the jobs
//! queued behind it, never the real-time thread.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──batch──► Draining ──empty──► Idle ── ... ──stop──► Stopping ──► Stopped
//! ```

use crate::invoke::{HandlerInvoker, Invocation};
use crate::job::JobDescriptor;
use crate::relay::RelayConsumer;
use crate::stats::DispatchStats;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Worker tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Maximum jobs taken from the queue per iteration
    pub batch_size: usize,
    /// Sleep between polls when the queue is empty
    pub idle_sleep: Duration,
    /// Maximum wait for a single handler
    pub handler_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            idle_sleep: Duration::from_millis(2),
            handler_timeout: Duration::from_secs(2),
        }
    }
}

/// Observable worker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Idle = 0,
    Draining = 1,
    Stopping = 2,
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Draining,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Draining => "draining",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Worker state shared with the handle
struct WorkerShared {
    state: AtomicU8,
}

impl WorkerShared {
    fn set(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }
}

/// Dispatch worker thread entry point
pub struct DispatchWorker<I> {
    consumer: RelayConsumer<JobDescriptor>,
    invoker: I,
    config: WorkerConfig,
    stats: Arc<DispatchStats>,
    shared: Arc<WorkerShared>,
    stop_rx: Receiver<()>,
    /// Set once a stop request has been observed
    stopping: bool,
}

impl<I: HandlerInvoker> DispatchWorker<I> {
    /// Spawn the worker on its own thread
    ///
    /// The worker owns the consumer end of the relay queue for its whole
    /// life; no other consumer can exist.
    pub fn spawn(
        consumer: RelayConsumer<JobDescriptor>,
        invoker: I,
        config: WorkerConfig,
        stats: Arc<DispatchStats>,
    ) -> std::io::Result<WorkerHandle> {
        let (stop_tx, stop_rx) = channel::bounded(1);
        let shared = Arc::new(WorkerShared {
            state: AtomicU8::new(WorkerState::Idle as u8),
        });

        let worker = Self {
            consumer,
            invoker,
            config,
            stats,
            shared: shared.clone(),
            stop_rx,
            stopping: false,
        };

        let thread = thread::Builder::new()
            .name("notehook-dispatch".into())
            .spawn(move || worker.run())?;

        Ok(WorkerHandle {
            stop_tx: Some(stop_tx),
            shared,
            thread: Some(thread),
        })
    }

    fn run(mut self) {
        log::info!(
            "Dispatch worker started (batch {}, idle {:?}, timeout {:?})",
            self.config.batch_size,
            self.config.idle_sleep,
            self.config.handler_timeout
        );

        while !self.stopping && !self.stop_requested() {
            if self.drain_batch() > 0 {
                continue;
            }

            self.shared.set(WorkerState::Idle);
            // Bounded idle wait; a stop request wakes us early
            match self.stop_rx.recv_timeout(self.config.idle_sleep) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.shared.set(WorkerState::Stopping);
        let pending = self.consumer.len();
        if pending > 0 {
            log::info!("Dispatch worker discarding {} pending job(s)", pending);
        }
        self.shared.set(WorkerState::Stopped);
        log::info!("Dispatch worker stopped");
    }

    /// Run one batch; returns the number of jobs taken from the queue
    fn drain_batch(&mut self) -> usize {
        let batch_size = self.config.batch_size.max(1);
        let timeout = self.config.handler_timeout;
        let mut handled = 0;

        for job in self.consumer.dequeue_batch(batch_size) {
            if handled == 0 {
                self.shared.set(WorkerState::Draining);
            }
            handled += 1;
            execute(&mut self.invoker, &job, timeout, &self.stats);

            // Stop abandons the rest of the batch
            if !matches!(self.stop_rx.try_recv(), Err(TryRecvError::Empty)) {
                self.stopping = true;
                break;
            }
        }

        handled
    }

    fn stop_requested(&self) -> bool {
        !matches!(self.stop_rx.try_recv(), Err(TryRecvError::Empty))
    }
}

/// Run a single job with the given invoker
fn execute<I: HandlerInvoker>(
    invoker: &mut I,
    job: &JobDescriptor,
    timeout: Duration,
    stats: &DispatchStats,
) {
    // The file may have been removed since the config was loaded
    if !job.handler.is_file() {
        log::debug!("Handler {:?} vanished, skipping note {}", job.handler, job.note);
        stats.record_skipped();
        return;
    }

    let start = Instant::now();
    match invoker.invoke(job, timeout) {
        Ok(Invocation::Completed { code }) => {
            log::debug!(
                "Handler {:?} (note {}) finished with {:?} in {:?}",
                job.handler,
                job.note,
                code,
                start.elapsed()
            );
            stats.record_executed();
        }
        Ok(Invocation::TimedOut) => {
            log::warn!(
                "Handler {:?} (note {}) exceeded {:?}, abandoned",
                job.handler,
                job.note,
                timeout
            );
            stats.record_timed_out();
        }
        Err(e) => {
            log::warn!("Handler for note {} failed: {}", job.note, e);
            stats.record_failed();
        }
    }
}

/// Owner handle for a running dispatch worker
///
/// Dropping the handle stops the worker.
pub struct WorkerHandle {
    stop_tx: Option<Sender<()>>,
    shared: Arc<WorkerShared>,
    thread: Option<JoinHandle<()>>,
}

/// Default time to wait for the worker to exit on stop
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_millis(1500);

impl WorkerHandle {
    pub fn state(&self) -> WorkerState {
        self.shared.get()
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal the worker and wait up to `join_timeout` for it to exit
    ///
    /// Returns `true` if the thread exited in time. A worker still blocked in
    /// a handler after the timeout is detached; it exits on its own once the
    /// handler's own timeout expires.
    pub fn stop(&mut self, join_timeout: Duration) -> bool {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.try_send(());
        }

        let Some(thread) = self.thread.take() else {
            return true;
        };

        let deadline = Instant::now() + join_timeout;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                log::warn!(
                    "Dispatch worker did not stop within {:?}, detaching",
                    join_timeout
                );
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }

        if thread.join().is_err() {
            log::error!("Dispatch worker panicked");
        }
        true
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop(DEFAULT_STOP_TIMEOUT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::InvokeError;
    use crate::relay::{RelayProducer, RelayQueue};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Records every invoked job; optionally sleeps or fails
    #[derive(Clone, Default)]
    struct RecordingInvoker {
        calls: Arc<Mutex<Vec<(u8, Instant)>>>,
        delay: Option<Duration>,
        fail: bool,
    }

    impl HandlerInvoker for RecordingInvoker {
        fn invoke(
            &mut self,
            job: &JobDescriptor,
            timeout: Duration,
        ) -> Result<Invocation, InvokeError> {
            self.calls.lock().unwrap().push((job.note, Instant::now()));
            if self.fail {
                return Err(InvokeError::Wait(std::io::Error::other("boom")));
            }
            match self.delay {
                Some(delay) if delay >= timeout => {
                    thread::sleep(timeout);
                    Ok(Invocation::TimedOut)
                }
                Some(delay) => {
                    thread::sleep(delay);
                    Ok(Invocation::Completed { code: Some(0) })
                }
                None => Ok(Invocation::Completed { code: Some(0) }),
            }
        }
    }

    fn existing_handler() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handler.py");
        std::fs::write(&path, "print('hi')").unwrap();
        (dir, path)
    }

    fn job(handler: &Path, note: u8) -> JobDescriptor {
        JobDescriptor {
            handler: Arc::from(handler),
            note,
            velocity: 100,
            channel: 1,
            timestamp_seconds: 0.0,
        }
    }

    fn fast_config() -> WorkerConfig {
        WorkerConfig {
            batch_size: 32,
            idle_sleep: Duration::from_millis(1),
            handler_timeout: Duration::from_millis(300),
        }
    }

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn spawn(
        invoker: RecordingInvoker,
        config: WorkerConfig,
    ) -> (RelayProducer<JobDescriptor>, WorkerHandle, Arc<DispatchStats>) {
        init_logging();
        let (tx, rx) = RelayQueue::with_capacity(64);
        let stats = Arc::new(DispatchStats::new());
        let handle = DispatchWorker::spawn(rx, invoker, config, stats.clone()).unwrap();
        (tx, handle, stats)
    }

    #[test]
    fn test_runs_jobs_in_enqueue_order() {
        let (_dir, handler) = existing_handler();
        let invoker = RecordingInvoker::default();
        let calls = invoker.calls.clone();
        let (mut tx, mut handle, stats) = spawn(invoker, fast_config());

        for note in [60, 61, 62, 63] {
            tx.try_enqueue(job(&handler, note)).unwrap();
        }

        assert!(wait_until(Duration::from_secs(5), || stats.snapshot().executed == 4));
        let notes: Vec<u8> = calls.lock().unwrap().iter().map(|(n, _)| *n).collect();
        assert_eq!(notes, vec![60, 61, 62, 63]);

        assert!(handle.stop(Duration::from_secs(2)));
        assert_eq!(handle.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_missing_handler_skipped_without_invoking() {
        let (_dir, handler) = existing_handler();
        let invoker = RecordingInvoker::default();
        let calls = invoker.calls.clone();
        let (mut tx, _handle, stats) = spawn(invoker, fast_config());

        tx.try_enqueue(job(Path::new("/nonexistent/gone.py"), 40)).unwrap();
        tx.try_enqueue(job(&handler, 41)).unwrap();

        assert!(wait_until(Duration::from_secs(5), || stats.snapshot().handled() == 2));
        let snap = stats.snapshot();
        assert_eq!(snap.skipped, 1);
        assert_eq!(snap.executed, 1);
        let notes: Vec<u8> = calls.lock().unwrap().iter().map(|(n, _)| *n).collect();
        assert_eq!(notes, vec![41]);
    }

    #[test]
    fn test_failures_do_not_stop_the_worker() {
        let (_dir, handler) = existing_handler();
        let invoker = RecordingInvoker {
            fail: true,
            ..Default::default()
        };
        let (mut tx, handle, stats) = spawn(invoker, fast_config());

        for note in 0..5 {
            tx.try_enqueue(job(&handler, note)).unwrap();
        }

        assert!(wait_until(Duration::from_secs(5), || stats.snapshot().failed == 5));
        assert!(handle.is_running());
    }

    #[test]
    fn test_hung_handler_stall_bounded_by_timeout() {
        let (_dir, handler) = existing_handler();
        let invoker = RecordingInvoker {
            delay: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        let calls = invoker.calls.clone();
        let config = WorkerConfig {
            handler_timeout: Duration::from_millis(200),
            ..fast_config()
        };
        let (mut tx, _handle, stats) = spawn(invoker, config);

        tx.try_enqueue(job(&handler, 1)).unwrap();
        tx.try_enqueue(job(&handler, 2)).unwrap();

        assert!(wait_until(Duration::from_secs(5), || stats.snapshot().timed_out == 2));
        let calls = calls.lock().unwrap();
        let gap = calls[1].1.duration_since(calls[0].1);
        assert!(gap >= Duration::from_millis(200));
        assert!(gap < Duration::from_secs(2), "stall {:?} exceeds bound", gap);
    }

    #[test]
    fn test_stop_discards_pending_jobs() {
        let (_dir, handler) = existing_handler();
        let invoker = RecordingInvoker {
            delay: Some(Duration::from_millis(100)),
            ..Default::default()
        };
        let calls = invoker.calls.clone();
        let (mut tx, mut handle, _stats) = spawn(invoker, fast_config());

        for note in 0..20 {
            tx.try_enqueue(job(&handler, note)).unwrap();
        }
        assert!(wait_until(Duration::from_secs(5), || !calls.lock().unwrap().is_empty()));

        assert!(handle.stop(Duration::from_secs(2)));
        let ran = calls.lock().unwrap().len();
        assert!(ran < 20, "stop should abandon the remaining jobs, ran {}", ran);
        assert!(!handle.is_running());
    }

    #[test]
    fn test_idle_worker_stops_promptly() {
        let (_tx, mut handle, _stats) = spawn(RecordingInvoker::default(), WorkerConfig::default());
        assert!(wait_until(Duration::from_secs(1), || handle.state() == WorkerState::Idle));

        let start = Instant::now();
        assert!(handle.stop(Duration::from_secs(2)));
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(handle.state(), WorkerState::Stopped);
    }
}
