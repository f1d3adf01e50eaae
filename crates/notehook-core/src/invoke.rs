//! Handler invocation with a bounded wait
//!
//! The worker only needs "run program P for this job and wait at most T".
//! [`HandlerInvoker`] is that capability; [`ProcessInvoker`] implements it
//! with a child process.

use crate::job::JobDescriptor;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often a running handler is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Result of a finished invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// Handler exited on its own (exit code if the platform reports one)
    Completed { code: Option<i32> },
    /// Handler was still running when the timeout expired
    TimedOut,
}

/// Errors that can occur while invoking a handler
#[derive(Error, Debug)]
pub enum InvokeError {
    /// The program could not be started
    #[error("Failed to launch {program:?}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the running program failed
    #[error("Failed to wait for handler: {0}")]
    Wait(#[from] std::io::Error),
}

/// What to do with a handler that outlives its timeout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Kill the process and reap it
    #[default]
    Kill,
    /// Leave it running; it is reaped on a later invocation once it exits
    Detach,
}

/// Capability to run one job's handler with a bounded wait
///
/// Runs on the dispatch worker thread only. Implementations must return
/// within roughly `timeout` of being called.
pub trait HandlerInvoker: Send + 'static {
    fn invoke(
        &mut self,
        job: &JobDescriptor,
        timeout: Duration,
    ) -> Result<Invocation, InvokeError>;
}

/// Runs handlers as child processes
///
/// Command line: `<executable> <handler> --note N --vel V --chan C --time T`.
/// With an empty executable the handler itself is executed. Output is
/// discarded.
pub struct ProcessInvoker {
    executable: Option<PathBuf>,
    policy: TimeoutPolicy,
    /// Timed-out children left running under [`TimeoutPolicy::Detach`]
    detached: Vec<Child>,
}

impl ProcessInvoker {
    /// Create an invoker that runs handlers through `executable`
    /// (e.g. `python3`); an empty string runs handlers directly
    pub fn new(executable: &str, policy: TimeoutPolicy) -> Self {
        let executable = executable.trim();
        Self {
            executable: (!executable.is_empty()).then(|| PathBuf::from(executable)),
            policy,
            detached: Vec::new(),
        }
    }

    /// Number of detached handlers still running
    pub fn detached_count(&mut self) -> usize {
        self.reap_detached();
        self.detached.len()
    }

    fn command(&self, job: &JobDescriptor) -> Command {
        let mut command = match &self.executable {
            Some(executable) => {
                let mut command = Command::new(executable);
                command.arg(job.handler.as_ref());
                command
            }
            None => Command::new(job.handler.as_ref()),
        };
        command
            .args(job.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Own process group, so a timeout can take down everything the handler started
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        command
    }

    fn reap_detached(&mut self) {
        self.detached
            .retain_mut(|child| matches!(child.try_wait(), Ok(None)));
    }

    fn abandon(&mut self, mut child: Child) {
        match self.policy {
            TimeoutPolicy::Kill => {
                #[cfg(unix)]
                kill_process_group(&child);
                if let Err(e) = child.kill() {
                    log::debug!("Handler kill failed (already exited?): {}", e);
                }
                // Reap to avoid leaving a zombie behind
                let _ = child.wait();
            }
            TimeoutPolicy::Detach => self.detached.push(child),
        }
    }
}

/// SIGKILL the handler's process group (its pgid is its own pid)
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: plain syscall; a negative pid addresses the process group
    let result = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if result != 0 {
        log::debug!(
            "Handler process group {} kill failed: {}",
            pgid,
            std::io::Error::last_os_error()
        );
    }
}

impl HandlerInvoker for ProcessInvoker {
    fn invoke(
        &mut self,
        job: &JobDescriptor,
        timeout: Duration,
    ) -> Result<Invocation, InvokeError> {
        self.reap_detached();

        let program = self
            .executable
            .clone()
            .unwrap_or_else(|| job.handler.to_path_buf());

        let mut child = self
            .command(job)
            .spawn()
            .map_err(|source| InvokeError::Launch { program, source })?;

        let start = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    return Ok(Invocation::Completed {
                        code: status.code(),
                    })
                }
                Ok(None) => {
                    let elapsed = start.elapsed();
                    if elapsed >= timeout {
                        self.abandon(child);
                        return Ok(Invocation::TimedOut);
                    }
                    thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
                }
                Err(e) => {
                    self.abandon(child);
                    return Err(InvokeError::Wait(e));
                }
            }
        }
    }
}
