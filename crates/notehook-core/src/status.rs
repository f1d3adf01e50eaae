//! Text status report
//!
//! The user-facing summary of a session: where configuration was loaded
//! from, whether it loaded cleanly, and what the dispatcher has done so far.

use crate::config::ConfigWarning;
use crate::stats::StatsSnapshot;
use crate::worker::WorkerState;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIndicator {
    Ok,
    Warning,
}

impl fmt::Display for StatusIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub config_dir: PathBuf,
    pub indicator: StatusIndicator,
    pub warnings: Vec<ConfigWarning>,
    pub mapped_notes: usize,
    pub worker: WorkerState,
    pub stats: StatsSnapshot,
}

impl StatusReport {
    pub fn new(
        config_dir: PathBuf,
        warnings: Vec<ConfigWarning>,
        mapped_notes: usize,
        worker: WorkerState,
        stats: StatsSnapshot,
    ) -> Self {
        let indicator = if warnings.is_empty() {
            StatusIndicator::Ok
        } else {
            StatusIndicator::Warning
        };
        Self {
            config_dir,
            indicator,
            warnings,
            mapped_notes,
            worker,
            stats,
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Config dir: {}", self.config_dir.display())?;
        writeln!(f, "Status: {}", self.indicator)?;
        for warning in &self.warnings {
            writeln!(f, "  - {}", warning)?;
        }
        writeln!(f, "Mapped notes: {}", self.mapped_notes)?;
        writeln!(f, "Worker: {}", self.worker)?;
        write!(
            f,
            "Jobs: {} queued, {} dropped, {} run, {} skipped, {} failed, {} timed out",
            self.stats.enqueued,
            self.stats.dropped,
            self.stats.executed,
            self.stats.skipped,
            self.stats.failed,
            self.stats.timed_out
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_report() {
        let report = StatusReport::new(
            PathBuf::from("/cfg"),
            Vec::new(),
            3,
            WorkerState::Idle,
            StatsSnapshot::default(),
        );
        assert_eq!(report.indicator, StatusIndicator::Ok);

        let text = report.to_string();
        assert!(text.contains("Config dir: /cfg"));
        assert!(text.contains("Status: OK"));
        assert!(text.contains("Mapped notes: 3"));
    }

    #[test]
    fn test_warnings_listed() {
        let report = StatusReport::new(
            PathBuf::from("/cfg"),
            vec![ConfigWarning::NoMappings],
            0,
            WorkerState::Stopped,
            StatsSnapshot::default(),
        );
        assert_eq!(report.indicator, StatusIndicator::Warning);

        let text = report.to_string();
        assert!(text.contains("Status: WARNING"));
        assert!(text.contains("  - No mappings loaded from event.conf"));
    }
}
