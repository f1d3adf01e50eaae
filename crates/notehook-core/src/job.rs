//! Job descriptors passed from the real-time thread to the dispatch worker

use std::path::Path;
use std::sync::Arc;

/// Resolved handler program path
///
/// Reference counted so cloning it on the real-time thread is a single
/// atomic increment, never an allocation.
pub type HandlerPath = Arc<Path>;

/// One triggered handler invocation
///
/// Immutable once built. Owns nothing mutable, so moving it across the
/// thread boundary through the relay queue is always safe.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    /// Handler to run (resolved when the configuration was loaded)
    pub handler: HandlerPath,
    /// Note number (0-127)
    pub note: u8,
    /// Velocity (1-127 for triggering events)
    pub velocity: u8,
    /// MIDI channel (1-16)
    pub channel: u8,
    /// Estimated absolute time of the event in seconds
    pub timestamp_seconds: f64,
}

impl JobDescriptor {
    /// Command-line arguments passed to the handler after its path
    ///
    /// `--note N --vel V --chan C --time T`, time with six decimals.
    pub fn arguments(&self) -> [String; 8] {
        [
            "--note".to_string(),
            self.note.to_string(),
            "--vel".to_string(),
            self.velocity.to_string(),
            "--chan".to_string(),
            self.channel.to_string(),
            "--time".to_string(),
            format!("{:.6}", self.timestamp_seconds),
        ]
    }
}
