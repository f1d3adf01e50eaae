//! Host drivers that call [`HookProcessor::process`](crate::HookProcessor::process)
//! from a real-time thread
//!
//! - **Linux**: native JACK client with MIDI ports (with the `jack-backend` feature)
//! - **Everywhere**: the midir host in the `notehook-midi` crate

use thiserror::Error;

#[cfg(all(target_os = "linux", feature = "jack-backend"))]
mod jack_backend;

#[cfg(all(target_os = "linux", feature = "jack-backend"))]
pub use jack_backend::{JackHookHandle, JackHost, MIDI_IN, MIDI_OUT};

/// Errors from host drivers
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to create client: {0}")]
    Client(String),

    #[error("Failed to register port {port}: {message}")]
    Port { port: String, message: String },

    #[error("Failed to activate client: {0}")]
    Activate(String),
}

/// Result type for host operations
pub type HostResult<T> = Result<T, HostError>;

/// Whether this build can run the JACK host
pub const fn jack_available() -> bool {
    cfg!(all(target_os = "linux", feature = "jack-backend"))
}
