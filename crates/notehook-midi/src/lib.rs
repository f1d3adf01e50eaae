//! midir host for notehook
//!
//! Drives a [`HookProcessor`](notehook_core::HookProcessor) from a midir
//! input callback and forwards every message to an optional output port.
//! Works wherever midir does (ALSA on Linux, CoreMIDI on macOS, WinMM on
//! Windows).
//!
//! # Example
//!
//! ```ignore
//! use notehook_midi::MidiHookInput;
//!
//! let processor = session.prepare(48000.0)?;
//! let input = MidiHookInput::connect("launchpad", Some("synth"), processor)?;
//! ```

pub mod connection;
pub mod input;

pub use connection::{list_ports, MidiHostError, PortListing};
pub use input::MidiHookInput;
