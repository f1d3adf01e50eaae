//! MIDI port discovery
//!
//! Ports are matched case-insensitively as a substring of their names.

use midir::{MidiInput, MidiInputPort, MidiOutput, MidiOutputPort};

/// Client names registered with the system MIDI layer
pub(crate) const INPUT_CLIENT: &str = "notehook-in";
pub(crate) const OUTPUT_CLIENT: &str = "notehook-out";

/// Error type for midir host operations
#[derive(Debug, thiserror::Error)]
pub enum MidiHostError {
    #[error("Failed to initialize MIDI input: {0}")]
    InputInit(String),

    #[error("Failed to initialize MIDI output: {0}")]
    OutputInit(String),

    #[error("No MIDI {0} ports available")]
    NoPorts(&'static str),

    #[error("No MIDI {direction} port found matching pattern: {pattern}")]
    PortNotFound {
        direction: &'static str,
        pattern: String,
    },

    #[error("Failed to connect to MIDI port: {0}")]
    Connect(String),
}

/// Names of all ports currently visible
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortListing {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// Index of the first name containing `pattern` (case-insensitive)
pub(crate) fn find_matching<S: AsRef<str>>(names: &[S], pattern: &str) -> Option<usize> {
    let pattern = pattern.to_lowercase();
    names
        .iter()
        .position(|name| name.as_ref().to_lowercase().contains(&pattern))
}

/// List every input and output port
pub fn list_ports() -> Result<PortListing, MidiHostError> {
    let midi_in =
        MidiInput::new(INPUT_CLIENT).map_err(|e| MidiHostError::InputInit(e.to_string()))?;
    let midi_out =
        MidiOutput::new(OUTPUT_CLIENT).map_err(|e| MidiHostError::OutputInit(e.to_string()))?;

    Ok(PortListing {
        inputs: midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect(),
        outputs: midi_out
            .ports()
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect(),
    })
}

/// Find an input port; returns the input so the caller can connect a callback
pub(crate) fn find_input_port(
    port_match: &str,
) -> Result<(MidiInput, MidiInputPort, String), MidiHostError> {
    let midi_in =
        MidiInput::new(INPUT_CLIENT).map_err(|e| MidiHostError::InputInit(e.to_string()))?;

    let ports = midi_in.ports();
    if ports.is_empty() {
        return Err(MidiHostError::NoPorts("input"));
    }

    let names: Vec<String> = ports
        .iter()
        .map(|port| midi_in.port_name(port).unwrap_or_default())
        .collect();
    let index = find_matching(&names, port_match).ok_or_else(|| MidiHostError::PortNotFound {
        direction: "input",
        pattern: port_match.to_string(),
    })?;

    log::info!("MIDI: Found input port: {}", names[index]);
    let port = ports[index].clone();
    Ok((midi_in, port, names[index].clone()))
}

/// Find an output port
pub(crate) fn find_output_port(
    port_match: &str,
) -> Result<(MidiOutput, MidiOutputPort, String), MidiHostError> {
    let midi_out =
        MidiOutput::new(OUTPUT_CLIENT).map_err(|e| MidiHostError::OutputInit(e.to_string()))?;

    let ports = midi_out.ports();
    if ports.is_empty() {
        return Err(MidiHostError::NoPorts("output"));
    }

    let names: Vec<String> = ports
        .iter()
        .map(|port| midi_out.port_name(port).unwrap_or_default())
        .collect();
    let index = find_matching(&names, port_match).ok_or_else(|| MidiHostError::PortNotFound {
        direction: "output",
        pattern: port_match.to_string(),
    })?;

    log::info!("MIDI: Found output port: {}", names[index]);
    let port = ports[index].clone();
    Ok((midi_out, port, names[index].clone()))
}
