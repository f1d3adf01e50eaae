//! midir input host
//!
//! Every midir callback is one processing cycle holding a single event at
//! offset 0. The midir timestamp (microseconds) becomes the host time.

use crate::connection::{find_input_port, find_output_port, MidiHostError};
use midir::{MidiInputConnection, MidiOutputConnection};
use notehook_core::{EventSink, HookProcessor, RawEvent};

/// Forwards events to an optional midir output
pub(crate) struct MidirSink {
    output: Option<MidiOutputConnection>,
}

impl EventSink for MidirSink {
    fn forward(&mut self, event: RawEvent<'_>) {
        if let Some(output) = self.output.as_mut() {
            // Callback thread: nowhere useful to report a failed send
            let _ = output.send(event.bytes);
        }
    }
}

/// State owned by the midir callback
struct CallbackData {
    processor: HookProcessor,
    sink: MidirSink,
}

/// Convert a midir timestamp to seconds
fn timestamp_seconds(micros: u64) -> f64 {
    micros as f64 / 1_000_000.0
}

/// Connect the first output port matching `pattern`; failures are logged
fn connect_output(pattern: &str) -> Option<(MidiOutputConnection, String)> {
    let (midi_out, port, name) = match find_output_port(pattern) {
        Ok(found) => found,
        Err(e) => {
            log::warn!("MIDI: {}, forwarding disabled", e);
            return None;
        }
    };

    match midi_out.connect(&port, "notehook-forward") {
        Ok(connection) => Some((connection, name)),
        Err(e) => {
            log::warn!("MIDI: Failed to connect output {}: {}", name, e);
            None
        }
    }
}

/// Connected midir input driving a [`HookProcessor`]
///
/// Drop to disconnect both ports.
pub struct MidiHookInput {
    _connection: MidiInputConnection<CallbackData>,
    input_port: String,
    output_port: Option<String>,
}

impl MidiHookInput {
    /// Connect the first input port matching `port_match` and, optionally,
    /// an output port matching `output_match` for forwarding
    ///
    /// A missing output port is logged and forwarding is skipped.
    pub fn connect(
        port_match: &str,
        output_match: Option<&str>,
        processor: HookProcessor,
    ) -> Result<Self, MidiHostError> {
        let (midi_in, port, input_port) = find_input_port(port_match)?;

        let (output, output_port) = match output_match.and_then(connect_output) {
            Some((connection, name)) => (Some(connection), Some(name)),
            None => (None, None),
        };

        let data = CallbackData {
            processor,
            sink: MidirSink { output },
        };

        let connection = midi_in
            .connect(&port, "notehook-input", Self::midi_callback, data)
            .map_err(|e| MidiHostError::Connect(e.to_string()))?;

        log::info!(
            "MIDI: Listening on {}{}",
            input_port,
            output_port
                .as_deref()
                .map(|out| format!(", forwarding to {}", out))
                .unwrap_or_default()
        );

        Ok(Self {
            _connection: connection,
            input_port,
            output_port,
        })
    }

    pub fn input_port(&self) -> &str {
        &self.input_port
    }

    pub fn output_port(&self) -> Option<&str> {
        self.output_port.as_deref()
    }

    /// Called from the MIDI driver thread for every message
    fn midi_callback(timestamp: u64, message: &[u8], data: &mut CallbackData) {
        data.processor.process(
            [RawEvent::new(message, 0)],
            timestamp_seconds(timestamp),
            &mut data.sink,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notehook_core::{DispatchStats, MappingCell, NoteMap, RelayQueue, SampleRate};
    use std::path::PathBuf;
    use std::sync::Arc;

    #[test]
    fn test_timestamp_conversion() {
        assert_eq!(timestamp_seconds(0), 0.0);
        assert_eq!(timestamp_seconds(2_500_000), 2.5);
    }

    #[test]
    fn test_callback_routes_with_midir_timestamp() {
        let (producer, mut consumer) = RelayQueue::with_capacity(4);
        let mapping = Arc::new(MappingCell::new(NoteMap::from_entries(vec![(
            42,
            PathBuf::from("/h/42.py"),
        )])));
        let mut data = CallbackData {
            processor: HookProcessor::new(
                producer,
                mapping,
                Arc::new(SampleRate::new(48000.0)),
                Arc::new(DispatchStats::new()),
            ),
            sink: MidirSink { output: None },
        };

        MidiHookInput::midi_callback(1_250_000, &[0x92, 42, 64], &mut data);
        MidiHookInput::midi_callback(1_300_000, &[0x82, 42, 0], &mut data);

        let job = consumer.try_dequeue().unwrap();
        assert_eq!((job.note, job.velocity, job.channel), (42, 64, 3));
        assert_eq!(job.timestamp_seconds, 1.25);
        assert!(consumer.try_dequeue().is_none());
    }
}
