//! Native JACK MIDI host for Linux
//!
//! Registers `midi_in` and `midi_out`, forwards everything from one to the
//! other and lets the [`HookProcessor`] route note-ons on the way through.
//!
//! ```text
//! system:midi_capture ──► notehook:midi_in ──► HookProcessor ──► notehook:midi_out
//!                                                   │
//!                                                   └─ try_enqueue ─► dispatch worker
//! ```

use super::{HostError, HostResult};
use crate::event::RawEvent;
use crate::processor::{EventSink, HookProcessor, SampleRate};
use jack::{Client, ClientOptions, Control, MidiIn, MidiOut, Port, ProcessScope, RawMidi};
use std::sync::Arc;

/// JACK port names
pub const MIDI_IN: &str = "midi_in";
pub const MIDI_OUT: &str = "midi_out";

/// An opened, not yet active JACK client
///
/// Opening first lets the caller read the server's sample rate before
/// preparing the session.
pub struct JackHost {
    client: Client,
    midi_in: Port<MidiIn>,
    midi_out: Port<MidiOut>,
}

impl JackHost {
    /// Create the client and register both MIDI ports
    pub fn open(client_name: &str) -> HostResult<Self> {
        // JACK may rename us if another client has the same name
        let (client, _status) = Client::new(client_name, ClientOptions::NO_START_SERVER)
            .map_err(|e| HostError::Client(e.to_string()))?;

        let midi_in = client
            .register_port(MIDI_IN, MidiIn::default())
            .map_err(|e| HostError::Port {
                port: MIDI_IN.to_string(),
                message: e.to_string(),
            })?;
        let midi_out = client
            .register_port(MIDI_OUT, MidiOut::default())
            .map_err(|e| HostError::Port {
                port: MIDI_OUT.to_string(),
                message: e.to_string(),
            })?;

        log::info!(
            "JACK client '{}' created (sample rate: {}Hz, buffer: {} frames)",
            client.name(),
            client.sample_rate(),
            client.buffer_size()
        );

        Ok(Self {
            client,
            midi_in,
            midi_out,
        })
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    pub fn sample_rate(&self) -> f64 {
        self.client.sample_rate() as f64
    }

    /// Start processing
    ///
    /// `connect_from` / `connect_to` are full JACK port names to wire to
    /// `midi_in` / `midi_out` after activation; failures are only logged.
    pub fn activate(
        self,
        processor: HookProcessor,
        connect_from: Option<&str>,
        connect_to: Option<&str>,
    ) -> HostResult<JackHookHandle> {
        let client_name = self.client.name().to_string();
        let notifications = JackNotifications {
            sample_rate: processor.sample_rate(),
        };
        let handler = JackProcessor {
            midi_in: self.midi_in,
            midi_out: self.midi_out,
            sample_rate: processor.sample_rate(),
            processor,
        };

        let async_client = self
            .client
            .activate_async(notifications, handler)
            .map_err(|e| HostError::Activate(e.to_string()))?;
        log::info!("JACK client activated");

        let client = async_client.as_client();
        if let Some(source) = connect_from {
            let own = format!("{}:{}", client_name, MIDI_IN);
            match client.connect_ports_by_name(source, &own) {
                Ok(()) => log::info!("Connected {} -> {}", source, own),
                Err(e) => log::warn!("Could not connect {} -> {}: {}", source, own, e),
            }
        }
        if let Some(destination) = connect_to {
            let own = format!("{}:{}", client_name, MIDI_OUT);
            match client.connect_ports_by_name(&own, destination) {
                Ok(()) => log::info!("Connected {} -> {}", own, destination),
                Err(e) => log::warn!("Could not connect {} -> {}: {}", own, destination, e),
            }
        }

        Ok(JackHookHandle {
            _async_client: async_client,
            client_name,
        })
    }
}

/// Keeps the JACK client active; drop to disconnect
pub struct JackHookHandle {
    _async_client: jack::AsyncClient<JackNotifications, JackProcessor>,
    client_name: String,
}

impl JackHookHandle {
    pub fn client_name(&self) -> &str {
        &self.client_name
    }
}

/// Writes forwarded events to `midi_out` at their original offsets
struct JackMidiSink<'a> {
    writer: jack::MidiWriter<'a>,
}

impl EventSink for JackMidiSink<'_> {
    fn forward(&mut self, event: RawEvent<'_>) {
        // Only fails when the port buffer is full; nothing to do about it here
        let _ = self.writer.write(&RawMidi {
            time: event.sample_offset,
            bytes: event.bytes,
        });
    }
}

struct JackProcessor {
    midi_in: Port<MidiIn>,
    midi_out: Port<MidiOut>,
    sample_rate: Arc<SampleRate>,
    processor: HookProcessor,
}

impl jack::ProcessHandler for JackProcessor {
    fn process(&mut self, _client: &Client, ps: &ProcessScope) -> Control {
        let mut sink = JackMidiSink {
            writer: self.midi_out.writer(ps),
        };
        let events = self
            .midi_in
            .iter(ps)
            .map(|midi| RawEvent::new(midi.bytes, midi.time));

        // Frame time of the first sample in this cycle
        let rate = self.sample_rate.get();
        let host_time = if rate > 0.0 {
            ps.last_frame_time() as f64 / rate
        } else {
            0.0
        };

        self.processor.process(events, host_time, &mut sink);
        Control::Continue
    }
}

/// Runs on JACK's notification thread, never the process thread
struct JackNotifications {
    sample_rate: Arc<SampleRate>,
}

impl jack::NotificationHandler for JackNotifications {
    fn sample_rate(&mut self, _client: &Client, srate: jack::Frames) -> Control {
        log::info!("JACK sample rate changed to: {}", srate);
        self.sample_rate.set(srate as f64);
        Control::Continue
    }

    fn xrun(&mut self, _client: &Client) -> Control {
        log::warn!("JACK xrun detected");
        Control::Continue
    }
}
