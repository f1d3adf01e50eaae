//! MIDI events as delivered by the host
//!
//! [`RawEvent`] is what the host hands us each cycle and what we forward.
//! [`NoteEvent`] is the decoded view the router looks at.

/// One incoming event, borrowed from the host's buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent<'a> {
    /// Raw MIDI bytes, forwarded exactly as received
    pub bytes: &'a [u8],
    /// Position of the event inside the current cycle, in samples
    pub sample_offset: u32,
}

impl<'a> RawEvent<'a> {
    pub fn new(bytes: &'a [u8], sample_offset: u32) -> Self {
        Self {
            bytes,
            sample_offset,
        }
    }

    /// Decode the channel-voice message carried by this event, if any
    pub fn decode(&self) -> Option<NoteEvent> {
        NoteEvent::parse(self.bytes)
    }
}

/// Decoded channel-voice message
///
/// Channels are stored as on the wire (0-15).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEvent {
    /// Note On message with non-zero velocity
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Note Off message (including Note On with velocity 0)
    NoteOff { channel: u8, note: u8, velocity: u8 },
    /// Control Change message
    ControlChange { channel: u8, cc: u8, value: u8 },
}

impl NoteEvent {
    /// Parse raw MIDI bytes into an event
    ///
    /// MIDI message format:
    /// - Note Off: 0x8n nn vv (n=channel, nn=note, vv=velocity)
    /// - Note On: 0x9n nn vv
    /// - Control Change: 0xBn cc vv (cc=controller, vv=value)
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 3 {
            return None;
        }

        let status = data[0];
        let channel = status & 0x0F;
        let note = data[1] & 0x7F;
        let value = data[2] & 0x7F;

        match status & 0xF0 {
            0x80 => Some(Self::NoteOff {
                channel,
                note,
                velocity: value,
            }),
            // Note On with velocity 0 is a Note Off
            0x90 if value == 0 => Some(Self::NoteOff {
                channel,
                note,
                velocity: 0,
            }),
            0x90 => Some(Self::NoteOn {
                channel,
                note,
                velocity: value,
            }),
            0xB0 => Some(Self::ControlChange {
                channel,
                cc: note,
                value,
            }),
            _ => None, // pitch bend, aftertouch, sysex, realtime...
        }
    }

    /// Wire channel (0-15)
    pub fn channel(&self) -> u8 {
        match self {
            Self::NoteOn { channel, .. }
            | Self::NoteOff { channel, .. }
            | Self::ControlChange { channel, .. } => *channel,
        }
    }

    /// Channel as shown to users and passed to handlers (1-16)
    pub fn channel_id(&self) -> u8 {
        self.channel() + 1
    }

    /// Check if this event can trigger a handler
    pub fn is_trigger(&self) -> bool {
        matches!(self, Self::NoteOn { velocity, .. } if *velocity > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_on() {
        let event = NoteEvent::parse(&[0x90, 0x3C, 0x7F]).unwrap();
        assert_eq!(
            event,
            NoteEvent::NoteOn {
                channel: 0,
                note: 60,
                velocity: 127
            }
        );
        assert_eq!(event.channel_id(), 1);
        assert!(event.is_trigger());
    }

    #[test]
    fn test_parse_note_on_zero_velocity_is_note_off() {
        let event = NoteEvent::parse(&[0x91, 0x3C, 0x00]).unwrap();
        assert!(matches!(event, NoteEvent::NoteOff { channel: 1, note: 60, .. }));
        assert!(!event.is_trigger());
    }

    #[test]
    fn test_parse_note_off_and_cc() {
        let off = NoteEvent::parse(&[0x8F, 0x40, 0x40]).unwrap();
        assert_eq!(off.channel_id(), 16);
        assert!(!off.is_trigger());

        let cc = NoteEvent::parse(&[0xB2, 0x07, 0x64]).unwrap();
        assert_eq!(
            cc,
            NoteEvent::ControlChange {
                channel: 2,
                cc: 7,
                value: 100
            }
        );
        assert!(!cc.is_trigger());
    }

    #[test]
    fn test_parse_ignores_short_and_other_messages() {
        assert_eq!(NoteEvent::parse(&[]), None);
        assert_eq!(NoteEvent::parse(&[0x90, 0x3C]), None);
        assert_eq!(NoteEvent::parse(&[0xE0, 0x00, 0x40]), None); // pitch bend
        assert_eq!(NoteEvent::parse(&[0xF8]), None); // clock
    }

    #[test]
    fn test_raw_event_decode() {
        let bytes = [0x92, 60, 10];
        let raw = RawEvent::new(&bytes, 12);
        assert_eq!(raw.decode().map(|e| e.channel_id()), Some(3));
    }
}
