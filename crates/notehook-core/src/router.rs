//! Event router: decides whether an incoming event triggers a handler
//!
//! Called once per event on the real-time thread. No allocation, no
//! blocking, and "not mapped" is an ordinary `None`.

use crate::event::{NoteEvent, RawEvent};
use crate::job::JobDescriptor;
use crate::mapping::NoteMap;

/// Timing context of the current processing cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleClock {
    /// Host time at the first sample of the cycle, in seconds
    pub host_time_seconds: f64,
    /// Sample rate in Hz
    pub sample_rate: f64,
}

impl CycleClock {
    pub fn new(host_time_seconds: f64, sample_rate: f64) -> Self {
        Self {
            host_time_seconds,
            sample_rate,
        }
    }

    /// Absolute time estimate for an event at `sample_offset`
    #[inline]
    pub fn event_time(&self, sample_offset: u32) -> f64 {
        if self.sample_rate > 0.0 {
            self.host_time_seconds + sample_offset as f64 / self.sample_rate
        } else {
            self.host_time_seconds
        }
    }
}

/// Build a job for `event` if it is a mapped note-on with positive velocity
#[inline]
pub fn route(event: &RawEvent<'_>, map: &NoteMap, clock: CycleClock) -> Option<JobDescriptor> {
    let NoteEvent::NoteOn {
        channel,
        note,
        velocity,
    } = event.decode().filter(NoteEvent::is_trigger)?
    else {
        return None;
    };

    let handler = map.get(note)?;

    Some(JobDescriptor {
        handler: handler.clone(),
        note,
        velocity,
        channel: channel + 1,
        timestamp_seconds: clock.event_time(event.sample_offset),
    })
}
