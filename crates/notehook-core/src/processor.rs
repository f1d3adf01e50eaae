//! Real-time processor: the per-cycle host callback
//!
//! Owns the producer end of the relay queue. For every cycle it forwards
//! each incoming event unchanged and, in the same pass, routes note-ons to
//! the dispatch worker.
//!
//! # Real-Time Safety
//!
//! Nothing in [`HookProcessor::process`] locks, allocates, logs or performs
//! I/O. A full queue drops the job (counted) and the event is still
//! forwarded.

use crate::event::RawEvent;
use crate::job::JobDescriptor;
use crate::mapping::MappingCell;
use crate::relay::RelayProducer;
use crate::router::{route, CycleClock};
use crate::stats::DispatchStats;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Destination of forwarded events (e.g. a MIDI output port writer)
pub trait EventSink {
    /// Forward one event; called in input order with the original offset
    fn forward(&mut self, event: RawEvent<'_>);
}

/// Sample rate shared between the host's notification thread and the processor
#[derive(Debug)]
pub struct SampleRate(AtomicU64);

impl SampleRate {
    pub fn new(hz: f64) -> Self {
        Self(AtomicU64::new(hz.to_bits()))
    }

    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, hz: f64) {
        self.0.store(hz.to_bits(), Ordering::Relaxed);
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        Self::new(44100.0)
    }
}

/// What happened during one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Events forwarded (always every input event)
    pub forwarded: usize,
    /// Jobs accepted by the relay queue
    pub enqueued: usize,
    /// Jobs dropped because the relay queue was full
    pub dropped: usize,
}

/// Real-time side of the pipeline
pub struct HookProcessor {
    producer: RelayProducer<JobDescriptor>,
    mapping: Arc<MappingCell>,
    sample_rate: Arc<SampleRate>,
    stats: Arc<DispatchStats>,
}

impl HookProcessor {
    pub fn new(
        producer: RelayProducer<JobDescriptor>,
        mapping: Arc<MappingCell>,
        sample_rate: Arc<SampleRate>,
        stats: Arc<DispatchStats>,
    ) -> Self {
        Self {
            producer,
            mapping,
            sample_rate,
            stats,
        }
    }

    /// Shared sample rate, for hosts that get rate-change notifications
    pub fn sample_rate(&self) -> Arc<SampleRate> {
        self.sample_rate.clone()
    }

    /// Process one cycle
    ///
    /// `host_time_seconds` is the host's time estimate for the first sample
    /// of the cycle.
    pub fn process<'a, I, S>(
        &mut self,
        events: I,
        host_time_seconds: f64,
        sink: &mut S,
    ) -> CycleReport
    where
        I: IntoIterator<Item = RawEvent<'a>>,
        S: EventSink + ?Sized,
    {
        let clock = CycleClock::new(host_time_seconds, self.sample_rate.get());
        // One snapshot for the whole cycle
        let mapping = self.mapping.snapshot();
        let mut report = CycleReport::default();

        for event in events {
            sink.forward(event);
            report.forwarded += 1;

            let Some(job) = route(&event, &mapping, clock) else {
                continue;
            };

            match self.producer.try_enqueue(job) {
                Ok(()) => {
                    report.enqueued += 1;
                    self.stats.record_enqueued();
                }
                Err(_dropped) => {
                    report.dropped += 1;
                    self.stats.record_dropped();
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::NoteMap;
    use crate::relay::{RelayConsumer, RelayQueue};
    use std::path::{Path, PathBuf};

    /// Sink that records forwarded events
    #[derive(Default)]
    struct Recorder(Vec<(Vec<u8>, u32)>);

    impl EventSink for Recorder {
        fn forward(&mut self, event: RawEvent<'_>) {
            self.0.push((event.bytes.to_vec(), event.sample_offset));
        }
    }

    fn setup(
        capacity: usize,
        entries: Vec<(u8, PathBuf)>,
        sample_rate: f64,
    ) -> (HookProcessor, RelayConsumer<JobDescriptor>, Arc<DispatchStats>) {
        let (tx, rx) = RelayQueue::with_capacity(capacity);
        let mapping = Arc::new(MappingCell::new(NoteMap::from_entries(entries)));
        let stats = Arc::new(DispatchStats::new());
        let processor = HookProcessor::new(
            tx,
            mapping,
            Arc::new(SampleRate::new(sample_rate)),
            stats.clone(),
        );
        (processor, rx, stats)
    }

    #[test]
    fn test_two_mapped_notes_enqueued_in_order() {
        let (mut processor, mut rx, _stats) = setup(
            1024,
            vec![(60, PathBuf::from("a")), (61, PathBuf::from("b"))],
            48000.0,
        );

        let e0 = [0x90, 60, 100];
        let e1 = [0x90, 62, 100];
        let e2 = [0x90, 61, 10];
        let events = [
            RawEvent::new(&e0, 0),
            RawEvent::new(&e1, 10),
            RawEvent::new(&e2, 20),
        ];

        let mut sink = Recorder::default();
        let report = processor.process(events, 5.0, &mut sink);

        assert_eq!(
            report,
            CycleReport {
                forwarded: 3,
                enqueued: 2,
                dropped: 0
            }
        );
        assert_eq!(
            sink.0,
            vec![(e0.to_vec(), 0), (e1.to_vec(), 10), (e2.to_vec(), 20)]
        );

        let jobs: Vec<JobDescriptor> = rx.dequeue_batch(32).collect();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].handler.as_ref(), Path::new("a"));
        assert_eq!((jobs[0].note, jobs[0].velocity, jobs[0].channel), (60, 100, 1));
        assert_eq!(jobs[0].timestamp_seconds, 5.0);
        assert_eq!(jobs[1].handler.as_ref(), Path::new("b"));
        assert_eq!((jobs[1].note, jobs[1].velocity, jobs[1].channel), (61, 10, 1));
        assert!((jobs[1].timestamp_seconds - 5.000_417).abs() < 1e-6);
    }

    #[test]
    fn test_full_queue_drops_job_but_forwards_event() {
        let (mut processor, mut rx, stats) =
            setup(4, vec![(60, PathBuf::from("a"))], 48000.0);

        let bytes = [0x90, 60, 100];
        let events: Vec<RawEvent> = (0..5).map(|i| RawEvent::new(&bytes, i)).collect();

        let mut sink = Recorder::default();
        let report = processor.process(events, 0.0, &mut sink);

        assert_eq!(report.forwarded, 5);
        assert_eq!(report.enqueued, 4);
        assert_eq!(report.dropped, 1);
        assert_eq!(sink.0.len(), 5);
        assert_eq!(rx.dequeue_batch(32).count(), 4);

        let snap = stats.snapshot();
        assert_eq!(snap.enqueued, 4);
        assert_eq!(snap.dropped, 1);
    }

    #[test]
    fn test_empty_mapping_forwards_everything_and_enqueues_nothing() {
        let (mut processor, mut rx, _stats) = setup(16, vec![], 44100.0);

        let data: Vec<[u8; 3]> = (0..=127u8).map(|n| [0x90, n, 127]).collect();
        let events: Vec<RawEvent> = data.iter().map(|b| RawEvent::new(b, 0)).collect();

        let mut sink = Recorder::default();
        let report = processor.process(events, 0.0, &mut sink);

        assert_eq!(report.forwarded, 128);
        assert_eq!(report.enqueued, 0);
        assert!(rx.dequeue_batch(32).next().is_none());
    }

    #[test]
    fn test_pass_through_preserves_arbitrary_events() {
        let (mut processor, _rx, _stats) = setup(1, vec![(60, PathBuf::from("a"))], 48000.0);

        // Mixed stream: sysex, clock, note-on (mapped), note-off, CC, truncated bytes
        let sysex = [0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7];
        let clock = [0xF8];
        let note_on = [0x90, 60, 1];
        let note_off = [0x80, 60, 0];
        let cc = [0xB0, 60, 127];
        let short = [0x90, 60];
        let input = [
            RawEvent::new(&sysex, 0),
            RawEvent::new(&clock, 3),
            RawEvent::new(&note_on, 3),
            RawEvent::new(&note_on, 7),
            RawEvent::new(&note_off, 9),
            RawEvent::new(&cc, 12),
            RawEvent::new(&short, 15),
        ];

        let mut sink = Recorder::default();
        let report = processor.process(input, 1.0, &mut sink);

        let expected: Vec<(Vec<u8>, u32)> = input
            .iter()
            .map(|e| (e.bytes.to_vec(), e.sample_offset))
            .collect();
        assert_eq!(sink.0, expected);
        assert_eq!(report.enqueued, 1);
        assert_eq!(report.dropped, 1);
    }

    #[test]
    fn test_sample_rate_update_applies_to_next_cycle() {
        let (mut processor, mut rx, _stats) =
            setup(8, vec![(60, PathBuf::from("a"))], 48000.0);
        processor.sample_rate().set(96000.0);

        let bytes = [0x90, 60, 100];
        let mut sink = Recorder::default();
        processor.process([RawEvent::new(&bytes, 96)], 0.0, &mut sink);

        let job = rx.try_dequeue().unwrap();
        assert!((job.timestamp_seconds - 0.001).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_swap_between_cycles() {
        let (tx, mut rx) = RelayQueue::with_capacity(8);
        let mapping = Arc::new(MappingCell::default());
        let mut processor = HookProcessor::new(
            tx,
            mapping.clone(),
            Arc::new(SampleRate::default()),
            Arc::new(DispatchStats::new()),
        );

        let bytes = [0x90, 60, 100];
        let mut sink = Recorder::default();
        processor.process([RawEvent::new(&bytes, 0)], 0.0, &mut sink);
        assert!(rx.try_dequeue().is_none());

        mapping.publish(NoteMap::from_entries(vec![(60, PathBuf::from("new"))]));
        processor.process([RawEvent::new(&bytes, 0)], 0.0, &mut sink);
        assert_eq!(rx.try_dequeue().unwrap().handler.as_ref(), Path::new("new"));
    }
}
