//! notehook core - run external handlers for MIDI notes without touching the real-time path
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  route()   ┌──────────────┐  dequeue_batch()  ┌──────────────────┐
//! │  Host RT thread  │──────────► │ Relay queue  │ ────────────────► │ Dispatch worker  │
//! │ (HookProcessor)  │ try_enqueue│ (SPSC ring)  │                   │ (notehook-dispatch)
//! └────────┬─────────┘            └──────────────┘                   └────────┬─────────┘
//!          │ forward every event unchanged                                    │ invoke + timeout
//!          ▼                                                                  ▼
//!     MIDI output                                                     external handler
//! ```
//!
//! The real-time side only reads an immutable [`NoteMap`] snapshot and pushes
//! into a bounded lock-free ring. Everything that can block (process launch,
//! waiting, logging, file access) happens on the worker thread or on the
//! thread that owns the [`HookSession`].

pub mod config;
pub mod event;
pub mod host;
pub mod invoke;
pub mod job;
pub mod mapping;
pub mod processor;
pub mod relay;
pub mod router;
pub mod session;
pub mod state;
pub mod stats;
pub mod status;
pub mod worker;

pub use event::{NoteEvent, RawEvent};
pub use invoke::{HandlerInvoker, Invocation, InvokeError, ProcessInvoker, TimeoutPolicy};
pub use job::{HandlerPath, JobDescriptor};
pub use mapping::{MappingCell, NoteMap};
pub use processor::{CycleReport, EventSink, HookProcessor, SampleRate};
pub use relay::{Batch, RelayConsumer, RelayProducer, RelayQueue};
pub use router::{route, CycleClock};
pub use session::{HookError, HookSession};
pub use state::PluginState;
pub use stats::{DispatchStats, StatsSnapshot};
pub use status::{StatusIndicator, StatusReport};
pub use worker::{DispatchWorker, WorkerConfig, WorkerHandle, WorkerState};
