//! Configuration for the hook dispatcher
//!
//! Two files live in the configuration directory:
//!
//! - `event.conf`: the note -> handler mapping (hand-written, line based)
//! - `settings.yaml`: tuning knobs for the queue and worker
//!
//! Handlers are usually kept under `scripts/` next to `event.conf`.
//!
//! # Usage
//!
//! ```ignore
//! use notehook_core::config::{load_from_dir, HookSettings};
//!
//! let loaded = load_from_dir(&dir);
//! for warning in &loaded.report.warnings {
//!     log::warn!("{}", warning);
//! }
//! ```

mod event_conf;
mod io;
mod loader;
mod paths;
mod settings;

pub use event_conf::{parse_event_conf, ConfigWarning, ParsedMappings};
pub use io::{load_yaml, save_yaml};
pub use loader::{load_from_dir, ConfigReport, LoadedConfig};
pub use paths::{
    default_config_dir, EVENT_CONF_FILE, SCRIPTS_DIR, SETTINGS_FILE, STATE_FILE,
};
pub use settings::{HookSettings, ReloadPolicy};
