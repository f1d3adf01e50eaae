//! Standard locations of the configuration files

use std::path::PathBuf;

/// Mapping file inside the configuration directory
pub const EVENT_CONF_FILE: &str = "event.conf";
/// Conventional directory for handler scripts
pub const SCRIPTS_DIR: &str = "scripts";
/// Worker/queue tuning
pub const SETTINGS_FILE: &str = "settings.yaml";
/// Persisted executable string
pub const STATE_FILE: &str = "state";

/// Default configuration directory
///
/// Returns: `<data dir>/notehook` (e.g. `~/.local/share/notehook` on Linux),
/// or `./notehook` when the platform has no data directory.
pub fn default_config_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notehook")
}
