//! Loads a configuration directory into a mapping plus a report

use super::event_conf::{parse_event_conf, ConfigWarning};
use super::paths::{EVENT_CONF_FILE, SCRIPTS_DIR};
use crate::mapping::NoteMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Warnings collected while loading
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigReport {
    pub warnings: Vec<ConfigWarning>,
}

impl ConfigReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// One configuration directory, loaded
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_dir: PathBuf,
    pub conf_file: PathBuf,
    pub scripts_dir: PathBuf,
    pub mappings: BTreeMap<u8, PathBuf>,
    pub report: ConfigReport,
}

impl LoadedConfig {
    fn empty(config_dir: &Path) -> Self {
        Self {
            config_dir: config_dir.to_path_buf(),
            conf_file: config_dir.join(EVENT_CONF_FILE),
            scripts_dir: config_dir.join(SCRIPTS_DIR),
            mappings: BTreeMap::new(),
            report: ConfigReport::default(),
        }
    }

    /// Build the routing table for the real-time side
    pub fn note_map(&self) -> NoteMap {
        NoteMap::from(&self.mappings)
    }
}

/// Load `event.conf` from `config_dir`
///
/// Never fails: a missing file yields an empty mapping with a single warning.
pub fn load_from_dir(config_dir: &Path) -> LoadedConfig {
    let mut loaded = LoadedConfig::empty(config_dir);

    if !loaded.conf_file.is_file() {
        loaded
            .report
            .warnings
            .push(ConfigWarning::MissingConfFile(loaded.conf_file.clone()));
        return loaded;
    }

    if !loaded.scripts_dir.exists() {
        loaded
            .report
            .warnings
            .push(ConfigWarning::MissingScriptsDir(loaded.scripts_dir.clone()));
    }

    let contents = match std::fs::read(&loaded.conf_file) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            loaded.report.warnings.push(ConfigWarning::Unreadable {
                path: loaded.conf_file.clone(),
                message: e.to_string(),
            });
            return loaded;
        }
    };

    let parsed = parse_event_conf(&contents, config_dir);
    loaded.mappings = parsed.mappings;
    loaded.report.warnings.extend(parsed.warnings);

    log::info!(
        "Loaded {} mapping(s) from {:?} ({} warning(s))",
        loaded.mappings.len(),
        loaded.conf_file,
        loaded.report.warnings.len()
    );
    loaded
}
