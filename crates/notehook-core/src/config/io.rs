//! YAML load/save helpers
//!
//! Loading never fails: a missing or unreadable file falls back to the
//! type's default and the problem is logged.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load a YAML file, or `T::default()` when missing or invalid
pub fn load_yaml<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("load_yaml: {:?} not found, using defaults", path);
            return T::default();
        }
        Err(e) => {
            log::warn!("load_yaml: Failed to read {:?}: {}, using defaults", path, e);
            return T::default();
        }
    };

    // An empty file is treated like a missing one
    if contents.trim().is_empty() {
        return T::default();
    }

    serde_yaml::from_str(&contents).unwrap_or_else(|e| {
        log::warn!("load_yaml: Invalid YAML in {:?}: {}, using defaults", path, e);
        T::default()
    })
}

/// Write `value` as YAML, creating parent directories as needed
pub fn save_yaml<T>(value: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(value).context("Failed to serialize to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write {:?}", path))?;

    log::info!("save_yaml: Wrote {:?}", path);
    Ok(())
}
