//! Persisted host state
//!
//! The only thing that survives a session is the executable used to run
//! handlers. The byte form is the UTF-8 string followed by a single NUL,
//! which is what plugin hosts store as an opaque blob.

use anyhow::{Context, Result};
use std::path::Path;

/// Executable used when nothing has been saved
pub const DEFAULT_EXECUTABLE: &str = "python3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginState {
    /// Program handlers are run with; empty means "run the handler directly"
    pub executable: String,
}

impl Default for PluginState {
    fn default() -> Self {
        Self {
            executable: DEFAULT_EXECUTABLE.to_string(),
        }
    }
}

impl PluginState {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Serialize as NUL-terminated UTF-8
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.executable.len() + 1);
        bytes.extend_from_slice(self.executable.as_bytes());
        bytes.push(0);
        bytes
    }

    /// Restore from bytes written by [`to_bytes`](Self::to_bytes)
    ///
    /// Reads up to the first NUL (or the end). Invalid UTF-8 is replaced.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        Self {
            executable: String::from_utf8_lossy(&bytes[..end]).into_owned(),
        }
    }

    /// Load from a state file; missing or unreadable files give the default
    pub fn load(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => Self::from_bytes(&bytes),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Failed to read state {:?}: {}, using defaults", path, e);
                }
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        std::fs::write(path, self.to_bytes())
            .with_context(|| format!("Failed to write state {:?}", path))?;
        log::debug!("Saved state to {:?}", path);
        Ok(())
    }
}
