//! `event.conf` parser
//!
//! ```text
//! # comment
//! ; also a comment
//! note.60 = scripts/middle_c.py
//! NOTE.61 = /abs/path/handler.sh
//! ```
//!
//! Problems never abort parsing; each one becomes a [`ConfigWarning`] and
//! the offending line is skipped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Non-fatal configuration problem
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    #[error("Missing event.conf at: {}", .0.display())]
    MissingConfFile(PathBuf),

    #[error("Failed to read {}: {message}", path.display())]
    Unreadable { path: PathBuf, message: String },

    #[error("Scripts directory does not exist: {}", .0.display())]
    MissingScriptsDir(PathBuf),

    #[error("Line {line}: ignoring line without '=': {text}")]
    MissingEquals { line: usize, text: String },

    #[error("Line {line}: invalid key (expected note.<0-127>): {key}")]
    InvalidKey { line: usize, key: String },

    #[error("Line {line}: empty handler path for {key}")]
    EmptyPath { line: usize, key: String },

    #[error("Line {line}: handler not found for {key}: {}", path.display())]
    HandlerNotFound {
        line: usize,
        key: String,
        path: PathBuf,
    },

    #[error("No mappings loaded from event.conf")]
    NoMappings,
}

/// Result of parsing one `event.conf`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMappings {
    pub mappings: BTreeMap<u8, PathBuf>,
    pub warnings: Vec<ConfigWarning>,
}

/// Parse `note.<N>` into a note number
fn parse_note_key(key: &str) -> Option<u8> {
    let mut parts = key.split('.');
    let (Some(prefix), Some(number), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };

    if !prefix.trim().eq_ignore_ascii_case("note") {
        return None;
    }

    let number = number.trim();
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    number.parse::<u32>().ok().filter(|n| *n <= 127).map(|n| n as u8)
}

/// Parse the contents of an `event.conf`
///
/// Handler paths are resolved against `base_dir` and must name an existing
/// file. Later lines for the same note replace earlier ones.
pub fn parse_event_conf(contents: &str, base_dir: &Path) -> ParsedMappings {
    let mut parsed = ParsedMappings::default();

    for (index, raw) in contents.lines().enumerate() {
        let line = index + 1;
        let text = raw.trim();

        if text.is_empty() || text.starts_with('#') || text.starts_with(';') {
            continue;
        }

        let Some((key, value)) = text.split_once('=') else {
            parsed.warnings.push(ConfigWarning::MissingEquals {
                line,
                text: text.to_string(),
            });
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        let Some(note) = parse_note_key(key) else {
            parsed.warnings.push(ConfigWarning::InvalidKey {
                line,
                key: key.to_string(),
            });
            continue;
        };

        if value.is_empty() {
            parsed.warnings.push(ConfigWarning::EmptyPath {
                line,
                key: key.to_string(),
            });
            continue;
        }

        let path = base_dir.join(value);
        if !path.is_file() {
            parsed.warnings.push(ConfigWarning::HandlerNotFound {
                line,
                key: key.to_string(),
                path,
            });
            continue;
        }

        // Canonical paths keep the worker's existence re-check independent of cwd
        let path = path.canonicalize().unwrap_or(path);
        parsed.mappings.insert(note, path);
    }

    if parsed.mappings.is_empty() {
        parsed.warnings.push(ConfigWarning::NoMappings);
    }

    parsed
}
