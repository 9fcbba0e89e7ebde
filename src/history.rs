//! The last source transition (`history.toml`).
//!
//! History is not a log. Each successful switch replaces the whole file with
//! a `previous` and a `current` snapshot, and both tables are always present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use tracing::debug;

use crate::catalog::SourceRecord;
use crate::error::SwitchError;
use crate::fs_utils::atomic_write;

/// Field values of a source at the moment it was (de)activated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dist_server: String,
    #[serde(default)]
    pub update_root: String,
    #[serde(default)]
    pub cargo_config: String,
}

impl Snapshot {
    pub fn of(record: &SourceRecord) -> Self {
        Self {
            name: record.name.clone(),
            dist_server: record.dist_server.clone(),
            update_root: record.update_root.clone(),
            cargo_config: record.cargo_config.clone(),
        }
    }

    /// True for the all-empty placeholder written on a first switch
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Contents of `history.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub previous: Snapshot,
    #[serde(default)]
    pub current: Snapshot,
}

impl History {
    /// Read the history file; `None` if no switch has happened yet
    pub fn read(path: &Path) -> Result<Option<Self>, SwitchError> {
        let corrupt = |source| SwitchError::HistoryCorrupt {
            path: path.to_path_buf(),
            source,
        };
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(corrupt(e)),
        };
        toml::from_str(&content)
            .map(Some)
            .map_err(|e| corrupt(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

/// Whether a history file exists at all
///
/// Only used to pick "initialized" or "switched" wording.
pub fn has_history(path: &Path) -> bool {
    path.exists()
}

/// Replace the history with one transition
///
/// `previous` is `None` when nothing was active before; the previous slot is
/// then written with empty fields so the file always has the same shape.
pub fn record(
    path: &Path,
    previous: Option<&Snapshot>,
    current: &Snapshot,
) -> Result<History, SwitchError> {
    let history = History {
        recorded_at: Some(Utc::now()),
        previous: previous.cloned().unwrap_or_default(),
        current: current.clone(),
    };

    let content = toml::to_string_pretty(&history)
        .map_err(io::Error::other)
        .and_then(|content| atomic_write(path, &content).map(|()| content))
        .map_err(|source| SwitchError::HistoryWriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(path = %path.display(), bytes = content.len(), "history recorded");
    Ok(history)
}
