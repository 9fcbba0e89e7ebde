//! The source catalog (`sources.toml`).
//!
//! A catalog maps source names to their endpoint URLs and cargo config blob,
//! plus a pointer to the source that is currently active. The key names in
//! the file are part of the public format because catalogs are hand-edited.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use tracing::debug;

use crate::error::SwitchError;
use crate::fs_utils::atomic_write;

/// A named bundle of rustup endpoints and a cargo config blob
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Table key in the catalog; filled in on load
    #[serde(skip)]
    pub name: String,

    /// Value for RUSTUP_DIST_SERVER
    #[serde(default, alias = "rustup_dist_server")]
    pub dist_server: String,

    /// Value for RUSTUP_UPDATE_ROOT
    #[serde(default, alias = "rustup_update_root")]
    pub update_root: String,

    /// Written verbatim to cargo's config.toml
    #[serde(default)]
    pub cargo_config: String,

    /// Hand-written keys rsswitch does not interpret, kept across saves
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl SourceRecord {
    pub fn has_cargo_config(&self) -> bool {
        !self.cargo_config.trim().is_empty()
    }
}

/// Contents of `sources.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Name of the active source, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,

    /// Sources in file order
    #[serde(default)]
    pub sources: IndexMap<String, SourceRecord>,
}

impl Catalog {
    /// Parse a catalog from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let mut catalog: Catalog = toml::from_str(content)?;
        for (name, record) in catalog.sources.iter_mut() {
            record.name = name.clone();
        }
        Ok(catalog)
    }

    /// Load the catalog, failing if it is missing or unparsable
    pub fn load(path: &Path) -> Result<Self, SwitchError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SwitchError::ConfigMissing {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(SwitchError::ConfigUnreadable {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let catalog = Self::parse(&content).map_err(|source| SwitchError::ConfigCorrupt {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), sources = catalog.sources.len(), "loaded catalog");
        Ok(catalog)
    }

    /// Overwrite the catalog file with this catalog
    pub fn save(&self, path: &Path) -> Result<(), SwitchError> {
        let fail = |source| SwitchError::CatalogWriteFailed {
            path: path.to_path_buf(),
            source,
        };
        let content = toml::to_string_pretty(self).map_err(|e| fail(io::Error::other(e)))?;
        atomic_write(path, &content).map_err(fail)?;
        debug!(path = %path.display(), current = ?self.current, "saved catalog");
        Ok(())
    }

    /// Look up a source by name
    pub fn resolve(&self, name: &str) -> Result<&SourceRecord, SwitchError> {
        self.sources
            .get(name)
            .ok_or_else(|| SwitchError::UnknownSource {
                name: name.to_string(),
                available: self.names(),
            })
    }

    /// The record the `current` pointer names, if the pointer is set and valid
    pub fn current_record(&self) -> Option<&SourceRecord> {
        self.current.as_deref().and_then(|name| self.sources.get(name))
    }

    /// True when `current` is set but names no source
    pub fn has_dangling_current(&self) -> bool {
        self.current.is_some() && self.current_record().is_none()
    }

    pub fn names(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }
}
