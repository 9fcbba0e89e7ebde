//! Cargo's `config.toml`, replaced wholesale by the active source's blob.

use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::SwitchError;
use crate::fs_utils::atomic_write;

/// Somewhere a cargo config blob can be written
pub trait ConfigSink {
    fn path(&self) -> &Path;

    /// Replace the whole target with `contents`
    fn replace(&mut self, contents: &str) -> io::Result<()>;
}

/// The real `$CARGO_HOME/config.toml`
#[derive(Debug, Clone)]
pub struct CargoConfigFile {
    path: PathBuf,
}

impl CargoConfigFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Current contents, or `None` when the file does not exist
    pub fn read(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl ConfigSink for CargoConfigFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn replace(&mut self, contents: &str) -> io::Result<()> {
        atomic_write(&self.path, contents)
    }
}

/// Result of [`write_config`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWrite {
    Written(PathBuf),
    /// The source carries no cargo config; the file was left alone
    Skipped,
}

/// Write a source's cargo config blob verbatim
///
/// A blob that is empty or only whitespace is not an error: some sources only
/// move rustup and leave cargo's registry configuration untouched.
pub fn write_config(sink: &mut dyn ConfigSink, blob: &str) -> Result<ConfigWrite, SwitchError> {
    if blob.trim().is_empty() {
        info!(path = %sink.path().display(), "source has no cargo_config, leaving cargo config alone");
        return Ok(ConfigWrite::Skipped);
    }

    sink.replace(blob)
        .map_err(|source| SwitchError::ConfigWriteFailed {
            path: sink.path().to_path_buf(),
            source,
        })?;
    info!(path = %sink.path().display(), bytes = blob.len(), "cargo config written");
    Ok(ConfigWrite::Written(sink.path().to_path_buf()))
}
