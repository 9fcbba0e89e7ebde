//! Test utilities shared across test modules
//!
//! In-memory stand-ins for the two external systems a switch writes to, so
//! engine tests never touch the real registry, shell files or `~/.cargo`.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::cargo_config::ConfigSink;
use crate::env_store::EnvStore;
use crate::paths::Paths;

/// Create a Paths struct rooted in a temporary directory
///
/// Mirrors the real layout: `<tmp>/.rsswitch/` for rsswitch's own files and
/// `<tmp>/.cargo/config.toml` for cargo.
pub fn setup_test_paths(temp_dir: &TempDir) -> Paths {
    Paths::from_dirs(
        temp_dir.path().join(".rsswitch"),
        temp_dir.path().join(".cargo"),
    )
}

/// Write raw TOML as the catalog
pub fn write_catalog(paths: &Paths, content: &str) {
    std::fs::create_dir_all(&paths.base_dir).unwrap();
    std::fs::write(&paths.sources_file, content).unwrap();
}

fn injected_failure() -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, "injected failure")
}

#[derive(Debug, Default)]
pub struct MemoryEnvStore {
    pub vars: BTreeMap<String, String>,
    pub writes: usize,
    /// Number of writes accepted before every further write fails
    fail_after: Option<usize>,
}

impl MemoryEnvStore {
    /// A store whose writes always fail
    pub fn failing() -> Self {
        Self::failing_after(0)
    }

    /// A store that accepts `writes` writes, then fails
    pub fn failing_after(writes: usize) -> Self {
        Self {
            fail_after: Some(writes),
            ..Default::default()
        }
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

impl EnvStore for MemoryEnvStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn get_var(&self, name: &str) -> io::Result<Option<String>> {
        Ok(self.vars.get(name).cloned())
    }

    fn set_var(&mut self, name: &str, value: &str) -> io::Result<()> {
        if self.fail_after.is_some_and(|limit| self.writes >= limit) {
            return Err(injected_failure());
        }
        self.writes += 1;
        self.vars.insert(name.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug)]
pub struct MemoryConfigSink {
    pub path: PathBuf,
    pub contents: Option<String>,
    pub writes: usize,
    fail: bool,
}

impl Default for MemoryConfigSink {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/memory/.cargo/config.toml"),
            contents: None,
            writes: 0,
            fail: false,
        }
    }
}

impl MemoryConfigSink {
    /// A sink whose writes always fail
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl ConfigSink for MemoryConfigSink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn replace(&mut self, contents: &str) -> io::Result<()> {
        if self.fail {
            return Err(injected_failure());
        }
        self.writes += 1;
        self.contents = Some(contents.to_string());
        Ok(())
    }
}
