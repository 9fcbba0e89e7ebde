//! Persistent, user-scoped environment variables for rustup.
//!
//! The values written here are picked up by the *next* shell session, never
//! by the running one. On Windows the store is the `HKCU\Environment`
//! registry key; elsewhere it is a small POSIX shell file of `export` lines
//! that the operator sources from their shell profile.

use std::io;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::SwitchError;
use crate::fs_utils::atomic_write;
use crate::paths::Paths;

pub const DIST_SERVER_VAR: &str = "RUSTUP_DIST_SERVER";
pub const UPDATE_ROOT_VAR: &str = "RUSTUP_UPDATE_ROOT";

/// A persistent key-value store outside the current process
pub trait EnvStore {
    /// Human-readable location, used in messages
    fn location(&self) -> String;

    fn get_var(&self, name: &str) -> io::Result<Option<String>>;

    fn set_var(&mut self, name: &str, value: &str) -> io::Result<()>;
}

/// Variables written and skipped by one [`publish`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Published {
    pub set: Vec<(&'static str, String)>,
    /// Variables left as they were because the source gave no value
    pub skipped: Vec<&'static str>,
}

/// Write the rustup endpoint variables
///
/// Empty values are skipped, not cleared: whatever an earlier source set
/// stays in place. `published` is filled as each variable lands, so after an
/// error it still lists the variables that were written before it.
pub fn publish(
    store: &mut dyn EnvStore,
    dist_server: &str,
    update_root: &str,
    published: &mut Published,
) -> Result<(), SwitchError> {
    for (var, value) in [(DIST_SERVER_VAR, dist_server), (UPDATE_ROOT_VAR, update_root)] {
        if value.is_empty() {
            debug!(var, "no value in source, leaving variable untouched");
            published.skipped.push(var);
            continue;
        }
        store
            .set_var(var, value)
            .map_err(|source| SwitchError::EnvWriteFailed {
                var: var.to_string(),
                location: store.location(),
                source,
            })?;
        info!(var, value, location = %store.location(), "environment variable set");
        published.set.push((var, value.to_string()));
    }
    Ok(())
}

/// The platform's persistent environment store
pub fn default_store(paths: &Paths) -> Box<dyn EnvStore> {
    #[cfg(windows)]
    {
        let _ = paths;
        Box::new(RegistryEnvStore)
    }

    #[cfg(not(windows))]
    {
        Box::new(ShellEnvFile::new(paths.env_file.clone()))
    }
}

// -----------------------------------------------------------------------------
// Windows: HKEY_CURRENT_USER\Environment
// -----------------------------------------------------------------------------

#[cfg(windows)]
pub struct RegistryEnvStore;

#[cfg(windows)]
impl RegistryEnvStore {
    const SUBKEY: &'static str = "Environment";

    fn open(flags: u32) -> io::Result<winreg::RegKey> {
        winreg::RegKey::predef(winreg::enums::HKEY_CURRENT_USER)
            .open_subkey_with_flags(Self::SUBKEY, flags)
    }
}

#[cfg(windows)]
impl EnvStore for RegistryEnvStore {
    fn location(&self) -> String {
        format!("HKEY_CURRENT_USER\\{}", Self::SUBKEY)
    }

    fn get_var(&self, name: &str) -> io::Result<Option<String>> {
        let key = Self::open(winreg::enums::KEY_READ)?;
        match key.get_value::<String, _>(name) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_var(&mut self, name: &str, value: &str) -> io::Result<()> {
        let key = Self::open(winreg::enums::KEY_READ | winreg::enums::KEY_WRITE)?;
        key.set_value(name, &value.to_string())
    }
}

// -----------------------------------------------------------------------------
// POSIX: sourced shell file
// -----------------------------------------------------------------------------

/// A shell fragment of `export NAME="value"` lines
///
/// Lines that do not export a variable (comments, other exports) are kept
/// as they are when a variable is updated.
#[derive(Debug, Clone)]
pub struct ShellEnvFile {
    path: PathBuf,
}

impl ShellEnvFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_lines(&self) -> io::Result<Vec<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

impl EnvStore for ShellEnvFile {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn get_var(&self, name: &str) -> io::Result<Option<String>> {
        Ok(self
            .read_lines()?
            .iter()
            .rev()
            .find_map(|line| parse_export(line).filter(|(n, _)| *n == name).map(|(_, v)| v)))
    }

    fn set_var(&mut self, name: &str, value: &str) -> io::Result<()> {
        let mut lines = self.read_lines()?;
        let rendered = format!("export {}={}", name, quote(value));

        let mut replaced = false;
        lines.retain_mut(|line| {
            if parse_export(line).is_some_and(|(n, _)| n == name) {
                if replaced {
                    return false;
                }
                *line = rendered.clone();
                replaced = true;
            }
            true
        });
        if !replaced {
            if lines.is_empty() {
                lines.push("# Managed by rsswitch. Source this file from your shell profile.".into());
            }
            lines.push(rendered);
        }

        let mut content = lines.join("\n");
        content.push('\n');
        atomic_write(&self.path, &content)
    }
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn parse_export(line: &str) -> Option<(&str, String)> {
    let rest = line.trim().strip_prefix("export ")?;
    let (name, raw) = rest.split_once('=')?;
    let raw = raw.trim();
    let value = if let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(c);
            }
        }
        out
    } else if let Some(inner) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        inner.to_string()
    } else {
        raw.to_string()
    };
    Some((name.trim(), value))
}
