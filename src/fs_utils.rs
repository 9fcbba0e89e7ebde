//! Filesystem utility functions
//!
//! Every file rsswitch owns (catalog, history, POSIX env file) and the cargo
//! config it manages is replaced wholesale, never edited in place.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Replace the contents of `path` with `contents`
///
/// The parent directory is created if missing. The data is written to a
/// sibling `*.tmp` file first and then renamed over the target, so readers
/// see either the old file or the new one.
pub fn atomic_write(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_sibling(path);
    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(&temp_path);
    })
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("rsswitch"));
    name.push(".tmp");
    path.with_file_name(name)
}
