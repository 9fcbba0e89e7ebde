use anyhow::{Context, Result};
use directories::BaseDirs;
use std::path::PathBuf;

/// Environment variable that relocates the rsswitch base directory
pub const HOME_ENV: &str = "RSSWITCH_HOME";

/// All computed paths used by rsswitch
#[derive(Debug, Clone)]
pub struct Paths {
    /// ~/.rsswitch (or $RSSWITCH_HOME)
    pub base_dir: PathBuf,
    /// ~/.rsswitch/sources.toml
    pub sources_file: PathBuf,
    /// ~/.rsswitch/history.toml
    pub history_file: PathBuf,
    /// ~/.rsswitch/env, sourced by POSIX shells
    pub env_file: PathBuf,
    /// $CARGO_HOME or ~/.cargo
    pub cargo_home: PathBuf,
    /// $CARGO_HOME/config.toml
    pub cargo_config: PathBuf,
}

impl Paths {
    /// Resolve paths from the environment, optionally forcing the base directory
    pub fn new(base_override: Option<PathBuf>) -> Result<Self> {
        let base_dirs = BaseDirs::new().context("Failed to determine home directory")?;
        let home = base_dirs.home_dir();

        let base_dir = base_override
            .or_else(|| non_empty_env(HOME_ENV).map(PathBuf::from))
            .unwrap_or_else(|| home.join(".rsswitch"));
        let cargo_home = non_empty_env("CARGO_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".cargo"));

        Ok(Self::from_dirs(base_dir, cargo_home))
    }

    /// Build the layout from an explicit base directory and cargo home
    pub fn from_dirs(base_dir: PathBuf, cargo_home: PathBuf) -> Self {
        Self {
            sources_file: base_dir.join("sources.toml"),
            history_file: base_dir.join("history.toml"),
            env_file: base_dir.join("env"),
            cargo_config: cargo_home.join("config.toml"),
            base_dir,
            cargo_home,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
