use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the catalog, the writers and the switch engine
#[derive(Error, Debug)]
pub enum SwitchError {
    #[error("Source catalog not found: {}", path.display())]
    ConfigMissing { path: PathBuf },

    #[error("Source catalog could not be read: {}: {source}", path.display())]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source catalog is not valid TOML: {}\n{source}", path.display())]
    ConfigCorrupt {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Source '{name}' does not exist. Available sources: {}", display_names(available))]
    UnknownSource { name: String, available: Vec<String> },

    #[error("No current source is set in the catalog, please name a source")]
    NoCurrentSource,

    #[error("Failed to set environment variable {var} in {location}: {source}")]
    EnvWriteFailed {
        var: String,
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write cargo config {}: {source}", path.display())]
    ConfigWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to save source catalog {}: {source}", path.display())]
    CatalogWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to save switch history {}: {source}", path.display())]
    HistoryWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Switch history is unreadable: {}: {source}", path.display())]
    HistoryCorrupt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid override '{0}', expected KEY=VALUE")]
    InvalidOverrideSyntax(String),
}

fn display_names(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}
