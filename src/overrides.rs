//! One-off field overrides supplied with `--override KEY=VALUE`.
//!
//! Overrides are applied to a copy of the resolved source right before it is
//! published. They are never written back to the catalog.

use std::str::FromStr;

use crate::catalog::SourceRecord;
use crate::error::SwitchError;

/// A source field that can be overridden from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    DistServer,
    UpdateRoot,
    CargoConfig,
}

impl Field {
    pub fn all() -> [Field; 3] {
        [Field::DistServer, Field::UpdateRoot, Field::CargoConfig]
    }

    /// Canonical key, as used in `sources.toml`
    pub fn key(&self) -> &'static str {
        match self {
            Field::DistServer => "dist_server",
            Field::UpdateRoot => "update_root",
            Field::CargoConfig => "cargo_config",
        }
    }

    fn slot<'a>(&self, record: &'a mut SourceRecord) -> &'a mut String {
        match self {
            Field::DistServer => &mut record.dist_server,
            Field::UpdateRoot => &mut record.update_root,
            Field::CargoConfig => &mut record.cargo_config,
        }
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dist_server" | "rustup_dist_server" => Ok(Field::DistServer),
            "update_root" | "rustup_update_root" => Ok(Field::UpdateRoot),
            "cargo_config" => Ok(Field::CargoConfig),
            _ => Err(format!("unknown source field: {}", s)),
        }
    }
}

/// Ordered list of `(key, value)` pairs as typed by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideSet {
    entries: Vec<(String, String)>,
}

/// What [`OverrideSet::apply`] did to a record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedOverrides {
    /// Canonical field key and the value it now holds
    pub applied: Vec<(&'static str, String)>,
    /// Keys that matched no overridable field
    pub ignored: Vec<String>,
}

impl OverrideSet {
    /// Parse `KEY=VALUE` arguments; keys and values are trimmed and the value
    /// may itself contain `=`
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, SwitchError> {
        let mut entries = Vec::with_capacity(args.len());
        for arg in args {
            let arg = arg.as_ref();
            let (key, value) = arg
                .split_once('=')
                .ok_or_else(|| SwitchError::InvalidOverrideSyntax(arg.to_string()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(SwitchError::InvalidOverrideSyntax(arg.to_string()));
            }
            entries.push((key.to_string(), value.trim().to_string()));
        }
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Keys that name no overridable field, in argument order
    pub fn unknown_keys(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|(key, _)| key.as_str())
            .filter(|key| key.parse::<Field>().is_err())
            .collect()
    }

    /// Apply every override to `record` in argument order
    ///
    /// Later entries for the same field win. Unknown keys leave the record
    /// untouched and are reported back instead of failing.
    pub fn apply(&self, record: &mut SourceRecord) -> AppliedOverrides {
        let mut outcome = AppliedOverrides::default();
        for (key, value) in &self.entries {
            match key.parse::<Field>() {
                Ok(field) => {
                    *field.slot(record) = value.clone();
                    outcome.applied.push((field.key(), value.clone()));
                }
                Err(_) => outcome.ignored.push(key.clone()),
            }
        }
        outcome
    }
}
