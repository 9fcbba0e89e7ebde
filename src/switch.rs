//! Source switching logic.
//!
//! This module implements the core mechanism of `rsswitch`: activating a
//! source. A switch walks through fixed stages:
//!
//! 1. Validating: load the catalog and check the requested name.
//! 2. Resolving: snapshot the previously active source, if any.
//! 3. Overriding: apply one-off overrides to a copy of the target.
//! 4. Publishing: environment variables first, then cargo's config file.
//! 5. Committing: move the catalog's `current` pointer, record history.
//!
//! Nothing external is touched before Publishing. Once publishing starts
//! there is no rollback: a failure reports which side effects already
//! happened and leaves them in place.

use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::cargo_config::{self, ConfigSink, ConfigWrite};
use crate::catalog::Catalog;
use crate::env_store::{self, EnvStore, Published};
use crate::error::SwitchError;
use crate::history::{self, Snapshot};
use crate::overrides::{AppliedOverrides, OverrideSet};

/// Engine state in which a switch stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Resolving,
    Overriding,
    Publishing,
    Committing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Resolving => "resolving",
            Stage::Overriding => "overriding",
            Stage::Publishing => "publishing",
            Stage::Committing => "committing",
        };
        f.write_str(name)
    }
}

/// An external side effect a switch has performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// One persistent environment variable was written
    EnvVarSet(&'static str),
    CargoConfigWritten,
    CatalogSaved,
    HistoryRecorded,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::EnvVarSet(var) => write!(f, "{} updated", var),
            Step::CargoConfigWritten => f.write_str("cargo config written"),
            Step::CatalogSaved => f.write_str("catalog pointer moved"),
            Step::HistoryRecorded => f.write_str("history recorded"),
        }
    }
}

/// A switch that stopped before `Done`
#[derive(Error, Debug)]
#[error("{error}")]
pub struct SwitchFailure {
    pub stage: Stage,
    /// Side effects that happened before the failure, in order
    pub completed: Vec<Step>,
    pub error: SwitchError,
}

impl SwitchFailure {
    /// True when nothing outside the process was modified
    pub fn is_clean(&self) -> bool {
        self.completed.is_empty()
    }
}

/// How the switch should be narrated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchKind {
    /// No history existed before this switch
    Initialization,
    /// `previous` is the source that was active, if any
    Switch { previous: Option<String> },
}

/// Everything a successful switch did
#[derive(Debug, Clone)]
pub struct SwitchReport {
    pub name: String,
    pub kind: SwitchKind,
    /// `current` named a source missing from the catalog
    pub dangling_previous: Option<String>,
    pub overrides: AppliedOverrides,
    pub applied: Snapshot,
    pub env: Published,
    pub env_location: String,
    pub cargo_config: ConfigWrite,
    pub completed: Vec<Step>,
}

/// Where the engine reads and writes
pub struct SwitchTargets<'a> {
    pub sources_file: &'a Path,
    pub history_file: &'a Path,
    pub env: &'a mut dyn EnvStore,
    pub cargo: &'a mut dyn ConfigSink,
}

struct Progress {
    stage: Stage,
    completed: Vec<Step>,
}

impl Progress {
    fn enter(&mut self, stage: Stage) {
        debug!(%stage, "switch stage");
        self.stage = stage;
    }

    fn fail(&self, error: SwitchError) -> SwitchFailure {
        SwitchFailure {
            stage: self.stage,
            completed: self.completed.clone(),
            error,
        }
    }
}

/// Activate the source called `name`
pub fn switch_source(
    targets: SwitchTargets<'_>,
    name: &str,
    overrides: &OverrideSet,
) -> Result<SwitchReport, SwitchFailure> {
    let mut progress = Progress {
        stage: Stage::Validating,
        completed: Vec::new(),
    };

    // Validating
    let mut catalog = Catalog::load(targets.sources_file).map_err(|e| progress.fail(e))?;
    let mut target = catalog.resolve(name).map_err(|e| progress.fail(e))?.clone();

    // Resolving
    progress.enter(Stage::Resolving);
    let previous_name = catalog.current.clone();
    let previous = catalog.current_record().map(Snapshot::of);
    let dangling_previous = previous_name.clone().filter(|_| previous.is_none());
    if let Some(dangling) = &dangling_previous {
        info!(current = %dangling, "catalog points at a missing source, treating previous as empty");
    }
    let kind = if history::has_history(targets.history_file) {
        SwitchKind::Switch {
            previous: previous.as_ref().map(|p| p.name.clone()),
        }
    } else {
        SwitchKind::Initialization
    };

    // Overriding
    progress.enter(Stage::Overriding);
    if !overrides.is_empty() {
        debug!(count = overrides.len(), source = name, "applying one-off overrides");
    }
    let applied_overrides = overrides.apply(&mut target);
    for key in &applied_overrides.ignored {
        debug!(key = %key, "override does not name a source field, ignored");
    }
    let applied = Snapshot::of(&target);

    // Publishing
    progress.enter(Stage::Publishing);
    let env_location = targets.env.location();
    let mut env = Published::default();
    let published = env_store::publish(
        targets.env,
        &target.dist_server,
        &target.update_root,
        &mut env,
    );
    progress
        .completed
        .extend(env.set.iter().map(|(var, _)| Step::EnvVarSet(*var)));
    published.map_err(|e| progress.fail(e))?;

    let cargo_config = cargo_config::write_config(targets.cargo, &target.cargo_config)
        .map_err(|e| progress.fail(e))?;
    if matches!(cargo_config, ConfigWrite::Written(_)) {
        progress.completed.push(Step::CargoConfigWritten);
    }

    // Committing
    progress.enter(Stage::Committing);
    catalog.current = Some(name.to_string());
    catalog
        .save(targets.sources_file)
        .map_err(|e| progress.fail(e))?;
    progress.completed.push(Step::CatalogSaved);

    history::record(targets.history_file, previous.as_ref(), &applied)
        .map_err(|e| progress.fail(e))?;
    progress.completed.push(Step::HistoryRecorded);

    info!(source = name, ?kind, "switch complete");
    Ok(SwitchReport {
        name: name.to_string(),
        kind,
        dangling_previous,
        overrides: applied_overrides,
        applied,
        env,
        env_location,
        cargo_config,
        completed: progress.completed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::History;
    use crate::test_utils::{MemoryConfigSink, MemoryEnvStore, setup_test_paths, write_catalog};
    use crate::env_store::{DIST_SERVER_VAR, UPDATE_ROOT_VAR};
    use crate::paths::Paths;
    use tempfile::TempDir;

    const ALPHA_BETA: &str = r#"
[sources.alpha]
dist_server = "https://a"
cargo_config = "X"

[sources.beta]
dist_server = "https://b"
cargo_config = "Y"
"#;

    struct Fixture {
        _temp_dir: TempDir,
        paths: Paths,
        env: MemoryEnvStore,
        cargo: MemoryConfigSink,
    }

    impl Fixture {
        fn new(catalog: &str) -> Self {
            let temp_dir = TempDir::new().unwrap();
            let paths = setup_test_paths(&temp_dir);
            write_catalog(&paths, catalog);
            Self {
                _temp_dir: temp_dir,
                paths,
                env: MemoryEnvStore::default(),
                cargo: MemoryConfigSink::default(),
            }
        }

        fn switch(&mut self, name: &str, overrides: &[&str]) -> Result<SwitchReport, SwitchFailure> {
            let overrides = OverrideSet::parse(overrides).unwrap();
            switch_source(
                SwitchTargets {
                    sources_file: &self.paths.sources_file,
                    history_file: &self.paths.history_file,
                    env: &mut self.env,
                    cargo: &mut self.cargo,
                },
                name,
                &overrides,
            )
        }

        fn catalog(&self) -> Catalog {
            Catalog::load(&self.paths.sources_file).unwrap()
        }

        fn history(&self) -> History {
            History::read(&self.paths.history_file).unwrap().unwrap()
        }
    }

    #[test]
    fn test_first_switch_initializes() {
        let mut fx = Fixture::new(ALPHA_BETA);

        let report = fx.switch("alpha", &[]).unwrap();

        assert_eq!(report.kind, SwitchKind::Initialization);
        assert_eq!(fx.env.value(DIST_SERVER_VAR), Some("https://a"));
        assert_eq!(fx.env.value(UPDATE_ROOT_VAR), None);
        assert_eq!(fx.cargo.contents.as_deref(), Some("X"));
        assert_eq!(fx.catalog().current.as_deref(), Some("alpha"));

        let history = fx.history();
        assert!(history.previous.is_empty());
        assert_eq!(history.current.name, "alpha");
        assert_eq!(history.current.dist_server, "https://a");
        assert_eq!(history.current.cargo_config, "X");
        assert_eq!(
            report.completed,
            vec![
                Step::EnvVarSet(DIST_SERVER_VAR),
                Step::CargoConfigWritten,
                Step::CatalogSaved,
                Step::HistoryRecorded
            ]
        );
    }

    #[test]
    fn test_override_is_published_but_not_persisted() {
        let mut fx = Fixture::new(ALPHA_BETA);
        fx.switch("alpha", &[]).unwrap();

        let report = fx.switch("beta", &["dist_server=https://override"]).unwrap();

        assert_eq!(
            report.kind,
            SwitchKind::Switch {
                previous: Some("alpha".into())
            }
        );
        assert_eq!(fx.env.value(DIST_SERVER_VAR), Some("https://override"));
        assert_eq!(fx.cargo.contents.as_deref(), Some("Y"));

        let catalog = fx.catalog();
        assert_eq!(catalog.current.as_deref(), Some("beta"));
        assert_eq!(catalog.resolve("beta").unwrap().dist_server, "https://b");

        let history = fx.history();
        assert_eq!(history.previous.name, "alpha");
        assert_eq!(history.previous.dist_server, "https://a");
        assert_eq!(history.previous.cargo_config, "X");
        assert_eq!(history.current.name, "beta");
        assert_eq!(history.current.dist_server, "https://override");
        assert_eq!(history.current.cargo_config, "Y");
    }

    #[test]
    fn test_unknown_source_aborts_cleanly() {
        let mut fx = Fixture::new(ALPHA_BETA);
        fx.switch("alpha", &[]).unwrap();
        let writes_before = fx.env.writes;

        let failure = fx.switch("gamma", &[]).unwrap_err();

        assert!(matches!(failure.error, SwitchError::UnknownSource { .. }));
        assert_eq!(failure.stage, Stage::Validating);
        assert!(failure.is_clean());
        assert_eq!(fx.env.writes, writes_before);
        assert_eq!(fx.catalog().current.as_deref(), Some("alpha"));
    }

    #[test]
    fn test_missing_catalog_is_config_missing() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let mut env = MemoryEnvStore::default();
        let mut cargo = MemoryConfigSink::default();

        let failure = switch_source(
            SwitchTargets {
                sources_file: &paths.sources_file,
                history_file: &paths.history_file,
                env: &mut env,
                cargo: &mut cargo,
            },
            "alpha",
            &OverrideSet::default(),
        )
        .unwrap_err();

        assert!(matches!(failure.error, SwitchError::ConfigMissing { .. }));
        assert!(failure.is_clean());
    }

    #[test]
    fn test_unknown_override_key_is_a_warning() {
        let mut fx = Fixture::new(ALPHA_BETA);

        let report = fx.switch("alpha", &["mirror=https://m"]).unwrap();

        assert_eq!(report.overrides.ignored, vec!["mirror"]);
        assert!(report.overrides.applied.is_empty());
        assert_eq!(report.applied.dist_server, "https://a");
        assert_eq!(report.applied.cargo_config, "X");
        assert_eq!(fx.env.value(DIST_SERVER_VAR), Some("https://a"));
    }

    #[test]
    fn test_reswitch_reproduces_same_writes() {
        let mut fx = Fixture::new(ALPHA_BETA);
        fx.switch("alpha", &[]).unwrap();
        let env_first = fx.env.vars.clone();
        let cargo_first = fx.cargo.contents.clone();

        fx.switch("beta", &["cargo_config=Z"]).unwrap();
        fx.switch("alpha", &[]).unwrap();

        assert_eq!(fx.env.vars, env_first);
        assert_eq!(fx.cargo.contents, cargo_first);
        let history = fx.history();
        assert_eq!(history.previous.cargo_config, "Y");
    }

    #[test]
    fn test_dangling_current_is_treated_as_no_previous() {
        let mut fx = Fixture::new(&format!("current = \"ghost\"\n{ALPHA_BETA}"));

        let report = fx.switch("beta", &[]).unwrap();

        assert_eq!(report.dangling_previous.as_deref(), Some("ghost"));
        assert!(fx.history().previous.is_empty());
        assert_eq!(fx.catalog().current.as_deref(), Some("beta"));
    }

    #[test]
    fn test_empty_fields_skip_writes() {
        let mut fx = Fixture::new(
            r#"
[sources.full]
dist_server = "https://f"
update_root = "https://f/rustup"
cargo_config = "F"

[sources.bare]
"#,
        );
        fx.switch("full", &[]).unwrap();

        let report = fx.switch("bare", &[]).unwrap();

        assert_eq!(report.env.skipped, vec![DIST_SERVER_VAR, UPDATE_ROOT_VAR]);
        assert_eq!(report.cargo_config, ConfigWrite::Skipped);
        assert_eq!(fx.env.value(DIST_SERVER_VAR), Some("https://f"));
        assert_eq!(fx.cargo.contents.as_deref(), Some("F"));
        assert_eq!(report.completed, vec![Step::CatalogSaved, Step::HistoryRecorded]);
    }

    #[test]
    fn test_env_failure_stops_before_anything_is_written() {
        let mut fx = Fixture::new(ALPHA_BETA);
        fx.env = MemoryEnvStore::failing();

        let failure = fx.switch("alpha", &[]).unwrap_err();

        assert!(matches!(failure.error, SwitchError::EnvWriteFailed { .. }));
        assert_eq!(failure.stage, Stage::Publishing);
        assert!(failure.is_clean());
        assert_eq!(fx.cargo.writes, 0);
        assert_eq!(fx.catalog().current, None);
        assert!(!fx.paths.history_file.exists());
    }

    #[test]
    fn test_cargo_failure_leaves_env_published() {
        let mut fx = Fixture::new(ALPHA_BETA);
        fx.switch("alpha", &[]).unwrap();
        fx.cargo = MemoryConfigSink::failing();

        let failure = fx.switch("beta", &[]).unwrap_err();

        assert!(matches!(failure.error, SwitchError::ConfigWriteFailed { .. }));
        assert_eq!(failure.stage, Stage::Publishing);
        assert_eq!(failure.completed, vec![Step::EnvVarSet(DIST_SERVER_VAR)]);
        assert_eq!(fx.env.value(DIST_SERVER_VAR), Some("https://b"));
        assert_eq!(fx.catalog().current.as_deref(), Some("alpha"));
        assert_eq!(fx.history().current.name, "alpha");
    }

    #[test]
    fn test_second_env_write_failure_reports_first_variable() {
        let mut fx = Fixture::new(
            r#"
[sources.full]
dist_server = "https://a"
update_root = "https://a/rustup"
cargo_config = "X"
"#,
        );
        fx.env = MemoryEnvStore::failing_after(1);

        let failure = fx.switch("full", &[]).unwrap_err();

        assert!(matches!(
            failure.error,
            SwitchError::EnvWriteFailed { ref var, .. } if var == UPDATE_ROOT_VAR
        ));
        assert_eq!(failure.stage, Stage::Publishing);
        assert_eq!(failure.completed, vec![Step::EnvVarSet(DIST_SERVER_VAR)]);
        assert!(!failure.is_clean());
        assert_eq!(fx.env.value(DIST_SERVER_VAR), Some("https://a"));
        assert_eq!(fx.cargo.writes, 0);
        assert_eq!(fx.catalog().current, None);
    }

    #[test]
    fn test_cargo_failure_without_env_values_is_clean() {
        let mut fx = Fixture::new("[sources.cargo_only]\ncargo_config = \"X\"\n");
        fx.cargo = MemoryConfigSink::failing();

        let failure = fx.switch("cargo_only", &[]).unwrap_err();

        assert!(matches!(failure.error, SwitchError::ConfigWriteFailed { .. }));
        assert_eq!(fx.env.writes, 0);
        assert!(failure.completed.is_empty());
        assert!(failure.is_clean());
    }

    #[test]
    fn test_step_display_names_the_variable() {
        assert_eq!(
            Step::EnvVarSet(UPDATE_ROOT_VAR).to_string(),
            "RUSTUP_UPDATE_ROOT updated"
        );
        assert_eq!(Step::CatalogSaved.to_string(), "catalog pointer moved");
    }

    #[test]
    fn test_every_catalog_source_becomes_current() {
        let mut fx = Fixture::new(
            r#"
[sources.one]
dist_server = "https://1"
[sources.two]
[sources.three]
cargo_config = "3"
"#,
        );
        for name in ["one", "two", "three", "one"] {
            fx.switch(name, &[]).unwrap();
            assert_eq!(fx.catalog().current.as_deref(), Some(name));
            assert_eq!(fx.history().current.name, name);
        }
    }
}
