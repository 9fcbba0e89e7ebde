//! Diagnostic tool for rsswitch.
//!
//! Implements `rsswitch doctor`, which checks an installation for the usual
//! ways it drifts out of sync:
//! - Missing base directory or catalog.
//! - A `current` pointer naming a source that no longer exists.
//! - An unreadable history file.
//! - A cargo config or persisted environment that no longer matches the
//!   active source (edited by hand, or a switch that failed half-way).

use anstyle::AnsiColor;

use crate::cargo_config::CargoConfigFile;
use crate::catalog::{Catalog, SourceRecord};
use crate::env_store::{DIST_SERVER_VAR, EnvStore, UPDATE_ROOT_VAR};
use crate::error::SwitchError;
use crate::history::History;
use crate::paths::Paths;
use crate::ui::Ui;

/// Run every check; returns how many failed
pub fn run_doctor(paths: &Paths, env: &dyn EnvStore, ui: &Ui) -> usize {
    ui.section("rsswitch Doctor");
    ui.newline();

    let mut failures = 0;
    let mut check = |name: &str, check_fn: &mut dyn FnMut() -> bool| {
        if !check_step(ui, name, check_fn) {
            failures += 1;
        }
    };

    check("Directories", &mut || {
        if paths.base_dir.is_dir() {
            ui.println(format!("  {} Base directory: {}", ui.icon_ok(), paths.base_dir.display()));
            true
        } else {
            ui.println(format!(
                "  {} Base directory missing: {}",
                ui.icon_err(),
                paths.base_dir.display()
            ));
            false
        }
    });

    let mut catalog: Option<Catalog> = None;
    check("Catalog", &mut || match Catalog::load(&paths.sources_file) {
        Ok(loaded) => {
            ui.println(format!(
                "  {} {} ({} sources)",
                ui.icon_ok(),
                paths.sources_file.display(),
                loaded.sources.len()
            ));
            if loaded.sources.is_empty() {
                ui.println(format!("  {} No sources defined", ui.icon_warn()));
            }
            catalog = Some(loaded);
            true
        }
        Err(SwitchError::ConfigMissing { path }) => {
            ui.println(format!("  {} Catalog missing: {}", ui.icon_err(), path.display()));
            false
        }
        Err(e) => {
            ui.println(format!("  {} {}", ui.icon_err(), e));
            false
        }
    });

    let active = catalog.as_ref().and_then(Catalog::current_record);
    check("Current Source", &mut || {
        let Some(catalog) = &catalog else {
            ui.println(format!("  {} Skipped (no catalog)", ui.icon_info()));
            return true;
        };
        match (&catalog.current, active) {
            (None, _) => {
                ui.println(format!("  {} No current source set (fresh install?)", ui.icon_warn()));
                true
            }
            (Some(name), Some(_)) => {
                ui.println(format!("  {} Current source: {}", ui.icon_ok(), name));
                true
            }
            (Some(name), None) => {
                ui.println(format!(
                    "  {} Current source '{}' is not in the catalog",
                    ui.icon_err(),
                    name
                ));
                false
            }
        }
    });

    check("History", &mut || match History::read(&paths.history_file) {
        Ok(None) => {
            ui.println(format!("  {} No history yet (no switch performed)", ui.icon_warn()));
            true
        }
        Ok(Some(history)) => {
            ui.println(format!(
                "  {} Last switch: '{}' -> '{}'",
                ui.icon_ok(),
                history.previous.name,
                history.current.name
            ));
            let pointer = catalog.as_ref().and_then(|c| c.current.as_deref());
            if let Some(current) = pointer.filter(|c| *c != history.current.name) {
                ui.println(format!(
                    "  {} History ends at '{}' but catalog points at '{}'",
                    ui.icon_warn(),
                    history.current.name,
                    current
                ));
            }
            true
        }
        Err(e) => {
            ui.println(format!("  {} {}", ui.icon_err(), e));
            false
        }
    });

    check("Cargo Config", &mut || check_cargo_config(paths, active, ui));

    check("Environment", &mut || check_environment(env, active, ui));

    failures
}

fn check_cargo_config(paths: &Paths, active: Option<&SourceRecord>, ui: &Ui) -> bool {
    let file = CargoConfigFile::new(paths.cargo_config.clone());
    let contents = match file.read() {
        Ok(contents) => contents,
        Err(e) => {
            ui.println(format!(
                "  {} Cannot read {}: {}",
                ui.icon_err(),
                paths.cargo_config.display(),
                e
            ));
            return false;
        }
    };

    match (contents, active.filter(|s| s.has_cargo_config())) {
        (None, None) => {
            ui.println(format!(
                "  {} {} does not exist",
                ui.icon_info(),
                paths.cargo_config.display()
            ));
            true
        }
        (None, Some(_)) => {
            ui.println(format!(
                "  {} {} is missing but the current source provides one",
                ui.icon_err(),
                paths.cargo_config.display()
            ));
            false
        }
        (Some(_), None) => {
            ui.println(format!(
                "  {} {} exists (not managed by the current source)",
                ui.icon_info(),
                paths.cargo_config.display()
            ));
            true
        }
        (Some(on_disk), Some(source)) if on_disk == source.cargo_config => {
            ui.println(format!(
                "  {} {} matches '{}'",
                ui.icon_ok(),
                paths.cargo_config.display(),
                source.name
            ));
            true
        }
        (Some(_), Some(source)) => {
            ui.println(format!(
                "  {} {} differs from '{}' (edited by hand?)",
                ui.icon_warn(),
                paths.cargo_config.display(),
                source.name
            ));
            ui.println(ui.colored(
                format!("    Re-apply with: rsswitch use {}", source.name),
                AnsiColor::Yellow,
            ));
            true
        }
    }
}

fn check_environment(env: &dyn EnvStore, active: Option<&SourceRecord>, ui: &Ui) -> bool {
    ui.println(format!("  {} Store: {}", ui.icon_info(), env.location()));
    let mut ok = true;

    for var in [DIST_SERVER_VAR, UPDATE_ROOT_VAR] {
        let expected = active
            .map(|s| match var {
                DIST_SERVER_VAR => s.dist_server.as_str(),
                _ => s.update_root.as_str(),
            })
            .filter(|v| !v.is_empty());

        match (env.get_var(var), expected) {
            (Err(e), _) => {
                ui.println(format!("  {} {} unreadable: {}", ui.icon_err(), var, e));
                ok = false;
            }
            (Ok(Some(value)), Some(expected)) if value != expected => {
                ui.println(format!(
                    "  {} {} = {} (source says {})",
                    ui.icon_err(),
                    var,
                    value,
                    expected
                ));
                ok = false;
            }
            (Ok(None), Some(expected)) => {
                ui.println(format!("  {} {} not set (source says {})", ui.icon_err(), var, expected));
                ok = false;
            }
            (Ok(Some(value)), _) => {
                ui.println(format!("  {} {} = {}", ui.icon_ok(), var, value));
            }
            (Ok(None), None) => {
                ui.println(format!("  {} {} not set", ui.icon_info(), var));
            }
        }
    }

    if let Ok(process_value) = std::env::var(DIST_SERVER_VAR) {
        if let Some(expected) = active.map(|s| s.dist_server.as_str()).filter(|v| !v.is_empty()) {
            if process_value != expected {
                ui.println(format!(
                    "  {} This shell still has {}={} (open a new shell)",
                    ui.icon_warn(),
                    DIST_SERVER_VAR,
                    process_value
                ));
            }
        }
    }

    ok
}

fn check_step(ui: &Ui, name: &str, check_fn: &mut dyn FnMut() -> bool) -> bool {
    ui.println(ui.bold(format!("Checking {}...", name)));
    let success = check_fn();
    if !success {
        ui.println(ui.colored("  Issues detected!", AnsiColor::Red));
    }
    ui.newline();
    success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryEnvStore, setup_test_paths, write_catalog};
    use crate::ui::ColorMode;
    use tempfile::TempDir;

    #[test]
    fn test_doctor_flags_missing_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = Ui::new(ColorMode::Never, true);

        let failures = run_doctor(&paths, &MemoryEnvStore::default(), &ui);

        // base dir + catalog
        assert_eq!(failures, 2);
    }

    #[test]
    fn test_doctor_flags_dangling_current() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        write_catalog(&paths, "current = \"ghost\"\n[sources.alpha]\n");
        let ui = Ui::new(ColorMode::Never, true);

        let failures = run_doctor(&paths, &MemoryEnvStore::default(), &ui);

        assert_eq!(failures, 1);
    }

    #[test]
    fn test_doctor_clean_after_consistent_state() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        write_catalog(
            &paths,
            "current = \"alpha\"\n[sources.alpha]\ndist_server = \"https://a\"\ncargo_config = \"X\"\n",
        );
        std::fs::create_dir_all(&paths.cargo_home).unwrap();
        std::fs::write(&paths.cargo_config, "X").unwrap();
        let mut env = MemoryEnvStore::default();
        env.vars.insert(DIST_SERVER_VAR.into(), "https://a".into());
        let ui = Ui::new(ColorMode::Never, true);

        assert_eq!(run_doctor(&paths, &env, &ui), 0);
    }

    #[test]
    fn test_doctor_flags_env_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        write_catalog(
            &paths,
            "current = \"alpha\"\n[sources.alpha]\ndist_server = \"https://a\"\n",
        );
        let mut env = MemoryEnvStore::default();
        env.vars.insert(DIST_SERVER_VAR.into(), "https://stale".into());
        let ui = Ui::new(ColorMode::Never, true);

        assert_eq!(run_doctor(&paths, &env, &ui), 1);
    }
}
