//! High-level command orchestration for the CLI.
//!
//! Each function here corresponds to a subcommand in `main.rs`. They load
//! state through `crate::catalog` and `crate::history`, hand switches to
//! `crate::switch`, and render everything through `crate::ui`.

use anstyle::AnsiColor;
use anyhow::{Context, Result, anyhow};
use inquire::{InquireError, Select};
use std::fmt;
use std::io;

use crate::cargo_config::{CargoConfigFile, ConfigWrite};
use crate::catalog::Catalog;
use crate::doctor::run_doctor;
use crate::env_store::{self, DIST_SERVER_VAR, UPDATE_ROOT_VAR};
use crate::error::SwitchError;
use crate::history::{self, History, Snapshot};
use crate::overrides::{Field, OverrideSet};
use crate::paths::Paths;
use crate::switch::{Step, SwitchFailure, SwitchKind, SwitchReport, SwitchTargets, switch_source};
use crate::ui::Ui;

/// Load the catalog, adding a hint when it has not been created yet
fn load_catalog(paths: &Paths) -> Result<Catalog> {
    match Catalog::load(&paths.sources_file) {
        Ok(catalog) => Ok(catalog),
        Err(e @ SwitchError::ConfigMissing { .. }) => Err(anyhow!(
            "{}\nHint: create it with at least one [sources.<name>] table",
            e
        )),
        Err(e) => Err(e.into()),
    }
}

/// List all sources in the catalog
pub fn list(paths: &Paths, json: bool, ui: &Ui) -> Result<()> {
    let catalog = load_catalog(paths)?;
    let current = catalog.current.as_deref();

    if json {
        let entries: Vec<_> = catalog
            .sources
            .values()
            .map(|s| {
                serde_json::json!({
                    "name": s.name,
                    "current": Some(s.name.as_str()) == current,
                    "dist_server": s.dist_server,
                    "update_root": s.update_root,
                    "has_cargo_config": s.has_cargo_config(),
                })
            })
            .collect();
        ui.println(serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if catalog.sources.is_empty() {
        ui.warn("No sources configured.");
        ui.hint(format!("Add a [sources.<name>] table to {}", paths.sources_file.display()));
        return Ok(());
    }

    let mut table = ui.table();
    table.set_header(vec![
        ui.header_cell(""),
        ui.header_cell("Source"),
        ui.header_cell(DIST_SERVER_VAR),
        ui.header_cell(UPDATE_ROOT_VAR),
        ui.header_cell("Cargo config"),
    ]);

    for source in catalog.sources.values() {
        let is_active = Some(source.name.as_str()) == current;
        let name_cell = if is_active {
            ui.colored_cell(format!("{} (current)", source.name), AnsiColor::Green)
        } else {
            ui.cell(&source.name)
        };
        table.add_row(vec![
            ui.cell(if is_active { ui.icon_ok() } else { " " }),
            name_cell,
            ui.value_cell(&source.dist_server),
            ui.value_cell(&source.update_root),
            ui.cell(if source.has_cargo_config() { "yes" } else { "-" }),
        ]);
    }

    ui.section("Sources");
    ui.println(table.to_string());

    if let Some(name) = current.filter(|_| catalog.has_dangling_current()) {
        ui.warn(format!("Current source '{}' is not in the catalog", name));
    }
    Ok(())
}

/// Show the active source, its endpoints and what is actually persisted
pub fn current(paths: &Paths, json: bool, ui: &Ui) -> Result<()> {
    let catalog = load_catalog(paths)?;

    let Some(name) = catalog.current.as_deref() else {
        if json {
            ui.println("null");
        } else {
            ui.warn("No current source set.");
            ui.hint("Pick one with: rsswitch use <name>  or  rsswitch select");
        }
        return Ok(());
    };

    let source = catalog.resolve(name).with_context(|| {
        format!(
            "Current source '{}' is missing from {}.\nHint: run 'rsswitch use <name>' to pick another source.",
            name,
            paths.sources_file.display()
        )
    })?;

    let store = env_store::default_store(paths);
    let persisted = |var: &str, expected: &str| Persisted::classify(store.get_var(var), expected);
    let last_switched = History::read(&paths.history_file)
        .ok()
        .flatten()
        .and_then(|h| h.recorded_at);

    if json {
        let value = serde_json::json!({
            "name": source.name,
            "dist_server": source.dist_server,
            "update_root": source.update_root,
            "has_cargo_config": source.has_cargo_config(),
            "cargo_config_path": paths.cargo_config,
            "last_switched": last_switched,
            "persisted": {
                DIST_SERVER_VAR: persisted(DIST_SERVER_VAR, &source.dist_server).to_json(),
                UPDATE_ROOT_VAR: persisted(UPDATE_ROOT_VAR, &source.update_root).to_json(),
            },
        });
        ui.println(serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    ui.section(format!("Current source: {}", source.name));
    ui.newline();

    let mut table = ui.simple_table();
    table.add_row(vec![ui.cell(format!("{}:", DIST_SERVER_VAR)), ui.value_cell(&source.dist_server)]);
    table.add_row(vec![ui.cell(format!("{}:", UPDATE_ROOT_VAR)), ui.value_cell(&source.update_root)]);
    table.add_row(vec![
        ui.cell("Cargo config:"),
        ui.cell(format!(
            "{}{}",
            paths.cargo_config.display(),
            if source.has_cargo_config() { "" } else { " (not managed by this source)" }
        )),
    ]);
    if let Some(at) = last_switched {
        table.add_row(vec![
            ui.cell("Last switched:"),
            ui.cell(at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        ]);
    }
    ui.println(table.to_string());

    ui.newline();
    ui.section(format!("Persisted environment ({})", store.location()));
    let mut env_table = ui.simple_table();
    for (var, expected) in [
        (DIST_SERVER_VAR, &source.dist_server),
        (UPDATE_ROOT_VAR, &source.update_root),
    ] {
        let cell = match persisted(var, expected) {
            Persisted::Unreadable(e) => ui.colored_cell(format!("unreadable: {}", e), AnsiColor::Red),
            Persisted::NotSet => ui.colored_cell("(not set)", AnsiColor::Yellow),
            Persisted::Differs(v) => {
                ui.colored_cell(format!("{} (differs from source)", v), AnsiColor::Yellow)
            }
            Persisted::Matches(v) => ui.cell(v),
        };
        env_table.add_row(vec![ui.cell(format!("{}:", var)), cell]);
    }
    ui.println(env_table.to_string());
    Ok(())
}

/// A persisted variable as seen by `current`
#[derive(Debug, PartialEq, Eq)]
enum Persisted {
    Unreadable(String),
    NotSet,
    Differs(String),
    /// Equal to the source's value, or the source sets none
    Matches(String),
}

impl Persisted {
    fn classify(value: io::Result<Option<String>>, expected: &str) -> Self {
        match value {
            Err(e) => Persisted::Unreadable(e.to_string()),
            Ok(None) => Persisted::NotSet,
            Ok(Some(v)) if !expected.is_empty() && v != expected => Persisted::Differs(v),
            Ok(Some(v)) => Persisted::Matches(v),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Persisted::Unreadable(e) => serde_json::json!({ "error": e }),
            Persisted::NotSet => serde_json::Value::Null,
            Persisted::Differs(v) | Persisted::Matches(v) => serde_json::json!(v),
        }
    }
}

/// Switch to `name`, or re-apply the catalog's current source when `None`
pub fn use_source(paths: &Paths, name: Option<&str>, overrides: &[String], ui: &Ui) -> Result<()> {
    let overrides = OverrideSet::parse(overrides)?;

    let name = match name {
        Some(name) => name.to_string(),
        None => {
            let catalog = load_catalog(paths)?;
            let current = catalog.current.ok_or(SwitchError::NoCurrentSource)?;
            ui.info(format!("Using configured current source '{}'", current));
            current
        }
    };

    run_switch(paths, &name, &overrides, ui)
}

/// An entry in the interactive source picker
struct SourceChoice {
    name: String,
    dist_server: String,
    is_current: bool,
}

impl fmt::Display for SourceChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.is_current {
            write!(f, " (current)")?;
        }
        if !self.dist_server.is_empty() {
            write!(f, "  [{}]", self.dist_server)?;
        }
        Ok(())
    }
}

/// Pick a source interactively, then switch to it
pub fn select(paths: &Paths, overrides: &[String], ui: &Ui) -> Result<()> {
    let overrides = OverrideSet::parse(overrides)?;
    let catalog = load_catalog(paths)?;

    if catalog.sources.is_empty() {
        ui.warn("No sources configured.");
        return Ok(());
    }

    let current = catalog.current.as_deref();
    let choices: Vec<SourceChoice> = catalog
        .sources
        .values()
        .map(|s| SourceChoice {
            name: s.name.clone(),
            dist_server: s.dist_server.clone(),
            is_current: Some(s.name.as_str()) == current,
        })
        .collect();
    let cursor = choices.iter().position(|c| c.is_current).unwrap_or(0);

    let picked = Select::new("Which source should be active?", choices)
        .with_starting_cursor(cursor)
        .with_help_message("↑↓ to move, Enter to switch, Esc to cancel")
        .prompt();

    match picked {
        Ok(choice) => run_switch(paths, &choice.name, &overrides, ui),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
            ui.info("Selection cancelled, nothing was changed");
            Ok(())
        }
        Err(e) => Err(e).context("Source selection failed"),
    }
}

/// Warn about override keys the switch will ignore, whatever its outcome
fn warn_unknown_overrides(overrides: &OverrideSet, ui: &Ui) {
    let unknown = overrides.unknown_keys();
    if unknown.is_empty() {
        return;
    }
    for key in unknown {
        ui.warn(format!("Override '{}' is not a source field, ignored", key));
    }
    let valid: Vec<_> = Field::all().iter().map(Field::key).collect();
    ui.hint(format!("Overridable fields: {}", valid.join(", ")));
}

fn run_switch(paths: &Paths, name: &str, overrides: &OverrideSet, ui: &Ui) -> Result<()> {
    warn_unknown_overrides(overrides, ui);

    let mut env = env_store::default_store(paths);
    let mut cargo = CargoConfigFile::new(paths.cargo_config.clone());

    let verb = if history::has_history(&paths.history_file) {
        "Switching to"
    } else {
        "Initializing"
    };
    let spinner = ui.spinner(format!("{} source '{}'...", verb, name));

    let result = switch_source(
        SwitchTargets {
            sources_file: &paths.sources_file,
            history_file: &paths.history_file,
            env: env.as_mut(),
            cargo: &mut cargo,
        },
        name,
        overrides,
    );

    match result {
        Ok(report) => {
            let headline = match report.kind {
                SwitchKind::Initialization => format!("Initialized source '{}'", report.name),
                SwitchKind::Switch { .. } => format!("Switched to source '{}'", report.name),
            };
            ui.spinner_finish_ok(&spinner, headline);
            print_report(paths, &report, ui);
            Ok(())
        }
        Err(failure) => {
            ui.spinner_finish_err(
                &spinner,
                format!("Switch to '{}' failed while {}", name, failure.stage),
            );
            print_partial_failure(&failure, ui);
            Err(failure.into())
        }
    }
}

fn print_report(paths: &Paths, report: &SwitchReport, ui: &Ui) {
    if let Some(dangling) = &report.dangling_previous {
        ui.warn(format!(
            "Catalog pointed at missing source '{}'; previous source recorded as empty",
            dangling
        ));
    }

    for (key, value) in &report.overrides.applied {
        ui.ok(format!("Override {} = {}", key, value));
    }
    for (var, value) in &report.env.set {
        ui.ok(format!("{} = {}", var, value));
    }
    for var in &report.env.skipped {
        ui.info(format!("{} not set by this source, existing value kept", var));
    }

    match &report.cargo_config {
        ConfigWrite::Written(path) => ui.ok(format!("Cargo config updated: {}", path.display())),
        ConfigWrite::Skipped => {
            ui.warn("Source has no cargo_config, cargo config left unchanged")
        }
    }

    if !report.env.set.is_empty() {
        ui.warn(format!(
            "Environment written to {}; open a new shell for it to take effect",
            report.env_location
        ));
        if cfg!(not(windows)) {
            ui.hint(format!("or run: . {}", paths.env_file.display()));
        }
    }

    if let SwitchKind::Switch {
        previous: Some(previous),
    } = &report.kind
    {
        ui.println(format!("  Previous source: {}", ui.bold(previous)));
    }
}

fn print_partial_failure(failure: &SwitchFailure, ui: &Ui) {
    if failure.is_clean() {
        ui.hint("Nothing was changed.");
        return;
    }
    ui.warn("The switch was only partly applied:");
    for step in &failure.completed {
        ui.println(format!("  {} {}", ui.icon_ok(), step));
    }
    if failure.completed.contains(&Step::CatalogSaved) {
        ui.hint("The catalog points at the new source but history was not recorded; run the switch again.");
    } else {
        ui.hint("Catalog and history still describe the previous source; fix the error and run the switch again.");
    }
}

/// Show the last recorded transition
pub fn history(paths: &Paths, ui: &Ui) -> Result<()> {
    let Some(history) = History::read(&paths.history_file)? else {
        ui.warn("No switch has been recorded yet.");
        return Ok(());
    };

    ui.section("Last switch");
    if let Some(at) = history.recorded_at {
        ui.println(ui.dim(at.format("%Y-%m-%d %H:%M:%S UTC").to_string()));
    }
    ui.newline();

    let mut table = ui.table();
    table.set_header(vec![
        ui.header_cell("Field"),
        ui.header_cell("Previous"),
        ui.header_cell("Current"),
    ]);
    let rows: [(&str, fn(&Snapshot) -> String); 4] = [
        ("name", |s| s.name.clone()),
        ("dist_server", |s| s.dist_server.clone()),
        ("update_root", |s| s.update_root.clone()),
        ("cargo_config", |s| blob_summary(&s.cargo_config)),
    ];
    for (label, get) in rows {
        table.add_row(vec![
            ui.cell(label),
            ui.value_cell(&get(&history.previous)),
            ui.value_cell(&get(&history.current)),
        ]);
    }
    ui.println(table.to_string());

    if history.previous.is_empty() {
        ui.hint("No source was active before the recorded switch.");
    }
    Ok(())
}

fn blob_summary(blob: &str) -> String {
    match blob.trim().lines().count() {
        0 => String::new(),
        1 => "1 line".to_string(),
        n => format!("{} lines", n),
    }
}

/// Run diagnostics
pub fn doctor(paths: &Paths, ui: &Ui) -> Result<()> {
    let store = env_store::default_store(paths);
    run_doctor(paths, store.as_ref(), ui);
    Ok(())
}
