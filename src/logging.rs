//! Diagnostic logging for rsswitch.
//!
//! Operator-facing messages go through [`crate::ui::Ui`]. Tracing output is
//! for debugging a switch and is quiet unless asked for.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Overrides `-v` when set, using `tracing` filter directives
pub const LOG_ENV: &str = "RSSWITCH_LOG";

/// Install the global subscriber writing to stderr
pub fn init(verbosity: u8, color_enabled: bool) {
    let filter = EnvFilter::builder()
        .with_env_var(LOG_ENV)
        .with_default_directive(level_for(verbosity).into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(color_enabled && std::io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .compact()
        .try_init();
}

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}
