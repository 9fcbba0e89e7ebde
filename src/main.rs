use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use rsswitch::{
    commands, logging,
    paths::Paths,
    ui::{ColorMode, Ui},
};

#[derive(Parser)]
#[command(name = "rsswitch")]
#[command(about = "Rust source switcher - manage rustup mirrors and cargo registry configuration")]
#[command(version)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// When to use colors
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    /// Increase log verbosity (-v info, -vv debug); RSSWITCH_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory holding sources.toml and history.toml (default $RSSWITCH_HOME or ~/.rsswitch)
    #[arg(long, global = true, value_name = "DIR")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all configured sources
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the current source and the persisted environment
    #[command(alias = "show")]
    Current {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Switch to a source (re-applies the current source when NAME is omitted)
    #[command(alias = "switch")]
    Use {
        /// Name of the source to activate
        name: Option<String>,

        /// Override a source field for this switch only (repeatable)
        #[arg(short = 'o', long = "override", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },

    /// Pick a source interactively and switch to it
    #[command(alias = "interactive")]
    Select {
        /// Override a source field for this switch only (repeatable)
        #[arg(short = 'o', long = "override", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },

    /// Show the previous and current source of the last switch
    History,

    /// Run diagnostics on the rsswitch setup
    Doctor,

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let ui = Ui::new(cli.color, cli.no_color);
    logging::init(cli.verbose, ui.color_enabled);

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "rsswitch", &mut std::io::stdout());
        return Ok(());
    }

    let paths = Paths::new(cli.home)?;

    match cli.command {
        Commands::List { json } => commands::list(&paths, json, &ui),
        Commands::Current { json } => commands::current(&paths, json, &ui),
        Commands::Use { name, overrides } => {
            commands::use_source(&paths, name.as_deref(), &overrides, &ui)
        }
        Commands::Select { overrides } => commands::select(&paths, &overrides, &ui),
        Commands::History => commands::history(&paths, &ui),
        Commands::Doctor => commands::doctor(&paths, &ui),
        Commands::Completions { .. } => Ok(()),
    }
}
