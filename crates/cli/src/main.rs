mod commands;

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gamelib_core::config::{self, AppConfig};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Personal game library manager
#[derive(Parser)]
#[command(name = "gamelib")]
#[command(about = "Track owned games across storefronts and plan how to launch them")]
struct Cli {
    /// Library file to use instead of the configured one
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List games, unfinished and highest priority first
    List {
        /// Include hidden games
        #[arg(long)]
        all: bool,
    },

    /// Print the stored fields of a game as JSON
    Show { id: String },

    /// Print the launch plan for a game without running it
    Plan { id: String },

    /// Split dotted GOG ids into packages and package members
    ImportPackages,

    /// Merge games from a JSON array of field maps
    Add { file: PathBuf },

    /// Mark a game finished
    Finish { id: String },

    /// Clear the finished flag of a game
    Unfinish { id: String },

    /// Hide a game from the default listing
    Hide { id: String },

    /// Show a hidden game again
    Unhide { id: String },

    /// Remove a game from the library
    Delete { id: String },

    /// Show what a package contains
    Package { id: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    config::ensure_default_config()?;
    let mut config = AppConfig::load()?;
    if let Some(library) = cli.library {
        config.library_file = library;
    }
    init_logging(&config.library_file)?;

    commands::execute(cli.command, &config)
}

fn init_logging(library_file: &Path) -> Result<()> {
    let log_dir = library_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or(std::env::current_dir()?)
        .join("logs");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_path = log_dir.join("gamelib.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::from_default_env();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stdout);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(())
}
