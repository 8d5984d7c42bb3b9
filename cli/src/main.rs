//! servicectl binary
//!
//! Console for a running serviced daemon.

#![allow(unused_crate_dependencies)]

use clap::{Parser, Subcommand};
use cli::Action;
use schema::ClientConfig;
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "servicectl")]
#[command(about = "Control the groups managed by serviced")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the daemon's discovery file
    #[arg(long, env = "SERVICED_TEMP_DIR", value_name = "DIR")]
    temp_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a group definition file
    Add {
        /// Group definition file (JSON or TOML)
        file: PathBuf,
    },
    /// Remove a group
    Remove {
        /// Group name
        group: String,
    },
    /// Start a group, or every group with `all`
    Start {
        /// Group name or `all`
        group: String,
    },
    /// Stop a group, or every group with `all`
    Stop {
        /// Group name or `all`
        group: String,
    },
    /// List service status of a group, or every group with `all`
    List {
        /// Group name or `all`
        group: String,
    },
}

impl From<Commands> for Action {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Add { file } => Action::Add(file),
            Commands::Remove { group } => Action::Remove(group),
            Commands::Start { group } => Action::Start(group),
            Commands::Stop { group } => Action::Stop(group),
            Commands::List { group } => Action::List(group),
        }
    }
}

#[tokio::main]
async fn main() {
    let _ = serviced_core::utils::init_tracing("warn");

    let args = Cli::parse();
    let mut config = ClientConfig::default();
    if let Some(dir) = args.temp_dir {
        config.temp_dir = dir;
    }

    if let Err(e) = cli::run(&config, args.command.into(), tokio::io::stdout()).await {
        error!("command failed ({}): {}", e.code(), e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
