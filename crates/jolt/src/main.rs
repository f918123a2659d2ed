//! jolt CLI - build, serve and live-reload a single-page app.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

use crate::config::Project;

#[derive(Parser)]
#[command(name = "jolt")]
#[command(about = "Minimal build, serve and live-reload harness for single-page apps")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root containing public/, src/ and build/
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Path to jolt.toml config file, relative to the root
    #[arg(short, long, default_value = "jolt.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, serve and rebuild on change with live reload
    Dev {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Open browser on start
        #[arg(long)]
        open: bool,
    },

    /// Run a single build and exit
    Build,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let project = Project::load(&cli.root, &cli.config)?;

    match cli.command {
        Commands::Dev { host, port, open } => {
            commands::dev::run(project, host, port, open).await?;
        }
        Commands::Build => {
            commands::build::run(project).await?;
        }
    }

    Ok(())
}
