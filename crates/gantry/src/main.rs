//! gantry CLI - static site asset builder with a live-reloading dev server.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "gantry")]
#[command(about = "Static site asset builder with a live-reloading dev server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to gantry.toml config file
    #[arg(short, long, default_value = "gantry.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Build optimized (minified, compacted) output
    #[arg(long, global = true)]
    release: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a new project in the current directory
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Clean and build every asset once
    Build {
        /// Also validate page structure (doctype, lang, title, balanced tags)
        #[arg(long)]
        prod: bool,
    },

    /// Build, then watch sources and serve output with live reload
    Dev {
        /// Also validate page structure (doctype, lang, title, balanced tags)
        #[arg(long)]
        prod: bool,

        /// Port to listen on (defaults to config, 0 picks a free port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Preview an existing build
    Serve {
        /// Port to listen on (defaults to config, 0 picks a free port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory to serve (defaults to the configured output)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let settings = commands::Settings {
        config: cli.config,
        release: cli.release,
    };

    // Execute command
    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(&settings, yes).await?;
        }
        Commands::Build { prod } => {
            commands::build::run(&settings, prod).await?;
        }
        Commands::Dev {
            prod,
            port,
            no_open,
        } => {
            commands::dev::run(&settings, prod, port, !no_open).await?;
        }
        Commands::Serve { port, dir, no_open } => {
            commands::serve::run(&settings, port, dir, !no_open).await?;
        }
    }

    Ok(())
}
