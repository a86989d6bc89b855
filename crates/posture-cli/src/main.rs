// CLI for following posture streams and inspecting fallback data

#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "posture")]
#[command(about = "Posture - live compliance and fleet status", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Stream instance to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StreamName {
    /// Compliance checklist
    Compliance,
    /// Fleet nodes
    Fleet,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a stream and print each view change as a JSON line
    Watch {
        /// Stream to follow
        #[arg(value_enum)]
        stream: StreamName,

        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// JSON file with the view to show until live data arrives
        #[arg(short, long)]
        fallback: Option<PathBuf>,
    },

    /// Derive the compliance fallback from local records
    Fallback {
        /// Self-test report (JSON)
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Build manifest (JSON)
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG wins over the verbosity flag.
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Watch {
            stream,
            config,
            fallback,
        } => {
            let config = commands::config::load(config.as_deref())?;
            match stream {
                StreamName::Compliance => {
                    commands::watch::watch_compliance(&config, fallback.as_deref()).await?;
                }
                StreamName::Fleet => {
                    commands::watch::watch_fleet(&config, fallback.as_deref()).await?;
                }
            }
        }
        Commands::Fallback { report, manifest } => {
            commands::fallback::print_fallback(report.as_deref(), manifest.as_deref())?;
        }
        Commands::Config { config } => {
            commands::config::show_config(config.as_deref())?;
        }
    }

    Ok(())
}
