use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "webtoon-translate")]
#[command(about = "Webtoon translation service", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Path to the configuration file
        #[arg(short, long)]
        config: String,
    },

    /// Run the background translation worker
    Worker {
        /// Path to the configuration file
        #[arg(short, long)]
        config: String,
    },

    /// Run the API server and the worker in one process
    Run {
        /// Path to the configuration file
        #[arg(short, long)]
        config: String,
    },

    /// Load and validate a configuration file
    CheckConfig {
        /// Path to the configuration file
        #[arg(short, long)]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    // Priority: RUST_LOG env var > verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match cli.verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Serve { config } => {
            commands::serve::run(&config).await?;
        }
        Commands::Worker { config } => {
            commands::worker::run(&config).await?;
        }
        Commands::Run { config } => {
            commands::run::run(&config).await?;
        }
        Commands::CheckConfig { config } => {
            commands::check_config::run(&config).await?;
        }
    }

    Ok(())
}
