//! LMS Video CLI - Headless player session replay
//!
//! Features:
//! - Replay scripted sessions against a scripted backend
//! - Time formatting and speed conversion helpers
//! - Player config validation

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use url::Url;

mod commands;
mod output;
mod script;

/// LMS Video CLI - Courseware video player toolkit
#[derive(Parser)]
#[command(name = "lms-video")]
#[command(version)]
#[command(about = "Replay and inspect courseware video player sessions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted session
    Replay {
        /// Path to the session script (JSON)
        script: PathBuf,

        /// Persist grader progress to this file instead of memory
        #[arg(short, long)]
        storage: Option<PathBuf>,

        /// Send grades and grader state to this handler base URL
        #[arg(long)]
        report_url: Option<Url>,
    },

    /// Format seconds for display
    Format {
        seconds: f64,

        /// Pad every field (HH:MM:SS)
        #[arg(long)]
        full: bool,
    },

    /// Rescale a time across a speed change
    Convert {
        time: f64,
        old_speed: f64,
        new_speed: f64,
    },

    /// Parse and validate a player config
    CheckConfig {
        /// Path to the config (JSON)
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Replay { script, storage, report_url } => {
            commands::replay(&script, storage, report_url, &cli.format).await?;
        }
        Commands::Format { seconds, full } => {
            commands::format_time(seconds, full, &cli.format);
        }
        Commands::Convert { time, old_speed, new_speed } => {
            commands::convert(time, old_speed, new_speed, &cli.format)?;
        }
        Commands::CheckConfig { config } => {
            commands::check_config(&config, &cli.format)?;
        }
    }

    Ok(())
}
