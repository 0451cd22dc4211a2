//! Greyscale CLI - run the greyscale conversion choreography locally.
//!
//! Uploads a directory of images into an in-process deployment of every
//! stage, waits for the choreography to settle, and writes the derived
//! images, the provenance records and the gallery page to disk.
//!
//! # Usage
//!
//! ```bash
//! # Convert a directory and build the gallery
//! greyscale run --input ./photos --output ./site
//!
//! # Same, then remove one source object again
//! greyscale run --input ./photos --output ./site --remove holiday.jpg
//!
//! # View configuration
//! greyscale config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Greyscale - event-driven greyscale conversion with a provenance index.
#[derive(Parser, Debug)]
#[command(name = "greyscale")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every stage locally over a directory of images
    Run(cli::run::RunArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match greyscale_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `greyscale config path`."
            );
            greyscale_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Greyscale v{}", greyscale_core::VERSION);

    match cli.command {
        Commands::Run(args) => cli::run::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
