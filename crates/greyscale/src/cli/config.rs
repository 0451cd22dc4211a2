//! The `greyscale config` command for configuration management.

use clap::{Args, Subcommand};
use greyscale_core::config::{
    ENV_CONVERTED_TOPIC, ENV_ERROR_TOPIC, ENV_GALLERY_TOPIC, ENV_REGION,
};
use greyscale_core::{Config, Naming, ObjectLocation};

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display current configuration, environment overrides applied
    Show,

    /// Show config file path
    Path,

    /// Initialize a new config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Show where a source object's derived copy and record URL would land
    Naming {
        /// Source bucket
        bucket: String,
        /// Source key
        key: String,
    },
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = Config::load()?;
            println!("{}", config.to_toml()?);
            for name in [ENV_REGION, ENV_CONVERTED_TOPIC, ENV_ERROR_TOPIC, ENV_GALLERY_TOPIC] {
                if let Ok(value) = std::env::var(name) {
                    println!("# {name}={value}");
                }
            }
        }

        ConfigCommand::Path => {
            let path = Config::default_path();
            println!("{}", path.display());
        }

        ConfigCommand::Init { force } => {
            let path = Config::default_path();

            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let toml = Config::default().to_toml()?;
            std::fs::write(&path, toml)?;

            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }

        ConfigCommand::Naming { bucket, key } => {
            let config = Config::load()?;
            let naming = Naming::new(&config);
            let source = ObjectLocation::new(bucket, key);
            let derived = naming.derived(&source);
            println!("source:  {}", naming.rendered_url(&source));
            println!("derived: {}", naming.rendered_url(&derived));
        }
    }

    Ok(())
}
