//! `girder config`: inspect and edit config.toml

use clap::{Args, Subcommand};

use crate::config::{config_file_path, Config};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print one value
    Get {
        /// Key, e.g. backend or engine.max_depth
        key: String,
    },
    /// Change one value and save
    Set {
        /// Key, e.g. backend or engine.aggregations.co2
        key: String,
        /// New value
        value: String,
    },
    /// Restore one value to its default and save
    Unset {
        /// Key to reset
        key: String,
    },
    /// Print every value
    List,
    /// Print where the config file lives
    Path,
    /// Write a config file with default values
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn run(args: &ConfigArgs) -> anyhow::Result<()> {
    let path = config_file_path();

    match &args.command {
        ConfigCommands::Get { key } => {
            let config = Config::load()?;
            match config.get(key) {
                Some(value) => println!("{}", value),
                None if Config::keys().contains(&key.as_str()) => println!("(not set)"),
                None => anyhow::bail!(
                    "Unknown config key: {}. Available keys: {}",
                    key,
                    Config::keys().join(", ")
                ),
            }
        }
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(key, value)?;
            config.save()?;
            println!("{} = {}", key, value);
        }
        ConfigCommands::Unset { key } => {
            let mut config = Config::load()?;
            config.unset(key)?;
            config.save()?;
            let value = config.get(key).unwrap_or_else(|| "(not set)".to_string());
            println!("{} = {}", key, value);
        }
        ConfigCommands::List => {
            let config = Config::load()?;
            println!("# {}", path.display());
            for key in Config::keys() {
                let value = config.get(key).unwrap_or_else(|| "(not set)".to_string());
                println!("{} = {}", key, value);
            }
            for (metric, aggregation) in &config.engine.aggregations {
                println!("engine.aggregations.{} = {}", metric, aggregation);
            }
        }
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists. Use --force to overwrite.",
                    path.display()
                );
            }
            Config::default().save()?;
            println!("Wrote default config to {}", path.display());
        }
    }

    Ok(())
}
