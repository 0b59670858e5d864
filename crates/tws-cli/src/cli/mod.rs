//! CLI for the TWS filtered-stream client.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tws_core::config;

use commands::{run_config_path, run_stream};

/// Top-level CLI for the TWS stream client.
#[derive(Debug, Parser)]
#[command(name = "tws")]
#[command(about = "TWS: auto-reconnecting filtered-stream client", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Field selectors; each non-empty list replaces the one from config.toml.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Comma-separated expansions (e.g. author_id,geo.place_id).
    #[arg(long, value_delimiter = ',', value_name = "LIST")]
    pub expansions: Vec<String>,
    #[arg(long, value_delimiter = ',', value_name = "LIST")]
    pub media_fields: Vec<String>,
    #[arg(long, value_delimiter = ',', value_name = "LIST")]
    pub place_fields: Vec<String>,
    #[arg(long, value_delimiter = ',', value_name = "LIST")]
    pub poll_fields: Vec<String>,
    #[arg(long, value_delimiter = ',', value_name = "LIST")]
    pub tweet_fields: Vec<String>,
    #[arg(long, value_delimiter = ',', value_name = "LIST")]
    pub user_fields: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Connect to the filtered stream and print messages until Ctrl-C.
    Stream {
        #[command(flatten)]
        filter: FilterArgs,
        /// Override the endpoint from config.toml.
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,
        /// Print each message as JSON instead of the tweet id.
        #[arg(long)]
        json: bool,
    },

    /// Print the location of config.toml.
    ConfigPath,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Stream {
                filter,
                endpoint,
                json,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_stream(&cfg, filter, endpoint, json).await?;
            }
            CliCommand::ConfigPath => run_config_path()?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
