//! Command-line interface.

mod commands;
mod icons;

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use speechcorpus::models::Source;
use speechcorpus::Config;

#[derive(Parser)]
#[command(name = "speechcorpus")]
#[command(about = "Normalize public political speech transcripts into one corpus")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "SPEECHCORPUS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, clean and deduplicate raw sources, then export the corpus
    Run {
        /// First date to keep (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<NaiveDate>,

        /// Last date to keep (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<NaiveDate>,

        /// Directory holding one raw subdirectory per source
        #[arg(long)]
        raw_dir: Option<PathBuf>,

        /// Output directory for curated.jsonl and manifest.json
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only process these sources (repeatable)
        #[arg(short, long = "source")]
        sources: Vec<Source>,

        /// Maximum number of sources extracted at once
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Process sources one after another on the current thread
        #[arg(long)]
        sequential: bool,
    },

    /// Show the effective configuration as YAML
    Config,

    /// Check a configuration file and summarize its settings
    ValidateConfig {
        /// Configuration file to check
        path: PathBuf,
    },

    /// Write a configuration file holding the defaults
    InitConfig {
        /// Destination; the extension picks YAML, TOML or JSON
        #[arg(default_value = "speechcorpus.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// List the known sources and whether they are enabled
    Info,
}

/// Load the config file named on the command line, or discover one.
async fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Ok(Config::load_from_path(path).await?)
        }
        None => Ok(Config::load().await?),
    }
}

/// Parse arguments and dispatch to the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // These two work on a file named by argument, not the discovered config.
    match &cli.command {
        Commands::ValidateConfig { path } => {
            return commands::config_cmd::cmd_config_validate(path).await
        }
        Commands::InitConfig { path, force } => {
            return commands::config_cmd::cmd_config_init(path, *force).await
        }
        _ => {}
    }

    let config = load_config(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Run {
            start_date,
            end_date,
            raw_dir,
            output,
            sources,
            jobs,
            sequential,
        } => {
            let overrides = commands::run::RunOverrides {
                start_date,
                end_date,
                raw_dir,
                output,
                sources,
                jobs,
                sequential,
            };
            commands::run::cmd_run(config, overrides).await
        }
        Commands::Config => commands::config_cmd::cmd_config_show(&config),
        Commands::Info => commands::info::cmd_info(&config),
        Commands::ValidateConfig { .. } | Commands::InitConfig { .. } => Ok(()),
    }
}
