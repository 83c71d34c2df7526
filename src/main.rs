use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use langcheck_lib::models::EvaluationReport;
use langcheck_lib::services::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "langcheck")]
#[command(about = "Language detection gateway and accuracy evaluation for a cloud text analytics API")]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "LANGCHECK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP endpoints
    Serve {
        /// Address to listen on, overrides server.bind
        #[arg(long)]
        bind: Option<String>,
    },
    /// Detect the languages of comma-separated sentences
    Detect { text: String },
    /// Detect the languages of corpus sentences by comma-separated index
    DetectIndices { indices: String },
    /// Measure the detector's success rate over a random corpus sample
    Evaluate {
        sample_size: String,
        /// Seed for a reproducible draw
        #[arg(long)]
        seed: Option<u64>,
        /// Number of success and failure examples to keep
        #[arg(long)]
        examples: Option<usize>,
        /// Count unknown or unmapped detections as failures
        #[arg(long)]
        count_unscored_as_failure: bool,
        /// Print only the compact report served over HTTP
        #[arg(long)]
        compact: bool,
    },
    /// Write a default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let store = langcheck_lib::config_store(path);
    if store.config_file().exists() && !force {
        anyhow::bail!(
            "config already exists at {} (use --force to overwrite)",
            store.config_file().display()
        );
    }
    store.save(&AppConfig::default())?;
    println!("Wrote config: {}", store.config_file().display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    langcheck_lib::init_logging();
    let cli = Cli::parse();
    info!(command = ?cli.command, "langcheck.start");

    let load = || langcheck_lib::load_config(cli.config.clone()).context("loading configuration");

    match cli.command {
        Command::InitConfig { force } => init_config(cli.config.clone(), force)?,
        Command::Serve { ref bind } => {
            let config = load()?;
            langcheck_lib::serve(&config, bind.as_deref()).await?;
        }
        Command::Detect { ref text } => {
            let service = langcheck_lib::build_service(&load()?)?;
            print_json(&service.detect_text(text).await?)?;
        }
        Command::DetectIndices { ref indices } => {
            let service = langcheck_lib::build_service(&load()?)?;
            print_json(&service.detect_indices_text(indices).await?)?;
        }
        Command::Evaluate {
            ref sample_size,
            seed,
            examples,
            count_unscored_as_failure,
            compact,
        } => {
            let mut config = load()?;
            if let Some(n) = examples {
                config.evaluation.examples_retained = n.max(1);
            }
            if count_unscored_as_failure {
                config.evaluation.count_unscored_as_failure = true;
            }
            let service = langcheck_lib::build_service(&config)?.with_seed(seed);
            info!(policy = ?service.policy(), "evaluate.policy");

            let outcome = service.evaluate_text(sample_size).await?;
            if compact {
                print_json(&EvaluationReport::from(&outcome))?;
            } else {
                print_json(&outcome)?;
            }
        }
    }

    Ok(())
}
