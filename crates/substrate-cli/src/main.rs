//! Substrate CLI
//!
//! Operator tooling over the coordination substrate.
//!
//! ## Commands
//!
//! - `recover`: run model output through the structured recovery pipeline
//! - `config`: print the effective configuration as TOML

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::debug;

use substrate_core::structured_recovery::to_pretty_text;
use substrate_core::{require_keys, require_object, RecoveryPipeline, SubstrateConfig};

#[derive(Parser)]
#[command(name = "substrate")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run-scoped coordination substrate for agent pipelines", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "SUBSTRATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recover structured JSON from noisy model output
    Recover {
        /// Input file (default: stdin)
        file: Option<PathBuf>,

        /// JSON value returned when every tier fails (default: {})
        #[arg(long)]
        fallback: Option<String>,

        /// Skip the repair tier
        #[arg(long)]
        no_repair: bool,

        /// Comma-separated keys the result must contain
        #[arg(long, value_delimiter = ',')]
        require_keys: Vec<String>,

        /// Pretty-print the result
        #[arg(long)]
        pretty: bool,
    },

    /// Print the effective configuration
    Config {
        /// Configuration file to load instead of --config
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.command {
        Commands::Config { file: Some(file) } => Some(file.clone()),
        _ => cli.config.clone(),
    };
    let config = load_config(config_path.as_deref())?;

    let mut logging = config.logging.clone();
    logging.json |= cli.json;
    if cli.verbose {
        logging.level = "debug".into();
    }
    substrate_core::init_tracing_from(&logging)?;

    match cli.command {
        Commands::Recover {
            file,
            fallback,
            no_repair,
            require_keys,
            pretty,
        } => cmd_recover(
            &config,
            file.as_deref(),
            fallback.as_deref(),
            no_repair,
            &require_keys,
            pretty,
        ),
        Commands::Config { .. } => cmd_config(&config),
    }
}

fn load_config(path: Option<&Path>) -> Result<SubstrateConfig> {
    match path {
        Some(path) => SubstrateConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => SubstrateConfig::from_env().context("Invalid configuration environment"),
    }
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read stdin")?;
            Ok(input)
        }
    }
}

/// Recover `text` and enforce `required` keys.
fn recover_text(
    pipeline: &RecoveryPipeline,
    text: &str,
    fallback: Value,
    required: &[String],
) -> Result<(Value, String)> {
    let outcome = pipeline.recover_with(text, fallback);
    let tier = outcome
        .tier()
        .map_or_else(|| "fallback".to_string(), |t| t.to_string());
    let value = outcome.into_value();

    let required: Vec<&str> = required
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();
    if !required.is_empty() {
        let map = require_object(&value, "recovered value is not a JSON object")?;
        require_keys(map, required)?;
    }
    Ok((value, tier))
}

fn cmd_recover(
    config: &SubstrateConfig,
    file: Option<&Path>,
    fallback: Option<&str>,
    no_repair: bool,
    required: &[String],
    pretty: bool,
) -> Result<()> {
    let text = read_input(file)?;
    let fallback = match fallback {
        Some(raw) => serde_json::from_str(raw).context("--fallback is not valid JSON")?,
        None => Value::Object(Default::default()),
    };
    let pipeline = if no_repair {
        RecoveryPipeline::without_repair()
    } else {
        RecoveryPipeline::from_config(&config.recovery)
    };
    debug!(bytes = text.len(), repair = pipeline.has_repair(), "recovering input");

    let (value, tier) =
        recover_text(&pipeline, &text, fallback, required).context("Validation failed")?;

    let rendered = if pretty {
        to_pretty_text(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    eprintln!("tier: {tier}");
    println!("{rendered}");
    Ok(())
}

fn cmd_config(config: &SubstrateConfig) -> Result<()> {
    let rendered = config
        .to_toml_string()
        .context("Failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}
