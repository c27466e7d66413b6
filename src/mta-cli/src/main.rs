//! mta: multi-touch attribution from the command line.
//!
//! Reads an event log (JSON array of objects), runs one or all attribution
//! models and prints the response as JSON on stdout. Logs go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::{info, warn};

use mta_cache::ResultCache;
use mta_core::config::AppConfig;
use mta_core::error::AttributionError;
use mta_core::table::EventTable;
use mta_core::types::{ModelKind, ModelParams};
use mta_core::validation::validate_table;
use mta_engine::{AttributionRequest, AttributionService};

#[derive(Parser, Debug)]
#[command(name = "mta")]
#[command(about = "Multi-touch marketing attribution over customer event logs")]
#[command(version)]
struct Cli {
    /// Optional TOML config file; environment variables still override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Node identifier (overrides config)
    #[arg(long, global = true, env = "MTA__NODE_ID")]
    node_id: Option<String>,

    /// Redis URL for the shared result cache (overrides config)
    #[arg(long, global = true, env = "MTA__REDIS__URL")]
    redis_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one attribution model
    Analyze {
        #[command(flatten)]
        input: InputArgs,

        /// first_touch, last_touch, linear, time_decay or position_based
        #[arg(long, default_value = "linear")]
        model: String,

        #[command(flatten)]
        params: ParamArgs,

        /// Skip the result cache
        #[arg(long, default_value_t = false)]
        no_cache: bool,
    },
    /// Run every model over the same input
    Compare {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        params: ParamArgs,
    },
    /// Only validate the input and list every issue found
    Validate {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// JSON file holding an array of event objects
    #[arg(long, short)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct ParamArgs {
    /// Time-decay half-life in days
    #[arg(long)]
    half_life_days: Option<f64>,

    /// Position-based first-touch weight
    #[arg(long)]
    first_weight: Option<f64>,

    /// Position-based last-touch weight
    #[arg(long)]
    last_weight: Option<f64>,

    /// Reference instant (RFC 3339) for freshness scoring; defaults to now
    #[arg(long)]
    as_of: Option<DateTime<Utc>>,
}

impl ParamArgs {
    fn model_params(&self) -> ModelParams {
        ModelParams {
            half_life_days: self.half_life_days,
            first_touch_weight: self.first_weight,
            last_touch_weight: self.last_weight,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mta=info,mta_engine=info,mta_cache=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => AppConfig::load_with_file(&path.to_string_lossy()),
        None => AppConfig::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(url) = cli.redis_url {
        config.redis.url = Some(url);
    }

    info!(
        node_id = %config.node_id,
        cache_enabled = config.cache.enabled,
        redis = config.redis.url.is_some(),
        "Configuration loaded"
    );

    match cli.command {
        Command::Analyze {
            input,
            model,
            params,
            no_cache,
        } => {
            if no_cache {
                config.cache.enabled = false;
            }
            let table = read_table(&input.input)?;
            let mut request =
                AttributionRequest::with_params(model.parse::<ModelKind>()?, params.model_params());
            request.as_of = params.as_of;

            let config = Arc::new(config);
            let mut service = AttributionService::new(config.clone());
            if config.cache.enabled {
                let cache = ResultCache::connect(&config.cache, &config.redis)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "Redis unavailable, caching in memory only");
                        ResultCache::in_memory(&config.cache)
                    });
                service = service.with_cache(Arc::new(cache));
            }

            let response = exit_on_validation(service.analyze(&table, &request).await)?;
            print_json(&response)
        }
        Command::Compare { input, params } => {
            let table = read_table(&input.input)?;
            let service = AttributionService::new(Arc::new(config));
            let responses = exit_on_validation(service.compare_models(
                &table,
                &params.model_params(),
                params.as_of,
            ))?;
            print_json(&responses)
        }
        Command::Validate { input } => {
            let table = read_table(&input.input)?;
            let issues = validate_table(&table);
            print_json(&issues)?;
            if !issues.is_empty() {
                std::process::exit(2);
            }
            Ok(())
        }
    }
}

fn read_table(path: &Path) -> anyhow::Result<EventTable> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let records: Vec<Map<String, Value>> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of objects", path.display()))?;
    let table = EventTable::from_records(&records);
    info!(path = %path.display(), rows = table.len(), "Loaded event log");
    Ok(table)
}

/// Validation failures print their issues as JSON and exit with status 2;
/// every other error propagates.
fn exit_on_validation<T>(result: Result<T, AttributionError>) -> anyhow::Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(AttributionError::Validation(issues)) => {
            eprintln!("{}", serde_json::to_string_pretty(&issues)?);
            std::process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
