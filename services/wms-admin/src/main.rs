//! Dataset administration tool.
//!
//! Registers datasets in the catalog, discovers their layers and builds
//! or clears their topology caches.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use storage::NewDataset;
use wms_common::time::parse_iso8601;
use wms_common::AnyLayer;
use wms_dataset::{refresh_all, refresh_dataset, Dataset, DatasetContext, Settings};

#[derive(Parser, Debug)]
#[command(name = "wms-admin")]
#[command(about = "Manage sci-wms datasets, layers and topology caches")]
struct Cli {
    /// Settings file (YAML)
    #[arg(short, long, env = "SCIWMS_CONFIG")]
    config: Option<PathBuf>,

    /// Override the topology cache directory
    #[arg(long, env = "SCIWMS_TOPOLOGY_PATH")]
    topology_path: Option<PathBuf>,

    /// Override the catalog database file
    #[arg(long, env = "SCIWMS_DATABASE")]
    database: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a dataset and discover its layers
    Add {
        /// Path (relative to the project root) or URL of the dataset
        uri: String,

        /// Unique name: letters, digits and underscores
        #[arg(long)]
        name: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long = "abstract")]
        abstract_: Option<String>,

        /// Dataset kind (ugrid, sgrid, rgrid, generic); identified from
        /// the data when omitted
        #[arg(long)]
        kind: Option<String>,

        /// Do not rebuild the cache on refresh
        #[arg(long)]
        no_keep_up_to_date: bool,

        #[arg(long)]
        display_all_timesteps: bool,
    },

    /// List registered datasets
    List,

    /// Show one dataset
    Show { name: String },

    /// Refresh layers and caches of one or all datasets
    Refresh {
        name: Option<String>,

        /// Rebuild even when the cache looks current
        #[arg(short, long)]
        force: bool,
    },

    /// Build the topology cache of a dataset
    UpdateCache {
        name: String,

        #[arg(short, long)]
        force: bool,
    },

    /// Delete the topology cache files of a dataset
    ClearCache { name: String },

    /// List the layers of a dataset
    Layers {
        name: String,

        /// Only active layers
        #[arg(long)]
        active: bool,
    },

    /// Resolve the time step used for a request time
    NearestTime {
        name: String,
        layer: String,

        /// ISO 8601 time, e.g. 2024-01-01T06:00:00Z
        time: String,
    },

    /// Clear the cache and delete a dataset with its layers
    Remove { name: String },
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to set up logging: {}", e))
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::from_yaml(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::from_env(),
    };
    if let Some(path) = &cli.topology_path {
        settings.topology_path = path.clone();
    }
    if let Some(path) = &cli.database {
        settings.database_path = path.clone();
    }
    Ok(settings)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn dataset(ctx: &DatasetContext, name: &str) -> Result<Dataset> {
    Dataset::by_name(ctx, name)
        .await
        .with_context(|| format!("Cannot load dataset '{}'", name))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json)?;

    let settings = load_settings(&cli)?;
    info!(
        database = %settings.database_path.display(),
        topology = %settings.topology_path.display(),
        "Loaded settings"
    );
    let ctx = DatasetContext::open(settings)
        .await
        .context("Failed to open the catalog")?;

    match cli.command {
        Commands::Add {
            uri,
            name,
            title,
            abstract_,
            kind,
            no_keep_up_to_date,
            display_all_timesteps,
        } => {
            let mut new = NewDataset::new(uri, name, kind.unwrap_or_default());
            if let Some(title) = title {
                new.title = title;
            }
            if let Some(abstract_) = abstract_ {
                new.abstract_ = abstract_;
            }
            new.keep_up_to_date = !no_keep_up_to_date;
            new.display_all_timesteps = display_all_timesteps;

            let ds = Dataset::register(&ctx, new)
                .await
                .context("Failed to register dataset")?;
            let summary = ds.process_layers().await?;
            println!(
                "Added {} ({}): {} layers, {} virtual layers",
                ds,
                ds.humanize(),
                summary.layers,
                summary.virtual_layers
            );
        }

        Commands::List => {
            for record in ctx.catalog.list_datasets().await? {
                let updated = record
                    .cache_last_updated
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!("{}\t{}\t{}\t{}", record.name, record.kind, record.uri, updated);
            }
        }

        Commands::Show { name } => {
            let ds = dataset(&ctx, &name).await?;
            print_json(&json!({
                "dataset": ds.record(),
                "type": ds.humanize(),
                "path": ds.path(),
                "online": ds.online(),
                "has_cache": ds.has_cache(),
                "domain": ds.domain().ok(),
            }))?;
        }

        Commands::Refresh { name, force } => {
            let reports = match name {
                Some(name) => {
                    let mut ds = dataset(&ctx, &name).await?;
                    vec![refresh_dataset(&mut ds, force).await?]
                }
                None => refresh_all(&ctx, force).await?,
            };
            print_json(&reports)?;
        }

        Commands::UpdateCache { name, force } => {
            let mut ds = dataset(&ctx, &name).await?;
            let outcome = ds
                .update_cache(force)
                .await
                .with_context(|| format!("Failed to update cache of '{}'", name))?;
            println!("{}: {:?}", ds, outcome);
        }

        Commands::ClearCache { name } => {
            let ds = dataset(&ctx, &name).await?;
            let removed = ds.clear_cache()?;
            println!("{}: removed {} cache files", ds, removed);
        }

        Commands::Layers { name, active } => {
            let ds = dataset(&ctx, &name).await?;
            let layers = if active {
                ds.active_layers().await?
            } else {
                ds.all_layers().await?
            };
            for layer in &layers {
                let (kind, std_name) = match layer {
                    AnyLayer::Layer(l) => ("layer", l.std_name.as_deref()),
                    AnyLayer::Virtual(v) => ("virtual", v.std_name.as_deref()),
                };
                println!(
                    "{}\t{}\t{}\t{}",
                    layer.var_name(),
                    kind,
                    std_name.unwrap_or("-"),
                    if layer.active() { "active" } else { "inactive" }
                );
            }
        }

        Commands::NearestTime { name, layer, time } => {
            let ds = dataset(&ctx, &name).await?;
            let when = parse_iso8601(&time).with_context(|| format!("Invalid time '{}'", time))?;
            let layer = ds.layer(&layer).await?;
            let (index, value) = ds.nearest_time(&layer, &when)?;
            println!("index={} value={}", index, value);
        }

        Commands::Remove { name } => {
            let ds = dataset(&ctx, &name).await?;
            ds.remove().await?;
            println!("Removed {}", name);
        }
    }

    Ok(())
}
