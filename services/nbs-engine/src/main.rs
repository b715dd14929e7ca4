//! NBS suitability engine CLI.
//!
//! Loads configuration and criterion rasters, scores the cells of one
//! viewport and prints the resulting engine snapshot as JSON.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use nbs_common::{BoundingBox, RankingMode};
use raster::RasterCatalog;
use storage::{KeyValueStore, MemoryStore, RedisStore};
use suitability::{EngineConfig, SuitabilityEngine};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "nbs-engine")]
#[command(about = "Score nature-based solutions over a viewport")]
struct Args {
    /// Viewport as west,south,east,north
    #[arg(short, long, allow_hyphen_values = true)]
    viewport: BoundingBox,

    /// Challenge category (default: first configured)
    #[arg(short, long, env = "NBS_CATEGORY")]
    category: Option<String>,

    /// Engine configuration file (YAML)
    #[arg(long, env = "NBS_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the configuration documents
    #[arg(long, env = "NBS_CONFIG_URL")]
    config_url: Option<String>,

    /// Directory of the configuration documents
    #[arg(long, env = "NBS_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Directory of <criterion>.zarr rasters
    #[arg(long, env = "NBS_RASTER_DIR")]
    raster_dir: Option<PathBuf>,

    /// Redis URL for the persistent cache
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Expire Redis cache entries after this many seconds
    #[arg(long)]
    cache_ttl_secs: Option<u64>,

    /// Score on the background worker
    #[arg(long)]
    worker: bool,

    /// Select the cell containing lat,lng (repeatable)
    #[arg(short, long = "select", value_parser = parse_point, allow_hyphen_values = true)]
    select: Vec<(f64, f64)>,

    /// Ranking mode: impact or cost
    #[arg(long, default_value = "impact")]
    mode: RankingMode,

    /// 1-based rank to show and aggregate
    #[arg(long, default_value = "1")]
    rank: usize,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Pretty-print the snapshot
    #[arg(long)]
    pretty: bool,
}

fn parse_point(s: &str) -> Result<(f64, f64), String> {
    let (lat, lng) = s
        .split_once(',')
        .ok_or_else(|| format!("expected lat,lng, got '{}'", s))?;
    let lat = lat.trim().parse().map_err(|e| format!("invalid latitude: {}", e))?;
    let lng = lng.trim().parse().map_err(|e| format!("invalid longitude: {}", e))?;
    Ok((lat, lng))
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout carries only the snapshot
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn engine_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => EngineConfig::from_env(),
    };

    if args.config_url.is_some() {
        config.config_url = args.config_url.clone();
    }
    if args.config_dir.is_some() {
        config.config_dir = args.config_dir.clone();
    }
    if args.raster_dir.is_some() {
        config.raster_dir = args.raster_dir.clone();
    }
    if args.redis_url.is_some() {
        config.redis_url = args.redis_url.clone();
    }
    if args.category.is_some() {
        config.default_category = args.category.clone();
    }
    if args.worker {
        config.worker_enabled = true;
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid engine configuration: {}", e))?;
    Ok(config)
}

/// Redis when configured and reachable, otherwise an in-memory cache.
async fn open_cache(config: &EngineConfig, ttl: Option<Duration>) -> Arc<dyn KeyValueStore> {
    if let Some(url) = &config.redis_url {
        match RedisStore::connect(url).await {
            Ok(store) => {
                info!("Using Redis cache");
                return match ttl {
                    Some(ttl) => Arc::new(store.with_ttl(ttl)),
                    None => Arc::new(store),
                };
            }
            Err(e) => warn!(error = %e, "Redis unavailable, falling back to in-memory cache"),
        }
    }
    Arc::new(MemoryStore::new(config.cache_capacity))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json)?;

    let config = engine_config(&args)?;
    let cache = open_cache(&config, args.cache_ttl_secs.map(Duration::from_secs)).await;
    let source = config.config_source().context("No configuration source")?;

    info!(source = %source.describe(), viewport = %args.viewport, "Starting suitability engine");

    let engine = SuitabilityEngine::initialize(source.as_ref(), RasterCatalog::new(), cache, config)
        .await
        .context("Failed to initialize engine")?;

    if args.mode != RankingMode::default() {
        engine.toggle_ranking().await;
    }

    let scheduler = engine.refresh_scheduler();
    let seq = scheduler.request(args.viewport);
    scheduler.settled(seq).await;

    for (lat, lng) in &args.select {
        match engine.select_point(*lat, *lng).await {
            Ok((key, _)) => info!(cell = %key, "Selected cell"),
            Err(e) => warn!(lat, lng, error = %e, "Point is outside the grid"),
        }
    }

    let rank = engine.set_rank(args.rank).await;
    if rank != args.rank {
        warn!(requested = args.rank, rank, "Rank clamped");
    }

    let snapshot = engine.snapshot().await;
    let json = if args.pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    };
    println!("{}", json);

    Ok(())
}
