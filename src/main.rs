//! Intelligent Cache - command-line front end
//!
//! Opens the cache directory, runs one operation and shuts down cleanly.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use intelligent_cache::{
    spawn_sweeper_task, Cache, CacheConfig, CacheError, EvictionStrategy, SetOptions,
    WritePolicy,
};

#[derive(Debug, Parser)]
#[command(name = "intelligent-cache", version, about = "Two-tier build cache")]
struct Cli {
    /// Cache directory (overrides CACHE_DIR)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Memory tier byte budget (overrides CACHE_MAX_SIZE)
    #[arg(long, global = true)]
    max_size: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the value stored under a key as JSON
    Get { key: String },
    /// Store a value (parsed as JSON when possible, otherwise a string)
    Set {
        key: String,
        value: String,
        /// TTL in milliseconds
        #[arg(long)]
        ttl: Option<u64>,
        /// lru, lfu, fifo, ttl or size
        #[arg(long)]
        strategy: Option<EvictionStrategy>,
        /// write-through, write-behind or write-around
        #[arg(long)]
        write_policy: Option<WritePolicy>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Remove a key
    Delete { key: String },
    /// Remove every entry
    Clear,
    /// Remove every entry carrying a tag
    InvalidateTag { tag: String },
    /// Remove every memory-resident entry whose key matches a regex
    InvalidatePattern { pattern: String },
    /// Print cache statistics as JSON
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intelligent_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = CacheConfig::from_env().context("invalid cache configuration")?;
    if let Some(dir) = cli.dir {
        config.cache_directory = dir;
    }
    if let Some(max_size) = cli.max_size {
        config.max_size = max_size;
    }
    info!(
        "Configuration loaded: dir={}, max_size={}, default_ttl={}ms, sweep_interval={}ms",
        config.cache_directory.display(),
        config.max_size,
        config.default_ttl_ms,
        config.sweep_interval_ms
    );

    let sweep_interval = config.sweep_interval();
    let cache = Cache::open(config).await.context("failed to open cache")?;
    let sweeper = spawn_sweeper_task(cache.clone(), sweep_interval);

    let outcome = run(&cache, cli.command).await.map_err(hide_disk_details);

    sweeper.abort();
    cache.shutdown().await.context("failed to shut down cache")?;
    outcome
}

/// Disk I/O details go to the log; the user sees a short message.
fn hide_disk_details(err: anyhow::Error) -> anyhow::Error {
    match err.downcast_ref::<CacheError>() {
        Some(cache_err) if cache_err.is_disk() => {
            warn!("Disk tier error: {}", cache_err);
            anyhow::anyhow!("cache storage is unavailable (see log for details)")
        }
        _ => err,
    }
}

async fn run(cache: &Cache, command: Command) -> Result<()> {
    match command {
        Command::Get { key } => match cache.get::<Value>(&key).await? {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => println!("(absent)"),
        },
        Command::Set {
            key,
            value,
            ttl,
            strategy,
            write_policy,
            tags,
        } => {
            let value = serde_json::from_str::<Value>(&value).unwrap_or(Value::String(value));
            let options = SetOptions {
                ttl_ms: ttl,
                strategy,
                write_policy,
                tags: tags.into_iter().collect(),
            };
            cache.set(&key, &value, options).await?;
            println!("Key '{}' set successfully", key);
        }
        Command::Delete { key } => {
            if cache.delete(&key).await? {
                println!("Key '{}' deleted successfully", key);
            } else {
                println!("Key '{}' not found", key);
            }
        }
        Command::Clear => {
            cache.clear().await?;
            println!("Cache cleared");
        }
        Command::InvalidateTag { tag } => {
            let removed = cache.invalidate_by_tag(&tag).await?;
            println!("Invalidated {} entries tagged '{}'", removed, tag);
        }
        Command::InvalidatePattern { pattern } => {
            let removed = cache.invalidate_by_pattern(&pattern).await?;
            println!("Invalidated {} entries matching '{}'", removed, pattern);
        }
        Command::Stats => {
            let stats = cache.stats().await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
