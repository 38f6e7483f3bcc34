//! partition_bench - benchmark driver
//!
//! ```text
//! ┌──────────┐    ┌───────────┐    ┌──────────────┐    ┌──────────┐
//! │  Config  │───▶│ Heuristic │───▶│ N workers,   │───▶│  Report  │
//! │  (YAML)  │    │ selection │    │ N connections│    │  (JSON)  │
//! └──────────┘    └───────────┘    └──────────────┘    └──────────┘
//! ```
//!
//! Usage:
//!
//! ```text
//! partition_bench [--config config/bench.yaml] [--mode MODE]
//!                 [--store postgres|memory] [--table T] [--key K] [--overlap P]
//! ```
//!
//! MODE is one of select, partitioned (default), serialized, overlapping, stress.
//! The report goes to stdout; logs go to stderr and the configured log file.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::sync::Arc;

use partition_bench::config::{AppConfig, StoreBackend};
use partition_bench::logging::init_logging;
use partition_bench::{BenchmarkHarness, HarnessSettings, MemoryStore, PartitionStore, PgStore};

const DEFAULT_CONFIG: &str = "config/bench.yaml";
const SYNTHETIC_TABLE: &str = "synthetic";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Select,
    Partitioned,
    Serialized,
    Overlapping,
    Stress,
}

impl Mode {
    fn parse(s: &str) -> Result<Self> {
        Ok(match s {
            "select" => Mode::Select,
            "partitioned" => Mode::Partitioned,
            "serialized" => Mode::Serialized,
            "overlapping" => Mode::Overlapping,
            "stress" => Mode::Stress,
            other => bail!("unknown mode '{}'", other),
        })
    }
}

// ============================================================
// ARGUMENTS
// ============================================================

fn get_arg(name: &str) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == name && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

fn load_config() -> Result<AppConfig> {
    let path = get_arg("--config").unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let mut config = if std::path::Path::new(&path).exists() {
        AppConfig::from_file(&path).with_context(|| format!("loading {}", path))?
    } else if get_arg("--config").is_some() {
        bail!("config file not found: {}", path);
    } else {
        AppConfig::default()
    };

    if let Some(table) = get_arg("--table") {
        config.benchmark.table = table;
    }
    if let Some(key) = get_arg("--key") {
        config.benchmark.key_field = key;
    }
    if let Some(overlap) = get_arg("--overlap") {
        config.benchmark.percent_overlap = overlap
            .parse()
            .with_context(|| format!("invalid --overlap '{}'", overlap))?;
    }
    if let Some(store) = get_arg("--store") {
        config.store.backend = match store.as_str() {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => bail!("unknown store '{}'", other),
        };
    }
    config.benchmark.validate()?;
    Ok(config)
}

// ============================================================
// STORE
// ============================================================

async fn build_store(config: &mut AppConfig) -> Result<Arc<dyn PartitionStore>> {
    match config.store.backend {
        StoreBackend::Postgres => {
            let store = PgStore::new(&config.store.url, config.store.connect_timeout())?;
            store
                .health_check()
                .await
                .context("PostgreSQL health check failed")?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            if config.benchmark.table.is_empty() {
                config.benchmark.table = SYNTHETIC_TABLE.to_string();
            }
            if config.benchmark.key_field.is_empty() {
                config.benchmark.key_field = "id".to_string();
            }
            let keys = (0..config.store.synthetic_rows).map(|i| format!("A{}", i));
            tracing::info!(
                rows = config.store.synthetic_rows,
                "Using synthetic table '{}'",
                config.benchmark.table
            );
            Ok(Arc::new(
                MemoryStore::new().with_table(&config.benchmark.table, keys),
            ))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = load_config()?;
    let _log_guard = init_logging(&config.logging);

    let mode = match get_arg("--mode") {
        Some(m) => Mode::parse(&m)?,
        None => Mode::Partitioned,
    };
    tracing::info!("Starting partition_bench in {:?} mode", mode);

    let store = build_store(&mut config).await?;
    let settings = HarnessSettings::from_config(&config.benchmark)?;
    let mut harness = BenchmarkHarness::with_settings(store, settings)?;

    let bench = &config.benchmark;
    match mode {
        Mode::Select => {
            let heuristic = harness
                .select_heuristic(&bench.table, &bench.key_field, bench.min_bin_fraction)
                .await?;
            print_json(&serde_json::json!({ "heuristic": heuristic }))?;
        }
        Mode::Partitioned | Mode::Serialized => {
            let report = harness
                .run_partitioned(&bench.table, &bench.key_field, mode == Mode::Serialized)
                .await?;
            print_json(&report)?;
        }
        Mode::Overlapping => {
            let report = harness
                .run_overlapping(&bench.table, &bench.key_field, bench.percent_overlap)
                .await?;
            print_json(&report)?;
        }
        Mode::Stress => {
            let report = harness.connection_stress_test(bench.stress_level).await?;
            print_json(&report)?;
        }
    }

    Ok(())
}
