//! Batch factor computation.
//!
//! Instrument codes are spread round-robin over a set of worker tasks. Each
//! worker owns its own `FactorStore`, and with it its own database
//! connection, taken from the shared connection manager.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::Args;
use factor_platform_core::{AppConfig, FactorEngine, MarketDataSource, ResultStorage};
use factor_platform_data::{ConnectionManager, CsvMarketData, FactorStore, ParquetResultStorage};
use factor_platform_pipeline::{FactorRegistry, FactorRunner, ResultSource};

use super::parse_date;

/// Arguments for the compute command.
#[derive(Args, Debug, Clone)]
pub struct ComputeArgs {
    /// Factor name (e.g., "RMI")
    #[arg(long)]
    pub name: String,

    /// Factor type, used as the top-level storage directory
    #[arg(long, default_value = "stock")]
    pub factor_type: String,

    /// Trading date (YYYY-MM-DD or YYYYMMDD)
    #[arg(long, value_parser = parse_date)]
    pub date: NaiveDate,

    /// Instrument codes
    #[arg(required = true, num_args = 1..)]
    pub codes: Vec<String>,

    /// Number of concurrent workers (defaults to the configured pool size)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Market data root (overrides storage.market_data_dir)
    #[arg(long)]
    pub market_dir: Option<PathBuf>,

    /// Result storage root (overrides storage.results_dir)
    #[arg(long)]
    pub results_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct BatchSummary {
    computed: usize,
    cached: usize,
    unavailable: usize,
    failed: usize,
}

impl BatchSummary {
    fn merge(&mut self, other: Self) {
        self.computed += other.computed;
        self.cached += other.cached;
        self.unavailable += other.unavailable;
        self.failed += other.failed;
    }
}

/// Worker count: the request or the pool size hint, at least 1 and at most one per code.
fn worker_count(requested: Option<usize>, pool_size: u32, codes: usize) -> usize {
    let wanted = requested.unwrap_or(pool_size as usize);
    wanted.clamp(1, codes.max(1))
}

/// Splits codes round-robin into `workers` groups.
fn partition(codes: Vec<String>, workers: usize) -> Vec<Vec<String>> {
    let mut groups = vec![Vec::new(); workers];
    for (i, code) in codes.into_iter().enumerate() {
        groups[i % workers].push(code);
    }
    groups
}

struct WorkerJob {
    id: usize,
    codes: Vec<String>,
    name: String,
    factor_type: String,
    date: NaiveDate,
}

async fn run_worker(
    job: WorkerJob,
    store: FactorStore,
    market: Arc<dyn MarketDataSource>,
    engine: Arc<dyn FactorEngine>,
    storage: Arc<dyn ResultStorage>,
) -> BatchSummary {
    let mut runner = FactorRunner::new(store, market, engine, storage);
    let mut summary = BatchSummary::default();

    for code in &job.codes {
        match runner
            .compute_or_fetch(code, job.date, &job.name, &job.factor_type)
            .await
        {
            Ok(Some(outcome)) => {
                let source = match outcome.source {
                    ResultSource::Cached => {
                        summary.cached += 1;
                        "cached"
                    }
                    ResultSource::Computed => {
                        summary.computed += 1;
                        "computed"
                    }
                };
                println!(
                    "{code}\t{}\t{source}\t{} points\t{}",
                    outcome.version,
                    outcome.output.len(),
                    outcome.path
                );
            }
            Ok(None) => {
                summary.unavailable += 1;
                println!("{code}\tunavailable");
            }
            Err(e) => {
                summary.failed += 1;
                tracing::error!(worker = job.id, code = %code, error = %format!("{e:#}"), "factor computation failed");
            }
        }
    }

    runner.into_catalog().close().await;
    tracing::debug!(worker = job.id, ?summary, "worker finished");
    summary
}

/// Runs the compute command.
///
/// # Errors
/// Returns an error if any instrument failed to compute or a worker panicked.
pub async fn run_compute(
    args: ComputeArgs,
    config: &AppConfig,
    manager: &Arc<ConnectionManager>,
) -> Result<()> {
    let market_dir = args
        .market_dir
        .unwrap_or_else(|| PathBuf::from(&config.storage.market_data_dir));
    let results_dir = args
        .results_dir
        .unwrap_or_else(|| PathBuf::from(&config.storage.results_dir));

    let market: Arc<dyn MarketDataSource> = Arc::new(CsvMarketData::new(market_dir));
    let engine: Arc<dyn FactorEngine> = Arc::new(FactorRegistry::with_builtins());
    let storage: Arc<dyn ResultStorage> = Arc::new(ParquetResultStorage::new(results_dir));

    let total = args.codes.len();
    let workers = worker_count(args.workers, config.pool.pool_size, total);
    tracing::info!(
        factor = %args.name,
        date = %args.date,
        codes = total,
        workers,
        "starting factor batch"
    );

    let mut handles = Vec::with_capacity(workers);
    for (id, codes) in partition(args.codes, workers).into_iter().enumerate() {
        let job = WorkerJob {
            id,
            codes,
            name: args.name.clone(),
            factor_type: args.factor_type.clone(),
            date: args.date,
        };
        let store = FactorStore::new(manager);
        handles.push(tokio::spawn(run_worker(
            job,
            store,
            market.clone(),
            engine.clone(),
            storage.clone(),
        )));
    }

    let mut summary = BatchSummary::default();
    for handle in handles {
        summary.merge(handle.await?);
    }

    println!(
        "{} computed, {} cached, {} unavailable, {} failed",
        summary.computed, summary.cached, summary.unavailable, summary.failed
    );

    if summary.failed > 0 {
        bail!("{} of {total} instruments failed", summary.failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_defaults_to_pool_size() {
        assert_eq!(worker_count(None, 20, 100), 20);
        assert_eq!(worker_count(Some(4), 20, 100), 4);
    }

    #[test]
    fn test_worker_count_capped_by_codes() {
        assert_eq!(worker_count(None, 20, 3), 3);
        assert_eq!(worker_count(Some(0), 20, 3), 1);
        assert_eq!(worker_count(None, 0, 0), 1);
    }

    #[test]
    fn test_partition_round_robin() {
        let codes = ["a", "b", "c", "d", "e"].map(String::from).to_vec();
        let groups = partition(codes, 2);

        assert_eq!(groups, vec![vec!["a", "c", "e"], vec!["b", "d"]]);
    }
}
