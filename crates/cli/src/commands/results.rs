//! Factor result bookkeeping commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use factor_platform_data::{
    ConnectionManager, FactorStore, NewFactorResult, ResultKey, DATA_STATUS_OK,
};
use serde_json::Value;

use super::parse_date;

#[derive(Args, Debug, Clone)]
pub struct ResultKeyArgs {
    /// Factor name
    #[arg(long)]
    pub name: String,

    /// Factor version
    #[arg(long)]
    pub version: String,

    /// Instrument code (e.g., "600000.SH")
    #[arg(long)]
    pub code: String,

    /// Calculation date (YYYY-MM-DD or YYYYMMDD)
    #[arg(long, value_parser = parse_date)]
    pub date: NaiveDate,
}

impl ResultKeyArgs {
    fn key(&self) -> ResultKey {
        ResultKey::new(&self.name, &self.version, &self.code, self.date)
    }
}

/// Arguments for the record-result command.
#[derive(Args, Debug, Clone)]
pub struct RecordResultArgs {
    #[command(flatten)]
    pub key: ResultKeyArgs,

    /// Result data type, usually the factor type
    #[arg(long)]
    pub data_type: String,

    /// Storage path of the artifact
    #[arg(long)]
    pub path: String,

    /// Data status code
    #[arg(long, default_value_t = DATA_STATUS_OK)]
    pub status: i32,

    /// Extra metadata as JSON
    #[arg(long)]
    pub extra_info: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ResultExistsArgs {
    #[command(flatten)]
    pub key: ResultKeyArgs,
}

fn build_result(args: &RecordResultArgs) -> Result<NewFactorResult> {
    let mut result = NewFactorResult::new(args.key.key(), &args.data_type, &args.path)
        .with_status(args.status);
    if let Some(raw) = &args.extra_info {
        let extra: Value = serde_json::from_str(raw).context("--extra-info is not valid JSON")?;
        result = result.with_extra_info(extra);
    }
    Ok(result)
}

/// # Errors
/// Returns an error if the arguments are invalid or the insert fails.
pub async fn run_record_result(
    args: RecordResultArgs,
    manager: &Arc<ConnectionManager>,
) -> Result<()> {
    let result = build_result(&args)?;

    let mut store = FactorStore::new(manager);
    let recorded = store.record_result(&result).await;
    store.close().await;
    recorded?;

    println!("Recorded {}", result.key.identity());
    Ok(())
}

/// # Errors
/// Returns an error if the database query fails.
pub async fn run_result_exists(
    args: ResultExistsArgs,
    manager: &Arc<ConnectionManager>,
) -> Result<()> {
    let key = args.key.key();

    let mut store = FactorStore::new(manager);
    let result = store.result_exists(&key).await;
    store.close().await;

    println!("{}", result?);
    Ok(())
}
