//! CLI commands for the factor platform.

pub mod approve;
pub mod catalog;
pub mod compute;
pub mod init_db;
pub mod results;
pub mod submit;

use std::sync::Arc;

use chrono::NaiveDate;
use factor_platform_core::{parse_trading_date, AppConfig};
use factor_platform_data::ConnectionManager;

pub use approve::{run_approve, ApproveArgs};
pub use catalog::{
    run_exists, run_latest, run_names, run_pending, run_versions, ExistsArgs, LatestArgs,
    PendingArgs, VersionsArgs,
};
pub use compute::{run_compute, ComputeArgs};
pub use init_db::run_init_db;
pub use results::{run_record_result, run_result_exists, RecordResultArgs, ResultExistsArgs};
pub use submit::{run_submit, SubmitArgs};

/// Builds the shared connection manager for the active database.
pub fn connection_manager(config: &AppConfig) -> Arc<ConnectionManager> {
    Arc::new(ConnectionManager::mysql(
        config.active_database(),
        config.retry.clone(),
        config.logging.sql_debug,
    ))
}

/// Clap value parser for `YYYY-MM-DD` / `YYYYMMDD` dates.
pub fn parse_date(input: &str) -> Result<NaiveDate, String> {
    parse_trading_date(input).map_err(|e| e.to_string())
}
