//! Data access for the factor platform.
//!
//! This crate provides:
//! - Connection management with per-worker MySQL connections and retry
//! - Data models and repositories for `factor_info` and `factor_result`
//! - `FactorStore`, the transactional catalog API
//! - CSV market data and Parquet result storage

pub mod catalog;
pub mod connection;
pub mod csv_storage;
pub mod error;
pub mod models;
pub mod parquet_storage;
pub mod repositories;
pub mod store;

// Re-export commonly used types
pub use catalog::FactorCatalog;
pub use connection::{ConnectionManager, Connector, MySqlConnector, WorkerConnection};
pub use csv_storage::CsvMarketData;
pub use error::{StoreError, ValidationError};
pub use parquet_storage::ParquetResultStorage;
pub use store::FactorStore;

// Re-export models
pub use models::{
    ApproveOutcome, FactorDefinition, FactorStatus, FactorSubmission, NewFactorResult,
    PendingFilter, ResultKey, Review, SubmitOutcome, DATA_STATUS_OK,
};
