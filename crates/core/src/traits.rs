use crate::series::{FactorOutput, MarketSeries};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

/// Source of raw instrument time series.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch(&self, code: &str, date: NaiveDate) -> Result<MarketSeries>;
}

/// A single factor computation: fed data and parameters, then run.
pub trait Factor: Send {
    fn name(&self) -> &str;
    fn set_data(&mut self, series: MarketSeries);
    fn set_params(&mut self, params: &Value) -> Result<()>;
    fn run(&mut self) -> Result<()>;
    fn result(&self) -> Result<FactorOutput>;
}

/// Constructs factors by name.
pub trait FactorEngine: Send + Sync {
    fn create(&self, name: &str) -> Result<Box<dyn Factor>>;
}

/// Persists computed factor artifacts by storage path.
#[async_trait]
pub trait ResultStorage: Send + Sync {
    /// Writes `output` to `path`. `Ok(false)` means the backend refused the write.
    async fn put(&self, path: &str, output: &FactorOutput) -> Result<bool>;
    async fn get(&self, path: &str) -> Result<FactorOutput>;
}
