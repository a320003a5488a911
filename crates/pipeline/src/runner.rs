//! Compute-or-fetch orchestration.
//!
//! [`FactorRunner`] resolves the latest approved version of a factor, serves a
//! stored result when the catalog already records one and otherwise computes
//! it from market data, writes the artifact and records it.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use factor_platform_core::{FactorEngine, FactorOutput, MarketDataSource, ResultStorage};
use factor_platform_data::{
    FactorCatalog, FactorSubmission, NewFactorResult, ResultKey, SubmitOutcome, DATA_STATUS_OK,
};
use serde_json::Value;

/// Where a returned result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    /// Read back from storage; nothing was computed.
    Cached,
    /// Computed, written and recorded by this call.
    Computed,
}

/// A factor result for one instrument and date.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeOutcome {
    pub version: String,
    pub path: String,
    pub source: ResultSource,
    pub output: FactorOutput,
}

/// Storage path of a result: `{factor_type}/{name}/{YYYYMMDD}/{code}.parquet`.
#[must_use]
pub fn result_path(factor_type: &str, name: &str, date: NaiveDate, code: &str) -> String {
    format!(
        "{factor_type}/{name}/{}/{code}.parquet",
        date.format("%Y%m%d")
    )
}

pub struct FactorRunner<C: FactorCatalog> {
    catalog: C,
    market: Arc<dyn MarketDataSource>,
    engine: Arc<dyn FactorEngine>,
    storage: Arc<dyn ResultStorage>,
}

impl<C: FactorCatalog> FactorRunner<C> {
    pub fn new(
        catalog: C,
        market: Arc<dyn MarketDataSource>,
        engine: Arc<dyn FactorEngine>,
        storage: Arc<dyn ResultStorage>,
    ) -> Self {
        Self {
            catalog,
            market,
            engine,
            storage,
        }
    }

    pub fn catalog_mut(&mut self) -> &mut C {
        &mut self.catalog
    }

    pub fn into_catalog(self) -> C {
        self.catalog
    }

    /// Registers a factor version in the catalog.
    ///
    /// # Errors
    /// Returns an error if the catalog write fails.
    pub async fn register_factor(&mut self, submission: &FactorSubmission) -> Result<SubmitOutcome> {
        let outcome = self
            .catalog
            .submit(submission)
            .await
            .with_context(|| format!("Failed to register factor {}", submission.identity()))?;
        Ok(outcome)
    }

    /// Returns the result for `code` on `date`, computing it when missing.
    ///
    /// `Ok(None)` means a stored result could not be read back, or storage
    /// refused the write of a fresh one.
    ///
    /// # Errors
    /// Returns an error if the factor has no approved version, or if the
    /// catalog, market data or factor computation fails.
    pub async fn compute_or_fetch(
        &mut self,
        code: &str,
        date: NaiveDate,
        name: &str,
        factor_type: &str,
    ) -> Result<Option<ComputeOutcome>> {
        let definition = self
            .catalog
            .latest_approved(name)
            .await
            .with_context(|| format!("Failed to resolve factor {name}"))?
            .with_context(|| format!("Factor {name} has no approved version"))?;
        let version = definition.version.clone();
        tracing::info!(factor = name, version = %version, code, %date, "resolved factor version");

        let path = result_path(factor_type, name, date, code);
        let key = ResultKey::new(name, &version, code, date);

        if self.catalog.result_exists(&key).await? {
            tracing::info!(factor = name, code, path = %path, "factor result already recorded");
            return match self.storage.get(&path).await {
                Ok(output) => Ok(Some(ComputeOutcome {
                    version,
                    path,
                    source: ResultSource::Cached,
                    output,
                })),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "failed to read stored factor result");
                    Ok(None)
                }
            };
        }

        let series = self
            .market
            .fetch(code, date)
            .await
            .with_context(|| format!("Failed to fetch market data for {code} on {date}"))?;

        let mut factor = self.engine.create(name)?;
        factor.set_data(series);
        factor.set_params(&Value::Object(definition.args.clone()))?;
        factor
            .run()
            .with_context(|| format!("Factor {name} failed on {code}"))?;
        let output = factor.result()?;

        if !self.storage.put(&path, &output).await? {
            tracing::warn!(path = %path, "storage rejected factor result");
            return Ok(None);
        }

        let record = NewFactorResult::new(key, factor_type, &path).with_status(DATA_STATUS_OK);
        self.catalog.record_result(&record).await?;
        tracing::info!(
            factor = name,
            code,
            points = output.len(),
            path = %path,
            "factor result computed"
        );

        Ok(Some(ComputeOutcome {
            version,
            path,
            source: ResultSource::Computed,
            output,
        }))
    }
}
