//! The catalog operations orchestration depends on.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{FactorDefinition, FactorSubmission, NewFactorResult, ResultKey, SubmitOutcome};
use crate::store::FactorStore;

/// Factor catalog as seen by the compute pipeline.
///
/// Implemented by [`FactorStore`]; in-memory implementations are used in tests.
#[async_trait]
pub trait FactorCatalog: Send {
    /// Submits a factor version.
    async fn submit(&mut self, submission: &FactorSubmission) -> Result<SubmitOutcome, StoreError>;

    /// Latest approved version; [`StoreError::NotFound`] for unknown names.
    async fn latest_approved(&mut self, name: &str) -> Result<Option<FactorDefinition>, StoreError>;

    /// Whether a result row exists.
    async fn result_exists(&mut self, key: &ResultKey) -> Result<bool, StoreError>;

    /// Records a stored result.
    async fn record_result(&mut self, result: &NewFactorResult) -> Result<(), StoreError>;
}

#[async_trait]
impl FactorCatalog for FactorStore {
    async fn submit(&mut self, submission: &FactorSubmission) -> Result<SubmitOutcome, StoreError> {
        FactorStore::submit(self, submission).await
    }

    async fn latest_approved(&mut self, name: &str) -> Result<Option<FactorDefinition>, StoreError> {
        FactorStore::latest_approved(self, name).await
    }

    async fn result_exists(&mut self, key: &ResultKey) -> Result<bool, StoreError> {
        FactorStore::result_exists(self, key).await
    }

    async fn record_result(&mut self, result: &NewFactorResult) -> Result<(), StoreError> {
        FactorStore::record_result(self, result).await
    }
}
