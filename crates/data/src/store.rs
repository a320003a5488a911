//! Transactional access to the factor catalog.
//!
//! [`FactorStore`] owns one worker connection. Each public operation opens a
//! transaction, runs its statements through the repositories and commits; a
//! failed statement rolls back before the error is returned. A transaction
//! that is dropped without commit is rolled back by the driver.

use std::sync::Arc;

use sqlx::migrate::Migrator;
use sqlx::mysql::MySql;
use sqlx::{Connection, Transaction};

use crate::connection::{ConnectionManager, MySqlConnector, WorkerConnection};
use crate::error::{is_unique_violation, StoreError};
use crate::models::{
    factor_identity, ApproveOutcome, FactorDefinition, FactorStatus, FactorSubmission,
    NewFactorResult, PendingFilter, ResultKey, Review, SubmitOutcome,
};
use crate::repositories::{FactorInfoRepository, FactorResultRepository};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Factor metadata store bound to a single worker connection.
pub struct FactorStore {
    worker: WorkerConnection<MySqlConnector>,
}

impl FactorStore {
    /// Creates a store with its own connection slot. No connection is opened
    /// until the first operation.
    pub fn new(manager: &Arc<ConnectionManager<MySqlConnector>>) -> Self {
        Self {
            worker: manager.worker(),
        }
    }

    async fn begin(
        &mut self,
        operation: &'static str,
        factor: &str,
    ) -> Result<Transaction<'_, MySql>, StoreError> {
        let conn = self.worker.acquire().await?;
        conn.begin()
            .await
            .map_err(|e| transaction_failed(operation, factor, "begin", e))
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    /// Returns an error if the connection or any migration fails.
    pub async fn migrate(&mut self) -> Result<(), StoreError> {
        let conn = self.worker.acquire().await?;
        MIGRATOR.run(conn).await?;
        tracing::info!("factor schema is up to date");
        Ok(())
    }

    /// Submits a new factor version with pending status.
    ///
    /// A second submission of the same (name, version) is not an error.
    ///
    /// # Errors
    /// Returns an error if the connection or insert fails.
    pub async fn submit(
        &mut self,
        submission: &FactorSubmission,
    ) -> Result<SubmitOutcome, StoreError> {
        const OP: &str = "submit";
        let factor = submission.identity();
        let mut tx = self.begin(OP, &factor).await?;

        match FactorInfoRepository::insert(&mut *tx, submission).await {
            Ok(()) => {
                commit(tx, OP, &factor).await?;
                tracing::info!(
                    factor = %factor,
                    submitted_by = submission.submitted_by(),
                    "factor submitted"
                );
                Ok(SubmitOutcome::Inserted)
            }
            Err(e) if is_unique_violation(&e) => {
                rollback(tx, OP, &factor).await;
                tracing::warn!(factor = %factor, "factor version already submitted");
                Ok(SubmitOutcome::AlreadySubmitted)
            }
            Err(e) => Err(abort(tx, OP, &factor, e).await),
        }
    }

    /// Moves a pending version to approved.
    ///
    /// The row is locked for the duration of the check and update. When a
    /// review is supplied its reviewer and notes are stored as well.
    ///
    /// # Errors
    /// Returns an error if the connection or any statement fails.
    pub async fn approve(
        &mut self,
        name: &str,
        version: &str,
        review: Option<&Review>,
    ) -> Result<ApproveOutcome, StoreError> {
        const OP: &str = "approve";
        let factor = factor_identity(name, Some(version));
        let mut tx = self.begin(OP, &factor).await?;

        let status = match FactorInfoRepository::status_for_update(&mut *tx, name, version).await {
            Ok(status) => status,
            Err(e) => return Err(abort(tx, OP, &factor, e).await),
        };

        match status.as_deref().map(FactorStatus::from_code) {
            None => {
                rollback(tx, OP, &factor).await;
                tracing::warn!(factor = %factor, "cannot approve unknown factor version");
                return Ok(ApproveOutcome::NotFound);
            }
            Some(Some(FactorStatus::Approved)) => {
                rollback(tx, OP, &factor).await;
                tracing::warn!(factor = %factor, "factor version already approved");
                return Ok(ApproveOutcome::AlreadyApproved);
            }
            Some(_) => {}
        }

        // TODO: check approval criteria here once a review policy exists
        if let Err(e) = FactorInfoRepository::mark_approved(&mut *tx, name, version, review).await {
            return Err(abort(tx, OP, &factor, e).await);
        }
        commit(tx, OP, &factor).await?;

        tracing::info!(
            factor = %factor,
            reviewer = review.and_then(|r| r.reviewer.as_deref()),
            "factor approved"
        );
        Ok(ApproveOutcome::Approved)
    }

    /// Lists every version of a factor in submission order.
    ///
    /// # Errors
    /// Returns an error if the connection or query fails.
    pub async fn list_versions(&mut self, name: &str) -> Result<Vec<String>, StoreError> {
        const OP: &str = "list_versions";
        let mut tx = self.begin(OP, name).await?;
        let versions = FactorInfoRepository::versions(&mut *tx, name).await;
        finish(tx, OP, name, versions).await
    }

    /// Lists all distinct factor names.
    ///
    /// # Errors
    /// Returns an error if the connection or query fails.
    pub async fn list_names(&mut self) -> Result<Vec<String>, StoreError> {
        const OP: &str = "list_names";
        const ALL: &str = "*";
        let mut tx = self.begin(OP, ALL).await?;
        let names = FactorInfoRepository::names(&mut *tx).await;
        finish(tx, OP, ALL, names).await
    }

    /// Returns the most recently updated approved version of a factor.
    ///
    /// `Ok(None)` means the factor exists but has no approved version.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] when the name has no rows at all, or
    /// an error if the connection or query fails.
    pub async fn latest_approved(
        &mut self,
        name: &str,
    ) -> Result<Option<FactorDefinition>, StoreError> {
        const OP: &str = "latest_approved";
        let mut tx = self.begin(OP, name).await?;

        let known = match FactorInfoRepository::count(&mut *tx, name, None).await {
            Ok(count) => count > 0,
            Err(e) => return Err(abort(tx, OP, name, e).await),
        };
        if !known {
            rollback(tx, OP, name).await;
            return Err(StoreError::not_found(name));
        }

        let row = FactorInfoRepository::latest_approved(&mut *tx, name).await;
        let row = finish(tx, OP, name, row).await?;
        if row.is_none() {
            tracing::debug!(factor = name, "no approved version");
        }
        Ok(row.map(FactorDefinition::from))
    }

    /// Lists pending versions, optionally narrowed by name and version.
    ///
    /// # Errors
    /// Returns an error if the connection or query fails.
    pub async fn pending(
        &mut self,
        filter: &PendingFilter,
    ) -> Result<Vec<FactorDefinition>, StoreError> {
        const OP: &str = "pending";
        let factor = filter
            .name
            .as_deref()
            .map_or_else(|| "*".to_string(), |name| factor_identity(name, filter.version.as_deref()));
        let mut tx = self.begin(OP, &factor).await?;
        let rows = FactorInfoRepository::pending(&mut *tx, filter).await;
        let rows = finish(tx, OP, &factor, rows).await?;
        Ok(rows.into_iter().map(FactorDefinition::from).collect())
    }

    /// Returns true if the factor (or the given version of it) exists.
    ///
    /// # Errors
    /// Returns an error if the connection or query fails.
    pub async fn exists(&mut self, name: &str, version: Option<&str>) -> Result<bool, StoreError> {
        const OP: &str = "exists";
        let factor = factor_identity(name, version);
        let mut tx = self.begin(OP, &factor).await?;
        let count = FactorInfoRepository::count(&mut *tx, name, version).await;
        Ok(finish(tx, OP, &factor, count).await? > 0)
    }

    /// Fetches one version regardless of status.
    ///
    /// # Errors
    /// Returns an error if the connection or query fails.
    pub async fn get(
        &mut self,
        name: &str,
        version: &str,
    ) -> Result<Option<FactorDefinition>, StoreError> {
        const OP: &str = "get";
        let factor = factor_identity(name, Some(version));
        let mut tx = self.begin(OP, &factor).await?;
        let row = FactorInfoRepository::get(&mut *tx, name, version).await;
        Ok(finish(tx, OP, &factor, row).await?.map(FactorDefinition::from))
    }

    /// Records where a computed result was stored.
    ///
    /// # Errors
    /// Returns an error if the connection or insert fails.
    pub async fn record_result(&mut self, result: &NewFactorResult) -> Result<(), StoreError> {
        const OP: &str = "record_result";
        let factor = result.key.identity();
        let mut tx = self.begin(OP, &factor).await?;
        let inserted = FactorResultRepository::insert(&mut *tx, result).await;
        finish(tx, OP, &factor, inserted).await?;

        tracing::info!(
            factor = %factor,
            path = %result.factor_path,
            "factor result recorded"
        );
        Ok(())
    }

    /// Returns true if a result row exists for the key.
    ///
    /// # Errors
    /// Returns an error if the connection or query fails.
    pub async fn result_exists(&mut self, key: &ResultKey) -> Result<bool, StoreError> {
        const OP: &str = "result_exists";
        let factor = key.identity();
        let mut tx = self.begin(OP, &factor).await?;
        let count = FactorResultRepository::count(&mut *tx, key).await;
        Ok(finish(tx, OP, &factor, count).await? > 0)
    }

    /// Closes the underlying connection. Safe to call more than once.
    pub async fn close(&mut self) {
        self.worker.release().await;
    }
}

async fn commit(
    tx: Transaction<'_, MySql>,
    operation: &'static str,
    factor: &str,
) -> Result<(), StoreError> {
    tx.commit()
        .await
        .map_err(|e| transaction_failed(operation, factor, "commit", e))?;
    tracing::debug!(operation, factor, "transaction committed");
    Ok(())
}

async fn rollback(tx: Transaction<'_, MySql>, operation: &'static str, factor: &str) {
    if let Err(e) = tx.rollback().await {
        tracing::error!(operation, factor, error = %e, "rollback failed");
    }
}

async fn abort(
    tx: Transaction<'_, MySql>,
    operation: &'static str,
    factor: &str,
    source: sqlx::Error,
) -> StoreError {
    rollback(tx, operation, factor).await;
    transaction_failed(operation, factor, "rolled back", source)
}

/// Logs a failed transaction step and wraps the cause.
fn transaction_failed(
    operation: &'static str,
    factor: &str,
    stage: &'static str,
    source: sqlx::Error,
) -> StoreError {
    tracing::error!(operation, factor, stage, error = %source, "transaction failed");
    StoreError::transaction(operation, factor, source)
}

/// Commits on success, rolls back on failure.
async fn finish<T>(
    tx: Transaction<'_, MySql>,
    operation: &'static str,
    factor: &str,
    result: Result<T, sqlx::Error>,
) -> Result<T, StoreError> {
    match result {
        Ok(value) => {
            commit(tx, operation, factor).await?;
            Ok(value)
        }
        Err(e) => Err(abort(tx, operation, factor, e).await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_failure_keeps_context() {
        let err = transaction_failed("approve", "RMI@v1", "commit", sqlx::Error::PoolTimedOut);

        match &err {
            StoreError::Transaction {
                operation, factor, ..
            } => {
                assert_eq!(*operation, "approve");
                assert_eq!(factor, "RMI@v1");
            }
            other => panic!("expected a transaction error, got {other:?}"),
        }
        assert!(!err.is_validation());
    }
}
