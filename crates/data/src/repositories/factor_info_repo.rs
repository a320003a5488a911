//! Factor definition repository.
//!
//! Statement-level access to `factor_info`. Functions run on a caller-supplied
//! connection so the store can group them inside one transaction.

use sqlx::mysql::{MySql, MySqlConnection};
use sqlx::types::Json;
use sqlx::QueryBuilder;

use crate::models::{FactorInfoRow, FactorStatus, FactorSubmission, PendingFilter, Review};

/// Repository for `factor_info` statements.
#[derive(Debug, Clone, Copy)]
pub struct FactorInfoRepository;

impl FactorInfoRepository {
    /// Inserts a new pending factor version.
    ///
    /// # Errors
    /// Returns the driver error unchanged, including unique violations on
    /// (factor_name, version).
    pub async fn insert(
        conn: &mut MySqlConnection,
        submission: &FactorSubmission,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            INSERT INTO factor_info
                (factor_name, version, factor_args, factor_type, factor_status,
                 submitted_by, review_by, review_notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(submission.name())
        .bind(submission.version())
        .bind(Json(submission.args()))
        .bind(submission.factor_type())
        .bind(FactorStatus::Pending.as_code())
        .bind(submission.submitted_by())
        .bind(submission.review_by())
        .bind(submission.review_notes())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Reads the status code of one version, locking the row until the
    /// surrounding transaction ends.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn status_for_update(
        conn: &mut MySqlConnection,
        name: &str,
        version: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r"
            SELECT factor_status
            FROM factor_info
            WHERE factor_name = ? AND version = ?
            FOR UPDATE
            ",
        )
        .bind(name)
        .bind(version)
        .fetch_optional(&mut *conn)
        .await
    }

    /// Marks a version approved, keeping existing review fields when none
    /// are supplied.
    ///
    /// # Errors
    /// Returns an error if the database update fails.
    pub async fn mark_approved(
        conn: &mut MySqlConnection,
        name: &str,
        version: &str,
        review: Option<&Review>,
    ) -> Result<u64, sqlx::Error> {
        let reviewer = review.and_then(|r| r.reviewer.as_deref());
        let notes = review.and_then(|r| r.notes.as_deref());

        let result = sqlx::query(
            r"
            UPDATE factor_info
            SET factor_status = ?,
                review_by = COALESCE(?, review_by),
                review_notes = COALESCE(?, review_notes)
            WHERE factor_name = ? AND version = ?
            ",
        )
        .bind(FactorStatus::Approved.as_code())
        .bind(reviewer)
        .bind(notes)
        .bind(name)
        .bind(version)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Lists every version of a factor in submission order.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn versions(
        conn: &mut MySqlConnection,
        name: &str,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r"
            SELECT version
            FROM factor_info
            WHERE factor_name = ?
            ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(name)
        .fetch_all(&mut *conn)
        .await
    }

    /// Lists distinct factor names.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn names(conn: &mut MySqlConnection) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r"
            SELECT DISTINCT factor_name
            FROM factor_info
            ORDER BY factor_name ASC
            ",
        )
        .fetch_all(&mut *conn)
        .await
    }

    /// Counts rows for a name, optionally narrowed to one version.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn count(
        conn: &mut MySqlConnection,
        name: &str,
        version: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let mut query = count_query(name, version);
        query
            .build_query_scalar::<i64>()
            .fetch_one(&mut *conn)
            .await
    }

    /// Fetches one version.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get(
        conn: &mut MySqlConnection,
        name: &str,
        version: &str,
    ) -> Result<Option<FactorInfoRow>, sqlx::Error> {
        sqlx::query_as::<_, FactorInfoRow>(
            r"
            SELECT factor_name, version, factor_args, factor_type, factor_status,
                   submitted_by, review_by, review_notes, created_at, updated_at
            FROM factor_info
            WHERE factor_name = ? AND version = ?
            ",
        )
        .bind(name)
        .bind(version)
        .fetch_optional(&mut *conn)
        .await
    }

    /// Fetches the most recently updated approved version of a factor.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn latest_approved(
        conn: &mut MySqlConnection,
        name: &str,
    ) -> Result<Option<FactorInfoRow>, sqlx::Error> {
        sqlx::query_as::<_, FactorInfoRow>(
            r"
            SELECT factor_name, version, factor_args, factor_type, factor_status,
                   submitted_by, review_by, review_notes, created_at, updated_at
            FROM factor_info
            WHERE factor_name = ? AND factor_status = ?
            ORDER BY updated_at DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(name)
        .bind(FactorStatus::Approved.as_code())
        .fetch_optional(&mut *conn)
        .await
    }

    /// Fetches pending versions matching the filter.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn pending(
        conn: &mut MySqlConnection,
        filter: &PendingFilter,
    ) -> Result<Vec<FactorInfoRow>, sqlx::Error> {
        let mut query = pending_query(filter);
        query
            .build_query_as::<FactorInfoRow>()
            .fetch_all(&mut *conn)
            .await
    }
}

pub(crate) fn pending_query(filter: &PendingFilter) -> QueryBuilder<'_, MySql> {
    let mut query = QueryBuilder::new(
        "SELECT factor_name, version, factor_args, factor_type, factor_status, \
         submitted_by, review_by, review_notes, created_at, updated_at \
         FROM factor_info WHERE factor_status = ",
    );
    query.push_bind(FactorStatus::Pending.as_code());

    if let Some(name) = &filter.name {
        query.push(" AND factor_name = ");
        query.push_bind(name.as_str());
    }
    if let Some(version) = &filter.version {
        query.push(" AND version = ");
        query.push_bind(version.as_str());
    }

    query.push(" ORDER BY factor_name ASC, created_at ASC, id ASC");
    query
}

pub(crate) fn count_query<'a>(name: &'a str, version: Option<&'a str>) -> QueryBuilder<'a, MySql> {
    let mut query = QueryBuilder::new("SELECT COUNT(*) FROM factor_info WHERE factor_name = ");
    query.push_bind(name);

    if let Some(version) = version {
        query.push(" AND version = ");
        query.push_bind(version);
    }

    query
}
