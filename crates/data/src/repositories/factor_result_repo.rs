//! Factor result repository.

use sqlx::mysql::MySqlConnection;
use sqlx::types::Json;

use crate::models::{NewFactorResult, ResultKey};

/// Repository for `factor_result` statements.
#[derive(Debug, Clone, Copy)]
pub struct FactorResultRepository;

impl FactorResultRepository {
    /// Inserts a result pointer. No de-duplication happens here.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn insert(
        conn: &mut MySqlConnection,
        result: &NewFactorResult,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            INSERT INTO factor_result
                (factor_name, version, code, data_type, factor_path,
                 calculated_date, data_status, extra_info)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&result.key.name)
        .bind(&result.key.version)
        .bind(&result.key.code)
        .bind(&result.data_type)
        .bind(&result.factor_path)
        .bind(result.key.date)
        .bind(result.data_status)
        .bind(result.extra_info.as_ref().map(Json))
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Counts result rows for a key.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn count(conn: &mut MySqlConnection, key: &ResultKey) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*)
            FROM factor_result
            WHERE factor_name = ? AND version = ? AND code = ? AND calculated_date = ?
            ",
        )
        .bind(&key.name)
        .bind(&key.version)
        .bind(&key.code)
        .bind(key.date)
        .fetch_one(&mut *conn)
        .await
    }
}
