//! Factor result model.
//!
//! A `factor_result` row points at a stored artifact for one
//! (factor, version, instrument, date). Its existence means the result does
//! not need recomputing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status written for a successfully stored result.
pub const DATA_STATUS_OK: i32 = 1;

/// Identity of a computed result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultKey {
    pub name: String,
    pub version: String,
    pub code: String,
    pub date: NaiveDate,
}

impl ResultKey {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        code: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            code: code.into(),
            date,
        }
    }

    /// `name@version code date`, used in logs and errors.
    #[must_use]
    pub fn identity(&self) -> String {
        format!(
            "{}@{} {} {}",
            self.name,
            self.version,
            self.code,
            self.date.format("%Y%m%d")
        )
    }
}

/// A result row to insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFactorResult {
    pub key: ResultKey,
    /// Result category, usually the factor type
    pub data_type: String,
    /// Storage location of the artifact
    pub factor_path: String,
    pub data_status: i32,
    pub extra_info: Option<Value>,
}

impl NewFactorResult {
    pub fn new(key: ResultKey, data_type: impl Into<String>, factor_path: impl Into<String>) -> Self {
        Self {
            key,
            data_type: data_type.into(),
            factor_path: factor_path.into(),
            data_status: DATA_STATUS_OK,
            extra_info: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, data_status: i32) -> Self {
        self.data_status = data_status;
        self
    }

    #[must_use]
    pub fn with_extra_info(mut self, extra_info: Value) -> Self {
        self.extra_info = Some(extra_info);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> ResultKey {
        ResultKey::new(
            "RMI",
            "v1.2.0",
            "600000.SH",
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
        )
    }

    #[test]
    fn test_result_key_identity() {
        assert_eq!(key().identity(), "RMI@v1.2.0 600000.SH 20250303");
    }

    #[test]
    fn test_new_result_defaults_to_ok_status() {
        let result = NewFactorResult::new(key(), "stock", "stock/RMI/20250303/600000.SH.parquet");

        assert_eq!(result.data_status, DATA_STATUS_OK);
        assert!(result.extra_info.is_none());
    }

    #[test]
    fn test_new_result_builders() {
        let result = NewFactorResult::new(key(), "stock", "p")
            .with_status(0)
            .with_extra_info(json!({"rows": 240}));

        assert_eq!(result.data_status, 0);
        assert_eq!(result.extra_info, Some(json!({"rows": 240})));
    }
}
