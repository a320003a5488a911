//! Factor definition model.
//!
//! Covers the `factor_info` table: what a factor is, who submitted it, and
//! where it sits in the pending → approved lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// Approval state of a factor version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactorStatus {
    /// Submitted, awaiting approval
    Pending,
    /// Approved for computation
    Approved,
}

impl FactorStatus {
    /// Column encoding used in `factor_info.factor_status`.
    #[must_use]
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Pending => "0",
            Self::Approved => "1",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "0" => Some(Self::Pending),
            "1" => Some(Self::Approved),
            _ => None,
        }
    }
}

impl std::fmt::Display for FactorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
        }
    }
}

/// A stored factor version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorDefinition {
    pub name: String,
    pub version: String,
    /// Parameters handed to the factor when it runs
    pub args: Map<String, Value>,
    pub factor_type: String,
    pub status: FactorStatus,
    pub submitted_by: String,
    pub review_by: Option<String>,
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FactorDefinition {
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.status == FactorStatus::Approved
    }

    /// `name@version`, used in logs and errors.
    #[must_use]
    pub fn identity(&self) -> String {
        factor_identity(&self.name, Some(&self.version))
    }
}

/// Raw `factor_info` row as read from MySQL.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FactorInfoRow {
    pub factor_name: String,
    pub version: String,
    pub factor_args: Option<sqlx::types::Json<Value>>,
    pub factor_type: String,
    pub factor_status: String,
    pub submitted_by: String,
    pub review_by: Option<String>,
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FactorInfoRow> for FactorDefinition {
    fn from(row: FactorInfoRow) -> Self {
        let args = match row.factor_args.map(|json| json.0) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        // Anything that is not explicitly approved is treated as pending.
        let status = FactorStatus::from_code(&row.factor_status).unwrap_or(FactorStatus::Pending);

        Self {
            name: row.factor_name,
            version: row.version,
            args,
            factor_type: row.factor_type,
            status,
            submitted_by: row.submitted_by,
            review_by: row.review_by,
            review_notes: row.review_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A validated request to register a factor version.
///
/// Required fields are checked at construction; optional ones default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorSubmission {
    name: String,
    version: String,
    factor_type: String,
    submitted_by: String,
    args: Map<String, Value>,
    review_by: Option<String>,
    review_notes: Option<String>,
}

impl FactorSubmission {
    /// Creates a submission.
    ///
    /// # Errors
    /// Returns [`ValidationError::MissingField`] if any argument is blank.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        factor_type: impl Into<String>,
        submitted_by: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            name: required("factor_name", name.into())?,
            version: required("version", version.into())?,
            factor_type: required("factor_type", factor_type.into())?,
            submitted_by: required("submitted_by", submitted_by.into())?,
            args: Map::new(),
            review_by: None,
            review_notes: None,
        })
    }

    #[must_use]
    pub fn with_args(mut self, args: Map<String, Value>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_review_by(mut self, review_by: impl Into<String>) -> Self {
        self.review_by = Some(review_by.into());
        self
    }

    #[must_use]
    pub fn with_review_notes(mut self, notes: impl Into<String>) -> Self {
        self.review_notes = Some(notes.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn factor_type(&self) -> &str {
        &self.factor_type
    }

    pub fn submitted_by(&self) -> &str {
        &self.submitted_by
    }

    pub fn args(&self) -> &Map<String, Value> {
        &self.args
    }

    pub fn review_by(&self) -> Option<&str> {
        self.review_by.as_deref()
    }

    pub fn review_notes(&self) -> Option<&str> {
        self.review_notes.as_deref()
    }

    #[must_use]
    pub fn identity(&self) -> String {
        factor_identity(&self.name, Some(&self.version))
    }
}

/// Parses an untyped payload such as a JSON submission file.
impl TryFrom<Value> for FactorSubmission {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut map) = value else {
            return Err(ValidationError::NotAnObject);
        };

        let mut submission = Self::new(
            take_string(&mut map, "factor_name")?,
            take_string(&mut map, "version")?,
            take_string(&mut map, "factor_type")?,
            take_string(&mut map, "submitted_by")?,
        )?;

        match map.remove("factor_args") {
            None | Some(Value::Null) => {}
            Some(Value::Object(args)) => submission.args = args,
            Some(_) => return Err(ValidationError::InvalidArgs),
        }
        submission.review_by = take_optional_string(&mut map, "review_by")?;
        submission.review_notes = take_optional_string(&mut map, "review_notes")?;

        Ok(submission)
    }
}

/// Optional reviewer details recorded on approval.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Review {
    pub reviewer: Option<String>,
    pub notes: Option<String>,
}

/// Filters for pending-factor queries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingFilter {
    pub name: Option<String>,
    pub version: Option<String>,
}

impl PendingFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            version: None,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Result of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Inserted,
    /// The (name, version) pair already existed; nothing was written.
    AlreadySubmitted,
}

/// Result of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproveOutcome {
    Approved,
    NotFound,
    AlreadyApproved,
}

pub(crate) fn factor_identity(name: &str, version: Option<&str>) -> String {
    match version {
        Some(version) => format!("{name}@{version}"),
        None => name.to_string(),
    }
}

fn required(field: &'static str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

fn take_string(map: &mut Map<String, Value>, field: &'static str) -> Result<String, ValidationError> {
    match map.remove(field) {
        Some(Value::String(s)) => Ok(s),
        _ => Err(ValidationError::MissingField(field)),
    }
}

fn take_optional_string(
    map: &mut Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, ValidationError> {
    match map.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ValidationError::NotAString(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_codes_round_trip() {
        assert_eq!(FactorStatus::Pending.as_code(), "0");
        assert_eq!(FactorStatus::Approved.as_code(), "1");
        assert_eq!(FactorStatus::from_code("1"), Some(FactorStatus::Approved));
        assert_eq!(FactorStatus::from_code("x"), None);
    }

    #[test]
    fn test_submission_requires_fields() {
        let ok = FactorSubmission::new("RMI", "v1.2.0", "stock", "alice").unwrap();
        assert_eq!(ok.name(), "RMI");
        assert!(ok.args().is_empty());
        assert_eq!(ok.review_by(), None);

        assert_eq!(
            FactorSubmission::new("RMI", "v1.2.0", "stock", "  ").unwrap_err(),
            ValidationError::MissingField("submitted_by")
        );
        assert_eq!(
            FactorSubmission::new("", "v1.2.0", "stock", "alice").unwrap_err(),
            ValidationError::MissingField("factor_name")
        );
    }

    #[test]
    fn test_submission_trims_identity() {
        let submission = FactorSubmission::new(" RMI ", "v1.2.0 ", "stock", "alice").unwrap();
        assert_eq!(submission.identity(), "RMI@v1.2.0");
    }

    #[test]
    fn test_submission_from_json() {
        let submission = FactorSubmission::try_from(json!({
            "factor_name": "RMI",
            "version": "v1.1.0",
            "factor_type": "stock",
            "submitted_by": "jiang",
            "factor_args": {"period": 14, "momentum": 5},
            "review_notes": "first cut"
        }))
        .unwrap();

        assert_eq!(submission.version(), "v1.1.0");
        assert_eq!(submission.args()["period"], json!(14));
        assert_eq!(submission.review_notes(), Some("first cut"));
    }

    #[test]
    fn test_submission_from_json_missing_submitter() {
        let err = FactorSubmission::try_from(json!({
            "factor_name": "RMI",
            "version": "v1.1.0",
            "factor_type": "stock"
        }))
        .unwrap_err();

        assert_eq!(err, ValidationError::MissingField("submitted_by"));
    }

    #[test]
    fn test_submission_from_non_object() {
        assert_eq!(
            FactorSubmission::try_from(json!(["RMI", "v1"])).unwrap_err(),
            ValidationError::NotAnObject
        );
        assert_eq!(
            FactorSubmission::try_from(json!({
                "factor_name": "RMI",
                "version": "v1",
                "factor_type": "stock",
                "submitted_by": "alice",
                "factor_args": [1, 2]
            }))
            .unwrap_err(),
            ValidationError::InvalidArgs
        );
    }

    #[test]
    fn test_submission_review_fields_must_be_strings() {
        let base = json!({
            "factor_name": "RMI",
            "version": "v1",
            "factor_type": "stock",
            "submitted_by": "alice"
        });

        let mut payload = base.clone();
        payload["review_by"] = json!(42);
        assert_eq!(
            FactorSubmission::try_from(payload).unwrap_err(),
            ValidationError::NotAString("review_by")
        );

        let mut payload = base.clone();
        payload["review_notes"] = json!({"text": "ok"});
        assert_eq!(
            FactorSubmission::try_from(payload).unwrap_err(),
            ValidationError::NotAString("review_notes")
        );

        let mut payload = base;
        payload["review_by"] = Value::Null;
        payload["review_notes"] = json!("looks fine");
        let submission = FactorSubmission::try_from(payload).unwrap();
        assert_eq!(submission.review_by(), None);
        assert_eq!(submission.review_notes(), Some("looks fine"));
    }

    #[test]
    fn test_row_conversion_defaults() {
        let now = Utc::now();
        let row = FactorInfoRow {
            factor_name: "RMI".to_string(),
            version: "v1".to_string(),
            factor_args: None,
            factor_type: "stock".to_string(),
            factor_status: "1".to_string(),
            submitted_by: "alice".to_string(),
            review_by: None,
            review_notes: None,
            created_at: now,
            updated_at: now,
        };

        let definition = FactorDefinition::from(row);
        assert!(definition.is_approved());
        assert!(definition.args.is_empty());
        assert_eq!(definition.identity(), "RMI@v1");
    }

    #[test]
    fn test_pending_filter_builders() {
        let filter = PendingFilter::name("RMI").with_version("v1");
        assert_eq!(filter.name.as_deref(), Some("RMI"));
        assert_eq!(filter.version.as_deref(), Some("v1"));
        assert_eq!(PendingFilter::all(), PendingFilter::default());
    }
}
