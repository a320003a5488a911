//! Factor submission command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use factor_platform_data::{ConnectionManager, FactorStore, FactorSubmission, SubmitOutcome};
use serde_json::Value;

/// Arguments for the submit command.
///
/// Either give the fields individually or read a JSON record with `--from-file`.
#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    /// Factor name (e.g., "RMI")
    #[arg(long, required_unless_present = "from_file")]
    pub name: Option<String>,

    /// Factor version (e.g., "v1.2.0")
    #[arg(long, required_unless_present = "from_file")]
    pub version: Option<String>,

    /// Factor type (e.g., "stock")
    #[arg(long, required_unless_present = "from_file")]
    pub factor_type: Option<String>,

    /// Author of the submission
    #[arg(long, required_unless_present = "from_file")]
    pub submitted_by: Option<String>,

    /// Factor parameters as a JSON object (e.g., '{"period": 14}')
    #[arg(long)]
    pub args: Option<String>,

    /// Reviewer or review link
    #[arg(long)]
    pub review_by: Option<String>,

    /// Review notes
    #[arg(long)]
    pub review_notes: Option<String>,

    /// JSON file with factor_name, version, factor_type, submitted_by and optional fields
    #[arg(
        long,
        conflicts_with_all = ["name", "version", "factor_type", "submitted_by", "args", "review_by", "review_notes"]
    )]
    pub from_file: Option<PathBuf>,
}

fn build_submission(args: &SubmitArgs) -> Result<FactorSubmission> {
    if let Some(path) = &args.from_file {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not valid JSON", path.display()))?;
        return Ok(FactorSubmission::try_from(value)?);
    }

    let mut submission = FactorSubmission::new(
        args.name.clone().unwrap_or_default(),
        args.version.clone().unwrap_or_default(),
        args.factor_type.clone().unwrap_or_default(),
        args.submitted_by.clone().unwrap_or_default(),
    )?;

    if let Some(raw) = &args.args {
        let value: Value = serde_json::from_str(raw).context("--args is not valid JSON")?;
        let Value::Object(map) = value else {
            bail!("--args must be a JSON object");
        };
        submission = submission.with_args(map);
    }
    if let Some(review_by) = &args.review_by {
        submission = submission.with_review_by(review_by);
    }
    if let Some(notes) = &args.review_notes {
        submission = submission.with_review_notes(notes);
    }

    Ok(submission)
}

/// Runs the submit command.
///
/// # Errors
/// Returns an error if the submission is invalid or the insert fails.
pub async fn run_submit(args: SubmitArgs, manager: &Arc<ConnectionManager>) -> Result<()> {
    let submission = build_submission(&args)?;

    let mut store = FactorStore::new(manager);
    let result = store.submit(&submission).await;
    store.close().await;

    match result? {
        SubmitOutcome::Inserted => println!("Submitted {}", submission.identity()),
        SubmitOutcome::AlreadySubmitted => {
            println!("{} was already submitted", submission.identity());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use factor_platform_data::ValidationError;
    use std::io::Write;

    fn args() -> SubmitArgs {
        SubmitArgs {
            name: Some("RMI".to_string()),
            version: Some("v1.2.0".to_string()),
            factor_type: Some("stock".to_string()),
            submitted_by: Some("alice".to_string()),
            args: None,
            review_by: None,
            review_notes: None,
            from_file: None,
        }
    }

    #[test]
    fn test_build_from_flags() {
        let mut args = args();
        args.args = Some(r#"{"period": 14}"#.to_string());
        args.review_by = Some("bob".to_string());

        let submission = build_submission(&args).unwrap();

        assert_eq!(submission.identity(), "RMI@v1.2.0");
        assert_eq!(submission.args().get("period"), Some(&serde_json::json!(14)));
        assert_eq!(submission.review_by(), Some("bob"));
    }

    #[test]
    fn test_args_must_be_object() {
        let mut args = args();
        args.args = Some("[1, 2]".to_string());

        assert!(build_submission(&args).is_err());
    }

    #[test]
    fn test_blank_field_is_validation_error() {
        let mut args = args();
        args.submitted_by = Some("  ".to_string());

        let err = build_submission(&args).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::MissingField("submitted_by"))
        );
    }

    #[test]
    fn test_build_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"factor_name": "RMI", "version": "v2", "factor_type": "stock",
                "submitted_by": "alice", "factor_args": {{"momentum": 3}}}}"#
        )
        .unwrap();

        let args = SubmitArgs {
            from_file: Some(file.path().to_path_buf()),
            name: None,
            version: None,
            factor_type: None,
            submitted_by: None,
            ..args()
        };
        let submission = build_submission(&args).unwrap();

        assert_eq!(submission.identity(), "RMI@v2");
        assert_eq!(submission.args().get("momentum"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn test_file_missing_field_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"factor_name": "RMI", "version": "v2"}}"#).unwrap();

        let args = SubmitArgs {
            from_file: Some(file.path().to_path_buf()),
            ..args()
        };
        assert!(build_submission(&args).is_err());
    }
}
