use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use factor_platform_data::{ApproveOutcome, ConnectionManager, FactorStore, Review};

/// Arguments for the approve command.
#[derive(Args, Debug, Clone)]
pub struct ApproveArgs {
    /// Factor name
    #[arg(long)]
    pub name: String,

    /// Version to approve
    #[arg(long)]
    pub version: String,

    /// Reviewer recorded with the approval
    #[arg(long)]
    pub reviewer: Option<String>,

    /// Review notes recorded with the approval
    #[arg(long)]
    pub notes: Option<String>,
}

impl ApproveArgs {
    fn review(&self) -> Option<Review> {
        if self.reviewer.is_none() && self.notes.is_none() {
            return None;
        }
        Some(Review {
            reviewer: self.reviewer.clone(),
            notes: self.notes.clone(),
        })
    }
}

/// Runs the approve command.
///
/// # Errors
/// Returns an error if the database operation fails.
pub async fn run_approve(args: ApproveArgs, manager: &Arc<ConnectionManager>) -> Result<()> {
    let review = args.review();

    let mut store = FactorStore::new(manager);
    let result = store.approve(&args.name, &args.version, review.as_ref()).await;
    store.close().await;

    let identity = format!("{}@{}", args.name, args.version);
    match result? {
        ApproveOutcome::Approved => println!("Approved {identity}"),
        ApproveOutcome::AlreadyApproved => println!("{identity} is already approved"),
        ApproveOutcome::NotFound => println!("{identity} does not exist"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_only_when_supplied() {
        let mut args = ApproveArgs {
            name: "RMI".to_string(),
            version: "v1".to_string(),
            reviewer: None,
            notes: None,
        };
        assert!(args.review().is_none());

        args.notes = Some("ok".to_string());
        let review = args.review().unwrap();
        assert_eq!(review.reviewer, None);
        assert_eq!(review.notes.as_deref(), Some("ok"));
    }
}
