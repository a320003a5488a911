//! Data models for the factor platform tables.

pub mod factor_info;
pub mod factor_result;

pub use factor_info::{
    ApproveOutcome, FactorDefinition, FactorInfoRow, FactorStatus, FactorSubmission,
    PendingFilter, Review, SubmitOutcome,
};
pub use factor_result::{NewFactorResult, ResultKey, DATA_STATUS_OK};

pub(crate) use factor_info::factor_identity;
