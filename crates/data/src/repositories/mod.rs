//! Database repositories for the factor platform.
//!
//! Repositories hold the SQL for one table each and run on a borrowed
//! connection; transaction boundaries belong to [`crate::store::FactorStore`].

pub mod factor_info_repo;
pub mod factor_result_repo;

pub use factor_info_repo::FactorInfoRepository;
pub use factor_result_repo::FactorResultRepository;
