pub mod factors;
pub mod registry;
pub mod runner;

pub use factors::RmiFactor;
pub use registry::FactorRegistry;
pub use runner::{result_path, ComputeOutcome, FactorRunner, ResultSource};
