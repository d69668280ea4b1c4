pub mod aggregator;
pub mod handler;
pub mod types;

pub use aggregator::HealthAggregator;
pub use types::HealthCheckResult;
