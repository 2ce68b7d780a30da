pub mod config;
pub mod error;
pub mod records;
pub mod types;

#[cfg(feature = "classification")]
pub mod classification;

#[cfg(feature = "aggregation")]
pub mod aggregation;

#[cfg(feature = "population")]
pub mod population;

#[cfg(feature = "concentration")]
pub mod concentration;

#[cfg(feature = "comparison")]
pub mod comparison;

#[cfg(feature = "report")]
pub mod report;

pub use config::EngineConfig;
pub use error::LendingAnalyticsError;
pub use records::AggregateLoanRecord;
pub use types::*;

/// Standard result type for all lending-analytics operations
pub type LendingAnalyticsResult<T> = Result<T, LendingAnalyticsError>;
