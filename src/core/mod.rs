//! Core types and the traits external services are accessed through

pub mod config;
pub mod cost;
pub mod directory;
pub mod email;
pub mod log;
pub mod period;
pub mod summary;

// Re-export main types for cleaner imports
pub use cost::{CostGroup, CostProvider};
pub use directory::{Account, DirectoryProvider, TeamProvider};
pub use email::{EmailBody, EmailMessage, EmailSender};
pub use period::{CostPeriod, report_periods};
pub use summary::{OwnerSummary, ReportSummary, Usage, UsageByAccount};
