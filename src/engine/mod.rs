//! Domain rules: the check catalogue, account approval, check submission,
//! record verification and the dashboard read models.

pub mod approval;
pub mod catalog;
pub mod health;
pub mod submission;
pub mod verification;

pub use catalog::{validate_catalog, CatalogError, CheckCategory, CHECK_TEMPLATES};
pub use health::{classify_health, Health, StatusCounts};
pub use submission::{submit_daily, submit_weekly, Submitter};
pub use verification::{CheckKind, TransitionOutcome};
