//! Database models split into domain-specific modules.

pub mod audit;
pub mod check_type;
pub mod common;
pub mod daily_check;
pub mod database;
pub mod user;
pub mod weekly_check;

pub use audit::*;
pub use check_type::*;
pub use common::*;
pub use daily_check::*;
pub use database::*;
pub use user::*;
pub use weekly_check::*;
