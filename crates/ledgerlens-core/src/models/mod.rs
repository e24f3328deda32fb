//! Data models for the intake service
//!
//! Organized by domain: uploads and their parsed rows, email verification, and
//! admission control.

mod rate_limit;
mod upload;
mod verification;

pub use rate_limit::*;
pub use upload::*;
pub use verification::*;
