//! LedgerLens API Library
//!
//! HTTP surface for statement intake: uploads, email verification and gated export.

pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
pub mod utils;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
