//! Email verification
//!
//! One-time codes delivered by email, checked against a per-email attempt
//! bucket, and exchanged for a signed token that unlocks export.

mod gate;
mod store;
mod token;

pub use gate::{IssuedToken, VerificationGate};
pub use store::{CodeStore, MemoryCodeStore, Redemption};
pub use token::TokenSigner;
