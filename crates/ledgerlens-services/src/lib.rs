//! LedgerLens Services Library
//!
//! The stateful parts of intake:
//! - Email verification (codes, attempt limiting, signed tokens)
//! - Code delivery over SMTP
//! - Upload sessions and the retention sweeper
//! - The upload orchestrator tying admission, validation and export together

pub mod mailer;
pub mod orchestrator;
pub mod pipeline;
pub mod sessions;
pub mod sweeper;
pub mod verification;

pub use mailer::{mailer_from_config, CodeMailer, LogMailer, SmtpMailer};
pub use orchestrator::{CsvExport, ExportAuth, UploadOrchestrator, UploadOutcome, UploadRequest};
pub use pipeline::{Categorizer, DocumentExtractor, NoopExtractor, PassthroughCategorizer};
pub use sessions::{MemorySessionStore, SessionStore};
pub use sweeper::{RetentionSweeper, SweepReport};
pub use verification::{
    CodeStore, IssuedToken, MemoryCodeStore, Redemption, TokenSigner, VerificationGate,
};
