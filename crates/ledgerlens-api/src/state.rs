//! Application state shared by all handlers

use ledgerlens_core::IntakeConfig;
use ledgerlens_services::UploadOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub config: IntakeConfig,
    pub orchestrator: UploadOrchestrator,
}
