use sensitivity_core::policy::PolicyTable;
use sensitivity_core::Orchestrator;
use std::sync::Arc;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn policies(&self) -> &PolicyTable {
        self.orchestrator.policies()
    }
}
