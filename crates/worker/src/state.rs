use std::sync::Arc;

use pdfpost_core::{ClaimStore, Config, Ledger, SanitizedConfig, Worker};

/// Shared application state
pub struct AppState {
    config: Config,
    worker: Arc<Worker>,
    claims: Arc<dyn ClaimStore>,
    ledger: Arc<dyn Ledger>,
}

impl AppState {
    pub fn new(
        config: Config,
        worker: Arc<Worker>,
        claims: Arc<dyn ClaimStore>,
        ledger: Arc<dyn Ledger>,
    ) -> Self {
        Self {
            config,
            worker,
            claims,
            ledger,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    pub fn claims(&self) -> &dyn ClaimStore {
        self.claims.as_ref()
    }

    pub fn ledger(&self) -> &dyn Ledger {
        self.ledger.as_ref()
    }
}
