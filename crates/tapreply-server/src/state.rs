use std::sync::Arc;

use tapreply_core::SuggestionEngine;

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SuggestionEngine>,
}

impl AppState {
    pub fn new(engine: SuggestionEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}
