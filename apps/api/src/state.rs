use std::sync::Arc;

use crate::analysis::Analyzer;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the credential cache, so every request shares one token.
    pub analyzer: Arc<Analyzer>,
}
