use std::sync::Arc;

use crate::recommend::RecommendationEngine;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
    /// Used when a request does not pass `top_n`
    pub default_top_n: usize,
}

impl AppState {
    pub fn new(engine: Arc<RecommendationEngine>, default_top_n: usize) -> Self {
        Self {
            engine,
            default_top_n,
        }
    }
}
