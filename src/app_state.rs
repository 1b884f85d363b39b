//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::{PostService, RecommendService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Post creation, edits and feed reads.
    pub post_service: Arc<PostService>,
    /// Recommendation ledger writes.
    pub recommend_service: Arc<RecommendService>,
}
