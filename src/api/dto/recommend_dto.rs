//! Recommendation DTOs.

use serde::Deserialize;
use utoipa::ToSchema;

/// Request body for `POST /posts/{id}/recommend`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRecommendRequest {
    /// Free-text endorsement shared by every reason in the batch.
    #[serde(default)]
    pub content: String,
    /// Canonical reason texts; each becomes one ledger row.
    pub reasons: Vec<String>,
}
