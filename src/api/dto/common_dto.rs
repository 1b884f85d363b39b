//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::post_dto::PostViewDto;
use crate::domain::CursorPage;
use crate::service::DEFAULT_PAGE_SIZE;

/// Cursor-pagination query parameters for feed endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FeedParams {
    /// Requested page size (1..=20). Defaults to 5.
    #[serde(default = "default_page_size")]
    pub size: i64,
    /// Exclusive upper bound for post ids: return posts with `id <
    /// start_id`. Omit for the first page.
    #[serde(default)]
    pub start_id: Option<i64>,
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

/// One cursor page of feed items.
#[derive(Debug, Serialize, ToSchema)]
pub struct CursorPageResponse {
    /// Page items, newest first.
    pub items: Vec<PostViewDto>,
    /// Cursor for the next page; absent when the walk is exhausted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_id: Option<i64>,
}

impl From<CursorPage> for CursorPageResponse {
    fn from(page: CursorPage) -> Self {
        Self {
            items: page.items.into_iter().map(PostViewDto::from).collect(),
            next_id: page.next_id.map(i64::from),
        }
    }
}
