//! Member-scoped feed handlers: authored posts and recommended posts.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{CursorPageResponse, FeedParams};
use crate::app_state::AppState;
use crate::domain::{FeedScope, MemberId, PostId};
use crate::error::{ApiError, ErrorResponse};

/// `GET /members/{member_id}/posts` — Posts written by the member.
///
/// # Errors
///
/// Returns [`ApiError::InvalidRequest`] when the page size is out of
/// bounds.
#[utoipa::path(
    get,
    path = "/api/v1/members/{member_id}/posts",
    tag = "Members",
    summary = "Author feed",
    description = "Returns one cursor page of posts written by the member, newest first.",
    params(
        ("member_id" = i64, Path, description = "Member id"),
        FeedParams,
    ),
    responses(
        (status = 200, description = "One feed page", body = CursorPageResponse),
        (status = 400, description = "Invalid page size", body = ErrorResponse),
    )
)]
pub async fn list_member_posts(
    State(state): State<AppState>,
    Path(member_id): Path<i64>,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .post_service
        .feed(
            FeedScope::ByAuthor(MemberId::from_raw(member_id)),
            params.size,
            params.start_id.map(PostId::from_raw),
        )
        .await?;
    Ok(Json(CursorPageResponse::from(page)))
}

/// `GET /members/{member_id}/recommended-posts` — Posts the member has
/// recommended, each item carrying the member's reason text.
///
/// # Errors
///
/// Returns [`ApiError::InvalidRequest`] when the page size is out of
/// bounds.
#[utoipa::path(
    get,
    path = "/api/v1/members/{member_id}/recommended-posts",
    tag = "Members",
    summary = "Recommender feed",
    description = "Returns one cursor page of posts the member has recommended, joined through the recommendation ledger. A post recommended for several reasons appears once per reason.",
    params(
        ("member_id" = i64, Path, description = "Member id"),
        FeedParams,
    ),
    responses(
        (status = 200, description = "One feed page", body = CursorPageResponse),
        (status = 400, description = "Invalid page size", body = ErrorResponse),
    )
)]
pub async fn list_recommended_posts(
    State(state): State<AppState>,
    Path(member_id): Path<i64>,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .post_service
        .feed(
            FeedScope::ByRecommender(MemberId::from_raw(member_id)),
            params.size,
            params.start_id.map(PostId::from_raw),
        )
        .await?;
    Ok(Json(CursorPageResponse::from(page)))
}

/// Member-scoped feed routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/members/{member_id}/posts", get(list_member_posts))
        .route(
            "/members/{member_id}/recommended-posts",
            get(list_recommended_posts),
        )
}
