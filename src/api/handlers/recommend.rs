//! Recommendation handler.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::CreateRecommendRequest;
use crate::api::extract::CurrentMember;
use crate::app_state::AppState;
use crate::domain::PostId;
use crate::error::{ApiError, ErrorResponse};

/// `POST /posts/{id}/recommend` — Recommend a post for one or more
/// reasons.
///
/// # Errors
///
/// Returns [`ApiError::PostNotFound`] for an unknown post,
/// [`ApiError::DuplicateRecommendation`] when any reason in the batch
/// is already recorded for this member and post (the whole batch is
/// rejected), or a validation failure for an empty reason list.
#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/recommend",
    tag = "Recommendations",
    summary = "Recommend a post",
    description = "Records one recommendation per reason for the calling member and increments the post's counter. A duplicate (member, post, reason) triple rejects the whole batch.",
    params(
        ("id" = i64, Path, description = "Post id"),
    ),
    request_body = CreateRecommendRequest,
    responses(
        (status = 204, description = "Recommendations recorded"),
        (status = 400, description = "Empty or blank reason list", body = ErrorResponse),
        (status = 404, description = "Post not found", body = ErrorResponse),
        (status = 409, description = "Duplicate recommendation", body = ErrorResponse),
    )
)]
pub async fn create_recommend(
    State(state): State<AppState>,
    CurrentMember(member_id): CurrentMember,
    Path(id): Path<i64>,
    Json(request): Json<CreateRecommendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .recommend_service
        .add_recommendation(
            PostId::from_raw(id),
            member_id,
            request.content,
            request.reasons,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Recommendation routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/posts/{id}/recommend", post(create_recommend))
}
