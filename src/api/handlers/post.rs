//! Post handlers: create, global feed, detail, update.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CreatePostRequest, CreatePostResponse, CursorPageResponse, FeedParams, PostViewDto,
    UpdatePostRequest,
};
use crate::api::extract::CurrentMember;
use crate::app_state::AppState;
use crate::domain::{FeedScope, PostId};
use crate::error::{ApiError, ErrorResponse};

/// `POST /posts` — Publish a product post.
///
/// # Errors
///
/// Returns [`ApiError`] on validation failure, unknown writer or
/// pricing plan, or a replayed submission key.
#[utoipa::path(
    post,
    path = "/api/v1/posts",
    tag = "Posts",
    summary = "Publish a product post",
    description = "Creates a post at most once per submission key. Replays of the same key are answered with 409 and perform no writes.",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created", body = CreatePostResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Writer or pricing plan not found", body = ErrorResponse),
        (status = 409, description = "Submission key already used", body = ErrorResponse),
    )
)]
pub async fn create_post(
    State(state): State<AppState>,
    CurrentMember(member_id): CurrentMember,
    Json(request): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = request.into_command(member_id);
    let post_id = state.post_service.create(command).await?;

    let response = CreatePostResponse {
        id: post_id.as_raw(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /posts` — Global feed, newest first, cursor-paginated.
///
/// # Errors
///
/// Returns [`ApiError::InvalidRequest`] when the page size is out of
/// bounds.
#[utoipa::path(
    get,
    path = "/api/v1/posts",
    tag = "Posts",
    summary = "Global feed",
    description = "Returns one cursor page of aggregated posts ordered by post id descending. Pass the returned next_id as start_id to fetch the following page.",
    params(FeedParams),
    responses(
        (status = 200, description = "One feed page", body = CursorPageResponse),
        (status = 400, description = "Invalid page size", body = ErrorResponse),
    )
)]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .post_service
        .feed(
            FeedScope::Global,
            params.size,
            params.start_id.map(PostId::from_raw),
        )
        .await?;
    Ok(Json(CursorPageResponse::from(page)))
}

/// `GET /posts/{id}` — Aggregated detail of one post.
///
/// # Errors
///
/// Returns [`ApiError::PostNotFound`] if the post does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}",
    tag = "Posts",
    summary = "Post detail",
    description = "Returns the aggregated projection of one post: current snapshot, author, tags, media and links.",
    params(
        ("id" = i64, Path, description = "Post id"),
    ),
    responses(
        (status = 200, description = "Post detail", body = PostViewDto),
        (status = 404, description = "Post not found", body = ErrorResponse),
    )
)]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.post_service.get(PostId::from_raw(id)).await?;
    Ok(Json(PostViewDto::from(view)))
}

/// `PUT /posts/{id}` — Replace the displayed content with a new
/// snapshot.
///
/// # Errors
///
/// Returns [`ApiError::PostNotFound`] or [`ApiError::Forbidden`] from
/// the ownership check, or a validation failure.
#[utoipa::path(
    put,
    path = "/api/v1/posts/{id}",
    tag = "Posts",
    summary = "Update post content",
    description = "Appends a new immutable content snapshot and repoints the post to it; earlier snapshots stay in history.",
    params(
        ("id" = i64, Path, description = "Post id"),
    ),
    request_body = UpdatePostRequest,
    responses(
        (status = 204, description = "Content updated"),
        (status = 403, description = "Caller is not the writer", body = ErrorResponse),
        (status = 404, description = "Post not found", body = ErrorResponse),
    )
)]
pub async fn update_post(
    State(state): State<AppState>,
    CurrentMember(member_id): CurrentMember,
    Path(id): Path<i64>,
    Json(request): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .post_service
        .update(PostId::from_raw(id), member_id, request.into())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Post routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post).get(list_posts))
        .route("/posts/{id}", get(get_post).put(update_post))
}
