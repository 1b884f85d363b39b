//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All feed and post endpoints are mounted under `/api/v1`.

pub mod dto;
pub mod extract;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document covering every mounted endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    paths(
        handlers::post::create_post,
        handlers::post::list_posts,
        handlers::post::get_post,
        handlers::post::update_post,
        handlers::recommend::create_recommend,
        handlers::member::list_member_posts,
        handlers::member::list_recommended_posts,
        handlers::system::health_handler,
    ),
    components(schemas(
        dto::CreatePostRequest,
        dto::CreatePostResponse,
        dto::UpdatePostRequest,
        dto::CreateRecommendRequest,
        dto::CursorPageResponse,
        dto::PostViewDto,
        dto::MediaDto,
        handlers::system::HealthResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    ))
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}
