//! Post-related DTOs for create, update, get and feed operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{CreatePost, MediaInput, MemberId, PostContent, PostView};

/// One media attachment on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MediaDto {
    /// Resolved file URL.
    pub url: String,
    /// Explicit position within the media list.
    pub sequence: i32,
}

impl From<MediaDto> for MediaInput {
    fn from(dto: MediaDto) -> Self {
        Self {
            url: dto.url,
            sequence: dto.sequence,
        }
    }
}

/// Request body for `POST /posts`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePostRequest {
    /// Client-supplied single-use token making the request idempotent.
    pub submission_key: Uuid,
    /// Product the post advertises; found or created by name.
    pub product_name: String,
    /// External links for the product.
    #[serde(default)]
    pub links: Vec<String>,
    /// Whether the author registers as a maker of the product.
    #[serde(default)]
    pub is_maker: bool,
    /// Post title.
    pub title: String,
    /// Long-form description.
    pub description: String,
    /// Pricing plan name from the catalog.
    pub pricing_plan: String,
    /// Tag names.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Ordered media attachments.
    #[serde(default)]
    pub media: Vec<MediaDto>,
}

impl CreatePostRequest {
    /// Builds the domain command for the authenticated writer.
    #[must_use]
    pub fn into_command(self, writer_id: MemberId) -> CreatePost {
        CreatePost {
            submission_key: self.submission_key,
            writer_id,
            product_name: self.product_name,
            links: self.links,
            is_maker: self.is_maker,
            content: PostContent {
                title: self.title,
                description: self.description,
                pricing_plan: self.pricing_plan,
                tags: self.tags,
                media: self.media.into_iter().map(MediaInput::from).collect(),
            },
        }
    }
}

/// Response body for `POST /posts` (201 Created).
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatePostResponse {
    /// Identifier of the created post.
    pub id: i64,
}

/// Request body for `PUT /posts/{id}`: the full replacement content of
/// the next snapshot.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePostRequest {
    /// Post title.
    pub title: String,
    /// Long-form description.
    pub description: String,
    /// Pricing plan name from the catalog.
    pub pricing_plan: String,
    /// Tag names.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Ordered media attachments.
    #[serde(default)]
    pub media: Vec<MediaDto>,
}

impl From<UpdatePostRequest> for PostContent {
    fn from(request: UpdatePostRequest) -> Self {
        Self {
            title: request.title,
            description: request.description,
            pricing_plan: request.pricing_plan,
            tags: request.tags,
            media: request.media.into_iter().map(MediaInput::from).collect(),
        }
    }
}

/// Aggregated post projection returned by detail and feed endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct PostViewDto {
    /// Post identifier (also the pagination key).
    pub id: i64,
    /// Author nickname.
    pub nickname: Option<String>,
    /// Author handle.
    pub user_handle: Option<String>,
    /// Creation time of the displayed snapshot.
    pub created_at: DateTime<Utc>,
    /// Whether the author is a registered maker of the product.
    pub is_maker: bool,
    /// Author avatar URL.
    pub avatar_url: Option<String>,
    /// Title of the displayed snapshot.
    pub title: String,
    /// Description of the displayed snapshot.
    pub description: String,
    /// Pricing plan name.
    pub pricing_plan: String,
    /// Deduplicated tag names.
    pub tags: Vec<String>,
    /// Recommendation counter.
    pub recommend_count: i64,
    /// Ordered media attachments.
    pub media: Vec<MediaDto>,
    /// Deduplicated product links.
    pub urls: Vec<String>,
    /// The requesting recommender's reason text (recommender feed only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<PostView> for PostViewDto {
    fn from(view: PostView) -> Self {
        Self {
            id: view.id.as_raw(),
            nickname: view.nickname,
            user_handle: view.user_handle,
            created_at: view.created_at,
            is_maker: view.is_maker,
            avatar_url: view.avatar_url,
            title: view.title,
            description: view.description,
            pricing_plan: view.pricing_plan,
            tags: view.tags,
            recommend_count: view.recommend_count,
            media: view
                .media
                .into_iter()
                .map(|media| MediaDto {
                    url: media.url,
                    sequence: media.sequence,
                })
                .collect(),
            urls: view.urls,
            reason: view.reason,
        }
    }
}
