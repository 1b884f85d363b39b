//! Service error types with HTTP status code mapping.
//!
//! [`ApiError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::ids::{MemberId, PostId};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "post not found: 42",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`ApiError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category           | HTTP Status                      |
/// |-----------|--------------------|----------------------------------|
/// | 1000–1999 | Validation         | 400 Bad Request                  |
/// | 2000–2999 | Not Found/Conflict | 403 / 404 / 409                  |
/// | 3000–3999 | Server             | 500 Internal Server Error        |
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Post with the given ID was not found.
    #[error("post not found: {0}")]
    PostNotFound(PostId),

    /// Member with the given ID is not known to the profile store.
    #[error("member not found: {0}")]
    MemberNotFound(MemberId),

    /// Pricing plan name did not resolve against the catalog.
    #[error("pricing plan not found: {0}")]
    PricingPlanNotFound(String),

    /// Submission key was already claimed by an earlier request.
    ///
    /// This is an expected outcome of client retries, not a fault; it is
    /// logged at info level and reported as a conflict so the caller can
    /// stop retrying.
    #[error("duplicate submission: key {0} already used")]
    DuplicateSubmission(uuid::Uuid),

    /// The (member, post, reason) triple is already recorded in the ledger.
    #[error("member {member} already recommended post {post} for \"{reason}\"")]
    DuplicateRecommendation {
        /// Recommending member.
        member: MemberId,
        /// Target post.
        post: PostId,
        /// Offending reason text.
        reason: String,
    },

    /// Caller is not allowed to perform the operation on this resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Persistence layer failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::PostNotFound(_) => 2001,
            Self::MemberNotFound(_) => 2002,
            Self::PricingPlanNotFound(_) => 2003,
            Self::DuplicateSubmission(_) => 2004,
            Self::DuplicateRecommendation { .. } => 2005,
            Self::Forbidden(_) => 2006,
            Self::Storage(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::PostNotFound(_)
            | Self::MemberNotFound(_)
            | Self::PricingPlanNotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateSubmission(_) | Self::DuplicateRecommendation { .. } => {
                StatusCode::CONFLICT
            }
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
