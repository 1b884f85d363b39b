//! Request extractors for the authentication boundary.
//!
//! Authentication itself is external: the fronting gateway verifies the
//! session and forwards the member id in the `X-Member-Id` header. This
//! service only parses that header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::MemberId;
use crate::error::ApiError;

/// Header carrying the authenticated member id.
pub const MEMBER_HEADER: &str = "x-member-id";

/// The authenticated member forwarded by the gateway.
#[derive(Debug, Clone, Copy)]
pub struct CurrentMember(pub MemberId);

impl<S> FromRequestParts<S> for CurrentMember
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(MEMBER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<i64>().ok())
            .map(|raw| Self(MemberId::from_raw(raw)))
            .ok_or_else(|| {
                ApiError::InvalidRequest("missing or malformed X-Member-Id header".to_string())
            })
    }
}
