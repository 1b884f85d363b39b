//! Post aggregate and the write-side command types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{MemberId, PostId, ProductId};

/// The post aggregate root.
///
/// A post never stores displayed content directly; content lives in
/// append-only snapshots, with a separate movable pointer naming the
/// current one. The only mutations after creation are pointer advances
/// and recommendation-counter increments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Storage-assigned identity, immutable once assigned.
    pub id: PostId,
    /// Member who published the post.
    pub writer_id: MemberId,
    /// Product the post advertises.
    pub product_id: ProductId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Denormalized recommendation counter, kept consistent with the
    /// ledger by atomic `+ N` updates inside the recommendation
    /// transaction.
    pub recommend_count: i64,
}

/// One ordered media attachment in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInput {
    /// Resolved file URL (upload and URL generation are external).
    pub url: String,
    /// Explicit position within the snapshot's media list.
    pub sequence: i32,
}

/// Editable content of a post, written as one immutable snapshot.
#[derive(Debug, Clone)]
pub struct PostContent {
    /// Post title.
    pub title: String,
    /// Long-form description.
    pub description: String,
    /// Pricing plan name, resolved against the catalog at write time.
    pub pricing_plan: String,
    /// Tag names; registered find-or-create, associated as a set.
    pub tags: Vec<String>,
    /// Ordered media attachments.
    pub media: Vec<MediaInput>,
}

/// Command to create a post, carried through the idempotent-creation
/// protocol.
#[derive(Debug, Clone)]
pub struct CreatePost {
    /// Client-supplied single-use token; at most one post is ever
    /// created per key.
    pub submission_key: Uuid,
    /// Authenticated author.
    pub writer_id: MemberId,
    /// Product name; the product row is found or created by name.
    pub product_name: String,
    /// External links attached to the product, deduplicated per product.
    pub links: Vec<String>,
    /// Whether the author registers as a maker of the product.
    pub is_maker: bool,
    /// Initial content snapshot.
    pub content: PostContent,
}

/// Externally-owned member profile data mirrored for feed joins.
///
/// The member system owns this data; the storage layer only exposes an
/// upsert provisioning hook so projections can join nickname, handle and
/// avatar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberProfile {
    /// Member identity from the external system.
    pub member_id: MemberId,
    /// Display name.
    pub nickname: String,
    /// Unique handle.
    pub user_handle: String,
    /// Resolved avatar URL, if any.
    pub avatar_url: Option<String>,
}
