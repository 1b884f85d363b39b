//! Read-side projections produced by the feed query engine.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ids::{MemberId, PostId, SnapshotId};

/// Which slice of the feed a query targets.
///
/// All three shapes return the same [`PostView`] projection; the
/// recommender shape additionally carries the member's own reason text
/// per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedScope {
    /// Every post, most recent first.
    Global,
    /// Posts written by the given member.
    ByAuthor(MemberId),
    /// Posts the given member has recommended, joined through the ledger.
    ByRecommender(MemberId),
}

/// One media attachment in a projection, in explicit sequence order.
#[derive(Debug, Clone, Serialize)]
pub struct MediaView {
    /// Resolved file URL.
    pub url: String,
    /// Position within the snapshot's media list.
    pub sequence: i32,
}

/// Aggregated read projection of one post: the current snapshot joined
/// with author profile, pricing plan, tags, media and product links.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    /// Post identity (also the pagination key).
    pub id: PostId,
    /// Author nickname, if the profile is known.
    pub nickname: Option<String>,
    /// Author handle, if the profile is known.
    pub user_handle: Option<String>,
    /// Creation time of the current snapshot (not of the post).
    pub created_at: DateTime<Utc>,
    /// Whether the author is a registered maker of the product.
    pub is_maker: bool,
    /// Author avatar URL.
    pub avatar_url: Option<String>,
    /// Current snapshot title.
    pub title: String,
    /// Current snapshot description.
    pub description: String,
    /// Pricing plan name of the current snapshot.
    pub pricing_plan: String,
    /// Deduplicated tag names.
    pub tags: Vec<String>,
    /// Denormalized recommendation counter.
    pub recommend_count: i64,
    /// Current snapshot id (used for the second-pass media fetch).
    #[serde(skip)]
    pub snapshot_id: SnapshotId,
    /// Ordered media attachments of the current snapshot.
    pub media: Vec<MediaView>,
    /// Deduplicated external product links.
    pub urls: Vec<String>,
    /// The requesting recommender's reason text; present only in the
    /// by-recommender shape.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One cursor page of feed items.
///
/// `next_id` is the last item's post id when the page is full, signalling
/// that another page may exist; `None` terminates the walk.
#[derive(Debug, Clone, Serialize)]
pub struct CursorPage {
    /// Page items, ordered by post id descending.
    pub items: Vec<PostView>,
    /// Cursor for the next page, if any.
    pub next_id: Option<PostId>,
}

impl CursorPage {
    /// Packages a storage page, deriving the next cursor from the page
    /// size: a short page means the walk is exhausted.
    #[must_use]
    pub fn new(items: Vec<PostView>, page_size: usize) -> Self {
        let next_id = if items.len() == page_size {
            items.last().map(|item| item.id)
        } else {
            None
        };
        Self { items, next_id }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn view(id: i64) -> PostView {
        PostView {
            id: PostId::from_raw(id),
            nickname: Some("ada".to_string()),
            user_handle: Some("ada".to_string()),
            created_at: Utc::now(),
            is_maker: false,
            avatar_url: None,
            title: "t".to_string(),
            description: "d".to_string(),
            pricing_plan: "Free".to_string(),
            tags: vec![],
            recommend_count: 0,
            snapshot_id: SnapshotId::from_raw(id),
            media: vec![],
            urls: vec![],
            reason: None,
        }
    }

    #[test]
    fn full_page_yields_next_cursor() {
        let page = CursorPage::new(vec![view(5), view(4)], 2);
        assert_eq!(page.next_id, Some(PostId::from_raw(4)));
    }

    #[test]
    fn short_page_terminates_walk() {
        let page = CursorPage::new(vec![view(3)], 2);
        assert_eq!(page.next_id, None);
    }

    #[test]
    fn empty_page_terminates_walk() {
        let page = CursorPage::new(Vec::new(), 2);
        assert!(page.items.is_empty());
        assert_eq!(page.next_id, None);
    }
}
