//! Post service: validation and orchestration of the post write and
//! read paths.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::{CreatePost, CursorPage, FeedScope, MemberId, PostContent, PostId, PostView};
use crate::error::ApiError;
use crate::storage::Storage;

/// Largest page a feed query will serve.
pub const MAX_PAGE_SIZE: i64 = 20;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: i64 = 5;

/// Orchestration layer for post creation, edits and feed reads.
///
/// Stateless coordinator over the storage seam: validates input,
/// supplies the clock, and packages cursor pages. All atomicity lives
/// in the storage operations.
#[derive(Clone)]
pub struct PostService {
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for PostService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostService").finish_non_exhaustive()
    }
}

impl PostService {
    /// Creates a new `PostService`.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Creates a post through the idempotent-creation protocol.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] on malformed input,
    /// [`ApiError::DuplicateSubmission`] on a replayed key (an expected
    /// outcome, logged at info), or the storage operation's errors.
    pub async fn create(&self, cmd: CreatePost) -> Result<PostId, ApiError> {
        if cmd.product_name.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "product name must not be blank".to_string(),
            ));
        }
        validate_content(&cmd.content)?;

        match self.storage.create_post(&cmd, Utc::now()).await {
            Ok(post_id) => {
                tracing::info!(%post_id, writer = %cmd.writer_id, "post created");
                Ok(post_id)
            }
            Err(err @ ApiError::DuplicateSubmission(_)) => {
                // A retried request reaching us twice is normal traffic.
                tracing::info!(key = %cmd.submission_key, "submission key replayed");
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Writes a new content snapshot for the post and repoints it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] on malformed content,
    /// [`ApiError::PostNotFound`] / [`ApiError::Forbidden`] from the
    /// storage checks, or a storage failure.
    pub async fn update(
        &self,
        post_id: PostId,
        editor: MemberId,
        content: PostContent,
    ) -> Result<(), ApiError> {
        validate_content(&content)?;

        let snapshot_id = self
            .storage
            .update_post(post_id, editor, &content, Utc::now())
            .await?;
        tracing::info!(%post_id, %snapshot_id, editor = %editor, "post content updated");
        Ok(())
    }

    /// Fetches the aggregated projection of one post.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::PostNotFound`] when the post does not exist,
    /// or a storage failure.
    pub async fn get(&self, post_id: PostId) -> Result<PostView, ApiError> {
        self.storage
            .post_view(post_id)
            .await?
            .ok_or(ApiError::PostNotFound(post_id))
    }

    /// Fetches one cursor page of the requested feed shape.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] when the page size is out
    /// of bounds, or a storage failure.
    pub async fn feed(
        &self,
        scope: FeedScope,
        page_size: i64,
        cursor: Option<PostId>,
    ) -> Result<CursorPage, ApiError> {
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ApiError::InvalidRequest(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
            )));
        }

        let items = self.storage.feed_page(scope, page_size, cursor).await?;
        Ok(CursorPage::new(items, page_size as usize))
    }
}

/// Rejects content that could not be snapshotted meaningfully.
fn validate_content(content: &PostContent) -> Result<(), ApiError> {
    if content.title.trim().is_empty() {
        return Err(ApiError::InvalidRequest(
            "title must not be blank".to_string(),
        ));
    }
    if content.pricing_plan.trim().is_empty() {
        return Err(ApiError::InvalidRequest(
            "pricing plan must not be blank".to_string(),
        ));
    }
    if content.tags.iter().any(|tag| tag.trim().is_empty()) {
        return Err(ApiError::InvalidRequest(
            "tags must not be blank".to_string(),
        ));
    }

    let mut sequences: Vec<i32> = content.media.iter().map(|media| media.sequence).collect();
    sequences.sort_unstable();
    sequences.dedup();
    if sequences.len() != content.media.len() {
        return Err(ApiError::InvalidRequest(
            "media sequence numbers must be unique".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{MediaInput, MemberProfile};
    use crate::storage::MemoryStorage;
    use uuid::Uuid;

    fn content() -> PostContent {
        PostContent {
            title: "a sharp little tool".to_string(),
            description: "does one thing well".to_string(),
            pricing_plan: "Free".to_string(),
            tags: vec!["cli".to_string()],
            media: vec![MediaInput {
                url: "https://files.example/shot.png".to_string(),
                sequence: 1,
            }],
        }
    }

    fn cmd(key: Uuid) -> CreatePost {
        CreatePost {
            submission_key: key,
            writer_id: MemberId::from_raw(1),
            product_name: "sharptool".to_string(),
            links: vec![],
            is_maker: false,
            content: content(),
        }
    }

    async fn service() -> PostService {
        let storage = Arc::new(MemoryStorage::new());
        let profile = MemberProfile {
            member_id: MemberId::from_raw(1),
            nickname: "ada".to_string(),
            user_handle: "ada".to_string(),
            avatar_url: None,
        };
        let Ok(()) = storage.upsert_member_profile(&profile).await else {
            panic!("profile upsert failed");
        };
        PostService::new(storage)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let service = service().await;
        let Ok(post_id) = service.create(cmd(Uuid::new_v4())).await else {
            panic!("creation failed");
        };

        let Ok(view) = service.get(post_id).await else {
            panic!("get failed");
        };
        assert_eq!(view.title, "a sharp little tool");
        assert_eq!(view.recommend_count, 0);
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let service = service().await;
        let mut bad = cmd(Uuid::new_v4());
        bad.content.title = "   ".to_string();
        let result = service.create(bad).await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn duplicate_media_sequence_is_rejected() {
        let service = service().await;
        let mut bad = cmd(Uuid::new_v4());
        bad.content.media = vec![
            MediaInput {
                url: "https://files.example/a.png".to_string(),
                sequence: 1,
            },
            MediaInput {
                url: "https://files.example/b.png".to_string(),
                sequence: 1,
            },
        ];
        let result = service.create(bad).await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn get_unknown_post_is_not_found() {
        let service = service().await;
        let result = service.get(PostId::from_raw(404)).await;
        assert!(matches!(result, Err(ApiError::PostNotFound(_))));
    }

    #[tokio::test]
    async fn oversized_page_is_rejected() {
        let service = service().await;
        let result = service.feed(FeedScope::Global, MAX_PAGE_SIZE + 1, None).await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));

        let result = service.feed(FeedScope::Global, 0, None).await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn feed_page_carries_next_cursor_only_when_full() {
        let service = service().await;
        for _ in 0..3 {
            let Ok(_) = service.create(cmd(Uuid::new_v4())).await else {
                panic!("creation failed");
            };
        }

        let Ok(page) = service.feed(FeedScope::Global, 2, None).await else {
            panic!("feed failed");
        };
        assert_eq!(page.items.len(), 2);
        let Some(cursor) = page.next_id else {
            panic!("expected next cursor");
        };

        let Ok(tail) = service.feed(FeedScope::Global, 2, Some(cursor)).await else {
            panic!("feed failed");
        };
        assert_eq!(tail.items.len(), 1);
        assert_eq!(tail.next_id, None);
    }
}
