//! Recommendation service: validation and duplicate-attempt logging
//! around the ledger write.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::{MemberId, PostId};
use crate::error::ApiError;
use crate::storage::Storage;

/// Orchestration layer for attaching recommendations to posts.
#[derive(Clone)]
pub struct RecommendService {
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for RecommendService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendService").finish_non_exhaustive()
    }
}

impl RecommendService {
    /// Creates a new `RecommendService`.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Records one recommendation per reason and bumps the post's
    /// counter, all-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] on an empty or blank reason
    /// list, [`ApiError::PostNotFound`] when the post does not exist,
    /// [`ApiError::DuplicateRecommendation`] when any
    /// (member, post, reason) triple is already recorded (no partial
    /// batch is applied), or a storage failure.
    pub async fn add_recommendation(
        &self,
        post_id: PostId,
        member_id: MemberId,
        content: String,
        reasons: Vec<String>,
    ) -> Result<(), ApiError> {
        if reasons.is_empty() {
            return Err(ApiError::InvalidRequest(
                "reason list must not be empty".to_string(),
            ));
        }
        if reasons.iter().any(|reason| reason.trim().is_empty()) {
            return Err(ApiError::InvalidRequest(
                "reasons must not be blank".to_string(),
            ));
        }

        match self
            .storage
            .add_recommendation(post_id, member_id, &content, &reasons, Utc::now())
            .await
        {
            Ok(added) => {
                tracing::info!(%post_id, member = %member_id, added, "recommendations recorded");
                Ok(())
            }
            Err(err @ ApiError::DuplicateRecommendation { .. }) => {
                tracing::warn!(
                    %post_id,
                    member = %member_id,
                    %err,
                    "duplicate recommendation attempt"
                );
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{CreatePost, MediaInput, MemberProfile, PostContent};
    use crate::storage::{MemoryStorage, Storage};
    use uuid::Uuid;

    async fn seeded() -> (Arc<MemoryStorage>, PostId) {
        let storage = Arc::new(MemoryStorage::new());
        for (id, handle) in [(1, "ada"), (2, "grace")] {
            let profile = MemberProfile {
                member_id: MemberId::from_raw(id),
                nickname: handle.to_string(),
                user_handle: handle.to_string(),
                avatar_url: None,
            };
            let Ok(()) = storage.upsert_member_profile(&profile).await else {
                panic!("profile upsert failed");
            };
        }

        let cmd = CreatePost {
            submission_key: Uuid::new_v4(),
            writer_id: MemberId::from_raw(1),
            product_name: "sharptool".to_string(),
            links: vec![],
            is_maker: false,
            content: PostContent {
                title: "a sharp little tool".to_string(),
                description: "does one thing well".to_string(),
                pricing_plan: "Free".to_string(),
                tags: vec![],
                media: Vec::<MediaInput>::new(),
            },
        };
        let Ok(post_id) = storage.create_post(&cmd, Utc::now()).await else {
            panic!("post creation failed");
        };
        (storage, post_id)
    }

    #[tokio::test]
    async fn empty_reason_list_is_rejected() {
        let (storage, post_id) = seeded().await;
        let service = RecommendService::new(storage);
        let result = service
            .add_recommendation(post_id, MemberId::from_raw(2), "great".to_string(), vec![])
            .await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn blank_reason_is_rejected() {
        let (storage, post_id) = seeded().await;
        let service = RecommendService::new(storage);
        let result = service
            .add_recommendation(
                post_id,
                MemberId::from_raw(2),
                "great".to_string(),
                vec!["  ".to_string()],
            )
            .await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn repeated_call_does_not_bump_counter() {
        let (storage, post_id) = seeded().await;
        let service = RecommendService::new(Arc::clone(&storage) as Arc<dyn Storage>);
        let reasons = vec!["cheap".to_string(), "clean design".to_string()];

        let first = service
            .add_recommendation(post_id, MemberId::from_raw(2), "great".to_string(), reasons.clone())
            .await;
        assert!(first.is_ok());

        let Ok(Some(post)) = storage.find_post(post_id).await else {
            panic!("post missing");
        };
        assert_eq!(post.recommend_count, 2);

        let second = service
            .add_recommendation(post_id, MemberId::from_raw(2), "great".to_string(), reasons)
            .await;
        assert!(matches!(
            second,
            Err(ApiError::DuplicateRecommendation { .. })
        ));

        let Ok(Some(post)) = storage.find_post(post_id).await else {
            panic!("post missing");
        };
        assert_eq!(post.recommend_count, 2);
    }

    #[tokio::test]
    async fn unknown_post_fails_before_any_write() {
        let (storage, _) = seeded().await;
        let service = RecommendService::new(Arc::clone(&storage) as Arc<dyn Storage>);
        let result = service
            .add_recommendation(
                PostId::from_raw(404),
                MemberId::from_raw(2),
                "great".to_string(),
                vec!["cheap".to_string()],
            )
            .await;
        assert!(matches!(result, Err(ApiError::PostNotFound(_))));
    }
}
