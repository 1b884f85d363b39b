//! In-memory implementation of the storage layer.
//!
//! Backs the test suite and local development. All state lives behind a
//! single `tokio::sync::RwLock`; every write method takes the write
//! guard for its whole duration, which gives each operation the same
//! all-or-nothing contract the PostgreSQL backend gets from
//! transactions. Reference checks run before the first mutation so a
//! failing call leaves the state untouched.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Storage;
use crate::domain::{
    CreatePost, FeedScope, MediaView, MemberId, MemberProfile, Post, PostContent, PostId,
    PostView, SnapshotId,
};
use crate::error::ApiError;

#[derive(Debug, Clone)]
struct PostRow {
    id: i64,
    writer_id: i64,
    product_id: i64,
    created_at: DateTime<Utc>,
    recommend_count: i64,
}

#[derive(Debug, Clone)]
struct SnapshotRow {
    post_id: i64,
    title: String,
    description: String,
    plan_id: i64,
    created_at: DateTime<Utc>,
    tags: Vec<String>,
    media: Vec<MediaView>,
}

#[derive(Debug, Clone)]
struct RecommendationRow {
    reason_id: i64,
    post_id: i64,
    member_id: i64,
}

/// Mutable store contents; one instance behind the lock.
#[derive(Debug, Default)]
struct MemoryState {
    members: HashMap<i64, MemberProfile>,
    plans_by_name: HashMap<String, i64>,
    plan_names: HashMap<i64, String>,
    products_by_name: HashMap<String, i64>,
    product_links: HashMap<i64, Vec<String>>,
    product_makers: HashSet<(i64, i64)>,
    posts: BTreeMap<i64, PostRow>,
    snapshots: HashMap<i64, SnapshotRow>,
    current_snapshot: HashMap<i64, i64>,
    tags: HashMap<String, i64>,
    reasons_by_value: HashMap<String, i64>,
    reason_values: HashMap<i64, String>,
    recommendations: Vec<RecommendationRow>,
    recommendation_keys: HashSet<(i64, i64, i64)>,
    submission_keys: HashSet<Uuid>,
    next_post: i64,
    next_snapshot: i64,
    next_tag: i64,
    next_reason: i64,
    next_product: i64,
}

impl MemoryState {
    fn next(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn resolve_product(&mut self, name: &str) -> i64 {
        if let Some(id) = self.products_by_name.get(name) {
            return *id;
        }
        let id = Self::next(&mut self.next_product);
        self.products_by_name.insert(name.to_string(), id);
        id
    }

    fn resolve_tag(&mut self, name: &str) -> i64 {
        if let Some(id) = self.tags.get(name) {
            return *id;
        }
        let id = Self::next(&mut self.next_tag);
        self.tags.insert(name.to_string(), id);
        id
    }

    fn resolve_reason(&mut self, value: &str) -> i64 {
        if let Some(id) = self.reasons_by_value.get(value) {
            return *id;
        }
        let id = Self::next(&mut self.next_reason);
        self.reasons_by_value.insert(value.to_string(), id);
        self.reason_values.insert(id, value.to_string());
        id
    }

    fn write_snapshot(&mut self, post_id: i64, content: &PostContent, now: DateTime<Utc>) -> i64 {
        let plan_id = self
            .plans_by_name
            .get(&content.pricing_plan)
            .copied()
            .unwrap_or_default();

        let mut tags: Vec<String> = Vec::new();
        for name in &content.tags {
            self.resolve_tag(name);
            if !tags.contains(name) {
                tags.push(name.clone());
            }
        }

        let mut media: Vec<MediaView> = content
            .media
            .iter()
            .map(|input| MediaView {
                url: input.url.clone(),
                sequence: input.sequence,
            })
            .collect();
        media.sort_by_key(|item| item.sequence);

        let snapshot_id = Self::next(&mut self.next_snapshot);
        self.snapshots.insert(
            snapshot_id,
            SnapshotRow {
                post_id,
                title: content.title.clone(),
                description: content.description.clone(),
                plan_id,
                created_at: now,
                tags,
                media,
            },
        );
        // Pointer flip is the last mutation, mirroring the relational
        // backend's write order.
        self.current_snapshot.insert(post_id, snapshot_id);
        snapshot_id
    }

    fn view_of(&self, post: &PostRow, reason: Option<String>) -> Option<PostView> {
        let snapshot_id = *self.current_snapshot.get(&post.id)?;
        let snapshot = self.snapshots.get(&snapshot_id)?;
        let profile = self.members.get(&post.writer_id);

        Some(PostView {
            id: PostId::from_raw(post.id),
            nickname: profile.map(|p| p.nickname.clone()),
            user_handle: profile.map(|p| p.user_handle.clone()),
            created_at: snapshot.created_at,
            is_maker: self
                .product_makers
                .contains(&(post.product_id, post.writer_id)),
            avatar_url: profile.and_then(|p| p.avatar_url.clone()),
            title: snapshot.title.clone(),
            description: snapshot.description.clone(),
            pricing_plan: self
                .plan_names
                .get(&snapshot.plan_id)
                .cloned()
                .unwrap_or_default(),
            tags: snapshot.tags.clone(),
            recommend_count: post.recommend_count,
            snapshot_id: SnapshotId::from_raw(snapshot_id),
            media: snapshot.media.clone(),
            urls: self
                .product_links
                .get(&post.product_id)
                .cloned()
                .unwrap_or_default(),
            reason,
        })
    }
}

/// In-memory storage backend.
#[derive(Debug)]
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
}

impl MemoryStorage {
    /// Creates an empty store with the pricing-plan catalog seeded the
    /// same way the schema migration seeds it.
    #[must_use]
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        for (id, name) in [(1, "Free"), (2, "Freemium"), (3, "Paid")] {
            state.plans_by_name.insert(name.to_string(), id);
            state.plan_names.insert(id, name.to_string());
        }
        Self {
            state: RwLock::new(state),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upsert_member_profile(&self, profile: &MemberProfile) -> Result<(), ApiError> {
        let mut state = self.state.write().await;
        state
            .members
            .insert(profile.member_id.as_raw(), profile.clone());
        Ok(())
    }

    async fn create_post(
        &self,
        cmd: &CreatePost,
        now: DateTime<Utc>,
    ) -> Result<PostId, ApiError> {
        let mut state = self.state.write().await;

        // All reference checks come before the first mutation.
        if state.submission_keys.contains(&cmd.submission_key) {
            return Err(ApiError::DuplicateSubmission(cmd.submission_key));
        }
        if !state.members.contains_key(&cmd.writer_id.as_raw()) {
            return Err(ApiError::MemberNotFound(cmd.writer_id));
        }
        if !state.plans_by_name.contains_key(&cmd.content.pricing_plan) {
            return Err(ApiError::PricingPlanNotFound(cmd.content.pricing_plan.clone()));
        }

        state.submission_keys.insert(cmd.submission_key);

        let product_id = state.resolve_product(&cmd.product_name);
        let links = state.product_links.entry(product_id).or_default();
        for url in &cmd.links {
            if !links.contains(url) {
                links.push(url.clone());
            }
        }

        if cmd.is_maker {
            state
                .product_makers
                .insert((product_id, cmd.writer_id.as_raw()));
        }

        let post_id = MemoryState::next(&mut state.next_post);
        state.posts.insert(
            post_id,
            PostRow {
                id: post_id,
                writer_id: cmd.writer_id.as_raw(),
                product_id,
                created_at: now,
                recommend_count: 0,
            },
        );

        state.write_snapshot(post_id, &cmd.content, now);

        Ok(PostId::from_raw(post_id))
    }

    async fn update_post(
        &self,
        post_id: PostId,
        editor: MemberId,
        content: &PostContent,
        now: DateTime<Utc>,
    ) -> Result<SnapshotId, ApiError> {
        let mut state = self.state.write().await;

        let writer_id = state
            .posts
            .get(&post_id.as_raw())
            .map(|post| post.writer_id)
            .ok_or(ApiError::PostNotFound(post_id))?;

        if writer_id != editor.as_raw() {
            return Err(ApiError::Forbidden(format!(
                "member {editor} is not the writer of post {post_id}"
            )));
        }
        if !state.plans_by_name.contains_key(&content.pricing_plan) {
            return Err(ApiError::PricingPlanNotFound(content.pricing_plan.clone()));
        }

        let snapshot_id = state.write_snapshot(post_id.as_raw(), content, now);
        Ok(SnapshotId::from_raw(snapshot_id))
    }

    async fn add_recommendation(
        &self,
        post_id: PostId,
        member_id: MemberId,
        _content: &str,
        reasons: &[String],
        _now: DateTime<Utc>,
    ) -> Result<u32, ApiError> {
        let mut state = self.state.write().await;

        if !state.posts.contains_key(&post_id.as_raw()) {
            return Err(ApiError::PostNotFound(post_id));
        }

        // Duplicate detection happens entirely before the first mutation
        // (including repeats within the batch itself), so a rejected
        // batch leaves no partial state.
        let mut batch: Vec<&String> = Vec::with_capacity(reasons.len());
        for reason in reasons {
            let already_in_ledger = state
                .reasons_by_value
                .get(reason)
                .is_some_and(|reason_id| {
                    state.recommendation_keys.contains(&(
                        member_id.as_raw(),
                        *reason_id,
                        post_id.as_raw(),
                    ))
                });

            if already_in_ledger || batch.contains(&reason) {
                return Err(ApiError::DuplicateRecommendation {
                    member: member_id,
                    post: post_id,
                    reason: reason.clone(),
                });
            }
            batch.push(reason);
        }

        for reason in reasons {
            let reason_id = state.resolve_reason(reason);
            state.recommendation_keys.insert((
                member_id.as_raw(),
                reason_id,
                post_id.as_raw(),
            ));
            state.recommendations.push(RecommendationRow {
                reason_id,
                post_id: post_id.as_raw(),
                member_id: member_id.as_raw(),
            });
        }

        let added = reasons.len() as i64;
        if let Some(post) = state.posts.get_mut(&post_id.as_raw()) {
            post.recommend_count += added;
        }

        Ok(added as u32)
    }

    async fn find_post(&self, post_id: PostId) -> Result<Option<Post>, ApiError> {
        let state = self.state.read().await;
        Ok(state.posts.get(&post_id.as_raw()).map(|post| Post {
            id: PostId::from_raw(post.id),
            writer_id: MemberId::from_raw(post.writer_id),
            product_id: crate::domain::ProductId::from_raw(post.product_id),
            created_at: post.created_at,
            recommend_count: post.recommend_count,
        }))
    }

    async fn post_view(&self, post_id: PostId) -> Result<Option<PostView>, ApiError> {
        let state = self.state.read().await;
        Ok(state
            .posts
            .get(&post_id.as_raw())
            .and_then(|post| state.view_of(post, None)))
    }

    async fn feed_page(
        &self,
        scope: FeedScope,
        page_size: i64,
        cursor: Option<PostId>,
    ) -> Result<Vec<PostView>, ApiError> {
        let state = self.state.read().await;
        let cursor = cursor.map(PostId::as_raw);
        let limit = usize::try_from(page_size).unwrap_or(0);

        let mut items = Vec::new();
        for post in state.posts.values().rev() {
            if items.len() >= limit {
                break;
            }
            if let Some(cursor) = cursor
                && post.id >= cursor
            {
                continue;
            }

            match scope {
                FeedScope::Global => {
                    if let Some(view) = state.view_of(post, None) {
                        items.push(view);
                    }
                }
                FeedScope::ByAuthor(member) => {
                    if post.writer_id == member.as_raw()
                        && let Some(view) = state.view_of(post, None)
                    {
                        items.push(view);
                    }
                }
                FeedScope::ByRecommender(member) => {
                    // One item per (post, reason), like the relational
                    // grouping.
                    for row in &state.recommendations {
                        if items.len() >= limit {
                            break;
                        }
                        if row.post_id == post.id && row.member_id == member.as_raw() {
                            let reason = state.reason_values.get(&row.reason_id).cloned();
                            if let Some(view) = state.view_of(post, reason) {
                                items.push(view);
                            }
                        }
                    }
                }
            }
        }

        Ok(items)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::MediaInput;

    fn profile(member_id: i64, handle: &str) -> MemberProfile {
        MemberProfile {
            member_id: MemberId::from_raw(member_id),
            nickname: handle.to_string(),
            user_handle: handle.to_string(),
            avatar_url: Some(format!("https://files.example/avatars/{handle}.png")),
        }
    }

    fn content(title: &str) -> PostContent {
        PostContent {
            title: title.to_string(),
            description: "a tool worth showing".to_string(),
            pricing_plan: "Free".to_string(),
            tags: vec!["productivity".to_string(), "cli".to_string()],
            media: vec![
                MediaInput {
                    url: "https://files.example/shots/2.png".to_string(),
                    sequence: 2,
                },
                MediaInput {
                    url: "https://files.example/shots/1.png".to_string(),
                    sequence: 1,
                },
            ],
        }
    }

    fn create(key: Uuid, writer: i64, title: &str) -> CreatePost {
        CreatePost {
            submission_key: key,
            writer_id: MemberId::from_raw(writer),
            product_name: format!("product-{title}"),
            links: vec!["https://example.com".to_string()],
            is_maker: true,
            content: content(title),
        }
    }

    async fn seeded() -> MemoryStorage {
        let storage = MemoryStorage::new();
        for (id, handle) in [(1, "ada"), (2, "grace")] {
            let Ok(()) = storage.upsert_member_profile(&profile(id, handle)).await else {
                panic!("profile upsert failed");
            };
        }
        storage
    }

    #[tokio::test]
    async fn second_claim_of_same_key_is_rejected_without_writes() {
        let storage = seeded().await;
        let key = Uuid::new_v4();
        let now = Utc::now();

        let first = storage.create_post(&create(key, 1, "alpha"), now).await;
        let Ok(post_id) = first else {
            panic!("first creation failed");
        };

        let second = storage.create_post(&create(key, 1, "alpha"), now).await;
        assert!(matches!(second, Err(ApiError::DuplicateSubmission(_))));

        // Exactly one post exists and it is the one from the first call.
        let page = storage.feed_page(FeedScope::Global, 20, None).await;
        let Ok(page) = page else {
            panic!("feed query failed");
        };
        assert_eq!(page.len(), 1);
        assert_eq!(page.first().map(|view| view.id), Some(post_id));
    }

    #[tokio::test]
    async fn unknown_writer_is_rejected_and_key_stays_free() {
        let storage = seeded().await;
        let key = Uuid::new_v4();
        let now = Utc::now();

        let result = storage.create_post(&create(key, 99, "ghost"), now).await;
        assert!(matches!(result, Err(ApiError::MemberNotFound(_))));

        // The failed call must not have burned the key.
        let retry = storage.create_post(&create(key, 1, "ghost"), now).await;
        assert!(retry.is_ok());
    }

    #[tokio::test]
    async fn updates_append_snapshots_and_reads_follow_pointer() {
        let storage = seeded().await;
        let now = Utc::now();
        let Ok(post_id) = storage.create_post(&create(Uuid::new_v4(), 1, "v0"), now).await
        else {
            panic!("creation failed");
        };

        let mut snapshot_ids = Vec::new();
        for round in 1..=3 {
            let result = storage
                .update_post(post_id, MemberId::from_raw(1), &content(&format!("v{round}")), now)
                .await;
            let Ok(snapshot_id) = result else {
                panic!("update failed");
            };
            snapshot_ids.push(snapshot_id);
        }

        // Three new snapshots after the initial one, all distinct.
        assert_eq!(snapshot_ids.len(), 3);
        let unique: std::collections::HashSet<_> = snapshot_ids.iter().collect();
        assert_eq!(unique.len(), 3);

        let Ok(Some(view)) = storage.post_view(post_id).await else {
            panic!("post view missing");
        };
        assert_eq!(view.title, "v3");
        assert_eq!(Some(view.snapshot_id), snapshot_ids.last().copied());

        // History is retained.
        let state = storage.state.read().await;
        assert_eq!(state.snapshots.len(), 4);
    }

    #[tokio::test]
    async fn update_by_non_writer_is_forbidden() {
        let storage = seeded().await;
        let now = Utc::now();
        let Ok(post_id) = storage.create_post(&create(Uuid::new_v4(), 1, "mine"), now).await
        else {
            panic!("creation failed");
        };

        let result = storage
            .update_post(post_id, MemberId::from_raw(2), &content("steal"), now)
            .await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));

        let Ok(Some(view)) = storage.post_view(post_id).await else {
            panic!("post view missing");
        };
        assert_eq!(view.title, "mine");
    }

    #[tokio::test]
    async fn duplicate_triple_rejects_whole_batch() {
        let storage = seeded().await;
        let now = Utc::now();
        let Ok(post_id) = storage.create_post(&create(Uuid::new_v4(), 1, "rec"), now).await
        else {
            panic!("creation failed");
        };
        let grace = MemberId::from_raw(2);

        let first = storage
            .add_recommendation(post_id, grace, "great", &["cheap".to_string()], now)
            .await;
        assert!(matches!(first, Ok(1)));

        // Second batch: one fresh reason, one already recorded. Nothing
        // from the batch may land.
        let second = storage
            .add_recommendation(
                post_id,
                grace,
                "still great",
                &["clean design".to_string(), "cheap".to_string()],
                now,
            )
            .await;
        assert!(matches!(
            second,
            Err(ApiError::DuplicateRecommendation { .. })
        ));

        let Ok(Some(post)) = storage.find_post(post_id).await else {
            panic!("post missing");
        };
        assert_eq!(post.recommend_count, 1);

        let state = storage.state.read().await;
        assert_eq!(state.recommendations.len(), 1);
    }

    #[tokio::test]
    async fn counter_tracks_ledger_rows() {
        let storage = seeded().await;
        let now = Utc::now();
        let Ok(post_id) = storage.create_post(&create(Uuid::new_v4(), 1, "count"), now).await
        else {
            panic!("creation failed");
        };

        let result = storage
            .add_recommendation(
                post_id,
                MemberId::from_raw(2),
                "great",
                &["cheap".to_string(), "clean design".to_string()],
                now,
            )
            .await;
        assert!(matches!(result, Ok(2)));

        let Ok(Some(post)) = storage.find_post(post_id).await else {
            panic!("post missing");
        };
        let state = storage.state.read().await;
        assert_eq!(post.recommend_count, state.recommendations.len() as i64);
    }

    #[tokio::test]
    async fn identical_reason_text_reuses_one_reason_row() {
        let storage = seeded().await;
        let now = Utc::now();
        let Ok(first) = storage.create_post(&create(Uuid::new_v4(), 1, "one"), now).await else {
            panic!("creation failed");
        };
        let Ok(second) = storage.create_post(&create(Uuid::new_v4(), 1, "two"), now).await
        else {
            panic!("creation failed");
        };

        let grace = MemberId::from_raw(2);
        for post in [first, second] {
            let result = storage
                .add_recommendation(post, grace, "great", &["cheap".to_string()], now)
                .await;
            assert!(result.is_ok());
        }

        let state = storage.state.read().await;
        assert_eq!(state.reasons_by_value.len(), 1);
    }

    #[tokio::test]
    async fn pagination_walks_without_overlap_or_gap() {
        let storage = seeded().await;
        let now = Utc::now();
        for round in 0..5 {
            let Ok(_) = storage
                .create_post(&create(Uuid::new_v4(), 1, &format!("p{round}")), now)
                .await
            else {
                panic!("creation failed");
            };
        }

        let Ok(page_one) = storage.feed_page(FeedScope::Global, 2, None).await else {
            panic!("page one failed");
        };
        assert_eq!(page_one.len(), 2);

        let cursor = page_one.last().map(|view| view.id);
        let Ok(page_two) = storage.feed_page(FeedScope::Global, 2, cursor).await else {
            panic!("page two failed");
        };
        assert_eq!(page_two.len(), 2);

        let cursor = page_two.last().map(|view| view.id);
        let Ok(page_three) = storage.feed_page(FeedScope::Global, 2, cursor).await else {
            panic!("page three failed");
        };
        assert_eq!(page_three.len(), 1);

        let mut seen: Vec<i64> = page_one
            .iter()
            .chain(&page_two)
            .chain(&page_three)
            .map(|view| view.id.as_raw())
            .collect();
        let total = seen.len();
        seen.dedup();
        assert_eq!(seen.len(), total);
        assert_eq!(total, 5);
        assert!(seen.windows(2).all(|pair| matches!(pair, [a, b] if a > b)));
    }

    #[tokio::test]
    async fn recommender_feed_carries_reason_text() {
        let storage = seeded().await;
        let now = Utc::now();
        let Ok(post_id) = storage.create_post(&create(Uuid::new_v4(), 1, "liked"), now).await
        else {
            panic!("creation failed");
        };

        let grace = MemberId::from_raw(2);
        let Ok(_) = storage
            .add_recommendation(
                post_id,
                grace,
                "great",
                &["cheap".to_string(), "clean design".to_string()],
                now,
            )
            .await
        else {
            panic!("recommendation failed");
        };

        let Ok(items) = storage
            .feed_page(FeedScope::ByRecommender(grace), 20, None)
            .await
        else {
            panic!("recommender feed failed");
        };

        // One item per (post, reason).
        assert_eq!(items.len(), 2);
        let reasons: Vec<_> = items.iter().filter_map(|view| view.reason.clone()).collect();
        assert!(reasons.contains(&"cheap".to_string()));
        assert!(reasons.contains(&"clean design".to_string()));

        // The author feed of the other member stays empty.
        let Ok(empty) = storage
            .feed_page(FeedScope::ByAuthor(grace), 20, None)
            .await
        else {
            panic!("author feed failed");
        };
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn media_is_ordered_by_sequence_and_maker_flag_set() {
        let storage = seeded().await;
        let now = Utc::now();
        let Ok(post_id) = storage.create_post(&create(Uuid::new_v4(), 1, "shots"), now).await
        else {
            panic!("creation failed");
        };

        let Ok(Some(view)) = storage.post_view(post_id).await else {
            panic!("post view missing");
        };
        let sequences: Vec<i32> = view.media.iter().map(|media| media.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
        assert!(view.is_maker);
        assert_eq!(view.urls, vec!["https://example.com".to_string()]);
        assert_eq!(view.pricing_plan, "Free");
    }
}
