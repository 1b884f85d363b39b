//! Storage layer: atomic operations over the relational model.
//!
//! [`Storage`] is the seam between orchestration and persistence. Each
//! write method is one atomic unit: either all of its writes commit or
//! none do. The PostgreSQL backend maps every method onto a single
//! transaction; the in-memory backend serializes methods behind one
//! lock, which satisfies the same contract.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    CreatePost, FeedScope, MemberId, MemberProfile, Post, PostContent, PostId, PostView,
    SnapshotId,
};
use crate::error::ApiError;

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;

/// Atomic storage operations behind the persistence seam.
///
/// Write methods are transaction boundaries; they perform their own
/// reference checks (post existence, member existence, pricing plan
/// resolution) so a failed call never leaves partial state.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Mirrors externally-owned member profile data for feed joins.
    ///
    /// Provisioning hook for the member system; the write paths of this
    /// service never call it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Storage`] on persistence failure.
    async fn upsert_member_profile(&self, profile: &MemberProfile) -> Result<(), ApiError>;

    /// Creates a post at most once per submission key.
    ///
    /// In one transaction: claims the submission key (conflict-safe
    /// insert; exactly one concurrent claimant wins), verifies the
    /// writer's profile exists, finds or creates the product by name,
    /// attaches links and the optional maker registration, inserts the
    /// post row, writes the initial content snapshot and flips the
    /// current-snapshot pointer to it.
    ///
    /// # Errors
    ///
    /// - [`ApiError::DuplicateSubmission`] when the key was already
    ///   claimed; nothing is written.
    /// - [`ApiError::MemberNotFound`] when the writer is unknown.
    /// - [`ApiError::PricingPlanNotFound`] when the content names an
    ///   unknown plan.
    /// - [`ApiError::Storage`] on persistence failure.
    async fn create_post(&self, cmd: &CreatePost, now: DateTime<Utc>)
    -> Result<PostId, ApiError>;

    /// Appends a new content snapshot and repoints the post to it.
    ///
    /// The previous snapshot stays in history; the pointer flip is the
    /// final write, so a reader never observes a post without a current
    /// snapshot. Last writer wins on concurrent edits.
    ///
    /// # Errors
    ///
    /// - [`ApiError::PostNotFound`] when the post does not exist.
    /// - [`ApiError::Forbidden`] when the editor is not the writer.
    /// - [`ApiError::PricingPlanNotFound`] when the content names an
    ///   unknown plan.
    /// - [`ApiError::Storage`] on persistence failure.
    async fn update_post(
        &self,
        post_id: PostId,
        editor: MemberId,
        content: &PostContent,
        now: DateTime<Utc>,
    ) -> Result<SnapshotId, ApiError>;

    /// Records one ledger row per reason and bumps the post counter.
    ///
    /// In one transaction: verifies the post exists, resolves each
    /// reason find-or-create, rejects the whole batch if any
    /// (member, post, reason) triple is already recorded, inserts the
    /// rows and increments `recommend_count` by the batch size with one
    /// atomic update. The ledger's unique constraint backstops the
    /// duplicate pre-check; its violation surfaces as the same error.
    /// Returns the number of rows added.
    ///
    /// # Errors
    ///
    /// - [`ApiError::PostNotFound`] when the post does not exist.
    /// - [`ApiError::DuplicateRecommendation`] on any duplicate in the
    ///   batch; no partial state is committed.
    /// - [`ApiError::Storage`] on persistence failure.
    async fn add_recommendation(
        &self,
        post_id: PostId,
        member_id: MemberId,
        content: &str,
        reasons: &[String],
        now: DateTime<Utc>,
    ) -> Result<u32, ApiError>;

    /// Fetches the bare post aggregate row.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Storage`] on persistence failure.
    async fn find_post(&self, post_id: PostId) -> Result<Option<Post>, ApiError>;

    /// Fetches the aggregated projection of one post (current snapshot,
    /// author, tags, media, links).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Storage`] on persistence failure.
    async fn post_view(&self, post_id: PostId) -> Result<Option<PostView>, ApiError>;

    /// Fetches one cursor page of aggregated feed items.
    ///
    /// Items are ordered by post id descending (creation-time ties
    /// broken by timestamp descending); with a cursor, only posts with
    /// `id < cursor` qualify. Media is resolved in a second pass keyed
    /// by the page's snapshot ids.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Storage`] on persistence failure.
    async fn feed_page(
        &self,
        scope: FeedScope,
        page_size: i64,
        cursor: Option<PostId>,
    ) -> Result<Vec<PostView>, ApiError>;
}
