//! PostgreSQL implementation of the storage layer.
//!
//! Every write method runs inside a single `sqlx` transaction; returning
//! an error before commit rolls the whole operation back, so no partial
//! snapshot, tag or recommendation state is ever left committed from a
//! failed call. Feed projections are built from one aggregate query plus
//! a second-pass media fetch keyed by the page's snapshot ids, which
//! avoids row multiplication from joining the one-to-many media relation
//! into the aggregate.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::Storage;
use crate::domain::{
    CreatePost, FeedScope, MediaView, MemberId, MemberProfile, PlanId, Post, PostContent, PostId,
    PostView, ProductId, ReasonId, SnapshotId, TagId,
};
use crate::error::ApiError;

/// Name of the ledger's unique constraint on (member, reason, post); a
/// violation is the canonical duplicate-recommendation signal.
const RECOMMENDATION_UNIQUE: &str = "recommendations_member_reason_post_key";

/// PostgreSQL-backed storage using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Creates a new storage layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetches ordered media for a set of snapshot ids, grouped by the
    /// owning post id.
    async fn media_for_snapshots(
        &self,
        snapshot_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<MediaView>>, ApiError> {
        if snapshot_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (i64, String, i32)>(
            "SELECT s.post_id, m.url, m.sequence \
             FROM snapshot_media m \
             JOIN post_snapshots s ON s.id = m.snapshot_id \
             WHERE m.snapshot_id = ANY($1) \
             ORDER BY m.sequence ASC",
        )
        .bind(snapshot_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i64, Vec<MediaView>> = HashMap::new();
        for (post_id, url, sequence) in rows {
            grouped
                .entry(post_id)
                .or_default()
                .push(MediaView { url, sequence });
        }
        Ok(grouped)
    }

    /// Runs the aggregate projection query for the given shape and
    /// attaches media from the second pass.
    async fn fetch_views(&self, rows: Vec<FeedRow>) -> Result<Vec<PostView>, ApiError> {
        let snapshot_ids: Vec<i64> = rows.iter().map(|row| row.snapshot_id).collect();
        let mut media = self.media_for_snapshots(&snapshot_ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let media = media.remove(&row.id).unwrap_or_default();
                row.into_view(media)
            })
            .collect())
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn upsert_member_profile(&self, profile: &MemberProfile) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO member_profiles (member_id, nickname, user_handle, avatar_url) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (member_id) DO UPDATE SET \
             nickname = EXCLUDED.nickname, \
             user_handle = EXCLUDED.user_handle, \
             avatar_url = EXCLUDED.avatar_url",
        )
        .bind(profile.member_id.as_raw())
        .bind(&profile.nickname)
        .bind(&profile.user_handle)
        .bind(&profile.avatar_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_post(
        &self,
        cmd: &CreatePost,
        now: DateTime<Utc>,
    ) -> Result<PostId, ApiError> {
        let mut tx = self.pool.begin().await?;

        // Conflict-safe claim; exactly one concurrent caller gets one
        // affected row. A later failure in this transaction rolls the
        // claim back together with everything else.
        let claimed = sqlx::query(
            "INSERT INTO submission_keys (key, created_at) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(cmd.submission_key)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if !claimed {
            return Err(ApiError::DuplicateSubmission(cmd.submission_key));
        }

        let writer_known = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM member_profiles WHERE member_id = $1)",
        )
        .bind(cmd.writer_id.as_raw())
        .fetch_one(&mut *tx)
        .await?;

        if !writer_known {
            return Err(ApiError::MemberNotFound(cmd.writer_id));
        }

        let product_id = resolve_product(&mut *tx, &cmd.product_name, now).await?;

        for url in &cmd.links {
            sqlx::query(
                "INSERT INTO product_links (product_id, url) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(product_id.as_raw())
            .bind(url)
            .execute(&mut *tx)
            .await?;
        }

        if cmd.is_maker {
            sqlx::query(
                "INSERT INTO product_makers (product_id, member_id, created_at) \
                 VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            )
            .bind(product_id.as_raw())
            .bind(cmd.writer_id.as_raw())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        let post_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO posts (writer_id, product_id, created_at, recommend_count) \
             VALUES ($1, $2, $3, 0) RETURNING id",
        )
        .bind(cmd.writer_id.as_raw())
        .bind(product_id.as_raw())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        let post_id = PostId::from_raw(post_id);

        write_snapshot(&mut *tx, post_id, &cmd.content, now).await?;

        tx.commit().await?;
        Ok(post_id)
    }

    async fn update_post(
        &self,
        post_id: PostId,
        editor: MemberId,
        content: &PostContent,
        now: DateTime<Utc>,
    ) -> Result<SnapshotId, ApiError> {
        let mut tx = self.pool.begin().await?;

        let writer = sqlx::query_scalar::<_, i64>("SELECT writer_id FROM posts WHERE id = $1")
            .bind(post_id.as_raw())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ApiError::PostNotFound(post_id))?;

        if writer != editor.as_raw() {
            return Err(ApiError::Forbidden(format!(
                "member {editor} is not the writer of post {post_id}"
            )));
        }

        let snapshot_id = write_snapshot(&mut *tx, post_id, content, now).await?;

        tx.commit().await?;
        Ok(snapshot_id)
    }

    async fn add_recommendation(
        &self,
        post_id: PostId,
        member_id: MemberId,
        content: &str,
        reasons: &[String],
        now: DateTime<Utc>,
    ) -> Result<u32, ApiError> {
        let mut tx = self.pool.begin().await?;

        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
                .bind(post_id.as_raw())
                .fetch_one(&mut *tx)
                .await?;

        if !exists {
            return Err(ApiError::PostNotFound(post_id));
        }

        let mut reason_ids: Vec<ReasonId> = Vec::with_capacity(reasons.len());
        for reason in reasons {
            let reason_id = resolve_reason(&mut *tx, reason, now).await?;

            // Pre-check for a friendly error; the unique constraint below
            // remains the authoritative guard under concurrency.
            let already = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM recommendations \
                 WHERE member_id = $1 AND reason_id = $2 AND post_id = $3)",
            )
            .bind(member_id.as_raw())
            .bind(reason_id.as_raw())
            .bind(post_id.as_raw())
            .fetch_one(&mut *tx)
            .await?;

            if already {
                return Err(ApiError::DuplicateRecommendation {
                    member: member_id,
                    post: post_id,
                    reason: reason.clone(),
                });
            }

            reason_ids.push(reason_id);
        }

        for (reason_id, reason) in reason_ids.iter().zip(reasons) {
            sqlx::query(
                "INSERT INTO recommendations (reason_id, post_id, member_id, content, created_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(reason_id.as_raw())
            .bind(post_id.as_raw())
            .bind(member_id.as_raw())
            .bind(content)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|err| duplicate_or_storage(err, member_id, post_id, reason))?;
        }

        let added = reason_ids.len() as i64;
        sqlx::query("UPDATE posts SET recommend_count = recommend_count + $1 WHERE id = $2")
            .bind(added)
            .bind(post_id.as_raw())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(added as u32)
    }

    async fn find_post(&self, post_id: PostId) -> Result<Option<Post>, ApiError> {
        let row = sqlx::query_as::<_, (i64, i64, i64, DateTime<Utc>, i64)>(
            "SELECT id, writer_id, product_id, created_at, recommend_count \
             FROM posts WHERE id = $1",
        )
        .bind(post_id.as_raw())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, writer_id, product_id, created_at, recommend_count)| Post {
                id: PostId::from_raw(id),
                writer_id: MemberId::from_raw(writer_id),
                product_id: ProductId::from_raw(product_id),
                created_at,
                recommend_count,
            },
        ))
    }

    async fn post_view(&self, post_id: PostId) -> Result<Option<PostView>, ApiError> {
        let sql = projection_sql("", "p.id = $1", false, "ALL");
        let row = sqlx::query_as::<_, FeedRow>(&sql)
            .bind(post_id.as_raw())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut views = self.fetch_views(vec![row]).await?;
        Ok(views.pop())
    }

    async fn feed_page(
        &self,
        scope: FeedScope,
        page_size: i64,
        cursor: Option<PostId>,
    ) -> Result<Vec<PostView>, ApiError> {
        let cursor = cursor.map(PostId::as_raw);

        let rows = match scope {
            FeedScope::Global => {
                let sql = projection_sql("", "($1::BIGINT IS NULL OR p.id < $1)", false, "$2");
                sqlx::query_as::<_, FeedRow>(&sql)
                    .bind(cursor)
                    .bind(page_size)
                    .fetch_all(&self.pool)
                    .await?
            }
            FeedScope::ByAuthor(member) => {
                let sql = projection_sql(
                    "",
                    "p.writer_id = $1 AND ($2::BIGINT IS NULL OR p.id < $2)",
                    false,
                    "$3",
                );
                sqlx::query_as::<_, FeedRow>(&sql)
                    .bind(member.as_raw())
                    .bind(cursor)
                    .bind(page_size)
                    .fetch_all(&self.pool)
                    .await?
            }
            FeedScope::ByRecommender(member) => {
                let sql = projection_sql(
                    " JOIN recommendations r ON r.post_id = p.id \
                      JOIN reasons rr ON rr.id = r.reason_id",
                    "r.member_id = $1 AND ($2::BIGINT IS NULL OR p.id < $2)",
                    true,
                    "$3",
                );
                sqlx::query_as::<_, FeedRow>(&sql)
                    .bind(member.as_raw())
                    .bind(cursor)
                    .bind(page_size)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        self.fetch_views(rows).await
    }
}

/// One row of the aggregate projection query.
#[derive(Debug, sqlx::FromRow)]
struct FeedRow {
    id: i64,
    nickname: Option<String>,
    user_handle: Option<String>,
    created_at: DateTime<Utc>,
    is_maker: bool,
    avatar_url: Option<String>,
    title: String,
    description: String,
    pricing_plan: String,
    tags: Option<Vec<String>>,
    recommend_count: i64,
    snapshot_id: i64,
    urls: Option<Vec<String>>,
    #[sqlx(default)]
    reason: Option<String>,
}

impl FeedRow {
    fn into_view(self, media: Vec<MediaView>) -> PostView {
        PostView {
            id: PostId::from_raw(self.id),
            nickname: self.nickname,
            user_handle: self.user_handle,
            created_at: self.created_at,
            is_maker: self.is_maker,
            avatar_url: self.avatar_url,
            title: self.title,
            description: self.description,
            pricing_plan: self.pricing_plan,
            tags: self.tags.unwrap_or_default(),
            recommend_count: self.recommend_count,
            snapshot_id: SnapshotId::from_raw(self.snapshot_id),
            media,
            urls: self.urls.unwrap_or_default(),
            reason: self.reason,
        }
    }
}

/// Assembles the aggregate projection statement.
///
/// The projection joins the current snapshot through the pointer table
/// (one indirection instead of a `max(created_at)` scan), aggregates
/// tags and links as deduplicated arrays and leaves media to the second
/// pass. `extra_joins` and `filter` vary per feed shape; `with_reason`
/// adds the recommender's reason column and its grouping key.
fn projection_sql(extra_joins: &str, filter: &str, with_reason: bool, limit: &str) -> String {
    let reason_select = if with_reason {
        ", rr.value AS reason"
    } else {
        ""
    };
    let reason_group = if with_reason { ", rr.value" } else { "" };

    format!(
        "SELECT p.id, mp.nickname, mp.user_handle, s.created_at AS created_at, \
         (pm.id IS NOT NULL) AS is_maker, mp.avatar_url, s.title, s.description, \
         pp.name AS pricing_plan, \
         array_agg(DISTINCT t.name) FILTER (WHERE t.name IS NOT NULL) AS tags, \
         p.recommend_count, s.id AS snapshot_id, \
         array_agg(DISTINCT pl.url) FILTER (WHERE pl.url IS NOT NULL) AS urls\
         {reason_select} \
         FROM posts p \
         JOIN post_current_snapshot cs ON cs.post_id = p.id \
         JOIN post_snapshots s ON s.id = cs.snapshot_id \
         JOIN pricing_plans pp ON pp.id = s.pricing_plan_id\
         {extra_joins} \
         LEFT JOIN snapshot_tags st ON st.snapshot_id = s.id \
         LEFT JOIN tags t ON t.id = st.tag_id \
         LEFT JOIN member_profiles mp ON mp.member_id = p.writer_id \
         LEFT JOIN product_makers pm \
         ON pm.product_id = p.product_id AND pm.member_id = p.writer_id \
         LEFT JOIN product_links pl ON pl.product_id = p.product_id \
         WHERE {filter} \
         GROUP BY p.id, mp.nickname, mp.user_handle, s.created_at, pm.id, mp.avatar_url, \
         s.title, s.description, pp.name, p.recommend_count, s.id{reason_group} \
         ORDER BY p.id DESC, p.created_at DESC \
         LIMIT {limit}"
    )
}

/// Maps a ledger insert failure: a violation of the (member, reason,
/// post) unique constraint is the canonical duplicate signal (the race
/// window between pre-check and insert collapses here); anything else is
/// a storage fault.
fn duplicate_or_storage(
    err: sqlx::Error,
    member: MemberId,
    post: PostId,
    reason: &str,
) -> ApiError {
    match &err {
        sqlx::Error::Database(db) if db.constraint() == Some(RECOMMENDATION_UNIQUE) => {
            ApiError::DuplicateRecommendation {
                member,
                post,
                reason: reason.to_string(),
            }
        }
        _ => ApiError::from(err),
    }
}

/// Inserts an immutable snapshot with its media and tag associations,
/// then atomically repoints the post's current-snapshot indirection.
///
/// The pointer flip is the last write, so the post is never observable
/// without a current snapshot.
async fn write_snapshot(
    conn: &mut PgConnection,
    post_id: PostId,
    content: &PostContent,
    now: DateTime<Utc>,
) -> Result<SnapshotId, ApiError> {
    let plan_id = resolve_pricing_plan(conn, &content.pricing_plan).await?;

    let snapshot_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO post_snapshots (post_id, title, description, pricing_plan_id, created_at) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(post_id.as_raw())
    .bind(&content.title)
    .bind(&content.description)
    .bind(plan_id.as_raw())
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    let snapshot_id = SnapshotId::from_raw(snapshot_id);

    for name in &content.tags {
        let tag_id = resolve_tag(conn, name).await?;
        // Set semantics: repeated tag names in the input collapse here.
        sqlx::query(
            "INSERT INTO snapshot_tags (snapshot_id, tag_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(snapshot_id.as_raw())
        .bind(tag_id.as_raw())
        .execute(&mut *conn)
        .await?;
    }

    for media in &content.media {
        sqlx::query(
            "INSERT INTO snapshot_media (snapshot_id, url, sequence) VALUES ($1, $2, $3)",
        )
        .bind(snapshot_id.as_raw())
        .bind(&media.url)
        .bind(media.sequence)
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query(
        "INSERT INTO post_current_snapshot (post_id, snapshot_id) VALUES ($1, $2) \
         ON CONFLICT (post_id) DO UPDATE SET snapshot_id = EXCLUDED.snapshot_id",
    )
    .bind(post_id.as_raw())
    .bind(snapshot_id.as_raw())
    .execute(&mut *conn)
    .await?;

    Ok(snapshot_id)
}

/// Resolves a pricing plan name against the seeded catalog.
async fn resolve_pricing_plan(conn: &mut PgConnection, name: &str) -> Result<PlanId, ApiError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM pricing_plans WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
        .map(PlanId::from_raw)
        .ok_or_else(|| ApiError::PricingPlanNotFound(name.to_string()))
}

/// Find-or-create of a canonical tag by name.
///
/// The insert tolerates a concurrent creation of the same name; losing
/// the race falls through to the re-select.
async fn resolve_tag(conn: &mut PgConnection, name: &str) -> Result<TagId, ApiError> {
    let inserted = sqlx::query_scalar::<_, i64>(
        "INSERT INTO tags (name) VALUES ($1) ON CONFLICT (name) DO NOTHING RETURNING id",
    )
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = inserted {
        return Ok(TagId::from_raw(id));
    }

    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM tags WHERE name = $1")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(TagId::from_raw(id))
}

/// Find-or-create of a canonical recommendation reason by text.
async fn resolve_reason(
    conn: &mut PgConnection,
    value: &str,
    now: DateTime<Utc>,
) -> Result<ReasonId, ApiError> {
    let inserted = sqlx::query_scalar::<_, i64>(
        "INSERT INTO reasons (value, created_at) VALUES ($1, $2) \
         ON CONFLICT (value) DO NOTHING RETURNING id",
    )
    .bind(value)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = inserted {
        return Ok(ReasonId::from_raw(id));
    }

    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM reasons WHERE value = $1")
        .bind(value)
        .fetch_one(&mut *conn)
        .await?;
    Ok(ReasonId::from_raw(id))
}

/// Find-or-create of a product by unique name.
async fn resolve_product(
    conn: &mut PgConnection,
    name: &str,
    now: DateTime<Utc>,
) -> Result<ProductId, ApiError> {
    let inserted = sqlx::query_scalar::<_, i64>(
        "INSERT INTO products (name, created_at) VALUES ($1, $2) \
         ON CONFLICT (name) DO NOTHING RETURNING id",
    )
    .bind(name)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = inserted {
        return Ok(ProductId::from_raw(id));
    }

    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM products WHERE name = $1")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(ProductId::from_raw(id))
}
