use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use crate::app::media::{ImageService, POST_THUMBNAIL};
use crate::app::{author_from_row, toggle_vote, VoteTarget, AUTHOR_COLUMNS};
use crate::domain::comment::VoteState;
use crate::domain::notification::NotificationPayload;
use crate::domain::post::{extract_hashtags, Post};
use crate::infra::db::Db;
use crate::infra::queue::NotificationQueue;
use crate::jobs::notifier::NotificationJob;

pub const PROFILE_PAGE_SIZE: i64 = 9;
pub const DISCOVER_PAGE_SIZE: i64 = 20;

/// Selects posts from `posts p` populated with their sanitized author, the
/// combined comment and reply count, and the vote count. Callers append
/// their own filtering, ordering and pagination.
pub(crate) fn populate_posts(rest: &str) -> String {
    format!(
        "SELECT p.id, p.image, p.thumbnail, p.filter, p.caption, p.hashtags, p.created_at, \
                (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) \
                  + (SELECT COUNT(*) FROM comment_replies r \
                     JOIN comments c ON c.id = r.parent_comment_id \
                     WHERE c.post_id = p.id) AS comment_count, \
                (SELECT COUNT(*) FROM post_votes v WHERE v.post_id = p.id) AS vote_count, \
                {AUTHOR_COLUMNS} \
         FROM posts p \
         JOIN users u ON u.id = p.author_id \
         {rest}"
    )
}

pub(crate) fn post_from_row(row: &PgRow) -> Post {
    Post {
        id: row.get("id"),
        author: author_from_row(row),
        image: row.get("image"),
        thumbnail: row.get("thumbnail"),
        filter: row.get("filter"),
        caption: row.get("caption"),
        hashtags: row.get("hashtags"),
        created_at: row.get("created_at"),
        comment_count: row.get("comment_count"),
        vote_count: row.get("vote_count"),
    }
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
    images: ImageService,
    queue: NotificationQueue,
}

impl PostService {
    pub fn new(db: Db, images: ImageService, queue: NotificationQueue) -> Self {
        Self { db, images, queue }
    }

    /// Stores the image, creates the post and notifies users mentioned in
    /// the caption.
    pub async fn create_post(
        &self,
        author_id: Uuid,
        image: Vec<u8>,
        caption: Option<String>,
        filter: Option<String>,
    ) -> Result<Post> {
        let stored = self.images.store(author_id, image, POST_THUMBNAIL).await?;
        let hashtags = caption.as_deref().map(extract_hashtags).unwrap_or_default();

        let inserted = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO posts (author_id, image, thumbnail, filter, caption, hashtags) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id",
        )
        .bind(author_id)
        .bind(&stored.image)
        .bind(&stored.thumbnail)
        .bind(&filter)
        .bind(&caption)
        .bind(&hashtags)
        .fetch_one(self.db.pool())
        .await;
        let post_id: Uuid = match inserted {
            Ok(post_id) => post_id,
            Err(err) => {
                self.images.discard(&[stored.image.as_str(), stored.thumbnail.as_str()]).await;
                return Err(err.into());
            }
        };

        let row = sqlx::query(&populate_posts("WHERE p.id = $1"))
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        let post = post_from_row(&row);
        info!(post_id = %post.id, author_id = %author_id, "post created");

        if let Some(caption) = caption {
            self.queue.enqueue(NotificationJob::Mentions {
                sender: post.author.clone(),
                post_author_username: post.author.username.clone(),
                message: caption.clone(),
                payload: NotificationPayload {
                    post_id: Some(post.id),
                    image: Some(post.thumbnail.clone()),
                    message: Some(caption),
                    filter: post.filter.clone(),
                },
            });
        }

        Ok(post)
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query(&populate_posts("WHERE p.id = $1"))
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    /// Deletes the post and its stored images. `false` when the post does
    /// not exist or belongs to someone else.
    pub async fn delete_post(&self, post_id: Uuid, author_id: Uuid) -> Result<bool> {
        let row = sqlx::query(
            "DELETE FROM posts WHERE id = $1 AND author_id = $2 RETURNING image, thumbnail",
        )
        .bind(post_id)
        .bind(author_id)
        .fetch_optional(self.db.pool())
        .await?;
        let Some(row) = row else {
            return Ok(false);
        };

        let image: String = row.get("image");
        let thumbnail: String = row.get("thumbnail");
        self.images.discard(&[image.as_str(), thumbnail.as_str()]).await;
        Ok(true)
    }

    pub async fn vote_post(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<VoteState>> {
        toggle_vote(&self.db, VoteTarget::Post, post_id, user_id).await
    }

    /// Toggles a bookmark. `Some(true)` means the post is now bookmarked,
    /// `None` that the post does not exist.
    pub async fn toggle_bookmark(&self, user_id: Uuid, post_id: Uuid) -> Result<Option<bool>> {
        let mut tx = self.db.pool().begin().await?;

        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM posts WHERE id = $1 FOR SHARE")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let removed = sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        let bookmarked = if removed.rows_affected() > 0 {
            false
        } else {
            sqlx::query(
                "INSERT INTO bookmarks (user_id, post_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
            true
        };

        tx.commit().await?;
        Ok(Some(bookmarked))
    }

    /// A user's posts, newest first. `None` when the user does not exist.
    pub async fn list_by_username(&self, username: &str, offset: i64) -> Result<Option<Vec<Post>>> {
        let user_id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(self.db.pool())
            .await?;
        let Some(user_id) = user_id else {
            return Ok(None);
        };

        let rows = sqlx::query(&populate_posts(
            "WHERE p.author_id = $1 ORDER BY p.created_at DESC, p.id DESC OFFSET $2 LIMIT $3",
        ))
        .bind(user_id)
        .bind(offset.max(0))
        .bind(PROFILE_PAGE_SIZE)
        .fetch_all(self.db.pool())
        .await?;

        Ok(Some(rows.iter().map(post_from_row).collect()))
    }

    /// Most voted posts from users the viewer does not follow yet.
    pub async fn suggested(&self, user_id: Uuid, offset: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query(&populate_posts(
            "WHERE p.author_id <> $1 \
               AND u.private = false \
               AND NOT EXISTS ( \
                   SELECT 1 FROM follows f WHERE f.follower_id = $1 AND f.followee_id = p.author_id \
               ) \
             ORDER BY vote_count DESC, p.created_at DESC, p.id DESC \
             OFFSET $2 LIMIT $3",
        ))
        .bind(user_id)
        .bind(offset.max(0))
        .bind(DISCOVER_PAGE_SIZE)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    pub async fn by_hashtag(&self, hashtag: &str, offset: i64) -> Result<Vec<Post>> {
        let tag = hashtag.trim_start_matches('#').to_lowercase();
        let rows = sqlx::query(&populate_posts(
            "WHERE $1 = ANY(p.hashtags) AND u.private = false \
             ORDER BY p.created_at DESC, p.id DESC \
             OFFSET $2 LIMIT $3",
        ))
        .bind(tag)
        .bind(offset.max(0))
        .bind(DISCOVER_PAGE_SIZE)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(post_from_row).collect())
    }
}
