use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::{author_from_row, toggle_vote, VoteTarget, AUTHOR_COLUMNS};
use crate::domain::comment::{Comment, CommentPage, CommentReply, VoteState};
use crate::domain::notification::NotificationPayload;
use crate::domain::user::AuthorSummary;
use crate::infra::db::Db;
use crate::infra::queue::NotificationQueue;
use crate::jobs::notifier::NotificationJob;

pub const COMMENTS_PAGE_SIZE: i64 = 10;
pub const REPLIES_PAGE_SIZE: i64 = 3;

/// Position of a comment page among a post's comments, oldest first.
///
/// A page is defined by dropping the `exclude` newest comments (the ones the
/// client already rendered locally), then walking the rest from the oldest:
/// skip `offset`, take up to [`COMMENTS_PAGE_SIZE`]. With `total` comments
/// the survivors are exactly the `total - exclude` oldest ones, so the page
/// is a plain ascending window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentWindow {
    pub skip: i64,
    pub take: i64,
}

impl CommentWindow {
    pub fn new(total: i64, offset: i64, exclude: i64) -> Self {
        let remaining = (total - exclude.max(0)).max(0);
        let skip = offset.max(0);
        let take = (remaining - skip).clamp(0, COMMENTS_PAGE_SIZE);
        Self { skip, take }
    }

    pub fn is_empty(&self) -> bool {
        self.take == 0
    }
}

/// Post fields needed to address comment notifications.
struct PostContext {
    author_id: Uuid,
    author_username: String,
    thumbnail: String,
    filter: Option<String>,
}

#[derive(Clone)]
pub struct CommentService {
    db: Db,
    queue: NotificationQueue,
}

impl CommentService {
    pub fn new(db: Db, queue: NotificationQueue) -> Self {
        Self { db, queue }
    }

    /// Returns a page of a post's comments and the post's total comment count.
    ///
    /// Both are read from the same snapshot, so comments inserted while the
    /// request runs never skew the window against the count.
    pub async fn retrieve_comments(&self, post_id: Uuid, offset: i64, exclude: i64) -> Result<CommentPage> {
        let mut tx = self.db.begin_snapshot().await?;

        let comment_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await?;

        let window = CommentWindow::new(comment_count, offset, exclude);
        let rows = if window.is_empty() {
            Vec::new()
        } else {
            sqlx::query(&format!(
                "SELECT c.id, c.post_id, c.message, c.created_at, \
                        (SELECT COUNT(*) FROM comment_replies r WHERE r.parent_comment_id = c.id) AS reply_count, \
                        (SELECT COUNT(*) FROM comment_votes v WHERE v.comment_id = c.id) AS vote_count, \
                        {AUTHOR_COLUMNS} \
                 FROM comments c \
                 JOIN users u ON u.id = c.author_id \
                 WHERE c.post_id = $1 \
                 ORDER BY c.created_at ASC, c.id ASC \
                 OFFSET $2 LIMIT $3"
            ))
            .bind(post_id)
            .bind(window.skip)
            .bind(window.take)
            .fetch_all(&mut *tx)
            .await?
        };

        tx.commit().await?;

        Ok(CommentPage {
            comments: rows.iter().map(comment_from_row).collect(),
            comment_count,
        })
    }

    /// Creates a comment and queues the comment and mention notifications.
    /// Returns `None` when the post does not exist.
    pub async fn create_comment(&self, author_id: Uuid, post_id: Uuid, message: String) -> Result<Option<Comment>> {
        let Some(post) = self.post_context(post_id).await? else {
            return Ok(None);
        };

        let row = sqlx::query(&format!(
            "WITH inserted AS ( \
                INSERT INTO comments (post_id, author_id, message) \
                VALUES ($1, $2, $3) \
                RETURNING id, post_id, author_id, message, created_at \
             ) \
             SELECT c.id, c.post_id, c.message, c.created_at, \
                    0::bigint AS reply_count, 0::bigint AS vote_count, {AUTHOR_COLUMNS} \
             FROM inserted c \
             JOIN users u ON u.id = c.author_id"
        ))
        .bind(post_id)
        .bind(author_id)
        .bind(&message)
        .fetch_one(self.db.pool())
        .await?;

        let comment = comment_from_row(&row);
        self.queue_notifications(&comment.author, post_id, post.author_id, &post, message);
        Ok(Some(comment))
    }

    pub async fn delete_comment(&self, comment_id: Uuid, author_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1 AND author_id = $2")
            .bind(comment_id)
            .bind(author_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn vote_comment(&self, comment_id: Uuid, user_id: Uuid) -> Result<Option<VoteState>> {
        toggle_vote(&self.db, VoteTarget::Comment, comment_id, user_id).await
    }

    /// Replies to a comment. The parent comment's author gets a comment
    /// notification and mentioned users get mention notifications.
    /// Returns `None` when the parent comment does not exist.
    pub async fn create_reply(
        &self,
        author_id: Uuid,
        parent_comment_id: Uuid,
        message: String,
    ) -> Result<Option<CommentReply>> {
        let parent = sqlx::query("SELECT post_id, author_id FROM comments WHERE id = $1")
            .bind(parent_comment_id)
            .fetch_optional(self.db.pool())
            .await?;
        let Some(parent) = parent else {
            return Ok(None);
        };
        let post_id: Uuid = parent.get("post_id");
        let parent_author_id: Uuid = parent.get("author_id");

        let Some(post) = self.post_context(post_id).await? else {
            return Ok(None);
        };

        let row = sqlx::query(&format!(
            "WITH inserted AS ( \
                INSERT INTO comment_replies (parent_comment_id, author_id, message) \
                VALUES ($1, $2, $3) \
                RETURNING id, parent_comment_id, author_id, message, created_at \
             ) \
             SELECT r.id, r.parent_comment_id, r.message, r.created_at, \
                    0::bigint AS vote_count, {AUTHOR_COLUMNS} \
             FROM inserted r \
             JOIN users u ON u.id = r.author_id"
        ))
        .bind(parent_comment_id)
        .bind(author_id)
        .bind(&message)
        .fetch_one(self.db.pool())
        .await?;

        let reply = reply_from_row(&row);
        self.queue_notifications(&reply.author, post_id, parent_author_id, &post, message);
        Ok(Some(reply))
    }

    pub async fn delete_reply(&self, reply_id: Uuid, author_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comment_replies WHERE id = $1 AND author_id = $2")
            .bind(reply_id)
            .bind(author_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn vote_reply(&self, reply_id: Uuid, user_id: Uuid) -> Result<Option<VoteState>> {
        toggle_vote(&self.db, VoteTarget::CommentReply, reply_id, user_id).await
    }

    /// Replies of a comment, oldest first, [`REPLIES_PAGE_SIZE`] at a time.
    pub async fn list_replies(&self, parent_comment_id: Uuid, offset: i64) -> Result<Vec<CommentReply>> {
        let rows = sqlx::query(&format!(
            "SELECT r.id, r.parent_comment_id, r.message, r.created_at, \
                    (SELECT COUNT(*) FROM comment_reply_votes v WHERE v.comment_reply_id = r.id) AS vote_count, \
                    {AUTHOR_COLUMNS} \
             FROM comment_replies r \
             JOIN users u ON u.id = r.author_id \
             WHERE r.parent_comment_id = $1 \
             ORDER BY r.created_at ASC, r.id ASC \
             OFFSET $2 LIMIT $3"
        ))
        .bind(parent_comment_id)
        .bind(offset.max(0))
        .bind(REPLIES_PAGE_SIZE)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(reply_from_row).collect())
    }

    async fn post_context(&self, post_id: Uuid) -> Result<Option<PostContext>> {
        let row = sqlx::query(
            "SELECT p.thumbnail, p.filter, u.id AS author_id, u.username AS author_username \
             FROM posts p \
             JOIN users u ON u.id = p.author_id \
             WHERE p.id = $1",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| PostContext {
            author_id: row.get("author_id"),
            author_username: row.get("author_username"),
            thumbnail: row.get("thumbnail"),
            filter: row.get("filter"),
        }))
    }

    fn queue_notifications(
        &self,
        sender: &AuthorSummary,
        post_id: Uuid,
        receiver_id: Uuid,
        post: &PostContext,
        message: String,
    ) {
        let payload = NotificationPayload {
            post_id: Some(post_id),
            image: Some(post.thumbnail.clone()),
            message: Some(message.clone()),
            filter: post.filter.clone(),
        };

        self.queue.enqueue(NotificationJob::Comment {
            sender: sender.clone(),
            receiver_id,
            payload: payload.clone(),
        });
        self.queue.enqueue(NotificationJob::Mentions {
            sender: sender.clone(),
            post_author_username: post.author_username.clone(),
            message,
            payload,
        });
    }
}

fn comment_from_row(row: &PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author: author_from_row(row),
        message: row.get("message"),
        created_at: row.get("created_at"),
        reply_count: row.get("reply_count"),
        vote_count: row.get("vote_count"),
    }
}

fn reply_from_row(row: &PgRow) -> CommentReply {
    CommentReply {
        id: row.get("id"),
        parent_comment_id: row.get("parent_comment_id"),
        author: author_from_row(row),
        message: row.get("message"),
        created_at: row.get("created_at"),
        vote_count: row.get("vote_count"),
    }
}
