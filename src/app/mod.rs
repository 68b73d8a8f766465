pub mod auth;
pub mod comments;
pub mod email;
pub mod feed;
pub mod media;
pub mod mentions;
pub mod notifications;
pub mod posts;
pub mod social;
pub mod users;

use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::comment::VoteState;
use crate::domain::user::AuthorSummary;
use crate::infra::db::Db;

/// Sanitized author columns, selected from `users u`.
pub(crate) const AUTHOR_COLUMNS: &str =
    "u.id AS author_id, u.username AS author_username, u.full_name AS author_full_name, u.avatar AS author_avatar";

pub(crate) fn author_from_row(row: &PgRow) -> AuthorSummary {
    AuthorSummary {
        id: row.get("author_id"),
        username: row.get("author_username"),
        full_name: row.get("author_full_name"),
        avatar: row.get("author_avatar"),
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum VoteTarget {
    Post,
    Comment,
    CommentReply,
}

impl VoteTarget {
    fn tables(&self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Post => ("posts", "post_votes", "post_id"),
            Self::Comment => ("comments", "comment_votes", "comment_id"),
            Self::CommentReply => ("comment_replies", "comment_reply_votes", "comment_reply_id"),
        }
    }
}

/// Adds the user's vote, or removes it when already present.
/// Returns `None` when the target does not exist.
pub(crate) async fn toggle_vote(
    db: &Db,
    target: VoteTarget,
    target_id: Uuid,
    user_id: Uuid,
) -> Result<Option<VoteState>> {
    let (target_table, vote_table, column) = target.tables();
    let mut tx = db.pool().begin().await?;

    let exists: Option<Uuid> = sqlx::query_scalar(&format!(
        "SELECT id FROM {target_table} WHERE id = $1 FOR SHARE"
    ))
    .bind(target_id)
    .fetch_optional(&mut *tx)
    .await?;
    if exists.is_none() {
        tx.rollback().await?;
        return Ok(None);
    }

    let removed = sqlx::query(&format!(
        "DELETE FROM {vote_table} WHERE {column} = $1 AND user_id = $2"
    ))
    .bind(target_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    let state = if removed.rows_affected() > 0 {
        VoteState::Unvoted
    } else {
        sqlx::query(&format!(
            "INSERT INTO {vote_table} ({column}, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING"
        ))
        .bind(target_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        VoteState::Voted
    };

    tx.commit().await?;
    Ok(Some(state))
}
