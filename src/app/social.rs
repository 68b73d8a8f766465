use anyhow::{anyhow, Result};
use sqlx::Row;
use uuid::Uuid;

use crate::app::{author_from_row, AUTHOR_COLUMNS};
use crate::domain::social_graph::{FollowEdge, FollowState};
use crate::infra::db::Db;
use crate::infra::queue::NotificationQueue;
use crate::jobs::notifier::NotificationJob;

pub const FOLLOW_PAGE_SIZE: i64 = 10;

#[derive(Clone)]
pub struct SocialService {
    db: Db,
    queue: NotificationQueue,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Followers,
    Following,
}

impl SocialService {
    pub fn new(db: Db, queue: NotificationQueue) -> Self {
        Self { db, queue }
    }

    /// Follows the user, or unfollows when already following.
    /// Returns `None` when the followee does not exist.
    pub async fn toggle_follow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<Option<FollowState>> {
        if follower_id == followee_id {
            return Err(anyhow!("cannot follow yourself"));
        }

        let mut tx = self.db.pool().begin().await?;

        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR SHARE")
            .bind(followee_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let removed = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(follower_id)
            .bind(followee_id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() > 0 {
            tx.commit().await?;
            return Ok(Some(FollowState::Unfollowed));
        }

        sqlx::query(
            "INSERT INTO follows (follower_id, followee_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&mut *tx)
        .await?;

        let sender = sqlx::query(&format!("SELECT {AUTHOR_COLUMNS} FROM users u WHERE u.id = $1"))
            .bind(follower_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        self.queue.enqueue(NotificationJob::Follow {
            sender: author_from_row(&sender),
            receiver_id: followee_id,
        });
        Ok(Some(FollowState::Followed))
    }

    pub async fn list_followers(&self, user_id: Uuid, viewer_id: Uuid, offset: i64) -> Result<Vec<FollowEdge>> {
        self.list(Direction::Followers, user_id, viewer_id, offset).await
    }

    pub async fn list_following(&self, user_id: Uuid, viewer_id: Uuid, offset: i64) -> Result<Vec<FollowEdge>> {
        self.list(Direction::Following, user_id, viewer_id, offset).await
    }

    async fn list(&self, direction: Direction, user_id: Uuid, viewer_id: Uuid, offset: i64) -> Result<Vec<FollowEdge>> {
        // `anchor` is the listed user's side of the edge, `other` the row we return.
        let (anchor, other) = match direction {
            Direction::Followers => ("followee_id", "follower_id"),
            Direction::Following => ("follower_id", "followee_id"),
        };

        let rows = sqlx::query(&format!(
            "SELECT {AUTHOR_COLUMNS}, f.created_at AS followed_at, \
                    EXISTS ( \
                        SELECT 1 FROM follows vf WHERE vf.follower_id = $2 AND vf.followee_id = u.id \
                    ) AS is_following \
             FROM follows f \
             JOIN users u ON u.id = f.{other} \
             WHERE f.{anchor} = $1 \
             ORDER BY f.created_at DESC, u.id DESC \
             OFFSET $3 LIMIT $4"
        ))
        .bind(user_id)
        .bind(viewer_id)
        .bind(offset.max(0))
        .bind(FOLLOW_PAGE_SIZE)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| FollowEdge {
                user: author_from_row(row),
                followed_at: row.get("followed_at"),
                is_following: row.get("is_following"),
            })
            .collect())
    }
}
