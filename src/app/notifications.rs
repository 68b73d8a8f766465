use anyhow::{anyhow, Result};
use futures::future::join_all;
use sqlx::types::Json;
use sqlx::Row;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::app::mentions::mention_targets;
use crate::domain::notification::{Notification, NotificationPayload, NotificationType};
use crate::domain::user::{AuthorSummary, SenderSummary};
use crate::infra::db::Db;
use crate::infra::realtime::NotificationHub;

#[derive(Clone)]
pub struct NotificationService {
    db: Db,
    hub: NotificationHub,
}

impl NotificationService {
    pub fn new(db: Db, hub: NotificationHub) -> Self {
        Self { db, hub }
    }

    /// Notifies the receiver that `sender` commented on their post.
    /// Nothing is created when the commenter is the receiver.
    pub async fn send_comment_notification(
        &self,
        sender: &AuthorSummary,
        receiver_id: Uuid,
        payload: NotificationPayload,
    ) -> Result<Option<Notification>> {
        if sender.id == receiver_id {
            return Ok(None);
        }

        let notification = self
            .create(sender, receiver_id, NotificationType::Comment, payload)
            .await?;
        Ok(Some(notification))
    }

    /// Notifies every user mentioned in `message`, once per user.
    ///
    /// The sender and the post author are never mention targets. Unknown
    /// usernames are skipped, as are lookups that fail.
    pub async fn send_mention_notifications(
        &self,
        sender: &AuthorSummary,
        post_author_username: &str,
        message: &str,
        payload: NotificationPayload,
    ) -> Result<Vec<Notification>> {
        let targets = mention_targets(message, &sender.username, post_author_username);
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let lookups = targets
            .iter()
            .map(|username| self.find_user_id(username));
        let receivers: Vec<Uuid> = join_all(lookups)
            .await
            .into_iter()
            .zip(targets.iter())
            .filter_map(|(result, username)| match result {
                Ok(Some(id)) => Some(id),
                Ok(None) => {
                    debug!(username = %username, "mentioned user does not exist");
                    None
                }
                Err(err) => {
                    warn!(error = ?err, username = %username, "failed to look up mentioned user");
                    None
                }
            })
            .collect();

        let creations = receivers.into_iter().map(|receiver_id| {
            self.create(sender, receiver_id, NotificationType::Mention, payload.clone())
        });

        let mut created = Vec::new();
        for result in join_all(creations).await {
            match result {
                Ok(notification) => created.push(notification),
                Err(err) => warn!(error = ?err, "failed to create mention notification"),
            }
        }
        Ok(created)
    }

    pub async fn send_follow_notification(
        &self,
        sender: &AuthorSummary,
        receiver_id: Uuid,
    ) -> Result<Option<Notification>> {
        if sender.id == receiver_id {
            return Ok(None);
        }

        let notification = self
            .create(
                sender,
                receiver_id,
                NotificationType::Follow,
                NotificationPayload::default(),
            )
            .await?;
        Ok(Some(notification))
    }

    pub async fn list(&self, receiver_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            "SELECT n.id, n.receiver_id, n.notification_type, n.payload, n.read, n.created_at, \
                    u.id AS sender_id, u.username AS sender_username, u.avatar AS sender_avatar \
             FROM notifications n \
             JOIN users u ON u.id = n.sender_id \
             WHERE n.receiver_id = $1 \
             ORDER BY n.created_at DESC, n.id DESC \
             LIMIT $2",
        )
        .bind(receiver_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        let mut notifications = Vec::with_capacity(rows.len());
        for row in rows {
            let notification_type: String = row.get("notification_type");
            let notification_type = NotificationType::from_db(&notification_type)
                .ok_or_else(|| anyhow!("unknown notification type: {}", notification_type))?;
            let Json(payload): Json<NotificationPayload> = row.get("payload");

            notifications.push(Notification {
                id: row.get("id"),
                sender: SenderSummary {
                    id: row.get("sender_id"),
                    username: row.get("sender_username"),
                    avatar: row.get("sender_avatar"),
                },
                receiver_id: row.get("receiver_id"),
                notification_type,
                payload,
                read: row.get("read"),
                created_at: row.get("created_at"),
            });
        }

        Ok(notifications)
    }

    pub async fn mark_all_read(&self, receiver_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read = true WHERE receiver_id = $1 AND read = false",
        )
        .bind(receiver_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }

    async fn create(
        &self,
        sender: &AuthorSummary,
        receiver_id: Uuid,
        notification_type: NotificationType,
        payload: NotificationPayload,
    ) -> Result<Notification> {
        let row = sqlx::query(
            "INSERT INTO notifications (sender_id, receiver_id, notification_type, payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, read, created_at",
        )
        .bind(sender.id)
        .bind(receiver_id)
        .bind(notification_type.as_db())
        .bind(Json(&payload))
        .fetch_one(self.db.pool())
        .await?;

        let notification = Notification {
            id: row.get("id"),
            sender: SenderSummary::from(sender),
            receiver_id,
            notification_type,
            payload,
            read: row.get("read"),
            created_at: row.get("created_at"),
        };

        let delivered = self.hub.publish(notification.clone());
        debug!(
            notification_id = %notification.id,
            receiver_id = %receiver_id,
            delivered,
            "notification created"
        );
        Ok(notification)
    }

    async fn find_user_id(&self, username: &str) -> Result<Option<Uuid>> {
        let id = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(id)
    }
}
