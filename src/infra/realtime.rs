use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::notification::Notification;

/// Fan-out point for freshly created notifications.
///
/// Whatever transport delivers notifications to connected clients subscribes
/// here and forwards the ones addressed to its user.
#[derive(Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscribers saw the notification.
    pub fn publish(&self, notification: Notification) -> usize {
        self.sender.send(notification).unwrap_or(0)
    }

    /// Subscription that only yields notifications for `receiver_id`.
    pub fn subscribe_user(&self, receiver_id: Uuid) -> UserSubscription {
        UserSubscription {
            receiver_id,
            inner: self.sender.subscribe(),
        }
    }
}

pub struct UserSubscription {
    receiver_id: Uuid,
    inner: broadcast::Receiver<Notification>,
}

impl UserSubscription {
    /// Next notification for this user, or `None` once the hub is gone.
    /// Lagged messages are skipped.
    pub async fn next(&mut self) -> Option<Notification> {
        loop {
            match self.inner.recv().await {
                Ok(notification) if notification.receiver_id == self.receiver_id => {
                    return Some(notification)
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, receiver_id = %self.receiver_id, "notification subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
