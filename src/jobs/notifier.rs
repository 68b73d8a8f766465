use anyhow::{anyhow, Result};
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::app::notifications::NotificationService;
use crate::domain::notification::NotificationPayload;
use crate::domain::user::AuthorSummary;
use crate::infra::queue::{NotificationReceiver, QueuedJob};

/// Notification side effects of a user action.
#[derive(Debug, Clone)]
pub enum NotificationJob {
    /// `sender` commented on a post owned by `receiver_id`.
    Comment {
        sender: AuthorSummary,
        receiver_id: Uuid,
        payload: NotificationPayload,
    },
    /// `sender` wrote `message` on a post by `post_author_username`.
    Mentions {
        sender: AuthorSummary,
        post_author_username: String,
        message: String,
        payload: NotificationPayload,
    },
    Follow {
        sender: AuthorSummary,
        receiver_id: Uuid,
    },
}

impl NotificationJob {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Comment { .. } => "comment",
            Self::Mentions { .. } => "mentions",
            Self::Follow { .. } => "follow",
        }
    }
}

/// Running notification worker.
pub struct NotifierHandle {
    task: JoinHandle<Result<()>>,
}

impl NotifierHandle {
    pub fn spawn(service: NotificationService, receiver: NotificationReceiver) -> Self {
        Self {
            task: tokio::spawn(run(service, receiver)),
        }
    }

    /// Waits for the worker to drain the queue. Every `NotificationQueue`
    /// clone must be dropped first or this never returns.
    pub async fn shutdown(self) -> Result<()> {
        self.task
            .await
            .map_err(|err| anyhow!("notification worker panicked: {}", err))?
    }
}

/// Consumes the queue until every sender is dropped, then returns.
pub async fn run(service: NotificationService, mut receiver: NotificationReceiver) -> Result<()> {
    info!("notification worker started");
    while let Some(QueuedJob { job, done }) = receiver.receive().await {
        let created = match process_job(&service, &job).await {
            Ok(created) => created,
            Err(err) => {
                error!(error = ?err, kind = job.kind(), "failed to process notification job");
                0
            }
        };

        if let Some(done) = done {
            let _ = done.send(created);
        }
    }
    info!("notification queue closed, worker stopped");
    Ok(())
}

async fn process_job(service: &NotificationService, job: &NotificationJob) -> Result<usize> {
    match job {
        NotificationJob::Comment {
            sender,
            receiver_id,
            payload,
        } => {
            let created = service
                .send_comment_notification(sender, *receiver_id, payload.clone())
                .await?;
            Ok(created.map_or(0, |_| 1))
        }
        NotificationJob::Mentions {
            sender,
            post_author_username,
            message,
            payload,
        } => {
            let created = service
                .send_mention_notifications(sender, post_author_username, message, payload.clone())
                .await?;
            Ok(created.len())
        }
        NotificationJob::Follow {
            sender,
            receiver_id,
        } => {
            let created = service.send_follow_notification(sender, *receiver_id).await?;
            Ok(created.map_or(0, |_| 1))
        }
    }
}
