use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::jobs::notifier::NotificationJob;

/// In-process queue feeding the notification worker.
///
/// Request handlers enqueue and return immediately; the worker in
/// [`crate::jobs::notifier`] persists and pushes the notifications. The queue
/// closes once every `NotificationQueue` clone is dropped, which lets the
/// worker drain what is left and stop.
#[derive(Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<QueuedJob>,
}

pub struct NotificationReceiver {
    receiver: mpsc::Receiver<QueuedJob>,
}

#[derive(Debug)]
pub struct QueuedJob {
    pub job: NotificationJob,
    /// Receives the number of notifications the job created.
    pub done: Option<oneshot::Sender<usize>>,
}

impl NotificationQueue {
    pub fn channel(capacity: usize) -> (Self, NotificationReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, NotificationReceiver { receiver })
    }

    /// Enqueues without waiting. A full queue drops the job with a warning
    /// rather than stalling the request that produced it.
    pub fn enqueue(&self, job: NotificationJob) {
        let kind = job.kind();
        match self.sender.try_send(QueuedJob { job, done: None }) {
            Ok(()) => debug!(kind, "queued notification job"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(kind, "notification queue full, dropping job")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(kind, "notification queue closed, dropping job")
            }
        }
    }

    /// Enqueues and waits until the worker has processed the job.
    pub async fn enqueue_and_wait(&self, job: NotificationJob) -> Result<usize> {
        let (done, completed) = oneshot::channel();
        self.sender
            .send(QueuedJob {
                job,
                done: Some(done),
            })
            .await
            .map_err(|_| anyhow!("notification queue closed"))?;
        completed
            .await
            .map_err(|_| anyhow!("notification worker dropped the job"))
    }
}

impl NotificationReceiver {
    pub async fn receive(&mut self) -> Option<QueuedJob> {
        self.receiver.recv().await
    }
}
