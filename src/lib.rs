pub mod app;
pub mod client;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod jobs;

use crate::app::auth::GithubClient;
use crate::app::email::Mailer;
use crate::app::media::ImageService;
use crate::infra::{
    cache::RedisCache, db::Db, queue::NotificationQueue, realtime::NotificationHub,
    storage::ObjectStorage,
};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: RedisCache,
    pub storage: ObjectStorage,
    pub queue: NotificationQueue,
    pub hub: NotificationHub,
    pub mailer: Mailer,
    pub github: Option<GithubClient>,
    pub upload_max_bytes: usize,
    pub paseto_access_key: [u8; 32],
    pub access_ttl_minutes: u64,
}

impl AppState {
    pub fn images(&self) -> ImageService {
        ImageService::new(self.storage.clone(), self.upload_max_bytes)
    }
}
