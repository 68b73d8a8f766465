use anyhow::Result;
use uuid::Uuid;

use crate::app::posts::{populate_posts, post_from_row};
use crate::domain::post::Post;
use crate::infra::{cache::RedisCache, db::Db};

pub const FEED_PAGE_SIZE: i64 = 5;
/// Post writes invalidate only the author's own pages, so followers can see a
/// created or deleted post late by up to this long.
pub const FEED_CACHE_TTL_SECONDS: u64 = 30;

#[derive(Clone)]
pub struct FeedService {
    db: Db,
    cache: RedisCache,
}

impl FeedService {
    pub fn new(db: Db, cache: RedisCache) -> Self {
        Self { db, cache }
    }

    /// Posts by the user and the accounts they follow, newest first.
    pub async fn get_feed(&self, user_id: Uuid, offset: i64) -> Result<Vec<Post>> {
        // Fan-out on read, cached briefly per page to absorb scroll bursts.
        let offset = offset.max(0);
        let cache_key = format!("feed:{}:{}", user_id, offset);
        if let Some(posts) = self.cache.get_json::<Vec<Post>>(&cache_key).await {
            return Ok(posts);
        }

        let rows = sqlx::query(&populate_posts(
            "WHERE p.author_id = $1 \
                OR p.author_id IN (SELECT followee_id FROM follows WHERE follower_id = $1) \
             ORDER BY p.created_at DESC, p.id DESC \
             OFFSET $2 LIMIT $3",
        ))
        .bind(user_id)
        .bind(offset)
        .bind(FEED_PAGE_SIZE)
        .fetch_all(self.db.pool())
        .await?;

        let posts: Vec<Post> = rows.iter().map(post_from_row).collect();
        self.cache
            .set_json(&cache_key, &posts, FEED_CACHE_TTL_SECONDS)
            .await;

        Ok(posts)
    }

    /// Drops every cached page of the user's feed.
    pub async fn invalidate(&self, user_id: Uuid) {
        self.cache.delete_prefix(&format!("feed:{}:", user_id)).await;
    }
}
