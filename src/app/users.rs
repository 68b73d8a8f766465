use anyhow::{anyhow, Result};
use rand::Rng;
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::future::Future;
use tracing::{debug, info};
use uuid::Uuid;

use crate::app::media::{ImageService, AVATAR};
use crate::app::{author_from_row, AUTHOR_COLUMNS};
use crate::domain::user::{AuthorSummary, Profile, User};
use crate::infra::db::Db;

pub const SEARCH_PAGE_SIZE: i64 = 10;
pub const DEFAULT_SUGGESTED_USERS: i64 = 5;
pub const MAX_SUGGESTED_USERS: i64 = 30;
pub const MAX_USERNAME_ATTEMPTS: usize = 50;

pub(crate) const USER_COLUMNS: &str =
    "id, username, full_name, email, avatar, bio, website, private, confirmed, created_at";

pub(crate) fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        avatar: row.get("avatar"),
        bio: row.get("bio"),
        website: row.get("website"),
        private: row.get("private"),
        confirmed: row.get("confirmed"),
        created_at: row.get("created_at"),
    }
}

/// Appends a random `1..=9999` suffix to `base` until `exists` reports the
/// candidate as free, giving up after [`MAX_USERNAME_ATTEMPTS`] tries.
pub async fn generate_unique_username<F, Fut>(base: &str, mut exists: F) -> Result<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    for attempt in 1..=MAX_USERNAME_ATTEMPTS {
        let suffix: u32 = rand::thread_rng().gen_range(1..=9999);
        let candidate = format!("{}{}", base, suffix);
        if !exists(candidate.clone()).await? {
            debug!(attempt, username = %candidate, "generated unique username");
            return Ok(candidate);
        }
    }
    Err(anyhow!(
        "could not generate a unique username from {} after {} attempts",
        base,
        MAX_USERNAME_ATTEMPTS
    ))
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub bio: Option<String>,
    pub private: Option<bool>,
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
    images: ImageService,
}

impl UserService {
    pub fn new(db: Db, images: ImageService) -> Self {
        Self { db, images }
    }

    pub async fn get_profile(&self, username: &str, viewer_id: Option<Uuid>) -> Result<Option<Profile>> {
        let row = sqlx::query(
            "SELECT u.id, u.username, u.full_name, u.avatar, u.bio, u.website, u.private, \
                    (SELECT COUNT(*) FROM follows f WHERE f.followee_id = u.id) AS followers_count, \
                    (SELECT COUNT(*) FROM follows f WHERE f.follower_id = u.id) AS following_count, \
                    (SELECT COUNT(*) FROM posts p WHERE p.author_id = u.id) AS posts_count, \
                    EXISTS ( \
                        SELECT 1 FROM follows f WHERE f.follower_id = $2 AND f.followee_id = u.id \
                    ) AS is_following \
             FROM users u \
             WHERE u.username = $1",
        )
        .bind(username)
        .bind(viewer_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| Profile {
            id: row.get("id"),
            username: row.get("username"),
            full_name: row.get("full_name"),
            avatar: row.get("avatar"),
            bio: row.get("bio"),
            website: row.get("website"),
            private: row.get("private"),
            followers_count: row.get("followers_count"),
            following_count: row.get("following_count"),
            posts_count: row.get("posts_count"),
            is_following: row.get("is_following"),
        }))
    }

    /// Users whose username starts with `prefix`, shortest match first.
    pub async fn search(&self, prefix: &str, offset: i64) -> Result<Vec<AuthorSummary>> {
        let pattern = format!("{}%", escape_like_pattern(prefix));
        let rows = sqlx::query(&format!(
            "SELECT {AUTHOR_COLUMNS} FROM users u \
             WHERE u.username ILIKE $1 ESCAPE '\\' \
             ORDER BY length(u.username) ASC, u.username ASC \
             OFFSET $2 LIMIT $3"
        ))
        .bind(pattern)
        .bind(offset.max(0))
        .bind(SEARCH_PAGE_SIZE)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(author_from_row).collect())
    }

    /// Random users the viewer does not follow yet.
    pub async fn suggested(&self, user_id: Uuid, max: Option<i64>) -> Result<Vec<AuthorSummary>> {
        let limit = max
            .unwrap_or(DEFAULT_SUGGESTED_USERS)
            .clamp(1, MAX_SUGGESTED_USERS);
        let rows = sqlx::query(&format!(
            "SELECT {AUTHOR_COLUMNS} FROM users u \
             WHERE u.id <> $1 \
               AND NOT EXISTS ( \
                   SELECT 1 FROM follows f WHERE f.follower_id = $1 AND f.followee_id = u.id \
               ) \
             ORDER BY random() \
             LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(author_from_row).collect())
    }

    /// Marks the account confirmed when `token` matches the pending one.
    pub async fn confirm(&self, user_id: Uuid, token: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET confirmed = true, confirmation_token = NULL \
             WHERE id = $1 AND confirmation_token = $2",
        )
        .bind(user_id)
        .bind(token)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stores a new avatar and returns its URL.
    /// Stores the new avatar and deletes the previous one.
    pub async fn change_avatar(&self, user_id: Uuid, image: Vec<u8>) -> Result<String> {
        let stored = self.images.store(user_id, image, AVATAR).await?;
        let previous = match self.replace_avatar(user_id, Some(&stored.thumbnail)).await {
            Ok(previous) => previous,
            Err(err) => {
                self.images.discard(&[stored.image.as_str(), stored.thumbnail.as_str()]).await;
                return Err(err);
            }
        };
        if let Some(previous) = previous.flatten() {
            self.images.discard_with_original(&previous).await;
        }

        info!(user_id = %user_id, "avatar changed");
        Ok(stored.thumbnail)
    }

    pub async fn remove_avatar(&self, user_id: Uuid) -> Result<bool> {
        let Some(previous) = self.replace_avatar(user_id, None).await? else {
            return Ok(false);
        };
        if let Some(previous) = previous {
            self.images.discard_with_original(&previous).await;
        }
        Ok(true)
    }

    /// Sets the avatar column and returns the old value; `None` when the
    /// user does not exist.
    async fn replace_avatar(&self, user_id: Uuid, avatar: Option<&str>) -> Result<Option<Option<String>>> {
        let previous = sqlx::query_scalar(
            "UPDATE users u SET avatar = $2 \
             FROM (SELECT id, avatar FROM users WHERE id = $1 FOR UPDATE) old \
             WHERE u.id = old.id \
             RETURNING old.avatar",
        )
        .bind(user_id)
        .bind(avatar)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(previous)
    }

    /// Changing the email resets the confirmation state.
    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users \
             SET full_name = COALESCE($2, full_name), \
                 username = COALESCE($3, username), \
                 confirmed = CASE WHEN $4::text IS NOT NULL AND $4 <> email THEN false ELSE confirmed END, \
                 email = COALESCE($4, email), \
                 website = COALESCE($5, website), \
                 bio = COALESCE($6, bio), \
                 private = COALESCE($7, private) \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(update.full_name)
        .bind(update.username)
        .bind(update.email)
        .bind(update.website)
        .bind(update.bio)
        .bind(update.private)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }
}

fn escape_like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}
