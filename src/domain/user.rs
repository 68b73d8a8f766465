use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Full user record. Only ever returned to the account owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub private: bool,
    pub confirmed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Author data embedded in posts, comments, replies and notifications.
///
/// Carries no password, email, privacy flag, bio, bookmarks, confirmation
/// state or github id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar: Option<String>,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

/// Minimal sender payload attached to pushed notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderSummary {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
}

impl From<&AuthorSummary> for SenderSummary {
    fn from(author: &AuthorSummary) -> Self {
        Self {
            id: author.id,
            username: author.username.clone(),
            avatar: author.avatar.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub private: bool,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
    pub is_following: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_summary_omits_sensitive_fields() {
        let user = User {
            id: Uuid::new_v4(),
            username: "carol".into(),
            full_name: "Carol".into(),
            email: "carol@example.com".into(),
            avatar: None,
            bio: Some("secret bio".into()),
            website: None,
            private: true,
            confirmed: true,
            created_at: OffsetDateTime::now_utc(),
        };

        let value = serde_json::to_value(AuthorSummary::from(&user)).unwrap();
        let object = value.as_object().unwrap();
        for key in ["password", "email", "private", "bio", "bookmarks", "githubId"] {
            assert!(!object.contains_key(key), "{} leaked", key);
        }
        assert_eq!(object["username"], "carol");
    }
}
