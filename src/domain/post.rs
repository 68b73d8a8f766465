use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::comment::CommentPage;
use crate::domain::user::AuthorSummary;

/// A post joined with its author and derived counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub author: AuthorSummary,
    pub image: String,
    pub thumbnail: String,
    pub filter: Option<String>,
    pub caption: Option<String>,
    pub hashtags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Comments and replies combined.
    pub comment_count: i64,
    pub vote_count: i64,
}

/// A single post together with its first page of comments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub comment_data: CommentPage,
}

/// Photo filters a post can be created with.
pub const POST_FILTERS: &[(&str, &str)] = &[
    ("Normal", ""),
    ("Clarendon", "contrast(1.2) saturate(1.35)"),
    ("Gingham", "brightness(1.05) hue-rotate(-10deg)"),
    ("Moon", "grayscale(1) contrast(1.1) brightness(1.1)"),
    ("Lark", "contrast(0.9) brightness(1.1) saturate(1.1)"),
    ("Reyes", "sepia(0.22) brightness(1.1) contrast(0.85) saturate(0.75)"),
    ("Juno", "contrast(1.15) saturate(1.8) sepia(0.2)"),
    ("Slumber", "saturate(0.66) brightness(1.05)"),
    ("Crema", "sepia(0.5) contrast(1.25) brightness(1.15) saturate(0.9)"),
    ("Ludwig", "sepia(0.25) contrast(1.05) brightness(1.05) saturate(2)"),
    ("Aden", "hue-rotate(-20deg) contrast(0.9) saturate(0.85) brightness(1.2)"),
    ("Perpetua", "contrast(1.1) brightness(1.25) saturate(1.1)"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFilter {
    pub name: String,
    pub filter: String,
}

pub fn post_filters() -> Vec<PostFilter> {
    POST_FILTERS
        .iter()
        .map(|(name, filter)| PostFilter {
            name: name.to_string(),
            filter: filter.to_string(),
        })
        .collect()
}

pub fn is_known_filter(value: &str) -> bool {
    POST_FILTERS.iter().any(|(name, _)| *name == value)
}

/// Extracts lowercase `#hashtag` tokens from a caption, first occurrence order,
/// without duplicates.
pub fn extract_hashtags(caption: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for word in caption.split_whitespace() {
        for part in word.split('#').skip(1) {
            let tag: String = part
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect::<String>()
                .to_lowercase();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    tags
}
