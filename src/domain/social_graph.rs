use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::user::AuthorSummary;

/// One row of a followers/following listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowEdge {
    pub user: AuthorSummary,
    #[serde(with = "time::serde::rfc3339")]
    pub followed_at: OffsetDateTime,
    /// Whether the viewer follows this user.
    pub is_following: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FollowState {
    Followed,
    Unfollowed,
}
