use axum::{routing::get, routing::post, routing::put, Router};

use crate::http::handlers;
use crate::AppState;

// Every path parameter in a given segment position shares one name (`:id`,
// `:offset`), since the router rejects conflicting names at the same level.

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/login/github", post(handlers::github_login))
        .route("/auth/register", post(handlers::register))
        .route("/auth/password", put(handlers::change_password))
}

pub fn comments() -> Router<AppState> {
    Router::new()
        .route(
            "/comment/:id",
            post(handlers::create_comment).delete(handlers::delete_comment),
        )
        .route("/comment/:id/vote", post(handlers::vote_comment))
        .route(
            "/comment/:id/reply",
            post(handlers::create_reply).delete(handlers::delete_reply),
        )
        .route("/comment/:id/replyVote", post(handlers::vote_reply))
        .route("/comment/:id/:offset/replies", get(handlers::list_replies))
        .route("/comment/:id/:offset/:exclude", get(handlers::retrieve_comments))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/post", post(handlers::create_post))
        .route("/post/filters", get(handlers::list_filters))
        .route("/post/feed/:offset", get(handlers::get_feed))
        .route("/post/suggested/:offset", get(handlers::suggested_posts))
        .route("/post/hashtag/:hashtag/:offset", get(handlers::hashtag_posts))
        .route(
            "/post/:id",
            get(handlers::get_post).delete(handlers::delete_post),
        )
        .route("/post/:id/vote", post(handlers::vote_post))
}

pub fn notifications() -> Router<AppState> {
    Router::new().route(
        "/notification",
        get(handlers::list_notifications).put(handlers::read_notifications),
    )
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/user", put(handlers::update_profile))
        .route("/user/confirm", put(handlers::confirm_user))
        .route(
            "/user/avatar",
            put(handlers::change_avatar).delete(handlers::remove_avatar),
        )
        .route("/user/suggested", get(handlers::suggested_users))
        .route("/user/suggested/:max", get(handlers::suggested_users))
        .route("/user/:id", get(handlers::get_profile))
        .route("/user/:id/follow", post(handlers::follow_user))
        .route("/user/:id/bookmark", post(handlers::bookmark_post))
        .route("/user/:id/posts/:offset", get(handlers::list_user_posts))
        .route("/user/:id/:offset/following", get(handlers::list_following))
        .route("/user/:id/:offset/followers", get(handlers::list_followers))
        .route("/user/:id/:offset/search", get(handlers::search_users))
}
