//! API Client Tests
//!
//! Runs `ApiClient` against a small stub server speaking the same wire
//! format, so these need no database.

use axum::extract::{Multipart, Path};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use uuid::Uuid;

use panorama::client::{ApiClient, ApiErrorKind, ProfileChanges};
use panorama::domain::comment::VoteState;
use panorama::domain::social_graph::FollowState;

const TOKEN: &str = "v4.local.stub-token";

fn user_json(username: &str) -> Value {
    json!({
        "id": Uuid::nil(),
        "username": username,
        "fullName": "Stub User",
        "email": format!("{}@example.com", username),
        "avatar": null,
        "bio": null,
        "website": null,
        "private": false,
        "confirmed": true,
        "createdAt": "2024-01-01T00:00:00Z",
    })
}

fn unauthorized() -> axum::response::Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Not authorized." }))).into_response()
}

fn has_token(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        == Some(TOKEN)
}

async fn login(Json(body): Json<Value>) -> axum::response::Response {
    if body["password"] != "secret1" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "The credentials you provided are incorrect, please try again." })),
        )
            .into_response();
    }
    let username = body["usernameOrEmail"].as_str().unwrap_or_default();
    Json(json!({ "user": user_json(username), "token": TOKEN })).into_response()
}

async fn register(Json(body): Json<Value>) -> axum::response::Response {
    if body["username"] == "taken" {
        return (StatusCode::CONFLICT, Json(json!({ "error": "Username already taken." }))).into_response();
    }
    let username = body["username"].as_str().unwrap_or_default();
    (StatusCode::CREATED, Json(json!({ "user": user_json(username), "token": TOKEN }))).into_response()
}

async fn notifications(headers: HeaderMap) -> axum::response::Response {
    if !has_token(&headers) {
        return unauthorized();
    }
    Json(json!([])).into_response()
}

async fn read_notifications(headers: HeaderMap) -> axum::response::Response {
    if !has_token(&headers) {
        return unauthorized();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn search(Path((username, offset)): Path<(String, i64)>) -> Json<Value> {
    Json(json!([{
        "id": Uuid::nil(),
        "username": format!("{}|{}", username, offset),
        "fullName": "Found",
        "avatar": null,
    }]))
}

async fn vote(headers: HeaderMap) -> axum::response::Response {
    if !has_token(&headers) {
        return unauthorized();
    }
    Json(json!({ "state": "voted" })).into_response()
}

async fn follow(headers: HeaderMap) -> axum::response::Response {
    if !has_token(&headers) {
        return unauthorized();
    }
    Json(json!({ "state": "followed" })).into_response()
}

async fn update_profile(headers: HeaderMap, Json(body): Json<Value>) -> axum::response::Response {
    if !has_token(&headers) {
        return unauthorized();
    }
    let mut user = user_json("stub");
    if let Some(bio) = body.get("bio") {
        user["bio"] = bio.clone();
    }
    // Unset fields must not be sent at all
    if body.get("email").is_some() {
        return (StatusCode::BAD_REQUEST, "unexpected email").into_response();
    }
    Json(user).into_response()
}

async fn avatar(mut multipart: Multipart) -> axum::response::Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("image") {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.unwrap_or_default();
            return Json(json!({ "avatar": format!("{}:{}", file_name, bytes.len()) })).into_response();
        }
    }
    (StatusCode::BAD_REQUEST, Json(json!({ "error": "Please provide the image to upload." }))).into_response()
}

async fn broken() -> axum::response::Response {
    (StatusCode::BAD_GATEWAY, "upstream down").into_response()
}

async fn not_json() -> &'static str {
    "definitely not json"
}

async fn spawn_stub() -> String {
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/notification", get(notifications).put(read_notifications))
        .route("/api/user/:id/:offset/search", get(search))
        .route("/api/user/:id/follow", post(follow))
        .route("/api/user", put(update_profile))
        .route("/api/user/avatar", put(avatar))
        .route("/api/post/:id/vote", post(vote))
        .route("/api/post/feed/:offset", get(broken))
        .route("/api/post/filters", get(not_json));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

// ===========================================================================
// Sessions
// ===========================================================================

#[tokio::test]
async fn login_stores_token_for_later_calls() {
    let base = spawn_stub().await;
    let mut client = ApiClient::new(&base).unwrap();

    let err = client.get_notifications().await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Unauthorized);

    let response = client.login("ann", "secret1").await.unwrap();
    assert_eq!(response.user.username, "ann");
    assert_eq!(client.token(), Some(TOKEN));

    let notifications = client.get_notifications().await.unwrap();
    assert!(notifications.is_empty());
    client.read_notifications().await.unwrap();
}

#[tokio::test]
async fn failed_login_keeps_no_token() {
    let base = spawn_stub().await;
    let mut client = ApiClient::new(&base).unwrap();

    let err = client.login("ann", "wrong").await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Unauthorized);
    assert_eq!(
        err.message,
        "The credentials you provided are incorrect, please try again."
    );
    assert_eq!(client.token(), None);
}

#[tokio::test]
async fn register_conflict_is_reported() {
    let base = spawn_stub().await;
    let mut client = ApiClient::new(&base).unwrap();

    let err = client
        .register("t@example.com", "Taken", "taken", "secret1")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Conflict);
    assert_eq!(err.to_string(), "Username already taken.");

    let response = client
        .register("new@example.com", "New", "newbie", "secret1")
        .await
        .unwrap();
    assert_eq!(response.user.username, "newbie");
    assert_eq!(client.token(), Some(TOKEN));
}

#[tokio::test]
async fn stale_token_is_rejected() {
    let base = spawn_stub().await;
    let client = ApiClient::new(&base).unwrap().with_token("expired");

    let err = client.vote_post(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Unauthorized);
    assert_eq!(err.message, "Not authorized.");
}

// ===========================================================================
// Endpoints
// ===========================================================================

#[tokio::test]
async fn path_segments_are_encoded() {
    let base = spawn_stub().await;
    let client = ApiClient::new(&base).unwrap();

    let found = client.search_users("a b", 20).await.unwrap();
    assert_eq!(found[0].username, "a b|20");
}

#[tokio::test]
async fn toggles_decode_their_state() {
    let base = spawn_stub().await;
    let client = ApiClient::new(&base).unwrap().with_token(TOKEN);

    assert_eq!(client.vote_post(Uuid::new_v4()).await.unwrap(), VoteState::Voted);
    assert_eq!(
        client.follow_user(Uuid::new_v4()).await.unwrap(),
        FollowState::Followed
    );
}

#[tokio::test]
async fn profile_update_sends_only_set_fields() {
    let base = spawn_stub().await;
    let client = ApiClient::new(&base).unwrap().with_token(TOKEN);

    let user = client
        .update_profile(&ProfileChanges {
            bio: Some("new bio".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(user.bio.as_deref(), Some("new bio"));
}

#[tokio::test]
async fn avatar_is_uploaded_as_multipart() {
    let base = spawn_stub().await;
    let client = ApiClient::new(&base).unwrap().with_token(TOKEN);

    let avatar = client
        .change_avatar(vec![1, 2, 3, 4], "me.png")
        .await
        .unwrap();
    assert_eq!(avatar, "me.png:4");
}

// ===========================================================================
// Error mapping
// ===========================================================================

#[tokio::test]
async fn plain_text_errors_keep_their_body() {
    let base = spawn_stub().await;
    let client = ApiClient::new(&base).unwrap().with_token(TOKEN);

    let err = client.get_feed(0).await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Server);
    assert_eq!(err.message, "upstream down");
}

#[tokio::test]
async fn unexpected_body_is_a_decode_error() {
    let base = spawn_stub().await;
    let client = ApiClient::new(&base).unwrap();

    let err = client.get_post_filters().await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Decode);
}

#[tokio::test]
async fn missing_route_is_not_found() {
    let base = spawn_stub().await;
    let client = ApiClient::new(&base).unwrap();

    let err = client.get_post(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::NotFound);
    assert_eq!(err.message, "Not Found");
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(&format!("http://{}", addr)).unwrap();
    let err = client.get_post_filters().await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Transport);
}
