//! Auth Tests
//!
//! Covers registration, password and token login, password changes and the
//! authorization header handling.

mod common;

use axum::http::StatusCode;
use common::{app, DEFAULT_PASSWORD};
use serde_json::json;
use uuid::Uuid;

fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..8])
}

// ===========================================================================
// Registration
// ===========================================================================

#[tokio::test]
async fn register_returns_user_and_token() {
    let Some(app) = app().await else { return };
    let username = unique("areg");

    let resp = app
        .post_json(
            "/api/auth/register",
            json!({
                "email": format!("{}@Example.com", username),
                "fullName": "Reg Ister",
                "username": username,
                "password": "hunter22",
            }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["user"]["username"], username.as_str());
    assert_eq!(body["user"]["email"], format!("{}@example.com", username).as_str());
    assert_eq!(body["user"]["confirmed"], false);
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("passwordHash").is_none());
    let token = body["token"].as_str().unwrap();

    // The token authenticates follow-up requests
    let resp = app.get("/api/notification", Some(token)).await;
    assert_eq!(resp.status, StatusCode::OK);

    let pending: Option<String> =
        sqlx::query_scalar("SELECT confirmation_token FROM users WHERE username = $1")
            .bind(&username)
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert_eq!(pending.unwrap().len(), 64);
}

#[tokio::test]
async fn register_duplicate_username_conflicts() {
    let Some(app) = app().await else { return };
    let existing = app.create_user("adup").await;

    let resp = app
        .post_json(
            "/api/auth/register",
            json!({
                "email": format!("{}@example.com", unique("other")),
                "fullName": "Someone Else",
                "username": existing.username,
                "password": "hunter22",
            }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "Username already taken.");

    let resp = app
        .post_json(
            "/api/auth/register",
            json!({
                "email": existing.email,
                "fullName": "Someone Else",
                "username": unique("adup2"),
                "password": "hunter22",
            }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "Email already taken.");
}

#[tokio::test]
async fn register_validates_input() {
    let Some(app) = app().await else { return };

    let cases = [
        json!({ "email": "nope", "fullName": "A", "username": unique("av"), "password": "hunter22" }),
        json!({ "email": "a@b.co", "fullName": " ", "username": unique("av"), "password": "hunter22" }),
        json!({ "email": "a@b.co", "fullName": "A", "username": "bad name", "password": "hunter22" }),
        json!({ "email": "a@b.co", "fullName": "A", "username": "confirm", "password": "hunter22" }),
        json!({ "email": "a@b.co", "fullName": "A", "username": unique("av"), "password": "123" }),
    ];
    for case in cases {
        let resp = app.post_json("/api/auth/register", case.clone(), None).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{}", case);
        assert!(!resp.error_message().is_empty());
    }
}

// ===========================================================================
// Login
// ===========================================================================

#[tokio::test]
async fn login_with_username_or_email() {
    let Some(app) = app().await else { return };
    let user = app.create_user("alog").await;

    for identifier in [&user.username, &user.email] {
        let resp = app
            .post_json(
                "/api/auth/login",
                json!({ "usernameOrEmail": identifier, "password": DEFAULT_PASSWORD }),
                None,
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.json()["user"]["id"], user.id.to_string().as_str());
        assert!(resp.json()["token"].as_str().is_some());
    }
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let Some(app) = app().await else { return };
    let user = app.create_user("awrong").await;

    let resp = app
        .post_json(
            "/api/auth/login",
            json!({ "usernameOrEmail": user.username, "password": "not-the-password" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.error_message(),
        "The credentials you provided are incorrect, please try again."
    );

    let resp = app
        .post_json(
            "/api/auth/login",
            json!({ "usernameOrEmail": "", "password": "" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_with_token_returns_same_token() {
    let Some(app) = app().await else { return };
    let user = app.create_user("atok").await;

    let resp = app.post("/api/auth/login", Some(&user.token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["token"], user.token.as_str());
    assert_eq!(resp.json()["user"]["username"], user.username.as_str());

    let resp = app.post("/api/auth/login", Some("v4.local.garbage")).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// Password change
// ===========================================================================

#[tokio::test]
async fn change_password_then_login() {
    let Some(app) = app().await else { return };
    let user = app.create_user("apass").await;

    let resp = app
        .put_json(
            "/api/auth/password",
            json!({ "oldPassword": "wrong-old", "newPassword": "brandnew1" }),
            Some(&user.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app
        .put_json(
            "/api/auth/password",
            json!({ "oldPassword": DEFAULT_PASSWORD, "newPassword": "brandnew1" }),
            Some(&user.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app
        .post_json(
            "/api/auth/login",
            json!({ "usernameOrEmail": user.username, "password": "brandnew1" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn github_login_unavailable_without_config() {
    let Some(app) = app().await else { return };

    let resp = app
        .post_json("/api/auth/login/github", json!({ "code": "abc" }), None)
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "GitHub login is not available.");
}
