//! Post Tests
//!
//! Covers retrieval of populated posts, the feed, votes, bookmarks,
//! hashtags and deletion. Image upload itself is exercised in unit tests.

mod common;

use axum::http::StatusCode;
use common::app;
use uuid::Uuid;

// ===========================================================================
// Retrieval
// ===========================================================================

#[tokio::test]
async fn post_is_populated_with_author_and_counts() {
    let Some(app) = app().await else { return };
    let author = app.create_user("ppop").await;
    let post_id = app.create_post(author.id, "first light").await;

    let resp = app.get(&format!("/api/post/{}", post_id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["id"], post_id.to_string().as_str());
    assert_eq!(body["caption"], "first light");
    assert_eq!(body["author"]["username"], author.username.as_str());
    assert_eq!(body["voteCount"], 0);
    assert_eq!(body["commentCount"], 0);
    // Author data never carries account secrets
    assert!(body["author"].get("email").is_none());
    assert!(body["author"].get("password").is_none());
    assert_eq!(body["commentData"]["commentCount"], 0);
}

#[tokio::test]
async fn unknown_post_is_not_found() {
    let Some(app) = app().await else { return };

    let resp = app.get(&format!("/api/post/{}", Uuid::new_v4()), None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_posts_are_newest_first() {
    let Some(app) = app().await else { return };
    let author = app.create_user("plist").await;
    let older = app.create_post(author.id, "older").await;
    sqlx::query("UPDATE posts SET created_at = now() - interval '1 hour' WHERE id = $1")
        .bind(older)
        .execute(app.pool())
        .await
        .unwrap();
    let newer = app.create_post(author.id, "newer").await;

    let resp = app
        .get(&format!("/api/user/{}/posts/0", author.username), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![newer.to_string(), older.to_string()]);

    let resp = app.get("/api/user/nobody_by_that_name/posts/0", None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn feed_includes_followed_accounts() {
    let Some(app) = app().await else { return };
    let reader = app.create_user("pfeed").await;
    let writer = app.create_user("pfeed2").await;
    let post_id = app.create_post(writer.id, "from afar").await;

    let resp = app.get("/api/post/feed/0", Some(&reader.token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.json().as_array().unwrap().is_empty());

    let resp = app
        .post(&format!("/api/user/{}/follow", writer.id), Some(&reader.token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app.get("/api/post/feed/0", Some(&reader.token)).await;
    let body = resp.json();
    let posts = body.as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["id"], post_id.to_string().as_str());
}

#[tokio::test]
async fn hashtag_lookup_ignores_case_and_hash() {
    let Some(app) = app().await else { return };
    let author = app.create_user("ptag").await;
    let post_id = app.create_post(author.id, "#Sunset").await;
    let tag = format!("sunset{}", &author.username[5..]);
    sqlx::query("UPDATE posts SET hashtags = ARRAY[$2::text] WHERE id = $1")
        .bind(post_id)
        .bind(&tag)
        .execute(app.pool())
        .await
        .unwrap();

    let resp = app
        .get(&format!("/api/post/hashtag/{}/0", tag.to_uppercase()), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], post_id.to_string().as_str());
}

#[tokio::test]
async fn filters_are_listed() {
    let Some(app) = app().await else { return };

    let resp = app.get("/api/post/filters", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert!(body
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f["name"] == "Normal"));
}

#[tokio::test]
async fn negative_offset_is_rejected() {
    let Some(app) = app().await else { return };
    let user = app.create_user("poff").await;

    let resp = app.get("/api/post/feed/-5", Some(&user.token)).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// Votes, bookmarks, deletion
// ===========================================================================

#[tokio::test]
async fn vote_toggles_and_is_counted() {
    let Some(app) = app().await else { return };
    let author = app.create_user("pvote").await;
    let voter = app.create_user("pvote2").await;
    let post_id = app.create_post(author.id, "vote").await;

    let resp = app
        .post(&format!("/api/post/{}/vote", post_id), Some(&voter.token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["state"], "voted");

    let resp = app.get(&format!("/api/post/{}", post_id), None).await;
    assert_eq!(resp.json()["voteCount"], 1);

    let resp = app
        .post(&format!("/api/post/{}/vote", post_id), Some(&voter.token))
        .await;
    assert_eq!(resp.json()["state"], "unvoted");

    let resp = app.get(&format!("/api/post/{}", post_id), None).await;
    assert_eq!(resp.json()["voteCount"], 0);
}

#[tokio::test]
async fn bookmark_toggles() {
    let Some(app) = app().await else { return };
    let author = app.create_user("pbook").await;
    let post_id = app.create_post(author.id, "keep").await;

    let resp = app
        .post(&format!("/api/user/{}/bookmark", post_id), Some(&author.token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["bookmarked"], true);

    let resp = app
        .post(&format!("/api/user/{}/bookmark", post_id), Some(&author.token))
        .await;
    assert_eq!(resp.json()["bookmarked"], false);

    let resp = app
        .post(&format!("/api/user/{}/bookmark", Uuid::new_v4()), Some(&author.token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_author_deletes_post() {
    let Some(app) = app().await else { return };
    let author = app.create_user("pdel").await;
    let other = app.create_user("pdel2").await;
    let post_id = app.create_post(author.id, "gone soon").await;

    let resp = app
        .delete(&format!("/api/post/{}", post_id), Some(&other.token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app
        .delete(&format!("/api/post/{}", post_id), Some(&author.token))
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app.get(&format!("/api/post/{}", post_id), None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Feed cache
// ===========================================================================

#[tokio::test]
async fn deleting_post_refreshes_authors_cached_feed() {
    let Some(app) = app().await else { return };
    let author = app.create_user("pfcache").await;
    let post_id = app.create_post(author.id, "short lived").await;

    // Warm the cache with the post in it
    let resp = app.get("/api/post/feed/0", Some(&author.token)).await;
    assert_eq!(resp.json().as_array().unwrap().len(), 1);

    let resp = app
        .delete(&format!("/api/post/{}", post_id), Some(&author.token))
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app.get("/api/post/feed/0", Some(&author.token)).await;
    assert!(resp.json().as_array().unwrap().is_empty());
}

#[tokio::test]
async fn cache_prefix_delete_spares_other_keys() {
    let Some(app) = app().await else { return };
    let mine = Uuid::new_v4();
    let theirs = Uuid::new_v4();
    let cache = &app.state.cache;

    for offset in [0, 5, 10] {
        cache
            .set_json(&format!("feed:{}:{}", mine, offset), &vec![offset], 60)
            .await;
    }
    cache
        .set_json(&format!("feed:{}:0", theirs), &vec![1], 60)
        .await;

    cache.delete_prefix(&format!("feed:{}:", mine)).await;

    for offset in [0, 5, 10] {
        let cached: Option<Vec<i32>> = cache.get_json(&format!("feed:{}:{}", mine, offset)).await;
        assert!(cached.is_none());
    }
    let kept: Option<Vec<i32>> = cache.get_json(&format!("feed:{}:0", theirs)).await;
    assert_eq!(kept, Some(vec![1]));
}
