use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::auth::{
    is_valid_email, validate_password, validate_username, AuthService, LoggedIn, PasswordChange,
    Registration,
};
use crate::app::comments::CommentService;
use crate::app::feed::FeedService;
use crate::app::notifications::NotificationService;
use crate::app::posts::PostService;
use crate::app::social::SocialService;
use crate::app::users::{ProfileUpdate, UserService};
use crate::domain::comment::{Comment, CommentPage, CommentReply, VoteState};
use crate::domain::notification::Notification;
use crate::domain::post::{is_known_filter, post_filters, Post, PostDetail, PostFilter};
use crate::domain::social_graph::{FollowEdge, FollowState};
use crate::domain::user::{AuthorSummary, Profile, User};
use crate::http::auth::{token_from_headers, MaybeAuthUser};
use crate::http::{AppError, AuthUser};
use crate::AppState;

pub const LATEST_NOTIFICATIONS: i64 = 50;
const MAX_MESSAGE_LEN: usize = 2200;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(state.db.clone(), state.paseto_access_key, state.access_ttl_minutes)
}

fn comment_service(state: &AppState) -> CommentService {
    CommentService::new(state.db.clone(), state.queue.clone())
}

fn post_service(state: &AppState) -> PostService {
    PostService::new(state.db.clone(), state.images(), state.queue.clone())
}

fn user_service(state: &AppState) -> UserService {
    UserService::new(state.db.clone(), state.images())
}

fn check_offset(offset: i64) -> Result<i64, AppError> {
    if offset < 0 {
        return Err(AppError::bad_request("offset must not be negative"));
    }
    Ok(offset)
}

fn check_message(message: &str) -> Result<(), AppError> {
    if message.trim().is_empty() {
        return Err(AppError::bad_request("Please provide a message with your comment."));
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(AppError::bad_request("Comments may be at most 2200 characters long."));
    }
    Ok(())
}

/// Text fields plus the `image` file of a multipart upload.
struct UploadForm {
    image: Option<Bytes>,
    fields: HashMap<String, String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm {
        image: None,
        fields: HashMap::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("invalid multipart body: {}", err)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let data = field
                .bytes()
                .await
                .map_err(|err| AppError::bad_request(format!("invalid image upload: {}", err)))?;
            form.image = Some(data);
        } else {
            let value = field
                .text()
                .await
                .map_err(|err| AppError::bad_request(format!("invalid field {}: {}", name, err)))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

// ---- auth ----

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

impl From<LoggedIn> for AuthResponse {
    fn from(logged_in: LoggedIn) -> Self {
        Self {
            user: logged_in.user,
            token: logged_in.token,
        }
    }
}

/// Credentials in the body, or an existing token in the `authorization`
/// header when the body is absent.
pub async fn login(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<AuthResponse>, AppError> {
    let service = auth_service(&state);

    let logged_in = match payload {
        Some(Json(payload)) => {
            if payload.username_or_email.trim().is_empty() || payload.password.is_empty() {
                return Err(AppError::bad_request("Please provide both a username/email and a password."));
            }
            service
                .login(payload.username_or_email.trim(), &payload.password)
                .await
                .map_err(|err| {
                    tracing::error!(error = ?err, "failed to login");
                    AppError::internal("failed to login")
                })?
                .ok_or_else(|| {
                    AppError::unauthorized("The credentials you provided are incorrect, please try again.")
                })?
        }
        None => {
            let token = token_from_headers(&headers)
                .ok_or_else(|| AppError::bad_request("Please provide both a username/email and a password."))?;
            service
                .login_with_token(token)
                .await
                .map_err(|err| {
                    tracing::error!(error = ?err, "failed to login with token");
                    AppError::internal("failed to login")
                })?
                .ok_or_else(|| AppError::unauthorized("Not authorized."))?
        }
    };

    Ok(Json(logged_in.into()))
}

#[derive(Deserialize)]
pub struct GithubLoginRequest {
    pub code: String,
    /// Anti-forgery value echoed by the client; not checked server side.
    pub state: Option<String>,
}

pub async fn github_login(
    State(state): State<AppState>,
    Json(payload): Json<GithubLoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if payload.code.trim().is_empty() {
        return Err(AppError::bad_request("No code provided."));
    }
    let github = state
        .github
        .as_ref()
        .ok_or_else(|| AppError::bad_request("GitHub login is not available."))?;

    let logged_in = auth_service(&state)
        .login_with_github(github, payload.code.trim())
        .await
        .map_err(|err| {
            if let Some(conflict) = AppError::user_conflict(&err) {
                return conflict;
            }
            tracing::error!(error = ?err, "failed to login with github");
            AppError::internal("failed to login with github")
        })?
        .ok_or_else(|| AppError::unauthorized("Invalid GitHub code."))?;

    Ok(Json(logged_in.into()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub full_name: String,
    pub username: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let registration = Registration {
        email: payload.email,
        full_name: payload.full_name,
        username: payload.username,
        password: payload.password,
    };
    if let Some(problem) = registration.validate() {
        return Err(AppError::bad_request(problem));
    }

    let logged_in = auth_service(&state)
        .register(registration, &state.mailer)
        .await
        .map_err(|err| {
            if let Some(conflict) = AppError::user_conflict(&err) {
                return conflict;
            }
            tracing::error!(error = ?err, "failed to register user");
            AppError::internal("failed to register user")
        })?;

    Ok((StatusCode::CREATED, Json(logged_in.into())))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    if payload.old_password.is_empty() || payload.new_password.is_empty() {
        return Err(AppError::bad_request("Please provide both your old and new password."));
    }
    if let Some(problem) = validate_password(&payload.new_password) {
        return Err(AppError::bad_request(problem));
    }

    let outcome = auth_service(&state)
        .change_password(auth.user_id, &payload.old_password, &payload.new_password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to change password");
            AppError::internal("failed to change password")
        })?;

    match outcome {
        PasswordChange::Changed => Ok(StatusCode::NO_CONTENT),
        PasswordChange::WrongPassword => Err(AppError::unauthorized(
            "Your old password was entered incorrectly, please try again.",
        )),
        PasswordChange::NoPassword => Err(AppError::bad_request(
            "This account signs in through GitHub and has no password.",
        )),
    }
}

// ---- comments ----

#[derive(Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub state: VoteState,
}

pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<MessageRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    check_message(&payload.message)?;

    let comment = comment_service(&state)
        .create_comment(auth.user_id, post_id, payload.message)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to create comment");
            AppError::internal("failed to create comment")
        })?
        .ok_or_else(|| AppError::not_found("Could not find a post with that id."))?;

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(comment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = comment_service(&state)
        .delete_comment(comment_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %comment_id, "failed to delete comment");
            AppError::internal("failed to delete comment")
        })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(
            "Could not find a comment with that id associated with the user.",
        ))
    }
}

pub async fn vote_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<VoteResponse>, AppError> {
    let vote = comment_service(&state)
        .vote_comment(comment_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %comment_id, "failed to vote on comment");
            AppError::internal("failed to vote on comment")
        })?
        .ok_or_else(|| AppError::not_found("Could not find a comment with that id."))?;

    Ok(Json(VoteResponse { state: vote }))
}

pub async fn create_reply(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(parent_comment_id): Path<Uuid>,
    Json(payload): Json<MessageRequest>,
) -> Result<(StatusCode, Json<CommentReply>), AppError> {
    check_message(&payload.message)?;

    let reply = comment_service(&state)
        .create_reply(auth.user_id, parent_comment_id, payload.message)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, parent_comment_id = %parent_comment_id, "failed to create reply");
            AppError::internal("failed to create reply")
        })?
        .ok_or_else(|| AppError::not_found("Could not find a parent comment with that id."))?;

    Ok((StatusCode::CREATED, Json(reply)))
}

pub async fn delete_reply(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(reply_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = comment_service(&state)
        .delete_reply(reply_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, reply_id = %reply_id, "failed to delete reply");
            AppError::internal("failed to delete reply")
        })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(
            "Could not find a comment reply with that id associated with the user.",
        ))
    }
}

pub async fn vote_reply(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(reply_id): Path<Uuid>,
) -> Result<Json<VoteResponse>, AppError> {
    let vote = comment_service(&state)
        .vote_reply(reply_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, reply_id = %reply_id, "failed to vote on reply");
            AppError::internal("failed to vote on reply")
        })?
        .ok_or_else(|| AppError::not_found("Could not find a comment reply with that id."))?;

    Ok(Json(VoteResponse { state: vote }))
}

pub async fn list_replies(
    State(state): State<AppState>,
    Path((parent_comment_id, offset)): Path<(Uuid, i64)>,
) -> Result<Json<Vec<CommentReply>>, AppError> {
    let offset = check_offset(offset)?;
    let replies = comment_service(&state)
        .list_replies(parent_comment_id, offset)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, parent_comment_id = %parent_comment_id, "failed to list replies");
            AppError::internal("failed to list replies")
        })?;

    Ok(Json(replies))
}

pub async fn retrieve_comments(
    State(state): State<AppState>,
    Path((post_id, offset, exclude)): Path<(Uuid, i64, i64)>,
) -> Result<Json<CommentPage>, AppError> {
    let offset = check_offset(offset)?;
    if exclude < 0 {
        return Err(AppError::bad_request("exclude must not be negative"));
    }

    let page = comment_service(&state)
        .retrieve_comments(post_id, offset, exclude)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to retrieve comments");
            AppError::internal("failed to fetch comments")
        })?;

    Ok(Json(page))
}

// ---- posts ----

pub async fn get_feed(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(offset): Path<i64>,
) -> Result<Json<Vec<Post>>, AppError> {
    let offset = check_offset(offset)?;
    let posts = FeedService::new(state.db.clone(), state.cache.clone())
        .get_feed(auth.user_id, offset)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch feed");
            AppError::internal("failed to fetch feed")
        })?;

    Ok(Json(posts))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<PostDetail>, AppError> {
    let post = post_service(&state)
        .get_post(post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to fetch post");
            AppError::internal("failed to fetch post")
        })?
        .ok_or_else(|| AppError::not_found("Could not find a post with that id."))?;

    let comment_data = comment_service(&state)
        .retrieve_comments(post_id, 0, 0)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to retrieve comments");
            AppError::internal("failed to fetch post")
        })?;

    Ok(Json(PostDetail { post, comment_data }))
}

pub async fn list_user_posts(
    State(state): State<AppState>,
    Path((username, offset)): Path<(String, i64)>,
) -> Result<Json<Vec<Post>>, AppError> {
    let offset = check_offset(offset)?;
    let posts = post_service(&state)
        .list_by_username(&username, offset)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, username = %username, "failed to list user posts");
            AppError::internal("failed to list user posts")
        })?
        .ok_or_else(|| AppError::not_found("Could not find a user with that username."))?;

    Ok(Json(posts))
}

pub async fn vote_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<VoteResponse>, AppError> {
    let vote = post_service(&state)
        .vote_post(post_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to vote on post");
            AppError::internal("failed to vote on post")
        })?
        .ok_or_else(|| AppError::not_found("Could not find a post with that id."))?;

    Ok(Json(VoteResponse { state: vote }))
}

pub async fn create_post(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Post>), AppError> {
    let mut form = read_upload(multipart).await?;
    let image = form
        .image
        .take()
        .ok_or_else(|| AppError::bad_request("Please provide the image to upload."))?;

    let service = post_service(&state);
    if let Some(problem) = state.images().upload_problem(&image) {
        return Err(AppError::bad_request(problem));
    }

    let caption = form
        .fields
        .remove("caption")
        .map(|caption| caption.trim().to_string())
        .filter(|caption| !caption.is_empty());
    if caption.as_ref().is_some_and(|caption| caption.chars().count() > MAX_MESSAGE_LEN) {
        return Err(AppError::bad_request("Captions may be at most 2200 characters long."));
    }
    let filter = form
        .fields
        .remove("filter")
        .filter(|filter| !filter.is_empty());
    if let Some(filter) = &filter {
        if !is_known_filter(filter) {
            return Err(AppError::bad_request("Unknown filter."));
        }
    }

    let post = service
        .create_post(auth.user_id, image.to_vec(), caption, filter)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    FeedService::new(state.db.clone(), state.cache.clone())
        .invalidate(auth.user_id)
        .await;

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = post_service(&state)
        .delete_post(post_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to delete post");
            AppError::internal("failed to delete post")
        })?;

    if !deleted {
        return Err(AppError::not_found(
            "Could not find a post with that id associated with the user.",
        ));
    }

    FeedService::new(state.db.clone(), state.cache.clone())
        .invalidate(auth.user_id)
        .await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookmarkResponse {
    pub bookmarked: bool,
}

pub async fn bookmark_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<BookmarkResponse>, AppError> {
    let bookmarked = post_service(&state)
        .toggle_bookmark(auth.user_id, post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to bookmark post");
            AppError::internal("failed to bookmark post")
        })?
        .ok_or_else(|| AppError::not_found("Could not find a post with that id."))?;

    Ok(Json(BookmarkResponse { bookmarked }))
}

pub async fn list_filters() -> Json<Vec<PostFilter>> {
    Json(post_filters())
}

pub async fn suggested_posts(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(offset): Path<i64>,
) -> Result<Json<Vec<Post>>, AppError> {
    let offset = check_offset(offset)?;
    let posts = post_service(&state)
        .suggested(auth.user_id, offset)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch suggested posts");
            AppError::internal("failed to fetch suggested posts")
        })?;

    Ok(Json(posts))
}

pub async fn hashtag_posts(
    State(state): State<AppState>,
    Path((hashtag, offset)): Path<(String, i64)>,
) -> Result<Json<Vec<Post>>, AppError> {
    let offset = check_offset(offset)?;
    let hashtag = hashtag.trim_start_matches('#').to_lowercase();
    if hashtag.is_empty() {
        return Err(AppError::bad_request("Please provide a hashtag."));
    }

    let posts = post_service(&state)
        .by_hashtag(&hashtag, offset)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, hashtag = %hashtag, "failed to fetch hashtag posts");
            AppError::internal("failed to fetch hashtag posts")
        })?;

    Ok(Json(posts))
}

// ---- notifications ----

pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = NotificationService::new(state.db.clone(), state.hub.clone())
        .list(auth.user_id, LATEST_NOTIFICATIONS)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list notifications");
            AppError::internal("failed to list notifications")
        })?;

    Ok(Json(notifications))
}

pub async fn read_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    NotificationService::new(state.db.clone(), state.hub.clone())
        .mark_all_read(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to mark notifications read");
            AppError::internal("failed to mark notifications read")
        })?;

    Ok(StatusCode::NO_CONTENT)
}

// ---- users ----

pub async fn get_profile(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(username): Path<String>,
) -> Result<Json<Profile>, AppError> {
    let viewer_id = viewer.map(|viewer| viewer.user_id);
    let profile = user_service(&state)
        .get_profile(&username, viewer_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, username = %username, "failed to fetch profile");
            AppError::internal("failed to fetch profile")
        })?
        .ok_or_else(|| AppError::not_found("Could not find a user with that username."))?;

    Ok(Json(profile))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FollowResponse {
    pub state: FollowState,
}

pub async fn follow_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<FollowResponse>, AppError> {
    if user_id == auth.user_id {
        return Err(AppError::bad_request("You cannot follow yourself."));
    }

    let follow = SocialService::new(state.db.clone(), state.queue.clone())
        .toggle_follow(auth.user_id, user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user_id, "failed to follow user");
            AppError::internal("failed to follow user")
        })?
        .ok_or_else(|| AppError::not_found("Could not find a user with that id."))?;

    FeedService::new(state.db.clone(), state.cache.clone())
        .invalidate(auth.user_id)
        .await;
    Ok(Json(FollowResponse { state: follow }))
}

pub async fn list_following(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, offset)): Path<(Uuid, i64)>,
) -> Result<Json<Vec<FollowEdge>>, AppError> {
    let offset = check_offset(offset)?;
    let edges = SocialService::new(state.db.clone(), state.queue.clone())
        .list_following(user_id, auth.user_id, offset)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user_id, "failed to list following");
            AppError::internal("failed to list following")
        })?;

    Ok(Json(edges))
}

pub async fn list_followers(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, offset)): Path<(Uuid, i64)>,
) -> Result<Json<Vec<FollowEdge>>, AppError> {
    let offset = check_offset(offset)?;
    let edges = SocialService::new(state.db.clone(), state.queue.clone())
        .list_followers(user_id, auth.user_id, offset)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user_id, "failed to list followers");
            AppError::internal("failed to list followers")
        })?;

    Ok(Json(edges))
}

pub async fn search_users(
    State(state): State<AppState>,
    Path((username, offset)): Path<(String, i64)>,
) -> Result<Json<Vec<AuthorSummary>>, AppError> {
    let offset = check_offset(offset)?;
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::bad_request("Please provide a username to search for."));
    }

    let users = user_service(&state)
        .search(username, offset)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to search users");
            AppError::internal("failed to search users")
        })?;

    Ok(Json(users))
}

#[derive(Deserialize)]
pub struct ConfirmRequest {
    pub token: String,
}

pub async fn confirm_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ConfirmRequest>,
) -> Result<StatusCode, AppError> {
    if payload.token.trim().is_empty() {
        return Err(AppError::bad_request("Please provide a confirmation token."));
    }

    let confirmed = user_service(&state)
        .confirm(auth.user_id, payload.token.trim())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to confirm user");
            AppError::internal("failed to confirm user")
        })?;

    if confirmed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Invalid or expired confirmation link."))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvatarResponse {
    pub avatar: String,
}

pub async fn change_avatar(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<Json<AvatarResponse>, AppError> {
    let form = read_upload(multipart).await?;
    let image = form
        .image
        .ok_or_else(|| AppError::bad_request("Please provide the image to upload."))?;
    if let Some(problem) = state.images().upload_problem(&image) {
        return Err(AppError::bad_request(problem));
    }

    let avatar = user_service(&state)
        .change_avatar(auth.user_id, image.to_vec())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to change avatar");
            AppError::internal("failed to change avatar")
        })?;

    Ok(Json(AvatarResponse { avatar }))
}

pub async fn remove_avatar(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    user_service(&state)
        .remove_avatar(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to remove avatar");
            AppError::internal("failed to remove avatar")
        })?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub bio: Option<String>,
    pub private: Option<bool>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    const MAX_BIO_LEN: usize = 130;

    if let Some(full_name) = &payload.full_name {
        if full_name.trim().is_empty() {
            return Err(AppError::bad_request("Please enter your full name."));
        }
    }
    if let Some(username) = &payload.username {
        if let Some(problem) = validate_username(username) {
            return Err(AppError::bad_request(problem));
        }
    }
    if let Some(email) = &payload.email {
        if !is_valid_email(email) {
            return Err(AppError::bad_request("Enter a valid email address."));
        }
    }
    if let Some(bio) = &payload.bio {
        if bio.chars().count() > MAX_BIO_LEN {
            return Err(AppError::bad_request("Your bio may be at most 130 characters long."));
        }
    }

    let update = ProfileUpdate {
        full_name: payload.full_name.map(|value| value.trim().to_string()),
        username: payload.username.map(|value| value.trim().to_lowercase()),
        email: payload.email.map(|value| value.trim().to_lowercase()),
        website: payload.website.map(|value| value.trim().to_string()),
        bio: payload.bio.map(|value| value.trim().to_string()),
        private: payload.private,
    };

    let user = user_service(&state)
        .update_profile(auth.user_id, update)
        .await
        .map_err(|err| {
            if let Some(conflict) = AppError::user_conflict(&err) {
                return conflict;
            }
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to update profile");
            AppError::internal("failed to update profile")
        })?
        .ok_or_else(|| AppError::not_found("Could not find your account."))?;

    Ok(Json(user))
}

pub async fn suggested_users(
    State(state): State<AppState>,
    auth: AuthUser,
    max: Option<Path<i64>>,
) -> Result<Json<Vec<AuthorSummary>>, AppError> {
    let max = max.map(|Path(max)| max);
    let users = user_service(&state)
        .suggested(auth.user_id, max)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch suggested users");
            AppError::internal("failed to fetch suggested users")
        })?;

    Ok(Json(users))
}
