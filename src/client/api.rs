use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use url::Url;
use uuid::Uuid;

use crate::client::error::{ApiError, ApiErrorKind};
use crate::domain::comment::{Comment, CommentPage, CommentReply, VoteState};
use crate::domain::notification::Notification;
use crate::domain::post::{Post, PostDetail, PostFilter};
use crate::domain::social_graph::{FollowEdge, FollowState};
use crate::domain::user::{AuthorSummary, Profile, User};
use crate::http::{AuthResponse, AvatarResponse, BookmarkResponse, FollowResponse, VoteResponse};

/// Fields of [`ApiClient::update_profile`]; unset fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
}

/// One method per REST call. Calls that need a session send the stored
/// token in the `authorization` header.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| ApiError::new(ApiErrorKind::BadRequest, format!("invalid base url: {}", err)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::new(ApiErrorKind::BadRequest, "invalid base url"));
        }
        Ok(Self {
            http,
            base_url,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    // ---- auth ----

    /// Logs in and keeps the returned token for later calls.
    pub async fn login(&mut self, username_or_email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let request = self
            .request(Method::POST, &["auth", "login"])?
            .json(&json!({ "usernameOrEmail": username_or_email, "password": password }));
        let response: AuthResponse = self.send(request).await?;
        self.token = Some(response.token.clone());
        Ok(response)
    }

    /// Resumes a session from the stored token.
    pub async fn login_with_token(&self) -> Result<AuthResponse, ApiError> {
        let request = self.authorized(Method::POST, &["auth", "login"])?;
        self.send(request).await
    }

    pub async fn github_login(&mut self, code: &str, state: Option<&str>) -> Result<AuthResponse, ApiError> {
        let request = self
            .request(Method::POST, &["auth", "login", "github"])?
            .json(&json!({ "code": code, "state": state }));
        let response: AuthResponse = self.send(request).await?;
        self.token = Some(response.token.clone());
        Ok(response)
    }

    pub async fn register(
        &mut self,
        email: &str,
        full_name: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        let request = self.request(Method::POST, &["auth", "register"])?.json(&json!({
            "email": email,
            "fullName": full_name,
            "username": username,
            "password": password,
        }));
        let response: AuthResponse = self.send(request).await?;
        self.token = Some(response.token.clone());
        Ok(response)
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<(), ApiError> {
        let request = self
            .authorized(Method::PUT, &["auth", "password"])?
            .json(&json!({ "oldPassword": old_password, "newPassword": new_password }));
        self.send_empty(request).await
    }

    // ---- comments ----

    pub async fn create_comment(&self, post_id: Uuid, message: &str) -> Result<Comment, ApiError> {
        let request = self
            .authorized(Method::POST, &["comment", &post_id.to_string()])?
            .json(&json!({ "message": message }));
        self.send(request).await
    }

    pub async fn delete_comment(&self, comment_id: Uuid) -> Result<(), ApiError> {
        let request = self.authorized(Method::DELETE, &["comment", &comment_id.to_string()])?;
        self.send_empty(request).await
    }

    pub async fn vote_comment(&self, comment_id: Uuid) -> Result<VoteState, ApiError> {
        let request = self.authorized(Method::POST, &["comment", &comment_id.to_string(), "vote"])?;
        let response: VoteResponse = self.send(request).await?;
        Ok(response.state)
    }

    pub async fn create_comment_reply(&self, parent_comment_id: Uuid, message: &str) -> Result<CommentReply, ApiError> {
        let request = self
            .authorized(Method::POST, &["comment", &parent_comment_id.to_string(), "reply"])?
            .json(&json!({ "message": message }));
        self.send(request).await
    }

    pub async fn delete_comment_reply(&self, reply_id: Uuid) -> Result<(), ApiError> {
        let request = self.authorized(Method::DELETE, &["comment", &reply_id.to_string(), "reply"])?;
        self.send_empty(request).await
    }

    pub async fn vote_comment_reply(&self, reply_id: Uuid) -> Result<VoteState, ApiError> {
        let request = self.authorized(Method::POST, &["comment", &reply_id.to_string(), "replyVote"])?;
        let response: VoteResponse = self.send(request).await?;
        Ok(response.state)
    }

    pub async fn get_comment_replies(&self, parent_comment_id: Uuid, offset: i64) -> Result<Vec<CommentReply>, ApiError> {
        let request = self.request(
            Method::GET,
            &["comment", &parent_comment_id.to_string(), &offset.to_string(), "replies"],
        )?;
        self.send(request).await
    }

    /// `exclude` is the number of newest comments already rendered locally.
    pub async fn get_comments(&self, post_id: Uuid, offset: i64, exclude: i64) -> Result<CommentPage, ApiError> {
        let request = self.request(
            Method::GET,
            &["comment", &post_id.to_string(), &offset.to_string(), &exclude.to_string()],
        )?;
        self.send(request).await
    }

    // ---- posts ----

    pub async fn get_feed(&self, offset: i64) -> Result<Vec<Post>, ApiError> {
        let request = self.authorized(Method::GET, &["post", "feed", &offset.to_string()])?;
        self.send(request).await
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<PostDetail, ApiError> {
        let request = self.request(Method::GET, &["post", &post_id.to_string()])?;
        self.send(request).await
    }

    pub async fn get_user_posts(&self, username: &str, offset: i64) -> Result<Vec<Post>, ApiError> {
        let request = self.request(Method::GET, &["user", username, "posts", &offset.to_string()])?;
        self.send(request).await
    }

    pub async fn vote_post(&self, post_id: Uuid) -> Result<VoteState, ApiError> {
        let request = self.authorized(Method::POST, &["post", &post_id.to_string(), "vote"])?;
        let response: VoteResponse = self.send(request).await?;
        Ok(response.state)
    }

    pub async fn create_post(
        &self,
        image: Vec<u8>,
        file_name: &str,
        caption: Option<&str>,
        filter: Option<&str>,
    ) -> Result<Post, ApiError> {
        let mut form = Form::new().part("image", Part::bytes(image).file_name(file_name.to_string()));
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }
        if let Some(filter) = filter {
            form = form.text("filter", filter.to_string());
        }

        let request = self.authorized(Method::POST, &["post"])?.multipart(form);
        self.send(request).await
    }

    pub async fn delete_post(&self, post_id: Uuid) -> Result<(), ApiError> {
        let request = self.authorized(Method::DELETE, &["post", &post_id.to_string()])?;
        self.send_empty(request).await
    }

    /// Returns whether the post is bookmarked afterwards.
    pub async fn bookmark_post(&self, post_id: Uuid) -> Result<bool, ApiError> {
        let request = self.authorized(Method::POST, &["user", &post_id.to_string(), "bookmark"])?;
        let response: BookmarkResponse = self.send(request).await?;
        Ok(response.bookmarked)
    }

    pub async fn get_post_filters(&self) -> Result<Vec<PostFilter>, ApiError> {
        let request = self.request(Method::GET, &["post", "filters"])?;
        self.send(request).await
    }

    pub async fn get_suggested_posts(&self, offset: i64) -> Result<Vec<Post>, ApiError> {
        let request = self.authorized(Method::GET, &["post", "suggested", &offset.to_string()])?;
        self.send(request).await
    }

    pub async fn get_hashtag_posts(&self, hashtag: &str, offset: i64) -> Result<Vec<Post>, ApiError> {
        let request = self.request(Method::GET, &["post", "hashtag", hashtag, &offset.to_string()])?;
        self.send(request).await
    }

    // ---- notifications ----

    pub async fn get_notifications(&self) -> Result<Vec<Notification>, ApiError> {
        let request = self.authorized(Method::GET, &["notification"])?;
        self.send(request).await
    }

    pub async fn read_notifications(&self) -> Result<(), ApiError> {
        let request = self.authorized(Method::PUT, &["notification"])?;
        self.send_empty(request).await
    }

    // ---- users ----

    pub async fn get_user_profile(&self, username: &str) -> Result<Profile, ApiError> {
        let mut request = self.request(Method::GET, &["user", username])?;
        if let Some(token) = &self.token {
            request = request.header(reqwest::header::AUTHORIZATION, token);
        }
        self.send(request).await
    }

    pub async fn follow_user(&self, user_id: Uuid) -> Result<FollowState, ApiError> {
        let request = self.authorized(Method::POST, &["user", &user_id.to_string(), "follow"])?;
        let response: FollowResponse = self.send(request).await?;
        Ok(response.state)
    }

    pub async fn get_user_following(&self, user_id: Uuid, offset: i64) -> Result<Vec<FollowEdge>, ApiError> {
        let request = self.authorized(
            Method::GET,
            &["user", &user_id.to_string(), &offset.to_string(), "following"],
        )?;
        self.send(request).await
    }

    pub async fn get_user_followers(&self, user_id: Uuid, offset: i64) -> Result<Vec<FollowEdge>, ApiError> {
        let request = self.authorized(
            Method::GET,
            &["user", &user_id.to_string(), &offset.to_string(), "followers"],
        )?;
        self.send(request).await
    }

    pub async fn search_users(&self, username: &str, offset: i64) -> Result<Vec<AuthorSummary>, ApiError> {
        let request = self.request(Method::GET, &["user", username, &offset.to_string(), "search"])?;
        self.send(request).await
    }

    pub async fn confirm_user(&self, confirmation_token: &str) -> Result<(), ApiError> {
        let request = self
            .authorized(Method::PUT, &["user", "confirm"])?
            .json(&json!({ "token": confirmation_token }));
        self.send_empty(request).await
    }

    /// Uploads a new avatar and returns its URL.
    pub async fn change_avatar(&self, image: Vec<u8>, file_name: &str) -> Result<String, ApiError> {
        let form = Form::new().part("image", Part::bytes(image).file_name(file_name.to_string()));
        let request = self.authorized(Method::PUT, &["user", "avatar"])?.multipart(form);
        let response: AvatarResponse = self.send(request).await?;
        Ok(response.avatar)
    }

    pub async fn remove_avatar(&self) -> Result<(), ApiError> {
        let request = self.authorized(Method::DELETE, &["user", "avatar"])?;
        self.send_empty(request).await
    }

    pub async fn update_profile(&self, changes: &ProfileChanges) -> Result<User, ApiError> {
        let request = self.authorized(Method::PUT, &["user"])?.json(changes);
        self.send(request).await
    }

    pub async fn get_suggested_users(&self, max: Option<i64>) -> Result<Vec<AuthorSummary>, ApiError> {
        let request = match max {
            Some(max) => self.authorized(Method::GET, &["user", "suggested", &max.to_string()])?,
            None => self.authorized(Method::GET, &["user", "suggested"])?,
        };
        self.send(request).await
    }

    // ---- plumbing ----

    /// `{base}/api/{segments...}`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::new(ApiErrorKind::BadRequest, "invalid base url"))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        Ok(self.http.request(method, self.endpoint(segments)?))
    }

    fn authorized(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| ApiError::new(ApiErrorKind::Unauthorized, "Not authorized."))?;
        Ok(self
            .request(method, segments)?
            .header(reqwest::header::AUTHORIZATION, token))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status, &body));
        }
        Ok(response.json::<T>().await?)
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status, &body));
        }
        Ok(())
    }
}
