use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use crate::app::email::Mailer;
use crate::app::users::{generate_unique_username, user_from_row, USER_COLUMNS};
use crate::config::GithubConfig;
use crate::domain::user::User;
use crate::infra::db::Db;

const TOKEN_ISSUER: &str = "panorama";
pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MAX_USERNAME_LEN: usize = 30;
/// Path segments under `/api/user` that a username would shadow.
const RESERVED_USERNAMES: &[&str] = &["avatar", "confirm", "suggested"];

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct LoggedIn {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub full_name: String,
    pub username: String,
    pub password: String,
}

impl Registration {
    /// Returns the first problem with the submitted fields, if any.
    pub fn validate(&self) -> Option<&'static str> {
        if !is_valid_email(&self.email) {
            return Some("Enter a valid email address.");
        }
        if self.full_name.trim().is_empty() {
            return Some("Please enter your full name.");
        }
        if let Some(problem) = validate_username(&self.username) {
            return Some(problem);
        }
        validate_password(&self.password)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum PasswordChange {
    Changed,
    WrongPassword,
    /// GitHub-only accounts have no password to change.
    NoPassword,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    access_key: [u8; 32],
    access_ttl_minutes: u64,
}

impl AuthService {
    pub fn new(db: Db, access_key: [u8; 32], access_ttl_minutes: u64) -> Self {
        Self {
            db,
            access_key,
            access_ttl_minutes,
        }
    }

    /// Returns `None` when the credentials do not match an account.
    pub async fn login(&self, username_or_email: &str, password: &str) -> Result<Option<LoggedIn>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS}, password_hash \
             FROM users WHERE email = $1 OR username = $1"
        ))
        .bind(username_or_email)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let password_hash: Option<String> = row.get("password_hash");
        let password_hash = match password_hash {
            Some(hash) if !hash.is_empty() => hash,
            _ => return Ok(None),
        };
        if !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        let user = user_from_row(&row);
        let token = self.issue_access_token(user.id)?;
        Ok(Some(LoggedIn { user, token }))
    }

    /// Re-authenticates with an existing token and hands the same token back.
    pub async fn login_with_token(&self, token: &str) -> Result<Option<LoggedIn>> {
        let session = match self.authenticate_access_token(token).await? {
            Some(session) => session,
            None => return Ok(None),
        };

        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(session.user_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|row| LoggedIn {
            user: user_from_row(&row),
            token: token.to_string(),
        }))
    }

    /// Creates the account and sends the confirmation email.
    /// Uniqueness violations surface as `sqlx::Error` for the caller to map.
    pub async fn register(&self, registration: Registration, mailer: &Mailer) -> Result<LoggedIn> {
        let password_hash = hash_password(&registration.password)?;
        let confirmation_token = generate_confirmation_token();

        let row = sqlx::query(&format!(
            "INSERT INTO users (email, full_name, username, password_hash, confirmation_token) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(registration.email.trim().to_lowercase())
        .bind(registration.full_name.trim())
        .bind(registration.username.trim().to_lowercase())
        .bind(password_hash)
        .bind(&confirmation_token)
        .fetch_one(self.db.pool())
        .await?;

        let user = user_from_row(&row);
        info!(user_id = %user.id, username = %user.username, "registered user");

        mailer
            .send_confirmation_email(&user.username, &user.email, &confirmation_token)
            .await;

        let token = self.issue_access_token(user.id)?;
        Ok(LoggedIn { user, token })
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<PasswordChange> {
        let current: Option<Option<String>> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(self.db.pool())
                .await?;

        let current = match current.flatten() {
            Some(hash) if !hash.is_empty() => hash,
            _ => return Ok(PasswordChange::NoPassword),
        };
        if !verify_password(old_password, &current)? {
            return Ok(PasswordChange::WrongPassword);
        }

        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(hash_password(new_password)?)
            .execute(self.db.pool())
            .await?;

        info!(user_id = %user_id, "password changed");
        Ok(PasswordChange::Changed)
    }

    /// Logs in the account linked to the GitHub identity, creating it on
    /// first sight. A taken GitHub login gets a random numeric suffix.
    pub async fn login_with_github(&self, github: &GithubClient, code: &str) -> Result<Option<LoggedIn>> {
        let access_token = match github.exchange_code(code).await? {
            Some(token) => token,
            None => return Ok(None),
        };
        let profile = github.fetch_user(&access_token).await?;

        let existing = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE github_id = $1"))
            .bind(profile.id)
            .fetch_optional(self.db.pool())
            .await?;
        if let Some(row) = existing {
            let user = user_from_row(&row);
            let token = self.issue_access_token(user.id)?;
            return Ok(Some(LoggedIn { user, token }));
        }

        let base = sanitize_username(&profile.login);
        let username = if RESERVED_USERNAMES.contains(&base.as_str()) || self.username_taken(&base).await? {
            generate_unique_username(&base, |candidate| async move {
                self.username_taken(&candidate).await
            })
            .await?
        } else {
            base
        };

        let email = profile
            .email
            .clone()
            .unwrap_or_else(|| format!("{}+{}@users.noreply.github.com", profile.id, profile.login));

        let row = sqlx::query(&format!(
            "INSERT INTO users (email, full_name, username, avatar, bio, github_id, confirmed) \
             VALUES ($1, $2, $3, $4, $5, $6, true) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email.to_lowercase())
        .bind(profile.name.clone().unwrap_or_else(|| profile.login.clone()))
        .bind(&username)
        .bind(profile.avatar_url.clone())
        .bind(profile.bio.clone())
        .bind(profile.id)
        .fetch_one(self.db.pool())
        .await?;

        let user = user_from_row(&row);
        info!(user_id = %user.id, github_id = profile.id, "created account from github");
        let token = self.issue_access_token(user.id)?;
        Ok(Some(LoggedIn { user, token }))
    }

    pub async fn authenticate_access_token(&self, token: &str) -> Result<Option<AuthSession>> {
        let claims = match self.decrypt_claims(token)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        if !has_token_type(&claims, "access") {
            return Ok(None);
        }
        let user_id = claim_uuid(&claims, "sub")?;
        Ok(Some(AuthSession { user_id }))
    }

    pub fn issue_access_token(&self, user_id: Uuid) -> Result<String> {
        let duration = std::time::Duration::from_secs(self.access_ttl_minutes * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&user_id.to_string())?;
        claims.add_additional("typ", "access")?;

        let key = SymmetricKey::<V4>::from(&self.access_key)?;
        Ok(local::encrypt(&key, &claims, None, None)?)
    }

    async fn username_taken(&self, username: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(username)
            .fetch_one(self.db.pool())
            .await?;
        Ok(exists)
    }

    fn decrypt_claims(&self, token: &str) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&self.access_key)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_ISSUER);

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubUser {
    pub id: i64,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

#[derive(Deserialize)]
struct GithubTokenResponse {
    access_token: Option<String>,
}

/// Minimal GitHub OAuth client: code exchange plus the `/user` lookup.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    config: GithubConfig,
    oauth_base: String,
    api_base: String,
}

impl GithubClient {
    pub fn new(http: reqwest::Client, config: GithubConfig) -> Self {
        Self::with_base_urls(http, config, "https://github.com", "https://api.github.com")
    }

    pub fn with_base_urls(
        http: reqwest::Client,
        config: GithubConfig,
        oauth_base: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            config,
            oauth_base: oauth_base.into(),
            api_base: api_base.into(),
        }
    }

    /// Returns `None` when GitHub rejects the code.
    pub async fn exchange_code(&self, code: &str) -> Result<Option<String>> {
        let response = self
            .http
            .post(format!("{}/login/oauth/access_token", self.oauth_base))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: GithubTokenResponse = response.json().await?;
        Ok(body.access_token.filter(|token| !token.is_empty()))
    }

    pub async fn fetch_user(&self, access_token: &str) -> Result<GithubUser> {
        let user = self
            .http
            .get(format!("{}/user", self.api_base))
            .header(reqwest::header::AUTHORIZATION, format!("token {}", access_token))
            .header(reqwest::header::USER_AGENT, "panorama")
            .send()
            .await?
            .error_for_status()?
            .json::<GithubUser>()
            .await?;
        Ok(user)
    }
}

pub fn validate_username(username: &str) -> Option<&'static str> {
    let username = username.trim();
    if username.is_empty() {
        return Some("Please enter a username.");
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Some("Please choose a username under 30 characters.");
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Some("Usernames may only contain letters, numbers, periods and underscores.");
    }
    if RESERVED_USERNAMES.contains(&username.to_lowercase().as_str()) {
        return Some("This username is not available.");
    }
    None
}

pub fn validate_password(password: &str) -> Option<&'static str> {
    if password.trim().len() < MIN_PASSWORD_LEN {
        return Some("Password must be at least 6 characters long.");
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Some("Password must be at most 128 characters long.");
    }
    None
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Lowercases and drops characters usernames cannot carry.
fn sanitize_username(login: &str) -> String {
    let cleaned: String = login
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .take(MAX_USERNAME_LEN - 4)
        .collect();
    if cleaned.is_empty() {
        "user".to_string()
    } else {
        cleaned
    }
}

fn generate_confirmation_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn claim_uuid(claims: &Claims, name: &str) -> Result<Uuid> {
    let value = claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(Uuid::parse_str(value)?)
}

fn has_token_type(claims: &Claims, expected: &str) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .map(|value| value == expected)
        .unwrap_or(false)
}
