use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};

use crate::app::auth::AuthService;
use crate::http::AppError;
use crate::AppState;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
    /// Raw token as presented, without any `Bearer ` prefix.
    pub token: String,
}

/// Like [`AuthUser`] but lets anonymous requests through.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

/// The `authorization` header carries the bare token; a `Bearer ` prefix is
/// accepted too.
pub(crate) fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?
        .trim();
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

async fn authenticate(token: &str, state: &AppState) -> Result<AuthUser, AppError> {
    let service = AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.access_ttl_minutes,
    );
    let session = service
        .authenticate_access_token(token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to authenticate");
            AppError::internal("failed to authenticate")
        })?;

    let session = session.ok_or_else(|| AppError::unauthorized("Not authorized."))?;
    Ok(AuthUser {
        user_id: session.user_id,
        token: token.to_string(),
    })
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .ok_or_else(|| AppError::unauthorized("Not authorized."))?;
        authenticate(token, state).await
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match token_from_headers(&parts.headers) {
            Some(token) => Ok(MaybeAuthUser(Some(authenticate(token, state).await?))),
            None => Ok(MaybeAuthUser(None)),
        }
    }
}
