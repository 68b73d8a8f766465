use axum::extract::DefaultBodyLimit;
use axum::http::HeaderName;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::propagate_header::PropagateHeaderLayer;
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::{AuthUser, MaybeAuthUser};
pub use error::AppError;
pub use handlers::{AuthResponse, AvatarResponse, BookmarkResponse, FollowResponse, VoteResponse};

/// Room for multipart framing and text fields around the image itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let body_limit = state.upload_max_bytes + MULTIPART_OVERHEAD_BYTES;
    let api = Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::comments())
        .merge(routes::posts())
        .merge(routes::notifications())
        .merge(routes::users());

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(PropagateHeaderLayer::new(HeaderName::from_static("x-request-id")))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
