use reqwest::StatusCode;
use serde::Deserialize;

/// What went wrong with an API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    /// Any other non-success status.
    Server,
    /// The request never produced a response.
    Transport,
    /// The response body did not have the expected shape.
    Decode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind_for_status(status: StatusCode) -> ApiErrorKind {
        match status {
            StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNPROCESSABLE_ENTITY => {
                ApiErrorKind::BadRequest
            }
            StatusCode::UNAUTHORIZED => ApiErrorKind::Unauthorized,
            StatusCode::FORBIDDEN => ApiErrorKind::Forbidden,
            StatusCode::NOT_FOUND => ApiErrorKind::NotFound,
            StatusCode::CONFLICT => ApiErrorKind::Conflict,
            _ => ApiErrorKind::Server,
        }
    }

    /// Builds the error for a failed response. The message is the body's
    /// `error` field when present, else the raw body, else the status reason.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => parsed.error,
            Err(_) if !body.trim().is_empty() => body.trim().to_string(),
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };
        Self::new(Self::kind_for_status(status), message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::new(ApiErrorKind::Decode, err.to_string());
        }
        match err.status() {
            Some(status) => Self::new(Self::kind_for_status(status), err.to_string()),
            None => Self::new(ApiErrorKind::Transport, err.to_string()),
        }
    }
}
