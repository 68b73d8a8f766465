//! Typed client for the `/api` surface, plus the small view helpers the web
//! client builds on.

pub mod api;
pub mod error;
pub mod modal;
pub mod scroll;

pub use api::{ApiClient, ProfileChanges};
pub use error::{ApiError, ApiErrorKind};
pub use modal::{hide_modal, show_modal, ModalAction};
pub use scroll::{ScrollMetrics, ScrollPosition, ScrollThrottle};
