//! HTTP API module.

pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod router;
pub mod state;

pub use auth::{AuthUser, MaybeUser, RequireAdmin};
pub use error::{ApiError, ApiResult};
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use router::create_router;
pub use state::AppState;
