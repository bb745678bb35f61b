//! HTTP handlers.

pub mod proposals;
pub mod setlist;
pub mod stream;
pub mod system;
pub mod users;

pub use proposals::*;
pub use setlist::*;
pub use stream::*;
pub use system::*;
pub use users::*;

use serde::Serialize;

use crate::api::error::{ApiError, ApiResult};
use crate::error::SetlistResult;

/// Run a synchronous storage call on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> SetlistResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => Ok(result?),
        Err(e) => Err(ApiError::Internal(format!("blocking task failed: {e}"))),
    }
}

/// `{"id": ...}` body for create endpoints.
#[derive(Debug, Serialize)]
pub struct Created {
    pub id: i32,
}
