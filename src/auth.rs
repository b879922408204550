//! Caller identity and authorization
//!
//! The session layer lives outside this core. Callers identify themselves
//! with the `X-User-Id` header, resolved against the users table; permission
//! checks are plain predicates over the resolved user.

use axum::http::HeaderMap;

use crate::error::{ForumError, ForumResult};
use crate::models::{Thread, User};
use crate::storage::ForumStorage;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Resolve the calling user or fail with `Unauthorized`.
pub fn require_caller(storage: &ForumStorage, headers: &HeaderMap) -> ForumResult<User> {
    let id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or(ForumError::Unauthorized)?;

    storage.get_user(id)?.ok_or(ForumError::Unauthorized)
}

/// Resolve the calling user when the header is present and valid.
pub fn optional_caller(storage: &ForumStorage, headers: &HeaderMap) -> ForumResult<Option<User>> {
    match require_caller(storage, headers) {
        Ok(user) => Ok(Some(user)),
        Err(ForumError::Unauthorized) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Thread creators and moderators may manage a thread: lock it, delete it,
/// attach or edit its poll, and pick the best answer.
pub fn can_update_thread(user: &User, thread: &Thread) -> bool {
    user.moderator || user.id == thread.user_id
}

/// The elevated "manage threads" permission.
pub fn can_manage_threads(user: &User) -> bool {
    user.moderator
}
