//! User accounts and profiles

use std::sync::Arc;

use crate::activity::ActivityRecorder;
use crate::error::{ForumError, ForumResult};
use crate::models::{ActivityType, Subject, User};
use crate::storage::ForumStorage;

#[derive(Clone)]
pub struct UserService {
    storage: Arc<ForumStorage>,
    recorder: ActivityRecorder,
}

impl UserService {
    pub fn new(storage: Arc<ForumStorage>, recorder: ActivityRecorder) -> Self {
        Self { storage, recorder }
    }

    pub fn create(&self, username: &str, moderator: bool) -> ForumResult<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ForumError::Validation(vec!["username"]));
        }
        if self.storage.get_user_by_username(username)?.is_some() {
            return Err(ForumError::Conflict("username already taken"));
        }

        let user = self.storage.create_user(username, moderator)?;
        self.recorder
            .record(ActivityType::CreatedUser, user.id, Subject::user(user.id))?;

        Ok(user)
    }

    pub fn get(&self, id: i64) -> ForumResult<User> {
        self.storage.get_user(id)?.ok_or(ForumError::NotFound("user"))
    }

    /// Only the profile owner or a moderator may edit a profile.
    pub fn update_profile(&self, caller: &User, user_id: i64, bio: &str) -> ForumResult<User> {
        if caller.id != user_id && !caller.moderator {
            return Err(ForumError::Forbidden("cannot edit another user's profile"));
        }

        if !self.storage.update_bio(user_id, bio)? {
            return Err(ForumError::NotFound("user"));
        }
        self.recorder
            .record(ActivityType::UpdatedProfile, caller.id, Subject::user(user_id))?;

        self.get(user_id)
    }
}
