//! Activity recording and per-user feeds
//!
//! Append-only log of tracked domain events, written synchronously from the
//! lifecycle hook that triggered them. Feeds group records by UTC calendar
//! day, newest day first.

use std::sync::Arc;

use crate::error::ForumResult;
use crate::models::{Activity, ActivityType, FeedDay, Subject};
use crate::storage::ForumStorage;

pub const DEFAULT_FEED_LIMIT: u32 = 50;

#[derive(Clone)]
pub struct ActivityRecorder {
    storage: Arc<ForumStorage>,
}

impl ActivityRecorder {
    pub fn new(storage: Arc<ForumStorage>) -> Self {
        Self { storage }
    }

    /// At-most-once by construction: each tracked event calls this exactly
    /// once from its lifecycle hook. No retries, no dedup.
    pub fn record(
        &self,
        kind: ActivityType,
        actor_id: i64,
        subject: Subject,
    ) -> ForumResult<Activity> {
        Ok(self.storage.record_activity(kind, actor_id, subject)?)
    }

    /// The user's activity grouped by calendar day, days descending and
    /// records within a day descending.
    pub fn feed(&self, user_id: i64, limit: u32) -> ForumResult<Vec<FeedDay>> {
        let activities = self.storage.activities_for_user(user_id, limit)?;

        let mut days: Vec<FeedDay> = Vec::new();
        for activity in activities {
            let date = activity.created_at.date_naive();
            match days.last_mut() {
                Some(day) if day.date == date => day.activities.push(activity),
                _ => days.push(FeedDay {
                    date,
                    activities: vec![activity],
                }),
            }
        }

        Ok(days)
    }

    pub fn for_subject(&self, subject: Subject) -> ForumResult<Vec<Activity>> {
        Ok(self.storage.activities_for_subject(subject)?)
    }
}
