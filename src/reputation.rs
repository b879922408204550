//! Reputation ledger
//!
//! Integer point counter per user, mutated only through named point
//! transactions (or raw deltas) and reset-to-zero. Deltas are pushed down to
//! the storage layer as relative updates, never read-modify-write.

use std::sync::Arc;

use crate::config::{ReputationAction, ReputationConfig};
use crate::error::{ForumError, ForumResult};
use crate::storage::ForumStorage;

/// A point amount: either a named community action resolved through the
/// configuration table, or a raw magnitude.
#[derive(Debug, Clone, Copy)]
pub enum Points {
    Named(ReputationAction),
    Raw(i64),
}

#[derive(Clone)]
pub struct ReputationLedger {
    storage: Arc<ForumStorage>,
    points: ReputationConfig,
}

impl ReputationLedger {
    pub fn new(storage: Arc<ForumStorage>, points: ReputationConfig) -> Self {
        Self { storage, points }
    }

    pub fn config(&self) -> ReputationConfig {
        self.points
    }

    fn magnitude(&self, points: Points) -> i64 {
        match points {
            Points::Named(action) => self.points.points(action),
            Points::Raw(value) => value,
        }
    }

    pub fn gain(&self, user_id: i64, points: Points) -> ForumResult<()> {
        let delta = self.magnitude(points);
        if !self.storage.adjust_reputation(user_id, delta)? {
            return Err(ForumError::NotFound("user"));
        }
        Ok(())
    }

    pub fn lose(&self, user_id: i64, points: Points) -> ForumResult<()> {
        let delta = self.magnitude(points);
        if !self.storage.adjust_reputation(user_id, -delta)? {
            return Err(ForumError::NotFound("user"));
        }
        Ok(())
    }

    pub fn reset(&self, user_id: i64) -> ForumResult<()> {
        if !self.storage.reset_reputation(user_id)? {
            return Err(ForumError::NotFound("user"));
        }
        Ok(())
    }

    pub fn balance(&self, user_id: i64) -> ForumResult<i64> {
        self.storage
            .get_reputation(user_id)?
            .ok_or(ForumError::NotFound("user"))
    }
}
