//! Threads, posts and best-answer marking
//!
//! Every side effect the models used to trigger implicitly (reputation
//! grants, activity records, cascading deletes) is an explicit step in the
//! operation's body here.

use std::sync::Arc;

use tracing::info;

use crate::activity::ActivityRecorder;
use crate::auth;
use crate::config::ReputationAction;
use crate::error::{ForumError, ForumResult};
use crate::models::{ActivityType, Post, Subject, Thread, User};
use crate::reputation::{Points, ReputationLedger};
use crate::storage::ForumStorage;

#[derive(Clone)]
pub struct ThreadService {
    storage: Arc<ForumStorage>,
    ledger: ReputationLedger,
    recorder: ActivityRecorder,
}

impl ThreadService {
    pub fn new(
        storage: Arc<ForumStorage>,
        ledger: ReputationLedger,
        recorder: ActivityRecorder,
    ) -> Self {
        Self {
            storage,
            ledger,
            recorder,
        }
    }

    pub fn get(&self, id: i64) -> ForumResult<Thread> {
        self.storage
            .get_thread(id)?
            .ok_or(ForumError::NotFound("thread"))
    }

    pub fn posts(&self, thread_id: i64) -> ForumResult<Vec<Post>> {
        self.get(thread_id)?;
        Ok(self.storage.get_thread_posts(thread_id)?)
    }

    /// Publishing a thread grants `thread_published` to its creator and
    /// records a `created_thread` activity. The initiator post earns no
    /// reply reputation and no separate activity record.
    pub fn create_thread(&self, author: &User, title: &str, body: &str) -> ForumResult<Thread> {
        let mut invalid = Vec::new();
        if title.trim().is_empty() {
            invalid.push("title");
        }
        if body.trim().is_empty() {
            invalid.push("body");
        }
        if !invalid.is_empty() {
            return Err(ForumError::Validation(invalid));
        }

        let (thread, _initiator) = self.storage.create_thread(author.id, title, body)?;
        self.ledger
            .gain(author.id, Points::Named(ReputationAction::ThreadPublished))?;
        self.recorder.record(
            ActivityType::CreatedThread,
            author.id,
            Subject::thread(thread.id),
        )?;

        info!("Thread {} published by user {}", thread.id, author.id);
        Ok(thread)
    }

    pub fn set_locked(&self, caller: &User, thread_id: i64, locked: bool) -> ForumResult<Thread> {
        let thread = self.get(thread_id)?;
        if !auth::can_update_thread(caller, &thread) {
            return Err(ForumError::Forbidden("cannot lock this thread"));
        }

        self.storage.set_thread_locked(thread_id, locked)?;
        self.get(thread_id)
    }

    /// Replying grants `reply_posted` to the author and records a
    /// `created_post` activity.
    pub fn add_post(&self, author: &User, thread_id: i64, body: &str) -> ForumResult<Post> {
        let thread = self.get(thread_id)?;
        if thread.locked {
            return Err(ForumError::Validation(vec!["locked"]));
        }
        if body.trim().is_empty() {
            return Err(ForumError::Validation(vec!["body"]));
        }

        let post = self.storage.create_post(thread_id, author.id, body)?;
        self.ledger
            .gain(author.id, Points::Named(ReputationAction::ReplyPosted))?;
        self.recorder
            .record(ActivityType::CreatedPost, author.id, Subject::post(post.id))?;

        Ok(post)
    }

    /// Deleting a post that holds best-answer status unmarks it first so the
    /// reputation revocation fires; the whole cascade runs in one
    /// transaction in storage.
    pub fn delete_post(&self, caller: &User, post_id: i64) -> ForumResult<()> {
        let post = self
            .storage
            .get_post(post_id)?
            .ok_or(ForumError::NotFound("post"))?;

        if caller.id != post.user_id && !caller.moderator {
            return Err(ForumError::Forbidden("cannot delete this post"));
        }
        if post.is_thread_initiator {
            return Err(ForumError::Conflict(
                "initiator post can only be removed with its thread",
            ));
        }

        let points = self.ledger.config();
        self.storage
            .delete_post(post_id, points.reply_posted, points.best_answer_awarded)?;
        Ok(())
    }

    /// Cascades to posts, the poll with its options and votes, and the
    /// activity records of every deleted subject; reverses the creator's
    /// `thread_published` grant and each reply's `reply_posted` grant.
    pub fn delete_thread(&self, caller: &User, thread_id: i64) -> ForumResult<()> {
        let thread = self.get(thread_id)?;
        if !auth::can_update_thread(caller, &thread) {
            return Err(ForumError::Forbidden("cannot delete this thread"));
        }

        let points = self.ledger.config();
        self.storage.delete_thread(
            thread_id,
            points.thread_published,
            points.reply_posted,
            points.best_answer_awarded,
        )?;

        info!("Thread {} deleted by user {}", thread_id, caller.id);
        Ok(())
    }

    // ========================================================================
    // BEST ANSWER
    // ========================================================================

    /// Marks `post_id` as the thread's accepted answer. Transfers the
    /// `best_answer_awarded` points from the previous holder's author (if
    /// any) to the new one; re-marking the same post is a no-op.
    pub fn mark_best_post(&self, caller: &User, thread_id: i64, post_id: i64) -> ForumResult<()> {
        let thread = self.get(thread_id)?;
        let post = self
            .storage
            .get_post(post_id)?
            .ok_or(ForumError::NotFound("post"))?;

        if !auth::can_update_thread(caller, &thread) {
            return Err(ForumError::Forbidden("cannot pick the best answer"));
        }
        if post.thread_id != thread.id {
            return Err(ForumError::Invariant("post does not belong to thread"));
        }
        if thread.best_post_id == Some(post.id) {
            return Ok(());
        }

        let points = self.ledger.config().best_answer_awarded;
        self.storage.set_best_post(thread_id, post_id, points)?;
        Ok(())
    }

    /// Clears the accepted answer, revoking its author's award. No-op when
    /// the thread has none.
    pub fn unmark_best_post(&self, caller: &User, thread_id: i64) -> ForumResult<()> {
        let thread = self.get(thread_id)?;
        if !auth::can_update_thread(caller, &thread) {
            return Err(ForumError::Forbidden("cannot pick the best answer"));
        }

        let points = self.ledger.config().best_answer_awarded;
        self.storage.unset_best_post(thread_id, points)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReputationConfig;

    const POINTS: ReputationConfig = ReputationConfig {
        thread_published: 10,
        reply_posted: 2,
        best_answer_awarded: 50,
    };

    fn test_service() -> (Arc<ForumStorage>, ThreadService) {
        let storage = Arc::new(ForumStorage::in_memory().unwrap());
        let ledger = ReputationLedger::new(storage.clone(), POINTS);
        let recorder = ActivityRecorder::new(storage.clone());
        let service = ThreadService::new(storage.clone(), ledger, recorder);
        (storage, service)
    }

    #[test]
    fn test_thread_publication_grants_reputation() {
        let (storage, service) = test_service();
        let author = storage.create_user("author", false).unwrap();

        let thread = service.create_thread(&author, "Topic", "First!").unwrap();
        assert_eq!(storage.get_reputation(author.id).unwrap(), Some(10));

        let posts = service.posts(thread.id).unwrap();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].is_thread_initiator);

        // Deleting reverses the grant.
        service.delete_thread(&author, thread.id).unwrap();
        assert_eq!(storage.get_reputation(author.id).unwrap(), Some(0));
    }

    #[test]
    fn test_empty_title_is_rejected() {
        let (storage, service) = test_service();
        let author = storage.create_user("author", false).unwrap();

        match service.create_thread(&author, " ", "body") {
            Err(ForumError::Validation(fields)) => assert_eq!(fields, vec!["title"]),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_replies_grant_and_revoke_reputation() {
        let (storage, service) = test_service();
        let author = storage.create_user("author", false).unwrap();
        let replier = storage.create_user("replier", false).unwrap();

        let thread = service.create_thread(&author, "Topic", "body").unwrap();
        let post = service.add_post(&replier, thread.id, "A reply").unwrap();
        assert_eq!(storage.get_reputation(replier.id).unwrap(), Some(2));

        service.delete_post(&replier, post.id).unwrap();
        assert_eq!(storage.get_reputation(replier.id).unwrap(), Some(0));
    }

    #[test]
    fn test_locked_thread_rejects_posts() {
        let (storage, service) = test_service();
        let author = storage.create_user("author", false).unwrap();
        let replier = storage.create_user("replier", false).unwrap();

        let thread = service.create_thread(&author, "Topic", "body").unwrap();
        service.set_locked(&author, thread.id, true).unwrap();

        assert!(matches!(
            service.add_post(&replier, thread.id, "too late"),
            Err(ForumError::Validation(_))
        ));

        assert!(matches!(
            service.set_locked(&replier, thread.id, false),
            Err(ForumError::Forbidden(_))
        ));
    }

    #[test]
    fn test_initiator_post_cannot_be_deleted_alone() {
        let (storage, service) = test_service();
        let author = storage.create_user("author", false).unwrap();

        let thread = service.create_thread(&author, "Topic", "body").unwrap();
        let posts = service.posts(thread.id).unwrap();

        assert!(matches!(
            service.delete_post(&author, posts[0].id),
            Err(ForumError::Conflict(_))
        ));
    }

    #[test]
    fn test_best_post_marking_is_idempotent() {
        let (storage, service) = test_service();
        let author = storage.create_user("author", false).unwrap();
        let replier = storage.create_user("replier", false).unwrap();

        let thread = service.create_thread(&author, "Question", "body").unwrap();
        let post = service.add_post(&replier, thread.id, "Answer").unwrap();

        service.mark_best_post(&author, thread.id, post.id).unwrap();
        service.mark_best_post(&author, thread.id, post.id).unwrap();

        // reply_posted (2) + exactly one best_answer_awarded (50)
        assert_eq!(storage.get_reputation(replier.id).unwrap(), Some(52));
    }

    #[test]
    fn test_remarking_transfers_the_award() {
        let (storage, service) = test_service();
        let author = storage.create_user("author", false).unwrap();
        let alice = storage.create_user("alice", false).unwrap();
        let bob = storage.create_user("bob", false).unwrap();

        let thread = service.create_thread(&author, "Question", "body").unwrap();
        let first = service.add_post(&alice, thread.id, "Answer A").unwrap();
        let second = service.add_post(&bob, thread.id, "Answer B").unwrap();

        service.mark_best_post(&author, thread.id, first.id).unwrap();
        service.unmark_best_post(&author, thread.id).unwrap();
        service.mark_best_post(&author, thread.id, second.id).unwrap();

        // Net: zero change for the original holder, one award for the new.
        assert_eq!(storage.get_reputation(alice.id).unwrap(), Some(2));
        assert_eq!(storage.get_reputation(bob.id).unwrap(), Some(52));
    }

    #[test]
    fn test_foreign_post_cannot_be_best_answer() {
        let (storage, service) = test_service();
        let author = storage.create_user("author", false).unwrap();
        let replier = storage.create_user("replier", false).unwrap();

        let thread = service.create_thread(&author, "Question", "body").unwrap();
        let other = service.create_thread(&author, "Other", "body").unwrap();
        let post = service.add_post(&replier, other.id, "elsewhere").unwrap();

        assert!(matches!(
            service.mark_best_post(&author, thread.id, post.id),
            Err(ForumError::Invariant(_))
        ));
    }

    #[test]
    fn test_only_thread_managers_pick_best_answers() {
        let (storage, service) = test_service();
        let author = storage.create_user("author", false).unwrap();
        let replier = storage.create_user("replier", false).unwrap();
        let moderator = storage.create_user("moderator", true).unwrap();

        let thread = service.create_thread(&author, "Question", "body").unwrap();
        let post = service.add_post(&replier, thread.id, "Answer").unwrap();

        assert!(matches!(
            service.mark_best_post(&replier, thread.id, post.id),
            Err(ForumError::Forbidden(_))
        ));
        service.mark_best_post(&moderator, thread.id, post.id).unwrap();
    }

    #[test]
    fn test_thread_delete_reverses_everything() {
        let (storage, service) = test_service();
        let author = storage.create_user("author", false).unwrap();
        let replier = storage.create_user("replier", false).unwrap();

        let thread = service.create_thread(&author, "Question", "body").unwrap();
        let post = service.add_post(&replier, thread.id, "Answer").unwrap();
        service.mark_best_post(&author, thread.id, post.id).unwrap();

        service.delete_thread(&author, thread.id).unwrap();

        assert_eq!(storage.get_reputation(author.id).unwrap(), Some(0));
        assert_eq!(storage.get_reputation(replier.id).unwrap(), Some(0));
        assert!(storage.get_post(post.id).unwrap().is_none());
    }
}
