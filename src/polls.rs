//! Polls, vote casting and result aggregation
//!
//! A poll belongs to exactly one thread. Votes are replaced wholesale per
//! (poll, user); results apply the configured visibility policy before
//! exposing counts or voter identities.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::auth;
use crate::error::{ForumError, ForumResult};
use crate::models::{
    NewPollOption, OptionResult, Poll, PollOption, PollSettings, PollWithOptions, Thread, User,
    VotesPrivacy,
};
use crate::storage::ForumStorage;

pub const MAX_VOTES_LIMIT: u32 = 1_000_000;

#[derive(Clone)]
pub struct PollService {
    storage: Arc<ForumStorage>,
}

impl PollService {
    pub fn new(storage: Arc<ForumStorage>) -> Self {
        Self { storage }
    }

    fn thread(&self, thread_id: i64) -> ForumResult<Thread> {
        self.storage
            .get_thread(thread_id)?
            .ok_or(ForumError::NotFound("thread"))
    }

    fn poll(&self, poll_id: i64) -> ForumResult<Poll> {
        self.storage
            .get_poll(poll_id)?
            .ok_or(ForumError::NotFound("poll"))
    }

    fn validate_settings(settings: &PollSettings) -> ForumResult<()> {
        let mut invalid = Vec::new();
        if settings.title.trim().is_empty() {
            invalid.push("title");
        }
        if let Some(max) = settings.max_votes {
            if !(1..=MAX_VOTES_LIMIT).contains(&max) {
                invalid.push("max_votes");
            }
        }
        if VotesPrivacy::from_code(settings.votes_privacy).is_none() {
            invalid.push("votes_privacy");
        }

        if invalid.is_empty() {
            Ok(())
        } else {
            Err(ForumError::Validation(invalid))
        }
    }

    /// Attaches a poll to a thread. A thread has at most one poll; options
    /// are appended in submission order.
    pub fn create_poll(
        &self,
        caller: &User,
        thread_id: i64,
        settings: &PollSettings,
        options: &[NewPollOption],
    ) -> ForumResult<PollWithOptions> {
        let thread = self.thread(thread_id)?;
        if !auth::can_update_thread(caller, &thread) {
            return Err(ForumError::Forbidden("cannot attach a poll to this thread"));
        }
        if thread.locked {
            return Err(ForumError::Validation(vec!["locked"]));
        }
        if self.storage.get_poll_by_thread(thread_id)?.is_some() {
            return Err(ForumError::Conflict(
                "a poll is already attached to this thread",
            ));
        }
        Self::validate_settings(settings)?;

        let poll = self.storage.create_poll(thread_id, settings)?;
        let mut created = Vec::with_capacity(options.len());
        for option in options {
            created.push(self.storage.add_option(poll.id, &option.label, &option.color)?);
        }

        info!("Poll {} attached to thread {}", poll.id, thread_id);
        Ok(PollWithOptions {
            poll,
            options: created,
        })
    }

    /// Appends an option with the next ordinal; labels need not be unique.
    pub fn add_option(
        &self,
        caller: &User,
        poll_id: i64,
        label: &str,
        color: &str,
    ) -> ForumResult<PollOption> {
        let poll = self.poll(poll_id)?;
        let thread = self.thread(poll.thread_id)?;
        if !auth::can_update_thread(caller, &thread) {
            return Err(ForumError::Forbidden("cannot edit this poll"));
        }

        let mut invalid = Vec::new();
        if label.trim().is_empty() {
            invalid.push("label");
        }
        if color.trim().is_empty() {
            invalid.push("color");
        }
        if !invalid.is_empty() {
            return Err(ForumError::Validation(invalid));
        }

        Ok(self.storage.add_option(poll_id, label, color)?)
    }

    pub fn poll_for_thread(&self, thread_id: i64) -> ForumResult<PollWithOptions> {
        self.thread(thread_id)?;
        let poll = self
            .storage
            .get_poll_by_thread(thread_id)?
            .ok_or(ForumError::NotFound("poll"))?;
        let options = self.storage.get_options(poll.id)?;
        Ok(PollWithOptions { poll, options })
    }

    pub fn update_poll(
        &self,
        caller: &User,
        poll_id: i64,
        settings: &PollSettings,
    ) -> ForumResult<PollWithOptions> {
        let poll = self.poll(poll_id)?;
        let thread = self.thread(poll.thread_id)?;
        if !auth::can_update_thread(caller, &thread) {
            return Err(ForumError::Forbidden("cannot edit this poll"));
        }
        Self::validate_settings(settings)?;

        self.storage.update_poll(poll_id, settings)?;
        let poll = self.poll(poll_id)?;
        let options = self.storage.get_options(poll_id)?;
        Ok(PollWithOptions { poll, options })
    }

    /// Removes the poll with its options and votes.
    pub fn delete_poll(&self, caller: &User, poll_id: i64) -> ForumResult<()> {
        let poll = self.poll(poll_id)?;
        let thread = self.thread(poll.thread_id)?;
        if !auth::can_update_thread(caller, &thread) {
            return Err(ForumError::Forbidden("cannot delete this poll"));
        }

        self.storage.delete_poll(poll_id)?;
        info!("Poll {} deleted by user {}", poll_id, caller.id);
        Ok(())
    }

    /// Casts the caller's full selection, replacing any previous votes.
    /// Partial edits are not supported: the prior vote set is dropped and the
    /// submitted one inserted, atomically.
    pub fn cast_vote(&self, caller: &User, poll_id: i64, option_ids: &[i64]) -> ForumResult<()> {
        let poll = self.poll(poll_id)?;
        let thread = self.thread(poll.thread_id)?;

        if option_ids.is_empty() {
            return Err(ForumError::Validation(vec!["option_ids"]));
        }
        if let Some(max) = poll.max_votes {
            if option_ids.len() > max as usize {
                return Err(ForumError::Validation(vec!["option_ids"]));
            }
        }
        if poll.is_locked(Utc::now()) {
            return Err(ForumError::Validation(vec!["locked_at"]));
        }
        if thread.locked {
            return Err(ForumError::Validation(vec!["locked"]));
        }

        let known: HashSet<i64> = self
            .storage
            .get_options(poll_id)?
            .into_iter()
            .map(|o| o.id)
            .collect();
        let mut seen = HashSet::new();
        for id in option_ids {
            if !known.contains(id) {
                return Err(ForumError::NotFound("poll option"));
            }
            if !seen.insert(*id) {
                return Err(ForumError::Validation(vec!["option_ids"]));
            }
        }

        if !poll.votes_editable && self.storage.user_vote_count(poll_id, caller.id)? > 0 {
            return Err(ForumError::Forbidden("votes on this poll cannot be changed"));
        }

        self.storage.replace_votes(poll_id, caller.id, option_ids)?;
        Ok(())
    }

    /// Aggregated results under the visibility policy:
    /// - guests are rejected;
    /// - with `results_before_voting` off, the viewer must have voted, be
    ///   the thread creator or hold the manage-threads permission;
    /// - voter identities appear only for public polls, or private polls
    ///   viewed by the creator/permission holder; never for anonymous polls.
    ///
    /// Percentages divide by total vote events, not distinct voters, so they
    /// need not sum to 100 when `max_votes > 1`.
    pub fn results(&self, viewer: Option<&User>, poll_id: i64) -> ForumResult<Vec<OptionResult>> {
        let viewer = viewer.ok_or(ForumError::Unauthorized)?;
        let poll = self.poll(poll_id)?;
        let thread = self.thread(poll.thread_id)?;

        let privileged =
            viewer.id == thread.user_id || auth::can_manage_threads(viewer);

        if !poll.results_before_voting
            && !privileged
            && self.storage.user_vote_count(poll_id, viewer.id)? == 0
        {
            return Err(ForumError::Forbidden("results are hidden until you vote"));
        }

        let include_voters = match poll.votes_privacy {
            VotesPrivacy::Public => true,
            VotesPrivacy::Private => privileged,
            VotesPrivacy::Anonymous => false,
        };

        let total = self.storage.total_votes(poll_id)?;
        let mut results = Vec::new();
        for option in self.storage.get_options(poll_id)? {
            let votes_count = self.storage.option_vote_count(option.id)?;
            let votes_percent = if total > 0 {
                votes_count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            let voters = if include_voters {
                Some(self.storage.option_voters(option.id)?)
            } else {
                None
            };

            results.push(OptionResult {
                option_id: option.id,
                label: option.label,
                color: option.color,
                votes_count,
                votes_percent,
                voters,
            });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    struct Fixture {
        storage: Arc<ForumStorage>,
        polls: PollService,
        creator: User,
        voter: User,
        moderator: User,
        thread: Thread,
    }

    fn settings() -> PollSettings {
        PollSettings {
            title: "Lunch spot".to_string(),
            votes_editable: true,
            max_votes: None,
            votes_privacy: 0,
            results_before_voting: true,
            locked_at: None,
        }
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(ForumStorage::in_memory().unwrap());
        let polls = PollService::new(storage.clone());
        let creator = storage.create_user("creator", false).unwrap();
        let voter = storage.create_user("voter", false).unwrap();
        let moderator = storage.create_user("moderator", true).unwrap();
        let (thread, _) = storage.create_thread(creator.id, "Poll thread", "body").unwrap();

        Fixture {
            storage,
            polls,
            creator,
            voter,
            moderator,
            thread,
        }
    }

    fn two_options() -> Vec<NewPollOption> {
        vec![
            NewPollOption {
                label: "A".to_string(),
                color: "red".to_string(),
            },
            NewPollOption {
                label: "B".to_string(),
                color: "blue".to_string(),
            },
        ]
    }

    #[test]
    fn test_one_poll_per_thread() {
        let f = fixture();

        f.polls
            .create_poll(&f.creator, f.thread.id, &settings(), &two_options())
            .unwrap();
        assert!(matches!(
            f.polls
                .create_poll(&f.creator, f.thread.id, &settings(), &two_options()),
            Err(ForumError::Conflict(_))
        ));
    }

    #[test]
    fn test_only_thread_managers_create_polls() {
        let f = fixture();

        assert!(matches!(
            f.polls
                .create_poll(&f.voter, f.thread.id, &settings(), &two_options()),
            Err(ForumError::Forbidden(_))
        ));
        f.polls
            .create_poll(&f.moderator, f.thread.id, &settings(), &two_options())
            .unwrap();
    }

    #[test]
    fn test_locked_thread_rejects_poll_creation() {
        let f = fixture();
        f.storage.set_thread_locked(f.thread.id, true).unwrap();

        assert!(matches!(
            f.polls
                .create_poll(&f.creator, f.thread.id, &settings(), &two_options()),
            Err(ForumError::Validation(_))
        ));
    }

    #[test]
    fn test_settings_validation_names_fields() {
        let f = fixture();

        let mut bad = settings();
        bad.title = String::new();
        bad.max_votes = Some(0);
        bad.votes_privacy = 3;

        match f
            .polls
            .create_poll(&f.creator, f.thread.id, &bad, &two_options())
        {
            Err(ForumError::Validation(fields)) => {
                assert_eq!(fields, vec!["title", "max_votes", "votes_privacy"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        let mut too_big = settings();
        too_big.max_votes = Some(MAX_VOTES_LIMIT + 1);
        assert!(matches!(
            f.polls
                .create_poll(&f.creator, f.thread.id, &too_big, &two_options()),
            Err(ForumError::Validation(_))
        ));
    }

    #[test]
    fn test_max_votes_bounds_cast() {
        let f = fixture();
        let mut s = settings();
        s.max_votes = Some(2);
        let poll = f
            .polls
            .create_poll(
                &f.creator,
                f.thread.id,
                &s,
                &[
                    NewPollOption { label: "A".into(), color: "red".into() },
                    NewPollOption { label: "B".into(), color: "blue".into() },
                    NewPollOption { label: "C".into(), color: "green".into() },
                ],
            )
            .unwrap();
        let ids: Vec<i64> = poll.options.iter().map(|o| o.id).collect();

        // One over the limit fails, exactly at the limit succeeds.
        assert!(matches!(
            f.polls.cast_vote(&f.voter, poll.poll.id, &ids),
            Err(ForumError::Validation(_))
        ));
        f.polls.cast_vote(&f.voter, poll.poll.id, &ids[..2]).unwrap();

        assert!(matches!(
            f.polls.cast_vote(&f.voter, poll.poll.id, &[]),
            Err(ForumError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_and_duplicate_options_rejected() {
        let f = fixture();
        let poll = f
            .polls
            .create_poll(&f.creator, f.thread.id, &settings(), &two_options())
            .unwrap();
        let a = poll.options[0].id;

        assert!(matches!(
            f.polls.cast_vote(&f.voter, poll.poll.id, &[999]),
            Err(ForumError::NotFound("poll option"))
        ));
        assert!(matches!(
            f.polls.cast_vote(&f.voter, poll.poll.id, &[a, a]),
            Err(ForumError::Validation(_))
        ));
    }

    #[test]
    fn test_locked_poll_rejects_votes() {
        let f = fixture();
        let mut s = settings();
        s.locked_at = Some(Utc::now() - Duration::hours(1));
        let poll = f
            .polls
            .create_poll(&f.creator, f.thread.id, &s, &two_options())
            .unwrap();

        assert!(matches!(
            f.polls
                .cast_vote(&f.voter, poll.poll.id, &[poll.options[0].id]),
            Err(ForumError::Validation(_))
        ));
    }

    #[test]
    fn test_frozen_votes_cannot_be_changed() {
        let f = fixture();
        let mut s = settings();
        s.votes_editable = false;
        let poll = f
            .polls
            .create_poll(&f.creator, f.thread.id, &s, &two_options())
            .unwrap();
        let (a, b) = (poll.options[0].id, poll.options[1].id);

        f.polls.cast_vote(&f.voter, poll.poll.id, &[a]).unwrap();
        assert!(matches!(
            f.polls.cast_vote(&f.voter, poll.poll.id, &[b]),
            Err(ForumError::Forbidden(_))
        ));
    }

    #[test]
    fn test_editable_votes_are_replaced_not_merged() {
        let f = fixture();
        let poll = f
            .polls
            .create_poll(&f.creator, f.thread.id, &settings(), &two_options())
            .unwrap();
        let (a, b) = (poll.options[0].id, poll.options[1].id);

        f.polls.cast_vote(&f.voter, poll.poll.id, &[a]).unwrap();
        f.polls.cast_vote(&f.voter, poll.poll.id, &[b]).unwrap();

        let results = f.polls.results(Some(&f.creator), poll.poll.id).unwrap();
        assert_eq!(results[0].votes_count, 0);
        assert_eq!(results[1].votes_count, 1);
    }

    #[test]
    fn test_guests_cannot_view_results() {
        let f = fixture();
        let poll = f
            .polls
            .create_poll(&f.creator, f.thread.id, &settings(), &two_options())
            .unwrap();

        assert!(matches!(
            f.polls.results(None, poll.poll.id),
            Err(ForumError::Unauthorized)
        ));
    }

    #[test]
    fn test_results_hidden_until_vote_unless_privileged() {
        let f = fixture();
        let mut s = settings();
        s.results_before_voting = false;
        let poll = f
            .polls
            .create_poll(&f.creator, f.thread.id, &s, &two_options())
            .unwrap();

        assert!(matches!(
            f.polls.results(Some(&f.voter), poll.poll.id),
            Err(ForumError::Forbidden(_))
        ));

        // Creator and permission holders bypass the voting requirement.
        f.polls.results(Some(&f.creator), poll.poll.id).unwrap();
        f.polls.results(Some(&f.moderator), poll.poll.id).unwrap();

        // Voting unlocks the results.
        f.polls
            .cast_vote(&f.voter, poll.poll.id, &[poll.options[0].id])
            .unwrap();
        f.polls.results(Some(&f.voter), poll.poll.id).unwrap();
    }

    #[test]
    fn test_private_voters_visible_to_privileged_only() {
        let f = fixture();
        let mut s = settings();
        s.votes_privacy = 1;
        let poll = f
            .polls
            .create_poll(&f.creator, f.thread.id, &s, &two_options())
            .unwrap();
        f.polls
            .cast_vote(&f.voter, poll.poll.id, &[poll.options[0].id])
            .unwrap();

        let for_voter = f.polls.results(Some(&f.voter), poll.poll.id).unwrap();
        assert!(for_voter[0].voters.is_none());

        let for_creator = f.polls.results(Some(&f.creator), poll.poll.id).unwrap();
        assert_eq!(for_creator[0].voters.as_ref().unwrap().len(), 1);

        let for_moderator = f.polls.results(Some(&f.moderator), poll.poll.id).unwrap();
        assert!(for_moderator[0].voters.is_some());
    }

    #[test]
    fn test_anonymous_voters_hidden_from_everyone() {
        let f = fixture();
        let mut s = settings();
        s.votes_privacy = 2;
        let poll = f
            .polls
            .create_poll(&f.creator, f.thread.id, &s, &two_options())
            .unwrap();
        f.polls
            .cast_vote(&f.voter, poll.poll.id, &[poll.options[0].id])
            .unwrap();

        for user in [&f.voter, &f.creator, &f.moderator] {
            let results = f.polls.results(Some(user), poll.poll.id).unwrap();
            assert!(results.iter().all(|r| r.voters.is_none()));
        }
    }

    #[test]
    fn test_single_vote_scenario_counts_and_percentages() {
        let f = fixture();
        let mut s = settings();
        s.max_votes = Some(1);
        s.votes_privacy = 0;
        s.results_before_voting = false;
        let poll = f
            .polls
            .create_poll(&f.creator, f.thread.id, &s, &two_options())
            .unwrap();

        f.polls
            .cast_vote(&f.voter, poll.poll.id, &[poll.options[0].id])
            .unwrap();

        let results = f.polls.results(Some(&f.voter), poll.poll.id).unwrap();
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].label, "A");
        assert_eq!(results[0].votes_count, 1);
        assert_eq!(results[0].votes_percent, 100.0);
        assert_eq!(
            results[0].voters.as_ref().unwrap(),
            &vec![crate::models::Voter {
                id: f.voter.id,
                username: f.voter.username.clone(),
            }]
        );

        assert_eq!(results[1].label, "B");
        assert_eq!(results[1].votes_count, 0);
        assert_eq!(results[1].votes_percent, 0.0);
        assert!(results[1].voters.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_percentages_use_total_vote_events() {
        let f = fixture();
        let mut s = settings();
        s.max_votes = Some(2);
        let poll = f
            .polls
            .create_poll(&f.creator, f.thread.id, &s, &two_options())
            .unwrap();
        let (a, b) = (poll.options[0].id, poll.options[1].id);

        // One voter selects both options: 2 vote events, 50% each.
        f.polls.cast_vote(&f.voter, poll.poll.id, &[a, b]).unwrap();

        let results = f.polls.results(Some(&f.creator), poll.poll.id).unwrap();
        assert_eq!(results[0].votes_percent, 50.0);
        assert_eq!(results[1].votes_percent, 50.0);
    }

    #[test]
    fn test_update_and_delete_are_gated() {
        let f = fixture();
        let poll = f
            .polls
            .create_poll(&f.creator, f.thread.id, &settings(), &two_options())
            .unwrap();

        let mut s = settings();
        s.title = "Renamed".to_string();
        assert!(matches!(
            f.polls.update_poll(&f.voter, poll.poll.id, &s),
            Err(ForumError::Forbidden(_))
        ));
        let updated = f.polls.update_poll(&f.creator, poll.poll.id, &s).unwrap();
        assert_eq!(updated.poll.title, "Renamed");

        assert!(matches!(
            f.polls.delete_poll(&f.voter, poll.poll.id),
            Err(ForumError::Forbidden(_))
        ));
        f.polls.delete_poll(&f.creator, poll.poll.id).unwrap();
        assert!(matches!(
            f.polls.poll_for_thread(f.thread.id),
            Err(ForumError::NotFound("poll"))
        ));
    }

    #[test]
    fn test_added_options_keep_ordinal_order() {
        let f = fixture();
        let poll = f
            .polls
            .create_poll(&f.creator, f.thread.id, &settings(), &two_options())
            .unwrap();

        assert!(matches!(
            f.polls.add_option(&f.voter, poll.poll.id, "C", "green"),
            Err(ForumError::Forbidden(_))
        ));
        assert!(matches!(
            f.polls.add_option(&f.creator, poll.poll.id, " ", "green"),
            Err(ForumError::Validation(_))
        ));

        let c = f
            .polls
            .add_option(&f.creator, poll.poll.id, "C", "green")
            .unwrap();
        assert_eq!(c.position, 3);

        // Duplicate labels are allowed.
        let dup = f
            .polls
            .add_option(&f.creator, poll.poll.id, "C", "green")
            .unwrap();
        assert_eq!(dup.position, 4);
    }
}
