//! Council Forum - community threads, polls and reputation
//!
//! The forum core behind a university-association community: discussion
//! threads with replies, single- or multi-choice polls, an activity feed and
//! a reputation ledger driven by community actions.
//!
//! # How it works
//!
//! 1. Users publish threads; the initiator post is created with the thread
//! 2. Replies grant `reply_posted` reputation; thread publication grants
//!    `thread_published` (magnitudes come from the `[reputation]` config)
//! 3. Thread creators attach at most one poll and pick a best answer, which
//!    transfers the `best_answer_awarded` points to the answer's author
//! 4. Votes are cast under the poll's constraints (selection limit, lock
//!    time, editability) and replaced wholesale on re-vote
//! 5. Results respect the visibility policy: public, private (creator and
//!    moderators see voters) or anonymous (nobody does)
//! 6. Every tracked event appends an activity record; feeds group them by
//!    calendar day
//!
//! # Consistency
//!
//! - Reputation changes are relative updates at the storage layer
//! - Vote replacement, best-answer transfer and cascading deletes each run
//!   in a single transaction

pub mod activity;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod polls;
pub mod reputation;
pub mod server;
pub mod storage;
pub mod threads;
pub mod users;

pub use activity::ActivityRecorder;
pub use config::{Config, ReputationAction, ReputationConfig};
pub use error::{ForumError, ForumResult};
pub use polls::PollService;
pub use reputation::{Points, ReputationLedger};
pub use storage::ForumStorage;
pub use threads::ThreadService;
pub use users::UserService;
