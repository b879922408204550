//! Data structures shared between storage, services and the HTTP surface.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// USERS / THREADS / POSTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub bio: Option<String>,
    pub moderator: bool,
    pub reputation: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub locked: bool,
    pub best_post_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub thread_id: i64,
    pub user_id: i64,
    pub body: String,
    pub is_thread_initiator: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// POLLS
// ============================================================================

/// Who gets to see voter identities in poll results.
///
/// Stored with the numeric encoding `0|1|2` that the public API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotesPrivacy {
    Public,
    Private,
    Anonymous,
}

impl VotesPrivacy {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Public),
            1 => Some(Self::Private),
            2 => Some(Self::Anonymous),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Public => 0,
            Self::Private => 1,
            Self::Anonymous => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub id: i64,
    pub thread_id: i64,
    pub title: String,
    pub votes_editable: bool,
    /// `None` means unlimited selections per voter.
    pub max_votes: Option<u32>,
    pub votes_privacy: VotesPrivacy,
    pub results_before_voting: bool,
    pub locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Poll {
    /// A poll is locked once its lock time has passed.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        matches!(self.locked_at, Some(t) if now > t)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollOption {
    pub id: i64,
    pub poll_id: i64,
    pub label: String,
    pub color: String,
    pub position: i64,
}

/// Poll configuration as submitted by clients. `votes_privacy` carries the
/// numeric `0|1|2` encoding and is range-checked by the poll service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    pub title: String,
    pub votes_editable: bool,
    #[serde(default)]
    pub max_votes: Option<u32>,
    pub votes_privacy: u8,
    pub results_before_voting: bool,
    #[serde(default)]
    pub locked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPollOption {
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollWithOptions {
    #[serde(flatten)]
    pub poll: Poll,
    pub options: Vec<PollOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub id: i64,
    pub username: String,
}

/// Aggregated results for one option. `voters` is omitted entirely when the
/// poll's privacy setting hides identities from the viewer.
#[derive(Debug, Clone, Serialize)]
pub struct OptionResult {
    pub option_id: i64,
    pub label: String,
    pub color: String,
    pub votes_count: i64,
    pub votes_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voters: Option<Vec<Voter>>,
}

// ============================================================================
// ACTIVITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    User,
    Thread,
    Post,
}

impl SubjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Thread => "thread",
            Self::Post => "post",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "thread" => Some(Self::Thread),
            "post" => Some(Self::Post),
            _ => None,
        }
    }
}

/// Tagged reference to the entity an activity record is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub kind: SubjectKind,
    pub id: i64,
}

impl Subject {
    pub fn user(id: i64) -> Self {
        Self {
            kind: SubjectKind::User,
            id,
        }
    }

    pub fn thread(id: i64) -> Self {
        Self {
            kind: SubjectKind::Thread,
            id,
        }
    }

    pub fn post(id: i64) -> Self {
        Self {
            kind: SubjectKind::Post,
            id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    CreatedUser,
    CreatedThread,
    CreatedPost,
    UpdatedProfile,
}

impl ActivityType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreatedUser => "created_user",
            Self::CreatedThread => "created_thread",
            Self::CreatedPost => "created_post",
            Self::UpdatedProfile => "updated_profile",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created_user" => Some(Self::CreatedUser),
            "created_thread" => Some(Self::CreatedThread),
            "created_post" => Some(Self::CreatedPost),
            "updated_profile" => Some(Self::UpdatedProfile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub user_id: i64,
    pub subject: Subject,
    pub created_at: DateTime<Utc>,
}

/// One calendar day of a user's activity feed, newest day first.
#[derive(Debug, Clone, Serialize)]
pub struct FeedDay {
    pub date: NaiveDate,
    pub activities: Vec<Activity>,
}
