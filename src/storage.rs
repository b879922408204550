//! SQLite storage for the forum core
//!
//! A single connection behind a mutex; every multi-statement mutation
//! (vote replacement, best-answer transfer, cascading deletes) runs in one
//! transaction. Reputation changes are relative UPDATEs so concurrent
//! requests never lose increments.

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use tracing::info;

use crate::models::{
    Activity, ActivityType, Poll, PollOption, PollSettings, Post, Subject, SubjectKind, Thread,
    User, Voter, VotesPrivacy,
};

pub struct ForumStorage {
    conn: Mutex<Connection>,
}

fn parse_ts(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        bio: row.get(2)?,
        moderator: row.get(3)?,
        reputation: row.get(4)?,
        created_at: parse_ts(5, row.get::<_, String>(5)?)?,
    })
}

fn thread_from_row(row: &Row) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        locked: row.get(3)?,
        best_post_id: row.get(4)?,
        created_at: parse_ts(5, row.get::<_, String>(5)?)?,
    })
}

fn post_from_row(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        user_id: row.get(2)?,
        body: row.get(3)?,
        is_thread_initiator: row.get(4)?,
        created_at: parse_ts(5, row.get::<_, String>(5)?)?,
    })
}

fn poll_from_row(row: &Row) -> rusqlite::Result<Poll> {
    let privacy_code: u8 = row.get(5)?;
    let votes_privacy = VotesPrivacy::from_code(privacy_code).ok_or_else(|| {
        rusqlite::Error::IntegralValueOutOfRange(5, i64::from(privacy_code))
    })?;
    let locked_at = match row.get::<_, Option<String>>(7)? {
        Some(s) => Some(parse_ts(7, s)?),
        None => None,
    };

    Ok(Poll {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        title: row.get(2)?,
        votes_editable: row.get(3)?,
        max_votes: row.get(4)?,
        votes_privacy,
        results_before_voting: row.get(6)?,
        locked_at,
        created_at: parse_ts(8, row.get::<_, String>(8)?)?,
    })
}

fn activity_from_row(row: &Row) -> rusqlite::Result<Activity> {
    let type_str: String = row.get(1)?;
    let kind = ActivityType::parse(&type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown activity type: {type_str}").into(),
        )
    })?;
    let kind_str: String = row.get(3)?;
    let subject_kind = SubjectKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown subject kind: {kind_str}").into(),
        )
    })?;

    Ok(Activity {
        id: row.get(0)?,
        kind,
        user_id: row.get(2)?,
        subject: Subject {
            kind: subject_kind,
            id: row.get(4)?,
        },
        created_at: parse_ts(5, row.get::<_, String>(5)?)?,
    })
}

const USER_COLUMNS: &str = "id, username, bio, moderator, reputation, created_at";
const THREAD_COLUMNS: &str = "id, user_id, title, locked, best_post_id, created_at";
const POST_COLUMNS: &str = "id, thread_id, user_id, body, is_thread_initiator, created_at";
const POLL_COLUMNS: &str = "id, thread_id, title, votes_editable, max_votes, votes_privacy, \
                            results_before_voting, locked_at, created_at";

/// Relative reputation delta inside an open transaction.
fn apply_reputation_delta(tx: &Transaction, user_id: i64, delta: i64) -> Result<()> {
    tx.execute(
        "UPDATE users SET reputation = reputation + ?1 WHERE id = ?2",
        params![delta, user_id],
    )?;
    Ok(())
}

impl ForumStorage {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.run_migrations()?;
        Ok(storage)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.run_migrations()?;
        Ok(storage)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();

        let applied: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_migrations'",
                [],
                |row| row.get::<_, i64>(0).map(|c| c > 0),
            )
            .unwrap_or(false);

        if !applied {
            conn.execute_batch(include_str!("../migrations/001_schema.sql"))?;
            info!("Applied migration 001_schema");
        }

        Ok(())
    }

    // ========================================================================
    // USERS
    // ========================================================================

    pub fn create_user(&self, username: &str, moderator: bool) -> Result<User> {
        let conn = self.conn.lock();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO users (username, moderator, reputation, created_at) VALUES (?1, ?2, 0, ?3)",
            params![username, moderator, now.to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();

        Ok(User {
            id,
            username: username.to_string(),
            bio: None,
            moderator,
            reputation: 0,
            created_at: now,
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Returns false when the user does not exist.
    pub fn update_bio(&self, user_id: i64, bio: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE users SET bio = ?1 WHERE id = ?2",
            params![bio, user_id],
        )?;
        Ok(changed > 0)
    }

    /// Atomic relative increment/decrement of the reputation counter.
    /// Returns false when the user does not exist.
    pub fn adjust_reputation(&self, user_id: i64, delta: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE users SET reputation = reputation + ?1 WHERE id = ?2",
            params![delta, user_id],
        )?;
        Ok(changed > 0)
    }

    pub fn reset_reputation(&self, user_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE users SET reputation = 0 WHERE id = ?1",
            params![user_id],
        )?;
        Ok(changed > 0)
    }

    pub fn get_reputation(&self, user_id: i64) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        let reputation = conn
            .query_row(
                "SELECT reputation FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(reputation)
    }

    // ========================================================================
    // THREADS & POSTS
    // ========================================================================

    /// Creates the thread together with its initiator post.
    pub fn create_thread(&self, user_id: i64, title: &str, body: &str) -> Result<(Thread, Post)> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = Utc::now();

        tx.execute(
            "INSERT INTO threads (user_id, title, locked, created_at) VALUES (?1, ?2, 0, ?3)",
            params![user_id, title, now.to_rfc3339()],
        )?;
        let thread_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO posts (thread_id, user_id, body, is_thread_initiator, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![thread_id, user_id, body, now.to_rfc3339()],
        )?;
        let post_id = tx.last_insert_rowid();

        tx.commit()?;

        let thread = Thread {
            id: thread_id,
            user_id,
            title: title.to_string(),
            locked: false,
            best_post_id: None,
            created_at: now,
        };
        let post = Post {
            id: post_id,
            thread_id,
            user_id,
            body: body.to_string(),
            is_thread_initiator: true,
            created_at: now,
        };

        Ok((thread, post))
    }

    pub fn get_thread(&self, id: i64) -> Result<Option<Thread>> {
        let conn = self.conn.lock();
        let thread = conn
            .query_row(
                &format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = ?1"),
                params![id],
                thread_from_row,
            )
            .optional()?;
        Ok(thread)
    }

    pub fn set_thread_locked(&self, id: i64, locked: bool) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE threads SET locked = ?1 WHERE id = ?2",
            params![locked, id],
        )?;
        Ok(changed > 0)
    }

    /// Cascading thread delete: posts, poll with options and votes, activity
    /// records for the thread and its posts, plus all reputation reversals
    /// (`thread_points` for the creator, `reply_points` per non-initiator
    /// post, `best_points` for the best-answer holder). One transaction.
    ///
    /// Returns false when the thread does not exist.
    pub fn delete_thread(
        &self,
        id: i64,
        thread_points: i64,
        reply_points: i64,
        best_points: i64,
    ) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let thread: Option<(i64, Option<i64>)> = tx
            .query_row(
                "SELECT user_id, best_post_id FROM threads WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((creator_id, best_post_id)) = thread else {
            return Ok(false);
        };

        if let Some(best_id) = best_post_id {
            let author: Option<i64> = tx
                .query_row(
                    "SELECT user_id FROM posts WHERE id = ?1",
                    params![best_id],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(author_id) = author {
                apply_reputation_delta(&tx, author_id, -best_points)?;
            }
        }

        let replies: Vec<i64> = {
            let mut stmt = tx.prepare(
                "SELECT user_id FROM posts WHERE thread_id = ?1 AND is_thread_initiator = 0",
            )?;
            let rows = stmt.query_map(params![id], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        for author_id in replies {
            apply_reputation_delta(&tx, author_id, -reply_points)?;
        }

        apply_reputation_delta(&tx, creator_id, -thread_points)?;

        tx.execute(
            "DELETE FROM activities WHERE subject_kind = 'post'
             AND subject_id IN (SELECT id FROM posts WHERE thread_id = ?1)",
            params![id],
        )?;
        tx.execute(
            "DELETE FROM activities WHERE subject_kind = 'thread' AND subject_id = ?1",
            params![id],
        )?;
        tx.execute(
            "DELETE FROM poll_votes WHERE poll_id IN (SELECT id FROM polls WHERE thread_id = ?1)",
            params![id],
        )?;
        tx.execute(
            "DELETE FROM poll_options WHERE poll_id IN (SELECT id FROM polls WHERE thread_id = ?1)",
            params![id],
        )?;
        tx.execute("DELETE FROM polls WHERE thread_id = ?1", params![id])?;
        tx.execute("DELETE FROM posts WHERE thread_id = ?1", params![id])?;
        tx.execute("DELETE FROM threads WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(true)
    }

    pub fn create_post(&self, thread_id: i64, user_id: i64, body: &str) -> Result<Post> {
        let conn = self.conn.lock();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO posts (thread_id, user_id, body, is_thread_initiator, created_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![thread_id, user_id, body, now.to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();

        Ok(Post {
            id,
            thread_id,
            user_id,
            body: body.to_string(),
            is_thread_initiator: false,
            created_at: now,
        })
    }

    pub fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let conn = self.conn.lock();
        let post = conn
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
                params![id],
                post_from_row,
            )
            .optional()?;
        Ok(post)
    }

    pub fn get_thread_posts(&self, thread_id: i64) -> Result<Vec<Post>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE thread_id = ?1 ORDER BY created_at, id"
        ))?;
        let posts = stmt
            .query_map(params![thread_id], post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    /// Deletes a reply, unmarking it as best answer first when needed so the
    /// reputation revocations (`best_points`, then `reply_points` for
    /// non-initiator posts) fire in the same transaction as the row removal.
    ///
    /// Returns false when the post does not exist.
    pub fn delete_post(&self, id: i64, reply_points: i64, best_points: i64) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let post: Option<(i64, i64, bool)> = tx
            .query_row(
                "SELECT thread_id, user_id, is_thread_initiator FROM posts WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((thread_id, author_id, is_initiator)) = post else {
            return Ok(false);
        };

        let best_post_id: Option<i64> = tx.query_row(
            "SELECT best_post_id FROM threads WHERE id = ?1",
            params![thread_id],
            |row| row.get(0),
        )?;

        if best_post_id == Some(id) {
            apply_reputation_delta(&tx, author_id, -best_points)?;
            tx.execute(
                "UPDATE threads SET best_post_id = NULL WHERE id = ?1",
                params![thread_id],
            )?;
        }

        if !is_initiator {
            apply_reputation_delta(&tx, author_id, -reply_points)?;
        }

        tx.execute(
            "DELETE FROM activities WHERE subject_kind = 'post' AND subject_id = ?1",
            params![id],
        )?;
        tx.execute("DELETE FROM posts WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(true)
    }

    // ========================================================================
    // BEST ANSWER
    // ========================================================================

    /// Transfers best-answer status to `post_id`: revokes `points` from the
    /// previous holder's author (if any), updates the thread pointer and
    /// grants `points` to the new author, all in one transaction.
    ///
    /// A no-op when the post already holds the status.
    pub fn set_best_post(&self, thread_id: i64, post_id: i64, points: i64) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let current: Option<i64> = tx.query_row(
            "SELECT best_post_id FROM threads WHERE id = ?1",
            params![thread_id],
            |row| row.get(0),
        )?;

        if current == Some(post_id) {
            return Ok(());
        }

        if let Some(previous_id) = current {
            let previous_author: i64 = tx.query_row(
                "SELECT user_id FROM posts WHERE id = ?1",
                params![previous_id],
                |row| row.get(0),
            )?;
            apply_reputation_delta(&tx, previous_author, -points)?;
        }

        let new_author: i64 = tx.query_row(
            "SELECT user_id FROM posts WHERE id = ?1",
            params![post_id],
            |row| row.get(0),
        )?;

        tx.execute(
            "UPDATE threads SET best_post_id = ?1 WHERE id = ?2",
            params![post_id, thread_id],
        )?;
        apply_reputation_delta(&tx, new_author, points)?;

        tx.commit()?;
        Ok(())
    }

    /// Clears the best-answer pointer and revokes `points` from its author.
    /// Returns false when the thread had no best answer.
    pub fn unset_best_post(&self, thread_id: i64, points: i64) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let current: Option<i64> = tx.query_row(
            "SELECT best_post_id FROM threads WHERE id = ?1",
            params![thread_id],
            |row| row.get(0),
        )?;

        let Some(best_id) = current else {
            return Ok(false);
        };

        let author: i64 = tx.query_row(
            "SELECT user_id FROM posts WHERE id = ?1",
            params![best_id],
            |row| row.get(0),
        )?;

        apply_reputation_delta(&tx, author, -points)?;
        tx.execute(
            "UPDATE threads SET best_post_id = NULL WHERE id = ?1",
            params![thread_id],
        )?;

        tx.commit()?;
        Ok(true)
    }

    // ========================================================================
    // POLLS
    // ========================================================================

    pub fn create_poll(&self, thread_id: i64, settings: &PollSettings) -> Result<Poll> {
        let conn = self.conn.lock();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO polls (thread_id, title, votes_editable, max_votes, votes_privacy,
                                results_before_voting, locked_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                thread_id,
                settings.title,
                settings.votes_editable,
                settings.max_votes,
                settings.votes_privacy,
                settings.results_before_voting,
                settings.locked_at.map(|t| t.to_rfc3339()),
                now.to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();

        Ok(Poll {
            id,
            thread_id,
            title: settings.title.clone(),
            votes_editable: settings.votes_editable,
            max_votes: settings.max_votes,
            // callers validate the privacy code before insert
            votes_privacy: VotesPrivacy::from_code(settings.votes_privacy)
                .unwrap_or(VotesPrivacy::Public),
            results_before_voting: settings.results_before_voting,
            locked_at: settings.locked_at,
            created_at: now,
        })
    }

    pub fn get_poll(&self, id: i64) -> Result<Option<Poll>> {
        let conn = self.conn.lock();
        let poll = conn
            .query_row(
                &format!("SELECT {POLL_COLUMNS} FROM polls WHERE id = ?1"),
                params![id],
                poll_from_row,
            )
            .optional()?;
        Ok(poll)
    }

    pub fn get_poll_by_thread(&self, thread_id: i64) -> Result<Option<Poll>> {
        let conn = self.conn.lock();
        let poll = conn
            .query_row(
                &format!("SELECT {POLL_COLUMNS} FROM polls WHERE thread_id = ?1"),
                params![thread_id],
                poll_from_row,
            )
            .optional()?;
        Ok(poll)
    }

    pub fn update_poll(&self, id: i64, settings: &PollSettings) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE polls SET title = ?1, votes_editable = ?2, max_votes = ?3,
                              votes_privacy = ?4, results_before_voting = ?5, locked_at = ?6
             WHERE id = ?7",
            params![
                settings.title,
                settings.votes_editable,
                settings.max_votes,
                settings.votes_privacy,
                settings.results_before_voting,
                settings.locked_at.map(|t| t.to_rfc3339()),
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Deletes the poll together with its options and votes.
    pub fn delete_poll(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM poll_votes WHERE poll_id = ?1", params![id])?;
        tx.execute("DELETE FROM poll_options WHERE poll_id = ?1", params![id])?;
        let deleted = tx.execute("DELETE FROM polls WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(deleted > 0)
    }

    /// Appends an option with the next ordinal position.
    pub fn add_option(&self, poll_id: i64, label: &str, color: &str) -> Result<PollOption> {
        let conn = self.conn.lock();
        let position: i64 = conn.query_row(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM poll_options WHERE poll_id = ?1",
            params![poll_id],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO poll_options (poll_id, label, color, position) VALUES (?1, ?2, ?3, ?4)",
            params![poll_id, label, color, position],
        )?;
        let id = conn.last_insert_rowid();

        Ok(PollOption {
            id,
            poll_id,
            label: label.to_string(),
            color: color.to_string(),
            position,
        })
    }

    pub fn get_options(&self, poll_id: i64) -> Result<Vec<PollOption>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, poll_id, label, color, position FROM poll_options
             WHERE poll_id = ?1 ORDER BY position",
        )?;
        let options = stmt
            .query_map(params![poll_id], |row| {
                Ok(PollOption {
                    id: row.get(0)?,
                    poll_id: row.get(1)?,
                    label: row.get(2)?,
                    color: row.get(3)?,
                    position: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(options)
    }

    // ========================================================================
    // VOTES
    // ========================================================================

    /// Replace-not-merge: drops the user's whole vote set for the poll and
    /// inserts one row per selected option, in one transaction.
    pub fn replace_votes(&self, poll_id: i64, user_id: i64, option_ids: &[i64]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "DELETE FROM poll_votes WHERE poll_id = ?1 AND user_id = ?2",
            params![poll_id, user_id],
        )?;
        for option_id in option_ids {
            tx.execute(
                "INSERT INTO poll_votes (poll_id, option_id, user_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![poll_id, option_id, user_id, now],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn user_vote_count(&self, poll_id: i64, user_id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM poll_votes WHERE poll_id = ?1 AND user_id = ?2",
            params![poll_id, user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn total_votes(&self, poll_id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM poll_votes WHERE poll_id = ?1",
            params![poll_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn option_vote_count(&self, option_id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM poll_votes WHERE option_id = ?1",
            params![option_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn option_voters(&self, option_id: i64) -> Result<Vec<Voter>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.username FROM poll_votes v
             JOIN users u ON u.id = v.user_id
             WHERE v.option_id = ?1
             ORDER BY v.created_at, u.id",
        )?;
        let voters = stmt
            .query_map(params![option_id], |row| {
                Ok(Voter {
                    id: row.get(0)?,
                    username: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(voters)
    }

    // ========================================================================
    // ACTIVITIES
    // ========================================================================

    pub fn record_activity(
        &self,
        kind: ActivityType,
        user_id: i64,
        subject: Subject,
    ) -> Result<Activity> {
        let conn = self.conn.lock();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO activities (type, user_id, subject_kind, subject_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                kind.as_str(),
                user_id,
                subject.kind.as_str(),
                subject.id,
                now.to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();

        Ok(Activity {
            id,
            kind,
            user_id,
            subject,
            created_at: now,
        })
    }

    /// Newest first.
    pub fn activities_for_user(&self, user_id: i64, limit: u32) -> Result<Vec<Activity>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, type, user_id, subject_kind, subject_id, created_at FROM activities
             WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let activities = stmt
            .query_map(params![user_id, limit], activity_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(activities)
    }

    pub fn activities_for_subject(&self, subject: Subject) -> Result<Vec<Activity>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, type, user_id, subject_kind, subject_id, created_at FROM activities
             WHERE subject_kind = ?1 AND subject_id = ?2 ORDER BY created_at DESC, id DESC",
        )?;
        let activities = stmt
            .query_map(params![subject.kind.as_str(), subject.id], activity_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(activities)
    }
}
