//! Session store capability.
//!
//! The lifecycle controller and the analytics only ever talk to
//! [`SessionStore`], so a test can swap the SQLite backing for
//! [`MemoryStore`] without touching either.

use crate::common::local_midnight;
use crate::error::{PomoError, Result};
use crate::models::{NewSession, Session};
use chrono::{DateTime, Duration, Local, NaiveDate};
use std::sync::Mutex;

pub trait SessionStore {
    /// Insert one record and return its id.
    fn create_session(&self, new: &NewSession) -> Result<i64>;

    /// Most recent session that is paused, or running past `now`.
    fn get_active_session(&self, now: &DateTime<Local>) -> Result<Option<Session>>;

    /// Most recent paused session.
    fn get_paused_session(&self) -> Result<Option<Session>>;

    /// Most recent session regardless of state.
    fn get_last_session(&self) -> Result<Option<Session>>;

    fn get_session(&self, id: i64) -> Result<Option<Session>>;

    fn update_session_end_time(&self, id: i64, end: &DateTime<Local>) -> Result<()>;

    /// Mark a session paused. `InvalidState` if it already is.
    fn pause_session(&self, id: i64, paused_at: &DateTime<Local>) -> Result<()>;

    /// Clear the pause, add `resumed_at - paused_at` to the paused total and
    /// move the end time, atomically. `InvalidState` if no pause is recorded.
    fn resume_session(
        &self,
        id: i64,
        resumed_at: &DateTime<Local>,
        new_end: &DateTime<Local>,
    ) -> Result<()>;

    /// Sessions starting on any day from `start` to `end` inclusive, newest first.
    fn get_sessions_by_date_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Session>>;

    /// Sessions starting in `[today 00:00, tomorrow 00:00)`.
    fn get_today_sessions(&self, now: &DateTime<Local>) -> Result<Vec<Session>> {
        let today = now.date_naive();
        self.get_sessions_by_date_range(today, today)
    }
}

/// Half-open instant range covering whole local days `start..=end`.
pub fn day_range_bounds(start: NaiveDate, end: NaiveDate) -> (DateTime<Local>, DateTime<Local>) {
    let after_end = end.succ_opt().unwrap_or(end);
    (local_midnight(start), local_midnight(after_end))
}

/// Paused seconds to add when a pause ends, never negative.
pub fn pause_increment(paused_at: &DateTime<Local>, resumed_at: &DateTime<Local>) -> i64 {
    (*resumed_at - *paused_at).max(Duration::zero()).num_seconds()
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<Vec<Session>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_sessions<T>(&self, f: impl FnOnce(&mut Vec<Session>) -> Result<T>) -> Result<T> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|_| PomoError::unavailable("memory store lock poisoned"))?;
        f(&mut guard)
    }

    fn latest_by<P>(&self, predicate: P) -> Result<Option<Session>>
    where
        P: Fn(&Session) -> bool,
    {
        self.with_sessions(|sessions| {
            Ok(sessions
                .iter()
                .filter(|s| predicate(s))
                .max_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)))
                .cloned())
        })
    }

    fn with_session<T>(&self, id: i64, f: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
        self.with_sessions(|sessions| {
            let session = sessions
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| PomoError::not_found(format!("no session with id {}", id)))?;
            f(session)
        })
    }
}

impl SessionStore for MemoryStore {
    fn create_session(&self, new: &NewSession) -> Result<i64> {
        self.with_sessions(|sessions| {
            let id = sessions.iter().map(|s| s.id).max().unwrap_or(0) + 1;
            sessions.push(Session {
                id,
                start_time: new.start_time,
                end_time: new.end_time,
                description: new.description.clone(),
                duration_sec: new.duration_sec,
                tags: new.tags.clone(),
                was_break: new.was_break,
                is_paused: false,
                paused_at: None,
                total_paused_duration_sec: 0,
            });
            Ok(id)
        })
    }

    fn get_active_session(&self, now: &DateTime<Local>) -> Result<Option<Session>> {
        self.latest_by(|s| s.is_active_at(now))
    }

    fn get_paused_session(&self) -> Result<Option<Session>> {
        self.latest_by(|s| s.is_paused)
    }

    fn get_last_session(&self) -> Result<Option<Session>> {
        self.latest_by(|_| true)
    }

    fn get_session(&self, id: i64) -> Result<Option<Session>> {
        self.latest_by(|s| s.id == id)
    }

    fn update_session_end_time(&self, id: i64, end: &DateTime<Local>) -> Result<()> {
        self.with_session(id, |s| {
            s.end_time = *end;
            Ok(())
        })
    }

    fn pause_session(&self, id: i64, paused_at: &DateTime<Local>) -> Result<()> {
        self.with_session(id, |s| {
            if s.is_paused {
                return Err(PomoError::invalid_state(format!(
                    "session {} is already paused",
                    id
                )));
            }
            s.is_paused = true;
            s.paused_at = Some(*paused_at);
            Ok(())
        })
    }

    fn resume_session(
        &self,
        id: i64,
        resumed_at: &DateTime<Local>,
        new_end: &DateTime<Local>,
    ) -> Result<()> {
        self.with_session(id, |s| {
            let paused_at = s.paused_at.ok_or_else(|| {
                PomoError::invalid_state(format!("session {} has no pause timestamp", id))
            })?;
            s.total_paused_duration_sec += pause_increment(&paused_at, resumed_at);
            s.paused_at = None;
            s.is_paused = false;
            s.end_time = *new_end;
            Ok(())
        })
    }

    fn get_sessions_by_date_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Session>> {
        let (from, to) = day_range_bounds(start, end);
        self.with_sessions(|sessions| {
            let mut found: Vec<Session> = sessions
                .iter()
                .filter(|s| s.start_time >= from && s.start_time < to)
                .cloned()
                .collect();
            found.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));
            Ok(found)
        })
    }
}
