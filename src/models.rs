//! Data models for Pomotrack.
//!
//! `Session` is the only persisted entity. Everything else here is derived
//! on demand and handed to collaborators as plain immutable data.

use chrono::{DateTime, Duration, Local};
use serde::Serialize;

/// One tracked interval of work or break time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    /// Store-assigned monotonic identifier
    pub id: i64,
    pub start_time: DateTime<Local>,
    /// Planned end, moved by resume and cancel
    pub end_time: DateTime<Local>,
    pub description: String,
    /// Planned duration at creation time, never changed afterwards
    pub duration_sec: i64,
    /// Creation order preserved, no duplicates
    pub tags: Vec<String>,
    pub was_break: bool,
    pub is_paused: bool,
    pub paused_at: Option<DateTime<Local>>,
    /// Sum of all completed pauses, in seconds
    pub total_paused_duration_sec: i64,
}

/// Lifecycle state as seen by a reader at a given instant.
///
/// `Completed` is never stored; it is inferred when a running session's
/// end time has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Running,
    Paused,
    Completed,
    Cancelled,
}

/// Fields supplied when a session starts.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub description: String,
    pub duration_sec: i64,
    pub tags: Vec<String>,
    pub was_break: bool,
}

impl Session {
    pub fn planned_duration(&self) -> Duration {
        Duration::seconds(self.duration_sec)
    }

    /// Running or Paused at `now`.
    pub fn is_active_at(&self, now: &DateTime<Local>) -> bool {
        self.is_paused || self.end_time > *now
    }

    /// Derived state at `now`.
    ///
    /// A row whose end time was pulled in before its planned end and has
    /// passed is reported as `Cancelled`.
    pub fn state_at(&self, now: &DateTime<Local>) -> SessionState {
        if self.is_paused {
            SessionState::Paused
        } else if self.end_time > *now {
            SessionState::Running
        } else if self.worked_duration(&self.end_time) + Duration::seconds(1)
            < self.planned_duration()
        {
            SessionState::Cancelled
        } else {
            SessionState::Completed
        }
    }

    /// Time spent not paused between start and `now` (or the end, whichever is first).
    ///
    /// While paused the value freezes at the pause instant.
    pub fn worked_duration(&self, now: &DateTime<Local>) -> Duration {
        let until = match (self.is_paused, self.paused_at) {
            (true, Some(paused_at)) => paused_at.min(*now),
            _ => self.end_time.min(*now),
        };
        let worked = until - self.start_time - Duration::seconds(self.total_paused_duration_sec);
        worked.max(Duration::zero())
    }

    /// Planned duration still to go at `now`.
    pub fn remaining_at(&self, now: &DateTime<Local>) -> Duration {
        (self.planned_duration() - self.worked_duration(now)).max(Duration::zero())
    }

    /// Percentage of the planned duration worked, capped at 100.
    pub fn progress_percent(&self, now: &DateTime<Local>) -> f64 {
        if self.duration_sec <= 0 {
            return 100.0;
        }
        let worked = self.worked_duration(now).num_milliseconds() as f64 / 1000.0;
        (worked / self.duration_sec as f64 * 100.0).min(100.0)
    }
}

impl NewSession {
    /// A session of `duration` starting at `start`.
    pub fn starting_at(
        start: DateTime<Local>,
        duration: Duration,
        description: impl Into<String>,
        tags: Vec<String>,
        was_break: bool,
    ) -> Self {
        NewSession {
            start_time: start,
            end_time: start + duration,
            description: description.into(),
            duration_sec: duration.num_seconds(),
            tags,
            was_break,
        }
    }
}

/// Snapshot of the active session for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session: Session,
    pub state: SessionState,
    pub elapsed_sec: i64,
    pub remaining_sec: i64,
    pub progress_percent: f64,
}

impl SessionStatus {
    pub fn at(session: Session, now: &DateTime<Local>) -> Self {
        SessionStatus {
            state: session.state_at(now),
            elapsed_sec: session.worked_duration(now).num_seconds(),
            remaining_sec: session.remaining_at(now).num_seconds(),
            progress_percent: session.progress_percent(now),
            session,
        }
    }
}
