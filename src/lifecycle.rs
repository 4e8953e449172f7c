//! Session lifecycle: start, pause, resume, cancel.
//!
//! Completion is never written back. A running session whose end time has
//! passed simply stops being returned by the active-session lookup.

use crate::common::Clock;
use crate::error::{PomoError, Result};
use crate::models::{NewSession, Session, SessionStatus};
use crate::store::SessionStore;
use crate::utils::{
    sanitize_description, sanitize_tags, validate_description, validate_duration, validate_tags,
};
use chrono::{DateTime, Duration, Local};
use log::{debug, info};

pub const BREAK_DESCRIPTION: &str = "Break";

/// Parameters for starting a work session.
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub duration: Duration,
    pub description: String,
    pub tags: Vec<String>,
    /// Backdate the start by this much
    pub started_ago: Duration,
}

impl StartOptions {
    pub fn new(duration: Duration, description: impl Into<String>) -> Self {
        StartOptions {
            duration,
            description: description.into(),
            tags: Vec::new(),
            started_ago: Duration::zero(),
        }
    }

    pub fn with_tags<S: AsRef<str>>(mut self, tags: &[S]) -> Self {
        self.tags = tags.iter().map(|t| t.as_ref().to_string()).collect();
        self
    }

    pub fn started_ago(mut self, ago: Duration) -> Self {
        self.started_ago = ago;
        self
    }
}

#[derive(Debug, Clone)]
pub struct BreakOptions {
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PauseOutcome {
    Paused(Session),
    /// Nothing changed; the session was paused before this call
    AlreadyPaused(Session),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResumeOutcome {
    pub session: Session,
    pub remaining: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancelOutcome {
    pub session: Session,
    pub actual_duration: Duration,
}

/// Remaining planned time of a paused session.
///
/// Pause time from earlier cycles of the same session is discounted, so a
/// session paused several times still runs for its planned duration.
pub fn remaining_after_pause(session: &Session, paused_at: &DateTime<Local>) -> Duration {
    let worked = *paused_at
        - session.start_time
        - Duration::seconds(session.total_paused_duration_sec);
    (session.planned_duration() - worked.max(Duration::zero())).max(Duration::zero())
}

/// Enforces the valid transitions over a store and a clock.
pub struct Lifecycle<'a, S: SessionStore + ?Sized, C: Clock + ?Sized> {
    store: &'a S,
    clock: &'a C,
}

impl<'a, S: SessionStore + ?Sized, C: Clock + ?Sized> Lifecycle<'a, S, C> {
    pub fn new(store: &'a S, clock: &'a C) -> Self {
        Lifecycle { store, clock }
    }

    pub fn start(&self, options: &StartOptions) -> Result<Session> {
        let description = sanitize_description(&options.description);
        validate_description(&description, false)?;
        let tags = sanitize_tags(&options.tags);
        validate_tags(&tags)?;
        validate_duration(options.duration)?;
        if options.started_ago < Duration::zero() {
            return Err(PomoError::validation("start offset cannot be negative"));
        }

        let start = self.clock.now() - options.started_ago;
        self.begin(NewSession::starting_at(
            start,
            options.duration,
            description,
            tags,
            false,
        ))
    }

    pub fn start_break(&self, options: &BreakOptions) -> Result<Session> {
        validate_duration(options.duration)?;
        self.begin(NewSession::starting_at(
            self.clock.now(),
            options.duration,
            BREAK_DESCRIPTION,
            Vec::new(),
            true,
        ))
    }

    /// Start a new session shaped like the most recent one.
    pub fn repeat(&self) -> Result<Session> {
        let last = self
            .store
            .get_last_session()?
            .ok_or_else(|| PomoError::not_found("No previous session to repeat."))?;

        self.begin(NewSession::starting_at(
            self.clock.now(),
            last.planned_duration(),
            last.description,
            last.tags,
            last.was_break,
        ))
    }

    fn begin(&self, new: NewSession) -> Result<Session> {
        let now = self.clock.now();
        if let Some(active) = self.store.get_active_session(&now)? {
            return Err(PomoError::invalid_state(format!(
                "session '{}' is still {}; cancel it first",
                active.description,
                if active.is_paused { "paused" } else { "running" }
            )));
        }

        let id = self.store.create_session(&new)?;
        info!(
            "Started {} session {} for {}s",
            if new.was_break { "break" } else { "work" },
            id,
            new.duration_sec
        );
        self.reload(id)
    }

    pub fn pause(&self) -> Result<PauseOutcome> {
        let now = self.clock.now();
        let session = self
            .store
            .get_active_session(&now)?
            .ok_or_else(|| PomoError::not_found("No active session to pause."))?;

        if session.is_paused {
            return Ok(PauseOutcome::AlreadyPaused(session));
        }

        match self.store.pause_session(session.id, &now) {
            Ok(()) => {}
            Err(PomoError::InvalidState(msg)) => {
                // Another process paused it between the read and the write
                let current = self.reload(session.id)?;
                if current.is_paused {
                    debug!("Session {} was paused concurrently", session.id);
                    return Ok(PauseOutcome::AlreadyPaused(current));
                }
                return Err(PomoError::InvalidState(msg));
            }
            Err(e) => return Err(e),
        }
        info!("Paused session {}", session.id);
        Ok(PauseOutcome::Paused(self.reload(session.id)?))
    }

    pub fn resume(&self) -> Result<ResumeOutcome> {
        let now = self.clock.now();
        let session = self
            .store
            .get_paused_session()?
            .ok_or_else(|| PomoError::not_found("No paused session to resume."))?;
        let paused_at = session.paused_at.ok_or_else(|| {
            PomoError::invalid_state(format!(
                "session {} is paused but has no pause timestamp",
                session.id
            ))
        })?;

        let remaining = remaining_after_pause(&session, &paused_at);
        let new_end = now + remaining;
        self.store.resume_session(session.id, &now, &new_end)?;
        info!(
            "Resumed session {} with {}s remaining",
            session.id,
            remaining.num_seconds()
        );

        Ok(ResumeOutcome {
            session: self.reload(session.id)?,
            remaining,
        })
    }

    pub fn cancel(&self) -> Result<CancelOutcome> {
        let now = self.clock.now();
        let session = self
            .store
            .get_active_session(&now)?
            .ok_or_else(|| PomoError::not_found("No active session to cancel."))?;

        if session.is_paused {
            // Closes the pause and ends the session in one write
            self.store.resume_session(session.id, &now, &now)?;
        } else {
            self.store.update_session_end_time(session.id, &now)?;
        }

        let actual_duration = (now - session.start_time).max(Duration::zero());
        info!(
            "Cancelled session {} after {}s",
            session.id,
            actual_duration.num_seconds()
        );

        Ok(CancelOutcome {
            session: self.reload(session.id)?,
            actual_duration,
        })
    }

    /// The active session with its derived timing, if any.
    pub fn status(&self) -> Result<Option<SessionStatus>> {
        let now = self.clock.now();
        Ok(self
            .store
            .get_active_session(&now)?
            .map(|s| SessionStatus::at(s, &now)))
    }

    /// The most recent session of any state with its derived timing.
    pub fn last_status(&self) -> Result<Option<SessionStatus>> {
        let now = self.clock.now();
        Ok(self
            .store
            .get_last_session()?
            .map(|s| SessionStatus::at(s, &now)))
    }

    fn reload(&self, id: i64) -> Result<Session> {
        self.store.get_session(id)?.ok_or_else(|| {
            PomoError::invalid_state(format!("session {} vanished after write", id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FixedClock;
    use crate::models::SessionState;
    use crate::store::MemoryStore;

    fn setup() -> (MemoryStore, FixedClock) {
        (MemoryStore::new(), FixedClock::at(2025, 6, 11, 9, 0, 0))
    }

    #[test]
    fn test_start_sets_planned_end() {
        let (store, clock) = setup();
        let lc = Lifecycle::new(&store, &clock);
        let s = lc
            .start(&StartOptions::new(Duration::minutes(25), "  write   docs ").with_tags(&["Docs", "docs"]))
            .unwrap();

        assert_eq!(s.end_time - s.start_time, Duration::minutes(25));
        assert_eq!(s.description, "write docs");
        assert_eq!(s.tags, vec!["docs"]);
        assert!(s.end_time >= s.start_time);
    }

    #[test]
    fn test_start_refuses_while_active() {
        let (store, clock) = setup();
        let lc = Lifecycle::new(&store, &clock);
        lc.start(&StartOptions::new(Duration::minutes(25), "a")).unwrap();
        let err = lc
            .start(&StartOptions::new(Duration::minutes(25), "b"))
            .unwrap_err();
        assert!(matches!(err, PomoError::InvalidState(_)));
    }

    #[test]
    fn test_started_ago_backdates() {
        let (store, clock) = setup();
        let lc = Lifecycle::new(&store, &clock);
        let s = lc
            .start(&StartOptions::new(Duration::minutes(25), "a").started_ago(Duration::minutes(5)))
            .unwrap();
        assert_eq!(s.start_time, clock.now() - Duration::minutes(5));
        assert_eq!(lc.status().unwrap().unwrap().remaining_sec, 20 * 60);
    }

    #[test]
    fn test_pause_twice_reports_already_paused() {
        let (store, clock) = setup();
        let lc = Lifecycle::new(&store, &clock);
        lc.start(&StartOptions::new(Duration::minutes(25), "a")).unwrap();
        clock.advance(Duration::minutes(5));

        assert!(matches!(lc.pause().unwrap(), PauseOutcome::Paused(_)));
        assert!(matches!(lc.pause().unwrap(), PauseOutcome::AlreadyPaused(_)));
    }

    #[test]
    fn test_pause_without_session_is_not_found() {
        let (store, clock) = setup();
        let lc = Lifecycle::new(&store, &clock);
        let err = lc.pause().unwrap_err();
        assert!(!err.is_fatal());
        assert!(matches!(lc.resume(), Err(PomoError::NotFound(_))));
        assert!(matches!(lc.cancel(), Err(PomoError::NotFound(_))));
        assert!(matches!(lc.repeat(), Err(PomoError::NotFound(_))));
    }

    #[test]
    fn test_immediate_resume_keeps_end_time() {
        let (store, clock) = setup();
        let lc = Lifecycle::new(&store, &clock);
        let s = lc.start(&StartOptions::new(Duration::minutes(25), "a")).unwrap();
        clock.advance(Duration::minutes(10));

        lc.pause().unwrap();
        let resumed = lc.resume().unwrap();
        let drift = (resumed.session.end_time - s.end_time).num_milliseconds().abs();
        assert!(drift <= 1000);
        assert!(resumed.session.end_time >= clock.now());
    }

    #[test]
    fn test_resume_pushes_end_by_pause_length() {
        let (store, clock) = setup();
        let lc = Lifecycle::new(&store, &clock);
        let s = lc.start(&StartOptions::new(Duration::minutes(25), "a")).unwrap();

        clock.advance(Duration::minutes(10));
        lc.pause().unwrap();
        clock.advance(Duration::minutes(7));
        let resumed = lc.resume().unwrap();

        assert_eq!(resumed.remaining, Duration::minutes(15));
        assert_eq!(resumed.session.end_time, s.end_time + Duration::minutes(7));
        assert_eq!(resumed.session.total_paused_duration_sec, 7 * 60);
    }

    #[test]
    fn test_second_pause_cycle_discounts_first() {
        let (store, clock) = setup();
        let lc = Lifecycle::new(&store, &clock);
        let s = lc.start(&StartOptions::new(Duration::minutes(25), "a")).unwrap();

        clock.advance(Duration::minutes(5));
        lc.pause().unwrap();
        clock.advance(Duration::minutes(10));
        lc.resume().unwrap();

        clock.advance(Duration::minutes(5));
        lc.pause().unwrap();
        clock.advance(Duration::minutes(3));
        let resumed = lc.resume().unwrap();

        // 10 minutes worked, 13 paused
        assert_eq!(resumed.remaining, Duration::minutes(15));
        assert_eq!(resumed.session.end_time, s.end_time + Duration::minutes(13));
    }

    #[test]
    fn test_cancel_running() {
        let (store, clock) = setup();
        let lc = Lifecycle::new(&store, &clock);
        lc.start(&StartOptions::new(Duration::minutes(25), "a")).unwrap();
        clock.advance(Duration::minutes(8));

        let out = lc.cancel().unwrap();
        assert_eq!(out.actual_duration, Duration::minutes(8));
        assert_eq!(out.session.end_time, clock.now());
        assert!(lc.status().unwrap().is_none());
        clock.advance(Duration::seconds(1));
        assert_eq!(
            lc.last_status().unwrap().unwrap().state,
            SessionState::Cancelled
        );
    }

    #[test]
    fn test_cancel_paused_clears_pause() {
        let (store, clock) = setup();
        let lc = Lifecycle::new(&store, &clock);
        lc.start(&StartOptions::new(Duration::minutes(25), "a")).unwrap();
        clock.advance(Duration::minutes(5));
        lc.pause().unwrap();
        clock.advance(Duration::minutes(2));

        let out = lc.cancel().unwrap();
        assert!(!out.session.is_paused);
        assert_eq!(out.session.end_time, clock.now());
        assert!(lc.status().unwrap().is_none());
    }

    #[test]
    fn test_break_and_repeat() {
        let (store, clock) = setup();
        let lc = Lifecycle::new(&store, &clock);
        lc.start(&StartOptions::new(Duration::minutes(25), "deep work").with_tags(&["focus"]))
            .unwrap();
        clock.advance(Duration::minutes(25));

        let brk = lc
            .start_break(&BreakOptions {
                duration: Duration::minutes(5),
            })
            .unwrap();
        assert!(brk.was_break);
        assert_eq!(brk.description, BREAK_DESCRIPTION);
        clock.advance(Duration::minutes(5));

        // Repeats the break, the most recent session
        let again = lc.repeat().unwrap();
        assert!(again.was_break);
        assert_eq!(again.duration_sec, 300);
    }

    #[test]
    fn test_status_freezes_while_paused() {
        let (store, clock) = setup();
        let lc = Lifecycle::new(&store, &clock);
        lc.start(&StartOptions::new(Duration::minutes(25), "a")).unwrap();
        clock.advance(Duration::minutes(10));
        lc.pause().unwrap();
        clock.advance(Duration::hours(1));

        let status = lc.status().unwrap().unwrap();
        assert_eq!(status.state, SessionState::Paused);
        assert_eq!(status.elapsed_sec, 600);
        assert_eq!(status.remaining_sec, 900);
    }

    #[test]
    fn test_expired_session_is_completed() {
        let (store, clock) = setup();
        let lc = Lifecycle::new(&store, &clock);
        lc.start(&StartOptions::new(Duration::minutes(25), "a")).unwrap();
        clock.advance(Duration::minutes(30));

        assert!(lc.status().unwrap().is_none());
        assert_eq!(
            lc.last_status().unwrap().unwrap().state,
            SessionState::Completed
        );
    }

    #[test]
    fn test_invalid_input_rejected_before_write() {
        let (store, clock) = setup();
        let lc = Lifecycle::new(&store, &clock);
        assert!(lc.start(&StartOptions::new(Duration::zero(), "a")).is_err());
        assert!(lc
            .start(&StartOptions::new(Duration::minutes(5), "a").with_tags(&["a,b"]))
            .is_err());
        assert!(store.get_last_session().unwrap().is_none());
    }

    /// Hands out a stale, unpaused snapshot from `get_active_session`,
    /// as a second process would see it just before pausing.
    struct StaleActive(MemoryStore);

    impl SessionStore for StaleActive {
        fn create_session(&self, new: &NewSession) -> Result<i64> {
            self.0.create_session(new)
        }
        fn get_active_session(&self, now: &DateTime<Local>) -> Result<Option<Session>> {
            Ok(self.0.get_active_session(now)?.map(|mut s| {
                s.is_paused = false;
                s.paused_at = None;
                s
            }))
        }
        fn get_paused_session(&self) -> Result<Option<Session>> {
            self.0.get_paused_session()
        }
        fn get_last_session(&self) -> Result<Option<Session>> {
            self.0.get_last_session()
        }
        fn get_session(&self, id: i64) -> Result<Option<Session>> {
            self.0.get_session(id)
        }
        fn update_session_end_time(&self, id: i64, end: &DateTime<Local>) -> Result<()> {
            self.0.update_session_end_time(id, end)
        }
        fn pause_session(&self, id: i64, paused_at: &DateTime<Local>) -> Result<()> {
            self.0.pause_session(id, paused_at)
        }
        fn resume_session(
            &self,
            id: i64,
            resumed_at: &DateTime<Local>,
            new_end: &DateTime<Local>,
        ) -> Result<()> {
            self.0.resume_session(id, resumed_at, new_end)
        }
        fn get_sessions_by_date_range(
            &self,
            start: chrono::NaiveDate,
            end: chrono::NaiveDate,
        ) -> Result<Vec<Session>> {
            self.0.get_sessions_by_date_range(start, end)
        }
    }

    #[test]
    fn test_pause_lost_race_reports_already_paused() {
        let store = StaleActive(MemoryStore::new());
        let clock = FixedClock::at(2025, 6, 11, 9, 0, 0);
        let lc = Lifecycle::new(&store, &clock);
        let session = lc.start(&StartOptions::new(Duration::minutes(25), "a")).unwrap();

        clock.advance(Duration::minutes(3));
        let first_pause = clock.now();
        store.0.pause_session(session.id, &first_pause).unwrap();
        clock.advance(Duration::minutes(1));

        match lc.pause().unwrap() {
            PauseOutcome::AlreadyPaused(s) => assert_eq!(s.paused_at, Some(first_pause)),
            other => panic!("expected AlreadyPaused, got {:?}", other),
        }
    }
}
