//! Goal progress over daily, weekly and monthly periods.
//!
//! The calculators are pure functions of `now`, a target and a session
//! set; [`GoalTracker`] only fetches the sessions and bundles results.

use crate::common::{
    local_midnight, start_of_day, start_of_month, start_of_next_day, start_of_next_month,
    start_of_week, Clock,
};
use crate::config::GoalSettings;
use crate::error::{PomoError, Result};
use crate::models::Session;
use crate::store::SessionStore;
use crate::streak::{analyze_streak, build_history, GoalHistory, StreakInfo, LOOKBACK_DAYS};
use chrono::{DateTime, Duration, Local};
use log::debug;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalKind {
    Daily,
    Weekly,
    Monthly,
}

/// Completion metrics for one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalProgress {
    pub kind: GoalKind,
    pub target: u32,
    pub current: u32,
    /// Capped at 100
    pub percentage: f64,
    pub remaining: u32,
    pub is_complete: bool,
    pub is_over_achieved: bool,
    pub period_start: DateTime<Local>,
    /// Exclusive
    pub period_end: DateTime<Local>,
    pub days_remaining: i64,
    pub average_per_day: f64,
    pub required_per_day: f64,
}

/// Count of work sessions starting in `[from, until)`.
pub fn count_work_sessions(
    sessions: &[Session],
    from: &DateTime<Local>,
    until: &DateTime<Local>,
) -> u32 {
    let count = sessions
        .iter()
        .filter(|s| !s.was_break && s.start_time >= *from && s.start_time < *until)
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Whole days, rounded up, from `now` to `period_end`; never negative.
fn days_until(now: &DateTime<Local>, period_end: &DateTime<Local>) -> i64 {
    let seconds = (*period_end - *now).num_seconds();
    if seconds <= 0 {
        0
    } else {
        (seconds + 86_399) / 86_400
    }
}

/// Calendar days in `[start, end)`, by date so DST days count as one.
fn days_in_period(start: &DateTime<Local>, end: &DateTime<Local>) -> i64 {
    (end.date_naive() - start.date_naive()).num_days().max(1)
}

/// Shared arithmetic for all periods.
///
/// A target of zero is trivially complete: 100 percent, nothing remaining,
/// and over-achieved as soon as one session counts.
pub fn compute_progress(
    kind: GoalKind,
    now: &DateTime<Local>,
    target: u32,
    current: u32,
    period_start: DateTime<Local>,
    period_end: DateTime<Local>,
) -> GoalProgress {
    let percentage = if target == 0 {
        100.0
    } else {
        (f64::from(current) / f64::from(target) * 100.0).min(100.0)
    };
    let is_complete = current >= target;
    let days_remaining = days_until(now, &period_end);
    let days_elapsed = days_in_period(&period_start, &period_end) - days_remaining;
    let average_per_day = f64::from(current) / days_elapsed.max(1) as f64;
    let required_per_day = if days_remaining > 0 && !is_complete {
        f64::from(target - current) / days_remaining as f64
    } else {
        0.0
    };

    GoalProgress {
        kind,
        target,
        current,
        percentage,
        remaining: target.saturating_sub(current),
        is_complete,
        is_over_achieved: current > target,
        period_start,
        period_end,
        days_remaining,
        average_per_day,
        required_per_day,
    }
}

/// Sessions starting today, midnight to midnight.
pub fn daily_progress(now: &DateTime<Local>, target: u32, sessions: &[Session]) -> GoalProgress {
    let start = start_of_day(now);
    let end = start_of_next_day(now);
    let current = count_work_sessions(sessions, &start, &end);
    compute_progress(GoalKind::Daily, now, target, current, start, end)
}

/// Sessions from Monday 00:00 up to `now`.
pub fn weekly_progress(now: &DateTime<Local>, target: u32, sessions: &[Session]) -> GoalProgress {
    let start = start_of_week(now);
    let end = local_midnight(start.date_naive() + Duration::days(7));
    let current = count_work_sessions(sessions, &start, now);
    compute_progress(GoalKind::Weekly, now, target, current, start, end)
}

/// Sessions from the first of the month up to `now`.
pub fn monthly_progress(now: &DateTime<Local>, target: u32, sessions: &[Session]) -> GoalProgress {
    let start = start_of_month(now);
    let end = start_of_next_month(now);
    let current = count_work_sessions(sessions, &start, now);
    compute_progress(GoalKind::Monthly, now, target, current, start, end)
}

/// Everything the goals view shows, computed from one consistent read.
#[derive(Debug, Clone, Serialize)]
pub struct GoalDashboard {
    pub daily: GoalProgress,
    pub weekly: GoalProgress,
    pub monthly: GoalProgress,
    pub streak: StreakInfo,
    pub history: GoalHistory,
}

/// Reads sessions through the store and applies the configured targets.
pub struct GoalTracker<'a, S: SessionStore + ?Sized, C: Clock + ?Sized> {
    store: &'a S,
    clock: &'a C,
    settings: GoalSettings,
}

impl<'a, S: SessionStore + ?Sized, C: Clock + ?Sized> GoalTracker<'a, S, C> {
    pub fn new(store: &'a S, clock: &'a C, settings: GoalSettings) -> Self {
        GoalTracker {
            store,
            clock,
            settings,
        }
    }

    pub fn daily(&self) -> Result<GoalProgress> {
        let now = self.clock.now();
        let sessions = self.store.get_today_sessions(&now)?;
        Ok(daily_progress(&now, self.settings.daily_count, &sessions))
    }

    pub fn weekly(&self) -> Result<GoalProgress> {
        let now = self.clock.now();
        let sessions = self.sessions_since(&start_of_week(&now), &now)?;
        Ok(weekly_progress(&now, self.settings.weekly_count, &sessions))
    }

    pub fn monthly(&self) -> Result<GoalProgress> {
        let now = self.clock.now();
        let sessions = self.sessions_since(&start_of_month(&now), &now)?;
        Ok(monthly_progress(
            &now,
            self.settings.monthly_count(),
            &sessions,
        ))
    }

    pub fn streak(&self) -> Result<StreakInfo> {
        let now = self.clock.now();
        let sessions = self.last_days(&now, LOOKBACK_DAYS)?;
        Ok(analyze_streak(&now, &sessions))
    }

    /// Per-day results for the last `days` days, oldest first.
    pub fn history(&self, days: u32) -> Result<GoalHistory> {
        if days == 0 {
            return Err(PomoError::validation("history needs at least one day"));
        }
        let now = self.clock.now();
        let sessions = self.last_days(&now, days)?;
        Ok(build_history(
            &now,
            days,
            self.settings.daily_count,
            &sessions,
        ))
    }

    /// All goal views at the same instant. Any failed read fails the whole call.
    pub fn dashboard(&self, history_days: u32) -> Result<GoalDashboard> {
        if history_days == 0 {
            return Err(PomoError::validation("history needs at least one day"));
        }
        let now = self.clock.now();
        // Month-to-date reaches back at most 31 days
        let window = history_days.max(LOOKBACK_DAYS + 1);
        let sessions = self.last_days(&now, window)?;
        debug!(
            "Goal dashboard over {} sessions in the last {} days",
            sessions.len(),
            window
        );

        Ok(GoalDashboard {
            daily: daily_progress(&now, self.settings.daily_count, &sessions),
            weekly: weekly_progress(&now, self.settings.weekly_count, &sessions),
            monthly: monthly_progress(&now, self.settings.monthly_count(), &sessions),
            streak: analyze_streak(&now, &sessions),
            history: build_history(&now, history_days, self.settings.daily_count, &sessions),
        })
    }

    fn sessions_since(&self, from: &DateTime<Local>, now: &DateTime<Local>) -> Result<Vec<Session>> {
        self.store
            .get_sessions_by_date_range(from.date_naive(), now.date_naive())
    }

    /// Today and the `days - 1` days before it.
    fn last_days(&self, now: &DateTime<Local>, days: u32) -> Result<Vec<Session>> {
        let today = now.date_naive();
        let first = today - Duration::days(i64::from(days.max(1)) - 1);
        self.store.get_sessions_by_date_range(first, today)
    }
}
