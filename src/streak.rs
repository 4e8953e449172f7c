//! Streaks and per-day goal history.

use crate::common::start_of_day;
use crate::models::Session;
use chrono::{DateTime, Duration, Local, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

/// Days scanned for streaks, today included.
pub const LOOKBACK_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakInfo {
    /// Consecutive active days ending today
    pub current: u32,
    /// Longest run of active days inside the lookback window
    pub best: u32,
    pub last_active: Option<DateTime<Local>>,
    pub is_active_today: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalHistoryEntry {
    pub date: NaiveDate,
    pub pomodoro_count: u32,
    pub break_count: u32,
    /// Sum of planned durations, in seconds
    pub total_duration_sec: i64,
    pub goal_met: bool,
    pub goal_target: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalHistory {
    /// Oldest first
    pub entries: Vec<GoalHistoryEntry>,
    pub days_met: u32,
    pub success_rate: f64,
}

/// The `days` dates ending at `today`, oldest first.
fn window(today: NaiveDate, days: u32) -> impl Iterator<Item = NaiveDate> {
    (0..i64::from(days))
        .rev()
        .map(move |back| today - Duration::days(back))
}

fn work_counts_by_day(sessions: &[Session]) -> HashMap<NaiveDate, u32> {
    let mut counts = HashMap::new();
    for session in sessions.iter().filter(|s| !s.was_break) {
        *counts.entry(session.start_time.date_naive()).or_insert(0) += 1;
    }
    counts
}

/// Current streak, best streak and last activity over the lookback window.
///
/// A day counts when it has at least one work session. The current streak
/// starts at today, so a quiet today means a current streak of zero.
pub fn analyze_streak(now: &DateTime<Local>, sessions: &[Session]) -> StreakInfo {
    let today = now.date_naive();
    let counts = work_counts_by_day(sessions);
    let days: Vec<NaiveDate> = window(today, LOOKBACK_DAYS).collect();
    let active = |d: &NaiveDate| counts.get(d).copied().unwrap_or(0) > 0;

    let current = days.iter().rev().take_while(|d| active(d)).count() as u32;

    let mut best = 0;
    let mut run = 0;
    for day in &days {
        if active(day) {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }

    let oldest = days.first().copied().unwrap_or(today);
    let last_active = sessions
        .iter()
        .filter(|s| !s.was_break && s.start_time.date_naive() >= oldest)
        .filter(|s| s.start_time.date_naive() <= today)
        .map(|s| s.start_time)
        .max();
    let midnight = start_of_day(now);

    StreakInfo {
        current,
        best,
        is_active_today: last_active.map_or(false, |t| t >= midnight),
        last_active,
    }
}

/// Per-day counts and goal attainment for the last `days` days.
pub fn build_history(
    now: &DateTime<Local>,
    days: u32,
    daily_target: u32,
    sessions: &[Session],
) -> GoalHistory {
    let mut by_day: HashMap<NaiveDate, (u32, u32, i64)> = HashMap::new();
    for session in sessions {
        let entry = by_day
            .entry(session.start_time.date_naive())
            .or_insert((0, 0, 0));
        if session.was_break {
            entry.1 += 1;
        } else {
            entry.0 += 1;
        }
        entry.2 += session.duration_sec;
    }

    let entries: Vec<GoalHistoryEntry> = window(now.date_naive(), days)
        .map(|date| {
            let (pomodoro_count, break_count, total_duration_sec) =
                by_day.get(&date).copied().unwrap_or((0, 0, 0));
            GoalHistoryEntry {
                date,
                pomodoro_count,
                break_count,
                total_duration_sec,
                goal_met: pomodoro_count >= daily_target,
                goal_target: daily_target,
            }
        })
        .collect();

    let days_met = entries.iter().filter(|e| e.goal_met).count() as u32;
    let success_rate = if entries.is_empty() {
        0.0
    } else {
        f64::from(days_met) / entries.len() as f64
    };

    GoalHistory {
        entries,
        days_met,
        success_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(m: u32, d: u32, h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, m, d, h, 0, 0).earliest().unwrap()
    }

    fn session(start: DateTime<Local>, was_break: bool) -> Session {
        Session {
            id: 0,
            start_time: start,
            end_time: start + Duration::minutes(25),
            description: String::new(),
            duration_sec: if was_break { 300 } else { 1500 },
            tags: vec![],
            was_break,
            is_paused: false,
            paused_at: None,
            total_paused_duration_sec: 0,
        }
    }

    #[test]
    fn test_three_day_streak() {
        let now = at(6, 20, 18);
        let sessions = vec![
            session(at(6, 20, 9), false),
            session(at(6, 19, 9), false),
            session(at(6, 18, 9), false),
            session(at(6, 16, 9), false),
        ];
        let info = analyze_streak(&now, &sessions);
        assert_eq!(info.current, 3);
        assert_eq!(info.best, 3);
        assert!(info.is_active_today);
        assert_eq!(info.last_active, Some(at(6, 20, 9)));
    }

    #[test]
    fn test_quiet_today_breaks_current_streak() {
        let now = at(6, 20, 18);
        let sessions = vec![session(at(6, 19, 9), false), session(at(6, 18, 9), false)];
        let info = analyze_streak(&now, &sessions);
        assert_eq!(info.current, 0);
        assert_eq!(info.best, 2);
        assert!(!info.is_active_today);
    }

    #[test]
    fn test_breaks_do_not_extend_streaks() {
        let now = at(6, 20, 18);
        let sessions = vec![session(at(6, 20, 9), true)];
        let info = analyze_streak(&now, &sessions);
        assert_eq!(info.current, 0);
        assert!(info.last_active.is_none());
    }

    #[test]
    fn test_best_streak_bounded_by_window() {
        let now = at(6, 30, 18);
        // Daily sessions for 40 days straight, then nothing today
        let sessions: Vec<Session> = (1..=40)
            .map(|back| session(at(6, 30, 9) - Duration::days(back), false))
            .collect();
        let info = analyze_streak(&now, &sessions);
        assert_eq!(info.current, 0);
        assert_eq!(info.best, LOOKBACK_DAYS - 1);
    }

    #[test]
    fn test_history_oldest_first() {
        let now = at(6, 11, 18);
        let mut sessions: Vec<Session> = (0..8).map(|i| session(at(6, 11, 8 + i), false)).collect();
        sessions.push(session(at(6, 11, 17), true));
        sessions.push(session(at(6, 10, 9), false));

        let history = build_history(&now, 3, 8, &sessions);
        let dates: Vec<_> = history.entries.iter().map(|e| e.date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2025, 6, 9).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 11).unwrap(),
            ]
        );

        let today = &history.entries[2];
        assert_eq!(today.pomodoro_count, 8);
        assert_eq!(today.break_count, 1);
        assert_eq!(today.total_duration_sec, 8 * 1500 + 300);
        assert!(today.goal_met);
        assert!(!history.entries[1].goal_met);
        assert_eq!(history.days_met, 1);
        assert!((history.success_rate - 1.0 / 3.0).abs() < 1e-9);
    }
}
