//! Display formatting module.
//!
//! Plain-text rendering of sessions, status lines and goal views. Nothing
//! here touches the store.

use crate::achievements::Achievement;
use crate::goals::{GoalKind, GoalProgress};
use crate::models::{Session, SessionState, SessionStatus};
use crate::streak::{GoalHistory, StreakInfo};
use crate::utils::{encode_tags_csv, format_duration, format_duration_long};
use chrono::{DateTime, Duration, Local};

pub const DEFAULT_STATUS_FORMAT: &str = "%r remaining for %d";
const BAR_WIDTH: usize = 20;

/// ANSI color codes for terminal output.
pub struct Colors;

impl Colors {
    /// Check if colors are enabled (respects NO_COLOR env var)
    pub fn enabled() -> bool {
        std::env::var("NO_COLOR").is_err()
    }

    /// Get a color code, or empty string if colors are disabled
    fn get(code: &'static str) -> &'static str {
        if Self::enabled() {
            code
        } else {
            ""
        }
    }

    pub fn reset() -> &'static str {
        Self::get("\x1b[0m")
    }
    pub fn bold() -> &'static str {
        Self::get("\x1b[1m")
    }
    pub fn red() -> &'static str {
        Self::get("\x1b[31m")
    }
    pub fn green() -> &'static str {
        Self::get("\x1b[32m")
    }
    pub fn yellow() -> &'static str {
        Self::get("\x1b[33m")
    }
    pub fn cyan() -> &'static str {
        Self::get("\x1b[36m")
    }
    pub fn gray() -> &'static str {
        Self::get("\x1b[90m")
    }
}

/// `[=====>----]` style bar for a percentage.
pub fn progress_bar(percentage: f64, width: usize) -> String {
    let filled = ((percentage.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    let empty = width - filled;

    format!(
        "[{}{}{}]",
        "=".repeat(filled),
        if filled < width { ">" } else { "" },
        "-".repeat(empty.saturating_sub(if filled < width { 1 } else { 0 }))
    )
}

/// Copy `format` through, replacing `%x` with `expand(x)` wherever that
/// returns something. Unknown placeholders are left as typed.
fn expand_placeholders(format: &str, expand: impl Fn(char) -> Option<String>) -> String {
    let mut out = String::with_capacity(format.len() + 16);
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek().copied().and_then(&expand) {
            Some(value) => {
                out.push_str(&value);
                chars.next();
            }
            None => out.push('%'),
        }
    }

    out
}

/// Expand the status placeholders.
///
/// `%d` description, `%r` remaining (MM:SS), `%p` progress percentage,
/// `%t` tags, `%e` end time (HH:MM:SS). Anything else is copied through.
pub fn format_status(format: &str, status: &SessionStatus) -> String {
    expand_placeholders(format, |c| match c {
        'd' => Some(status.session.description.clone()),
        'r' => Some(format_duration(Duration::seconds(status.remaining_sec))),
        'p' => Some(format!("{:.1}%", status.progress_percent)),
        't' => Some(encode_tags_csv(&status.session.tags)),
        'e' => Some(status.session.end_time.format("%H:%M:%S").to_string()),
        _ => None,
    })
}

/// Expand the history row placeholders for one session as of `now`.
///
/// `%s` start (YYYY-MM-DD HH:MM), `%k` kind (work or break), `%d`
/// description, `%D` planned length, `%a` time actually worked, `%S`
/// state, `%t` tags.
pub fn format_session(format: &str, session: &Session, now: &DateTime<Local>) -> String {
    expand_placeholders(format, |c| match c {
        's' => Some(session.start_time.format("%Y-%m-%d %H:%M").to_string()),
        'k' => Some(if session.was_break { "break" } else { "work" }.to_string()),
        'd' => Some(session.description.clone()),
        'D' => Some(format_duration_long(session.planned_duration())),
        'a' => Some(format_duration_long(session.worked_duration(now))),
        'S' => Some(state_label(session.state_at(now)).to_string()),
        't' => Some(encode_tags_csv(&session.tags)),
        _ => None,
    })
}

fn state_label(state: SessionState) -> &'static str {
    match state {
        SessionState::Running => "running",
        SessionState::Paused => "paused",
        SessionState::Completed => "completed",
        SessionState::Cancelled => "cancelled",
    }
}

/// One-line live view used by the progress ticker.
pub fn format_progress_line(status: &SessionStatus) -> String {
    let kind = if status.session.was_break {
        "☕"
    } else {
        "🍅"
    };
    let paused = if status.state == SessionState::Paused {
        format!(" {}(paused){}", Colors::yellow(), Colors::reset())
    } else {
        String::new()
    };

    format!(
        "{} {} {}{}{} {:>5.1}% {}{}",
        kind,
        progress_bar(status.progress_percent, BAR_WIDTH),
        Colors::bold(),
        format_duration(Duration::seconds(status.remaining_sec)),
        Colors::reset(),
        status.progress_percent,
        status.session.description,
        paused
    )
}

/// History listing row.
pub fn format_session_row(session: &Session) -> String {
    let kind = if session.was_break { "break" } else { "work " };
    let tags = if session.tags.is_empty() {
        String::new()
    } else {
        format!(" {}[{}]{}", Colors::gray(), session.tags.join(", "), Colors::reset())
    };

    format!(
        "{}  {}-{}  {}  {:>9}  {}{}",
        session.start_time.format("%Y-%m-%d"),
        session.start_time.format("%H:%M"),
        session.end_time.format("%H:%M"),
        kind,
        format_duration_long(session.planned_duration()),
        session.description,
        tags
    )
}

/// Totals line printed under the history listing.
pub fn format_history_summary(sessions: &[Session]) -> String {
    let breaks = sessions.iter().filter(|s| s.was_break).count();
    let total = sessions
        .iter()
        .fold(Duration::zero(), |acc, s| acc + s.planned_duration());
    format!(
        "Total sessions: {} ({} pomodoros, {} breaks), {} planned",
        sessions.len(),
        sessions.len() - breaks,
        breaks,
        format_duration_long(total)
    )
}

pub fn format_status_summary(status: &SessionStatus) -> String {
    format!(
        "{} '{}': {} elapsed, {} remaining ({:.1}%)",
        state_label(status.state),
        status.session.description,
        format_duration_long(Duration::seconds(status.elapsed_sec)),
        format_duration_long(Duration::seconds(status.remaining_sec)),
        status.progress_percent
    )
}

pub fn format_goal_progress(progress: &GoalProgress) -> String {
    let label = match progress.kind {
        GoalKind::Daily => "Daily",
        GoalKind::Weekly => "Weekly",
        GoalKind::Monthly => "Monthly",
    };
    let color = if progress.is_complete {
        Colors::green()
    } else if progress.percentage >= 50.0 {
        Colors::yellow()
    } else {
        Colors::red()
    };

    let mut line = format!(
        "{:<8} {}{}{} {}/{} ({:.1}%)",
        label,
        color,
        progress_bar(progress.percentage, BAR_WIDTH),
        Colors::reset(),
        progress.current,
        progress.target,
        progress.percentage
    );
    if progress.is_over_achieved {
        line.push_str(&format!(" +{} over", progress.current - progress.target));
    } else if !progress.is_complete && progress.kind != GoalKind::Daily {
        line.push_str(&format!(
            ", {:.1}/day needed over {} day(s)",
            progress.required_per_day, progress.days_remaining
        ));
    }
    line
}

pub fn format_streak(streak: &StreakInfo) -> String {
    let last = match streak.last_active {
        Some(t) => t.format("%Y-%m-%d %H:%M").to_string(),
        None => "never".to_string(),
    };
    format!(
        "{}Streak:{} {} day(s) current, {} best, last active {}{}",
        Colors::cyan(),
        Colors::reset(),
        streak.current,
        streak.best,
        last,
        if streak.is_active_today { " (today)" } else { "" }
    )
}

pub fn format_history(history: &GoalHistory) -> Vec<String> {
    let mut lines: Vec<String> = history
        .entries
        .iter()
        .map(|e| {
            format!(
                "{}  {} {:>2}/{:<2} {:>2} break(s)  {}",
                e.date.format("%a %Y-%m-%d"),
                if e.goal_met { "✓" } else { "·" },
                e.pomodoro_count,
                e.goal_target,
                e.break_count,
                format_duration_long(Duration::seconds(e.total_duration_sec))
            )
        })
        .collect();
    lines.push(format!(
        "Goal met on {} of {} day(s) ({:.0}%)",
        history.days_met,
        history.entries.len(),
        history.success_rate * 100.0
    ));
    lines
}

pub fn format_achievement(achievement: &Achievement) -> String {
    format!(
        "{} {}{}{} {}",
        achievement.icon(),
        Colors::bold(),
        achievement.title(),
        Colors::reset(),
        achievement.message()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 11, h, m, 0).earliest().unwrap()
    }

    fn status(now: DateTime<Local>) -> SessionStatus {
        let session = Session {
            id: 1,
            start_time: at(9, 0),
            end_time: at(9, 25),
            description: "write docs".to_string(),
            duration_sec: 1500,
            tags: vec!["docs".to_string(), "q2".to_string()],
            was_break: false,
            is_paused: false,
            paused_at: None,
            total_paused_duration_sec: 0,
        };
        SessionStatus::at(session, &now)
    }

    #[test]
    fn test_default_format() {
        let s = status(at(9, 5));
        assert_eq!(
            format_status(DEFAULT_STATUS_FORMAT, &s),
            "20:00 remaining for write docs"
        );
    }

    #[test]
    fn test_all_placeholders() {
        let s = status(at(9, 5));
        assert_eq!(
            format_status("%d|%r|%p|%t|%e|%x|100%", &s),
            "write docs|20:00|20.0%|docs,q2|09:25:00|%x|100%"
        );
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.0, 4), "[>---]");
        assert_eq!(progress_bar(50.0, 4), "[==>-]");
        assert_eq!(progress_bar(100.0, 4), "[====]");
        assert_eq!(progress_bar(250.0, 4), "[====]");
    }

    #[test]
    fn test_session_row_mentions_tags() {
        let s = status(at(9, 5));
        let row = format_session_row(&s.session);
        assert!(row.contains("2025-06-11"));
        assert!(row.contains("09:00-09:25"));
        assert!(row.contains("25m 00s"));
        assert!(row.contains("docs, q2"));
    }

    #[test]
    fn test_status_summary() {
        let s = status(at(9, 5));
        assert_eq!(
            format_status_summary(&s),
            "running 'write docs': 5m 00s elapsed, 20m 00s remaining (20.0%)"
        );
    }

    #[test]
    fn test_session_placeholders() {
        let s = status(at(9, 5));
        assert_eq!(
            format_session("%s %k %d (%D, %a %S) [%t] %z", &s.session, &at(9, 5)),
            "2025-06-11 09:00 work write docs (25m 00s, 5m 00s running) [docs,q2] %z"
        );
        assert_eq!(
            format_session("%S", &s.session, &at(10, 0)),
            "completed"
        );
    }

    #[test]
    fn test_history_summary_counts_kinds() {
        let work = status(at(9, 5)).session;
        let mut rest = work.clone();
        rest.was_break = true;
        rest.duration_sec = 300;
        let line = format_history_summary(&[work.clone(), rest, work]);
        assert!(line.starts_with("Total sessions: 3 (2 pomodoros, 1 breaks)"));
        assert!(line.contains("planned"));
    }
}
