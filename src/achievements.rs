//! Achievement detection over a goal dashboard.
//!
//! Only detection lives here. Showing or announcing an achievement is up to
//! the caller.

use crate::goals::GoalDashboard;
use serde::Serialize;

/// Streak lengths worth celebrating.
///
/// Streaks are counted inside the [`LOOKBACK_DAYS`](crate::streak::LOOKBACK_DAYS)
/// window, so the milestones past 30 days cannot fire until that window
/// grows.
pub const STREAK_MILESTONES: [u32; 9] = [3, 7, 14, 21, 30, 60, 90, 180, 365];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Achievement {
    DailyGoal { target: u32 },
    OverAchiever { extra: u32 },
    WeeklyGoal { target: u32 },
    MonthlyGoal { target: u32 },
    StreakMilestone { days: u32 },
    PersonalBest { count: u32 },
}

impl Achievement {
    pub fn icon(&self) -> &'static str {
        match self {
            Achievement::DailyGoal { .. } => "🎯",
            Achievement::OverAchiever { .. } => "💎",
            Achievement::WeeklyGoal { .. } => "🏆",
            Achievement::MonthlyGoal { .. } => "🚀",
            Achievement::StreakMilestone { .. } => "🔥",
            Achievement::PersonalBest { .. } => "🌟",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Achievement::DailyGoal { .. } => "Daily Goal Complete!",
            Achievement::OverAchiever { .. } => "Overachiever!",
            Achievement::WeeklyGoal { .. } => "Weekly Goal Achieved!",
            Achievement::MonthlyGoal { .. } => "Monthly Goal Crushed!",
            Achievement::StreakMilestone { days } if *days >= 30 => "Legendary Streak!",
            Achievement::StreakMilestone { days } if *days >= 14 => "Two Week Streak!",
            Achievement::StreakMilestone { days } if *days >= 7 => "Week Streak!",
            Achievement::StreakMilestone { .. } => "Streak Building!",
            Achievement::PersonalBest { .. } => "Personal Best!",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Achievement::DailyGoal { target } => {
                format!("You've completed your daily goal of {} pomodoros.", target)
            }
            Achievement::OverAchiever { extra } => {
                format!("You've exceeded your daily goal by {} extra pomodoros.", extra)
            }
            Achievement::WeeklyGoal { target } => {
                format!("You've reached your weekly target of {} pomodoros.", target)
            }
            Achievement::MonthlyGoal { target } => {
                format!("You've completed {} pomodoros this month.", target)
            }
            Achievement::StreakMilestone { days } => format!("{} days in a row.", days),
            Achievement::PersonalBest { count } => {
                format!("New record: {} pomodoros in a single day.", count)
            }
        }
    }
}

pub fn is_streak_milestone(days: u32) -> bool {
    STREAK_MILESTONES.contains(&days)
}

/// Everything the dashboard currently qualifies for.
///
/// An over-achieved day reports [`Achievement::OverAchiever`] in place of
/// the plain daily goal.
pub fn detect(dashboard: &GoalDashboard) -> Vec<Achievement> {
    let mut found = Vec::new();
    let daily = &dashboard.daily;

    if daily.is_over_achieved {
        found.push(Achievement::OverAchiever {
            extra: daily.current - daily.target,
        });
    } else if daily.is_complete {
        found.push(Achievement::DailyGoal {
            target: daily.target,
        });
    }

    if dashboard.weekly.is_complete {
        found.push(Achievement::WeeklyGoal {
            target: dashboard.weekly.target,
        });
    }
    if dashboard.monthly.is_complete {
        found.push(Achievement::MonthlyGoal {
            target: dashboard.monthly.target,
        });
    }

    let streak = dashboard.streak.current;
    if streak > 0 && is_streak_milestone(streak) {
        found.push(Achievement::StreakMilestone { days: streak });
    }

    let today = daily.period_start.date_naive();
    let best_other_day = dashboard
        .history
        .entries
        .iter()
        .filter(|e| e.date != today)
        .map(|e| e.pomodoro_count)
        .max()
        .unwrap_or(0);
    if daily.current > 0 && daily.current > best_other_day {
        found.push(Achievement::PersonalBest {
            count: daily.current,
        });
    }

    found
}
