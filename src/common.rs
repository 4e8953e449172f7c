//! Common utilities shared across modules.
//!
//! Clock abstraction, calendar boundaries and the timestamp encoding used
//! by the session store.

use crate::error::{PomoError, Result};
use chrono::{
    DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveTime, SecondsFormat,
    TimeZone, Utc,
};
use std::path::PathBuf;
use std::sync::Mutex;

/// Gets the application data directory using XDG Base Directory specification.
///
/// Returns `~/.local/share/pomotrack/` on Unix-like systems.
pub fn get_data_dir() -> PathBuf {
    let base_dir = dirs::data_dir().unwrap_or_else(|| {
        // Fallback if dirs crate fails
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".local").join("share")
    });

    base_dir.join("pomotrack")
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        FixedClock {
            now: Mutex::new(now),
        }
    }

    /// Fixed clock at a local wall-clock time.
    ///
    /// # Panics
    ///
    /// Panics if the time does not exist in the local time zone.
    pub fn at(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        let now = Local
            .with_ymd_and_hms(year, month, day, hour, min, sec)
            .earliest()
            .expect("valid local time");
        Self::new(now)
    }

    pub fn set(&self, now: DateTime<Local>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = *guard + by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Local midnight at the start of `date`.
///
/// When DST skips midnight the first existing instant of the day is used.
pub fn local_midnight(date: NaiveDate) -> DateTime<Local> {
    let naive = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => Local
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| Local.from_utc_datetime(&naive)),
    }
}

/// Midnight today
pub fn start_of_day(now: &DateTime<Local>) -> DateTime<Local> {
    local_midnight(now.date_naive())
}

/// Midnight tomorrow
pub fn start_of_next_day(now: &DateTime<Local>) -> DateTime<Local> {
    let date = now.date_naive();
    local_midnight(date.succ_opt().unwrap_or(date))
}

/// Monday 00:00 of the ISO week containing `now`; Sunday belongs to the week before.
pub fn start_of_week(now: &DateTime<Local>) -> DateTime<Local> {
    let date = now.date_naive();
    let offset = date.weekday().num_days_from_monday() as i64;
    local_midnight(date - Duration::days(offset))
}

/// First day of the month at 00:00
pub fn start_of_month(now: &DateTime<Local>) -> DateTime<Local> {
    let date = now.date_naive();
    let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date);
    local_midnight(first)
}

/// First day of the following month at 00:00
pub fn start_of_next_month(now: &DateTime<Local>) -> DateTime<Local> {
    let date = now.date_naive();
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date);
    local_midnight(first)
}

/// Storage encoding: UTC, RFC 3339, millisecond precision, `Z` suffix.
///
/// Fixed width, so string comparison in SQL orders the same as time.
pub fn to_db_timestamp(dt: &DateTime<Local>) -> String {
    dt.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp.
///
/// Also accepts the `YYYY-MM-DD HH:MM:SS[.fff]+HH:MM` layout written by
/// older versions of the history database.
pub fn parse_db_timestamp(raw: &str) -> Result<DateTime<Local>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Local));
    }
    DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z")
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|e| PomoError::invalid_state(format!("bad timestamp '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn local(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, mi, s).earliest().unwrap()
    }

    #[test]
    fn test_get_data_dir() {
        let dir = get_data_dir();
        assert!(dir.to_string_lossy().contains("pomotrack"));
    }

    #[test]
    fn test_week_start_for_wednesday_is_monday() {
        let wednesday = local(2025, 6, 11, 15, 30, 0);
        assert_eq!(wednesday.weekday(), Weekday::Wed);
        let week_start = start_of_week(&wednesday);
        assert_eq!(week_start, local(2025, 6, 9, 0, 0, 0));
        assert_eq!(week_start.weekday(), Weekday::Mon);
    }

    #[test]
    fn test_sunday_belongs_to_previous_week() {
        let sunday = local(2025, 6, 15, 23, 0, 0);
        assert_eq!(start_of_week(&sunday), local(2025, 6, 9, 0, 0, 0));
    }

    #[test]
    fn test_month_boundaries() {
        let now = local(2025, 12, 17, 9, 0, 0);
        assert_eq!(start_of_month(&now), local(2025, 12, 1, 0, 0, 0));
        assert_eq!(start_of_next_month(&now), local(2026, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_day_boundaries() {
        let now = local(2025, 6, 30, 18, 45, 0);
        assert_eq!(start_of_day(&now), local(2025, 6, 30, 0, 0, 0));
        assert_eq!(start_of_next_day(&now), local(2025, 7, 1, 0, 0, 0));
    }

    #[test]
    fn test_db_timestamp_is_fixed_width_utc() {
        let a = to_db_timestamp(&local(2025, 6, 11, 9, 0, 0));
        let b = to_db_timestamp(&local(2025, 6, 11, 10, 0, 0));
        assert!(a.ends_with('Z'));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }

    #[test]
    fn test_db_timestamp_round_trip() {
        let t = local(2025, 6, 11, 9, 15, 42);
        assert_eq!(parse_db_timestamp(&to_db_timestamp(&t)).unwrap(), t);
    }

    #[test]
    fn test_legacy_timestamp_layout() {
        let parsed = parse_db_timestamp("2025-04-19 10:00:00.5+02:00").unwrap();
        assert_eq!(parsed.with_timezone(&Utc).format("%H:%M").to_string(), "08:00");
        assert!(parse_db_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_fixed_clock_advances() {
        let clock = FixedClock::at(2025, 6, 11, 9, 0, 0);
        clock.advance(Duration::minutes(25));
        assert_eq!(clock.now(), local(2025, 6, 11, 9, 25, 0));
    }
}
