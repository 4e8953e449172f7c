use crate::common::{parse_db_timestamp, to_db_timestamp};
use crate::config::{Config, DatabaseConfig};
use crate::error::{PomoError, Result};
use crate::migrations::MigrationRunner;
use crate::models::{NewSession, Session};
use crate::retry::{retry_if_retryable, retry_with_backoff, RetryConfig};
use crate::store::{day_range_bounds, pause_increment, SessionStore};
use crate::utils::{decode_tags_csv, encode_tags_csv};
use chrono::{DateTime, Local, NaiveDate};
use log::debug;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const SESSION_COLUMNS: &str = "id, start_time, end_time, description, duration_secs, tags_csv, \
     was_break, is_paused, paused_at, total_paused_duration";

type DbPool = Pool<SqliteConnectionManager>;
type DbConnection = PooledConnection<SqliteConnectionManager>;

/// SQLite-backed session history.
///
/// Many short-lived processes may open the same file; WAL lets readers run
/// alongside the single writer and every write goes through
/// [`retry_if_retryable`].
pub struct SqliteStore {
    path: PathBuf,
    pool: Arc<DbPool>,
    retry: RetryConfig,
}

/// A row as stored, before timestamps and tags are decoded.
struct RawSession {
    id: i64,
    start_time: String,
    end_time: String,
    description: Option<String>,
    duration_secs: i64,
    tags_csv: Option<String>,
    was_break: bool,
    is_paused: bool,
    paused_at: Option<String>,
    total_paused_duration: i64,
}

impl RawSession {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(RawSession {
            id: row.get(0)?,
            start_time: row.get(1)?,
            end_time: row.get(2)?,
            description: row.get(3)?,
            duration_secs: row.get(4)?,
            tags_csv: row.get(5)?,
            was_break: row.get(6)?,
            is_paused: row.get(7)?,
            paused_at: row.get(8)?,
            total_paused_duration: row.get(9)?,
        })
    }

    fn into_session(self) -> Result<Session> {
        Ok(Session {
            id: self.id,
            start_time: parse_db_timestamp(&self.start_time)?,
            end_time: parse_db_timestamp(&self.end_time)?,
            description: self.description.unwrap_or_default(),
            duration_sec: self.duration_secs,
            tags: decode_tags_csv(self.tags_csv.as_deref().unwrap_or_default()),
            was_break: self.was_break,
            is_paused: self.is_paused,
            paused_at: self
                .paused_at
                .as_deref()
                .map(parse_db_timestamp)
                .transpose()?,
            total_paused_duration_sec: self.total_paused_duration,
        })
    }
}

impl SqliteStore {
    /// Open the store named by the configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::open(
            &config.database_path(),
            &config.database,
            RetryConfig::from(&config.retry.db_ops),
        )
    }

    /// Open (creating if needed) and migrate the database at `db_path`.
    pub fn open(db_path: &Path, settings: &DatabaseConfig, retry: RetryConfig) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PomoError::unavailable(format!(
                    "failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let busy_timeout_ms = settings.busy_timeout_ms;
        let manager = SqliteConnectionManager::file(db_path).with_init(move |conn| {
            // busy_timeout first so the WAL switch waits out other openers
            conn.pragma_update(None, "busy_timeout", busy_timeout_ms)?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(settings.max_connections.max(1))
            .connection_timeout(Duration::from_millis(u64::from(busy_timeout_ms).max(250)))
            .build(manager)
            .map_err(|e| {
                PomoError::unavailable(format!("failed to open {}: {}", db_path.display(), e))
            })?;

        let store = SqliteStore {
            path: db_path.to_path_buf(),
            pool: Arc::new(pool),
            retry,
        };

        // Another process may be migrating the same file
        retry_with_backoff(&store.retry, || store.run_migrations())?;

        debug!("Opened session store at {}", store.path.display());
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.get_connection()?;
        let mut runner = MigrationRunner::new(&mut conn).map_err(migration_error)?;
        let applied = runner.migrate().map_err(migration_error)?;
        if applied > 0 {
            debug!(
                "Applied {} migration(s) to {}, schema now v{}",
                applied,
                self.path.display(),
                runner.latest_version()
            );
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current schema version of the open database
    pub fn schema_version(&self) -> Result<u32> {
        let mut conn = self.get_connection()?;
        let runner = MigrationRunner::new(&mut conn)?;
        Ok(runner.current_version()?)
    }

    pub fn is_healthy(&self) -> bool {
        match self.get_connection() {
            Ok(conn) => conn
                .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .is_ok(),
            Err(_) => false,
        }
    }

    fn get_connection(&self) -> Result<DbConnection> {
        retry_if_retryable(&self.retry, || Ok(self.pool.get()?))
    }

    fn query_one(&self, sql: &str, params: impl rusqlite::Params) -> Result<Option<Session>> {
        let conn = self.get_connection()?;
        let raw = conn
            .query_row(sql, params, RawSession::from_row)
            .optional()?;
        raw.map(RawSession::into_session).transpose()
    }

    fn session_exists(&self, id: i64) -> Result<bool> {
        let conn = self.get_connection()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM pomodoros WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn missing(id: i64) -> PomoError {
        PomoError::not_found(format!("no session with id {}", id))
    }
}

/// Busy failures stay retryable; anything else means the store cannot be used.
fn migration_error(e: rusqlite::Error) -> PomoError {
    let err = PomoError::Database(e);
    if err.is_busy() {
        err
    } else {
        PomoError::unavailable(format!("migration failed: {}", err))
    }
}

impl SessionStore for SqliteStore {
    fn create_session(&self, new: &NewSession) -> Result<i64> {
        let start = to_db_timestamp(&new.start_time);
        let end = to_db_timestamp(&new.end_time);
        let tags = encode_tags_csv(&new.tags);

        let id = retry_if_retryable(&self.retry, || {
            let conn = self.get_connection()?;
            conn.execute(
                "INSERT INTO pomodoros (start_time, end_time, description, duration_secs, tags_csv, was_break)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![start, end, new.description, new.duration_sec, tags, new.was_break],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        debug!("Created session {} ({} -> {})", id, start, end);
        Ok(id)
    }

    fn get_active_session(&self, now: &DateTime<Local>) -> Result<Option<Session>> {
        self.query_one(
            &format!(
                "SELECT {} FROM pomodoros
                 WHERE is_paused = 1 OR (is_paused = 0 AND end_time > ?1)
                 ORDER BY start_time DESC, id DESC LIMIT 1",
                SESSION_COLUMNS
            ),
            params![to_db_timestamp(now)],
        )
    }

    fn get_paused_session(&self) -> Result<Option<Session>> {
        self.query_one(
            &format!(
                "SELECT {} FROM pomodoros WHERE is_paused = 1
                 ORDER BY start_time DESC, id DESC LIMIT 1",
                SESSION_COLUMNS
            ),
            [],
        )
    }

    fn get_last_session(&self) -> Result<Option<Session>> {
        self.query_one(
            &format!(
                "SELECT {} FROM pomodoros ORDER BY start_time DESC, id DESC LIMIT 1",
                SESSION_COLUMNS
            ),
            [],
        )
    }

    fn get_session(&self, id: i64) -> Result<Option<Session>> {
        self.query_one(
            &format!("SELECT {} FROM pomodoros WHERE id = ?1", SESSION_COLUMNS),
            params![id],
        )
    }

    fn update_session_end_time(&self, id: i64, end: &DateTime<Local>) -> Result<()> {
        let end = to_db_timestamp(end);
        let changed = retry_if_retryable(&self.retry, || {
            let conn = self.get_connection()?;
            Ok(conn.execute(
                "UPDATE pomodoros SET end_time = ?1 WHERE id = ?2",
                params![end, id],
            )?)
        })?;

        if changed == 0 {
            return Err(Self::missing(id));
        }
        debug!("Session {} end time set to {}", id, end);
        Ok(())
    }

    fn pause_session(&self, id: i64, paused_at: &DateTime<Local>) -> Result<()> {
        let paused = to_db_timestamp(paused_at);
        let changed = retry_if_retryable(&self.retry, || {
            let conn = self.get_connection()?;
            Ok(conn.execute(
                "UPDATE pomodoros SET is_paused = 1, paused_at = ?1
                 WHERE id = ?2 AND is_paused = 0",
                params![paused, id],
            )?)
        })?;

        if changed == 0 {
            return Err(if self.session_exists(id)? {
                PomoError::invalid_state(format!("session {} is already paused", id))
            } else {
                Self::missing(id)
            });
        }
        debug!("Session {} paused at {}", id, paused);
        Ok(())
    }

    fn resume_session(
        &self,
        id: i64,
        resumed_at: &DateTime<Local>,
        new_end: &DateTime<Local>,
    ) -> Result<()> {
        let end = to_db_timestamp(new_end);

        // Read and write under one write lock so concurrent resumes of the
        // same session cannot both add their pause interval.
        let added = retry_if_retryable(&self.retry, || {
            let mut conn = self.get_connection()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let row: Option<(Option<String>, i64)> = tx
                .query_row(
                    "SELECT paused_at, total_paused_duration FROM pomodoros WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let (paused_raw, total) = row.ok_or_else(|| Self::missing(id))?;
            let paused_at = paused_raw.as_deref().map(parse_db_timestamp).transpose()?;
            let paused_at = paused_at.ok_or_else(|| {
                PomoError::invalid_state(format!("session {} has no pause timestamp", id))
            })?;

            let added = pause_increment(&paused_at, resumed_at);
            tx.execute(
                "UPDATE pomodoros
                 SET total_paused_duration = ?1, paused_at = NULL, is_paused = 0, end_time = ?2
                 WHERE id = ?3",
                params![total + added, end, id],
            )?;
            tx.commit()?;
            Ok(added)
        })?;

        debug!("Session {} resumed after {}s, ends {}", id, added, end);
        Ok(())
    }

    fn get_sessions_by_date_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Session>> {
        let (from, to) = day_range_bounds(start, end);
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM pomodoros
             WHERE start_time >= ?1 AND start_time < ?2
             ORDER BY start_time DESC, id DESC",
            SESSION_COLUMNS
        ))?;

        let raws = stmt
            .query_map(
                params![to_db_timestamp(&from), to_db_timestamp(&to)],
                RawSession::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raws.into_iter().map(RawSession::into_session).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use rusqlite::Connection;
    use tempfile::TempDir;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, d, h, m, 0).earliest().unwrap()
    }

    fn open(dir: &TempDir) -> SqliteStore {
        SqliteStore::open(
            &dir.path().join("history.db"),
            &DatabaseConfig::default(),
            RetryConfig::default(),
        )
        .unwrap()
    }

    fn work(start: DateTime<Local>) -> NewSession {
        NewSession::starting_at(
            start,
            ChronoDuration::minutes(25),
            "write report",
            vec!["writing".to_string(), "q2".to_string()],
            false,
        )
    }

    #[test]
    fn test_database_creation() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir);
        assert!(store.path().exists());
        assert!(store.is_healthy());
        assert_eq!(store.schema_version().unwrap(), 3);

        let conn = Connection::open(store.path()).unwrap();
        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM pomodoros", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_create_then_last_session_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir);
        let new = work(at(11, 9, 0));

        let id = store.create_session(&new).unwrap();
        let last = store.get_last_session().unwrap().unwrap();

        assert_eq!(last.id, id);
        assert_eq!(last.start_time, new.start_time);
        assert_eq!(last.end_time, new.end_time);
        assert_eq!(last.description, new.description);
        assert_eq!(last.duration_sec, 1500);
        assert_eq!(last.tags, new.tags);
        assert!(!last.was_break);
        assert!(!last.is_paused);
    }

    #[test]
    fn test_pause_and_resume() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir);
        let id = store.create_session(&work(at(11, 9, 0))).unwrap();

        store.pause_session(id, &at(11, 9, 10)).unwrap();
        // Paused sessions stay active long after their end time
        let active = store.get_active_session(&at(11, 12, 0)).unwrap().unwrap();
        assert_eq!(active.id, id);
        assert_eq!(store.get_paused_session().unwrap().unwrap().id, id);

        let err = store.pause_session(id, &at(11, 9, 11)).unwrap_err();
        assert!(matches!(err, PomoError::InvalidState(_)));

        store
            .resume_session(id, &at(11, 9, 13), &at(11, 9, 28))
            .unwrap();
        let resumed = store.get_session(id).unwrap().unwrap();
        assert_eq!(resumed.total_paused_duration_sec, 180);
        assert_eq!(resumed.end_time, at(11, 9, 28));
        assert!(resumed.paused_at.is_none());
        assert!(store.get_paused_session().unwrap().is_none());

        let err = store
            .resume_session(id, &at(11, 9, 14), &at(11, 9, 29))
            .unwrap_err();
        assert!(matches!(err, PomoError::InvalidState(_)));
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir);
        assert!(matches!(
            store.pause_session(42, &at(11, 9, 0)),
            Err(PomoError::NotFound(_))
        ));
        assert!(matches!(
            store.update_session_end_time(42, &at(11, 9, 0)),
            Err(PomoError::NotFound(_))
        ));
    }

    #[test]
    fn test_range_query_covers_whole_days() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir);
        store.create_session(&work(at(9, 23, 59))).unwrap();
        store.create_session(&work(at(10, 0, 0))).unwrap();
        store.create_session(&work(at(11, 23, 59))).unwrap();
        store.create_session(&work(at(12, 0, 0))).unwrap();

        let found = store
            .get_sessions_by_date_range(
                NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 11).unwrap(),
            )
            .unwrap();
        let starts: Vec<_> = found.iter().map(|s| s.start_time).collect();
        assert_eq!(starts, vec![at(11, 23, 59), at(10, 0, 0)]);
    }

    #[test]
    fn test_active_lookup_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir);
        store.create_session(&work(at(11, 9, 0))).unwrap();

        let now = at(11, 9, 5);
        let first = store.get_active_session(&now).unwrap();
        let second = store.get_active_session(&now).unwrap();
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[test]
    fn test_reopen_preserves_history() {
        let temp_dir = TempDir::new().unwrap();
        let id = open(&temp_dir).create_session(&work(at(11, 9, 0))).unwrap();

        let reopened = open(&temp_dir);
        assert_eq!(reopened.get_session(id).unwrap().unwrap().description, "write report");
    }
}
