use crate::common::{parse_db_timestamp, to_db_timestamp};
use chrono::Local;
use log::{debug, warn};
use rusqlite::{params, Connection, Result, Transaction, TransactionBehavior};

/// Migration trait for database schema changes
pub trait Migration {
    /// Unique version number (must be sequential)
    fn version(&self) -> u32;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Apply the migration (forward)
    fn up(&self, tx: &Transaction) -> Result<()>;

    /// Rollback the migration (backward)
    fn down(&self, tx: &Transaction) -> Result<()>;
}

/// Applies pending migrations to an open connection.
pub struct MigrationRunner<'a> {
    conn: &'a mut Connection,
    migrations: Vec<Box<dyn Migration>>,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(conn: &'a mut Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL,
                description TEXT,
                execution_time_ms INTEGER
            )",
            [],
        )?;

        Ok(Self {
            conn,
            migrations: Self::load_all_migrations(),
        })
    }

    /// Load all migration definitions
    fn load_all_migrations() -> Vec<Box<dyn Migration>> {
        vec![
            Box::new(CreateSessionTable),
            Box::new(AddPauseTracking),
            Box::new(NormalizeTimestamps),
        ]
    }

    /// Highest version any migration defines
    pub fn latest_version(&self) -> u32 {
        self.migrations
            .iter()
            .map(|m| m.version())
            .max()
            .unwrap_or(0)
    }

    /// Get current schema version
    pub fn current_version(&self) -> Result<u32> {
        let version: Option<u32> =
            self.conn
                .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                    row.get(0)
                })?;

        Ok(version.unwrap_or(0))
    }

    /// Run all pending migrations, each in its own transaction.
    ///
    /// Returns how many were applied.
    pub fn migrate(&mut self) -> Result<usize> {
        let current = self.current_version()?;
        let mut applied = 0;

        for migration in self.migrations.iter().filter(|m| m.version() > current) {
            let start = std::time::Instant::now();
            // Another opener may have applied this step since the read above
            let tx = self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)?;
            let seen: Option<u32> =
                tx.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                    row.get(0)
                })?;
            if seen.unwrap_or(0) >= migration.version() {
                continue;
            }

            migration.up(&tx)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at, description, execution_time_ms)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    migration.version(),
                    Local::now().to_rfc3339(),
                    migration.description(),
                    start.elapsed().as_millis() as i64,
                ],
            )?;

            tx.commit()?;
            debug!(
                "Applied migration v{}: {}",
                migration.version(),
                migration.description()
            );
            applied += 1;
        }

        Ok(applied)
    }

    /// Roll back every migration above `target`, newest first.
    pub fn rollback_to(&mut self, target: u32) -> Result<()> {
        let current = self.current_version()?;
        let mut pending: Vec<&dyn Migration> = self
            .migrations
            .iter()
            .map(|m| m.as_ref())
            .filter(|m| m.version() > target && m.version() <= current)
            .collect();
        pending.sort_by_key(|m| std::cmp::Reverse(m.version()));

        for migration in pending {
            let tx = self.conn.transaction()?;
            migration.down(&tx)?;
            tx.execute(
                "DELETE FROM schema_migrations WHERE version = ?1",
                params![migration.version()],
            )?;
            tx.commit()?;
        }

        Ok(())
    }
}

fn has_column(tx: &Transaction, table: &str, column: &str) -> Result<bool> {
    let mut stmt = tx.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Migration 001: base session table and the per-day index.
///
/// Uses `IF NOT EXISTS` so history files written before migrations were
/// tracked are adopted as-is.
pub struct CreateSessionTable;

impl Migration for CreateSessionTable {
    fn version(&self) -> u32 {
        1
    }

    fn description(&self) -> &str {
        "Create pomodoros table"
    }

    fn up(&self, tx: &Transaction) -> Result<()> {
        tx.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pomodoros (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                description TEXT,
                duration_secs INTEGER NOT NULL,
                tags_csv TEXT,
                was_break BOOLEAN NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_pomodoros_day ON pomodoros(date(start_time));
            CREATE INDEX IF NOT EXISTS idx_pomodoros_start_time ON pomodoros(start_time);
            "#,
        )
    }

    fn down(&self, tx: &Transaction) -> Result<()> {
        tx.execute_batch("DROP TABLE IF EXISTS pomodoros;")
    }
}

/// Migration 002: pause bookkeeping columns and the active-session index.
pub struct AddPauseTracking;

impl Migration for AddPauseTracking {
    fn version(&self) -> u32 {
        2
    }

    fn description(&self) -> &str {
        "Add pause tracking columns"
    }

    fn up(&self, tx: &Transaction) -> Result<()> {
        if !has_column(tx, "pomodoros", "paused_at")? {
            tx.execute("ALTER TABLE pomodoros ADD COLUMN paused_at TEXT", [])?;
        }
        if !has_column(tx, "pomodoros", "total_paused_duration")? {
            tx.execute(
                "ALTER TABLE pomodoros ADD COLUMN total_paused_duration INTEGER NOT NULL DEFAULT 0",
                [],
            )?;
        }
        if !has_column(tx, "pomodoros", "is_paused")? {
            tx.execute(
                "ALTER TABLE pomodoros ADD COLUMN is_paused BOOLEAN NOT NULL DEFAULT 0",
                [],
            )?;
        }
        tx.execute(
            "CREATE INDEX IF NOT EXISTS idx_pomodoros_active ON pomodoros(is_paused, end_time)",
            [],
        )?;
        Ok(())
    }

    fn down(&self, tx: &Transaction) -> Result<()> {
        tx.execute("DROP INDEX IF EXISTS idx_pomodoros_active", [])?;
        tx.execute("ALTER TABLE pomodoros DROP COLUMN is_paused", [])?;
        tx.execute("ALTER TABLE pomodoros DROP COLUMN total_paused_duration", [])?;
        tx.execute("ALTER TABLE pomodoros DROP COLUMN paused_at", [])?;
        Ok(())
    }
}

/// Migration 003: rewrite timestamps into the fixed-width UTC layout.
///
/// History written by older versions stores local times with an offset,
/// which does not sort correctly against UTC text in range queries.
pub struct NormalizeTimestamps;

fn normalize(raw: &str) -> Option<String> {
    match parse_db_timestamp(raw) {
        Ok(dt) => Some(to_db_timestamp(&dt)).filter(|n| n != raw),
        Err(e) => {
            warn!("Leaving unparseable timestamp as-is: {}", e);
            None
        }
    }
}

impl Migration for NormalizeTimestamps {
    fn version(&self) -> u32 {
        3
    }

    fn description(&self) -> &str {
        "Normalize stored timestamps to UTC"
    }

    fn up(&self, tx: &Transaction) -> Result<()> {
        let rows: Vec<(i64, String, String, Option<String>)> = {
            let mut stmt =
                tx.prepare("SELECT id, start_time, end_time, paused_at FROM pomodoros")?;
            let mapped = stmt.query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            mapped.collect::<Result<Vec<_>>>()?
        };

        for (id, start, end, paused) in rows {
            let new_start = normalize(&start);
            let new_end = normalize(&end);
            let new_paused = paused.as_deref().and_then(normalize);
            if new_start.is_none() && new_end.is_none() && new_paused.is_none() {
                continue;
            }
            tx.execute(
                "UPDATE pomodoros SET start_time = ?1, end_time = ?2, paused_at = ?3 WHERE id = ?4",
                params![
                    new_start.unwrap_or(start),
                    new_end.unwrap_or(end),
                    new_paused.or(paused),
                    id
                ],
            )?;
        }
        Ok(())
    }

    fn down(&self, _tx: &Transaction) -> Result<()> {
        // Both layouts are readable
        Ok(())
    }
}
