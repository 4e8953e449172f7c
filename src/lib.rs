//! # Pomotrack
//!
//! Pomodoro session tracking backed by SQLite: timed work sessions and
//! breaks that can be paused, resumed and cancelled, plus daily, weekly and
//! monthly goals, streaks and achievements computed from the history.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pomotrack::{Config, Lifecycle, SqliteStore, StartOptions, SystemClock};
//!
//! let config = Config::load().unwrap();
//! let store = SqliteStore::from_config(&config).unwrap();
//! let lifecycle = Lifecycle::new(&store, &SystemClock);
//!
//! let session = lifecycle
//!     .start(&StartOptions::new(chrono::Duration::minutes(25), "write docs"))
//!     .unwrap();
//! println!("started #{}", session.id);
//! ```

pub mod achievements;
pub mod common;
/// Configuration management module for loading and saving settings
pub mod config;
/// SQLite session store
pub mod database;
pub mod display;
pub mod error;
pub mod feedback;
/// Goal progress and the goals dashboard
pub mod goals;
/// Session state machine: start, pause, resume, cancel, repeat
pub mod lifecycle;
/// Database schema migration system
pub mod migrations;
pub mod models;
/// Open Pomodoro Format export
pub mod opf;
/// Retry logic with exponential backoff for transient failures
pub mod retry;
pub mod store;
pub mod streak;
pub mod utils;
pub mod version;

pub use common::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use database::SqliteStore;
pub use error::{PomoError, Result};
pub use goals::{GoalDashboard, GoalProgress, GoalTracker};
pub use lifecycle::{BreakOptions, Lifecycle, StartOptions};
pub use models::{NewSession, Session, SessionState, SessionStatus};
pub use store::{MemoryStore, SessionStore};
pub use version::{short_version, version_string};
