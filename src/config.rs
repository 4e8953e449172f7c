use crate::common::get_data_dir;
use crate::error::{PomoError, Result};
use crate::utils::parse_duration;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure.
///
/// Loaded once per invocation and handed to the store, lifecycle and goal
/// tracker explicitly; nothing reads it through a global.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Goal targets
    pub goals: GoalSettings,

    /// Default session durations
    pub defaults: DefaultsConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Retry configuration
    pub retry: RetryConfig,
}

/// Daily and weekly pomodoro targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalSettings {
    /// Target number of pomodoros per day
    pub daily_count: u32,

    /// Target number of pomodoros per week
    pub weekly_count: u32,
}

/// Default durations, written as duration strings ("25m", "1h30m")
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub pomodoro_duration: String,
    pub break_duration: String,
    pub long_break_duration: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Maximum connection pool size
    pub max_connections: u32,

    /// Busy timeout in milliseconds
    pub busy_timeout_ms: u32,

    /// Path to database file (relative to data directory)
    pub path: String,
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RetryConfig {
    /// Database operation retry configuration
    pub db_ops: RetrySettings,
}

/// Individual retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Maximum number of retry attempts
    pub max_attempts: u32,

    /// Initial delay in milliseconds
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,

    /// Backoff factor (multiplier for each retry)
    pub backoff_factor: f32,
}

impl Default for GoalSettings {
    fn default() -> Self {
        GoalSettings {
            daily_count: 8,
            weekly_count: 40,
        }
    }
}

impl GoalSettings {
    /// Monthly target is four weeks' worth of the weekly target.
    pub fn monthly_count(&self) -> u32 {
        self.weekly_count.saturating_mul(4)
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        DefaultsConfig {
            pomodoro_duration: "25m".to_string(),
            break_duration: "5m".to_string(),
            long_break_duration: "15m".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            max_connections: 4,
            busy_timeout_ms: 5000,
            path: "history.db".to_string(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: 5,
            initial_delay_ms: 50,
            max_delay_ms: 2000,
            backoff_factor: 1.5,
        }
    }
}

impl DefaultsConfig {
    pub fn pomodoro(&self) -> Result<Duration> {
        parse_duration(&self.pomodoro_duration)
    }

    pub fn short_break(&self) -> Result<Duration> {
        parse_duration(&self.break_duration)
    }

    pub fn long_break(&self) -> Result<Duration> {
        parse_duration(&self.long_break_duration)
    }
}

// Configuration loading
impl Config {
    /// Load configuration from file, or use defaults
    pub fn load() -> Result<Self> {
        match Self::find_config_file() {
            Some(config_path) => Self::load_from_file(&config_path),
            None => Ok(Config::default()),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| PomoError::config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| PomoError::config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| PomoError::config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PomoError::config(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, toml_string)
            .map_err(|e| PomoError::config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject values the goal calculator and lifecycle cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.goals.daily_count == 0 {
            return Err(PomoError::validation("goals.daily_count must be at least 1"));
        }
        if self.goals.weekly_count == 0 {
            return Err(PomoError::validation("goals.weekly_count must be at least 1"));
        }
        self.defaults.pomodoro()?;
        self.defaults.short_break()?;
        self.defaults.long_break()?;
        if self.database.max_connections == 0 {
            return Err(PomoError::validation("database.max_connections must be at least 1"));
        }
        Ok(())
    }

    /// Replace the goal targets, keeping the previous ones if the new pair is invalid
    pub fn set_goals(&mut self, daily: u32, weekly: u32) -> Result<()> {
        let previous = self.goals;
        self.goals = GoalSettings {
            daily_count: daily,
            weekly_count: weekly,
        };
        if let Err(e) = self.validate() {
            self.goals = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Absolute path of the session database
    pub fn database_path(&self) -> PathBuf {
        if let Ok(path) = std::env::var("POMOTRACK_DB") {
            return PathBuf::from(path);
        }
        let configured = PathBuf::from(&self.database.path);
        if configured.is_absolute() {
            configured
        } else {
            get_data_dir().join(configured)
        }
    }

    /// Find config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        // 1. Environment variable
        if let Ok(path) = std::env::var("POMOTRACK_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("pomotrack").join("config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Home directory
        if let Some(home_dir) = dirs::home_dir() {
            let path = home_dir.join(".pomotrack.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Path a loaded config should be written back to
    pub fn active_config_path() -> Result<PathBuf> {
        match Self::find_config_file() {
            Some(path) => Ok(path),
            None => Self::default_config_path(),
        }
    }

    /// Get default config file path (for creating new config)
    pub fn default_config_path() -> Result<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Ok(config_dir.join("pomotrack").join("config.toml"))
        } else {
            Err(PomoError::config("Could not determine config directory"))
        }
    }

    /// Generate example config file content
    pub fn example_toml() -> &'static str {
        r#"# Pomotrack Configuration File
#
# All values shown are the defaults - you can override only what you need.

[goals]
daily_count = 8      # Pomodoros per day
weekly_count = 40    # Pomodoros per week (monthly target is 4x this)

[defaults]
pomodoro_duration = "25m"
break_duration = "5m"
long_break_duration = "15m"

[database]
max_connections = 4
busy_timeout_ms = 5000
path = "history.db"  # Relative to data directory

[retry.db_ops]
max_attempts = 5
initial_delay_ms = 50
max_delay_ms = 2000
backoff_factor = 1.5
"#
    }
}
