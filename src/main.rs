//! # Pomotrack
//!
//! Command line front end for the pomodoro tracker.
//!
//! ```bash
//! pomotrack start 25m "write docs" --tags docs,q2
//! pomotrack pause
//! pomotrack resume
//! pomotrack status --format "%r left"
//! pomotrack goals --days 14
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::debug;
use pomotrack::achievements;
use pomotrack::common::{Clock, SystemClock};
use pomotrack::config::Config;
use pomotrack::database::SqliteStore;
use pomotrack::display::{self, DEFAULT_STATUS_FORMAT};
use pomotrack::error::{PomoError, Result};
use pomotrack::feedback::{spawn_chime, spawn_progress_ticker, TerminalBell};
use pomotrack::goals::GoalTracker;
use pomotrack::lifecycle::{BreakOptions, Lifecycle, PauseOutcome, StartOptions};
use pomotrack::models::{Session, SessionState};
use pomotrack::opf;
use pomotrack::store::SessionStore;
use pomotrack::utils::{format_duration_long, parse_duration};
use pomotrack::version::{short_version, version_string};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

/// Pomotrack - pomodoro sessions, goals and streaks
#[derive(Parser)]
#[command(name = "pomotrack")]
#[command(version = env!("POMOTRACK_VERSION"))]
#[command(about = "Track pomodoro sessions, goals and streaks", long_about = None)]
#[command(
    after_help = "Environment:\n  POMOTRACK_DB      override the database path\n  POMOTRACK_CONFIG  override the config file\n  RUST_LOG          log filter (default: warn)"
)]
struct Cli {
    /// Show detailed version information
    #[arg(long = "version-full")]
    version_full: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a work session
    Start {
        /// Planned length, e.g. 25m or 1h30m (defaults to the configured pomodoro)
        duration: Option<String>,

        /// What you are working on
        description: Option<String>,

        /// Comma separated tags
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Backdate the start, e.g. --ago 5m
        #[arg(long)]
        ago: Option<String>,

        #[command(flatten)]
        output: WaitArgs,
    },

    /// Start a break
    Break {
        /// Planned length (defaults to the configured break)
        duration: Option<String>,

        /// Use the configured long break
        #[arg(long, conflicts_with = "duration")]
        long: bool,

        #[command(flatten)]
        output: WaitArgs,
    },

    /// Pause the running session
    Pause,

    /// Resume the paused session
    Resume {
        #[command(flatten)]
        output: WaitArgs,
    },

    /// Cancel the active session
    Cancel,

    /// Start a new session like the last one
    Repeat {
        #[command(flatten)]
        output: WaitArgs,
    },

    /// Show the active session
    Status {
        /// Placeholders: %d description, %r remaining, %p percent, %t tags, %e end time
        #[arg(short, long)]
        format: Option<String>,

        /// Keep drawing progress until the session ends
        #[arg(short, long, conflicts_with_all = ["json", "format"])]
        wait: bool,

        #[arg(long)]
        json: bool,
    },

    /// List past sessions
    History(HistoryArgs),

    /// Show goal progress, streaks and achievements
    Goals {
        #[command(subcommand)]
        action: Option<GoalsAction>,

        /// Days of history to show
        #[arg(long, default_value_t = 14)]
        days: u32,

        #[arg(long)]
        json: bool,
    },

    /// Generate example config file
    GenerateConfig,
}

#[derive(Args)]
struct WaitArgs {
    /// Stay in the foreground until the session ends
    #[arg(long)]
    wait: bool,

    #[arg(long, conflicts_with = "wait")]
    json: bool,
}

#[derive(Args)]
struct HistoryArgs {
    /// Only today
    #[arg(long, conflicts_with_all = ["week", "from", "to"])]
    today: bool,

    /// The current ISO week
    #[arg(long, conflicts_with_all = ["from", "to"])]
    week: bool,

    /// First day, YYYY-MM-DD
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Only sessions carrying all of these tags
    #[arg(short, long, value_delimiter = ',')]
    tags: Vec<String>,

    /// Show at most this many of the most recent sessions
    #[arg(long)]
    limit: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = HistoryOutput::Text)]
    output: HistoryOutput,

    /// Shorthand for --output json
    #[arg(long, conflicts_with = "output")]
    json: bool,

    /// Per-session line for text output. Placeholders: %s start, %k kind,
    /// %d description, %D planned length, %a actual length, %t tags
    #[arg(short, long)]
    format: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HistoryOutput {
    Text,
    Json,
    /// Open Pomodoro Format
    Opf,
}

#[derive(Subcommand)]
enum GoalsAction {
    /// Change the goal targets in the config file
    Set {
        #[arg(long)]
        daily: Option<u32>,

        #[arg(long)]
        weekly: Option<u32>,
    },
}

fn main() -> ExitCode {
    // Initialize logging with WARN level by default (can be overridden with RUST_LOG env var)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if cli.version_full {
        print!("{}", version_string());
        return ExitCode::SUCCESS;
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if !e.is_fatal() => {
            println!("{}", e);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Option<Commands>) -> Result<()> {
    let command = command.unwrap_or(Commands::Status {
        format: None,
        wait: false,
        json: false,
    });

    if let Commands::GenerateConfig = command {
        return generate_config();
    }

    let config = Config::load()?;
    if let Commands::Goals {
        action: Some(GoalsAction::Set { daily, weekly }),
        ..
    } = command
    {
        return set_goals(config, daily, weekly);
    }

    let store = Arc::new(SqliteStore::from_config(&config)?);
    debug!(
        "pomotrack {} using session database at {}",
        short_version(),
        store.path().display()
    );
    let clock = SystemClock;
    let lifecycle = Lifecycle::new(store.as_ref(), &clock);

    match command {
        Commands::Start {
            duration,
            description,
            tags,
            ago,
            output,
        } => {
            let duration = duration_or(duration.as_deref(), || config.defaults.pomodoro())?;
            let mut options = StartOptions::new(duration, description.unwrap_or_default())
                .with_tags(&tags);
            if let Some(ago) = ago {
                options = options.started_ago(parse_duration(&ago)?);
            }
            let session = lifecycle.start(&options)?;
            report_started(&store, session, &output)
        }
        Commands::Break {
            duration,
            long,
            output,
        } => {
            let duration = if long {
                config.defaults.long_break()?
            } else {
                duration_or(duration.as_deref(), || config.defaults.short_break())?
            };
            let session = lifecycle.start_break(&BreakOptions { duration })?;
            report_started(&store, session, &output)
        }
        Commands::Repeat { output } => {
            let session = lifecycle.repeat()?;
            report_started(&store, session, &output)
        }
        Commands::Pause => {
            match lifecycle.pause()? {
                PauseOutcome::Paused(session) => {
                    let remaining = Duration::seconds(
                        session
                            .paused_at
                            .map(|at| session.remaining_at(&at).num_seconds())
                            .unwrap_or(0),
                    );
                    println!(
                        "Paused '{}' with {} remaining",
                        session.description,
                        format_duration_long(remaining)
                    );
                }
                PauseOutcome::AlreadyPaused(session) => {
                    println!("'{}' is already paused", session.description);
                }
            }
            Ok(())
        }
        Commands::Resume { output } => {
            let outcome = lifecycle.resume()?;
            if output.json {
                return print_json(&outcome.session);
            }
            println!(
                "Resumed '{}', {} remaining (ends {})",
                outcome.session.description,
                format_duration_long(outcome.remaining),
                outcome.session.end_time.format("%H:%M:%S")
            );
            if output.wait {
                wait_for_end(&store, outcome.session)?;
            }
            Ok(())
        }
        Commands::Cancel => {
            let outcome = lifecycle.cancel()?;
            println!(
                "Cancelled '{}' after {}",
                outcome.session.description,
                format_duration_long(outcome.actual_duration)
            );
            Ok(())
        }
        Commands::Status { format, wait, json } => {
            let status = lifecycle
                .status()?
                .ok_or_else(|| PomoError::not_found("No active session."))?;
            if json {
                return print_json(&status);
            }
            if wait {
                return wait_for_end(&store, status.session);
            }
            match format {
                Some(format) => println!("{}", display::format_status(&format, &status)),
                None if status.state == SessionState::Paused => {
                    println!("{}", display::format_status_summary(&status))
                }
                None => println!("{}", display::format_status(DEFAULT_STATUS_FORMAT, &status)),
            }
            Ok(())
        }
        Commands::History(args) => show_history(store.as_ref(), &clock, args),
        Commands::Goals { days, json, .. } => {
            let tracker = GoalTracker::new(store.as_ref(), &clock, config.goals);
            let dashboard = tracker.dashboard(days)?;
            let found = achievements::detect(&dashboard);

            if json {
                #[derive(Serialize)]
                struct GoalsReport<'a> {
                    #[serde(flatten)]
                    dashboard: &'a pomotrack::goals::GoalDashboard,
                    achievements: &'a [achievements::Achievement],
                }
                return print_json(&GoalsReport {
                    dashboard: &dashboard,
                    achievements: &found,
                });
            }

            for progress in [&dashboard.daily, &dashboard.weekly, &dashboard.monthly] {
                println!("{}", display::format_goal_progress(progress));
            }
            println!("{}", display::format_streak(&dashboard.streak));
            println!();
            for line in display::format_history(&dashboard.history) {
                println!("{}", line);
            }
            if !found.is_empty() {
                println!();
                for achievement in &found {
                    println!("{}", display::format_achievement(achievement));
                }
            }
            Ok(())
        }
        Commands::GenerateConfig => generate_config(),
    }
}

fn duration_or(arg: Option<&str>, default: impl FnOnce() -> Result<Duration>) -> Result<Duration> {
    match arg {
        Some(raw) => parse_duration(raw),
        None => default(),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_started(store: &Arc<SqliteStore>, session: Session, output: &WaitArgs) -> Result<()> {
    if output.json {
        return print_json(&session);
    }
    println!(
        "Started {} '{}' for {} (ends {})",
        if session.was_break { "break" } else { "session" },
        session.description,
        format_duration_long(session.planned_duration()),
        session.end_time.format("%H:%M:%S")
    );
    if output.wait {
        wait_for_end(store, session)?;
    }
    Ok(())
}

/// Draw progress until the session stops running or paused, then ring
/// the bell if the final row says it completed. Pauses and resumes made by
/// other processes are followed. The chime may be cut short by process exit.
fn wait_for_end(store: &Arc<SqliteStore>, session: Session) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ticker = spawn_progress_ticker(
        Arc::clone(store),
        session.id,
        Arc::clone(&clock),
        std::time::Duration::from_secs(1),
        io::stdout(),
    );
    let last = ticker
        .join()
        .map_err(|_| PomoError::other("progress display thread panicked"))?;

    let finished = last
        .map(|s| s.state_at(&clock.now()) == SessionState::Completed)
        .unwrap_or(false);
    if finished {
        spawn_chime(Arc::new(TerminalBell));
        println!("Session complete.");
    } else {
        println!("Session did not run to completion.");
    }
    Ok(())
}

fn show_history(store: &SqliteStore, clock: &SystemClock, args: HistoryArgs) -> Result<()> {
    let now = clock.now();
    let today = now.date_naive();
    let (from, to) = if args.today {
        (today, today)
    } else if args.week {
        (pomotrack::common::start_of_week(&now).date_naive(), today)
    } else {
        let to = args.to.unwrap_or(today);
        (args.from.unwrap_or(to - Duration::days(6)), to)
    };
    if from > to {
        return Err(PomoError::validation(format!(
            "--from {} is after --to {}",
            from, to
        )));
    }

    let wanted = pomotrack::utils::sanitize_tags(&args.tags);
    let mut sessions: Vec<Session> = store
        .get_sessions_by_date_range(from, to)?
        .into_iter()
        .filter(|s| wanted.iter().all(|t| s.tags.contains(t)))
        .collect();
    if let Some(limit) = args.limit {
        sessions.truncate(limit);
    }
    sessions.reverse();

    let output = if args.json {
        HistoryOutput::Json
    } else {
        args.output
    };
    match output {
        HistoryOutput::Json => return print_json(&sessions),
        HistoryOutput::Opf => {
            println!("{}", opf::to_json(&sessions)?);
            return Ok(());
        }
        HistoryOutput::Text => {}
    }

    if sessions.is_empty() {
        println!("No sessions between {} and {}.", from, to);
        return Ok(());
    }
    for session in &sessions {
        match &args.format {
            Some(format) => println!("{}", display::format_session(format, session, &now)),
            None => println!("{}", display::format_session_row(session)),
        }
    }
    if args.format.is_none() {
        println!();
        println!("{}", display::format_history_summary(&sessions));
    }
    Ok(())
}

fn set_goals(mut config: Config, daily: Option<u32>, weekly: Option<u32>) -> Result<()> {
    if daily.is_none() && weekly.is_none() {
        return Err(PomoError::validation("pass --daily and/or --weekly"));
    }
    config.set_goals(
        daily.unwrap_or(config.goals.daily_count),
        weekly.unwrap_or(config.goals.weekly_count),
    )?;

    let path = Config::active_config_path()?;
    config.save(&path)?;
    println!(
        "Goals set to {} per day, {} per week ({})",
        config.goals.daily_count,
        config.goals.weekly_count,
        path.display()
    );
    Ok(())
}

fn generate_config() -> Result<()> {
    let config_path = Config::default_config_path()?;
    println!("Generating example config file at: {:?}", config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(&config_path, Config::example_toml())?;
    println!("Config file generated successfully!");
    println!("Edit {} to customize settings", config_path.display());
    Ok(())
}
