//! Best-effort feedback that runs beside the main command.
//!
//! Both helpers run on their own threads. Their failures are logged and
//! never reach the lifecycle.

use crate::common::Clock;
use crate::display::format_progress_line;
use crate::models::{Session, SessionState, SessionStatus};
use crate::store::SessionStore;
use log::{debug, warn};
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Something that can announce a finished session.
pub trait Chime: Send + Sync {
    fn play(&self) -> io::Result<()>;
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl Chime for TerminalBell {
    fn play(&self) -> io::Result<()> {
        let mut err = io::stderr();
        err.write_all(b"\x07")?;
        err.flush()
    }
}

/// Play `chime` on its own thread.
///
/// Callers are free to drop the handle; a failed chime is only logged.
pub fn spawn_chime(chime: Arc<dyn Chime>) -> JoinHandle<()> {
    thread::spawn(move || match chime.play() {
        Ok(()) => debug!("Chime played"),
        Err(e) => warn!("Failed to play chime: {}", e),
    })
}

/// Redraw a session's progress line roughly every `interval` for as long
/// as it is running or paused.
///
/// The row is re-read from `store` on every tick, so a pause, resume or
/// cancel made by another process shows up on the next redraw. Returns the
/// last row seen, or `None` if the session could not be read at all. The
/// ticker never writes to the store.
pub fn spawn_progress_ticker<S, W>(
    store: Arc<S>,
    id: i64,
    clock: Arc<dyn Clock>,
    interval: Duration,
    mut out: W,
) -> JoinHandle<Option<Session>>
where
    S: SessionStore + Send + Sync + ?Sized + 'static,
    W: Write + Send + 'static,
{
    thread::spawn(move || {
        let mut last: Option<Session> = None;
        loop {
            let session = match store.get_session(id) {
                Ok(Some(session)) => session,
                Ok(None) => {
                    warn!("Session {} disappeared while waiting", id);
                    break;
                }
                Err(e) => {
                    warn!("Failed to refresh session {}: {}", id, e);
                    break;
                }
            };
            last = Some(session.clone());

            let status = SessionStatus::at(session, &clock.now());
            let line = format_progress_line(&status);
            if write!(out, "\r{}\x1b[K", line).and_then(|_| out.flush()).is_err() {
                debug!("Progress output closed, stopping ticker");
                return last;
            }
            if !matches!(status.state, SessionState::Running | SessionState::Paused) {
                break;
            }
            thread::sleep(interval);
        }
        let _ = writeln!(out);
        last
    })
}
