//! Open Pomodoro Format export.
//!
//! OPF is a small JSON interchange shape: a `pomodoros` array whose items
//! carry an id, an RFC 3339 start, a length in whole minutes, and a
//! `type` of `pomodoro` or `break`.

use crate::error::Result;
use crate::models::Session;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpfKind {
    Pomodoro,
    Break,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpfPomodoro {
    pub id: String,
    pub started_at: String,
    /// Planned length in whole minutes.
    pub duration: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub kind: OpfKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpfExport {
    pub pomodoros: Vec<OpfPomodoro>,
}

impl From<&Session> for OpfPomodoro {
    fn from(session: &Session) -> Self {
        OpfPomodoro {
            // Start time plus row id, so re-exporting yields the same ids
            id: format!("{}-{}", session.start_time.format("%Y%m%d-%H%M%S"), session.id),
            started_at: session.start_time.to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
            duration: session.duration_sec / 60,
            description: session.description.clone(),
            tags: session.tags.clone(),
            kind: if session.was_break {
                OpfKind::Break
            } else {
                OpfKind::Pomodoro
            },
        }
    }
}

pub fn export(sessions: &[Session]) -> OpfExport {
    OpfExport {
        pomodoros: sessions.iter().map(OpfPomodoro::from).collect(),
    }
}

/// Pretty-printed OPF document for `sessions`, in the order given.
pub fn to_json(sessions: &[Session]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&export(sessions))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, Local, TimeZone};

    fn session(id: i64, was_break: bool) -> Session {
        let start = Local.with_ymd_and_hms(2025, 6, 11, 9, 0, 30).earliest().unwrap();
        Session {
            id,
            start_time: start,
            end_time: start + Duration::seconds(1530),
            description: if was_break { String::new() } else { "write docs".to_string() },
            duration_sec: 1530,
            tags: if was_break { vec![] } else { vec!["docs".to_string()] },
            was_break,
            is_paused: false,
            paused_at: None,
            total_paused_duration_sec: 0,
        }
    }

    #[test]
    fn test_work_session_fields() {
        let opf = OpfPomodoro::from(&session(7, false));
        assert_eq!(opf.id, "20250611-090030-7");
        assert_eq!(opf.duration, 25);
        assert_eq!(opf.kind, OpfKind::Pomodoro);
        assert_eq!(opf.tags, vec!["docs".to_string()]);

        let started = chrono::DateTime::<FixedOffset>::parse_from_rfc3339(&opf.started_at).unwrap();
        assert_eq!(started, session(7, false).start_time);
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let json = to_json(&[session(1, false), session(2, true)]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let items = value["pomodoros"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["type"], "pomodoro");
        assert_eq!(items[0]["description"], "write docs");
        assert_eq!(items[1]["type"], "break");
        assert!(items[1].get("description").is_none());
        assert!(items[1].get("tags").is_none());
    }

    #[test]
    fn test_no_sessions_is_an_empty_array() {
        assert_eq!(to_json(&[]).unwrap().replace(char::is_whitespace, ""), "{\"pomodoros\":[]}");
    }
}
