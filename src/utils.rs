use crate::error::{PomoError, Result};
use chrono::Duration;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

pub const MAX_DESCRIPTION_CHARS: usize = 200;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_CHARS: usize = 50;

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").unwrap_or_else(|e| {
            panic!("duration pattern failed to compile: {}", e);
        })
    })
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\s+").unwrap_or_else(|e| {
            panic!("whitespace pattern failed to compile: {}", e);
        })
    })
}

/// Parse "25m", "1h30m", "90s" style durations.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    let caps = duration_regex()
        .captures(trimmed)
        .filter(|_| !trimmed.is_empty())
        .ok_or_else(|| PomoError::validation(format!("invalid duration '{}'", input)))?;

    let field = |idx: usize| -> Result<i64> {
        match caps.get(idx) {
            Some(m) => m
                .as_str()
                .parse::<i64>()
                .map_err(|_| PomoError::validation(format!("duration '{}' is too large", input))),
            None => Ok(0),
        }
    };

    let (hours, minutes, secs) = (field(1)?, field(2)?, field(3)?);
    hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .and_then(|hm| hm.checked_add(secs))
        .and_then(Duration::try_seconds)
        .ok_or_else(|| PomoError::validation(format!("duration '{}' is too large", input)))
}

/// Planned durations must be between one second and a day.
pub fn validate_duration(d: Duration) -> Result<()> {
    if d <= Duration::zero() {
        return Err(PomoError::validation("duration must be positive"));
    }
    if d < Duration::seconds(1) {
        return Err(PomoError::validation("duration must be at least 1 second"));
    }
    if d > Duration::hours(24) {
        return Err(PomoError::validation("duration cannot exceed 24 hours"));
    }
    Ok(())
}

/// Trim and collapse runs of whitespace to single spaces.
pub fn sanitize_description(desc: &str) -> String {
    whitespace_regex().replace_all(desc.trim(), " ").into_owned()
}

pub fn validate_description(desc: &str, required: bool) -> Result<()> {
    let trimmed = desc.trim();
    if required && trimmed.is_empty() {
        return Err(PomoError::validation("description cannot be empty"));
    }
    if trimmed.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(PomoError::validation(format!(
            "description cannot exceed {} characters",
            MAX_DESCRIPTION_CHARS
        )));
    }
    Ok(())
}

/// Trim and lower-case tags, dropping empties and later duplicates.
pub fn sanitize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

pub fn validate_tags(tags: &[String]) -> Result<()> {
    if tags.len() > MAX_TAGS {
        return Err(PomoError::validation(format!(
            "cannot have more than {} tags",
            MAX_TAGS
        )));
    }

    let mut seen = HashSet::new();
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(PomoError::validation("tags cannot be empty"));
        }
        if tag.chars().count() > MAX_TAG_CHARS {
            return Err(PomoError::validation(format!(
                "individual tags cannot exceed {} characters",
                MAX_TAG_CHARS
            )));
        }
        if tag.contains(',') {
            return Err(PomoError::validation("tags cannot contain commas"));
        }
        if !seen.insert(tag) {
            return Err(PomoError::validation(format!("duplicate tag '{}'", tag)));
        }
    }

    Ok(())
}

/// Join tags into the stored comma-separated form.
///
/// A tag containing a quote, comma or surrounding whitespace is wrapped in
/// double quotes with inner quotes doubled.
pub fn encode_tags_csv(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| {
            let needs_quotes = tag.contains('"')
                || tag.contains(',')
                || tag.trim() != tag.as_str();
            if needs_quotes {
                format!("\"{}\"", tag.replace('"', "\"\""))
            } else {
                tag.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Inverse of [`encode_tags_csv`]. Empty input yields no tags.
pub fn decode_tags_csv(csv: &str) -> Vec<String> {
    if csv.is_empty() {
        return Vec::new();
    }

    let mut tags = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = csv.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.is_empty() => in_quotes = true,
            ',' if !in_quotes => tags.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    tags.push(current);

    tags.into_iter().filter(|t| !t.is_empty()).collect()
}

/// MM:SS, minutes uncapped. Negative durations render as 00:00.
pub fn format_duration(d: Duration) -> String {
    let total = d.num_seconds().max(0);
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// "1h 05m 00s", "4m 10s", "42s"
pub fn format_duration_long(d: Duration) -> String {
    let total = d.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
