use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Date, OffsetDateTime, Time};

pub const DEFAULT_START_TIME: &str = "09:00";
pub const DEFAULT_END_TIME: &str = "10:00";
const MAX_TEXT_LEN: usize = 500;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
    #[error("invalid {field} '{value}', expected HH:MM")]
    InvalidTime { field: &'static str, value: String },
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub completed: bool,
    /// Unix timestamp in milliseconds.
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBlock {
    pub id: String,
    #[serde(with = "stored_date")]
    pub date: Date,
    pub start_time: String,
    pub end_time: String,
    pub task: String,
}

impl TimeBlock {
    pub fn time_range_label(&self) -> String {
        format!("{} - {}", self.start_time, self.end_time)
    }
}

/// Fields collected from the new-block overlay or the CLI before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBlockDraft {
    pub date: Date,
    pub start_time: String,
    pub end_time: String,
    pub task: String,
}

impl TimeBlockDraft {
    pub fn new(date: Date) -> Self {
        Self {
            date,
            start_time: DEFAULT_START_TIME.to_string(),
            end_time: DEFAULT_END_TIME.to_string(),
            task: String::new(),
        }
    }

    pub fn validate(&self) -> Result<ValidTimeBlock, ValidationError> {
        let task = sanitize_text(&self.task, "task")?;
        let start_time = normalize_clock_time(&self.start_time, "start time")?;
        let end_time = normalize_clock_time(&self.end_time, "end time")?;
        Ok(ValidTimeBlock {
            date: self.date,
            start_time,
            end_time,
            task,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTimeBlock {
    pub date: Date,
    pub start_time: String,
    pub end_time: String,
    pub task: String,
}

impl ValidTimeBlock {
    pub fn into_block(self, id: String) -> TimeBlock {
        TimeBlock {
            id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            task: self.task,
        }
    }
}

pub fn sanitize_text(raw: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(trimmed.chars().take(MAX_TEXT_LEN).collect())
}

/// Accepts `H:MM` or `HH:MM` and returns the zero-padded `HH:MM` form.
pub fn normalize_clock_time(raw: &str, field: &'static str) -> Result<String, ValidationError> {
    let invalid = || ValidationError::InvalidTime {
        field,
        value: raw.to_string(),
    };
    let trimmed = raw.trim();
    let (hour, minute) = trimmed.split_once(':').ok_or_else(invalid)?;
    if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
        return Err(invalid());
    }
    let hour: u8 = hour.parse().map_err(|_| invalid())?;
    let minute: u8 = minute.parse().map_err(|_| invalid())?;
    let time = Time::from_hms(hour, minute, 0).map_err(|_| invalid())?;
    Ok(format!("{:02}:{:02}", time.hour(), time.minute()))
}

pub fn parse_date(raw: &str) -> Result<Date, ValidationError> {
    stored_date::parse(raw.trim()).ok_or_else(|| ValidationError::InvalidDate(raw.to_string()))
}

pub fn format_date(date: Date) -> String {
    stored_date::format(date)
}

/// Hands out millisecond-timestamp ids that never repeat within a process,
/// even when two records are created inside the same millisecond.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    last: i64,
}

impl IdGenerator {
    /// Starts above every numeric id already present so new ids sort last.
    pub fn seeded<'a, I>(existing: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let last = existing
            .into_iter()
            .filter_map(|id| id.parse::<i64>().ok())
            .max()
            .unwrap_or(0);
        Self { last }
    }

    pub fn next_id(&mut self, now_ms: i64) -> String {
        let candidate = if now_ms > self.last {
            now_ms
        } else {
            self.last + 1
        };
        self.last = candidate;
        candidate.to_string()
    }
}

pub fn now_millis() -> i64 {
    let now = OffsetDateTime::now_utc();
    (now.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Local wall-clock time, falling back to UTC when the offset cannot be
/// determined (e.g. multi-threaded processes on some platforms).
pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

pub fn today() -> Date {
    now_local().date()
}

mod stored_date {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use time::format_description::well_known::Rfc3339;
    use time::macros::format_description;
    use time::{Date, OffsetDateTime, UtcOffset};

    pub fn format(date: Date) -> String {
        let fmt = format_description!("[year]-[month]-[day]");
        date.format(&fmt).unwrap_or_else(|_| date.to_string())
    }

    /// Plain `YYYY-MM-DD` or a full RFC 3339 timestamp such as
    /// `2024-03-04T00:00:00.000Z`. Timestamps name the local calendar day
    /// of that instant.
    pub fn parse(raw: &str) -> Option<Date> {
        let local = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
        parse_in(raw, local)
    }

    pub(super) fn parse_in(raw: &str, local: UtcOffset) -> Option<Date> {
        let fmt = format_description!("[year]-[month]-[day]");
        if let Ok(date) = Date::parse(raw, &fmt) {
            return Some(date);
        }
        OffsetDateTime::parse(raw, &Rfc3339)
            .ok()
            .map(|stamp| stamp.to_offset(local).date())
    }

    pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(*date))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid date '{raw}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use time::macros::{date, offset};

    #[test]
    fn time_block_serializes_with_camel_case_keys() {
        let block = TimeBlock {
            id: "1709539200000".into(),
            date: date!(2024 - 03 - 04),
            start_time: "09:00".into(),
            end_time: "10:00".into(),
            task: "Standup".into(),
        };
        let json = serde_json::to_string(&block).expect("serialize");
        assert_eq!(
            json,
            r#"{"id":"1709539200000","date":"2024-03-04","startTime":"09:00","endTime":"10:00","task":"Standup"}"#
        );
    }

    #[test]
    fn time_block_accepts_browser_iso_timestamps() {
        let raw = r#"{"id":"1","date":"2024-03-04T12:00:00.000Z","startTime":"09:00","endTime":"10:00","task":"Standup"}"#;
        let block: TimeBlock = serde_json::from_str(raw).expect("deserialize");
        assert_eq!(block.date, date!(2024 - 03 - 04));
    }

    #[test]
    fn iso_timestamps_resolve_to_the_local_day() {
        let eastern = offset!(-5);
        assert_eq!(
            stored_date::parse_in("2024-03-05T01:00:00.000Z", eastern),
            Some(date!(2024 - 03 - 04))
        );
        assert_eq!(
            stored_date::parse_in("2024-03-04T20:00:00.000-05:00", eastern),
            Some(date!(2024 - 03 - 04))
        );
        assert_eq!(
            stored_date::parse_in("2024-03-05T01:00:00.000Z", offset!(UTC)),
            Some(date!(2024 - 03 - 05))
        );
        assert_eq!(
            stored_date::parse_in("2024-03-05", eastern),
            Some(date!(2024 - 03 - 05))
        );
    }

    #[test]
    fn todo_uses_created_at_key() {
        let raw = r#"{"id":"7","text":"Buy milk","completed":true,"createdAt":1700000000000}"#;
        let todo: Todo = serde_json::from_str(raw).expect("deserialize");
        assert!(todo.completed);
        assert_eq!(todo.created_at, 1_700_000_000_000);
    }

    #[test]
    fn clock_times_are_normalized() {
        assert_eq!(normalize_clock_time("9:05", "start time").unwrap(), "09:05");
        assert_eq!(normalize_clock_time(" 23:59 ", "start time").unwrap(), "23:59");
        assert_matches!(
            normalize_clock_time("24:00", "start time"),
            Err(ValidationError::InvalidTime { .. })
        );
        assert_matches!(
            normalize_clock_time("0900", "end time"),
            Err(ValidationError::InvalidTime { field: "end time", .. })
        );
    }

    #[test]
    fn draft_rejects_blank_task() {
        let draft = TimeBlockDraft::new(date!(2024 - 03 - 04));
        assert_matches!(draft.validate(), Err(ValidationError::Empty { field: "task" }));
    }

    #[test]
    fn id_generator_never_repeats_within_same_millisecond() {
        let mut ids = IdGenerator::default();
        let first = ids.next_id(1_000);
        let second = ids.next_id(1_000);
        let third = ids.next_id(999);
        assert_eq!(first, "1000");
        assert_eq!(second, "1001");
        assert_eq!(third, "1002");
    }

    #[test]
    fn id_generator_seeds_above_existing_ids() {
        let mut ids = IdGenerator::seeded(["5000", "not-a-number", "7000"]);
        assert_eq!(ids.next_id(6_000), "7001");
    }
}
