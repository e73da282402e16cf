use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::errors::DomainError;

/// Wall-clock format exchanged with agents and tools.
pub const LOCAL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Current time shifted into the company's UTC offset.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Parses `+HH:MM` / `-HH:MM` offsets as written in configuration.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, DomainError> {
    let raw = raw.trim();
    let invalid = || DomainError::InvariantViolation(format!("invalid utc offset `{raw}`"));

    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = if let Some(rest) = raw.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = raw.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(invalid());
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Accepts RFC 3339 timestamps or naive `YYYY-MM-DDTHH:MM[:SS]` wall-clock values,
/// which are interpreted in `offset`.
pub fn parse_event_time(raw: &str, offset: FixedOffset) -> Result<DateTime<FixedOffset>, DomainError> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed);
    }

    let naive = NaiveDateTime::parse_from_str(raw, LOCAL_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|date| date.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|_| {
            DomainError::InvariantViolation(format!(
                "`{raw}` is not a date-time in RFC 3339 (e.g. 2025-01-01T15:00:00) format"
            ))
        })?;

    offset.from_local_datetime(&naive).single().ok_or_else(|| {
        DomainError::InvariantViolation(format!("`{raw}` is ambiguous in offset {offset}"))
    })
}

pub fn format_local(value: &DateTime<FixedOffset>) -> String {
    value.format(LOCAL_TIME_FORMAT).to_string()
}

/// `None` when the interval or the shifted time is outside chrono's range.
pub fn shift(
    value: DateTime<FixedOffset>,
    days: i64,
    hours: i64,
    minutes: i64,
    seconds: i64,
) -> Option<DateTime<FixedOffset>> {
    let delta = Duration::try_days(days)?
        .checked_add(&Duration::try_hours(hours)?)?
        .checked_add(&Duration::try_minutes(minutes)?)?
        .checked_add(&Duration::try_seconds(seconds)?)?;
    value.checked_add_signed(delta)
}
