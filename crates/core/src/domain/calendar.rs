use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

/// Event as seen through the calendar provider. The provider is the system of record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: EventId,
    pub summary: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub attendees: Vec<String>,
}

impl CalendarEvent {
    pub fn window(&self) -> TimeWindow {
        TimeWindow { start: self.start, end: self.end }
    }

    pub fn has_attendee(&self, email: &str) -> bool {
        self.attendees.iter().any(|attendee| attendee.eq_ignore_ascii_case(email))
    }
}

/// Half-open interval `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl TimeWindow {
    pub fn new(
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Self, DomainError> {
        if end <= start {
            return Err(DomainError::InvariantViolation(format!(
                "event end `{end}` must be after start `{start}`"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn intersects(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, FixedOffset};

    use super::{CalendarEvent, EventId, TimeWindow};

    fn at(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).expect("valid rfc3339 fixture")
    }

    fn window(start: &str, end: &str) -> TimeWindow {
        TimeWindow::new(at(start), at(end)).expect("valid window")
    }

    #[test]
    fn overlapping_windows_intersect() {
        let booked = window("2025-03-10T10:00:00-03:00", "2025-03-10T11:00:00-03:00");
        let inside = window("2025-03-10T10:15:00-03:00", "2025-03-10T10:45:00-03:00");
        let straddling = window("2025-03-10T09:30:00-03:00", "2025-03-10T10:30:00-03:00");

        assert!(booked.intersects(&inside));
        assert!(booked.intersects(&straddling));
        assert!(straddling.intersects(&booked));
    }

    #[test]
    fn back_to_back_windows_do_not_intersect() {
        let first = window("2025-03-10T10:00:00-03:00", "2025-03-10T11:00:00-03:00");
        let second = window("2025-03-10T11:00:00-03:00", "2025-03-10T12:00:00-03:00");

        assert!(!first.intersects(&second));
        assert!(!second.intersects(&first));
    }

    #[test]
    fn windows_compare_across_offsets() {
        let sao_paulo = window("2025-03-10T10:00:00-03:00", "2025-03-10T11:00:00-03:00");
        let utc = window("2025-03-10T13:30:00+00:00", "2025-03-10T14:30:00+00:00");

        assert!(sao_paulo.intersects(&utc));
    }

    #[test]
    fn empty_or_inverted_window_is_rejected() {
        assert!(TimeWindow::new(at("2025-03-10T10:00:00Z"), at("2025-03-10T10:00:00Z")).is_err());
        assert!(TimeWindow::new(at("2025-03-10T10:00:00Z"), at("2025-03-10T09:00:00Z")).is_err());
    }

    #[test]
    fn attendee_match_ignores_case() {
        let event = CalendarEvent {
            id: EventId("evt-1".to_string()),
            summary: "Sync".to_string(),
            location: None,
            description: None,
            start: at("2025-03-10T10:00:00-03:00"),
            end: at("2025-03-10T11:00:00-03:00"),
            attendees: vec!["Maria@Example.com".to_string()],
        };

        assert!(event.has_attendee("maria@example.com"));
        assert!(!event.has_attendee("joao@example.com"));
    }
}
