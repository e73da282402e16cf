use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use onboard_core::domain::calendar::{CalendarEvent, EventId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventQuery {
    pub time_min: DateTime<FixedOffset>,
    pub time_max: DateTime<FixedOffset>,
    pub max_results: u32,
    /// Free-text filter. Matches summary, description, location and attendee emails.
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventDraft {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub attendees: Vec<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("calendar provider returned {status}: {message}")]
    Http { status: u16, message: String },
    #[error("calendar provider request failed: {0}")]
    Transport(String),
    #[error("calendar provider response could not be decoded: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn message(&self) -> &str {
        match self {
            Self::Http { message, .. } | Self::Transport(message) | Self::Decode(message) => {
                message
            }
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Http { status, message } => {
                *status == 403 || message.to_ascii_lowercase().contains("forbidden")
            }
            _ => false,
        }
    }

    /// 404 and 410 both mean the event is gone from the provider's point of view.
    pub fn is_gone(&self) -> bool {
        match self {
            Self::Http { status, message } => {
                *status == 404 || *status == 410 || message.to_ascii_lowercase().contains("not found")
            }
            _ => false,
        }
    }
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Events overlapping `[time_min, time_max)`, ordered by start time.
    async fn list_events(&self, query: &EventQuery) -> Result<Vec<CalendarEvent>, ProviderError>;

    async fn insert_event(&self, draft: &EventDraft) -> Result<CalendarEvent, ProviderError>;

    async fn update_event(&self, event: &CalendarEvent) -> Result<CalendarEvent, ProviderError>;

    async fn delete_event(&self, id: &EventId) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::ProviderError;

    #[test]
    fn permission_errors_are_detected_by_status_or_text() {
        let by_status = ProviderError::Http { status: 403, message: "nope".to_string() };
        let by_text = ProviderError::Http {
            status: 400,
            message: "Forbidden: caller is not the organizer".to_string(),
        };
        let other = ProviderError::Http { status: 500, message: "backend".to_string() };

        assert!(by_status.is_permission_denied());
        assert!(by_text.is_permission_denied());
        assert!(!other.is_permission_denied());
        assert!(!ProviderError::Transport("forbidden".to_string()).is_permission_denied());
    }

    #[test]
    fn gone_covers_not_found_and_deleted() {
        assert!(ProviderError::Http { status: 404, message: String::new() }.is_gone());
        assert!(ProviderError::Http { status: 410, message: "Resource has been deleted".into() }
            .is_gone());
        assert!(ProviderError::Http { status: 400, message: "Event not found".into() }.is_gone());
        assert!(!ProviderError::Http { status: 403, message: "forbidden".into() }.is_gone());
    }
}
