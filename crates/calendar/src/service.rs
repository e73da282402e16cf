use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset};
use thiserror::Error;
use tracing::{info, warn};

use onboard_core::clock::Clock;
use onboard_core::config::{CalendarConfig, ConfigError};
use onboard_core::domain::calendar::{CalendarEvent, TimeWindow};

use crate::provider::{CalendarProvider, EventDraft, EventQuery, ProviderError};

pub const DEFAULT_LOCATION: &str = "Not informed";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalendarAction {
    List,
    Create,
    Edit,
    Delete,
}

impl CalendarAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }

    fn progressive(self) -> &'static str {
        match self {
            Self::List => "listing",
            Self::Create => "creating",
            Self::Edit => "editing",
            Self::Delete => "deleting",
        }
    }
}

impl fmt::Display for CalendarAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling failures. `Display` is the message shown to the employee.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("No attendees were added to the event.")]
    NoAttendees,
    #[error("Invalid event time: {0}")]
    InvalidWindow(String),
    #[error("Time conflict detected! There is already an event at the requested time.")]
    TimeConflict,
    #[error("Error: at least one search criterion (title, date or attendee) is required.")]
    MissingCriteria,
    #[error("No events found in the specified period.")]
    NoEventsInPeriod,
    #[error("No event found with the title '{0}'.")]
    NoTitleMatch(String),
    #[error("No event found with the attendee '{0}'.")]
    NoAttendeeMatch(String),
    #[error("Multiple events found ({0}). Be more specific in the search criteria.")]
    MultipleMatches(usize),
    #[error(
        "Permission error: the calendar account is not allowed to {action} this event. \
         Only the organizer can change it."
    )]
    PermissionDenied { action: CalendarAction },
    #[error("Event not found: it may have been deleted by someone else or no longer exists.")]
    NotFound,
    #[error("Error {} event: {message}", .action.progressive())]
    Provider { action: CalendarAction, message: String },
}

impl CalendarError {
    fn from_provider(action: CalendarAction, error: ProviderError) -> Self {
        warn!(
            event_name = "calendar.provider.failed",
            action = action.as_str(),
            error = %error,
            "calendar provider call failed"
        );
        if error.is_permission_denied() {
            Self::PermissionDenied { action }
        } else if error.is_gone() {
            Self::NotFound
        } else {
            Self::Provider { action, message: error.message().to_string() }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarSettings {
    pub offset: FixedOffset,
    pub time_zone: String,
    pub default_event_hours: u32,
    pub search_window_days: u32,
    pub max_search_results: u32,
    pub list_limit: u32,
}

impl CalendarSettings {
    pub fn from_config(config: &CalendarConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            offset: config.offset()?,
            time_zone: config.time_zone.clone(),
            default_event_hours: config.default_event_hours,
            search_window_days: config.search_window_days,
            max_search_results: config.max_search_results,
            list_limit: config.list_limit,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListEventsRequest {
    pub limit: Option<u32>,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    pub attendees: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateEventRequest {
    pub summary: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    pub attendees: Vec<String>,
}

/// Criteria locating exactly one event for edit or delete.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventSearch {
    pub summary: Option<String>,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    pub attendee: Option<String>,
}

impl EventSearch {
    fn is_empty(&self) -> bool {
        self.summary.as_deref().map_or(true, |value| value.trim().is_empty())
            && self.attendee.as_deref().map_or(true, |value| value.trim().is_empty())
            && self.start.is_none()
            && self.end.is_none()
    }
}

/// Fields left as `None` keep their current value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventChanges {
    pub summary: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    pub attendees: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct CalendarService {
    provider: Arc<dyn CalendarProvider>,
    clock: Arc<dyn Clock>,
    settings: CalendarSettings,
}

impl CalendarService {
    pub fn new(
        provider: Arc<dyn CalendarProvider>,
        clock: Arc<dyn Clock>,
        settings: CalendarSettings,
    ) -> Self {
        Self { provider, clock, settings }
    }

    pub fn settings(&self) -> &CalendarSettings {
        &self.settings
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Current time in the configured offset.
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now().with_timezone(&self.settings.offset)
    }

    fn default_window(
        &self,
        start: Option<DateTime<FixedOffset>>,
        end: Option<DateTime<FixedOffset>>,
    ) -> Result<TimeWindow, CalendarError> {
        let start = start.unwrap_or_else(|| self.now());
        let end = match end {
            Some(end) => end,
            None => after(start, Duration::days(i64::from(self.settings.search_window_days)))?,
        };
        TimeWindow::new(start, end).map_err(|error| CalendarError::InvalidWindow(error.to_string()))
    }

    pub async fn list_events(
        &self,
        request: ListEventsRequest,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let window = self.default_window(request.start, request.end)?;
        let limit = request.limit.filter(|limit| *limit > 0).unwrap_or(self.settings.list_limit);
        let attendees = clean_emails(request.attendees);

        let mut events = if attendees.is_empty() {
            self.query(CalendarAction::List, window, limit, None).await?
        } else {
            let mut seen = HashSet::new();
            let mut collected = Vec::new();
            for attendee in &attendees {
                let found = self
                    .query(CalendarAction::List, window, limit, Some(attendee.clone()))
                    .await?;
                for event in found.into_iter().filter(|event| event.has_attendee(attendee)) {
                    if seen.insert(event.id.clone()) {
                        collected.push(event);
                    }
                }
            }
            collected
        };

        events.sort_by_key(|event| event.start);
        events.truncate(limit as usize);
        Ok(events)
    }

    pub async fn create_event(
        &self,
        request: CreateEventRequest,
    ) -> Result<CalendarEvent, CalendarError> {
        let attendees = clean_emails(request.attendees);
        if attendees.is_empty() {
            return Err(CalendarError::NoAttendees);
        }

        let start = request.start.unwrap_or_else(|| self.now());
        let end = match request.end {
            Some(end) => end,
            None => after(start, Duration::hours(i64::from(self.settings.default_event_hours)))?,
        };
        let window = TimeWindow::new(start, end)
            .map_err(|error| CalendarError::InvalidWindow(error.to_string()))?;

        let busy = self
            .query(CalendarAction::Create, window, self.settings.max_search_results, None)
            .await?;
        if busy.iter().any(|event| event.window().intersects(&window)) {
            info!(
                event_name = "calendar.event.conflict",
                start = %window.start,
                end = %window.end,
                "requested slot overlaps an existing event"
            );
            return Err(CalendarError::TimeConflict);
        }

        let summary = request.summary.trim().to_string();
        let description = request
            .description
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| summary.clone());
        let location = request
            .location
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        let draft = EventDraft { summary, location, description, start, end, attendees };

        let created = self
            .provider
            .insert_event(&draft)
            .await
            .map_err(|error| CalendarError::from_provider(CalendarAction::Create, error))?;
        info!(
            event_name = "calendar.event.created",
            event_id = %created.id.0,
            provider = self.provider.name(),
            "calendar event created"
        );
        Ok(created)
    }

    pub async fn edit_event(
        &self,
        search: EventSearch,
        changes: EventChanges,
    ) -> Result<CalendarEvent, CalendarError> {
        let mut event = self.find_single(CalendarAction::Edit, &search).await?;

        if let Some(summary) = changes.summary.filter(|value| !value.trim().is_empty()) {
            event.summary = summary;
        }
        if let Some(location) = changes.location {
            event.location = Some(location);
        }
        if let Some(description) = changes.description {
            event.description = Some(description);
        }
        if let Some(start) = changes.start {
            event.start = start;
        }
        if let Some(end) = changes.end {
            event.end = end;
        }
        if let Some(attendees) = changes.attendees {
            event.attendees = clean_emails(attendees);
        }
        TimeWindow::new(event.start, event.end)
            .map_err(|error| CalendarError::InvalidWindow(error.to_string()))?;

        let updated = self
            .provider
            .update_event(&event)
            .await
            .map_err(|error| CalendarError::from_provider(CalendarAction::Edit, error))?;
        info!(event_name = "calendar.event.updated", event_id = %updated.id.0, "calendar event updated");
        Ok(updated)
    }

    /// Deletes the single event matching `search` and returns it.
    pub async fn delete_event(&self, search: EventSearch) -> Result<CalendarEvent, CalendarError> {
        let event = self.find_single(CalendarAction::Delete, &search).await?;
        self.provider
            .delete_event(&event.id)
            .await
            .map_err(|error| CalendarError::from_provider(CalendarAction::Delete, error))?;
        info!(event_name = "calendar.event.deleted", event_id = %event.id.0, "calendar event deleted");
        Ok(event)
    }

    async fn find_single(
        &self,
        action: CalendarAction,
        search: &EventSearch,
    ) -> Result<CalendarEvent, CalendarError> {
        if search.is_empty() {
            return Err(CalendarError::MissingCriteria);
        }

        let window = self.default_window(search.start, search.end)?;
        let mut candidates =
            self.query(action, window, self.settings.max_search_results, None).await?;
        if candidates.is_empty() {
            return Err(CalendarError::NoEventsInPeriod);
        }

        if let Some(title) = search.summary.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let needle = title.to_lowercase();
            candidates.retain(|event| event.summary.to_lowercase().contains(&needle));
            if candidates.is_empty() {
                return Err(CalendarError::NoTitleMatch(title.to_string()));
            }
        }

        if let Some(email) = search.attendee.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            candidates.retain(|event| event.has_attendee(email));
            if candidates.is_empty() {
                return Err(CalendarError::NoAttendeeMatch(email.to_string()));
            }
        }

        match candidates.len() {
            1 => Ok(candidates.remove(0)),
            count => Err(CalendarError::MultipleMatches(count)),
        }
    }

    async fn query(
        &self,
        action: CalendarAction,
        window: TimeWindow,
        max_results: u32,
        text: Option<String>,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let query = EventQuery { time_min: window.start, time_max: window.end, max_results, text };
        self.provider
            .list_events(&query)
            .await
            .map_err(|error| CalendarError::from_provider(action, error))
    }
}

fn after(
    start: DateTime<FixedOffset>,
    span: Duration,
) -> Result<DateTime<FixedOffset>, CalendarError> {
    start
        .checked_add_signed(span)
        .ok_or_else(|| CalendarError::InvalidWindow(format!("{start} is out of range")))
}

fn clean_emails(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty())
        .collect()
}
