use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use reqwest::{Client, RequestBuilder, Response, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use onboard_core::config::CalendarConfig;
use onboard_core::domain::calendar::{CalendarEvent, EventId};

use crate::provider::{CalendarProvider, EventDraft, EventQuery, ProviderError};

/// Google Calendar v3 REST client authenticated with a bearer access token.
pub struct GoogleCalendarClient {
    http: Client,
    base_url: String,
    calendar_id: String,
    access_token: SecretString,
    time_zone: String,
    offset: FixedOffset,
}

impl GoogleCalendarClient {
    pub fn new(
        base_url: impl Into<String>,
        calendar_id: impl Into<String>,
        access_token: SecretString,
        time_zone: impl Into<String>,
        offset: FixedOffset,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ProviderError::Transport(error.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            calendar_id: calendar_id.into(),
            access_token,
            time_zone: time_zone.into(),
            offset,
        })
    }

    pub fn from_config(config: &CalendarConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let access_token = config.access_token.clone().ok_or_else(|| {
            ProviderError::Transport("calendar.access_token is not configured".to_string())
        })?;
        let offset = config.offset().map_err(|error| ProviderError::Transport(error.to_string()))?;
        Self::new(
            config.api_base_url.clone(),
            config.calendar_id.clone(),
            access_token,
            config.time_zone.clone(),
            offset,
            timeout,
        )
    }

    fn events_url(&self, event_id: Option<&str>) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|error| ProviderError::Transport(format!("invalid base url: {error}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ProviderError::Transport(format!("base url `{}` cannot be a base", self.base_url))
            })?;
            segments.pop_if_empty().extend(["calendars", self.calendar_id.as_str(), "events"]);
            if let Some(event_id) = event_id {
                segments.push(event_id);
            }
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ProviderError> {
        let response = request
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|error| ProviderError::Transport(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GoogleErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or(body);
        warn!(
            event_name = "calendar.provider.http_error",
            status = status.as_u16(),
            message = %message,
            "google calendar request failed"
        );
        Err(ProviderError::Http { status: status.as_u16(), message })
    }

    fn to_wire(&self, draft: &EventDraft, id: Option<&EventId>) -> GoogleEvent {
        GoogleEvent {
            id: id.map(|id| id.0.clone()),
            summary: Some(draft.summary.clone()),
            description: Some(draft.description.clone()),
            location: Some(draft.location.clone()),
            start: GoogleEventTime::at(draft.start, &self.time_zone),
            end: GoogleEventTime::at(draft.end, &self.time_zone),
            attendees: draft
                .attendees
                .iter()
                .map(|email| GoogleAttendee { email: email.clone() })
                .collect(),
        }
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<CalendarEvent>, ProviderError> {
        let mut params = vec![
            ("timeMin", query.time_min.to_rfc3339()),
            ("timeMax", query.time_max.to_rfc3339()),
            ("maxResults", query.max_results.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        if let Some(text) = &query.text {
            params.push(("q", text.clone()));
        }

        let url = self.events_url(None)?;
        debug!(event_name = "calendar.provider.list", url = %url, "listing calendar events");
        let response = self.send(self.http.get(url).query(&params)).await?;
        let listing: GoogleEventList =
            response.json().await.map_err(|error| ProviderError::Decode(error.to_string()))?;

        listing.items.into_iter().map(|event| event.into_domain(self.offset)).collect()
    }

    async fn insert_event(&self, draft: &EventDraft) -> Result<CalendarEvent, ProviderError> {
        let url = self.events_url(None)?;
        let response = self.send(self.http.post(url).json(&self.to_wire(draft, None))).await?;
        let created: GoogleEvent =
            response.json().await.map_err(|error| ProviderError::Decode(error.to_string()))?;
        created.into_domain(self.offset)
    }

    async fn update_event(&self, event: &CalendarEvent) -> Result<CalendarEvent, ProviderError> {
        let draft = EventDraft {
            summary: event.summary.clone(),
            location: event.location.clone().unwrap_or_default(),
            description: event.description.clone().unwrap_or_default(),
            start: event.start,
            end: event.end,
            attendees: event.attendees.clone(),
        };
        let url = self.events_url(Some(&event.id.0))?;
        let response =
            self.send(self.http.put(url).json(&self.to_wire(&draft, Some(&event.id)))).await?;
        let updated: GoogleEvent =
            response.json().await.map_err(|error| ProviderError::Decode(error.to_string()))?;
        updated.into_domain(self.offset)
    }

    async fn delete_event(&self, id: &EventId) -> Result<(), ProviderError> {
        let url = self.events_url(Some(&id.0))?;
        self.send(self.http.delete(url)).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct GoogleEventList {
    #[serde(default)]
    items: Vec<GoogleEvent>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    start: GoogleEventTime,
    end: GoogleEventTime,
    #[serde(default)]
    attendees: Vec<GoogleAttendee>,
}

impl GoogleEvent {
    fn into_domain(self, offset: FixedOffset) -> Result<CalendarEvent, ProviderError> {
        let id = self
            .id
            .ok_or_else(|| ProviderError::Decode("calendar event is missing an id".to_string()))?;
        Ok(CalendarEvent {
            id: EventId(id),
            summary: self.summary.unwrap_or_else(|| "Untitled".to_string()),
            location: self.location,
            description: self.description,
            start: self.start.resolve(offset)?,
            end: self.end.resolve(offset)?,
            attendees: self.attendees.into_iter().map(|attendee| attendee.email).collect(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_time: Option<DateTime<FixedOffset>>,
    /// All-day events carry a date only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

impl GoogleEventTime {
    fn at(value: DateTime<FixedOffset>, time_zone: &str) -> Self {
        Self { date_time: Some(value), date: None, time_zone: Some(time_zone.to_string()) }
    }

    fn resolve(&self, offset: FixedOffset) -> Result<DateTime<FixedOffset>, ProviderError> {
        if let Some(date_time) = self.date_time {
            return Ok(date_time);
        }
        let midnight = self
            .date
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .ok_or_else(|| {
                ProviderError::Decode("event time has neither dateTime nor date".to_string())
            })?;
        offset
            .from_local_datetime(&midnight)
            .single()
            .ok_or_else(|| ProviderError::Decode(format!("ambiguous all-day date {midnight}")))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GoogleAttendee {
    email: String,
}
