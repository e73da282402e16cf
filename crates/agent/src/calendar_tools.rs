//! Calendar and time tools exposed to the calendar agent.
//!
//! Every calendar tool asks the [`GuardrailPolicy`] before touching the provider. Scheduling
//! failures come back as text so the model can relay them to the employee.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use serde::Deserialize;
use serde_json::{json, Value};

use onboard_calendar::{
    CalendarAction, CalendarService, CreateEventRequest, EventChanges, EventSearch,
    ListEventsRequest,
};
use onboard_core::clock::{format_local, parse_event_time, shift};
use onboard_core::domain::calendar::CalendarEvent;
use onboard_core::domain::permission::PermissionLevel;

use crate::guardrails::{GuardrailDecision, GuardrailPolicy};
use crate::tools::{parse_args, EmailList, Tool, ToolRegistry};

pub const LIST_EVENTS: &str = "get_calendar_events";
pub const CREATE_EVENT: &str = "create_calendar_event";
pub const EDIT_EVENT: &str = "edit_calendar_event";
pub const DELETE_EVENT: &str = "delete_calendar_event";
pub const CURRENT_TIME: &str = "current_time";
pub const TIME_DELTA: &str = "time_delta";
pub const SPECIFIC_TIME: &str = "specific_time";

const DATE_HINT: &str = "use the format YYYY-MM-DDTHH:MM:SS";

struct CalendarToolContext {
    service: CalendarService,
    policy: GuardrailPolicy,
    level: PermissionLevel,
}

impl CalendarToolContext {
    fn deny(&self, action: CalendarAction) -> Option<Value> {
        match self.policy.evaluate(self.level, action) {
            GuardrailDecision::Allow => None,
            GuardrailDecision::Deny { reason_code, user_message, .. } => {
                tracing::info!(
                    event_name = "guardrail.denied",
                    reason_code,
                    level = self.level.as_str(),
                    "calendar tool call blocked"
                );
                Some(Value::String(user_message))
            }
        }
    }

    fn offset(&self) -> FixedOffset {
        self.service.settings().offset
    }

    fn time(&self, raw: Option<String>) -> Result<Option<DateTime<FixedOffset>>, Value> {
        match raw.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
            None => Ok(None),
            Some(value) => parse_event_time(value, self.offset())
                .map(Some)
                .map_err(|_| Value::String(format!("Invalid date `{value}`: {DATE_HINT}."))),
        }
    }
}

/// Builds the calendar agent's tool set for one request.
pub fn calendar_toolset(
    service: CalendarService,
    policy: GuardrailPolicy,
    level: PermissionLevel,
) -> ToolRegistry {
    let context = Arc::new(CalendarToolContext { service, policy, level });
    let mut registry = ToolRegistry::default();
    registry.register(ListEventsTool(context.clone()));
    registry.register(CreateEventTool(context.clone()));
    registry.register(EditEventTool(context.clone()));
    registry.register(DeleteEventTool(context.clone()));
    registry.register(CurrentTimeTool(context.clone()));
    registry.register(TimeDeltaTool(context.clone()));
    registry.register(SpecificTimeTool(context));
    registry
}

fn render_event(event: &CalendarEvent) -> Value {
    let attendees = if event.attendees.is_empty() {
        vec!["Only the organizer is invited to this event.".to_string()]
    } else {
        event.attendees.clone()
    };
    json!({
        "id": event.id.0,
        "summary": event.summary,
        "description": event.description.as_deref().unwrap_or("No description"),
        "location": event.location.as_deref().unwrap_or("Not informed"),
        "start": format_local(&event.start),
        "end": format_local(&event.end),
        "attendees": attendees,
    })
}

fn date_property(description: &str) -> Value {
    json!({ "type": "string", "description": format!("{description}; {DATE_HINT}") })
}

struct ListEventsTool(Arc<CalendarToolContext>);

#[derive(Deserialize)]
struct ListEventsArgs {
    #[serde(default)]
    max_results: Option<u32>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    attendees: EmailList,
}

#[async_trait]
impl Tool for ListEventsTool {
    fn name(&self) -> &'static str {
        LIST_EVENTS
    }

    fn description(&self) -> &'static str {
        "Lists calendar events in a period, optionally only those of the given attendees."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "max_results": { "type": "integer", "description": "Maximum number of events, default 5" },
                "start_date": date_property("Start of the period, default now"),
                "end_date": date_property("End of the period, default 30 days after the start"),
                "attendees": { "type": "array", "items": { "type": "string" }, "description": "Attendee emails" }
            }
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        if let Some(denied) = self.0.deny(CalendarAction::List) {
            return Ok(denied);
        }
        let args: ListEventsArgs = parse_args(LIST_EVENTS, input)?;
        let (start, end) = match (self.0.time(args.start_date), self.0.time(args.end_date)) {
            (Ok(start), Ok(end)) => (start, end),
            (Err(message), _) | (_, Err(message)) => return Ok(message),
        };

        let request =
            ListEventsRequest { limit: args.max_results, start, end, attendees: args.attendees.into_vec() };
        match self.0.service.list_events(request).await {
            Ok(events) if events.is_empty() => {
                Ok(Value::String("No events found in the specified period.".to_string()))
            }
            Ok(events) => Ok(Value::Array(events.iter().map(render_event).collect())),
            Err(error) => Ok(Value::String(error.to_string())),
        }
    }
}

struct CreateEventTool(Arc<CalendarToolContext>);

#[derive(Deserialize)]
struct CreateEventArgs {
    summary: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    attendees: EmailList,
}

#[async_trait]
impl Tool for CreateEventTool {
    fn name(&self) -> &'static str {
        CREATE_EVENT
    }

    fn description(&self) -> &'static str {
        "Creates a calendar event after checking the attendees' agendas for conflicts."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "summary": { "type": "string", "description": "Event title" },
                "location": { "type": "string" },
                "description": { "type": "string", "description": "Defaults to the title" },
                "start": date_property("Start, default now"),
                "end": date_property("End, default 3 hours after the start"),
                "attendees": { "type": "array", "items": { "type": "string" }, "description": "Attendee emails" }
            },
            "required": ["summary", "attendees"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        if let Some(denied) = self.0.deny(CalendarAction::Create) {
            return Ok(denied);
        }
        let args: CreateEventArgs = parse_args(CREATE_EVENT, input)?;
        let (start, end) = match (self.0.time(args.start), self.0.time(args.end)) {
            (Ok(start), Ok(end)) => (start, end),
            (Err(message), _) | (_, Err(message)) => return Ok(message),
        };

        let request = CreateEventRequest {
            summary: args.summary,
            location: args.location,
            description: args.description,
            start,
            end,
            attendees: args.attendees.into_vec(),
        };
        match self.0.service.create_event(request).await {
            Ok(event) => Ok(Value::String(format!(
                "Event created successfully! '{}' from {} to {}.",
                event.summary,
                format_local(&event.start),
                format_local(&event.end)
            ))),
            Err(error) => Ok(Value::String(error.to_string())),
        }
    }
}

#[derive(Deserialize)]
struct SearchArgs {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    attendee: Option<String>,
}

impl CalendarToolContext {
    fn search(&self, args: SearchArgs) -> Result<EventSearch, Value> {
        Ok(EventSearch {
            summary: args.summary,
            start: self.time(args.start_date)?,
            end: self.time(args.end_date)?,
            attendee: args.attendee,
        })
    }
}

fn search_properties() -> serde_json::Map<String, Value> {
    let mut properties = serde_json::Map::new();
    properties.insert(
        "summary".to_string(),
        json!({ "type": "string", "description": "Part of the event title, case-insensitive" }),
    );
    properties.insert("start_date".to_string(), date_property("Start of the search period"));
    properties.insert("end_date".to_string(), date_property("End of the search period"));
    properties.insert(
        "attendee".to_string(),
        json!({ "type": "string", "description": "Email of an attendee of the event" }),
    );
    properties
}

struct EditEventTool(Arc<CalendarToolContext>);

#[derive(Deserialize)]
struct EditEventArgs {
    #[serde(flatten)]
    search: SearchArgs,
    #[serde(default)]
    new_summary: Option<String>,
    #[serde(default)]
    new_location: Option<String>,
    #[serde(default)]
    new_description: Option<String>,
    #[serde(default)]
    new_start: Option<String>,
    #[serde(default)]
    new_end: Option<String>,
    #[serde(default)]
    new_attendees: Option<EmailList>,
}

#[async_trait]
impl Tool for EditEventTool {
    fn name(&self) -> &'static str {
        EDIT_EVENT
    }

    fn description(&self) -> &'static str {
        "Edits exactly one event found by title, period or attendee. Only the new_* fields given are changed."
    }

    fn parameters(&self) -> Value {
        let mut properties = search_properties();
        properties.insert("new_summary".to_string(), json!({ "type": "string" }));
        properties.insert("new_location".to_string(), json!({ "type": "string" }));
        properties.insert("new_description".to_string(), json!({ "type": "string" }));
        properties.insert("new_start".to_string(), date_property("New start"));
        properties.insert("new_end".to_string(), date_property("New end"));
        properties.insert(
            "new_attendees".to_string(),
            json!({ "type": "string", "description": "Comma-separated attendee emails replacing the current list" }),
        );
        json!({ "type": "object", "properties": properties })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        if let Some(denied) = self.0.deny(CalendarAction::Edit) {
            return Ok(denied);
        }
        let args: EditEventArgs = parse_args(EDIT_EVENT, input)?;
        let search = match self.0.search(args.search) {
            Ok(search) => search,
            Err(message) => return Ok(message),
        };
        let (start, end) = match (self.0.time(args.new_start), self.0.time(args.new_end)) {
            (Ok(start), Ok(end)) => (start, end),
            (Err(message), _) | (_, Err(message)) => return Ok(message),
        };

        let changes = EventChanges {
            summary: args.new_summary,
            location: args.new_location,
            description: args.new_description,
            start,
            end,
            attendees: args.new_attendees.map(EmailList::into_vec).filter(|list| !list.is_empty()),
        };
        match self.0.service.edit_event(search, changes).await {
            Ok(event) => {
                Ok(Value::String(format!("Event '{}' updated successfully!", event.summary)))
            }
            Err(error) => Ok(Value::String(error.to_string())),
        }
    }
}

struct DeleteEventTool(Arc<CalendarToolContext>);

#[async_trait]
impl Tool for DeleteEventTool {
    fn name(&self) -> &'static str {
        DELETE_EVENT
    }

    fn description(&self) -> &'static str {
        "Deletes exactly one event found by title, period or attendee."
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": search_properties() })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        if let Some(denied) = self.0.deny(CalendarAction::Delete) {
            return Ok(denied);
        }
        let args: SearchArgs = parse_args(DELETE_EVENT, input)?;
        let search = match self.0.search(args) {
            Ok(search) => search,
            Err(message) => return Ok(message),
        };

        match self.0.service.delete_event(search).await {
            Ok(event) => {
                Ok(Value::String(format!("Event '{}' deleted successfully!", event.summary)))
            }
            Err(error) => Ok(Value::String(error.to_string())),
        }
    }
}

struct CurrentTimeTool(Arc<CalendarToolContext>);

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &'static str {
        CURRENT_TIME
    }

    fn description(&self) -> &'static str {
        "Returns the current date and time (YYYY-MM-DDTHH:MM:SS)."
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: Value) -> Result<Value> {
        Ok(Value::String(format_local(&self.0.service.now())))
    }
}

struct TimeDeltaTool(Arc<CalendarToolContext>);

#[derive(Deserialize)]
struct TimeDeltaArgs {
    #[serde(default)]
    delta_days: i64,
    #[serde(default)]
    delta_hours: i64,
    #[serde(default)]
    delta_minutes: i64,
    #[serde(default)]
    delta_seconds: i64,
}

#[async_trait]
impl Tool for TimeDeltaTool {
    fn name(&self) -> &'static str {
        TIME_DELTA
    }

    fn description(&self) -> &'static str {
        "Returns the current date and time plus an interval (YYYY-MM-DDTHH:MM:SS)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "delta_days": { "type": "integer" },
                "delta_hours": { "type": "integer" },
                "delta_minutes": { "type": "integer" },
                "delta_seconds": { "type": "integer" }
            }
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let args: TimeDeltaArgs = parse_args(TIME_DELTA, input)?;
        let shifted = shift(
            self.0.service.now(),
            args.delta_days,
            args.delta_hours,
            args.delta_minutes,
            args.delta_seconds,
        );
        match shifted {
            Some(value) => Ok(Value::String(format_local(&value))),
            None => Ok(Value::String("Interval too large.".to_string())),
        }
    }
}

struct SpecificTimeTool(Arc<CalendarToolContext>);

#[derive(Deserialize)]
struct SpecificTimeArgs {
    year: i32,
    month: u32,
    day: u32,
    #[serde(default)]
    hour: u32,
    #[serde(default)]
    minute: u32,
}

#[async_trait]
impl Tool for SpecificTimeTool {
    fn name(&self) -> &'static str {
        SPECIFIC_TIME
    }

    fn description(&self) -> &'static str {
        "Builds a specific date and time (YYYY-MM-DDTHH:MM:SS)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "year": { "type": "integer" },
                "month": { "type": "integer" },
                "day": { "type": "integer" },
                "hour": { "type": "integer" },
                "minute": { "type": "integer" }
            },
            "required": ["year", "month", "day"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let args: SpecificTimeArgs = parse_args(SPECIFIC_TIME, input)?;
        let local = NaiveDate::from_ymd_opt(args.year, args.month, args.day)
            .and_then(|date| date.and_hms_opt(args.hour, args.minute, 0))
            .and_then(|naive| self.0.offset().from_local_datetime(&naive).single());

        match local {
            Some(value) => Ok(Value::String(format_local(&value))),
            None => Ok(Value::String(format!(
                "Invalid date {:04}-{:02}-{:02} {:02}:{:02}.",
                args.year, args.month, args.day, args.hour, args.minute
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, FixedOffset};
    use serde_json::{json, Value};

    use onboard_calendar::{CalendarService, CalendarSettings, InMemoryCalendar};
    use onboard_core::clock::FixedClock;
    use onboard_core::domain::calendar::{CalendarEvent, EventId};
    use onboard_core::domain::permission::PermissionLevel;

    use super::{
        calendar_toolset, CREATE_EVENT, CURRENT_TIME, DELETE_EVENT, EDIT_EVENT, LIST_EVENTS,
        SPECIFIC_TIME, TIME_DELTA,
    };
    use crate::guardrails::GuardrailPolicy;
    use crate::llm::ToolCall;
    use crate::tools::ToolRegistry;

    fn at(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).expect("fixture time")
    }

    fn toolset(level: PermissionLevel) -> (ToolRegistry, Arc<InMemoryCalendar>) {
        let calendar = Arc::new(InMemoryCalendar::with_events(vec![CalendarEvent {
            id: EventId("kickoff".to_string()),
            summary: "Onboarding kickoff".to_string(),
            location: Some("Room 2".to_string()),
            description: None,
            start: at("2025-03-10T10:00:00-03:00"),
            end: at("2025-03-10T11:00:00-03:00"),
            attendees: vec!["ana@example.com".to_string()],
        }]));
        let settings = CalendarSettings {
            offset: FixedOffset::west_opt(3 * 3600).expect("offset"),
            time_zone: "America/Sao_Paulo".to_string(),
            default_event_hours: 3,
            search_window_days: 30,
            max_search_results: 10,
            list_limit: 5,
        };
        let service = CalendarService::new(
            calendar.clone(),
            Arc::new(FixedClock(at("2025-03-10T08:00:00-03:00"))),
            settings,
        );
        (calendar_toolset(service, GuardrailPolicy::default(), level), calendar)
    }

    async fn run(registry: &ToolRegistry, name: &str, arguments: Value) -> String {
        registry
            .dispatch(&ToolCall { id: "call".to_string(), name: name.to_string(), arguments })
            .await
    }

    #[test]
    fn registers_all_calendar_and_time_tools() {
        let (registry, _) = toolset(PermissionLevel::FullAccess);
        let mut expected = vec![
            LIST_EVENTS,
            CREATE_EVENT,
            EDIT_EVENT,
            DELETE_EVENT,
            CURRENT_TIME,
            TIME_DELTA,
            SPECIFIC_TIME,
        ];
        expected.sort_unstable();
        assert_eq!(registry.names(), expected);
    }

    #[tokio::test]
    async fn readonly_users_can_list_but_not_delete() {
        let (registry, calendar) = toolset(PermissionLevel::Readonly);

        let listed = run(&registry, LIST_EVENTS, json!({})).await;
        assert!(listed.contains("Onboarding kickoff"));
        assert!(listed.contains("2025-03-10T10:00:00"));

        let denied = run(&registry, DELETE_EVENT, json!({ "summary": "kickoff" })).await;
        assert!(denied.starts_with("Permission error"));
        assert_eq!(calendar.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn read_update_cannot_create() {
        let (registry, calendar) = toolset(PermissionLevel::ReadUpdate);

        let denied = run(
            &registry,
            CREATE_EVENT,
            json!({ "summary": "Sync", "attendees": ["ana@example.com"] }),
        )
        .await;

        assert!(denied.starts_with("Permission error"));
        assert_eq!(calendar.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn create_reports_conflicts_and_success() {
        let (registry, calendar) = toolset(PermissionLevel::FullAccess);

        let conflict = run(
            &registry,
            CREATE_EVENT,
            json!({
                "summary": "Sync",
                "start": "2025-03-10T10:30:00",
                "end": "2025-03-10T11:30:00",
                "attendees": "ana@example.com"
            }),
        )
        .await;
        assert!(conflict.starts_with("Time conflict detected!"));

        let created = run(
            &registry,
            CREATE_EVENT,
            json!({
                "summary": "Sync",
                "start": "2025-03-10T14:00:00",
                "end": "2025-03-10T15:00:00",
                "attendees": ["ana@example.com", "bruno@example.com"]
            }),
        )
        .await;
        assert_eq!(
            created,
            "Event created successfully! 'Sync' from 2025-03-10T14:00:00 to 2025-03-10T15:00:00."
        );
        assert_eq!(calendar.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn invalid_dates_are_reported_to_the_model() {
        let (registry, _) = toolset(PermissionLevel::FullAccess);

        let output = run(&registry, LIST_EVENTS, json!({ "start_date": "next tuesday" })).await;

        assert!(output.starts_with("Invalid date `next tuesday`"));
    }

    #[tokio::test]
    async fn edit_replaces_attendees_from_a_comma_separated_list() {
        let (registry, calendar) = toolset(PermissionLevel::ReadCreateUpdate);

        let output = run(
            &registry,
            EDIT_EVENT,
            json!({ "summary": "kickoff", "new_attendees": "ana@example.com, carla@example.com" }),
        )
        .await;

        assert_eq!(output, "Event 'Onboarding kickoff' updated successfully!");
        assert_eq!(
            calendar.snapshot().await[0].attendees,
            vec!["ana@example.com".to_string(), "carla@example.com".to_string()]
        );
    }

    #[tokio::test]
    async fn delete_requires_a_criterion() {
        let (registry, _) = toolset(PermissionLevel::FullAccess);

        let output = run(&registry, DELETE_EVENT, json!({})).await;

        assert_eq!(
            output,
            "Error: at least one search criterion (title, date or attendee) is required."
        );
    }

    #[tokio::test]
    async fn time_tools_use_the_configured_offset() {
        let (registry, _) = toolset(PermissionLevel::Readonly);

        assert_eq!(run(&registry, CURRENT_TIME, json!({})).await, "2025-03-10T08:00:00");
        assert_eq!(
            run(&registry, TIME_DELTA, json!({ "delta_days": 1, "delta_hours": 2 })).await,
            "2025-03-11T10:00:00"
        );
        assert_eq!(
            run(
                &registry,
                TIME_DELTA,
                json!({ "delta_days": 200_000_000_000_i64, "delta_seconds": -17_280_000_000_000_000_i64 })
            )
            .await,
            "Interval too large."
        );
        assert_eq!(
            run(&registry, SPECIFIC_TIME, json!({ "year": 2025, "month": 4, "day": 1, "hour": 9, "minute": 30 }))
                .await,
            "2025-04-01T09:30:00"
        );
        assert!(run(&registry, SPECIFIC_TIME, json!({ "year": 2025, "month": 2, "day": 30 }))
            .await
            .starts_with("Invalid date"));
    }
}
