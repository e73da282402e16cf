use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use onboard_core::domain::calendar::{CalendarEvent, EventId, TimeWindow};

use crate::provider::{CalendarProvider, EventDraft, EventQuery, ProviderError};

/// Process-local calendar used for development and tests.
#[derive(Default)]
pub struct InMemoryCalendar {
    events: RwLock<Vec<CalendarEvent>>,
    next_id: AtomicU64,
    injected_failure: Mutex<Option<ProviderError>>,
}

impl InMemoryCalendar {
    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        let next_id = AtomicU64::new(events.len() as u64);
        Self { events: RwLock::new(events), next_id, injected_failure: Mutex::new(None) }
    }

    /// The next provider call fails with `error`.
    pub async fn fail_next(&self, error: ProviderError) {
        *self.injected_failure.lock().await = Some(error);
    }

    pub async fn snapshot(&self) -> Vec<CalendarEvent> {
        self.events.read().await.clone()
    }

    async fn take_failure(&self) -> Result<(), ProviderError> {
        match self.injected_failure.lock().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn matches_text(event: &CalendarEvent, text: &str) -> bool {
    let needle = text.to_lowercase();
    let haystacks =
        [Some(event.summary.as_str()), event.description.as_deref(), event.location.as_deref()];
    haystacks.into_iter().flatten().any(|value| value.to_lowercase().contains(&needle))
        || event.attendees.iter().any(|attendee| attendee.to_lowercase().contains(&needle))
}

#[async_trait]
impl CalendarProvider for InMemoryCalendar {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<CalendarEvent>, ProviderError> {
        self.take_failure().await?;
        let window = TimeWindow { start: query.time_min, end: query.time_max };
        let events = self.events.read().await;

        let mut matching: Vec<CalendarEvent> = events
            .iter()
            .filter(|event| event.window().intersects(&window))
            .filter(|event| query.text.as_deref().map_or(true, |text| matches_text(event, text)))
            .cloned()
            .collect();
        matching.sort_by_key(|event| event.start);
        matching.truncate(query.max_results as usize);
        Ok(matching)
    }

    async fn insert_event(&self, draft: &EventDraft) -> Result<CalendarEvent, ProviderError> {
        self.take_failure().await?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let event = CalendarEvent {
            id: EventId(format!("evt-{id}")),
            summary: draft.summary.clone(),
            location: Some(draft.location.clone()),
            description: Some(draft.description.clone()),
            start: draft.start,
            end: draft.end,
            attendees: draft.attendees.clone(),
        };
        self.events.write().await.push(event.clone());
        Ok(event)
    }

    async fn update_event(&self, event: &CalendarEvent) -> Result<CalendarEvent, ProviderError> {
        self.take_failure().await?;
        let mut events = self.events.write().await;
        match events.iter_mut().find(|existing| existing.id == event.id) {
            Some(existing) => {
                *existing = event.clone();
                Ok(event.clone())
            }
            None => Err(ProviderError::Http { status: 404, message: "Not Found".to_string() }),
        }
    }

    async fn delete_event(&self, id: &EventId) -> Result<(), ProviderError> {
        self.take_failure().await?;
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|event| &event.id != id);
        if events.len() == before {
            return Err(ProviderError::Http {
                status: 410,
                message: "Resource has been deleted".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, FixedOffset};

    use onboard_core::domain::calendar::{CalendarEvent, EventId};

    use super::InMemoryCalendar;
    use crate::provider::{CalendarProvider, EventDraft, EventQuery, ProviderError};

    fn at(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).expect("fixture time")
    }

    fn event(id: &str, summary: &str, start: &str, end: &str, attendees: &[&str]) -> CalendarEvent {
        CalendarEvent {
            id: EventId(id.to_string()),
            summary: summary.to_string(),
            location: None,
            description: None,
            start: at(start),
            end: at(end),
            attendees: attendees.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn query(text: Option<&str>) -> EventQuery {
        EventQuery {
            time_min: at("2025-03-10T00:00:00-03:00"),
            time_max: at("2025-03-11T00:00:00-03:00"),
            max_results: 10,
            text: text.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn list_filters_window_text_and_orders_by_start() {
        let ana = &["ana@example.com"];
        let calendar = InMemoryCalendar::with_events(vec![
            event("b", "Retro", "2025-03-10T15:00:00-03:00", "2025-03-10T16:00:00-03:00", ana),
            event(
                "a",
                "Kickoff",
                "2025-03-10T09:00:00-03:00",
                "2025-03-10T10:00:00-03:00",
                &["bruno@example.com"],
            ),
            event("c", "Next day", "2025-03-11T09:00:00-03:00", "2025-03-11T10:00:00-03:00", ana),
        ]);

        let all = calendar.list_events(&query(None)).await.expect("list");
        let ids: Vec<&str> = all.iter().map(|e| e.id.0.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let for_ana = calendar.list_events(&query(Some("ANA@example.com"))).await.expect("list");
        assert_eq!(for_ana.len(), 1);
        assert_eq!(for_ana[0].summary, "Retro");
    }

    #[tokio::test]
    async fn insert_update_delete_round_trip() {
        let calendar = InMemoryCalendar::default();
        let created = calendar
            .insert_event(&EventDraft {
                summary: "Welcome".to_string(),
                location: "Room 1".to_string(),
                description: "Welcome".to_string(),
                start: at("2025-03-10T09:00:00-03:00"),
                end: at("2025-03-10T10:00:00-03:00"),
                attendees: vec!["ana@example.com".to_string()],
            })
            .await
            .expect("insert");

        let mut changed = created.clone();
        changed.summary = "Welcome breakfast".to_string();
        calendar.update_event(&changed).await.expect("update");
        assert_eq!(calendar.snapshot().await[0].summary, "Welcome breakfast");

        calendar.delete_event(&created.id).await.expect("delete");
        let second_delete = calendar.delete_event(&created.id).await.expect_err("already gone");
        assert!(second_delete.is_gone());
    }

    #[tokio::test]
    async fn injected_failure_applies_once() {
        let calendar = InMemoryCalendar::default();
        calendar
            .fail_next(ProviderError::Http { status: 403, message: "Forbidden".to_string() })
            .await;

        let error = calendar.list_events(&query(None)).await.expect_err("injected");
        assert!(error.is_permission_denied());
        assert!(calendar.list_events(&query(None)).await.is_ok());
    }
}
