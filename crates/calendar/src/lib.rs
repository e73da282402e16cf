//! Calendar access for the onboarding assistant.
//!
//! The provider is the system of record. [`CalendarService`] layers the scheduling
//! rules (defaults, conflict detection, single-match edits and deletes) on top of a
//! [`CalendarProvider`], and [`TokenStore`] tracks which employees have stored
//! calendar authorization for a permission level.

pub mod credentials;
pub mod google;
pub mod memory;
pub mod provider;
pub mod service;

pub use credentials::{CredentialError, TokenStore};
pub use google::GoogleCalendarClient;
pub use memory::InMemoryCalendar;
pub use provider::{CalendarProvider, EventDraft, EventQuery, ProviderError};
pub use service::{
    CalendarAction, CalendarError, CalendarService, CalendarSettings, CreateEventRequest,
    EventChanges, EventSearch, ListEventsRequest,
};
