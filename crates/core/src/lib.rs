pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod password;

pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::calendar::{CalendarEvent, EventId, TimeWindow};
pub use domain::permission::{Capability, PermissionLevel, PermissionSet};
pub use domain::user::{Email, User, UserDirectory, Username};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use password::PasswordDigest;
