pub mod calendar;
pub mod conversation;
pub mod permission;
pub mod user;
