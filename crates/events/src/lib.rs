//! `gomeetup-events`: meetup event records.
//!
//! Events are free-form documents with three required fields. They have no
//! relationship to user profiles beyond the denormalized `creator` string.

pub mod event;

pub use event::{EventRecord, NewEvent};
