use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use gomeetup_core::{DomainError, DomainResult, EventId};

/// Keys owned by the store; never accepted from clients as free-form fields.
const RESERVED_KEYS: [&str; 2] = ["id", "_id"];

/// A stored meetup event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub creator: String,
    /// Any other fields the client sent, kept verbatim.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Event creation input.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub creator: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl NewEvent {
    /// Validate required fields and assign an id.
    pub fn into_record(self, id: EventId) -> DomainResult<EventRecord> {
        let kind = self.kind.trim().to_string();
        let name = self.name.trim().to_string();
        let creator = self.creator.trim().to_string();

        for (field, value) in [("type", &kind), ("name", &name), ("creator", &creator)] {
            if value.is_empty() {
                return Err(DomainError::validation(format!("{field} is required")));
            }
        }

        let mut details = self.details;
        for key in RESERVED_KEYS {
            details.remove(key);
        }

        Ok(EventRecord {
            id,
            kind,
            name,
            creator,
            details,
        })
    }
}
