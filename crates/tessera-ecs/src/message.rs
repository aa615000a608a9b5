//! Messages exchanged between entities and worlds.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::EntityId;

/// A named message with an arbitrary JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub name: String,
    pub payload: Value,
}

impl Message {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            payload: Value::Null,
        }
    }

    pub fn with_payload(name: &str, payload: Value) -> Self {
        Self {
            name: name.to_owned(),
            payload,
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

/// Recipient of a message inside one world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageTarget {
    /// One entity. Dropped if the entity is gone at delivery time.
    Entity(EntityId),
    /// Every live entity.
    Broadcast,
}
