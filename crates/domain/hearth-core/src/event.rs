use std::fmt;

use serde::Serialize;

use crate::identity::{ActorId, ConnectionId};

/// Published to an actor after any change to their notifications, including
/// command failures.
pub const NOTIFICATION_UPDATED: &str = "notification.updated";

/// Published to a connection when one of its submissions failed validation.
pub const VALIDATION_FAILED: &str = "validation.failed";

/// Pub/sub routing scope. Only a key; carries no state of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    Global,
    Actor(ActorId),
    Connection(ConnectionId),
}

impl Channel {
    pub fn actor(actor: &ActorId) -> Self {
        Self::Actor(actor.clone())
    }

    pub fn connection(connection: &ConnectionId) -> Self {
        Self::Connection(connection.clone())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Global => f.write_str("global"),
            Channel::Actor(id) => write!(f, "actor:{id}"),
            Channel::Connection(id) => write!(f, "connection:{id}"),
        }
    }
}

/// Fire-and-forget notification. Lives only for the duration of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub kind: String,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    pub fn kind_matches<S: AsRef<str>>(&self, prefixes: &[S]) -> bool {
        prefixes
            .iter()
            .any(|prefix| self.kind.starts_with(prefix.as_ref()))
    }
}
