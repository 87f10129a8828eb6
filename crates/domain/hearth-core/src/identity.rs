use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("actor id must not be empty")]
    EmptyActor,
    #[error("actor id is longer than {max} characters")]
    ActorTooLong { max: usize },
    #[error("actor id contains whitespace or control characters")]
    InvalidActor,
    #[error("connection id must be 1..={max} characters, got {len}")]
    ConnectionIdLength { len: usize, max: usize },
    #[error("connection id contains invalid character {0:?}")]
    ConnectionIdChar(char),
}

/// Authenticated identity on whose behalf commands and live views run.
///
/// Resolved by the session layer; this type only guards against values that
/// would be unusable as a channel or storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActorId(String);

impl ActorId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, IdentityError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(IdentityError::EmptyActor);
        }
        if raw.chars().count() > hearth_config::MAX_ACTOR_ID_LEN {
            return Err(IdentityError::ActorTooLong {
                max: hearth_config::MAX_ACTOR_ID_LEN,
            });
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(IdentityError::InvalidActor);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ActorId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ActorId> for String {
    fn from(value: ActorId) -> Self {
        value.0
    }
}

/// Client-generated correlation token for one browser tab / form.
///
/// Untrusted: it routes validation feedback, it never authorizes anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, IdentityError> {
        let raw = raw.into();
        let len = raw.chars().count();
        if len == 0 || len > hearth_config::MAX_CONNECTION_ID_LEN {
            return Err(IdentityError::ConnectionIdLength {
                len,
                max: hearth_config::MAX_CONNECTION_ID_LEN,
            });
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(IdentityError::ConnectionIdChar(bad));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ConnectionId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ConnectionId> for String {
    fn from(value: ConnectionId) -> Self {
        value.0
    }
}
