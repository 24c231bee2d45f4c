use std::fmt;

use crate::error::GripError;

/// The kind of a WebSocket-over-HTTP event.
///
/// Types the proxy may add later survive a decode/encode cycle as [`EventType::Other`].
/// Build those with [`EventType::from_name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    Open,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    Disconnect,
    Other(UnknownType),
}

/// Name of an event type this crate has no variant for.
///
/// Only [`EventType::from_name`] makes one, so it is never empty, never a
/// known name, and never holds a space or line break.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnknownType(String);

impl UnknownType {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "OPEN",
            Self::Text => "TEXT",
            Self::Binary => "BINARY",
            Self::Close => "CLOSE",
            Self::Ping => "PING",
            Self::Pong => "PONG",
            Self::Disconnect => "DISCONNECT",
            Self::Other(name) => name.as_str(),
        }
    }

    /// Rejects names that could not be written back on the wire: empty, or
    /// containing a space, CR or LF.
    pub fn from_name(name: &str) -> Result<Self, GripError> {
        Ok(match name {
            "OPEN" => Self::Open,
            "TEXT" => Self::Text,
            "BINARY" => Self::Binary,
            "CLOSE" => Self::Close,
            "PING" => Self::Ping,
            "PONG" => Self::Pong,
            "DISCONNECT" => Self::Disconnect,
            "" => return Err(GripError::BadFormat("empty event type".into())),
            other if other.contains([' ', '\r', '\n']) => {
                return Err(GripError::BadFormat(format!("invalid event type {other:?}")));
            }
            other => Self::Other(UnknownType(other.to_string())),
        })
    }

    /// Events handed to the application by `receive`.
    pub fn is_data_bearing(&self) -> bool {
        matches!(self, Self::Text | Self::Binary | Self::Close | Self::Disconnect)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event of a WebSocket-over-HTTP body.
///
/// `content: Some(vec![])` (present, empty) and `content: None` are distinct on
/// the wire: `TEXT 0\r\n\r\n` versus `TEXT\r\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketEvent {
    pub kind: EventType,
    pub content: Option<Vec<u8>>,
}

impl WebSocketEvent {
    pub fn new(kind: EventType) -> Self {
        Self {
            kind,
            content: None,
        }
    }

    pub fn with_content(kind: EventType, content: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            content: Some(content.into()),
        }
    }
}
