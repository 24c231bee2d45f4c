//! Error types for the protocol, publishing, and configuration layers.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum GripError {
    #[error("bad format: {0}")]
    BadFormat(String),

    #[error("read from empty buffer")]
    EmptyBuffer,

    #[error("client disconnected unexpectedly")]
    Disconnected,

    #[error("text frame is not valid utf-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("hold requires at least one channel")]
    NoChannels,
}

impl GripError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::BadFormat(_) => "bad_format",
            Self::EmptyBuffer => "empty_buffer",
            Self::Disconnected => "disconnected",
            Self::InvalidUtf8(_) => "invalid_utf8",
            Self::NoChannels => "no_channels",
        }
    }

    /// True when the connection behind the context can no longer be used.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("no control uri configured")]
    NoControlUri,

    #[error("failed to spawn publish worker: {0}")]
    Spawn(#[source] io::Error),

    #[error("publish worker is no longer running")]
    WorkerGone,

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("control endpoint returned status {0}")]
    Status(u16),

    #[error("failed to sign token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl PublishError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::NoControlUri => "no_control_uri",
            Self::Spawn(_) => "spawn",
            Self::WorkerGone => "worker_gone",
            Self::Http(_) => "http",
            Self::Status(_) => "status",
            Self::Token(_) => "token",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid grip uri: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("config has neither url nor control_uri")]
    MissingControlUri,

    #[error("failed to load config: {0}")]
    Figment(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::InvalidUri(_) => "invalid_uri",
            Self::InvalidKey(_) => "invalid_key",
            Self::MissingControlUri => "missing_control_uri",
            Self::Figment(_) => "figment",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        assert_eq!(GripError::EmptyBuffer.error_code(), "empty_buffer");
        assert_eq!(GripError::Disconnected.error_code(), "disconnected");
        assert_eq!(PublishError::NoControlUri.error_code(), "no_control_uri");
        assert_eq!(PublishError::Status(503).error_code(), "status");
        assert_eq!(
            ConfigError::MissingControlUri.error_code(),
            "missing_control_uri"
        );
    }

    #[test]
    fn only_disconnect_is_fatal() {
        assert!(GripError::Disconnected.is_connection_fatal());
        assert!(!GripError::EmptyBuffer.is_connection_fatal());
        assert!(!GripError::BadFormat("x".into()).is_connection_fatal());
    }

    #[test]
    fn messages() {
        assert_eq!(GripError::EmptyBuffer.to_string(), "read from empty buffer");
        assert_eq!(
            PublishError::Status(500).to_string(),
            "control endpoint returned status 500"
        );
    }
}
