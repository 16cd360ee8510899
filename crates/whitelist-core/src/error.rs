//! Error types for the whitelist binding service

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for whitelist operations
pub type Result<T> = std::result::Result<T, WhitelistError>;

/// Whitelist error types
///
/// Display strings are the user-facing text; [`WhitelistError::kind`] gives
/// the structured classification used in logs and responses.
#[derive(Debug, Error)]
pub enum WhitelistError {
    /// Game ID or command arguments are malformed
    #[error("Invalid input: {0}")]
    InvalidFormat(String),

    /// Caller lacks the administrator capability
    #[error("Permission denied: this command is restricted to administrators")]
    Unauthorized,

    /// Request came from an origin outside the allow-set
    #[error("{0}")]
    OriginRefused(String),

    /// Insert raced with another binding of the same game ID
    #[error("Game ID {0} has already been bound")]
    DuplicateGameId(String),

    /// Game ID is bound to a different owner
    #[error("Game ID {0} is already bound to another account")]
    BoundToOther(String),

    /// Game ID is already bound to the requester
    #[error("Game ID {0} is already bound to your account")]
    AlreadyBound(String),

    /// Owner holds the maximum number of live bindings
    #[error("Binding limit reached: {owner} already holds {max} game IDs")]
    QuotaExceeded { owner: String, max: usize },

    /// No binding matches the identifier
    #[error("No binding found for {0}")]
    NotFound(String),

    /// Requester has no binding with this game ID
    #[error("Game ID {0} is not bound to your account")]
    NotYoursOrNotFound(String),

    /// Network failure or timeout while opening the console session
    #[error("RCON connect failed: {0}")]
    ConnectError(String),

    /// Shared secret rejected by the remote console
    #[error("RCON authentication failed")]
    AuthError,

    /// Session not connected, or remote closed mid-exchange
    #[error("RCON protocol error: {0}")]
    ProtocolError(String),

    /// Remote console could not be reached for this operation
    #[error("Game server unavailable: {0}")]
    RemoteUnavailable(#[source] Box<WhitelistError>),

    /// Remote console answered with a recognized failure marker
    #[error("Game server refused the request: {0}")]
    RemoteRejected(String),

    /// Response shape not recognized (status/list query only)
    #[error("Unrecognized server response: {0}")]
    ParseUnstable(String),

    /// Persistent store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration, fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Inbound transport failure (stdin/stdout)
    #[error("I/O error: {0}")]
    Io(String),
}

/// Structured error classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorKind {
    InvalidFormat,
    Unauthorized,
    OriginRefused,
    DuplicateGameId,
    BoundToOther,
    AlreadyBound,
    QuotaExceeded,
    NotFound,
    NotYoursOrNotFound,
    ConnectError,
    AuthError,
    ProtocolError,
    RemoteUnavailable,
    RemoteRejected,
    ParseUnstable,
    Storage,
    Config,
    Io,
}

impl WhitelistError {
    /// Get the structured kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            WhitelistError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            WhitelistError::Unauthorized => ErrorKind::Unauthorized,
            WhitelistError::OriginRefused(_) => ErrorKind::OriginRefused,
            WhitelistError::DuplicateGameId(_) => ErrorKind::DuplicateGameId,
            WhitelistError::BoundToOther(_) => ErrorKind::BoundToOther,
            WhitelistError::AlreadyBound(_) => ErrorKind::AlreadyBound,
            WhitelistError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            WhitelistError::NotFound(_) => ErrorKind::NotFound,
            WhitelistError::NotYoursOrNotFound(_) => ErrorKind::NotYoursOrNotFound,
            WhitelistError::ConnectError(_) => ErrorKind::ConnectError,
            WhitelistError::AuthError => ErrorKind::AuthError,
            WhitelistError::ProtocolError(_) => ErrorKind::ProtocolError,
            WhitelistError::RemoteUnavailable(_) => ErrorKind::RemoteUnavailable,
            WhitelistError::RemoteRejected(_) => ErrorKind::RemoteRejected,
            WhitelistError::ParseUnstable(_) => ErrorKind::ParseUnstable,
            WhitelistError::Storage(_) => ErrorKind::Storage,
            WhitelistError::Config(_) => ErrorKind::Config,
            WhitelistError::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether this error came from the console transport
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            WhitelistError::ConnectError(_)
                | WhitelistError::AuthError
                | WhitelistError::ProtocolError(_)
        )
    }

    /// Wrap a transport error as `RemoteUnavailable`, leaving others untouched
    pub fn into_remote_unavailable(self) -> Self {
        if self.is_transport() {
            WhitelistError::RemoteUnavailable(Box::new(self))
        } else {
            self
        }
    }
}

impl From<toml::de::Error> for WhitelistError {
    fn from(err: toml::de::Error) -> Self {
        WhitelistError::Config(err.to_string())
    }
}
