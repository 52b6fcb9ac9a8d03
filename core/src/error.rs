//! Error types for the task API client and the synchronization controller.
//!
//! # Design
//! Every non-2xx response lands in a single `Remote` variant carrying the
//! status and the human-readable message, so callers never see a partial
//! success. Transport failures get their own `Network` variant because the
//! user-facing text differs from anything the server could say.

use thiserror::Error;

/// Message shown when the request never reached the server.
pub const NETWORK_MESSAGE: &str = "Network error. Please check your connection.";

pub type ApiResult<T> = Result<T, ApiError>;

/// Input rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title cannot be empty")]
    EmptyTitle,

    #[error("title is {len} characters, the limit is {max}")]
    TitleTooLong { len: usize, max: usize },
}

/// The request could not be executed; no response arrived.
#[derive(Debug, Clone, Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// Coarse classification of `ApiError`, for callers that only branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Network,
    Remote,
    Decode,
    Encode,
}

/// Errors returned by `ApiClient` parse methods and `RemoteAdapter` calls.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Network unreachable, connection reset, DNS failure and the like.
    #[error("Network error. Please check your connection.")]
    Network(#[source] TransportError),

    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Remote { status: u16, message: String },

    /// A 2xx body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Decode(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Encode(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::Network(_) => ErrorKind::Network,
            ApiError::Remote { .. } => ErrorKind::Remote,
            ApiError::Decode(_) => ErrorKind::Decode,
            ApiError::Encode(_) => ErrorKind::Encode,
        }
    }

    /// HTTP status of a `Remote` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Text fit for an end user: the server's message for `Remote`, the fixed
    /// network text for `Network`, the validation reason otherwise.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// Failures reported by `TaskController` operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Another operation on the same task has not resolved yet.
    #[error("task {0} has an operation in flight")]
    Busy(String),

    /// The remote call failed and the local change was reverted. `message`
    /// is the notice that was emitted.
    #[error("{message}")]
    Remote {
        message: String,
        #[source]
        source: ApiError,
    },
}
