use thiserror::Error;

use crate::api::event::CompletionKind;
use crate::central::session::ConnectionState;

/// Status code used when the transport refuses a call outright.
pub const STATUS_CALL_REJECTED: i32 = -1;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid MAC address: {0}")]
    InvalidAddress(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("already in progress")]
    AlreadyInProgress,

    #[error("not connected")]
    NotConnected,

    #[error("profile not prepared")]
    ProfileNotPrepared,

    #[error("{kind} timed out")]
    OperationTimeout { kind: CompletionKind },

    #[error("backend rejected request ({code}): {message}")]
    BackendRejected { code: i32, message: String },

    #[error("no handler registered for {0}")]
    CallbackMissing(String),

    #[error("not allowed while {0:?}")]
    InvalidState(ConnectionState),

    #[error("a session to {address} is already active")]
    SessionActive { address: String },

    #[error("invalid attribute UUID: {0}")]
    InvalidUuid(String),

    #[error("service map is empty")]
    EmptyServiceMap,

    #[error("operation queue closed")]
    QueueClosed,

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn rejected(code: i32, message: impl Into<String>) -> Self {
        Error::BackendRejected {
            code,
            message: message.into(),
        }
    }
}
