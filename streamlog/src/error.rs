use std::time::Duration;

use thiserror::Error;

use crate::{codec::CodecError, destination::NameError, transport::TransportError};

/// Errors constructing a [`Publisher`](crate::Publisher).
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid destination name: {0}")]
    InvalidDestinationName(#[from] NameError),

    #[error("remote transport requires credentials")]
    MissingCredentials,

    #[error("remote transport requires a region")]
    MissingRegion,

    #[error("unknown region {region:?}")]
    UnknownRegion { region: String },

    #[error("remote transport requires a connector")]
    MissingConnector,

    #[error("test transport mode requested without a transport")]
    MissingTestTransport,

    #[error("failed to connect transport: {0}")]
    Connect(#[source] TransportError),

    #[error("publisher must be created within a tokio runtime")]
    NoRuntime,
}

/// Errors returned to callers of [`Publisher::log`](crate::Publisher::log).
///
/// Failures after a record has been enqueued are never reported here; they
/// surface through logs and the failed record counter.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("encoded message of {size} bytes exceeds the {max} byte limit")]
    OversizedMessage { size: usize, max: usize },

    #[error("write timeout: ingestion queue still full after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("failed to encode message: {0}")]
    Encode(#[from] CodecError),

    #[error("publisher is shut down")]
    Closed,
}
