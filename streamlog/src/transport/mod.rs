//! The seam between a publisher and the stream service.

use std::fmt::{Debug, Display};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod memory;
pub mod mock;
pub mod remote;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("destination {0:?} does not exist")]
    DestinationNotFound(String),

    #[error("destination {0:?} already exists")]
    DestinationExists(String),

    #[error("invalid destination name {0:?}")]
    InvalidDestinationName(String),

    #[error("invalid shard count {0}")]
    InvalidShardCount(usize),

    #[error("cannot publish an empty batch")]
    EmptyBatch,

    #[error("transport error: {0}")]
    Unavailable(String),
}

/// A record as sent to the stream service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRecord {
    pub data: Bytes,
    pub partition_key: String,
}

impl PublishRecord {
    pub fn new(data: Bytes, partition_key: String) -> Self {
        Self {
            data,
            partition_key,
        }
    }
}

/// The service's answer to a successful publish call.
///
/// A successful call can still reject individual records; those are counted
/// in `failed_record_count` and, when the service reports them, listed by
/// their index in the submitted batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishResponse {
    pub failed_record_count: usize,
    pub failed_records: Vec<usize>,
}

impl PublishResponse {
    /// Every record was accepted.
    pub fn success() -> Self {
        Self::default()
    }

    /// The records at `indices` were rejected.
    pub fn with_failed_records(indices: Vec<usize>) -> Self {
        Self {
            failed_record_count: indices.len(),
            failed_records: indices,
        }
    }

    /// `count` records were rejected, without saying which.
    pub fn with_failed_count(count: usize) -> Self {
        Self {
            failed_record_count: count,
            failed_records: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationStatus {
    Creating,
    Active,
    Updating,
    Deleting,
}

impl Display for DestinationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Creating => write!(f, "creating"),
            Self::Active => write!(f, "active"),
            Self::Updating => write!(f, "updating"),
            Self::Deleting => write!(f, "deleting"),
        }
    }
}

/// Abstract stream service client.
///
/// Implementations must be safe to call from many flushes at once.
#[async_trait]
pub trait StreamTransport: Debug + Send + Sync + 'static {
    /// Submit `records` to `destination` in a single call.
    async fn publish(
        &self,
        destination: &str,
        records: &[PublishRecord],
    ) -> Result<PublishResponse, TransportError>;

    async fn create_destination(
        &self,
        destination: &str,
        shard_count: usize,
    ) -> Result<(), TransportError>;

    async fn describe_destination(
        &self,
        destination: &str,
    ) -> Result<DestinationStatus, TransportError>;

    async fn delete_destination(&self, destination: &str) -> Result<(), TransportError>;
}
