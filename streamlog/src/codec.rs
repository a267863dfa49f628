//! Record encoding and the size limits of the stream service.

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// The largest record the stream service accepts, partition key included.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// The largest batch the stream service accepts in a single publish call.
pub const MAX_BATCH_SIZE: usize = 5 * 1024 * 1024;

/// Bytes accounted for each record on top of its payload, covering the
/// partition key and request framing.
pub const RECORD_OVERHEAD: usize = 128;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("bitcode codec error: {0}")]
    Bitcode(#[from] bitcode::Error),

    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The self-describing binary encoding records are written with.
///
/// Consumers must decode with the same codec the publisher was configured
/// with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Codec {
    /// Compact binary encoding.
    #[default]
    Bitcode,
    /// JSON, for destinations read by tooling outside of Rust.
    Json,
}

impl Codec {
    pub fn encode<T: Serialize>(self, value: &T) -> Result<Bytes, CodecError> {
        let data = match self {
            Self::Bitcode => bitcode::serialize(value)?,
            Self::Json => serde_json::to_vec(value)?,
        };
        Ok(Bytes::from(data))
    }

    pub fn decode<T: DeserializeOwned>(self, data: &[u8]) -> Result<T, CodecError> {
        Ok(match self {
            Self::Bitcode => bitcode::deserialize(data)?,
            Self::Json => serde_json::from_slice(data)?,
        })
    }
}

/// A single encoded message on its way to a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRecord {
    data: Bytes,
}

impl EncodedRecord {
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }

    /// The size this record counts for against the message and batch limits.
    pub fn accounted_size(&self) -> usize {
        self.data.len() + RECORD_OVERHEAD
    }
}
