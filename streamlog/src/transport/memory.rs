//! An in-process stream service.

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use observability_deps::tracing::debug;
use parking_lot::Mutex;

use super::{DestinationStatus, PublishRecord, PublishResponse, StreamTransport, TransportError};
use crate::destination::DestinationName;

#[derive(Debug)]
struct Destination {
    shard_count: usize,
    batches: Vec<Vec<PublishRecord>>,
}

impl Destination {
    fn new(shard_count: usize) -> Self {
        Self {
            shard_count,
            batches: vec![],
        }
    }
}

/// A stream service that keeps every accepted batch in memory.
///
/// By default publishing to an unknown destination creates it on the fly.
/// A [strict](Self::strict) transport instead requires destinations to be
/// created first, like the real service does.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    destinations: Mutex<BTreeMap<String, Destination>>,
    publish_latency: Duration,
    strict: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept publishes to destinations created beforehand.
    pub fn strict(self) -> Self {
        Self {
            strict: true,
            ..self
        }
    }

    /// Delay every publish call by `latency`.
    pub fn with_publish_latency(self, latency: Duration) -> Self {
        Self {
            publish_latency: latency,
            ..self
        }
    }

    /// All batches accepted for `destination`, in arrival order.
    pub fn batches(&self, destination: &str) -> Vec<Vec<PublishRecord>> {
        self.destinations
            .lock()
            .get(destination)
            .map(|d| d.batches.clone())
            .unwrap_or_default()
    }

    /// All record payloads accepted for `destination`, in arrival order.
    pub fn records(&self, destination: &str) -> Vec<Bytes> {
        self.batches(destination)
            .into_iter()
            .flatten()
            .map(|r| r.data)
            .collect()
    }

    pub fn shard_count(&self, destination: &str) -> Option<usize> {
        self.destinations
            .lock()
            .get(destination)
            .map(|d| d.shard_count)
    }

    fn validate(destination: &str) -> Result<(), TransportError> {
        DestinationName::new(destination)
            .map(|_| ())
            .map_err(|_| TransportError::InvalidDestinationName(destination.to_string()))
    }
}

#[async_trait]
impl StreamTransport for MemoryTransport {
    async fn publish(
        &self,
        destination: &str,
        records: &[PublishRecord],
    ) -> Result<PublishResponse, TransportError> {
        Self::validate(destination)?;
        if records.is_empty() {
            return Err(TransportError::EmptyBatch);
        }

        if !self.publish_latency.is_zero() {
            tokio::time::sleep(self.publish_latency).await;
        }

        let mut destinations = self.destinations.lock();
        if self.strict && !destinations.contains_key(destination) {
            return Err(TransportError::DestinationNotFound(destination.to_string()));
        }
        destinations
            .entry(destination.to_string())
            .or_insert_with(|| {
                debug!(destination, "auto-creating destination");
                Destination::new(1)
            })
            .batches
            .push(records.to_vec());

        Ok(PublishResponse::success())
    }

    async fn create_destination(
        &self,
        destination: &str,
        shard_count: usize,
    ) -> Result<(), TransportError> {
        Self::validate(destination)?;
        if shard_count == 0 {
            return Err(TransportError::InvalidShardCount(shard_count));
        }

        let mut destinations = self.destinations.lock();
        if destinations.contains_key(destination) {
            return Err(TransportError::DestinationExists(destination.to_string()));
        }
        destinations.insert(destination.to_string(), Destination::new(shard_count));

        Ok(())
    }

    async fn describe_destination(
        &self,
        destination: &str,
    ) -> Result<DestinationStatus, TransportError> {
        Self::validate(destination)?;
        self.destinations
            .lock()
            .get(destination)
            .map(|_| DestinationStatus::Active)
            .ok_or_else(|| TransportError::DestinationNotFound(destination.to_string()))
    }

    async fn delete_destination(&self, destination: &str) -> Result<(), TransportError> {
        Self::validate(destination)?;
        self.destinations
            .lock()
            .remove(destination)
            .map(|_| ())
            .ok_or_else(|| TransportError::DestinationNotFound(destination.to_string()))
    }
}
