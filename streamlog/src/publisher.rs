use std::{marker::PhantomData, sync::Arc};

use metric::Registry;
use observability_deps::tracing::{info, warn};
use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot},
};
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::{
    aggregator::{Aggregator, Ingest, PendingBatch},
    codec::{Codec, EncodedRecord, MAX_BATCH_SIZE, MAX_MESSAGE_SIZE},
    config::PublisherConfig,
    destination::DestinationName,
    error::{BuildError, LogError},
    flush::FlushExecutor,
    message::Message,
    metrics::PublisherMetrics,
    transport::{DestinationStatus, StreamTransport, TransportError},
};

/// Publishes values of one message type `T` to the destination derived from
/// that type.
///
/// Accepted values are encoded, queued and shipped in batches by a background
/// aggregator. Once [`log`](Self::log) returns `Ok`, delivery is best effort:
/// failures are logged and counted in [`metrics`](Self::metrics) but never
/// reported back to the caller.
///
/// ```no_run
/// use std::sync::Arc;
///
/// use serde::Serialize;
/// use streamlog::{Message, MemoryTransport, Publisher, PublisherConfig};
///
/// #[derive(Serialize)]
/// struct SearchImpression {
///     query: String,
/// }
///
/// impl Message for SearchImpression {}
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PublisherConfig::builder()
///     .prefix("dev")
///     .test_transport(Arc::new(MemoryTransport::new()))
///     .build();
/// let publisher = Publisher::<SearchImpression>::new(config, &metric::Registry::default())?;
///
/// publisher
///     .log(&SearchImpression {
///         query: "food".to_string(),
///     })
///     .await?;
///
/// publisher.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Publisher<T> {
    destination: DestinationName,
    instance_id: Uuid,
    codec: Codec,
    write_timeout: Option<std::time::Duration>,

    tx: mpsc::Sender<Ingest>,
    transport: Arc<dyn StreamTransport>,
    metrics: PublisherMetrics,
    tasks: TaskTracker,
    runtime: Handle,

    _message: PhantomData<fn(&T)>,
}

impl<T> std::fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("destination", &self.destination)
            .field("instance_id", &self.instance_id)
            .field("codec", &self.codec)
            .field("write_timeout", &self.write_timeout)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl<T: Message> Publisher<T> {
    /// Create a publisher for `T` and start its aggregator on the current
    /// tokio runtime.
    ///
    /// Counters are registered in `registry`, scoped to this publisher
    /// instance.
    pub fn new(config: PublisherConfig, registry: &Registry) -> Result<Self, BuildError> {
        let runtime = Handle::try_current().map_err(|_| BuildError::NoRuntime)?;

        let destination = DestinationName::for_message::<T>(
            config.prefix(),
            config.suffix(),
            !config.transport().is_test(),
        )?;
        let transport = config.transport().build()?;

        let instance_id = Uuid::now_v7();
        let metrics = PublisherMetrics::new(registry, &destination, &instance_id.to_string());

        let executor = Arc::new(FlushExecutor::new(
            Arc::clone(&transport),
            destination.clone(),
            metrics.clone(),
            config.max_retry_attempts(),
            config.retry_delay(),
            config.partial_failure_policy(),
        ));

        let (tx, rx) = mpsc::channel(config.queue_capacity());
        let tasks = TaskTracker::new();
        let aggregator = Aggregator::new(
            rx,
            PendingBatch::new(MAX_BATCH_SIZE),
            config.sync_period(),
            executor,
            config.max_in_flight_flushes(),
            tasks.clone(),
        );
        tasks.spawn_on(aggregator.run(), &runtime);

        info!(
            %destination,
            instance = %instance_id,
            sync_period = ?config.sync_period(),
            max_retry_attempts = config.max_retry_attempts(),
            "started publisher"
        );

        Ok(Self {
            destination,
            instance_id,
            codec: config.codec(),
            write_timeout: config.write_timeout(),
            tx,
            transport,
            metrics,
            tasks,
            runtime,
            _message: PhantomData,
        })
    }

    /// Encode `message` and enqueue it for publishing.
    ///
    /// Waits for queue space for at most the configured write timeout; a
    /// message that times out is dropped.
    pub async fn log(&self, message: &T) -> Result<(), LogError> {
        let record = EncodedRecord::new(self.codec.encode(message)?);

        let size = record.accounted_size();
        if size > MAX_MESSAGE_SIZE {
            self.metrics.record_oversized();
            warn!(
                destination = %self.destination,
                size,
                max = MAX_MESSAGE_SIZE,
                "rejected oversized message"
            );
            return Err(LogError::OversizedMessage {
                size,
                max: MAX_MESSAGE_SIZE,
            });
        }

        let send = self.tx.send(Ingest::Record(record));
        let res = match self.write_timeout {
            Some(timeout) => tokio::time::timeout(timeout, send)
                .await
                .map_err(|_| LogError::Timeout { timeout })?,
            None => send.await,
        };
        res.map_err(|_| LogError::Closed)
    }

    /// [`log`](Self::log) from synchronous code.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn log_blocking(&self, message: &T) -> Result<(), LogError> {
        self.runtime.block_on(self.log(message))
    }

    /// Cut the pending batch and wait until it, and every batch cut before
    /// it, has been published or given up on.
    pub async fn flush(&self) -> Result<(), LogError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Ingest::Flush(done_tx))
            .await
            .map_err(|_| LogError::Closed)?;
        done_rx.await.map_err(|_| LogError::Closed)
    }

    /// Stop accepting messages, publish everything still queued or pending
    /// and wait for all flushes to finish.
    pub async fn shutdown(self) {
        let Self {
            destination,
            instance_id,
            tx,
            metrics,
            tasks,
            ..
        } = self;

        drop(tx);
        tasks.close();
        tasks.wait().await;

        info!(
            %destination,
            instance = %instance_id,
            written_records = metrics.written_records(),
            failed_records = metrics.failed_records(),
            "publisher shut down"
        );
    }
}

impl<T> Publisher<T> {
    pub fn destination(&self) -> &DestinationName {
        &self.destination
    }

    /// Identifies this publisher in metric attributes.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn metrics(&self) -> &PublisherMetrics {
        &self.metrics
    }

    pub fn transport(&self) -> &Arc<dyn StreamTransport> {
        &self.transport
    }

    /// Create this publisher's destination with `shard_count` shards.
    pub async fn create_destination(&self, shard_count: usize) -> Result<(), TransportError> {
        self.transport
            .create_destination(self.destination.as_str(), shard_count)
            .await
    }

    pub async fn describe_destination(&self) -> Result<DestinationStatus, TransportError> {
        self.transport
            .describe_destination(self.destination.as_str())
            .await
    }

    pub async fn delete_destination(&self) -> Result<(), TransportError> {
        self.transport
            .delete_destination(self.destination.as_str())
            .await
    }
}
