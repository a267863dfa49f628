//! Accumulating encoded records into size-bounded batches.
//!
//! A single aggregator task per publisher owns the pending batch. It cuts the
//! batch when the next record would push it past the batch size limit, as
//! soon as it reaches that limit, when the sync timer fires, on an explicit flush and when the ingestion queue
//! closes. Every cut batch is handed to a flush task; at most
//! `max_in_flight_flushes` of those run at once, after which the aggregator
//! stops draining the queue until one completes.

use std::{sync::Arc, time::Duration};

use observability_deps::tracing::debug;
use tokio::{
    sync::{Semaphore, mpsc, oneshot},
    time::{Instant, MissedTickBehavior},
};
use tokio_util::task::TaskTracker;

use crate::{codec::EncodedRecord, flush::FlushExecutor};

/// An immutable, non-empty group of records published in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    records: Vec<EncodedRecord>,
    size: usize,
}

impl Batch {
    pub fn records(&self) -> &[EncodedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Accounted size of the batch, per-record overhead included.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn into_records(self) -> Vec<EncodedRecord> {
        self.records
    }
}

/// The batch currently being filled.
#[derive(Debug)]
pub struct PendingBatch {
    records: Vec<EncodedRecord>,
    size: usize,
    max_size: usize,
}

impl PendingBatch {
    pub fn new(max_size: usize) -> Self {
        Self {
            records: vec![],
            size: 0,
            max_size,
        }
    }

    /// Append `record`, first cutting and returning the pending records if
    /// `record` would not fit alongside them.
    pub fn push(&mut self, record: EncodedRecord) -> Option<Batch> {
        let cut = if self.size + record.accounted_size() > self.max_size {
            self.cut()
        } else {
            None
        };

        self.size += record.accounted_size();
        self.records.push(record);

        cut
    }

    /// True once the pending records fill the batch exactly.
    pub fn is_full(&self) -> bool {
        self.size >= self.max_size
    }

    /// Take the pending records. `None` if there are none.
    pub fn cut(&mut self) -> Option<Batch> {
        if self.records.is_empty() {
            return None;
        }

        let batch = Batch {
            records: std::mem::take(&mut self.records),
            size: self.size,
        };
        self.size = 0;
        Some(batch)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// Items on the ingestion queue.
#[derive(Debug)]
pub(crate) enum Ingest {
    Record(EncodedRecord),
    /// Cut the pending batch and signal once it and every earlier batch has
    /// been flushed.
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CutReason {
    Size,
    Timer,
    Explicit,
    Shutdown,
}

#[derive(Debug)]
pub(crate) struct Aggregator {
    rx: mpsc::Receiver<Ingest>,
    pending: PendingBatch,
    sync_period: Duration,
    executor: Arc<FlushExecutor>,
    flush_permits: Arc<Semaphore>,
    max_in_flight_flushes: u32,
    tasks: TaskTracker,
}

impl Aggregator {
    pub(crate) fn new(
        rx: mpsc::Receiver<Ingest>,
        pending: PendingBatch,
        sync_period: Duration,
        executor: Arc<FlushExecutor>,
        max_in_flight_flushes: usize,
        tasks: TaskTracker,
    ) -> Self {
        let max_in_flight_flushes = u32::try_from(max_in_flight_flushes.max(1)).unwrap_or(u32::MAX);
        Self {
            rx,
            pending,
            sync_period,
            executor,
            flush_permits: Arc::new(Semaphore::new(max_in_flight_flushes as usize)),
            max_in_flight_flushes,
            tasks,
        }
    }

    /// Run until the ingestion queue is closed and drained, then cut the
    /// remaining records.
    pub(crate) async fn run(mut self) {
        let mut sync = tokio::time::interval_at(Instant::now() + self.sync_period, self.sync_period);
        sync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                ingest = self.rx.recv() => match ingest {
                    Some(Ingest::Record(record)) => self.accept(record).await,
                    Some(Ingest::Flush(done)) => self.flush_all(done).await,
                    None => break,
                },
                _ = sync.tick() => {
                    if let Some(batch) = self.pending.cut() {
                        self.dispatch(batch, CutReason::Timer).await;
                    }
                }
            }
        }

        if let Some(batch) = self.pending.cut() {
            self.dispatch(batch, CutReason::Shutdown).await;
        }
        debug!("ingestion queue closed, aggregator stopped");
    }

    async fn accept(&mut self, record: EncodedRecord) {
        if let Some(batch) = self.pending.push(record) {
            self.dispatch(batch, CutReason::Size).await;
        }
        if self.pending.is_full() {
            if let Some(batch) = self.pending.cut() {
                self.dispatch(batch, CutReason::Size).await;
            }
        }
    }

    async fn flush_all(&mut self, done: oneshot::Sender<()>) {
        if let Some(batch) = self.pending.cut() {
            self.dispatch(batch, CutReason::Explicit).await;
        }

        // Holding every permit means no earlier flush is still running.
        let permits = Arc::clone(&self.flush_permits);
        let n = self.max_in_flight_flushes;
        self.tasks.spawn(async move {
            let _all = permits.acquire_many_owned(n).await;
            let _ = done.send(());
        });
    }

    async fn dispatch(&mut self, batch: Batch, reason: CutReason) {
        debug!(
            n_records = batch.len(),
            size = batch.size(),
            ?reason,
            "cut batch"
        );

        let executor = Arc::clone(&self.executor);
        // The semaphore is never closed, so this only waits for a free slot.
        let permit = Arc::clone(&self.flush_permits).acquire_owned().await.ok();
        self.tasks.spawn(async move {
            let outcome = executor.flush(batch).await;
            drop(permit);
            debug!(
                written = outcome.written,
                failed = outcome.failed,
                attempts = outcome.attempts,
                ?reason,
                "flushed batch"
            );
        });
    }
}
