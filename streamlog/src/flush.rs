//! Shipping a cut batch to the destination.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use observability_deps::tracing::{debug, error, warn};
use tokio::time::Instant;

use crate::{
    aggregator::Batch,
    config::PartialFailurePolicy,
    destination::DestinationName,
    metrics::PublisherMetrics,
    partition_key::partition_key,
    transport::{PublishRecord, StreamTransport},
};

/// What happened to a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FlushOutcome {
    pub(crate) written: usize,
    pub(crate) failed: usize,
    pub(crate) attempts: usize,
}

/// Publishes batches for one publisher, retrying failed calls.
///
/// Every record of a batch ends up counted exactly once, either as written or
/// as failed.
#[derive(Debug)]
pub(crate) struct FlushExecutor {
    transport: Arc<dyn StreamTransport>,
    destination: DestinationName,
    metrics: PublisherMetrics,
    max_attempts: usize,
    retry_delay: Duration,
    partial_failure_policy: PartialFailurePolicy,
}

impl FlushExecutor {
    pub(crate) fn new(
        transport: Arc<dyn StreamTransport>,
        destination: DestinationName,
        metrics: PublisherMetrics,
        max_attempts: usize,
        retry_delay: Duration,
        partial_failure_policy: PartialFailurePolicy,
    ) -> Self {
        Self {
            transport,
            destination,
            metrics,
            max_attempts: max_attempts.max(1),
            retry_delay,
            partial_failure_policy,
        }
    }

    pub(crate) async fn flush(&self, batch: Batch) -> FlushOutcome {
        let mut records = batch
            .into_records()
            .into_iter()
            .map(|r| {
                let key = partition_key(r.data());
                PublishRecord::new(r.into_data(), key)
            })
            .collect::<Vec<_>>();

        let mut outcome = FlushOutcome::default();
        let mut accepted = false;

        loop {
            outcome.attempts += 1;
            let remaining_attempts = outcome.attempts < self.max_attempts;

            let start = Instant::now();
            let res = self
                .transport
                .publish(self.destination.as_str(), &records)
                .await;
            let elapsed = start.elapsed();

            match res {
                Ok(response) => {
                    self.metrics.record_publish(elapsed, true);
                    accepted = true;

                    let failed = response.failed_record_count.min(records.len());
                    let written = records.len() - failed;
                    outcome.written += written;
                    self.metrics.record_written(written);

                    if failed == 0 {
                        debug!(
                            destination = %self.destination,
                            n_records = written,
                            attempt = outcome.attempts,
                            "published batch"
                        );
                        break;
                    }

                    warn!(
                        destination = %self.destination,
                        n_failed = failed,
                        n_written = written,
                        attempt = outcome.attempts,
                        "destination rejected records of batch"
                    );

                    let resubmit = match self.partial_failure_policy {
                        PartialFailurePolicy::Resubmit if remaining_attempts => {
                            rejected_records(&records, &response.failed_records, failed)
                        }
                        _ => None,
                    };
                    match resubmit {
                        Some(rejected) => records = rejected,
                        None => {
                            outcome.failed += failed;
                            self.metrics.record_failed(failed);
                            break;
                        }
                    }
                }
                Err(e) => {
                    self.metrics.record_publish(elapsed, false);

                    if !remaining_attempts {
                        error!(
                            %e,
                            destination = %self.destination,
                            n_records = records.len(),
                            attempts = outcome.attempts,
                            "giving up publishing batch"
                        );
                        outcome.failed += records.len();
                        self.metrics.record_failed(records.len());
                        break;
                    }

                    warn!(
                        %e,
                        destination = %self.destination,
                        n_records = records.len(),
                        attempt = outcome.attempts,
                        retry_in = ?self.retry_delay,
                        "publish failed, retrying"
                    );
                }
            }

            tokio::time::sleep(self.retry_delay).await;
        }

        if accepted {
            self.metrics.record_batch();
        }

        outcome
    }
}

/// The records at `indices`, in batch order, if the indices identify exactly
/// `failed` distinct records of `records`.
fn rejected_records(
    records: &[PublishRecord],
    indices: &[usize],
    failed: usize,
) -> Option<Vec<PublishRecord>> {
    let indices = indices.iter().copied().collect::<BTreeSet<_>>();
    if indices.len() != failed || indices.iter().any(|&i| i >= records.len()) {
        return None;
    }
    Some(indices.into_iter().map(|i| records[i].clone()).collect())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use metric::Registry;

    use super::*;
    use crate::{
        aggregator::PendingBatch,
        codec::{EncodedRecord, MAX_BATCH_SIZE},
        transport::{PublishResponse, TransportError, mock::MockTransport},
    };

    fn batch(payloads: &[&'static [u8]]) -> Batch {
        let mut pending = PendingBatch::new(MAX_BATCH_SIZE);
        for p in payloads {
            assert!(pending.push(EncodedRecord::new(Bytes::from_static(p))).is_none());
        }
        pending.cut().expect("batch should not be empty")
    }

    fn executor(
        transport: &Arc<MockTransport>,
        max_attempts: usize,
        policy: PartialFailurePolicy,
    ) -> (FlushExecutor, PublisherMetrics) {
        let registry = Registry::default();
        let destination = DestinationName::new("test--app.event").unwrap();
        let metrics = PublisherMetrics::new(&registry, &destination, "instance");
        let executor = FlushExecutor::new(
            Arc::clone(transport) as _,
            destination,
            metrics.clone(),
            max_attempts,
            Duration::from_secs(5),
            policy,
        );
        (executor, metrics)
    }

    fn unavailable() -> Result<PublishResponse, TransportError> {
        Err(TransportError::Unavailable("boom".to_string()))
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_success_first_attempt() {
        let transport = Arc::new(MockTransport::default());
        let (executor, metrics) = executor(&transport, 3, PartialFailurePolicy::CountOnly);

        let outcome = executor.flush(batch(&[b"a", b"b", b"c"])).await;

        assert_eq!(
            outcome,
            FlushOutcome {
                written: 3,
                failed: 0,
                attempts: 1
            }
        );
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].destination, "test--app.event");
        assert_eq!(calls[0].records[1].data, Bytes::from_static(b"b"));
        assert_eq!(calls[0].records[1].partition_key, partition_key(b"b"));
        assert_eq!(metrics.written_records(), 3);
        assert_eq!(metrics.written_batches(), 1);
        assert_eq!(metrics.failed_records(), 0);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_retry_then_success() {
        let transport =
            Arc::new(MockTransport::default().with_publish_return([unavailable(), unavailable()]));
        let (executor, metrics) = executor(&transport, 3, PartialFailurePolicy::CountOnly);

        let start = Instant::now();
        let outcome = executor.flush(batch(&[b"a", b"b"])).await;

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.written, 2);
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert_eq!(transport.calls().len(), 3);
        assert_eq!(metrics.written_records(), 2);
        assert_eq!(metrics.written_batches(), 1);
        assert_eq!(metrics.failed_publish_attempts(), 2);
        assert_eq!(metrics.failed_records(), 0);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_retries_exhausted() {
        let transport = Arc::new(MockTransport::failing());
        let (executor, metrics) = executor(&transport, 2, PartialFailurePolicy::CountOnly);

        let outcome = executor.flush(batch(&[b"a", b"b", b"c"])).await;

        assert_eq!(
            outcome,
            FlushOutcome {
                written: 0,
                failed: 3,
                attempts: 2
            }
        );
        assert_eq!(transport.calls().len(), 2);
        assert_eq!(metrics.failed_records(), 3);
        assert_eq!(metrics.written_records(), 0);
        assert_eq!(metrics.written_batches(), 0);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_partial_failure_counted() {
        let transport = Arc::new(
            MockTransport::default()
                .with_publish_return([Ok(PublishResponse::with_failed_records(vec![1]))]),
        );
        let (executor, metrics) = executor(&transport, 3, PartialFailurePolicy::CountOnly);

        let outcome = executor.flush(batch(&[b"a", b"b", b"c"])).await;

        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(metrics.written_records(), 2);
        assert_eq!(metrics.failed_records(), 1);
        assert_eq!(metrics.written_batches(), 1);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_partial_failure_resubmitted() {
        let transport = Arc::new(
            MockTransport::default()
                .with_publish_return([Ok(PublishResponse::with_failed_records(vec![2, 0]))]),
        );
        let (executor, metrics) = executor(&transport, 3, PartialFailurePolicy::Resubmit);

        let outcome = executor.flush(batch(&[b"a", b"b", b"c"])).await;

        assert_eq!(outcome.written, 3);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.attempts, 2);

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        let resubmitted = calls[1].records.iter().map(|r| r.data.clone()).collect::<Vec<_>>();
        assert_eq!(
            resubmitted,
            vec![Bytes::from_static(b"a"), Bytes::from_static(b"c")]
        );
        assert_eq!(metrics.written_records(), 3);
        assert_eq!(metrics.written_batches(), 1);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_resubmit_without_indices_counts() {
        let transport = Arc::new(
            MockTransport::default()
                .with_publish_return([Ok(PublishResponse::with_failed_count(2))]),
        );
        let (executor, metrics) = executor(&transport, 3, PartialFailurePolicy::Resubmit);

        let outcome = executor.flush(batch(&[b"a", b"b", b"c"])).await;

        assert_eq!(outcome.written, 1);
        assert_eq!(outcome.failed, 2);
        assert_eq!(transport.calls().len(), 1);
        assert_eq!(metrics.failed_records(), 2);
    }

    #[test]
    fn test_rejected_records() {
        let records = [&b"a"[..], b"b", b"c"]
            .into_iter()
            .map(|d| PublishRecord::new(Bytes::from_static(d), partition_key(d)))
            .collect::<Vec<_>>();

        let rejected = rejected_records(&records, &[2, 1], 2).unwrap();
        assert_eq!(rejected, vec![records[1].clone(), records[2].clone()]);

        assert!(rejected_records(&records, &[1], 2).is_none());
        assert!(rejected_records(&records, &[1, 1], 2).is_none());
        assert!(rejected_records(&records, &[3], 1).is_none());
    }
}
