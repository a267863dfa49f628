//! Per-publisher counters, registered in a caller-supplied
//! [`metric::Registry`].

use std::{borrow::Cow, time::Duration};

use metric::{Attributes, DurationHistogram, Metric, U64Counter};

use crate::destination::DestinationName;

pub const WRITTEN_RECORDS: &str = "streamlog_written_records";
pub const FAILED_RECORDS: &str = "streamlog_failed_records";
pub const WRITTEN_BATCHES: &str = "streamlog_written_batches";
pub const OVERSIZED_MESSAGES: &str = "streamlog_oversized_messages";
pub const FAILED_PUBLISH_ATTEMPTS: &str = "streamlog_failed_publish_attempts";
pub const PUBLISH_DURATION: &str = "streamlog_publish_duration";

/// Counters for a single publisher instance.
///
/// Every series carries a `destination` and an `instance` attribute, so two
/// publishers writing to the same destination never share a counter. Clones
/// share the underlying counters.
#[derive(Debug, Clone)]
pub struct PublisherMetrics {
    written_records: U64Counter,
    failed_records: U64Counter,
    written_batches: U64Counter,
    oversized_messages: U64Counter,
    failed_publish_attempts: U64Counter,

    publish_duration_success: DurationHistogram,
    publish_duration_error: DurationHistogram,
}

impl PublisherMetrics {
    pub fn new(registry: &metric::Registry, destination: &DestinationName, instance: &str) -> Self {
        let attributes = |result: Option<&'static str>| {
            let mut attr = Attributes::from([
                ("destination", Cow::Owned(destination.to_string())),
                ("instance", Cow::Owned(instance.to_string())),
            ]);
            if let Some(result) = result {
                attr.insert("result", result);
            }
            attr
        };

        let written_records = registry
            .register_metric::<U64Counter>(
                WRITTEN_RECORDS,
                "number of records accepted by the destination",
            )
            .recorder(attributes(None));
        let failed_records = registry
            .register_metric::<U64Counter>(
                FAILED_RECORDS,
                "number of records that were never accepted by the destination",
            )
            .recorder(attributes(None));
        let written_batches = registry
            .register_metric::<U64Counter>(
                WRITTEN_BATCHES,
                "number of batches accepted by the destination",
            )
            .recorder(attributes(None));
        let oversized_messages = registry
            .register_metric::<U64Counter>(
                OVERSIZED_MESSAGES,
                "number of messages rejected for exceeding the message size limit",
            )
            .recorder(attributes(None));
        let failed_publish_attempts = registry
            .register_metric::<U64Counter>(
                FAILED_PUBLISH_ATTEMPTS,
                "number of publish calls that returned an error",
            )
            .recorder(attributes(None));

        let publish_duration: Metric<DurationHistogram> = registry.register_metric(
            PUBLISH_DURATION,
            "duration distribution of publish calls to the destination",
        );
        let publish_duration_success = publish_duration.recorder(attributes(Some("success")));
        let publish_duration_error = publish_duration.recorder(attributes(Some("error")));

        Self {
            written_records,
            failed_records,
            written_batches,
            oversized_messages,
            failed_publish_attempts,
            publish_duration_success,
            publish_duration_error,
        }
    }

    pub fn written_records(&self) -> u64 {
        self.written_records.fetch()
    }

    pub fn failed_records(&self) -> u64 {
        self.failed_records.fetch()
    }

    pub fn written_batches(&self) -> u64 {
        self.written_batches.fetch()
    }

    pub fn oversized_messages(&self) -> u64 {
        self.oversized_messages.fetch()
    }

    pub fn failed_publish_attempts(&self) -> u64 {
        self.failed_publish_attempts.fetch()
    }

    pub(crate) fn record_written(&self, records: usize) {
        self.written_records.inc(records as u64);
    }

    pub(crate) fn record_failed(&self, records: usize) {
        self.failed_records.inc(records as u64);
    }

    pub(crate) fn record_batch(&self) {
        self.written_batches.inc(1);
    }

    pub(crate) fn record_oversized(&self) {
        self.oversized_messages.inc(1);
    }

    pub(crate) fn record_publish(&self, duration: Duration, success: bool) {
        if success {
            self.publish_duration_success.record(duration);
        } else {
            self.failed_publish_attempts.inc(1);
            self.publish_duration_error.record(duration);
        }
    }
}
