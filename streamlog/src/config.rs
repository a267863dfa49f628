//! Publisher configuration.

use std::{sync::Arc, time::Duration};

use crate::{
    codec::Codec,
    error::BuildError,
    transport::{StreamTransport, remote::RemoteTransportConfig},
};

/// Interval at which a non-empty pending batch is cut.
pub const DEFAULT_SYNC_PERIOD: Duration = Duration::from_secs(1);

/// Publish attempts per batch, including the first.
pub const DEFAULT_MAX_RETRY_ATTEMPTS: usize = 1;

/// Pause between publish attempts of a batch.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Records that may wait in the ingestion queue before `log` blocks.
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

/// Batches that may be publishing concurrently before batching pauses.
pub const DEFAULT_MAX_IN_FLIGHT_FLUSHES: usize = 16;

/// Upper bound for the in-flight flush limit.
pub const MAX_IN_FLIGHT_FLUSHES_LIMIT: usize = 1024;

/// What a flush does with records the service rejected inside an otherwise
/// successful publish call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PartialFailurePolicy {
    /// Count the rejected records as failed and move on.
    #[default]
    CountOnly,
    /// Resubmit the rejected records, within the batch's remaining attempts,
    /// when the service says which ones they were.
    Resubmit,
}

/// Where a publisher sends its batches.
#[derive(Debug, Clone)]
pub enum TransportConfig {
    /// The managed stream service.
    Remote(RemoteTransportConfig),
    /// A caller-supplied transport. The destination prefix becomes optional.
    Test(Option<Arc<dyn StreamTransport>>),
}

impl TransportConfig {
    pub fn test(transport: Arc<dyn StreamTransport>) -> Self {
        Self::Test(Some(transport))
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Self::Test(_))
    }

    pub(crate) fn build(&self) -> Result<Arc<dyn StreamTransport>, BuildError> {
        match self {
            Self::Remote(remote) => remote.connect(),
            Self::Test(Some(transport)) => Ok(Arc::clone(transport)),
            Self::Test(None) => Err(BuildError::MissingTestTransport),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Test(None)
    }
}

/// Settings for a [`Publisher`](crate::Publisher). Built with
/// [`PublisherConfig::builder`].
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    prefix: String,
    suffix: String,
    write_timeout: Option<Duration>,
    sync_period: Duration,
    max_retry_attempts: usize,
    retry_delay: Duration,
    queue_capacity: usize,
    max_in_flight_flushes: usize,
    codec: Codec,
    partial_failure_policy: PartialFailurePolicy,
    transport: TransportConfig,
}

impl PublisherConfig {
    pub fn builder() -> PublisherConfigBuilder {
        PublisherConfigBuilder::default()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// How long `log` waits for queue space. `None` waits indefinitely.
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout
    }

    pub fn sync_period(&self) -> Duration {
        self.sync_period
    }

    pub fn max_retry_attempts(&self) -> usize {
        self.max_retry_attempts
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn max_in_flight_flushes(&self) -> usize {
        self.max_in_flight_flushes
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn partial_failure_policy(&self) -> PartialFailurePolicy {
        self.partial_failure_policy
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }
}

#[derive(Debug, Clone)]
pub struct PublisherConfigBuilder {
    prefix: String,
    suffix: String,
    write_timeout: Duration,
    sync_period: Duration,
    max_retry_attempts: usize,
    retry_delay: Duration,
    queue_capacity: usize,
    max_in_flight_flushes: usize,
    codec: Codec,
    partial_failure_policy: PartialFailurePolicy,
    transport: TransportConfig,
}

impl Default for PublisherConfigBuilder {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            write_timeout: Duration::ZERO,
            sync_period: DEFAULT_SYNC_PERIOD,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_in_flight_flushes: DEFAULT_MAX_IN_FLIGHT_FLUSHES,
            codec: Codec::default(),
            partial_failure_policy: PartialFailurePolicy::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl PublisherConfigBuilder {
    /// Deployment prefix of the destination name, e.g. `production`.
    pub fn prefix(self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..self
        }
    }

    /// Optional tail of the destination name.
    pub fn suffix(self, suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            ..self
        }
    }

    /// Zero waits indefinitely.
    pub fn write_timeout(self, write_timeout: Duration) -> Self {
        Self {
            write_timeout,
            ..self
        }
    }

    /// Zero selects [`DEFAULT_SYNC_PERIOD`].
    pub fn sync_period(self, sync_period: Duration) -> Self {
        Self {
            sync_period,
            ..self
        }
    }

    /// Values below one are raised to one.
    pub fn max_retry_attempts(self, max_retry_attempts: usize) -> Self {
        Self {
            max_retry_attempts,
            ..self
        }
    }

    pub fn retry_delay(self, retry_delay: Duration) -> Self {
        Self {
            retry_delay,
            ..self
        }
    }

    pub fn queue_capacity(self, queue_capacity: usize) -> Self {
        Self {
            queue_capacity,
            ..self
        }
    }

    pub fn max_in_flight_flushes(self, max_in_flight_flushes: usize) -> Self {
        Self {
            max_in_flight_flushes,
            ..self
        }
    }

    pub fn codec(self, codec: Codec) -> Self {
        Self { codec, ..self }
    }

    pub fn partial_failure_policy(self, partial_failure_policy: PartialFailurePolicy) -> Self {
        Self {
            partial_failure_policy,
            ..self
        }
    }

    pub fn transport(self, transport: TransportConfig) -> Self {
        Self { transport, ..self }
    }

    /// Shorthand for `transport(TransportConfig::test(transport))`.
    pub fn test_transport(self, transport: Arc<dyn StreamTransport>) -> Self {
        self.transport(TransportConfig::test(transport))
    }

    pub fn build(self) -> PublisherConfig {
        PublisherConfig {
            prefix: self.prefix,
            suffix: self.suffix,
            write_timeout: (!self.write_timeout.is_zero()).then_some(self.write_timeout),
            sync_period: if self.sync_period.is_zero() {
                DEFAULT_SYNC_PERIOD
            } else {
                self.sync_period
            },
            max_retry_attempts: self.max_retry_attempts.max(1),
            retry_delay: self.retry_delay,
            queue_capacity: self.queue_capacity.max(1),
            max_in_flight_flushes: self
                .max_in_flight_flushes
                .clamp(1, MAX_IN_FLIGHT_FLUSHES_LIMIT),
            codec: self.codec,
            partial_failure_policy: self.partial_failure_policy,
            transport: self.transport,
        }
    }
}
