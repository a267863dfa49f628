//! CLI config for stream publishers.

use std::{convert::Infallible, sync::Arc, time::Duration};

use non_empty_string::NonEmptyString;
use streamlog::{
    Credentials, MemoryTransport, PublisherConfig, RemoteTransportConfig, TransportConfig,
    TransportConnector,
};
use url::Url;

/// A `clap` `value_parser` which returns `None` when given an empty string and
/// `Some(NonEmptyString)` otherwise.
fn parse_optional_string(s: &str) -> Result<Option<NonEmptyString>, Infallible> {
    Ok(NonEmptyString::new(s.to_string()).ok())
}

/// CLI config for a stream publisher.
#[derive(Debug, Clone, clap::Parser)]
pub struct PublisherArgs {
    /// Deployment prefix of every destination name, e.g. `production`.
    ///
    /// Required unless `--use-memory-transport` is set.
    #[clap(
        long = "stream-name-prefix",
        env = "STREAMLOG_STREAM_NAME_PREFIX",
        default_value = "",
        action
    )]
    pub stream_name_prefix: String,

    /// Optional suffix appended to every destination name.
    #[clap(
        long = "stream-name-suffix",
        env = "STREAMLOG_STREAM_NAME_SUFFIX",
        default_value = "",
        action
    )]
    pub stream_name_suffix: String,

    /// How long a caller waits for space in the ingestion queue before the
    /// message is dropped with a timeout error. `0s` waits indefinitely.
    #[clap(
        long = "write-timeout",
        env = "STREAMLOG_WRITE_TIMEOUT",
        default_value = "0s",
        value_parser = humantime::parse_duration,
        action
    )]
    pub write_timeout: Duration,

    /// Interval at which pending records are published even if the batch is
    /// not full.
    #[clap(
        long = "sync-period",
        env = "STREAMLOG_SYNC_PERIOD",
        default_value = "1s",
        value_parser = humantime::parse_duration,
        action
    )]
    pub sync_period: Duration,

    /// Publish attempts per batch, including the first.
    #[clap(
        long = "max-retry-attempts",
        env = "STREAMLOG_MAX_RETRY_ATTEMPTS",
        default_value = "1",
        action
    )]
    pub max_retry_attempts: usize,

    /// Pause between publish attempts of a batch.
    #[clap(
        long = "retry-delay",
        env = "STREAMLOG_RETRY_DELAY",
        default_value = "5s",
        value_parser = humantime::parse_duration,
        action
    )]
    pub retry_delay: Duration,

    /// Records that may wait in the ingestion queue.
    #[clap(
        long = "ingest-queue-capacity",
        env = "STREAMLOG_INGEST_QUEUE_CAPACITY",
        default_value = "128",
        action
    )]
    pub ingest_queue_capacity: usize,

    /// Batches that may be publishing concurrently.
    #[clap(
        long = "max-in-flight-flushes",
        env = "STREAMLOG_MAX_IN_FLIGHT_FLUSHES",
        default_value = "16",
        action
    )]
    pub max_in_flight_flushes: usize,

    /// Access key ID for the stream service.
    ///
    /// An empty string value is equivalent to omitting the flag.
    // The fully qualified `Option` stops clap from treating the flag as
    // optional and unwrapping the parser's output type.
    #[clap(
        long = "aws-access-key-id",
        env = "AWS_ACCESS_KEY_ID",
        value_parser = parse_optional_string,
        default_value = "",
        action
    )]
    pub aws_access_key_id: std::option::Option<NonEmptyString>,

    /// Secret access key that goes with `--aws-access-key-id`.
    ///
    /// Prefer the environment variable over the command line flag in shared
    /// environments.
    ///
    /// An empty string value is equivalent to omitting the flag.
    #[clap(
        long = "aws-secret-access-key",
        env = "AWS_SECRET_ACCESS_KEY",
        value_parser = parse_optional_string,
        default_value = "",
        action
    )]
    pub aws_secret_access_key: std::option::Option<NonEmptyString>,

    /// Region of the stream service.
    ///
    /// An empty string value is equivalent to omitting the flag.
    #[clap(
        long = "aws-default-region",
        env = "AWS_DEFAULT_REGION",
        value_parser = parse_optional_string,
        default_value = "",
        action
    )]
    pub aws_default_region: std::option::Option<NonEmptyString>,

    /// Override the region's stream service endpoint.
    #[clap(long = "stream-endpoint", env = "STREAMLOG_STREAM_ENDPOINT", action)]
    pub stream_endpoint: Option<Url>,

    /// Publish to an in-process stream service instead of the real one.
    #[clap(
        long = "use-memory-transport",
        env = "STREAMLOG_USE_MEMORY_TRANSPORT",
        action
    )]
    pub use_memory_transport: bool,
}

impl PublisherArgs {
    /// The publisher config described by these arguments.
    ///
    /// `connector` opens the client for the real stream service; it is unused
    /// when the memory transport is selected.
    pub fn publisher_config(
        &self,
        connector: Option<Arc<dyn TransportConnector>>,
    ) -> PublisherConfig {
        PublisherConfig::builder()
            .prefix(self.stream_name_prefix.clone())
            .suffix(self.stream_name_suffix.clone())
            .write_timeout(self.write_timeout)
            .sync_period(self.sync_period)
            .max_retry_attempts(self.max_retry_attempts)
            .retry_delay(self.retry_delay)
            .queue_capacity(self.ingest_queue_capacity)
            .max_in_flight_flushes(self.max_in_flight_flushes)
            .transport(self.transport_config(connector))
            .build()
    }

    fn transport_config(&self, connector: Option<Arc<dyn TransportConnector>>) -> TransportConfig {
        if self.use_memory_transport {
            return TransportConfig::test(Arc::new(MemoryTransport::new()));
        }

        let mut remote = RemoteTransportConfig::default();
        if let Some(connector) = connector {
            remote = remote.with_connector(connector);
        }
        if let (Some(key_id), Some(secret)) = (&self.aws_access_key_id, &self.aws_secret_access_key)
        {
            remote = remote.with_credentials(Credentials::new(key_id.get(), secret.get()));
        }
        if let Some(region) = &self.aws_default_region {
            remote = remote.with_region(region.get());
        }
        if let Some(endpoint) = &self.stream_endpoint {
            remote = remote.with_endpoint(endpoint.clone());
        }
        TransportConfig::Remote(remote)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use metric::Registry;
    use serde::Serialize;
    use streamlog::{
        BuildError, Message, Publisher, RemoteEndpoint, StreamTransport, TransportError,
    };

    use super::*;

    #[derive(Debug, Serialize)]
    struct Heartbeat {
        host: String,
    }

    impl Message for Heartbeat {}

    #[derive(Debug)]
    struct MemoryConnector;

    impl TransportConnector for MemoryConnector {
        fn connect(
            &self,
            _endpoint: &RemoteEndpoint,
        ) -> Result<Arc<dyn StreamTransport>, TransportError> {
            Ok(Arc::new(MemoryTransport::new()))
        }
    }

    fn args(flags: &[&str]) -> PublisherArgs {
        PublisherArgs::try_parse_from(std::iter::once("").chain(flags.iter().copied()))
            .expect("valid args")
    }

    #[test]
    fn test_defaults() {
        let args = args(&[]);
        let config = args.publisher_config(None);

        assert_eq!(config.prefix(), "");
        assert_eq!(config.write_timeout(), None);
        assert_eq!(config.sync_period(), Duration::from_secs(1));
        assert_eq!(config.max_retry_attempts(), 1);
        assert_eq!(config.retry_delay(), Duration::from_secs(5));
        assert_eq!(config.queue_capacity(), 128);
        assert_eq!(config.max_in_flight_flushes(), 16);
        assert!(matches!(config.transport(), TransportConfig::Remote(_)));
    }

    #[test]
    fn test_durations() {
        let config = args(&[
            "--write-timeout",
            "2s",
            "--sync-period",
            "250ms",
            "--retry-delay",
            "1m",
            "--max-retry-attempts",
            "3",
        ])
        .publisher_config(None);

        assert_eq!(config.write_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.sync_period(), Duration::from_millis(250));
        assert_eq!(config.retry_delay(), Duration::from_secs(60));
        assert_eq!(config.max_retry_attempts(), 3);
    }

    #[test]
    fn test_invalid_duration() {
        assert!(PublisherArgs::try_parse_from(["", "--sync-period", "soon"]).is_err());
    }

    #[test]
    fn test_empty_strings_are_none() {
        let args = args(&["--aws-access-key-id", "", "--aws-default-region", ""]);
        assert!(args.aws_access_key_id.is_none());
        assert!(args.aws_default_region.is_none());
    }

    #[tokio::test]
    async fn test_memory_transport() {
        let config = args(&["--use-memory-transport"]).publisher_config(None);
        assert!(config.transport().is_test());

        let publisher = Publisher::<Heartbeat>::new(config, &Registry::default()).unwrap();
        assert_eq!(
            publisher.destination().as_str(),
            "streamlog_clap_blocks-publisher-tests.heartbeat"
        );
        publisher
            .log(&Heartbeat {
                host: "a".to_string(),
            })
            .await
            .unwrap();
        publisher.shutdown().await;
    }

    #[tokio::test]
    async fn test_remote_transport() {
        let connector: Arc<dyn TransportConnector> = Arc::new(MemoryConnector);

        let config = args(&["--stream-name-prefix", "production"])
            .publisher_config(Some(Arc::clone(&connector)));
        let err = Publisher::<Heartbeat>::new(config, &Registry::default())
            .expect_err("no credentials");
        assert!(matches!(err, BuildError::MissingCredentials));

        let flags = [
            "--stream-name-prefix",
            "production",
            "--aws-access-key-id",
            "AKIDEXAMPLE",
            "--aws-secret-access-key",
            "NotARealAWSSecretAccessKey",
            "--aws-default-region",
            "eu-central-1",
        ];
        let config = args(&flags).publisher_config(Some(Arc::clone(&connector)));
        let publisher = Publisher::<Heartbeat>::new(config, &Registry::default()).unwrap();
        assert_eq!(
            publisher.destination().as_str(),
            "production--streamlog_clap_blocks-publisher-tests.heartbeat"
        );
        publisher.shutdown().await;

        let config = args(&flags).publisher_config(None);
        let err = Publisher::<Heartbeat>::new(config, &Registry::default())
            .expect_err("no connector");
        assert!(matches!(err, BuildError::MissingConnector));
    }
}
