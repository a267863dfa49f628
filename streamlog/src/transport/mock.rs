//! A scriptable transport for exercising publisher failure handling.

use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::{DestinationStatus, PublishRecord, PublishResponse, StreamTransport, TransportError};

#[derive(Debug, Clone)]
pub struct MockPublishCall {
    pub destination: String,
    pub records: Vec<PublishRecord>,
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<MockPublishCall>,
    publish_return: VecDeque<Result<PublishResponse, TransportError>>,
    default_return: Option<Result<PublishResponse, TransportError>>,
}

/// A [`StreamTransport`] that records every publish call and answers with
/// scripted results.
///
/// Destination management calls always succeed and report the destination as
/// active.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Mutex<Inner>,
    latency: Duration,
}

impl MockTransport {
    /// Return the values specified in `ret` in sequence for calls to
    /// `publish`, starting from the front.
    pub fn with_publish_return(
        self,
        ret: impl Into<VecDeque<Result<PublishResponse, TransportError>>>,
    ) -> Self {
        self.inner.lock().publish_return = ret.into();
        self
    }

    /// The result of every `publish` call once the scripted results run out.
    /// Unless set, such calls succeed.
    pub fn with_default_return(self, ret: Result<PublishResponse, TransportError>) -> Self {
        self.inner.lock().default_return = Some(ret);
        self
    }

    /// A transport whose every `publish` call fails.
    pub fn failing() -> Self {
        Self::default().with_default_return(Err(TransportError::Unavailable(
            "service unavailable".to_string(),
        )))
    }

    /// Delay every `publish` call by `latency` before it is recorded.
    pub fn with_latency(self, latency: Duration) -> Self {
        Self { latency, ..self }
    }

    pub fn calls(&self) -> Vec<MockPublishCall> {
        self.inner.lock().calls.clone()
    }

    /// The payloads of every record submitted, including repeated submissions
    /// of retried batches.
    pub fn submitted_records(&self) -> Vec<Bytes> {
        self.inner
            .lock()
            .calls
            .iter()
            .flat_map(|c| c.records.iter().map(|r| r.data.clone()))
            .collect()
    }
}

#[async_trait]
impl StreamTransport for MockTransport {
    async fn publish(
        &self,
        destination: &str,
        records: &[PublishRecord],
    ) -> Result<PublishResponse, TransportError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut guard = self.inner.lock();
        guard.calls.push(MockPublishCall {
            destination: destination.to_string(),
            records: records.to_vec(),
        });
        match guard.publish_return.pop_front() {
            Some(ret) => ret,
            None => guard
                .default_return
                .clone()
                .unwrap_or_else(|| Ok(PublishResponse::success())),
        }
    }

    async fn create_destination(
        &self,
        _destination: &str,
        _shard_count: usize,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn describe_destination(
        &self,
        _destination: &str,
    ) -> Result<DestinationStatus, TransportError> {
        Ok(DestinationStatus::Active)
    }

    async fn delete_destination(&self, _destination: &str) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(data: &'static [u8]) -> PublishRecord {
        PublishRecord::new(Bytes::from_static(data), crate::partition_key(data))
    }

    #[tokio::test]
    async fn test_scripted_then_default() {
        let transport = MockTransport::default()
            .with_publish_return([
                Err(TransportError::Unavailable("boom".to_string())),
                Ok(PublishResponse::with_failed_count(1)),
            ])
            .with_default_return(Ok(PublishResponse::with_failed_records(vec![0])));

        assert!(transport.publish("s", &[record(b"a")]).await.is_err());
        assert_eq!(
            transport.publish("s", &[record(b"b")]).await,
            Ok(PublishResponse::with_failed_count(1))
        );
        assert_eq!(
            transport.publish("s", &[record(b"c")]).await,
            Ok(PublishResponse::with_failed_records(vec![0]))
        );
        assert_eq!(
            transport.publish("s", &[record(b"d")]).await,
            Ok(PublishResponse::with_failed_records(vec![0]))
        );

        let calls = transport.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().all(|c| c.destination == "s"));
        assert_eq!(
            transport.submitted_records(),
            [&b"a"[..], b"b", b"c", b"d"]
                .into_iter()
                .map(Bytes::from_static)
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_failing() {
        let transport = MockTransport::failing();
        for _ in 0..3 {
            assert!(matches!(
                transport.publish("s", &[record(b"a")]).await,
                Err(TransportError::Unavailable(_))
            ));
        }
    }
}
