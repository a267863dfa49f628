//! Batching publisher for append-only streams.
//!
//! A [`Publisher<T>`] accepts values of a single message type `T`, encodes
//! them, and ships them in size-bounded batches to a named destination on a
//! stream service. The destination name is derived from `T`'s module path and
//! type name plus a deployment prefix and optional suffix (see
//! [`destination`]).
//!
//! Batches are cut when the next record would not fit, when the sync period
//! elapses, on [`Publisher::flush`] and on [`Publisher::shutdown`]. Failed
//! publish calls are retried after a fixed delay up to a configured number
//! of attempts. Records that are still not accepted are counted and dropped.
//!
//! The stream service is reached through a [`StreamTransport`]. The crate
//! ships an in-memory transport for tests and local development and a
//! scriptable mock for exercising failure handling.

pub mod aggregator;
pub mod codec;
pub mod config;
pub mod destination;
mod error;
mod flush;
pub mod message;
pub mod metrics;
pub mod partition_key;
mod publisher;
pub mod registry;
pub mod transport;

pub use codec::{Codec, CodecError, MAX_BATCH_SIZE, MAX_MESSAGE_SIZE, RECORD_OVERHEAD};
pub use config::{PartialFailurePolicy, PublisherConfig, PublisherConfigBuilder, TransportConfig};
pub use destination::{DestinationName, NameError};
pub use error::{BuildError, LogError};
pub use message::Message;
pub use metrics::PublisherMetrics;
pub use partition_key::partition_key;
pub use publisher::Publisher;
pub use registry::{MessageTypeRegistry, RegistryError};
pub use transport::{
    DestinationStatus, PublishRecord, PublishResponse, StreamTransport, TransportError,
    memory::MemoryTransport,
    mock::MockTransport,
    remote::{Credentials, Region, RemoteEndpoint, RemoteTransportConfig, TransportConnector},
};
