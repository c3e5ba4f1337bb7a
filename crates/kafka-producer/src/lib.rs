//! Event publishing for salesrabbit-sync
//!
//! A broadcast run fans out one sync trigger per entity type as a message on
//! the event channel. [`EventPublisher`] is the seam the broadcast job talks
//! to; [`KafkaPublisher`] is the production implementation, publishing to a
//! single fixed topic.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kafka_producer::{EventPublisher, KafkaOpts, KafkaPublisher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sync_core::SyncError> {
//!     let publisher = KafkaPublisher::new(&KafkaOpts::new("localhost:9092", "salesrabbit-sync"))?;
//!     publisher
//!         .publish("Leads", br#"{"table":"Leads","start":null}"#)
//!         .await?;
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::time::Duration;
use sync_core::SyncError;

const DEFAULT_MESSAGE_TIMEOUT_MS: u64 = 5000;

/// Destination for broadcast events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one message and wait for the channel to accept it.
    async fn publish(&self, key: &str, payload: &[u8]) -> Result<(), SyncError>;
}

/// Kafka connection options
#[derive(Clone, Debug)]
pub struct KafkaOpts {
    pub brokers: String,
    /// Topic every event is published to
    pub topic: String,
    pub message_timeout_ms: u64,
}

impl KafkaOpts {
    pub fn new(brokers: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            topic: topic.into(),
            message_timeout_ms: DEFAULT_MESSAGE_TIMEOUT_MS,
        }
    }
}

/// Publishes events to one Kafka topic.
pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaPublisher {
    /// Create the producer. No broker connection is made until the first send.
    pub fn new(opts: &KafkaOpts) -> Result<Self, SyncError> {
        if opts.topic.is_empty() {
            return Err(SyncError::Config("Kafka topic must not be empty".to_string()));
        }

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &opts.brokers)
            .set("message.timeout.ms", opts.message_timeout_ms.to_string())
            .create()
            .map_err(|e| SyncError::PublishFailure {
                message: format!("Failed to create Kafka producer: {e}"),
            })?;

        Ok(Self {
            producer,
            topic: opts.topic.clone(),
            timeout: Duration::from_millis(opts.message_timeout_ms),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl EventPublisher for KafkaPublisher {
    async fn publish(&self, key: &str, payload: &[u8]) -> Result<(), SyncError> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);

        self.producer
            .send(record, self.timeout)
            .await
            .map_err(|(err, _)| SyncError::PublishFailure {
                message: format!("topic '{}', key '{key}': {err}", self.topic),
            })?;

        tracing::debug!("Published event to '{}' with key '{key}'", self.topic);
        Ok(())
    }
}
