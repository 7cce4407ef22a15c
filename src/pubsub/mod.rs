// src/pubsub/mod.rs

//! Event publishing.

use tokio::sync::broadcast;
use tracing::debug;

use crate::errors::Result;

/// Topic carrying a JSON [`JobCompleteEvent`](crate::engine::JobCompleteEvent)
/// for every walk that ended normally.
pub const JOB_COMPLETE_TOPIC: &str = "job_complete";

pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

/// A published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// In-process publisher on a Tokio broadcast channel.
///
/// Publishing with no subscribers succeeds; the message is dropped.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<Message>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Publisher for BroadcastPublisher {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let message = Message {
            topic: topic.to_string(),
            payload,
        };
        match self.tx.send(message) {
            Ok(receivers) => debug!(topic, receivers, "message published"),
            Err(_) => debug!(topic, "message published with no subscribers"),
        }
        Ok(())
    }
}
