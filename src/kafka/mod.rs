pub mod client;
pub mod context;

#[cfg(test)]
pub mod fake;

use crate::probe::FailureSignal;
use async_trait::async_trait;
use rdkafka::error::KafkaError;
use std::time::Duration;

pub use client::RdKafkaCluster;
pub use context::ProbeContext;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned by the messaging client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("Client task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Other(String),
}

impl ClientError {
    /// Raw signal for the failure classifier
    pub fn signal(&self) -> FailureSignal {
        let signal = FailureSignal::from_message(self.to_string());
        match self {
            ClientError::Kafka(e) => match e.rdkafka_error_code() {
                Some(code) => signal.with_code(code),
                None => signal,
            },
            _ => signal,
        }
    }
}

/// Which client a broker-level error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientRole {
    Admin,
    Producer,
    Consumer,
}

/// Entry point to a Kafka cluster. Each method opens a fresh session.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Open an administrative session; returns once the cluster has answered
    async fn connect_admin(&self, timeout: Duration) -> ClientResult<Box<dyn AdminSession>>;

    /// Open a producer session
    async fn connect_producer(&self, timeout: Duration) -> ClientResult<Box<dyn Session>>;

    /// Open a consumer session in the probe consumer group
    async fn connect_consumer(&self, timeout: Duration) -> ClientResult<Box<dyn Session>>;

    /// Take the last broker-level error reported by the `role` client, clearing it
    fn take_broker_error(&self, role: ClientRole) -> Option<String>;
}

/// Control-plane session used for metadata queries
#[async_trait]
pub trait AdminSession: Send + Sync {
    async fn list_topics(&self, timeout: Duration) -> ClientResult<Vec<String>>;

    async fn disconnect(self: Box<Self>) -> ClientResult<()>;
}

/// Producer or consumer session
#[async_trait]
pub trait Session: Send {
    async fn disconnect(self: Box<Self>) -> ClientResult<()>;
}
