//! In-memory cluster for exercising the probe sequence in tests.

use async_trait::async_trait;
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{AdminSession, ClientError, ClientResult, ClientRole, Cluster, Session};

/// Scripted behavior of a single client call
#[derive(Debug, Clone)]
pub enum Step {
    Ok,
    Fail(String),
    Kafka(RDKafkaErrorCode),
    Hang,
    Panic,
    /// Fire the token, then succeed
    Cancel(CancellationToken),
}

impl Step {
    async fn run(&self) -> ClientResult<()> {
        match self {
            Step::Ok => Ok(()),
            Step::Fail(message) => Err(ClientError::Other(message.clone())),
            Step::Kafka(code) => Err(KafkaError::MetadataFetch(*code).into()),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
            Step::Panic => panic!("scripted panic"),
            Step::Cancel(token) => {
                token.cancel();
                Ok(())
            }
        }
    }
}

pub type CallLog = Arc<Mutex<Vec<&'static str>>>;

#[derive(Debug, Clone)]
pub struct FakeCluster {
    pub admin_connect: Step,
    pub list_topics: Step,
    pub topics: Vec<String>,
    pub producer_connect: Step,
    pub producer_disconnect: Step,
    pub consumer_connect: Step,
    pub consumer_disconnect: Step,
    pub admin_disconnect: Step,
    /// Errors each client reports through its callback while connecting
    pub scripted_errors: Vec<(ClientRole, String)>,
    pub broker_errors: Arc<Mutex<HashMap<ClientRole, String>>>,
    pub calls: CallLog,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self {
            admin_connect: Step::Ok,
            list_topics: Step::Ok,
            topics: Vec::new(),
            producer_connect: Step::Ok,
            producer_disconnect: Step::Ok,
            consumer_connect: Step::Ok,
            consumer_disconnect: Step::Ok,
            admin_disconnect: Step::Ok,
            scripted_errors: Vec::new(),
            broker_errors: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FakeCluster {
    pub fn with_topics(mut self, topics: &[&str]) -> Self {
        self.topics = topics.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Simulate librdkafka reporting a broker-level error through the
    /// callback of the `role` client once it starts connecting
    pub fn with_broker_error(mut self, role: ClientRole, reason: &str) -> Self {
        self.scripted_errors.push((role, reason.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    fn log(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn report_errors(&self, role: ClientRole) {
        let mut errors = self.broker_errors.lock().unwrap();
        for (_, reason) in self.scripted_errors.iter().filter(|(r, _)| *r == role) {
            errors.insert(role, reason.clone());
        }
    }
}

#[async_trait]
impl Cluster for FakeCluster {
    async fn connect_admin(&self, _timeout: Duration) -> ClientResult<Box<dyn AdminSession>> {
        self.log("admin_connect");
        self.report_errors(ClientRole::Admin);
        self.admin_connect.run().await?;
        Ok(Box::new(FakeAdmin {
            list_topics: self.list_topics.clone(),
            topics: self.topics.clone(),
            disconnect: self.admin_disconnect.clone(),
            calls: self.calls.clone(),
        }))
    }

    async fn connect_producer(&self, _timeout: Duration) -> ClientResult<Box<dyn Session>> {
        self.log("producer_connect");
        self.report_errors(ClientRole::Producer);
        self.producer_connect.run().await?;
        Ok(Box::new(FakeSession {
            name: "producer_disconnect",
            disconnect: self.producer_disconnect.clone(),
            calls: self.calls.clone(),
        }))
    }

    async fn connect_consumer(&self, _timeout: Duration) -> ClientResult<Box<dyn Session>> {
        self.log("consumer_connect");
        self.report_errors(ClientRole::Consumer);
        self.consumer_connect.run().await?;
        Ok(Box::new(FakeSession {
            name: "consumer_disconnect",
            disconnect: self.consumer_disconnect.clone(),
            calls: self.calls.clone(),
        }))
    }

    fn take_broker_error(&self, role: ClientRole) -> Option<String> {
        self.broker_errors.lock().unwrap().remove(&role)
    }
}

struct FakeAdmin {
    list_topics: Step,
    topics: Vec<String>,
    disconnect: Step,
    calls: CallLog,
}

#[async_trait]
impl AdminSession for FakeAdmin {
    async fn list_topics(&self, _timeout: Duration) -> ClientResult<Vec<String>> {
        self.calls.lock().unwrap().push("list_topics");
        self.list_topics.run().await?;
        Ok(self.topics.clone())
    }

    async fn disconnect(self: Box<Self>) -> ClientResult<()> {
        self.calls.lock().unwrap().push("admin_disconnect");
        self.disconnect.run().await
    }
}

struct FakeSession {
    name: &'static str,
    disconnect: Step,
    calls: CallLog,
}

#[async_trait]
impl Session for FakeSession {
    async fn disconnect(self: Box<Self>) -> ClientResult<()> {
        self.calls.lock().unwrap().push(self.name);
        self.disconnect.run().await
    }
}
