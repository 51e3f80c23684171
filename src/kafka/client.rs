use async_trait::async_trait;
use rdkafka::admin::AdminClient;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::producer::{FutureProducer, Producer};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{AdminSession, ClientResult, ClientRole, Cluster, ProbeContext, Session};
use crate::config::BrokerConfig;

/// Conversion constant for seconds to milliseconds
const MS_PER_SEC: u128 = 1000;

/// [`Cluster`] backed by librdkafka.
///
/// librdkafka connects lazily, so every "connect" creates the client and then
/// fetches cluster metadata to prove a broker actually answered. All calls
/// into librdkafka block and run on the blocking pool; each one is given the
/// same deadline as the supervisor racing it, so an abandoned call ends on
/// its own shortly after the race is lost.
///
/// Each client gets its own context, so errors the admin client keeps
/// reporting in the background never leak into producer or consumer stages.
pub struct RdKafkaCluster {
    config: BrokerConfig,
    admin_context: ProbeContext,
    producer_context: ProbeContext,
    consumer_context: ProbeContext,
}

impl RdKafkaCluster {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            admin_context: ProbeContext::new(),
            producer_context: ProbeContext::new(),
            consumer_context: ProbeContext::new(),
        }
    }

    fn context(&self, role: ClientRole) -> &ProbeContext {
        match role {
            ClientRole::Admin => &self.admin_context,
            ClientRole::Producer => &self.producer_context,
            ClientRole::Consumer => &self.consumer_context,
        }
    }

    /// Settings shared by the admin, producer and consumer clients
    fn base_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();

        client_config
            .set("bootstrap.servers", self.config.brokers().join(","))
            .set("client.id", self.config.client_id())
            .set("security.protocol", self.config.security_protocol())
            .set(
                "socket.connection.setup.timeout.ms",
                self.config.connection_timeout().as_millis().to_string(),
            );

        if let Some(auth) = self.config.auth() {
            client_config
                .set("sasl.mechanism", auth.mechanism().as_str())
                .set("sasl.username", auth.username())
                .set("sasl.password", auth.password());
        }

        if let Ok(value) = std::env::var("RD_KAFKA_DEBUG") {
            client_config.set("debug", value);
        }

        debug!(
            "Client config: bootstrap.servers={} security.protocol={} sasl={}",
            self.config.brokers().join(","),
            self.config.security_protocol(),
            self.config
                .auth()
                .map(|a| a.mechanism().as_str())
                .unwrap_or("none")
        );

        client_config
    }

    fn producer_config(&self) -> ClientConfig {
        let mut client_config = self.base_config();
        client_config
            .set(
                "allow.auto.create.topics",
                self.config.allow_auto_topic_creation().to_string(),
            )
            .set(
                "request.timeout.ms",
                self.config.request_timeout().as_millis().to_string(),
            );
        client_config
    }

    fn consumer_config(&self) -> ClientConfig {
        let mut client_config = self.base_config();
        client_config
            .set("group.id", self.config.probe_group_id())
            .set("enable.auto.commit", "false")
            .set(
                "session.timeout.ms",
                (self.config.request_timeout().as_millis().max(6 * MS_PER_SEC)).to_string(),
            );
        client_config
    }
}

#[async_trait]
impl Cluster for RdKafkaCluster {
    async fn connect_admin(&self, timeout: Duration) -> ClientResult<Box<dyn AdminSession>> {
        let client_config = self.base_config();
        let context = self.admin_context.clone();

        let client = tokio::task::spawn_blocking(move || -> ClientResult<AdminClient<ProbeContext>> {
            let client: AdminClient<ProbeContext> = client_config.create_with_context(context)?;
            let metadata = client.inner().fetch_metadata(None, timeout)?;
            debug!("Admin session sees {} brokers", metadata.brokers().len());
            Ok(client)
        })
        .await??;

        Ok(Box::new(RdKafkaAdmin {
            client: Arc::new(client),
        }))
    }

    async fn connect_producer(&self, timeout: Duration) -> ClientResult<Box<dyn Session>> {
        let client_config = self.producer_config();
        let context = self.producer_context.clone();
        let flush_timeout = self.config.request_timeout();

        let producer = tokio::task::spawn_blocking(move || -> ClientResult<FutureProducer<ProbeContext>> {
            let producer: FutureProducer<ProbeContext> =
                client_config.create_with_context(context)?;
            producer.client().fetch_metadata(None, timeout)?;
            Ok(producer)
        })
        .await??;

        Ok(Box::new(RdKafkaProducer {
            producer,
            flush_timeout,
        }))
    }

    async fn connect_consumer(&self, timeout: Duration) -> ClientResult<Box<dyn Session>> {
        let client_config = self.consumer_config();
        let context = self.consumer_context.clone();

        let consumer = tokio::task::spawn_blocking(move || -> ClientResult<BaseConsumer<ProbeContext>> {
            let consumer: BaseConsumer<ProbeContext> =
                client_config.create_with_context(context)?;
            consumer.fetch_metadata(None, timeout)?;
            Ok(consumer)
        })
        .await??;

        Ok(Box::new(RdKafkaConsumer { consumer }))
    }

    fn take_broker_error(&self, role: ClientRole) -> Option<String> {
        self.context(role).take_last_error()
    }
}

struct RdKafkaAdmin {
    client: Arc<AdminClient<ProbeContext>>,
}

#[async_trait]
impl AdminSession for RdKafkaAdmin {
    async fn list_topics(&self, timeout: Duration) -> ClientResult<Vec<String>> {
        let client = Arc::clone(&self.client);

        let topics = tokio::task::spawn_blocking(move || -> ClientResult<Vec<String>> {
            let metadata = client.inner().fetch_metadata(None, timeout)?;
            Ok(metadata
                .topics()
                .iter()
                .map(|t| t.name().to_string())
                .collect())
        })
        .await??;

        Ok(topics)
    }

    async fn disconnect(self: Box<Self>) -> ClientResult<()> {
        // Dropping the client joins its background polling thread
        let client = self.client;
        tokio::task::spawn_blocking(move || drop(client)).await?;
        Ok(())
    }
}

struct RdKafkaProducer {
    producer: FutureProducer<ProbeContext>,
    flush_timeout: Duration,
}

#[async_trait]
impl Session for RdKafkaProducer {
    async fn disconnect(self: Box<Self>) -> ClientResult<()> {
        let RdKafkaProducer {
            producer,
            flush_timeout,
        } = *self;

        tokio::task::spawn_blocking(move || -> ClientResult<()> {
            producer.flush(flush_timeout)?;
            drop(producer);
            Ok(())
        })
        .await??;

        Ok(())
    }
}

struct RdKafkaConsumer {
    consumer: BaseConsumer<ProbeContext>,
}

#[async_trait]
impl Session for RdKafkaConsumer {
    async fn disconnect(self: Box<Self>) -> ClientResult<()> {
        let consumer = self.consumer;

        // Dropping a consumer closes it and leaves the group
        tokio::task::spawn_blocking(move || {
            consumer.unsubscribe();
            drop(consumer);
        })
        .await?;

        Ok(())
    }
}
