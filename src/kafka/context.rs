use rdkafka::client::ClientContext;
use rdkafka::config::RDKafkaLogLevel;
use rdkafka::consumer::ConsumerContext;
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Client context of a single probe client.
///
/// librdkafka reports broker connection problems (refused connections,
/// resolver failures, handshake errors) through the error callback rather
/// than through the failing call. The last one is kept so a failed stage can
/// be classified by its real cause. The summary "all brokers are down" error
/// never replaces a more specific one.
#[derive(Clone, Default)]
pub struct ProbeContext {
    last_error: Arc<Mutex<Option<String>>>,
}

impl ProbeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|mut guard| guard.take())
    }

    fn store_error(&self, error: &KafkaError, reason: &str) {
        if let Ok(mut guard) = self.last_error.lock() {
            let summary = error.rdkafka_error_code() == Some(RDKafkaErrorCode::AllBrokersDown);
            if !summary || guard.is_none() {
                *guard = Some(reason.to_string());
            }
        }
    }
}

impl ClientContext for ProbeContext {
    fn log(&self, level: RDKafkaLogLevel, fac: &str, log_message: &str) {
        match level {
            RDKafkaLogLevel::Emerg
            | RDKafkaLogLevel::Alert
            | RDKafkaLogLevel::Critical
            | RDKafkaLogLevel::Error
            | RDKafkaLogLevel::Warning => warn!(target: "librdkafka", "{} {}", fac, log_message),
            RDKafkaLogLevel::Notice | RDKafkaLogLevel::Info => {
                info!(target: "librdkafka", "{} {}", fac, log_message)
            }
            RDKafkaLogLevel::Debug => debug!(target: "librdkafka", "{} {}", fac, log_message),
        }
    }

    fn error(&self, error: KafkaError, reason: &str) {
        warn!("Kafka client error: {} ({})", error, reason);
        self.store_error(&error, reason);
    }
}

impl ConsumerContext for ProbeContext {}
