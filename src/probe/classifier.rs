//! Failure classification.
//!
//! Structured librdkafka error codes are consulted first, then the free-text
//! messages, then the generic codes that only say "something went wrong with
//! the connection". Anything left over is [`FailureKind::Unknown`].

use rdkafka::types::RDKafkaErrorCode;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unreachable,
    Timeout,
    DnsFailure,
    AuthFailure,
    TlsFailure,
    Unknown,
}

impl FailureKind {
    /// Remediation hint shown next to the failure
    pub fn hint(&self) -> &'static str {
        match self {
            FailureKind::Unreachable => "verify the broker is running and the address is correct",
            FailureKind::Timeout => {
                "check network connectivity and firewall settings, or increase the connection timeout if the network is slow"
            }
            FailureKind::DnsFailure => "check that the broker hostname or IP address is correct",
            FailureKind::AuthFailure => "check the SASL mechanism and credentials",
            FailureKind::TlsFailure => "check the SSL configuration and broker certificates",
            FailureKind::Unknown => "inspect the error message and broker logs for details",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Unreachable => "Unreachable",
            FailureKind::Timeout => "Timeout",
            FailureKind::DnsFailure => "DNS failure",
            FailureKind::AuthFailure => "Authentication failure",
            FailureKind::TlsFailure => "TLS failure",
            FailureKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw failure information collected from a failed stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureSignal {
    pub code: Option<RDKafkaErrorCode>,
    pub message: String,
    /// Last broker-level error reported by the client, e.g. "Connection refused"
    pub broker_detail: Option<String>,
}

impl FailureSignal {
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: RDKafkaErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_broker_detail(mut self, detail: Option<String>) -> Self {
        self.broker_detail = detail;
        self
    }

    /// Message for display, with the broker detail appended when it adds something
    pub fn describe(&self) -> String {
        match &self.broker_detail {
            Some(detail) if !self.message.contains(detail.as_str()) => {
                format!("{} ({})", self.message, detail)
            }
            _ => self.message.clone(),
        }
    }
}

/// Substring rules, checked in order against lowercased text
const TEXT_RULES: &[(&[&str], FailureKind)] = &[
    (&["econnrefused", "connection refused"], FailureKind::Unreachable),
    (&["timeout", "timed out"], FailureKind::Timeout),
    (
        &[
            "enotfound",
            "failed to resolve",
            "name or service not known",
            "nodename nor servname",
        ],
        FailureKind::DnsFailure,
    ),
    (&["sasl", "authentication"], FailureKind::AuthFailure),
    (&["ssl", "tls", "certificate"], FailureKind::TlsFailure),
];

/// Codes that pin down the cause on their own
fn specific_code_kind(code: RDKafkaErrorCode) -> Option<FailureKind> {
    match code {
        RDKafkaErrorCode::Resolve => Some(FailureKind::DnsFailure),
        RDKafkaErrorCode::SSL => Some(FailureKind::TlsFailure),
        RDKafkaErrorCode::Authentication | RDKafkaErrorCode::SaslAuthenticationFailed => {
            Some(FailureKind::AuthFailure)
        }
        _ => None,
    }
}

/// Codes that only say the connection did not work out
fn generic_code_kind(code: RDKafkaErrorCode) -> Option<FailureKind> {
    match code {
        RDKafkaErrorCode::AllBrokersDown | RDKafkaErrorCode::BrokerTransportFailure => {
            Some(FailureKind::Unreachable)
        }
        RDKafkaErrorCode::OperationTimedOut
        | RDKafkaErrorCode::MessageTimedOut
        | RDKafkaErrorCode::RequestTimedOut => Some(FailureKind::Timeout),
        _ => None,
    }
}

fn text_kind(text: &str) -> Option<FailureKind> {
    let lower = text.to_lowercase();
    TEXT_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
        .map(|(_, kind)| *kind)
}

/// Map a failure signal onto the fixed taxonomy. Total: never panics.
pub fn classify(signal: &FailureSignal) -> FailureKind {
    if let Some(kind) = signal.code.and_then(specific_code_kind) {
        return kind;
    }

    let texts = signal
        .broker_detail
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(signal.message.as_str()));
    for text in texts {
        if let Some(kind) = text_kind(text) {
            return kind;
        }
    }

    signal
        .code
        .and_then(generic_code_kind)
        .unwrap_or(FailureKind::Unknown)
}
