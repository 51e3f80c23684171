pub mod classifier;
pub mod sequencer;
pub mod supervisor;

use crate::config::BrokerConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use classifier::{classify, FailureKind, FailureSignal};
pub use sequencer::{run_probes, run_probes_in_task};
pub use supervisor::{attempt_with_timeout, SupervisorError};

/// Number of topic names kept in the report
pub const TOPIC_PREVIEW_LIMIT: usize = 5;

/// Probe stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStage {
    AdminConnect,
    ListTopics,
    ProducerConnect,
    ProducerDisconnect,
    ConsumerConnect,
    ConsumerDisconnect,
}

impl ProbeStage {
    pub const ALL: [ProbeStage; 6] = [
        ProbeStage::AdminConnect,
        ProbeStage::ListTopics,
        ProbeStage::ProducerConnect,
        ProbeStage::ProducerDisconnect,
        ProbeStage::ConsumerConnect,
        ProbeStage::ConsumerDisconnect,
    ];

    /// Whether a failure at this stage halts the run and fails the verdict
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ProbeStage::ProducerDisconnect | ProbeStage::ConsumerDisconnect
        )
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProbeStage::AdminConnect => "Admin connect",
            ProbeStage::ListTopics => "List topics",
            ProbeStage::ProducerConnect => "Producer connect",
            ProbeStage::ProducerDisconnect => "Producer disconnect",
            ProbeStage::ConsumerConnect => "Consumer connect",
            ProbeStage::ConsumerDisconnect => "Consumer disconnect",
        }
    }
}

impl fmt::Display for ProbeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What happened at a single stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Success {
        detail: Option<String>,
    },
    Failure {
        kind: FailureKind,
        message: String,
        hint: String,
    },
    /// Non-fatal problem, e.g. a disconnect that did not complete cleanly
    Notice {
        message: String,
    },
    NotAttempted,
}

impl StageOutcome {
    pub fn success() -> Self {
        StageOutcome::Success { detail: None }
    }

    pub fn success_with(detail: impl Into<String>) -> Self {
        StageOutcome::Success {
            detail: Some(detail.into()),
        }
    }

    /// Classify a raw failure signal into a failure outcome
    pub fn failure(signal: &FailureSignal) -> Self {
        let kind = classify(signal);
        StageOutcome::Failure {
            kind,
            message: signal.describe(),
            hint: kind.hint().to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StageOutcome::Failure { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: ProbeStage,
    #[serde(flatten)]
    pub outcome: StageOutcome,
    pub duration_ms: Option<u64>,
}

/// Topic count plus a short preview of names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub count: usize,
    pub preview: Vec<String>,
    pub truncated: bool,
}

impl TopicSummary {
    pub fn from_names(names: &[String]) -> Self {
        Self {
            count: names.len(),
            preview: names.iter().take(TOPIC_PREVIEW_LIMIT).cloned().collect(),
            truncated: names.len() > TOPIC_PREVIEW_LIMIT,
        }
    }

    /// Preview joined for display, `...` appended when truncated
    pub fn preview_line(&self) -> String {
        let mut line = self.preview.join(", ");
        if self.truncated {
            line.push_str("...");
        }
        line
    }
}

/// Configuration as shown in reports. Never carries the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub brokers: Vec<String>,
    pub client_id: String,
    pub group_id: String,
    pub ssl: bool,
    pub sasl_mechanism: Option<String>,
    pub sasl_username: Option<String>,
    pub allow_auto_topic_creation: bool,
    pub connection_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl From<&BrokerConfig> for ConfigSummary {
    fn from(config: &BrokerConfig) -> Self {
        Self {
            brokers: config.brokers().to_vec(),
            client_id: config.client_id().to_string(),
            group_id: config.probe_group_id(),
            ssl: config.ssl(),
            sasl_mechanism: config.auth().map(|a| a.mechanism().to_string()),
            sasl_username: config.auth().map(|a| a.username().to_string()),
            allow_auto_topic_creation: config.allow_auto_topic_creation(),
            connection_timeout_ms: config.connection_timeout().as_millis() as u64,
            request_timeout_ms: config.request_timeout().as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Pass => 0,
            Verdict::Fail => 1,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("PASS"),
            Verdict::Fail => f.write_str("FAIL"),
        }
    }
}

/// Result of one probe run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config: ConfigSummary,
    pub stages: Vec<StageRecord>,
    pub topics: Option<TopicSummary>,
    /// Set when closing the admin session at the end of the run failed
    pub cleanup_notice: Option<String>,
    pub cancelled: bool,
}

impl ProbeReport {
    /// Fresh report with every stage not attempted
    pub fn new(config: &BrokerConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            config: ConfigSummary::from(config),
            stages: ProbeStage::ALL
                .iter()
                .map(|&stage| StageRecord {
                    stage,
                    outcome: StageOutcome::NotAttempted,
                    duration_ms: None,
                })
                .collect(),
            topics: None,
            cleanup_notice: None,
            cancelled: false,
        }
    }

    pub fn record(&mut self, stage: ProbeStage, outcome: StageOutcome, duration_ms: u64) {
        let record = &mut self.stages[stage.index()];
        record.outcome = outcome;
        record.duration_ms = Some(duration_ms);
    }

    pub fn outcome(&self, stage: ProbeStage) -> &StageOutcome {
        &self.stages[stage.index()].outcome
    }

    /// First fatal failure, if any
    pub fn failure(&self) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.outcome.is_failure())
    }

    /// Notices from disconnect stages and admin cleanup
    pub fn notices(&self) -> Vec<String> {
        let mut notices: Vec<String> = self
            .stages
            .iter()
            .filter_map(|r| match &r.outcome {
                StageOutcome::Notice { message } => Some(format!("{}: {}", r.stage, message)),
                _ => None,
            })
            .collect();
        if let Some(cleanup) = &self.cleanup_notice {
            notices.push(format!("Admin cleanup: {}", cleanup));
        }
        notices
    }

    /// PASS only if the run was not cancelled and every fatal stage succeeded
    pub fn verdict(&self) -> Verdict {
        let fatal_ok = self
            .stages
            .iter()
            .filter(|r| r.stage.is_fatal())
            .all(|r| r.outcome.is_success());

        if fatal_ok && !self.cancelled {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ProbeReport {
        ProbeReport::new(&BrokerConfig::default())
    }

    fn succeed_all(report: &mut ProbeReport) {
        for stage in ProbeStage::ALL {
            report.record(stage, StageOutcome::success(), 1);
        }
    }

    #[test]
    fn test_new_report_has_every_stage_not_attempted() {
        let report = report();
        assert_eq!(report.stages.len(), 6);
        assert!(report
            .stages
            .iter()
            .all(|r| r.outcome == StageOutcome::NotAttempted));
        assert_eq!(report.verdict(), Verdict::Fail);
    }

    #[test]
    fn test_disconnect_notice_keeps_pass() {
        let mut report = report();
        succeed_all(&mut report);
        report.record(
            ProbeStage::ConsumerDisconnect,
            StageOutcome::Notice {
                message: "leave group failed".to_string(),
            },
            3,
        );
        report.cleanup_notice = Some("admin close failed".to_string());

        assert_eq!(report.verdict(), Verdict::Pass);
        assert_eq!(report.verdict().exit_code(), 0);
        assert_eq!(report.notices().len(), 2);
    }

    #[test]
    fn test_cancelled_run_fails() {
        let mut report = report();
        succeed_all(&mut report);
        report.cancelled = true;
        assert_eq!(report.verdict(), Verdict::Fail);
    }

    #[test]
    fn test_stage_order_and_fatality() {
        assert_eq!(ProbeStage::AdminConnect.index(), 0);
        assert_eq!(ProbeStage::ConsumerDisconnect.index(), 5);
        assert!(ProbeStage::ProducerConnect.is_fatal());
        assert!(!ProbeStage::ProducerDisconnect.is_fatal());
    }

    #[test]
    fn test_topic_summary_truncates_after_five() {
        let names: Vec<String> = (1..=7).map(|i| format!("t{}", i)).collect();
        let summary = TopicSummary::from_names(&names);

        assert_eq!(summary.count, 7);
        assert_eq!(summary.preview.len(), 5);
        assert!(summary.truncated);
        assert_eq!(summary.preview_line(), "t1, t2, t3, t4, t5...");

        let summary = TopicSummary::from_names(&["a".to_string(), "b".to_string()]);
        assert!(!summary.truncated);
        assert_eq!(summary.preview_line(), "a, b");
    }
}
