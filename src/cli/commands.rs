use crate::config::RawConfig;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "kafkaprobe",
    about = "Kafka cluster connectivity probe",
    version,
    author
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format for logs
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe the cluster: admin connect, topic listing, producer and consumer sessions
    Check(CheckArgs),

    /// Show the probe environment variables (password masked) and validate them
    Env,

    /// Show information about KafkaProbe
    Info,
}

/// Overrides for values otherwise read from KAFKA_DEFAULT_* variables
#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Comma-separated broker list (host:port)
    #[arg(short, long)]
    pub brokers: Option<String>,

    /// Client identifier
    #[arg(long)]
    pub client_id: Option<String>,

    /// Base consumer group; the probe appends "-test"
    #[arg(long)]
    pub group_id: Option<String>,

    /// Connect using SSL
    #[arg(long)]
    pub ssl: bool,

    /// Allow the producer to auto-create topics
    #[arg(long)]
    pub auto_create_topics: bool,

    /// Admin connection timeout in milliseconds (default: 10000)
    #[arg(long)]
    pub connection_timeout_ms: Option<u64>,

    /// Request timeout in milliseconds (default: 30000)
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "terminal")]
    pub format: ReportFormat,

    /// Write the JSON report to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CheckArgs {
    /// Layer the command-line overrides on top of environment values
    pub fn apply(&self, mut raw: RawConfig) -> RawConfig {
        if let Some(brokers) = &self.brokers {
            raw.brokers = Some(brokers.clone());
        }
        if let Some(client_id) = &self.client_id {
            raw.client_id = Some(client_id.clone());
        }
        if let Some(group_id) = &self.group_id {
            raw.group_id = Some(group_id.clone());
        }
        if self.ssl {
            raw.ssl = Some("true".to_string());
        }
        if self.auto_create_topics {
            raw.auto_create_topic = Some("true".to_string());
        }
        if let Some(ms) = self.connection_timeout_ms {
            raw.connection_timeout_ms = Some(ms.to_string());
        }
        if let Some(ms) = self.request_timeout_ms {
            raw.request_timeout_ms = Some(ms.to_string());
        }
        raw
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Terminal,
    Json,
}
