use super::{ReportRenderer, ReportResult};
use crate::config::MASK;
use crate::probe::{ConfigSummary, ProbeReport, StageOutcome, Verdict};
use colored::Colorize;
use std::fmt::Write as _;

/// Terminal formatting constants
const TERMINAL_WIDTH: usize = 50;
const LABEL_WIDTH: usize = 22;

/// Terminal report renderer for console output
pub struct TerminalReporter {
    use_colors: bool,
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// Echo of the raw environment, shown before the run
    pub fn environment_text(&self, entries: &[(&'static str, String)]) -> ReportResult<String> {
        self.apply_colors();
        let mut out = String::new();
        writeln!(out, "\n{}", "Environment Variables:".bold())?;
        for (key, value) in entries {
            writeln!(out, "  {}={}", key, value)?;
        }
        Ok(out)
    }

    /// Configuration summary, shown before the run
    pub fn config_text(&self, config: &ConfigSummary) -> ReportResult<String> {
        self.apply_colors();
        let mut out = String::new();
        writeln!(out, "{}", "🔍 Testing Kafka Connection...".bold())?;
        writeln!(out, "📡 Brokers: {}", config.brokers.join(", ").cyan())?;
        writeln!(out, "🆔 Client ID: {}", config.client_id)?;
        writeln!(out, "🔐 SSL Enabled: {}", config.ssl)?;
        match (&config.sasl_mechanism, &config.sasl_username) {
            (Some(mechanism), Some(username)) => {
                writeln!(out, "🔑 SASL Enabled: Yes")?;
                writeln!(out, "   Mechanism: {}", mechanism)?;
                writeln!(out, "   Username: {}", username)?;
            }
            _ => writeln!(out, "🔑 SASL Enabled: No")?,
        }
        writeln!(out, "🏷️  Auto Create Topics: {}", config.allow_auto_topic_creation)?;
        writeln!(
            out,
            "⏱️  Timeouts: connection {} ms, request {} ms",
            config.connection_timeout_ms, config.request_timeout_ms
        )?;
        write!(out, "{}", "─".repeat(TERMINAL_WIDTH).bright_black())?;
        Ok(out)
    }

    /// Stage list, failure details and the verdict banner
    pub fn report_text(&self, report: &ProbeReport) -> ReportResult<String> {
        self.apply_colors();
        let mut out = String::new();

        writeln!(out, "\n{}", "📋 Probe Stages".bright_white().bold())?;
        for record in &report.stages {
            let label = format!("{:<width$}", record.stage.label(), width = LABEL_WIDTH);
            let timing = record
                .duration_ms
                .map(|ms| format!(" ({} ms)", ms))
                .unwrap_or_default();

            let line = match &record.outcome {
                StageOutcome::Success { detail } => {
                    let detail = detail.as_deref().map(|d| format!(" - {}", d)).unwrap_or_default();
                    format!("✅ {} {}{}{}", label, "OK".bright_green(), detail, timing.bright_black())
                }
                StageOutcome::Failure { kind, .. } => {
                    format!("❌ {} {}{}", label, kind.label().bright_red().bold(), timing.bright_black())
                }
                StageOutcome::Notice { .. } => {
                    format!("⚠️  {} {}{}", label, "NOTICE".bright_yellow(), timing.bright_black())
                }
                StageOutcome::NotAttempted => {
                    format!("⏭️  {} {}", label, "not attempted".bright_black())
                }
            };
            writeln!(out, "  {}", line)?;
        }

        if let Some(topics) = &report.topics {
            writeln!(out, "\n📝 Found {} topics", topics.count)?;
            if topics.count > 0 {
                writeln!(out, "   {}", topics.preview_line())?;
            }
        }

        if let Some(failure) = report.failure() {
            if let StageOutcome::Failure { kind, message, hint } = &failure.outcome {
                writeln!(out, "\n❌ {} failed: {}", failure.stage, message.bright_red())?;
                writeln!(out, "💡 Hint ({}): {}", kind, hint)?;
            }
            self.write_failure_config(&mut out, &report.config)?;
        }

        let notices = report.notices();
        if !notices.is_empty() {
            writeln!(out, "\n{}", "Notices:".bright_yellow())?;
            for notice in notices {
                writeln!(out, "  • {}", notice)?;
            }
        }

        if report.cancelled {
            writeln!(out, "\n{}", "⛔ Probe was cancelled".bright_yellow())?;
        }

        writeln!(out, "{}", "─".repeat(TERMINAL_WIDTH).bright_black())?;
        let banner = match report.verdict() {
            Verdict::Pass => "🎉 Kafka connection test PASSED".bright_green().bold(),
            Verdict::Fail => "💥 Kafka connection test FAILED".bright_red().bold(),
        };
        writeln!(out, "{}", banner)?;
        Ok(out)
    }

    fn write_failure_config(&self, out: &mut String, config: &ConfigSummary) -> std::fmt::Result {
        writeln!(out, "\n🔧 Current configuration:")?;
        writeln!(out, "   Brokers:   {}", config.brokers.join(", "))?;
        writeln!(out, "   Client ID: {}", config.client_id)?;
        writeln!(out, "   Group ID:  {}", config.group_id)?;
        writeln!(out, "   SSL:       {}", config.ssl)?;
        writeln!(
            out,
            "   Mechanism: {}",
            config.sasl_mechanism.as_deref().unwrap_or("NONE")
        )?;
        if config.sasl_mechanism.is_some() {
            writeln!(out, "   Password:  {}", MASK)?;
        }
        Ok(())
    }

    fn apply_colors(&self) {
        if !self.use_colors {
            colored::control::set_override(false);
        }
    }

    pub fn print_environment(&self, entries: &[(&'static str, String)]) -> ReportResult<()> {
        println!("{}", self.environment_text(entries)?);
        Ok(())
    }

    pub fn print_config(&self, config: &ConfigSummary) -> ReportResult<()> {
        println!("{}", self.config_text(config)?);
        Ok(())
    }
}

impl ReportRenderer for TerminalReporter {
    fn render(&self, report: &ProbeReport) -> ReportResult<()> {
        print!("{}", self.report_text(report)?);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "terminal"
    }
}
