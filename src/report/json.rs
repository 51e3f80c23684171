use super::{ReportRenderer, ReportResult};
use crate::probe::{ProbeReport, Verdict};
use chrono::Utc;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// JSON view of a probe report
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub tool_version: &'static str,
    pub report_generated_at: String,
    pub verdict: Verdict,
    pub exit_code: i32,
    pub duration_ms: Option<i64>,
    pub notices: Vec<String>,
    #[serde(flatten)]
    pub report: &'a ProbeReport,
}

impl<'a> JsonReport<'a> {
    pub fn new(report: &'a ProbeReport) -> Self {
        let verdict = report.verdict();
        Self {
            tool_version: env!("CARGO_PKG_VERSION"),
            report_generated_at: Utc::now().to_rfc3339(),
            verdict,
            exit_code: verdict.exit_code(),
            duration_ms: report.duration_ms(),
            notices: report.notices(),
            report,
        }
    }
}

/// JSON report renderer. Writes to stdout unless an output file is set.
#[derive(Default)]
pub struct JsonReporter {
    output: Option<PathBuf>,
}

impl JsonReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    pub fn to_json(&self, report: &ProbeReport) -> ReportResult<String> {
        Ok(serde_json::to_string_pretty(&JsonReport::new(report))?)
    }

    fn write_to(&self, json: &str, path: &Path) -> ReportResult<()> {
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

impl ReportRenderer for JsonReporter {
    fn render(&self, report: &ProbeReport) -> ReportResult<()> {
        let json = self.to_json(report)?;

        match &self.output {
            Some(path) if path != Path::new("-") => self.write_to(&json, path),
            _ => {
                println!("{}", json);
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "json"
    }
}
