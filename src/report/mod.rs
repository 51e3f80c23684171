pub mod json;
pub mod terminal;

use crate::probe::ProbeReport;

pub use json::JsonReporter;
pub use terminal::TerminalReporter;

/// Result type for report operations
pub type ReportResult<T> = Result<T, ReportError>;

/// Errors that can occur during report generation
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Formatting error: {0}")]
    FormatError(#[from] std::fmt::Error),
}

/// Trait for probe report renderers
pub trait ReportRenderer {
    /// Render a finished probe report
    fn render(&self, report: &ProbeReport) -> ReportResult<()>;

    /// Get renderer name
    fn name(&self) -> &'static str;
}
