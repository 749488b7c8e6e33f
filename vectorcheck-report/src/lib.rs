#![warn(missing_docs)]
//! vectorcheck report
//!
//! Run report model plus the summary formats a run can emit:
//! - Markdown (default, printed or written to a file)
//! - CSV (spreadsheet-compatible)
//! - JUnit XML (CI test dashboards)
//! - JSON (machine-readable, full detail)

mod csv;
mod json;
mod junit;
mod markdown;
#[allow(missing_docs)]
mod report;

pub use self::csv::generate_csv_report;
pub use json::{REPORT_SCHEMA_VERSION, generate_json_report};
pub use junit::generate_junit_report;
pub use markdown::{ResultGlyphs, generate_markdown_summary};
pub use report::{
    DecoderRun, FailureInfo, Report, ReportConfig, ReportMeta, ReportSummary, SuiteReport,
    SystemInfo, VectorReport, VectorStatus,
};

use thiserror::Error;

/// Summary format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryFormat {
    /// Markdown table
    #[default]
    Markdown,
    /// CSV for spreadsheets
    Csv,
    /// JUnit XML for CI
    JunitXml,
    /// JSON with full detail
    Json,
}

impl SummaryFormat {
    /// Formats other than Markdown are never printed to the terminal.
    pub fn requires_output_file(&self) -> bool {
        !matches!(self, SummaryFormat::Markdown)
    }

    /// Name accepted on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryFormat::Markdown => "md",
            SummaryFormat::Csv => "csv",
            SummaryFormat::JunitXml => "junitxml",
            SummaryFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for SummaryFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "md" | "markdown" => Ok(SummaryFormat::Markdown),
            "csv" => Ok(SummaryFormat::Csv),
            "junitxml" | "junit" => Ok(SummaryFormat::JunitXml),
            "json" => Ok(SummaryFormat::Json),
            other => Err(format!("Unknown summary format: {}", other)),
        }
    }
}

/// Errors produced while rendering a summary
#[derive(Debug, Error)]
pub enum SummaryError {
    /// CSV writer failure
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),
    /// JUnit serialization failure
    #[error("JUnit XML error: {0}")]
    Junit(#[from] quick_junit::SerializeError),
    /// JSON serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Render `report` in `format`.
pub fn render_summary(
    report: &Report,
    format: SummaryFormat,
    glyphs: ResultGlyphs,
) -> Result<String, SummaryError> {
    Ok(match format {
        SummaryFormat::Markdown => generate_markdown_summary(report, glyphs),
        SummaryFormat::Csv => generate_csv_report(report)?,
        SummaryFormat::JunitXml => generate_junit_report(report)?,
        SummaryFormat::Json => generate_json_report(report)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_format_parse() {
        assert_eq!("md".parse::<SummaryFormat>().unwrap(), SummaryFormat::Markdown);
        assert_eq!("JUnitXML".parse::<SummaryFormat>().unwrap(), SummaryFormat::JunitXml);
        assert!("html".parse::<SummaryFormat>().is_err());
        assert!(SummaryFormat::Csv.requires_output_file());
        assert!(!SummaryFormat::Markdown.requires_output_file());
    }
}
