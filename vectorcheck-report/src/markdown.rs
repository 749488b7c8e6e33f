//! Markdown summary table, one block per suite.

use crate::report::{DecoderRun, Report, ReportConfig, SuiteReport, VectorStatus};
use std::fmt::Write;

/// Symbols used for verdicts in the Markdown table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultGlyphs {
    #[default]
    Emoji,
    /// Plain two-letter codes for terminals without emoji
    Text,
}

impl ResultGlyphs {
    pub fn glyph(&self, status: VectorStatus) -> &'static str {
        match (self, status) {
            (_, VectorStatus::NotRun) => "",
            (ResultGlyphs::Emoji, VectorStatus::Success | VectorStatus::Reference) => "✔️",
            (ResultGlyphs::Emoji, VectorStatus::Fail) => "❌",
            (ResultGlyphs::Emoji, VectorStatus::Timeout) => "⌛",
            (ResultGlyphs::Emoji, VectorStatus::Error) => "☠",
            (ResultGlyphs::Text, VectorStatus::Success | VectorStatus::Reference) => "OK",
            (ResultGlyphs::Text, VectorStatus::Fail) => "KO",
            (ResultGlyphs::Text, VectorStatus::Timeout) => "TO",
            (ResultGlyphs::Text, VectorStatus::Error) => "ER",
        }
    }
}

fn separator(runs: &[DecoderRun]) -> String {
    format!("|-|{}", "-|".repeat(runs.len()))
}

fn header(runs: &[DecoderRun]) -> String {
    let mut line = "|Test|".to_string();
    for run in runs {
        line.push_str(&run.decoder);
        line.push('|');
    }
    line
}

fn totals(runs: &[DecoderRun], config: &ReportConfig) -> String {
    let mut out = "|TOTAL|".to_string();
    for run in runs {
        let _ = write!(out, "{}/{}|", run.success_count, run.total);
    }
    out.push_str("\n|TOTAL TIME|");
    for run in runs {
        let _ = write!(out, "{:.3}s|", run.time_without_timeouts(config));
    }
    out
}

fn suite_block(suite: &SuiteReport, config: &ReportConfig, glyphs: ResultGlyphs) -> String {
    let runs = &suite.decoders;
    let sep = separator(runs);
    let mut lines = vec![
        header(runs),
        sep.clone(),
        totals(runs, config),
        sep.clone(),
    ];

    if let Some(first) = runs.first() {
        for vector in &first.vectors {
            let mut line = format!("|{}|", vector.name);
            for run in runs {
                let status = run
                    .vector(&vector.name)
                    .map(|v| v.status)
                    .unwrap_or(VectorStatus::NotRun);
                line.push_str(glyphs.glyph(status));
                line.push('|');
            }
            lines.push(line);
        }
    }

    lines.push(sep);
    lines.push(header(runs));
    lines.push(totals(runs, config));
    lines.join("\n")
}

/// Render the summary. Suites that no decoder ran are left out.
pub fn generate_markdown_summary(report: &Report, glyphs: ResultGlyphs) -> String {
    let mut output = String::new();
    for suite in report.suites.iter().filter(|s| !s.decoders.is_empty()) {
        output.push_str(&suite_block(suite, &report.meta.config, glyphs));
        output.push_str("\n\n");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::report;

    #[test]
    fn test_markdown_layout() {
        let md = generate_markdown_summary(&report(1), ResultGlyphs::Text);
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines[0], "|Test|Dummy|Other|");
        assert_eq!(lines[1], "|-|-|-|");
        assert_eq!(lines[2], "|TOTAL|1/3|2/3|");
        assert_eq!(lines[3], "|TOTAL TIME|1.500s|1.250s|");
        assert_eq!(lines[4], "|-|-|-|");
        assert_eq!(lines[5], "|one|OK|OK|");
        assert_eq!(lines[6], "|two|KO|OK|");
        assert_eq!(lines[7], "|three|TO|ER|");
        assert_eq!(lines[8], "|-|-|-|");
        assert_eq!(lines[9], "|Test|Dummy|Other|");
        assert_eq!(lines[10], "|TOTAL|1/3|2/3|");
        assert!(md.ends_with("|\n\n"));
    }

    #[test]
    fn test_emoji_glyphs() {
        let md = generate_markdown_summary(&report(4), ResultGlyphs::Emoji);
        assert!(md.contains("|three|⌛|☠|"));
        assert!(md.contains("|TOTAL TIME|31.500s|1.250s|"));
    }

    #[test]
    fn test_not_run_is_blank() {
        assert_eq!(ResultGlyphs::Emoji.glyph(VectorStatus::NotRun), "");
        assert_eq!(ResultGlyphs::Text.glyph(VectorStatus::Reference), "OK");
    }
}
