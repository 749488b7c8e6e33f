//! JSON Output

use crate::report::Report;

/// Schema version written into [`crate::ReportMeta::schema_version`]
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Generate a prettified JSON report.
pub fn generate_json_report(report: &Report) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::report;

    #[test]
    fn test_json_roundtrips_statuses() {
        let json = generate_json_report(&report(1)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["suites"][0]["decoders"][0]["vectors"][1]["status"], "fail");
        assert_eq!(value["summary"]["total_vectors"], 6);
        assert!(value["suites"][0]["decoders"][0]["vectors"][0]
            .get("failures")
            .is_none());
    }
}
