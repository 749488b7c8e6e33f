//! CSV Output
//!
//! Suites are laid side by side, two columns (vector, result) per decoder:
//!
//! ```text
//! dummy,,,
//! Dummy,,Other,
//! Vector,Result,Vector,Result
//! one,Success,one,Success
//! ```

use crate::report::Report;

/// Generate the CSV summary.
pub fn generate_csv_report(report: &Report) -> Result<String, csv::Error> {
    let suites: Vec<_> = report
        .suites
        .iter()
        .filter(|s| !s.decoders.is_empty())
        .collect();
    let max_vectors = suites
        .iter()
        .flat_map(|s| &s.decoders)
        .map(|run| run.vectors.len())
        .max()
        .unwrap_or(0);

    let mut suite_row = Vec::new();
    let mut decoder_row = Vec::new();
    let mut field_row = Vec::new();
    let mut content_rows: Vec<Vec<String>> = vec![Vec::new(); max_vectors];

    for suite in &suites {
        suite_row.push(suite.name.clone());
        suite_row.extend(std::iter::repeat(String::new()).take(suite.decoders.len() * 2 - 1));

        for run in &suite.decoders {
            decoder_row.extend([run.decoder.clone(), String::new()]);
            field_row.extend(["Vector".to_string(), "Result".to_string()]);
            for (index, row) in content_rows.iter_mut().enumerate() {
                match run.vectors.get(index) {
                    Some(vector) => {
                        row.extend([vector.name.clone(), vector.status.label().to_string()])
                    }
                    None => row.extend([String::new(), String::new()]),
                }
            }
        }
    }

    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(&suite_row)?;
    writer.write_record(&decoder_row)?;
    writer.write_record(&field_row)?;
    for row in &content_rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::report;

    #[test]
    fn test_csv_layout() {
        let csv = generate_csv_report(&report(1)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "dummy,,,");
        assert_eq!(lines[1], "Dummy,,Other,");
        assert_eq!(lines[2], "Vector,Result,Vector,Result");
        assert_eq!(lines[3], "one,Success,one,Success");
        assert_eq!(lines[4], "two,Fail,two,Success");
        assert_eq!(lines[5], "three,Timeout,three,Error");
        assert_eq!(lines.len(), 6);
    }
}
