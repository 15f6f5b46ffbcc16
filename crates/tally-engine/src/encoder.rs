//! Result artifact encoder
//!
//! Serializes the final category totals into the two-column result CSV.
//! Rows are sorted lexicographically by category: the order is part of the
//! artifact contract here, replacing the unordered map iteration of the
//! system this was rebuilt from.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::EngineError;

/// Header row of the result artifact.
pub const RESULT_HEADER: [&str; 2] = ["Department Name", "Total Number of Sales"];

/// Write the totals as CSV to any writer, sorted by category.
pub fn write_totals<W: Write>(wtr: W, totals: &HashMap<String, i64>) -> Result<(), EngineError> {
    let mut writer = csv::Writer::from_writer(wtr);

    writer
        .write_record(RESULT_HEADER)
        .map_err(|e| EngineError::Write(e.to_string()))?;

    let mut categories: Vec<&String> = totals.keys().collect();
    categories.sort();

    for category in categories {
        writer
            .write_record([category.as_str(), &totals[category].to_string()])
            .map_err(|e| EngineError::Write(e.to_string()))?;
    }

    writer.flush().map_err(|e| EngineError::Write(e.to_string()))
}

/// Write the totals to a file at `path`.
pub fn write_totals_file(path: &Path, totals: &HashMap<String, i64>) -> Result<(), EngineError> {
    let file = File::create(path).map_err(|e| EngineError::Write(e.to_string()))?;
    write_totals(file, totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(totals: &HashMap<String, i64>) -> String {
        let mut buf = Vec::new();
        write_totals(&mut buf, totals).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_rows_sorted_lexicographically() {
        let totals = HashMap::from([
            ("Sales".to_string(), 350),
            ("Marketing".to_string(), 75),
            ("Engineering".to_string(), 10),
        ]);

        let output = encode(&totals);
        assert_eq!(
            output,
            "Department Name,Total Number of Sales\n\
             Engineering,10\n\
             Marketing,75\n\
             Sales,350\n"
        );
    }

    #[test]
    fn test_empty_totals_writes_header_only() {
        let output = encode(&HashMap::new());
        assert_eq!(output, "Department Name,Total Number of Sales\n");
    }

    #[test]
    fn test_category_with_comma_is_quoted() {
        let totals = HashMap::from([("Sales, EMEA".to_string(), 5)]);
        let output = encode(&totals);
        assert_eq!(
            output,
            "Department Name,Total Number of Sales\n\"Sales, EMEA\",5\n"
        );
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.csv");
        let totals = HashMap::from([("Sales".to_string(), 350)]);

        write_totals_file(&path, &totals).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "Department Name,Total Number of Sales\nSales,350\n"
        );
    }
}
