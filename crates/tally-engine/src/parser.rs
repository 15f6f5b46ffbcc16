//! Streaming row parser for the input CSV
//!
//! Produces records one at a time from a byte-oriented source, so memory use
//! is independent of file size. The first row is consumed and discarded as a
//! header with no validation of its contents; every data row must have
//! exactly 3 fields (category, date, count). Field *contents* are not
//! interpreted here: the count is handed on as text and parsed at the
//! reduction step, where a bad value drops one record instead of the job.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use crate::error::EngineError;

/// One raw row from the input file. The date is opaque text, retained but
/// never validated as a calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub category: String,
    pub date: String,
    pub count: String,
}

/// Lazy, non-restartable stream of input rows.
///
/// The underlying CSV reader is configured headerless and flexible so that
/// arity is checked here, where a violation is a fatal
/// [`EngineError::Structural`] rather than a skipped row. Blank lines are
/// ignored by the reader, end of input ends the iteration normally.
#[derive(Debug)]
pub struct RowStream<R: Read> {
    reader: csv::Reader<R>,
    record: StringRecord,
    /// 1-based row number of the last row read, counting the header.
    row: u64,
}

impl RowStream<File> {
    /// Open an input file and consume its header row.
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let file = File::open(path).map_err(EngineError::Access)?;
        Self::from_reader(file)
    }
}

impl<R: Read> RowStream<R> {
    /// Build a stream over any reader and consume the header row.
    ///
    /// Empty input is a structural error: a file with no header is not a
    /// valid submission, while a file with *only* a header is (it yields an
    /// empty stream).
    pub fn from_reader(rdr: R) -> Result<Self, EngineError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(rdr);

        let mut header = StringRecord::new();
        let got_header = reader
            .read_record(&mut header)
            .map_err(|e| EngineError::Structural(format!("failed to read header row: {e}")))?;
        if !got_header {
            return Err(EngineError::Structural(
                "input is empty, expected a header row".to_string(),
            ));
        }

        Ok(Self {
            reader,
            record: StringRecord::new(),
            row: 1,
        })
    }

    /// Read the next data row, or `Ok(None)` at end of input.
    fn next_row(&mut self) -> Result<Option<RawRecord>, EngineError> {
        let got = self
            .reader
            .read_record(&mut self.record)
            .map_err(|e| EngineError::Structural(format!("row {}: {e}", self.row + 1)))?;
        if !got {
            return Ok(None);
        }
        self.row += 1;

        if self.record.len() != 3 {
            return Err(EngineError::Structural(format!(
                "row {}: expected 3 fields, found {}",
                self.row,
                self.record.len()
            )));
        }

        Ok(Some(RawRecord {
            category: self.record[0].to_string(),
            date: self.record[1].to_string(),
            count: self.record[2].to_string(),
        }))
    }
}

impl<R: Read> Iterator for RowStream<R> {
    type Item = Result<RawRecord, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(input: &str) -> Result<RowStream<&[u8]>, EngineError> {
        RowStream::from_reader(input.as_bytes())
    }

    #[test]
    fn test_header_is_discarded() {
        let mut rows = stream("Department,Date,Sales\nSales,2023-01-15,150\n").unwrap();
        let first = rows.next().unwrap().unwrap();
        assert_eq!(first.category, "Sales");
        assert_eq!(first.date, "2023-01-15");
        assert_eq!(first.count, "150");
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_header_contents_not_validated() {
        // A nonsense header row is still just consumed and discarded.
        let mut rows = stream("not,a,real,header,at,all\nSales,2023-01-15,150\n").unwrap();
        assert_eq!(rows.next().unwrap().unwrap().category, "Sales");
    }

    #[test]
    fn test_empty_input_is_structural_error() {
        match stream("") {
            Err(EngineError::Structural(msg)) => assert!(msg.contains("header")),
            other => panic!("expected structural error, got {other:?}"),
        }
    }

    #[test]
    fn test_header_only_yields_empty_stream() {
        let mut rows = stream("Department,Date,Sales\n").unwrap();
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_short_row_is_fatal() {
        let mut rows = stream("h,h,h\nSales,150\n").unwrap();
        match rows.next().unwrap() {
            Err(EngineError::Structural(msg)) => {
                assert!(msg.contains("expected 3 fields, found 2"), "{msg}");
            },
            other => panic!("expected structural error, got {other:?}"),
        }
    }

    #[test]
    fn test_long_row_is_fatal() {
        let mut rows = stream("h,h,h\nSales,2023-01-15,150,extra\n").unwrap();
        match rows.next().unwrap() {
            Err(EngineError::Structural(msg)) => {
                assert!(msg.contains("expected 3 fields, found 4"), "{msg}");
            },
            other => panic!("expected structural error, got {other:?}"),
        }
    }

    #[test]
    fn test_row_number_in_error_counts_header() {
        let mut rows = stream("h,h,h\nSales,2023-01-15,150\nbad,row\n").unwrap();
        assert!(rows.next().unwrap().is_ok());
        match rows.next().unwrap() {
            Err(EngineError::Structural(msg)) => assert!(msg.starts_with("row 3:"), "{msg}"),
            other => panic!("expected structural error, got {other:?}"),
        }
    }

    #[test]
    fn test_quoted_fields() {
        let mut rows = stream("h,h,h\n\"Sales, EMEA\",2023-01-15,150\n").unwrap();
        assert_eq!(rows.next().unwrap().unwrap().category, "Sales, EMEA");
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let mut rows = stream("h,h,h\n\nSales,2023-01-15,150\n\n").unwrap();
        assert_eq!(rows.next().unwrap().unwrap().category, "Sales");
        assert!(rows.next().is_none());
    }
}
