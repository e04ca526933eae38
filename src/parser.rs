//! CSV parser for the stop and prediction tables.

use anyhow::{Context, Result};
use csv::ReaderBuilder;

/// A header row and its data rows, all kept as raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Decodes CSV bytes with a header row into a [`Table`].
///
/// # Errors
///
/// Returns an error if the bytes are not valid UTF-8 CSV or a row has a
/// different number of fields than the header.
pub fn parse_table(bytes: &[u8]) -> Result<Table> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(bytes);

    let headers = reader
        .headers()
        .context("failed to read CSV header row")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read CSV data row {index}"))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_only() {
        let table = parse_table(b"hub,trip_ref,visit_sequence\n").unwrap();
        assert_eq!(table.headers, vec!["hub", "trip_ref", "visit_sequence"]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_parse_keeps_cells_verbatim() {
        let bytes = b"hub,note\nH1,\" padded \"\nH2,\n";
        let table = parse_table(bytes).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0], vec!["H1", " padded "]);
        assert_eq!(table.rows[1], vec!["H2", ""]);
    }

    #[test]
    fn test_parse_ragged_row_fails() {
        let bytes = b"hub,trip_ref\nH1,T1,extra\n";
        let result = parse_table(bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_invalid_utf8_fails() {
        let bytes = [b'h', b'\n', 0xFF, 0xFE, b'\n'];
        assert!(parse_table(&bytes).is_err());
    }
}
