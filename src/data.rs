//! CSV test data
//!
//! Fixtures such as registration users are kept in CSV files under `datas/`.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Default directory for CSV fixtures, relative to the crate root
pub const DEFAULT_DATA_DIR: &str = "datas";

/// One CSV record keyed by header name
pub type Row = HashMap<String, String>;

/// Read a CSV file with a header row
pub fn read_csv(path: impl AsRef<Path>) -> Result<Vec<Row>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Data file not found: {}", path.display()),
        )));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let rows: Vec<Row> = reader
        .deserialize::<Row>()
        .collect::<std::result::Result<_, csv::Error>>()?;
    Ok(rows)
}

/// Read a CSV file without a header row
pub fn read_csv_records(path: impl AsRef<Path>) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path.as_ref())?;
    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record?.iter().map(String::from).collect());
    }
    Ok(records)
}

/// Read `name` from the default data directory
pub fn load(name: &str) -> Result<Vec<Row>> {
    read_csv(Path::new(DEFAULT_DATA_DIR).join(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_csv_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.csv");
        std::fs::write(&path, "name,email\nAda,ada@example.com\nLin,\"lin@example.com\"\n").unwrap();

        let rows = read_csv(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "Ada");
        assert_eq!(rows[1]["email"], "lin@example.com");
    }

    #[test]
    fn test_read_csv_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(&path, "a,b\nc,d\n").unwrap();

        let records = read_csv_records(&path).unwrap();
        assert_eq!(records, vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn test_missing_file() {
        let err = read_csv("does/not/exist.csv").unwrap_err();
        assert!(err.to_string().contains("Data file not found"));
    }
}
