//! CSV dataset loading

use std::io::Read;
use std::path::Path;

use tracing::{info, warn};

use crate::record::{Employee, RawRecord, CSV_COLUMNS};
use crate::{Error, Result};

/// Read every row of a training CSV
///
/// Fails with [`Error::DataFormat`] if any expected column is absent from the
/// header or a row cannot be decoded.
pub fn load_csv(path: &Path) -> Result<Vec<RawRecord>> {
    let file = std::fs::File::open(path).map_err(|e| {
        Error::DataFormat(format!("Open dataset {} failed: {}", path.display(), e))
    })?;
    let records = read_csv(file)?;
    info!("Loaded {} rows from {}", records.len(), path.display());
    Ok(records)
}

/// Read rows from any reader carrying the CSV header
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| Error::DataFormat(format!("Read header failed: {}", e)))?
        .clone();
    check_header(&headers)?;

    let mut records = Vec::new();
    for (row, result) in reader.deserialize::<RawRecord>().enumerate() {
        // Row numbers are 1-based and skip the header line
        let record = result
            .map_err(|e| Error::DataFormat(format!("Row {} malformed: {}", row + 2, e)))?;
        records.push(record);
    }
    Ok(records)
}

fn check_header(headers: &csv::StringRecord) -> Result<()> {
    let missing: Vec<&str> = CSV_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();
    if !missing.is_empty() {
        return Err(Error::DataFormat(format!(
            "Dataset is missing column(s): {}",
            missing.join(", ")
        )));
    }

    if headers.iter().last() != Some("target") {
        warn!("Label column 'target' is not last in the header; columns are matched by name");
    }
    Ok(())
}

/// Normalize every raw row, aborting on the first bad one
pub fn normalize_all(records: &[RawRecord]) -> Result<Vec<Employee>> {
    records
        .iter()
        .enumerate()
        .map(|(row, raw)| {
            Employee::from_raw(raw).map_err(|e| match e {
                Error::DataFormat(msg) => Error::DataFormat(format!("Row {}: {}", row + 2, msg)),
                other => other,
            })
        })
        .collect()
}
