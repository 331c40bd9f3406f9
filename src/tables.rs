// ABOUTME: CSV adapters for the platform's input and output table folders
// ABOUTME: Reads request tables and writes the outcome table plus its manifest

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::delivery::InputRow;
use crate::error::ConnectorError;
use crate::outcome::{OutcomeLog, OUTCOME_COLUMNS, OUTCOME_PRIMARY_KEY};

pub fn input_tables_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("in").join("tables")
}

pub fn output_tables_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("out").join("tables")
}

/// A fully read input table.
#[derive(Debug, Clone)]
pub struct InputTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<InputRow>,
}

impl InputTable {
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<InputRow>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }
}

fn storage_error(path: &Path, err: impl std::fmt::Display) -> ConnectorError {
    ConnectorError::Storage(format!("{}: {}", path.display(), err))
}

/// Reads a headed CSV file. Short rows leave the trailing columns out of the row map.
pub fn read_table(path: &Path) -> Result<InputTable, ConnectorError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| storage_error(path, e))?;

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| storage_error(path, e))?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            // Strip a leading UTF-8 BOM.
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| storage_error(path, e))?;
        let row: InputRow = columns
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(row);
    }

    tracing::debug!(table = %name, rows = rows.len(), "Read input table");
    Ok(InputTable::new(name, columns, rows))
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    incremental: bool,
    primary_key: &'a [&'a str],
}

/// Writes the outcome table and its manifest into `dir`.
///
/// The CSV goes to a temporary file in the same directory and is renamed
/// into place once complete, so readers never see a partial table.
pub fn write_outcomes(dir: &Path, table_name: &str, log: &OutcomeLog) -> Result<PathBuf, ConnectorError> {
    fs::create_dir_all(dir).map_err(|e| storage_error(dir, e))?;
    let path = dir.join(table_name);

    let tmp = NamedTempFile::new_in(dir).map_err(|e| storage_error(dir, e))?;
    let mut writer = csv::Writer::from_writer(tmp);
    writer
        .write_record(OUTCOME_COLUMNS)
        .map_err(|e| storage_error(&path, e))?;
    for outcome in log.iter() {
        writer
            .write_record(outcome.to_record())
            .map_err(|e| storage_error(&path, e))?;
    }
    let tmp = writer
        .into_inner()
        .map_err(|e| storage_error(&path, e.error()))?;
    tmp.persist(&path).map_err(|e| storage_error(&path, e.error))?;

    let manifest_path = dir.join(format!("{}.manifest", table_name));
    write_manifest(&manifest_path)?;

    tracing::info!(path = %path.display(), rows = log.len(), "Wrote outcome table");
    Ok(path)
}

fn write_manifest(path: &Path) -> Result<(), ConnectorError> {
    let manifest = Manifest {
        incremental: true,
        primary_key: &OUTCOME_PRIMARY_KEY,
    };
    let json = serde_json::to_string_pretty(&manifest).map_err(|e| storage_error(path, e))?;
    let mut file = fs::File::create(path).map_err(|e| storage_error(path, e))?;
    file.write_all(json.as_bytes())
        .map_err(|e| storage_error(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{DeliveryRequest, Recipient};
    use crate::outcome::DeliveryOutcome;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_read_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboards.csv");
        fs::write(
            &path,
            "dashboard_id,recipients,filters\n1,a@x.com,\n2,b@x.com,\"{\"\"Country\"\": \"\"USA\"\"}\"\n",
        )
        .unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.name, "dashboards.csv");
        assert_eq!(table.columns, vec!["dashboard_id", "recipients", "filters"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["recipients"], "a@x.com");
        assert_eq!(table.rows[0]["filters"], "");
        assert_eq!(table.rows[1]["filters"], r#"{"Country": "USA"}"#);
    }

    #[test]
    fn test_read_table_strips_byte_order_mark() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bom.csv");
        fs::write(
            &path,
            "\u{feff}dashboard_id,recipients,filters\n1,a@x.com,\n",
        )
        .unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.columns[0], "dashboard_id");
        assert_eq!(table.rows[0]["dashboard_id"], "1");
        assert!(crate::delivery::validate_input_schema(
            &table.name,
            table.columns.as_slice(),
            &crate::delivery::REQUIRED_COLUMNS
        )
        .is_ok());
    }

    #[test]
    fn test_read_missing_table_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_table(&dir.path().join("nope.csv"));
        assert!(matches!(result, Err(ConnectorError::Storage(_))));
    }

    #[test]
    fn test_write_outcomes_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("out").join("tables");
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let request = DeliveryRequest::new(3, vec![Recipient::new("a@x.com")], None).unwrap();

        let mut log = OutcomeLog::new();
        log.push(DeliveryOutcome::sent(&request, ts));
        log.push(DeliveryOutcome::failed(&request, ts, "{\"message\":\"nope\"}"));

        let path = write_outcomes(&out_dir, "delivery_log.csv", &log).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(
            lines[0],
            "datetime,dashboard_id,recipient,filters,request_status,request_message"
        );
        assert_eq!(lines[1], "2024-01-02 03:04:05,3,a@x.com,,Sent,");
        assert_eq!(
            lines[2],
            "2024-01-02 03:04:05,3,a@x.com,,Error,\"{\"\"message\"\":\"\"nope\"\"}\""
        );

        let manifest: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(out_dir.join("delivery_log.csv.manifest")).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest["incremental"], true);
        assert_eq!(
            manifest["primary_key"],
            serde_json::json!(["datetime", "dashboard_id", "recipient", "filters"])
        );

        // Only the table and its manifest remain; the temp file was renamed.
        assert_eq!(fs::read_dir(&out_dir).unwrap().count(), 2);
    }
}
