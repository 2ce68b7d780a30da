pub mod file;
pub mod stdin;

use lending_analytics_core::AggregateLoanRecord;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// JSON from `--input`, else from stdin.
pub fn read_input_value(path: Option<&str>, what: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        file::read_json_value(path)
    } else if let Some(data) = stdin::read_stdin()? {
        Ok(data)
    } else {
        Err(format!("--input file (or JSON on stdin) is required for {what}").into())
    }
}

pub fn read_input<T: DeserializeOwned>(
    path: Option<&str>,
    what: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    let value = read_input_value(path, what)?;
    Ok(serde_json::from_value(value)?)
}

/// Records as a bare array or wrapped in `{ "records": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordSource {
    Bare(Vec<AggregateLoanRecord>),
    Wrapped { records: Vec<AggregateLoanRecord> },
}

pub fn read_records(path: Option<&str>) -> Result<Vec<AggregateLoanRecord>, Box<dyn std::error::Error>> {
    let source: RecordSource = read_input(path, "loan records")?;
    Ok(match source {
        RecordSource::Bare(records) | RecordSource::Wrapped { records } => records,
    })
}
