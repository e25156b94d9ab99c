use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::models::AnalysisResult;
use crate::report;

pub const RESULTS_FILE: &str = "ab_test_results.json";
pub const BACKUP_FILE: &str = "results_backup.txt";

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Seq(Vec<Value>),
    Map(Vec<(String, Value)>),
}

pub fn normalize(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Real(x) => serde_json::Number::from_f64(*x)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Timestamp(ts) => serde_json::Value::String(ts.format(ISO_FORMAT).to_string()),
        Value::Seq(items) => serde_json::Value::Array(items.iter().map(normalize).collect()),
        Value::Map(entries) => serde_json::Value::Object(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), normalize(value)))
                .collect(),
        ),
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map_or(Value::Null, Value::Real),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => Value::Seq(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(entries) => {
                Value::Map(entries.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl Value {
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Value::from(serde_json::to_value(value)?))
    }
}

pub fn build_document(
    result: &AnalysisResult,
    generated_at: NaiveDateTime,
) -> Result<serde_json::Value> {
    let mut tree = Value::from_serialize(result)?;
    if let Value::Map(entries) = &mut tree {
        entries.push(("generated_at".to_string(), Value::Timestamp(generated_at)));
    }
    Ok(normalize(&tree))
}

pub fn to_json_string(result: &AnalysisResult, generated_at: NaiveDateTime) -> Result<String> {
    Ok(serde_json::to_string_pretty(&build_document(
        result,
        generated_at,
    )?)?)
}

/// `None` when neither the JSON nor the text dump could be written.
pub fn save_results(
    result: &AnalysisResult,
    reports_dir: &Path,
    generated_at: NaiveDateTime,
) -> Option<PathBuf> {
    let json_path = reports_dir.join(RESULTS_FILE);
    match write_json(result, &json_path, generated_at) {
        Ok(()) => {
            info!(path = %json_path.display(), "results saved");
            return Some(json_path);
        }
        Err(err) => warn!(path = %json_path.display(), error = %err, "could not save JSON results"),
    }

    let backup_path = reports_dir.join(BACKUP_FILE);
    match fs::write(&backup_path, report::build_backup(result, generated_at)) {
        Ok(()) => {
            info!(path = %backup_path.display(), "backup results saved");
            Some(backup_path)
        }
        Err(err) => {
            error!(path = %backup_path.display(), error = %err, "could not save results");
            None
        }
    }
}

fn write_json(result: &AnalysisResult, path: &Path, generated_at: NaiveDateTime) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, to_json_string(result, generated_at)?)?;
    Ok(())
}

pub fn read_results(path: &Path) -> Result<AnalysisResult> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
