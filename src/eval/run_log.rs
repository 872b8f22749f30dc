//! Append-only evaluation run log
//!
//! One JSON line per completed run. The log is an audit trail, not a
//! database: records are never rewritten, and a failed append surfaces as a
//! persistence error without affecting the evaluation result itself.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{Error, Result};

/// One persisted evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique run id
    pub run_id: String,
    /// Adapter the run was executed against
    pub adapter_name: String,
    /// Dataset name
    pub dataset: String,
    /// Request configuration (k values, metrics, options)
    pub config: serde_json::Value,
    /// Aggregated metric scores, `metric → k → score`
    pub metrics: BTreeMap<String, BTreeMap<String, f64>>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// When the run finished
    pub timestamp: DateTime<Utc>,
}

/// Appends run records to a JSONL file
pub struct EvaluationRunLog {
    path: PathBuf,
}

impl EvaluationRunLog {
    /// Log writing to the given path; the file is created on first append
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one record
    pub fn append(&self, record: &RunRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::persistence(format!("open {}: {e}", self.path.display())))?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")
            .map_err(|e| Error::persistence(format!("append {}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_line_per_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("runs.jsonl");
        let log = EvaluationRunLog::new(&path);

        for i in 0..3 {
            log.append(&RunRecord {
                run_id: format!("run-{i}"),
                adapter_name: "mock".to_string(),
                dataset: "ds".to_string(),
                config: serde_json::json!({"k_values": [1, 5]}),
                metrics: BTreeMap::new(),
                duration_ms: 42,
                timestamp: Utc::now(),
            })
            .unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        let parsed: RunRecord = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(parsed.run_id, "run-2");
    }
}
