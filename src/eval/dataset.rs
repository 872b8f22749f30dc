//! Dataset loading and validation
//!
//! A dataset is a directory holding `metadata.json` plus one data file:
//! `queries.jsonl`, `questions.json`, or `data.json` (checked in that
//! order). Validation accumulates problems instead of stopping at the
//! first: structural parse failures are fatal to an evaluation run, while
//! consistency findings (duplicate questions, a stale declared count) only
//! produce warnings.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::error::{Error, Result};
use crate::domain::types::{DatasetMetadata, EvaluationQuestion};

const METADATA_FILE: &str = "metadata.json";
const DATA_FILES: &[&str] = &["queries.jsonl", "questions.json", "data.json"];

/// Accumulated validation outcome for one dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Dataset directory name
    pub dataset_name: String,
    /// True when every check passed
    pub is_valid: bool,
    /// Presence of required files
    pub file_checks: BTreeMap<String, bool>,
    /// Structural problems; fatal to an evaluation run
    pub format_errors: Vec<String>,
    /// Consistency findings; logged, not fatal
    pub consistency_errors: Vec<String>,
    /// Question counts and difficulty distribution
    pub statistics: serde_json::Value,
}

impl ValidationReport {
    /// Whether the evaluation pipeline must refuse this dataset
    pub fn is_fatal(&self) -> bool {
        !self.is_valid && !self.format_errors.is_empty()
    }
}

/// Loads and validates annotated question/answer datasets
pub struct DatasetLoader {
    root: PathBuf,
}

impl DatasetLoader {
    /// Loader rooted at the given datasets directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Names of the dataset directories under the root
    pub fn list_datasets(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter(|e| e.path().join(METADATA_FILE).exists())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }

    fn dataset_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Load a dataset's questions and metadata
    pub fn load(&self, name: &str) -> Result<(Vec<EvaluationQuestion>, DatasetMetadata)> {
        let dir = self.dataset_dir(name);
        if !dir.is_dir() {
            return Err(Error::not_found(format!("dataset '{name}'")));
        }

        let metadata_bytes = fs::read(dir.join(METADATA_FILE))
            .map_err(|_| Error::not_found(format!("dataset '{name}' metadata.json")))?;
        let metadata: DatasetMetadata = serde_json::from_slice(&metadata_bytes)
            .map_err(|e| Error::validation(format!("metadata.json: {e}")))?;

        let data_file = DATA_FILES
            .iter()
            .map(|f| dir.join(f))
            .find(|p| p.exists())
            .ok_or_else(|| Error::not_found(format!("dataset '{name}' data file")))?;

        let questions = load_questions(&data_file)?;
        Ok((questions, metadata))
    }

    /// Validate a dataset, accumulating findings
    pub fn validate(&self, name: &str) -> ValidationReport {
        let dir = self.dataset_dir(name);
        let mut file_checks = BTreeMap::new();
        let mut format_errors = Vec::new();
        let mut consistency_errors = Vec::new();

        let metadata_path = dir.join(METADATA_FILE);
        file_checks.insert(METADATA_FILE.to_string(), metadata_path.exists());
        let data_file = DATA_FILES.iter().map(|f| dir.join(f)).find(|p| p.exists());
        file_checks.insert("data_file".to_string(), data_file.is_some());

        let mut metadata: Option<DatasetMetadata> = None;
        if metadata_path.exists() {
            match fs::read(&metadata_path) {
                Ok(bytes) => match serde_json::from_slice::<DatasetMetadata>(&bytes) {
                    Ok(parsed) => metadata = Some(parsed),
                    Err(e) => format_errors.push(format!("metadata.json format error: {e}")),
                },
                Err(e) => format_errors.push(format!("metadata.json read error: {e}")),
            }
        }

        let mut questions = Vec::new();
        if let Some(path) = &data_file {
            match load_questions(path) {
                Ok(parsed) => questions = parsed,
                Err(e) => format_errors.push(format!(
                    "{} format error: {e}",
                    path.file_name().and_then(|f| f.to_str()).unwrap_or("data")
                )),
            }
        }

        // Duplicate questions, compared case-insensitively and trimmed
        let mut seen = HashSet::new();
        for question in &questions {
            let key = question.question.trim().to_lowercase();
            if !seen.insert(key) {
                consistency_errors.push(format!(
                    "duplicate question: '{}'",
                    truncate(&question.question, 60)
                ));
            }
        }

        if let Some(meta) = &metadata {
            if let Some(declared) = meta.question_count {
                if declared != questions.len() {
                    consistency_errors.push(format!(
                        "metadata declares {declared} questions, found {}",
                        questions.len()
                    ));
                }
            }
        }

        let mut difficulty: BTreeMap<String, usize> = BTreeMap::new();
        for question in &questions {
            *difficulty.entry(question.difficulty.clone()).or_insert(0) += 1;
        }
        let statistics = json!({
            "question_count": questions.len(),
            "difficulty_distribution": difficulty,
        });

        let is_valid = file_checks.values().all(|&ok| ok)
            && format_errors.is_empty()
            && consistency_errors.is_empty();

        ValidationReport {
            dataset_name: name.to_string(),
            is_valid,
            file_checks,
            format_errors,
            consistency_errors,
            statistics,
        }
    }
}

fn load_questions(path: &Path) -> Result<Vec<EvaluationQuestion>> {
    let file_name = path.file_name().and_then(|f| f.to_str()).unwrap_or_default();
    if file_name.ends_with(".jsonl") {
        let file = fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let mut questions = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let question: EvaluationQuestion = serde_json::from_str(&line)
                .map_err(|e| Error::validation(format!("line {}: {e}", line_no + 1)))?;
            questions.push(question);
        }
        Ok(questions)
    } else {
        let bytes = fs::read(path)?;
        let questions: Vec<EvaluationQuestion> = serde_json::from_slice(&bytes)?;
        Ok(questions)
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_dataset(dir: &Path, metadata: &str, data_file: &str, data: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(METADATA_FILE), metadata).unwrap();
        let mut f = fs::File::create(dir.join(data_file)).unwrap();
        f.write_all(data.as_bytes()).unwrap();
    }

    #[test]
    fn loads_jsonl_dataset() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("ds");
        write_dataset(
            &dir,
            r#"{"name": "ds", "format": "jsonl", "question_count": 2}"#,
            "queries.jsonl",
            "{\"question\": \"q1\", \"answer\": \"A\", \"difficulty\": \"easy\"}\n\
             {\"question\": \"q2\", \"answer\": [\"A\", \"B\"], \"difficulty\": \"hard\"}\n",
        );

        let loader = DatasetLoader::new(tmp.path());
        let (questions, metadata) = loader.load("ds").unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[1].answer, vec!["A", "B"]);
        assert_eq!(metadata.name, "ds");
        assert_eq!(loader.list_datasets(), vec!["ds"]);
    }

    #[test]
    fn valid_dataset_passes_validation() {
        let tmp = tempfile::tempdir().unwrap();
        write_dataset(
            &tmp.path().join("good"),
            r#"{"name": "good", "format": "json", "question_count": 1}"#,
            "questions.json",
            r#"[{"question": "q", "answer": "A", "difficulty": "easy"}]"#,
        );
        let report = DatasetLoader::new(tmp.path()).validate("good");
        assert!(report.is_valid);
        assert!(!report.is_fatal());
        assert_eq!(report.statistics["question_count"], 1);
    }

    #[test]
    fn count_mismatch_is_consistency_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        write_dataset(
            &tmp.path().join("stale"),
            r#"{"name": "stale", "format": "json", "question_count": 5}"#,
            "questions.json",
            r#"[{"question": "q", "answer": "A", "difficulty": "easy"}]"#,
        );
        let report = DatasetLoader::new(tmp.path()).validate("stale");
        assert!(!report.is_valid);
        assert!(!report.is_fatal());
        assert_eq!(report.consistency_errors.len(), 1);
    }

    #[test]
    fn duplicate_questions_are_flagged() {
        let tmp = tempfile::tempdir().unwrap();
        write_dataset(
            &tmp.path().join("dup"),
            r#"{"name": "dup", "format": "json"}"#,
            "questions.json",
            r#"[{"question": "Same?", "answer": "A", "difficulty": "easy"},
                {"question": "  same? ", "answer": "B", "difficulty": "easy"}]"#,
        );
        let report = DatasetLoader::new(tmp.path()).validate("dup");
        assert!(!report.is_valid);
        assert!(!report.is_fatal());
        assert!(report.consistency_errors[0].contains("duplicate"));
    }

    #[test]
    fn broken_json_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        write_dataset(
            &tmp.path().join("broken"),
            r#"{"name": "broken", "format": "json"}"#,
            "questions.json",
            "this is not json",
        );
        let report = DatasetLoader::new(tmp.path()).validate("broken");
        assert!(report.is_fatal());
    }

    #[test]
    fn missing_dataset_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = DatasetLoader::new(tmp.path()).load("nope").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
