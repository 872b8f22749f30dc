//! Retrieval Domain Model
//!
//! Defines the fundamental entities that flow through the hybrid retrieval
//! pipeline, from the pre-parsed code chunks received at the indexing
//! boundary to the fused results returned to callers and the records the
//! evaluation pipeline scores.
//!
//! ## Core Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChunkMeta`] | Canonical metadata record shared by every downstream representation |
//! | [`Chunk`] | Immutable code fragment with a stable content-derived id |
//! | [`EnhancedChunk`] | Chunk enriched with keywords, tags, and relationships |
//! | [`VectorRecord`] | `(id, vector, payload)` triple stored in the vector index |
//! | [`RetrievalResult`] | Single-source ranked result (vector, bm25, or hybrid) |
//! | [`FusedResult`] | Fusion output preserving per-source scores and ranks |
//!
//! ## Evaluation Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`EvaluationQuestion`] | Question with its ordered ground-truth answer list |
//! | [`DatasetMetadata`] | Dataset descriptor loaded from `metadata.json` |
//!
//! Downstream records hold `ChunkMeta` by value copy; there is exactly one
//! definition of the metadata shape, serialized into vector payloads and
//! BM25 node metadata with the same field names.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::error::{Error, Result};

/// Supported source languages for indexed chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python sources (`.py`)
    Python,
    /// Java sources (`.java`)
    Java,
    /// JavaScript sources (`.js`)
    JavaScript,
    /// TypeScript sources (`.ts`)
    TypeScript,
}

impl Language {
    /// Lowercase wire name, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Java => "java",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
        }
    }

    /// Whether `file_path`'s extension is consistent with this language
    pub fn matches_extension(&self, file_path: &str) -> bool {
        let ext = file_path.rsplit('.').next().unwrap_or_default();
        match self {
            Language::Python => ext == "py",
            Language::Java => ext == "java",
            Language::JavaScript => matches!(ext, "js" | "jsx" | "mjs"),
            Language::TypeScript => matches!(ext, "ts" | "tsx"),
        }
    }
}

/// Structural kind of a code chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeType {
    /// A class definition
    Class,
    /// A method belonging to a class
    Method,
    /// A free function
    Function,
    /// An interface definition
    Interface,
    /// An enum definition
    Enum,
    /// A module-level block
    Module,
}

impl CodeType {
    /// Lowercase wire name, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeType::Class => "class",
            CodeType::Method => "method",
            CodeType::Function => "function",
            CodeType::Interface => "interface",
            CodeType::Enum => "enum",
            CodeType::Module => "module",
        }
    }
}

/// A single declared parameter of a method or function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Declared type, when the source language carries one
    #[serde(rename = "type", default)]
    pub type_name: Option<String>,
}

/// Canonical chunk metadata
///
/// This is the single source of truth for chunk metadata. The BM25 node
/// metadata and the vector payload are serialized copies of this record,
/// so filters address the same field names everywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Path of the source file the chunk came from
    pub file_path: String,
    /// Source language, consistent with the file extension
    pub language: Language,
    /// Structural kind of the chunk
    pub code_type: CodeType,
    /// Declared name (class name, method name, ...)
    pub name: String,
    /// First line of the fragment (1-based)
    pub line_start: u32,
    /// Last line of the fragment, `>= line_start`
    pub line_end: u32,
    /// Enclosing namespace or package, dotted
    #[serde(default)]
    pub namespace: Option<String>,
    /// Enclosing class for methods
    #[serde(default)]
    pub parent_class: Option<String>,
    /// Access and storage modifiers (`public`, `static`, ...)
    #[serde(default)]
    pub modifiers: Vec<String>,
    /// Annotations or decorators, without the leading `@`
    #[serde(default)]
    pub annotations: Vec<String>,
    /// Ordered parameter list
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Declared return type
    #[serde(default)]
    pub return_type: Option<String>,
    /// Extended superclass, if any
    #[serde(default)]
    pub extends: Option<String>,
    /// Implemented interfaces
    #[serde(default)]
    pub implements: Vec<String>,
    /// Derived keyword terms attached upstream
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ChunkMeta {
    /// Validate the record invariants: line ordering and language/extension consistency
    pub fn validate(&self) -> Result<()> {
        if self.line_start < 1 {
            return Err(Error::validation("line_start must be >= 1"));
        }
        if self.line_end < self.line_start {
            return Err(Error::validation(format!(
                "line_end {} precedes line_start {}",
                self.line_end, self.line_start
            )));
        }
        if !self.language.matches_extension(&self.file_path) {
            return Err(Error::validation(format!(
                "language '{}' inconsistent with file path '{}'",
                self.language.as_str(),
                self.file_path
            )));
        }
        Ok(())
    }

    /// Serialize into a JSON object for use as a payload / node metadata
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Immutable code fragment as received from the upstream AST splitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable id, a hash of `(file_path, name, line_start, line_end)`
    pub id: String,
    /// Raw source text of the fragment
    pub content: String,
    /// Canonical metadata
    pub metadata: ChunkMeta,
}

impl Chunk {
    /// Build a chunk, deriving the stable id from the metadata
    pub fn new(content: impl Into<String>, metadata: ChunkMeta) -> Self {
        let id = Self::stable_id(&metadata);
        Self {
            id,
            content: content.into(),
            metadata,
        }
    }

    /// Content-independent stable document id
    ///
    /// Re-parsing an unchanged file yields the same ids, which is what makes
    /// delete-then-insert re-indexing idempotent.
    pub fn stable_id(meta: &ChunkMeta) -> String {
        let mut hasher = Sha256::new();
        hasher.update(meta.file_path.as_bytes());
        hasher.update(b":");
        hasher.update(meta.name.as_bytes());
        hasher.update(b":");
        hasher.update(meta.line_start.to_string().as_bytes());
        hasher.update(b":");
        hasher.update(meta.line_end.to_string().as_bytes());
        let digest = hasher.finalize();
        // 16 bytes of hex is plenty for uniqueness within a collection
        digest[..16].iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Structural relationships derived from chunk metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationships {
    /// Enclosing class
    #[serde(default)]
    pub parent: Option<String>,
    /// Extended superclass
    #[serde(default)]
    pub extends: Option<String>,
    /// Implemented interfaces
    #[serde(default)]
    pub implements: Vec<String>,
    /// Types this chunk depends on (parameter and return types)
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Enclosing namespace
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Document-builder output: a chunk plus derived retrieval signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedChunk {
    /// The underlying chunk
    pub chunk: Chunk,
    /// Prose context header followed by the original code
    pub enhanced_content: String,
    /// Deduplicated search keywords (names, types, annotations, ...)
    pub search_keywords: Vec<String>,
    /// Derived labels such as `type:method`, `lang:java`, `purpose:getter`
    pub semantic_tags: Vec<String>,
    /// Structural relationships
    pub relationships: Relationships,
}

/// A point stored in the vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Document id, shared with the BM25 node for the same chunk
    pub id: String,
    /// Embedding vector; uniform dimension per collection
    pub vector: Vec<f32>,
    /// Chunk metadata plus `content`, for result reconstruction
    pub payload: serde_json::Value,
}

/// Which index produced a retrieval result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalSource {
    /// Dense vector similarity search
    Vector,
    /// Lexical BM25 search
    Bm25,
    /// Fused hybrid result
    Hybrid,
}

impl std::fmt::Display for RetrievalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RetrievalSource::Vector => "vector",
            RetrievalSource::Bm25 => "bm25",
            RetrievalSource::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

/// Ranked result from a single retrieval source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Document id
    pub id: String,
    /// Stored content
    pub content: String,
    /// Non-negative relevance score
    pub score: f32,
    /// Producing source
    pub source: RetrievalSource,
    /// Stored metadata payload
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Source file path, when the backend exposes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// Fusion output for a single document
///
/// Individual scores and ranks are preserved so callers can inspect how a
/// document earned its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    /// Document id
    pub id: String,
    /// Stored content
    pub content: String,
    /// Cosine score from the vector leg (0 when absent)
    pub vector_score: f32,
    /// Raw BM25 score from the lexical leg (0 when absent)
    pub bm25_score: f32,
    /// 1-based rank in the vector result list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_rank: Option<usize>,
    /// 1-based rank in the BM25 result list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bm25_rank: Option<usize>,
    /// Fused score the final ordering is based on
    pub combined_score: f32,
    /// The source lists that contributed this document
    pub sources: Vec<RetrievalSource>,
    /// Stored metadata payload
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// One condition of the internal filter DSL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    /// Metadata field the condition addresses
    pub field: String,
    /// Match predicate
    pub predicate: MatchPredicate,
}

/// Match predicate for a filter condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchPredicate {
    /// Metadata value must be one of the listed values
    ///
    /// Listed before `Equals` so untagged deserialization maps JSON arrays
    /// here instead of treating them as scalar values.
    AnyOf(Vec<serde_json::Value>),
    /// Scalar equality; for list-valued metadata, membership of the scalar
    Equals(serde_json::Value),
}

/// AND-of-conditions filter over metadata fields
///
/// Unknown fields never match: a condition on a missing field rejects the
/// document rather than erroring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Conditions, all of which must hold
    pub conditions: Vec<FilterCondition>,
}

impl Filter {
    /// Filter with a single equality condition
    pub fn equals(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            conditions: vec![FilterCondition {
                field: field.into(),
                predicate: MatchPredicate::Equals(value.into()),
            }],
        }
    }

    /// Filter with a single any-of condition
    pub fn any_of(field: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        Self {
            conditions: vec![FilterCondition {
                field: field.into(),
                predicate: MatchPredicate::AnyOf(values),
            }],
        }
    }

    /// Build from a flat JSON object: array values become any-of, scalars equality
    pub fn from_object(map: &serde_json::Map<String, serde_json::Value>) -> Self {
        let conditions = map
            .iter()
            .map(|(field, value)| {
                let predicate = match value {
                    serde_json::Value::Array(items) => MatchPredicate::AnyOf(items.clone()),
                    other => MatchPredicate::Equals(other.clone()),
                };
                FilterCondition {
                    field: field.clone(),
                    predicate,
                }
            })
            .collect();
        Self { conditions }
    }

    /// True when there is nothing to filter on
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate against a metadata object
    ///
    /// Every condition's field must be present and match; list-valued
    /// metadata matches an equality condition by membership.
    pub fn matches(&self, metadata: &serde_json::Value) -> bool {
        self.conditions.iter().all(|cond| {
            let Some(value) = metadata.get(&cond.field) else {
                return false;
            };
            match &cond.predicate {
                MatchPredicate::Equals(expected) => match value {
                    serde_json::Value::Array(items) => items.contains(expected),
                    other => other == expected,
                },
                MatchPredicate::AnyOf(allowed) => allowed.contains(value),
            }
        })
    }
}

/// A question with its annotated ground truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationQuestion {
    /// The question text submitted to the adapter
    pub question: String,
    /// Ordered ground-truth identifiers; a bare string is a single answer
    #[serde(deserialize_with = "answer_list")]
    pub answer: Vec<String>,
    /// Annotated difficulty label
    pub difficulty: String,
}

fn answer_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

/// Dataset descriptor loaded from `metadata.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Dataset name
    pub name: String,
    /// Declared data format
    pub format: String,
    /// Declared question count, cross-checked against the actual count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_count: Option<usize>,
    /// Free-form evaluation options carried alongside the dataset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_options: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta() -> ChunkMeta {
        ChunkMeta {
            file_path: "src/main/java/com/acme/UserService.java".to_string(),
            language: Language::Java,
            code_type: CodeType::Method,
            name: "getUserById".to_string(),
            line_start: 42,
            line_end: 58,
            namespace: Some("com.acme".to_string()),
            parent_class: Some("UserService".to_string()),
            modifiers: vec!["public".to_string()],
            annotations: vec!["Transactional".to_string()],
            parameters: vec![Parameter {
                name: "id".to_string(),
                type_name: Some("Long".to_string()),
            }],
            return_type: Some("User".to_string()),
            extends: None,
            implements: vec![],
            keywords: vec![],
        }
    }

    #[test]
    fn stable_id_is_deterministic() {
        let m = meta();
        assert_eq!(Chunk::stable_id(&m), Chunk::stable_id(&m));
        let mut other = meta();
        other.line_end = 59;
        assert_ne!(Chunk::stable_id(&m), Chunk::stable_id(&other));
    }

    #[test]
    fn meta_validation_rejects_inverted_lines() {
        let mut m = meta();
        m.line_end = 1;
        assert!(m.validate().is_err());
    }

    #[test]
    fn meta_validation_rejects_extension_mismatch() {
        let mut m = meta();
        m.file_path = "scripts/run.py".to_string();
        assert!(m.validate().is_err());
    }

    #[test]
    fn filter_matches_scalar_and_list_metadata() {
        let metadata = json!({
            "file_path": "a/B.java",
            "language": "java",
            "implements": ["Runnable", "Closeable"],
        });

        assert!(Filter::equals("language", "java").matches(&metadata));
        assert!(Filter::equals("implements", "Runnable").matches(&metadata));
        assert!(!Filter::equals("language", "python").matches(&metadata));
        // Missing field is a no-match, not an error
        assert!(!Filter::equals("unknown_field", "x").matches(&metadata));
        assert!(
            Filter::any_of("language", vec![json!("java"), json!("python")]).matches(&metadata)
        );
    }

    #[test]
    fn answer_accepts_string_or_list() {
        let single: EvaluationQuestion =
            serde_json::from_value(json!({"question": "q", "answer": "A", "difficulty": "easy"}))
                .unwrap();
        assert_eq!(single.answer, vec!["A"]);

        let many: EvaluationQuestion = serde_json::from_value(
            json!({"question": "q", "answer": ["A", "B"], "difficulty": "hard"}),
        )
        .unwrap();
        assert_eq!(many.answer, vec!["A", "B"]);
    }
}
