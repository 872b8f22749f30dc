//! Index layer: code-aware tokenization, the persistent BM25 index, and the
//! vector index facade
//!
//! Both indices are keyed by the same stable document id, so a chunk's
//! lexical node and vector record always refer to each other.

/// Okapi BM25 scoring engine
pub mod bm25;
/// Persistent BM25 index with enhanced-text construction
pub mod bm25_index;
/// Important-keyword extraction for metadata boosting
pub mod keywords;
/// Code-aware tokenizer
pub mod tokenizer;
/// Vector index facade
pub mod vector;

pub use bm25::{Bm25Engine, Bm25Params, Score};
pub use bm25_index::{Bm25Index, Bm25IndexConfig, Bm25IndexStats, Bm25Node};
pub use keywords::extract_important_keywords;
pub use tokenizer::{CodeTokenizer, TokenizerConfig};
pub use vector::{VectorIndex, VectorIndexConfig};
