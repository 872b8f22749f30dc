//! Persistent code-aware BM25 index
//!
//! Stores [`Bm25Node`]s (enhanced text + metadata) and the originating
//! [`EnhancedChunk`]s, rebuilds the scoring engine after every mutating
//! batch, and persists the full node set atomically on each mutation.
//!
//! ## Enhanced text
//!
//! The string actually indexed for a chunk is built from, in order: the
//! original content, the case/underscore-preprocessed content, the extracted
//! important keywords repeated twice, the chunk name repeated three times,
//! and the remaining metadata-derived terms (search keywords, parameter
//! types, return type, extends/implements, semantic tags). The repetition
//! raises the term frequency of structural identifiers in BM25 scoring.
//!
//! ## Concurrency
//!
//! Mutations are serialized by a single writer lock. Searches are lock-free:
//! they load the current [`arc_swap`] snapshot and score against it, so a
//! reader always sees the state established by the last completed mutation.
//!
//! ## Persistence
//!
//! `nodes.json` holds the node array; `documents_map.bin` holds the id →
//! enhanced-chunk map in a compact binary form. Both are written to a
//! temporary file and renamed into place. A missing index directory starts
//! empty; a corrupt documents map is dropped with a warning, matching the
//! read-side recovery rules.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::domain::error::{Error, Result};
use crate::domain::types::{EnhancedChunk, Filter, RetrievalResult, RetrievalSource};
use crate::index::bm25::{Bm25Engine, Bm25Params, Score};
use crate::index::keywords::extract_important_keywords;
use crate::index::tokenizer::{CodeTokenizer, TokenizerConfig};

const NODES_FILE: &str = "nodes.json";
const DOCUMENTS_MAP_FILE: &str = "documents_map.bin";

/// How many times the chunk name is repeated in the enhanced text
const NAME_BOOST: usize = 3;
/// How many times extracted important keywords are repeated
const KEYWORD_BOOST: usize = 2;

/// Configuration for [`Bm25Index`]
#[derive(Debug, Clone)]
pub struct Bm25IndexConfig {
    /// Term-frequency saturation parameter
    pub k1: f32,
    /// Length-normalization parameter
    pub b: f32,
    /// Directory holding `nodes.json` and `documents_map.bin`
    pub index_path: PathBuf,
    /// Apply stemming during tokenization
    pub use_stemming: bool,
    /// Append metadata-derived terms to the indexed text
    pub include_metadata: bool,
}

impl Default for Bm25IndexConfig {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            index_path: PathBuf::from("data/bm25_index"),
            use_stemming: true,
            include_metadata: true,
        }
    }
}

/// One indexed document: enhanced text plus metadata for post-filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bm25Node {
    /// Document id, shared with the vector record for the same chunk
    pub id: String,
    /// The enhanced text the engine scores
    pub text: String,
    /// Chunk metadata used by search post-filters
    pub metadata: serde_json::Value,
}

/// Index statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25IndexStats {
    /// Number of indexed documents
    pub total_documents: usize,
    /// Total token count across all documents
    pub total_tokens: u64,
    /// Mean tokens per document
    pub average_tokens_per_doc: f32,
    /// Document count per language
    pub language_distribution: BTreeMap<String, usize>,
    /// Effective k1
    pub k1: f32,
    /// Effective b
    pub b: f32,
    /// Index directory
    pub index_path: String,
}

struct Snapshot {
    nodes: Vec<Bm25Node>,
    documents: HashMap<String, EnhancedChunk>,
    engine: Option<Bm25Engine>,
    token_counts: Vec<u32>,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            documents: HashMap::new(),
            engine: None,
            token_counts: Vec::new(),
        }
    }
}

/// Persistent lexical index over enhanced chunks
pub struct Bm25Index {
    config: Bm25IndexConfig,
    tokenizer: CodeTokenizer,
    state: ArcSwap<Snapshot>,
    // Serializes mutations; searches never take it
    writer: Mutex<()>,
}

impl Bm25Index {
    /// Open the index at `config.index_path`, loading persisted state if present
    pub fn open(config: Bm25IndexConfig) -> Result<Self> {
        Bm25Params {
            k1: config.k1,
            b: config.b,
        }
        .validate()?;
        fs::create_dir_all(&config.index_path)?;

        let tokenizer = CodeTokenizer::new(TokenizerConfig {
            use_stemming: config.use_stemming,
        });

        let nodes = load_nodes(&config.index_path)?;
        let documents = load_documents_map(&config.index_path);
        let index = Self {
            config,
            tokenizer,
            state: ArcSwap::from_pointee(Snapshot::empty()),
            writer: Mutex::new(()),
        };
        let snapshot = index.build_snapshot(nodes, documents)?;
        index.state.store(Arc::new(snapshot));
        debug!(
            documents = index.state.load().nodes.len(),
            "bm25 index opened"
        );
        Ok(index)
    }

    /// Effective configuration
    pub fn config(&self) -> &Bm25IndexConfig {
        &self.config
    }

    /// Add a batch of enhanced chunks; rebuilds the engine and persists once
    ///
    /// Returns the ids added, in input order.
    pub async fn add_batch(&self, chunks: &[EnhancedChunk]) -> Result<Vec<String>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let _guard = self.writer.lock().await;

        let current = self.state.load();
        let mut nodes = current.nodes.clone();
        let mut documents = current.documents.clone();
        let mut added = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let node = Bm25Node {
                id: chunk.chunk.id.clone(),
                text: self.build_enhanced_text(chunk),
                metadata: chunk.chunk.metadata.to_payload(),
            };
            documents.insert(node.id.clone(), chunk.clone());
            added.push(node.id.clone());
            nodes.push(node);
        }

        self.commit(nodes, documents)?;
        debug!(count = added.len(), "bm25 documents added");
        Ok(added)
    }

    /// Replace a document: delete then insert under one writer acquisition
    pub async fn update(&self, doc_id: &str, chunk: &EnhancedChunk) -> Result<bool> {
        let _guard = self.writer.lock().await;

        let current = self.state.load();
        let mut nodes = current.nodes.clone();
        let mut documents = current.documents.clone();
        let existed = remove_node(&mut nodes, &mut documents, doc_id);

        let node = Bm25Node {
            id: chunk.chunk.id.clone(),
            text: self.build_enhanced_text(chunk),
            metadata: chunk.chunk.metadata.to_payload(),
        };
        documents.insert(node.id.clone(), chunk.clone());
        nodes.push(node);

        self.commit(nodes, documents)?;
        Ok(existed)
    }

    /// Delete one document by id; returns whether it existed
    pub async fn delete(&self, doc_id: &str) -> Result<bool> {
        let _guard = self.writer.lock().await;

        let current = self.state.load();
        let mut nodes = current.nodes.clone();
        let mut documents = current.documents.clone();
        let existed = remove_node(&mut nodes, &mut documents, doc_id);
        if !existed {
            return Ok(false);
        }
        self.commit(nodes, documents)?;
        Ok(true)
    }

    /// Delete every document whose metadata matches the filter
    ///
    /// This is the re-indexing invalidation path: deleting by
    /// `{file_path: F}` removes all chunks of a file before the new parse
    /// is inserted.
    pub async fn delete_by_filter(&self, filter: &Filter) -> Result<usize> {
        let _guard = self.writer.lock().await;

        let current = self.state.load();
        let mut documents = current.documents.clone();
        let mut removed = 0usize;
        let nodes: Vec<Bm25Node> = current
            .nodes
            .iter()
            .filter(|node| {
                if filter.matches(&node.metadata) {
                    documents.remove(&node.id);
                    removed += 1;
                    false
                } else {
                    true
                }
            })
            .cloned()
            .collect();

        if removed == 0 {
            return Ok(0);
        }
        self.commit(nodes, documents)?;
        debug!(removed, "bm25 documents deleted by filter");
        Ok(removed)
    }

    /// Ranked BM25 search with optional metadata post-filters
    ///
    /// An empty query, an empty index, or a query with no indexable tokens
    /// all yield an empty result, never an error.
    pub fn search(&self, query: &str, k: usize, filter: Option<&Filter>) -> Vec<RetrievalResult> {
        let snapshot = self.state.load();
        let Some(engine) = snapshot.engine.as_ref() else {
            return Vec::new();
        };
        if query.trim().is_empty() || k == 0 {
            return Vec::new();
        }

        let query_tokens = self.tokenizer.tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        // Over-fetch when a post-filter is in play so strict filters do not
        // starve the result set.
        let fetch = match filter {
            Some(f) if !f.is_empty() => (k * 3).max(50),
            _ => k,
        };

        let by_id: HashMap<&str, &Bm25Node> = snapshot
            .nodes
            .iter()
            .map(|node| (node.id.as_str(), node))
            .collect();

        let mut results = Vec::with_capacity(k);
        for (id, score) in engine.search(&query_tokens, fetch) {
            if results.len() >= k {
                break;
            }
            let Some(node) = by_id.get(id.as_str()) else {
                continue;
            };
            if let Some(f) = filter {
                if !f.matches(&node.metadata) {
                    continue;
                }
            }
            // Return the original chunk content when we still hold it; the
            // enhanced text is an indexing artifact.
            let content = snapshot
                .documents
                .get(&id)
                .map(|doc| doc.chunk.content.clone())
                .unwrap_or_else(|| node.text.clone());
            let file_path = node
                .metadata
                .get("file_path")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            results.push(RetrievalResult {
                id,
                content,
                score: score.max(0.0),
                source: RetrievalSource::Bm25,
                metadata: node.metadata.clone(),
                file_path,
            });
        }
        results
    }

    /// Score a single document against a query, tagging the method used
    pub fn score_document(&self, query: &str, doc_id: &str) -> Option<Score> {
        let snapshot = self.state.load();
        let engine = snapshot.engine.as_ref()?;
        let query_tokens = self.tokenizer.tokenize(query);
        let doc_tokens = snapshot
            .nodes
            .iter()
            .find(|node| node.id == doc_id)
            .map(|node| self.tokenizer.tokenize(&node.text))
            .unwrap_or_default();
        Some(engine.score_or_fallback(&query_tokens, doc_id, &doc_tokens))
    }

    /// Current index statistics
    pub fn stats(&self) -> Bm25IndexStats {
        let snapshot = self.state.load();
        let total_documents = snapshot.nodes.len();
        let total_tokens: u64 = snapshot.token_counts.iter().map(|&c| c as u64).sum();
        let average = if total_documents > 0 {
            total_tokens as f32 / total_documents as f32
        } else {
            0.0
        };
        let mut language_distribution = BTreeMap::new();
        for node in &snapshot.nodes {
            let lang = node
                .metadata
                .get("language")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            *language_distribution.entry(lang).or_insert(0) += 1;
        }
        Bm25IndexStats {
            total_documents,
            total_tokens,
            average_tokens_per_doc: average,
            language_distribution,
            k1: self.config.k1,
            b: self.config.b,
            index_path: self.config.index_path.display().to_string(),
        }
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.state.load().nodes.len()
    }

    /// Whether the index holds no documents
    pub fn is_empty(&self) -> bool {
        self.state.load().nodes.is_empty()
    }

    fn commit(
        &self,
        nodes: Vec<Bm25Node>,
        documents: HashMap<String, EnhancedChunk>,
    ) -> Result<()> {
        persist(&self.config.index_path, &nodes, &documents)?;
        let snapshot = self.build_snapshot(nodes, documents)?;
        self.state.store(Arc::new(snapshot));
        Ok(())
    }

    fn build_snapshot(
        &self,
        nodes: Vec<Bm25Node>,
        documents: HashMap<String, EnhancedChunk>,
    ) -> Result<Snapshot> {
        let mut tokenized = Vec::with_capacity(nodes.len());
        let mut token_counts = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let mut tokens = self.tokenizer.tokenize(&node.text);
            if tokens.is_empty() && !node.text.trim().is_empty() {
                // Minimal fallback so a pathological document is still findable
                warn!(id = %node.id, "tokenization produced nothing; indexing fallback tokens");
                tokens = self.tokenizer.fallback_tokenize(&node.text);
            }
            token_counts.push(tokens.len() as u32);
            tokenized.push((node.id.clone(), tokens));
        }

        let engine = if tokenized.is_empty() {
            None
        } else {
            Some(Bm25Engine::build(
                tokenized,
                Bm25Params {
                    k1: self.config.k1,
                    b: self.config.b,
                },
            )?)
        };

        Ok(Snapshot {
            nodes,
            documents,
            engine,
            token_counts,
        })
    }

    fn build_enhanced_text(&self, chunk: &EnhancedChunk) -> String {
        let meta = &chunk.chunk.metadata;
        let mut parts: Vec<String> = Vec::new();

        parts.push(chunk.chunk.content.clone());
        parts.push(self.tokenizer.preprocess(&chunk.chunk.content));

        let important = extract_important_keywords(&chunk.chunk.content);
        for _ in 0..KEYWORD_BOOST {
            parts.extend(important.iter().cloned());
        }

        if self.config.include_metadata {
            for _ in 0..NAME_BOOST {
                parts.push(meta.name.clone());
            }
            parts.extend(chunk.search_keywords.iter().cloned());
            for param in &meta.parameters {
                if let Some(type_name) = &param.type_name {
                    parts.push(type_name.clone());
                }
            }
            if let Some(return_type) = &meta.return_type {
                parts.push(return_type.clone());
            }
            if let Some(extends) = &meta.extends {
                parts.push(extends.clone());
            }
            parts.extend(meta.implements.iter().cloned());
            parts.extend(chunk.semantic_tags.iter().cloned());
        }

        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }
}

fn remove_node(
    nodes: &mut Vec<Bm25Node>,
    documents: &mut HashMap<String, EnhancedChunk>,
    doc_id: &str,
) -> bool {
    let before = nodes.len();
    nodes.retain(|node| node.id != doc_id);
    documents.remove(doc_id);
    nodes.len() < before
}

fn load_nodes(index_path: &Path) -> Result<Vec<Bm25Node>> {
    let path = index_path.join(NODES_FILE);
    if !path.exists() {
        return Ok(Vec::new());
    }
    match fs::read(&path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(nodes) => Ok(nodes),
            Err(err) => {
                // Read-side recovery: start empty rather than refuse to boot
                warn!(path = %path.display(), %err, "corrupt nodes file, starting empty");
                Ok(Vec::new())
            }
        },
        Err(err) => {
            warn!(path = %path.display(), %err, "unreadable nodes file, starting empty");
            Ok(Vec::new())
        }
    }
}

fn load_documents_map(index_path: &Path) -> HashMap<String, EnhancedChunk> {
    let path = index_path.join(DOCUMENTS_MAP_FILE);
    if !path.exists() {
        return HashMap::new();
    }
    match fs::read(&path).map_err(Error::from).and_then(|bytes| {
        bincode::deserialize(&bytes).map_err(|e| Error::persistence(e.to_string()))
    }) {
        Ok(map) => map,
        Err(err) => {
            warn!(path = %path.display(), %err, "corrupt documents map, dropping");
            HashMap::new()
        }
    }
}

fn persist(
    index_path: &Path,
    nodes: &[Bm25Node],
    documents: &HashMap<String, EnhancedChunk>,
) -> Result<()> {
    let nodes_bytes = serde_json::to_vec_pretty(nodes)?;
    write_atomic(&index_path.join(NODES_FILE), &nodes_bytes)?;

    let map_bytes =
        bincode::serialize(documents).map_err(|e| Error::persistence(e.to_string()))?;
    write_atomic(&index_path.join(DOCUMENTS_MAP_FILE), &map_bytes)?;
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|e| {
        error!(path = %tmp.display(), %e, "index write failed");
        Error::persistence(format!("write {}: {e}", tmp.display()))
    })?;
    fs::rename(&tmp, path)
        .map_err(|e| Error::persistence(format!("rename {}: {e}", path.display())))
}
