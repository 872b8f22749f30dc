//! Okapi BM25 scoring engine
//!
//! Pure in-memory scoring over already-tokenized documents. The engine is an
//! immutable snapshot: the persistent index rebuilds it after every mutating
//! batch and swaps it in atomically, so searches always score against a
//! consistent corpus.
//!
//! The IDF term uses the non-negative `ln(1 + (N - df + 0.5) / (df + 0.5))`
//! form, which keeps every score in `[0, ∞)` even for terms present in most
//! of the corpus.

use std::collections::HashMap;

use crate::domain::error::{Error, Result};

/// Tunable BM25 parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation; must be positive
    pub k1: f32,
    /// Document-length normalization in `[0, 1]`
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

impl Bm25Params {
    /// Validate the parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.k1 <= 0.0 {
            return Err(Error::validation(format!("k1 must be > 0, got {}", self.k1)));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(Error::validation(format!(
                "b must be in [0, 1], got {}",
                self.b
            )));
        }
        Ok(())
    }
}

/// A lexical score tagged with the method that produced it
///
/// The engine scores with BM25 whenever corpus statistics are available for
/// the document; for documents outside the snapshot it falls back to a
/// Jaccard overlap so callers still get a comparable signal. The tag exists
/// for observability, not for control flow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    /// Okapi BM25 over the indexed corpus
    Bm25(f32),
    /// Jaccard token-set overlap fallback
    Jaccard(f32),
}

impl Score {
    /// The numeric score value
    pub fn value(&self) -> f32 {
        match self {
            Score::Bm25(v) | Score::Jaccard(v) => *v,
        }
    }

    /// The scoring method tag
    pub fn method(&self) -> &'static str {
        match self {
            Score::Bm25(_) => "bm25",
            Score::Jaccard(_) => "jaccard",
        }
    }
}

/// Immutable BM25 scoring snapshot over a tokenized corpus
#[derive(Debug)]
pub struct Bm25Engine {
    params: Bm25Params,
    doc_ids: Vec<String>,
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<u32>,
    doc_index: HashMap<String, usize>,
    postings: HashMap<String, Vec<usize>>,
    doc_freq: HashMap<String, u32>,
    avg_doc_len: f32,
}

impl Bm25Engine {
    /// Build a snapshot from `(id, tokens)` pairs
    pub fn build(docs: Vec<(String, Vec<String>)>, params: Bm25Params) -> Result<Self> {
        params.validate()?;

        let mut doc_ids = Vec::with_capacity(docs.len());
        let mut term_freqs = Vec::with_capacity(docs.len());
        let mut doc_lens = Vec::with_capacity(docs.len());
        let mut doc_index = HashMap::with_capacity(docs.len());
        let mut postings: HashMap<String, Vec<usize>> = HashMap::new();
        let mut doc_freq: HashMap<String, u32> = HashMap::new();
        let mut total_len: u64 = 0;

        for (idx, (id, tokens)) in docs.into_iter().enumerate() {
            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *tf.entry(token.clone()).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
                postings.entry(term.clone()).or_default().push(idx);
            }
            total_len += tokens.len() as u64;
            doc_lens.push(tokens.len() as u32);
            doc_index.insert(id.clone(), idx);
            doc_ids.push(id);
            term_freqs.push(tf);
        }

        let avg_doc_len = if doc_ids.is_empty() {
            0.0
        } else {
            total_len as f32 / doc_ids.len() as f32
        };

        Ok(Self {
            params,
            doc_ids,
            term_freqs,
            doc_lens,
            doc_index,
            postings,
            doc_freq,
            avg_doc_len,
        })
    }

    /// Number of indexed documents
    pub fn total_docs(&self) -> usize {
        self.doc_ids.len()
    }

    /// Number of distinct terms in the corpus
    pub fn unique_terms(&self) -> usize {
        self.doc_freq.len()
    }

    /// Average tokenized document length
    pub fn avg_doc_len(&self) -> f32 {
        self.avg_doc_len
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.doc_ids.len() as f32;
        let df = self.doc_freq.get(term).copied().unwrap_or(0) as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    fn score_at(&self, query_tokens: &[String], idx: usize) -> f32 {
        let tf_map = &self.term_freqs[idx];
        let doc_len = self.doc_lens[idx] as f32;
        let Bm25Params { k1, b } = self.params;
        let len_norm = if self.avg_doc_len > 0.0 {
            1.0 - b + b * doc_len / self.avg_doc_len
        } else {
            1.0
        };

        let mut score = 0.0;
        for term in query_tokens {
            let tf = tf_map.get(term).copied().unwrap_or(0) as f32;
            if tf > 0.0 {
                score += self.idf(term) * (tf * (k1 + 1.0)) / (tf + k1 * len_norm);
            }
        }
        score
    }

    /// Rank the corpus against query tokens, best-first
    ///
    /// Only documents sharing at least one term with the query are scored.
    /// Equal scores break deterministically by ascending id.
    pub fn search(&self, query_tokens: &[String], limit: usize) -> Vec<(String, f32)> {
        if query_tokens.is_empty() || self.doc_ids.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut candidates: Vec<usize> = query_tokens
            .iter()
            .filter_map(|term| self.postings.get(term))
            .flatten()
            .copied()
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        let mut scored: Vec<(String, f32)> = candidates
            .into_iter()
            .map(|idx| (self.doc_ids[idx].clone(), self.score_at(query_tokens, idx)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(limit);
        scored
    }

    /// Score one document, falling back to Jaccard overlap when the document
    /// is not part of this snapshot
    pub fn score_or_fallback(
        &self,
        query_tokens: &[String],
        doc_id: &str,
        doc_tokens: &[String],
    ) -> Score {
        match self.doc_index.get(doc_id) {
            Some(&idx) => Score::Bm25(self.score_at(query_tokens, idx)),
            None => Score::Jaccard(jaccard(query_tokens, doc_tokens)),
        }
    }
}

fn jaccard(a: &[String], b: &[String]) -> f32 {
    use std::collections::HashSet;
    let sa: HashSet<&String> = a.iter().collect();
    let sb: HashSet<&String> = b.iter().collect();
    if sa.is_empty() && sb.is_empty() {
        return 0.0;
    }
    let intersection = sa.intersection(&sb).count() as f32;
    let union = sa.union(&sb).count() as f32;
    intersection / union
}
