//! Dual-index ingestion
//!
//! Pre-parsed chunks flow once through enrichment, get embedded, and are
//! written to the vector index and the BM25 index under the same stable
//! document id. Re-indexing a file is delete-by-filter on both indices
//! followed by a fresh insert; individual updates are delete-then-insert.
//!
//! The two index writes for a batch run concurrently; eventual consistency
//! between them is acceptable, transactional coupling is not attempted.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use crate::builder::DocumentBuilder;
use crate::domain::error::Result;
use crate::domain::ports::EmbeddingProvider;
use crate::domain::types::{Chunk, EnhancedChunk, Filter, VectorRecord};
use crate::index::bm25_index::Bm25Index;
use crate::index::vector::VectorIndex;

/// Outcome of one ingestion batch
#[derive(Debug, Clone)]
pub struct IndexingOutcome {
    /// Documents written to both indices
    pub indexed: usize,
    /// Ids of the written documents, in input order
    pub ids: Vec<String>,
}

/// Coordinates enrichment, embedding, and the two index writes
pub struct IndexingService {
    builder: DocumentBuilder,
    embedding: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<VectorIndex>,
    bm25_index: Arc<Bm25Index>,
}

impl IndexingService {
    /// Wire the service to its collaborators
    pub fn new(
        builder: DocumentBuilder,
        embedding: Arc<dyn EmbeddingProvider>,
        vector_index: Arc<VectorIndex>,
        bm25_index: Arc<Bm25Index>,
    ) -> Self {
        Self {
            builder,
            embedding,
            vector_index,
            bm25_index,
        }
    }

    /// Enrich, embed, and index a batch of chunks
    pub async fn index_chunks(&self, chunks: Vec<Chunk>) -> Result<IndexingOutcome> {
        if chunks.is_empty() {
            return Ok(IndexingOutcome {
                indexed: 0,
                ids: Vec::new(),
            });
        }
        for chunk in &chunks {
            chunk.metadata.validate()?;
        }

        let enhanced = self.builder.build_batch(chunks);
        let texts: Vec<String> = enhanced
            .iter()
            .map(|doc| doc.enhanced_content.clone())
            .collect();
        let vectors = self.embedding.embed_batch(&texts).await?;

        let records: Vec<VectorRecord> = enhanced
            .iter()
            .zip(vectors)
            .map(|(doc, vector)| VectorRecord {
                id: doc.chunk.id.clone(),
                vector,
                payload: Self::payload_for(doc),
            })
            .collect();

        let (vector_written, bm25_ids) = tokio::join!(
            self.vector_index.upsert(&records),
            self.bm25_index.add_batch(&enhanced),
        );
        let vector_written = vector_written?;
        let ids = bm25_ids?;

        info!(
            vector = vector_written,
            bm25 = ids.len(),
            "chunk batch indexed"
        );
        Ok(IndexingOutcome {
            indexed: ids.len(),
            ids,
        })
    }

    /// Drop every document for `file_path` from both indices, then index the
    /// replacement chunks
    pub async fn reindex_file(
        &self,
        file_path: &str,
        chunks: Vec<Chunk>,
    ) -> Result<IndexingOutcome> {
        let (vector_deleted, bm25_deleted) = self
            .delete_by_filter(&Filter::equals("file_path", file_path))
            .await?;
        debug!(
            file_path,
            vector_deleted, bm25_deleted, "stale documents removed before reindex"
        );
        self.index_chunks(chunks).await
    }

    /// Delete matching documents from both indices
    ///
    /// Returns `(vector_deleted, bm25_deleted)`; the counts can differ
    /// transiently, which is the accepted consistency model.
    pub async fn delete_by_filter(&self, filter: &Filter) -> Result<(usize, usize)> {
        let (vector_deleted, bm25_deleted) = tokio::join!(
            self.vector_index.delete_by_filter(filter),
            self.bm25_index.delete_by_filter(filter),
        );
        Ok((vector_deleted?, bm25_deleted?))
    }

    fn payload_for(doc: &EnhancedChunk) -> Value {
        let mut payload = doc.chunk.metadata.to_payload();
        if let Value::Object(map) = &mut payload {
            map.insert(
                "content".to_string(),
                Value::String(doc.chunk.content.clone()),
            );
            map.insert(
                "indexed_at".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }
        payload
    }
}
