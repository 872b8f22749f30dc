//! Server binary: composition root and startup

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use coderag::adapters::AdapterFactory;
use coderag::builder::DocumentBuilder;
use coderag::domain::ports::{EmbeddingProvider, VectorStoreProvider};
use coderag::eval::{DatasetLoader, EvaluationRunLog, EvaluationService};
use coderag::index::bm25_index::{Bm25Index, Bm25IndexConfig};
use coderag::index::vector::{VectorIndex, VectorIndexConfig};
use coderag::infrastructure::config::AppConfig;
use coderag::infrastructure::http::RetryPolicy;
use coderag::providers::embedding::HttpEmbeddingProvider;
use coderag::providers::vector_store::QdrantVectorStoreProvider;
use coderag::retrieval::fusion::FusionMethod;
use coderag::retrieval::hybrid::{HybridRetriever, HybridRetrieverConfig};
use coderag::server::{router, AppState};
use coderag::services::IndexingService;

#[derive(Parser)]
#[command(name = "coderag", about = "Hybrid code retrieval and evaluation server")]
struct Args {
    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref()).context("loading configuration")?;

    // Providers: constructed once, shared as Arcs, never global
    let embedding: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(
        config.embedding.base_url.clone(),
        config.embedding.dimensions,
        Duration::from_secs(config.embedding.timeout_secs),
        RetryPolicy::with_attempts(config.embedding.max_retries),
    )?);
    let vector_store: Arc<dyn VectorStoreProvider> = Arc::new(QdrantVectorStoreProvider::new(
        config.vector_store.url.clone(),
        Duration::from_secs(config.vector_store.timeout_secs),
        RetryPolicy::default(),
    )?);

    let vector_index = Arc::new(VectorIndex::new(
        vector_store,
        VectorIndexConfig {
            collection: config.vector_store.collection.clone(),
            dimension: config.vector_store.dimension,
            ..VectorIndexConfig::default()
        },
    ));
    vector_index
        .setup()
        .await
        .context("ensuring vector collection")?;

    let bm25_index = Arc::new(Bm25Index::open(Bm25IndexConfig {
        k1: config.bm25.k1,
        b: config.bm25.b,
        index_path: config.bm25.expanded_index_path(),
        use_stemming: config.bm25.use_stemming,
        include_metadata: true,
    })?);

    let default_fusion = if config.retrieval.use_rrf {
        FusionMethod::ReciprocalRank {
            rrf_k: config.retrieval.rrf_k,
        }
    } else {
        FusionMethod::WeightedSum {
            vector_weight: config.retrieval.vector_weight,
            bm25_weight: config.retrieval.bm25_weight,
        }
    };
    let retriever = Arc::new(HybridRetriever::new(
        embedding.clone(),
        vector_index.clone(),
        bm25_index.clone(),
        HybridRetrieverConfig {
            max_results: config.retrieval.max_results,
            deadline: config.retrieval.deadline(),
            default_fusion,
        },
    ));

    let indexing = Arc::new(IndexingService::new(
        DocumentBuilder::default(),
        embedding,
        vector_index,
        bm25_index.clone(),
    ));

    let mut evaluation =
        EvaluationService::new(DatasetLoader::new(config.evaluation.expanded_dataset_root()))
            .with_concurrency(config.evaluation.concurrency);
    if let Some(path) = &config.evaluation.run_log_path {
        evaluation = evaluation.with_run_log(EvaluationRunLog::new(path));
    }

    let state = AppState {
        retriever: retriever.clone(),
        indexing,
        bm25_index,
        evaluation: Arc::new(evaluation),
        adapter_factory: Arc::new(AdapterFactory::with_retriever(retriever)),
    };

    let bind = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    tracing::info!(%bind, "server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
