//! BM25 index integration tests: round-trips, persistence, filters

use coderag::builder::DocumentBuilder;
use coderag::domain::types::{Chunk, ChunkMeta, CodeType, Filter, Language, Parameter};
use coderag::index::bm25_index::{Bm25Index, Bm25IndexConfig};
use std::path::Path;

fn config(path: &Path) -> Bm25IndexConfig {
    Bm25IndexConfig {
        index_path: path.to_path_buf(),
        ..Bm25IndexConfig::default()
    }
}

fn java_chunk(name: &str, file_path: &str, line_start: u32, content: &str) -> Chunk {
    Chunk::new(
        content,
        ChunkMeta {
            file_path: file_path.to_string(),
            language: Language::Java,
            code_type: CodeType::Method,
            name: name.to_string(),
            line_start,
            line_end: line_start + 10,
            namespace: Some("com.acme".to_string()),
            parent_class: Some("BookService".to_string()),
            modifiers: vec!["public".to_string()],
            annotations: vec![],
            parameters: vec![Parameter {
                name: "id".to_string(),
                type_name: Some("Long".to_string()),
            }],
            return_type: Some("Book".to_string()),
            extends: None,
            implements: vec![],
            keywords: vec![],
        },
    )
}

fn enhanced(chunk: Chunk) -> coderag::domain::types::EnhancedChunk {
    DocumentBuilder::default().build(chunk)
}

#[tokio::test]
async fn add_then_search_by_name_finds_the_document() {
    let tmp = tempfile::tempdir().unwrap();
    let index = Bm25Index::open(config(tmp.path())).unwrap();

    let chunk = java_chunk(
        "findBookById",
        "src/main/java/com/acme/BookService.java",
        10,
        "public Book findBookById(Long id) { return repository.findById(id); }",
    );
    let id = chunk.id.clone();
    index.add_batch(&[enhanced(chunk)]).await.unwrap();

    let results = index.search("findBookById", 10, None);
    assert!(results.iter().any(|r| r.id == id));
    assert!(results[0].score > 0.0);
    // Content comes back as the original chunk text, not the enhanced body
    assert!(results[0].content.contains("repository.findById"));
}

#[tokio::test]
async fn persists_and_reloads_across_instances() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let index = Bm25Index::open(config(tmp.path())).unwrap();
        index
            .add_batch(&[enhanced(java_chunk(
                "saveBook",
                "src/main/java/com/acme/BookService.java",
                30,
                "public void saveBook(Book book) { repository.save(book); }",
            ))])
            .await
            .unwrap();
    }

    let reopened = Bm25Index::open(config(tmp.path())).unwrap();
    assert_eq!(reopened.len(), 1);
    let results = reopened.search("saveBook", 5, None);
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn empty_index_persists_and_reloads_cleanly() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let index = Bm25Index::open(config(tmp.path())).unwrap();
        assert!(index.is_empty());
        // Force a persist through a no-op-ish mutation cycle
        let chunk = enhanced(java_chunk(
            "temp",
            "src/main/java/com/acme/Temp.java",
            1,
            "public void temp() {}",
        ));
        let ids = index.add_batch(&[chunk]).await.unwrap();
        index.delete(&ids[0]).await.unwrap();
        assert!(index.is_empty());
    }
    let reopened = Bm25Index::open(config(tmp.path())).unwrap();
    assert!(reopened.is_empty());
    assert!(reopened.search("anything", 5, None).is_empty());
}

#[tokio::test]
async fn empty_query_returns_empty_without_error() {
    let tmp = tempfile::tempdir().unwrap();
    let index = Bm25Index::open(config(tmp.path())).unwrap();
    index
        .add_batch(&[enhanced(java_chunk(
            "anyMethod",
            "src/main/java/com/acme/Any.java",
            1,
            "public void anyMethod() {}",
        ))])
        .await
        .unwrap();

    assert!(index.search("", 10, None).is_empty());
    assert!(index.search("   ", 10, None).is_empty());
}

#[tokio::test]
async fn metadata_filters_restrict_results() {
    let tmp = tempfile::tempdir().unwrap();
    let index = Bm25Index::open(config(tmp.path())).unwrap();

    index
        .add_batch(&[
            enhanced(java_chunk(
                "searchBooks",
                "src/main/java/com/acme/BookService.java",
                10,
                "public List<Book> searchBooks(String query) { return finder.search(query); }",
            )),
            enhanced(java_chunk(
                "searchAuthors",
                "src/main/java/com/acme/AuthorService.java",
                10,
                "public List<Author> searchAuthors(String query) { return finder.search(query); }",
            )),
        ])
        .await
        .unwrap();

    let filter = Filter::equals("file_path", "src/main/java/com/acme/BookService.java");
    let results = index.search("search query finder", 10, Some(&filter));
    assert!(!results.is_empty());
    assert!(results
        .iter()
        .all(|r| r.file_path.as_deref() == Some("src/main/java/com/acme/BookService.java")));

    // Unknown filter fields match nothing
    let none = index.search("search", 10, Some(&Filter::equals("nope", "x")));
    assert!(none.is_empty());
}

#[tokio::test]
async fn delete_by_filter_is_exhaustive() {
    let tmp = tempfile::tempdir().unwrap();
    let index = Bm25Index::open(config(tmp.path())).unwrap();

    index
        .add_batch(&[
            enhanced(java_chunk(
                "alpha",
                "src/main/java/com/acme/Doomed.java",
                1,
                "public void alpha() { helper.alpha(); }",
            )),
            enhanced(java_chunk(
                "beta",
                "src/main/java/com/acme/Doomed.java",
                20,
                "public void beta() { helper.beta(); }",
            )),
            enhanced(java_chunk(
                "gamma",
                "src/main/java/com/acme/Kept.java",
                1,
                "public void gamma() { helper.gamma(); }",
            )),
        ])
        .await
        .unwrap();

    let filter = Filter::equals("file_path", "src/main/java/com/acme/Doomed.java");
    let deleted = index.delete_by_filter(&filter).await.unwrap();
    assert_eq!(deleted, 2);
    assert!(index.search("alpha beta", 10, Some(&filter)).is_empty());
    assert_eq!(index.len(), 1);
}

#[tokio::test]
async fn update_replaces_the_document() {
    let tmp = tempfile::tempdir().unwrap();
    let index = Bm25Index::open(config(tmp.path())).unwrap();

    let original = java_chunk(
        "renderInvoice",
        "src/main/java/com/acme/Invoices.java",
        5,
        "public void renderInvoice() { template.renderOld(); }",
    );
    let id = original.id.clone();
    index.add_batch(&[enhanced(original)]).await.unwrap();

    let replacement = java_chunk(
        "renderInvoice",
        "src/main/java/com/acme/Invoices.java",
        5,
        "public void renderInvoice() { template.renderShiny(); }",
    );
    let existed = index.update(&id, &enhanced(replacement)).await.unwrap();
    assert!(existed);
    assert_eq!(index.len(), 1);

    let results = index.search("renderShiny", 5, None);
    assert_eq!(results.len(), 1);
    assert!(results[0].content.contains("renderShiny"));
}

#[tokio::test]
async fn stats_reflect_the_corpus() {
    let tmp = tempfile::tempdir().unwrap();
    let index = Bm25Index::open(config(tmp.path())).unwrap();
    index
        .add_batch(&[enhanced(java_chunk(
            "statMe",
            "src/main/java/com/acme/Stats.java",
            1,
            "public int statMe() { return counter.total(); }",
        ))])
        .await
        .unwrap();

    let stats = index.stats();
    assert_eq!(stats.total_documents, 1);
    assert!(stats.total_tokens > 0);
    assert!(stats.average_tokens_per_doc > 0.0);
    assert_eq!(stats.language_distribution.get("java"), Some(&1));
    assert_eq!(stats.k1, 1.2);
    assert_eq!(stats.b, 0.75);
}
