//! Document builder: chunk enrichment before indexing
//!
//! Turns a raw [`Chunk`] into an [`EnhancedChunk`] by deriving the signal
//! the two indices feed on: a prose context header for the embedding text,
//! deduplicated search keywords, semantic tags, and structural
//! relationships. Enrichment is pure and deterministic; chunks flow through
//! it exactly once on their way to the vector and BM25 indices.

use std::collections::BTreeSet;

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::types::{Chunk, EnhancedChunk, Language, Relationships};
use crate::index::keywords::extract_important_keywords;

static JAVA_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(String|Integer|Boolean|Long|Double|List|Map|Set|Optional)\b")
        .expect("static pattern")
});
static PY_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdef\s+(\w+)").expect("static pattern"));
static PY_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bclass\s+(\w+)").expect("static pattern"));
static DECORATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\w+)").expect("static pattern"));

/// Configuration for [`DocumentBuilder`]
#[derive(Debug, Clone)]
pub struct DocumentBuildConfig {
    /// Prepend the prose context header to the enhanced content
    pub add_context: bool,
    /// Derive search keywords from metadata and content
    pub enhance_keywords: bool,
}

impl Default for DocumentBuildConfig {
    fn default() -> Self {
        Self {
            add_context: true,
            enhance_keywords: true,
        }
    }
}

/// Enriches chunks with derived retrieval signal
#[derive(Default)]
pub struct DocumentBuilder {
    config: DocumentBuildConfig,
}

impl DocumentBuilder {
    /// Create a builder with the given configuration
    pub fn new(config: DocumentBuildConfig) -> Self {
        Self { config }
    }

    /// Enrich a single chunk
    pub fn build(&self, chunk: Chunk) -> EnhancedChunk {
        let enhanced_content = self.enhance_content(&chunk);
        let search_keywords = if self.config.enhance_keywords {
            self.extract_search_keywords(&chunk)
        } else {
            Vec::new()
        };
        let semantic_tags = self.generate_semantic_tags(&chunk);
        let relationships = self.analyze_relationships(&chunk);
        EnhancedChunk {
            chunk,
            enhanced_content,
            search_keywords,
            semantic_tags,
            relationships,
        }
    }

    /// Enrich a batch, preserving order
    pub fn build_batch(&self, chunks: Vec<Chunk>) -> Vec<EnhancedChunk> {
        chunks.into_iter().map(|c| self.build(c)).collect()
    }

    fn enhance_content(&self, chunk: &Chunk) -> String {
        if !self.config.add_context {
            return chunk.content.clone();
        }
        let meta = &chunk.metadata;
        let mut parts = Vec::new();

        let mut kind = meta.code_type.as_str().to_string();
        if let Some(first) = kind.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        parts.push(format!("# {kind}: {}", meta.name));
        parts.push(format!("File: {}", meta.file_path));
        parts.push(format!("Language: {}", meta.language.as_str()));
        parts.push(format!("Lines: {}-{}", meta.line_start, meta.line_end));

        if let Some(parent) = &meta.parent_class {
            parts.push(format!("Parent Class: {parent}"));
        }
        if let Some(namespace) = &meta.namespace {
            parts.push(format!("Namespace: {namespace}"));
        }
        if let Some(extends) = &meta.extends {
            parts.push(format!("Extends: {extends}"));
        }
        if !meta.implements.is_empty() {
            parts.push(format!("Implements: {}", meta.implements.join(", ")));
        }
        if !meta.parameters.is_empty() {
            let rendered: Vec<String> = meta
                .parameters
                .iter()
                .map(|p| {
                    format!(
                        "{}: {}",
                        p.name,
                        p.type_name.as_deref().unwrap_or("unknown")
                    )
                })
                .collect();
            parts.push(format!("Parameters: {}", rendered.join(", ")));
        }
        if let Some(return_type) = &meta.return_type {
            parts.push(format!("Returns: {return_type}"));
        }
        if !meta.keywords.is_empty() {
            parts.push(format!("Keywords: {}", meta.keywords.join(", ")));
        }

        parts.push("\n## Code:".to_string());
        parts.push(chunk.content.clone());
        parts.join("\n")
    }

    fn extract_search_keywords(&self, chunk: &Chunk) -> Vec<String> {
        let meta = &chunk.metadata;
        let mut keywords = BTreeSet::new();

        keywords.insert(meta.name.clone());
        keywords.extend(meta.keywords.iter().cloned());
        if let Some(parent) = &meta.parent_class {
            keywords.insert(parent.clone());
        }
        if let Some(namespace) = &meta.namespace {
            keywords.extend(namespace.split('.').map(str::to_string));
        }
        if let Some(extends) = &meta.extends {
            keywords.insert(extends.clone());
        }
        keywords.extend(meta.implements.iter().cloned());
        for param in &meta.parameters {
            if let Some(type_name) = &param.type_name {
                keywords.insert(type_name.clone());
            }
        }
        if let Some(return_type) = &meta.return_type {
            keywords.insert(return_type.clone());
        }
        keywords.extend(meta.annotations.iter().cloned());
        keywords.extend(meta.modifiers.iter().cloned());
        keywords.extend(self.keywords_from_content(&chunk.content, meta.language));
        keywords.extend(extract_important_keywords(&chunk.content));

        keywords.into_iter().filter(|k| !k.is_empty()).collect()
    }

    fn keywords_from_content(&self, content: &str, language: Language) -> Vec<String> {
        let mut found = BTreeSet::new();
        match language {
            Language::Java => {
                for caps in JAVA_TYPE.captures_iter(content) {
                    found.insert(caps[1].to_string());
                }
                for caps in DECORATOR.captures_iter(content) {
                    found.insert(caps[1].to_string());
                }
            }
            Language::Python => {
                for caps in PY_DEF.captures_iter(content) {
                    found.insert(caps[1].to_string());
                }
                for caps in PY_CLASS.captures_iter(content) {
                    found.insert(caps[1].to_string());
                }
                for caps in DECORATOR.captures_iter(content) {
                    found.insert(caps[1].to_string());
                }
            }
            Language::JavaScript | Language::TypeScript => {
                for caps in PY_CLASS.captures_iter(content) {
                    found.insert(caps[1].to_string());
                }
            }
        }
        found.into_iter().collect()
    }

    fn generate_semantic_tags(&self, chunk: &Chunk) -> Vec<String> {
        let meta = &chunk.metadata;
        let mut tags = Vec::new();

        tags.push(format!("type:{}", meta.code_type.as_str()));
        tags.push(format!("lang:{}", meta.language.as_str()));

        let has = |m: &str| meta.modifiers.iter().any(|x| x == m);
        if has("public") {
            tags.push("access:public".to_string());
        } else if has("private") {
            tags.push("access:private".to_string());
        } else if has("protected") {
            tags.push("access:protected".to_string());
        }

        if has("static") {
            tags.push("scope:static".to_string());
        } else {
            tags.push("scope:instance".to_string());
        }

        if meta.extends.is_some() {
            tags.push("pattern:inheritance".to_string());
        }
        if !meta.implements.is_empty() {
            tags.push("pattern:implementation".to_string());
        }

        let name = meta.name.as_str();
        if name.starts_with("test") || name.starts_with("Test") {
            tags.push("purpose:test".to_string());
        } else if name.starts_with("get") {
            tags.push("purpose:getter".to_string());
        } else if name.starts_with("set") {
            tags.push("purpose:setter".to_string());
        } else if name.starts_with("is") || name.starts_with("has") {
            tags.push("purpose:predicate".to_string());
        }

        tags
    }

    fn analyze_relationships(&self, chunk: &Chunk) -> Relationships {
        let meta = &chunk.metadata;
        let mut dependencies: Vec<String> = meta
            .parameters
            .iter()
            .filter_map(|p| p.type_name.clone())
            .collect();
        if let Some(return_type) = &meta.return_type {
            dependencies.push(return_type.clone());
        }
        Relationships {
            parent: meta.parent_class.clone(),
            extends: meta.extends.clone(),
            implements: meta.implements.clone(),
            dependencies,
            namespace: meta.namespace.clone(),
        }
    }
}
