//! Code-aware tokenization for lexical indexing
//!
//! Maps raw source text to a lowercase token stream that treats identifier
//! morphology as word boundaries: `getUserById` and `get_user_by_id` both
//! yield `get user by id` before filtering and stemming. The same tokenizer
//! instance is applied at index time and at query time, so query terms meet
//! document terms in the same normalized space.
//!
//! The pipeline is deterministic and holds no mutable state after
//! construction. When the full pipeline produces nothing for a non-empty
//! input, a simpler word-boundary extraction takes over so a document is
//! never silently dropped from the index.

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Cap applied by the fallback extraction path
const FALLBACK_TOKEN_LIMIT: usize = 50;

/// Minimum surviving token length
const MIN_TOKEN_LENGTH: usize = 2;

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("static pattern"));
static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9\s]").expect("static pattern"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static pattern"));
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").expect("static pattern"));

/// General English stopwords
///
/// Deliberately free of code-significant words: `class`, `function`, `def`,
/// `interface`, `controller` and friends carry retrieval signal and are kept.
const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "is", "are", "was", "were", "be", "been", "being", "to",
    "of", "in", "on", "at", "by", "with", "from", "as", "that", "it", "its", "has", "have", "had",
    "do", "does", "did", "will", "would", "can", "could", "should", "may", "might", "must", "not",
    "no", "so", "than", "then", "there", "here", "when", "where", "which", "who", "whom", "why",
    "how", "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "only",
    "own", "same", "too", "very", "just", "about", "into", "over", "under", "again", "further",
    "once", "what", "because", "until", "during", "before", "after", "above", "below", "up",
    "down", "out", "off", "am", "i", "you", "he", "she", "we", "they", "me", "him", "her", "us",
    "them", "my", "your", "his", "our", "their",
];

/// Code-specific stopwords: syntax noise with no retrieval value
const CODE_STOPWORDS: &[&str] = &[
    "public", "private", "protected", "static", "final", "void", "extends", "implements",
    "import", "package", "if", "else", "for", "while", "try", "catch", "throw", "throws", "new",
    "this", "super", "return", "const", "let", "var", "async", "await", "true", "false", "null",
    "undefined", "none",
];

/// Configuration for [`CodeTokenizer`]
#[derive(Debug, Clone)]
pub struct TokenizerConfig {
    /// Apply Porter-style English stemming to surviving tokens
    pub use_stemming: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self { use_stemming: true }
    }
}

/// Deterministic code-aware tokenizer
pub struct CodeTokenizer {
    stopwords: HashSet<&'static str>,
    stemmer: Option<Stemmer>,
}

impl CodeTokenizer {
    /// Build a tokenizer with the given configuration
    pub fn new(config: TokenizerConfig) -> Self {
        let stopwords = ENGLISH_STOPWORDS
            .iter()
            .chain(CODE_STOPWORDS.iter())
            .copied()
            .collect();
        let stemmer = config
            .use_stemming
            .then(|| Stemmer::create(Algorithm::English));
        Self { stopwords, stemmer }
    }

    /// Split identifier morphology into readable words
    ///
    /// `getUserById` becomes `get User By Id`, `snake_case` becomes
    /// `snake case`, punctuation becomes spaces, runs of whitespace collapse.
    /// The output is still human-readable text, which is what the BM25 index
    /// concatenates into its enhanced document body.
    pub fn preprocess(&self, text: &str) -> String {
        let split = CAMEL_BOUNDARY.replace_all(text, "$1 $2");
        let no_underscores = split.replace('_', " ");
        let cleaned = NON_ALNUM.replace_all(&no_underscores, " ");
        WHITESPACE.replace_all(&cleaned, " ").trim().to_string()
    }

    /// Tokenize text into the normalized lowercase token stream
    ///
    /// Identical input always yields identical output. Non-empty input that
    /// the pipeline reduces to nothing falls back to [`Self::fallback_tokenize`].
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let tokens = self.tokenize_pipeline(text);
        if tokens.is_empty() {
            return self.fallback_tokenize(text);
        }
        tokens
    }

    fn tokenize_pipeline(&self, text: &str) -> Vec<String> {
        let preprocessed = self.preprocess(text);
        preprocessed
            .split(' ')
            .map(str::to_lowercase)
            .filter(|token| self.keep(token))
            .map(|token| self.stem(&token))
            .collect()
    }

    /// Simple word-boundary extraction used when the main pipeline yields nothing
    ///
    /// Applies the stopword and length filters, no stemming, capped at 50
    /// tokens. Never fails.
    pub fn fallback_tokenize(&self, text: &str) -> Vec<String> {
        WORD.find_iter(&text.to_lowercase())
            .map(|m| m.as_str().to_string())
            .filter(|token| self.keep(token))
            .take(FALLBACK_TOKEN_LIMIT)
            .collect()
    }

    fn keep(&self, token: &str) -> bool {
        token.len() >= MIN_TOKEN_LENGTH && !self.stopwords.contains(token)
    }

    fn stem(&self, token: &str) -> String {
        match &self.stemmer {
            Some(stemmer) => stemmer.stem(token).into_owned(),
            None => token.to_string(),
        }
    }
}

impl Default for CodeTokenizer {
    fn default() -> Self {
        Self::new(TokenizerConfig::default())
    }
}
