//! Important-keyword extraction for metadata boosting
//!
//! Pulls out the identifiers that carry the most retrieval signal in source
//! code: declared class names, call receivers, annotations, and the
//! `*Controller` / `*Service` family of structural suffixes. The BM25 index
//! repeats these in the enhanced document body to raise their term frequency.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static CLASS_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bclass\s+(\w+)").expect("static pattern"));
static CALL_RECEIVER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\w+)\s*\(").expect("static pattern"));
static ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\w+)").expect("static pattern"));
static STRUCTURAL_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\w*(?:Controller|Service|Repository|Component|Entity|DTO|Interface))\b")
        .expect("static pattern")
});

/// Extract the structurally important identifiers from source text
///
/// Deduplicated, deterministically ordered.
pub fn extract_important_keywords(text: &str) -> Vec<String> {
    let mut keywords = BTreeSet::new();

    for caps in CLASS_NAME.captures_iter(text) {
        keywords.insert(caps[1].to_string());
    }
    for caps in CALL_RECEIVER.captures_iter(text) {
        keywords.insert(caps[1].to_string());
    }
    for caps in ANNOTATION.captures_iter(text) {
        keywords.insert(caps[1].to_string());
    }
    for caps in STRUCTURAL_SUFFIX.captures_iter(text) {
        keywords.insert(caps[1].to_string());
    }

    keywords.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_class_names_and_annotations() {
        let src = r#"
            @RestController
            public class BookController extends BaseController {
                public Book findBook(Long id) { return repository.findById(id); }
            }
        "#;
        let keywords = extract_important_keywords(src);
        assert!(keywords.contains(&"BookController".to_string()));
        assert!(keywords.contains(&"RestController".to_string()));
        assert!(keywords.contains(&"findBook".to_string()));
        assert!(keywords.contains(&"findById".to_string()));
        assert!(keywords.contains(&"BaseController".to_string()));
    }

    #[test]
    fn extracts_structural_suffixes() {
        let keywords = extract_important_keywords("UserService delegates to UserRepository");
        assert!(keywords.contains(&"UserService".to_string()));
        assert!(keywords.contains(&"UserRepository".to_string()));
    }

    #[test]
    fn deduplicates() {
        let keywords = extract_important_keywords("save() save() save()");
        assert_eq!(
            keywords.iter().filter(|k| k.as_str() == "save").count(),
            1
        );
    }
}
