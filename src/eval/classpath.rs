//! Java filepath → classpath normalization
//!
//! Predictions and ground truth may name the same code location two ways:
//! `src/main/java/com/acme/BookController.java` versus
//! `com.acme.BookController`. Normalizing both to the dotted form before
//! comparison is what makes evaluation against classpath-annotated datasets
//! meaningful. The method-name trimming heuristic treats a lowercase final
//! segment as a method suffix and drops it.

/// Source roots stripped before conversion
const SOURCE_ROOTS: &[&str] = &["src/main/java/", "src/test/java/"];

/// Convert a Java file path to a dotted classpath
///
/// Strips a known source root when present, drops the `.java` suffix, and
/// replaces `/` with `.`. Inputs that are not Java paths come back with the
/// same transformation applied minus the suffix handling, which leaves
/// plain identifiers untouched.
pub fn filepath_to_classpath(file_path: &str) -> String {
    let mut path = file_path.trim();
    for root in SOURCE_ROOTS {
        if let Some(stripped) = path.strip_prefix(root) {
            path = stripped;
            break;
        }
    }
    let path = path.strip_suffix(".java").unwrap_or(path);
    path.replace('/', ".")
}

/// Drop a trailing method segment from a dotted classpath
///
/// Heuristic: the final segment is a method name when its first character is
/// lowercase. `com.acme.BookController.findAll` becomes
/// `com.acme.BookController`; a classpath already ending in a type name is
/// returned unchanged.
pub fn trim_method_name(classpath: &str) -> String {
    match classpath.rsplit_once('.') {
        Some((head, tail))
            if tail
                .chars()
                .next()
                .is_some_and(|c| c.is_lowercase()) =>
        {
            head.to_string()
        }
        _ => classpath.to_string(),
    }
}

/// Whether an identifier already looks like a dotted classpath
pub fn looks_like_classpath(identifier: &str) -> bool {
    identifier.contains('.') && !identifier.ends_with(".java")
}

/// Normalize a ground-truth entry for comparison
///
/// Entries that already look like classpaths are kept; file-path-looking
/// entries are converted. Method trimming applies in both cases when
/// requested.
pub fn normalize_ground_truth(entry: &str, ignore_method_names: bool) -> String {
    let classpath = if looks_like_classpath(entry) {
        entry.to_string()
    } else {
        filepath_to_classpath(entry)
    };
    if ignore_method_names {
        trim_method_name(&classpath)
    } else {
        classpath
    }
}

/// Normalize one prediction for comparison
///
/// With a file path available the path is converted; otherwise the raw
/// content stands in as the prediction identifier.
pub fn normalize_prediction(
    file_path: Option<&str>,
    content: &str,
    ignore_method_names: bool,
) -> String {
    match file_path {
        Some(path) if !path.trim().is_empty() => {
            let classpath = filepath_to_classpath(path);
            if ignore_method_names {
                trim_method_name(&classpath)
            } else {
                classpath
            }
        }
        _ => content.to_string(),
    }
}
