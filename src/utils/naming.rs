use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Replaces every character outside `[A-Za-z0-9_-]` with an underscore so
/// untrusted name fields can never traverse paths or break the storage key
/// namespace.
pub fn sanitize_component(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// Sanitizes a filename for use as the final path segment of a storage key
/// or staging path. Dots are kept so the extension survives, but separator
/// characters are replaced and `..` sequences are broken up.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.replace("..", "__");
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}

static LAST_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Current unix time in milliseconds, bumped to stay strictly increasing
/// within this process. Two blobs published back-to-back with the same
/// original filename therefore always get distinct keys.
pub fn next_unix_millis() -> i64 {
    let now = Utc::now().timestamp_millis();
    let previous = LAST_MILLIS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    now.max(previous + 1)
}

/// Storage key for a published blob:
/// `<taxYear>/<clientName>/<subClientName>/Uploaded/<millis>-<filename>`.
pub fn blob_key(
    tax_year: &str,
    client_name: &str,
    sub_client_name: &str,
    millis: i64,
    filename: &str,
) -> String {
    format!(
        "{}/{}/{}/Uploaded/{}-{}",
        sanitize_component(tax_year),
        sanitize_component(client_name),
        sanitize_component(sub_client_name),
        millis,
        sanitize_filename(filename),
    )
}

/// File name for a merged task document.
pub fn merged_document_name(
    client_name: &str,
    first_name: &str,
    last_name: &str,
    millis: i64,
) -> String {
    format!(
        "{}_{}_{}_{}.pdf",
        sanitize_component(client_name),
        sanitize_component(first_name),
        sanitize_component(last_name),
        millis,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("2025"), "2025");
        assert_eq!(sanitize_component("Acme Accounting"), "Acme_Accounting");
        assert_eq!(sanitize_component("Jane Doe"), "Jane_Doe");
        assert_eq!(sanitize_component(""), "unknown");
    }

    #[test]
    fn test_sanitize_component_blocks_traversal() {
        let sanitized = sanitize_component("../../etc");
        assert!(!sanitized.contains('/'));
        assert!(!sanitized.contains(".."));

        let sanitized = sanitize_component("a/b\\c\0d");
        assert!(!sanitized.contains('/'));
        assert!(!sanitized.contains('\\'));
        assert!(!sanitized.contains('\0'));
    }

    #[test]
    fn test_sanitize_filename_keeps_extension() {
        assert_eq!(sanitize_filename("W2 form.pdf"), "W2_form.pdf");
        assert_eq!(sanitize_filename("scan (1).png"), "scan__1_.png");
    }

    #[test]
    fn test_sanitize_filename_blocks_traversal() {
        let sanitized = sanitize_filename("../../etc/passwd");
        assert!(!sanitized.contains('/'));
        assert!(!sanitized.contains(".."));
        assert!(!sanitized.starts_with('.'));
        assert_eq!(sanitize_filename(""), "document");
    }

    #[test]
    fn test_blob_key_layout() {
        let key = blob_key("2025", "Acme Accounting", "Jane Doe", 1700000000123, "doc.pdf");
        assert_eq!(
            key,
            "2025/Acme_Accounting/Jane_Doe/Uploaded/1700000000123-doc.pdf"
        );
    }

    #[test]
    fn test_blob_key_never_escapes_container_prefix() {
        let key = blob_key("2025", "../../etc", "..\\..", 1, "../x.pdf");
        // The only slashes are the four structural separators.
        assert_eq!(key.matches('/').count(), 4);
        assert!(!key.contains(".."));
    }

    #[test]
    fn test_next_unix_millis_is_strictly_increasing() {
        let a = next_unix_millis();
        let b = next_unix_millis();
        let c = next_unix_millis();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_merged_document_name() {
        let name = merged_document_name("Acme Accounting", "Jane", "Doe", 42);
        assert_eq!(name, "Acme_Accounting_Jane_Doe_42.pdf");
    }
}
