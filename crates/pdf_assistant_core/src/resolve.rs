//! crates/pdf_assistant_core/src/resolve.rs
//!
//! Maps a requested document name onto one of the blob names actually present
//! in the content store. Stored names drift from catalog names (upload
//! timestamps, folder prefixes), so matching is deliberately loose.

use std::sync::LazyLock;

use regex::Regex;

static TIMESTAMP_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+_").expect("timestamp pattern is valid"));

const DOCUMENT_EXTENSION: &str = ".pdf";

/// Whether the last resolution step may pick an unrelated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Fall back to the first document-typed blob when nothing matches.
    AllowAnyDocument,
    /// Only names derived from the request may match.
    Strict,
}

/// Which resolution step produced the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    TimestampStripped,
    Partial,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMatch {
    pub name: String,
    pub kind: MatchKind,
}

/// Drops any folder prefix: `pdfs/1700000000_report.pdf` -> `1700000000_report.pdf`.
pub fn strip_path(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Drops a leading upload timestamp: `1700000000_report.pdf` -> `report.pdf`.
pub fn strip_timestamp(name: &str) -> &str {
    match TIMESTAMP_PREFIX.find(name) {
        Some(prefix) => &name[prefix.end()..],
        None => name,
    }
}

pub fn is_document_name(name: &str) -> bool {
    name.to_lowercase().ends_with(DOCUMENT_EXTENSION)
}

/// Resolves `requested` against `stored`, trying in order: the raw name, the
/// timestamp-stripped name, a substring match on any stored document, and finally
/// (policy permitting) the first stored document of any name.
pub fn resolve_blob(requested: &str, stored: &[String], policy: MatchPolicy) -> Option<BlobMatch> {
    let raw = strip_path(requested);
    let clean = strip_timestamp(raw);

    let found = |name: &String, kind| {
        Some(BlobMatch {
            name: name.clone(),
            kind,
        })
    };

    if let Some(name) = stored.iter().find(|s| s.as_str() == raw) {
        return found(name, MatchKind::Exact);
    }
    if let Some(name) = stored.iter().find(|s| s.as_str() == clean) {
        return found(name, MatchKind::TimestampStripped);
    }

    let mut documents = stored.iter().filter(|s| is_document_name(s));
    if let Some(name) = documents
        .clone()
        .find(|s| (!raw.is_empty() && s.contains(raw)) || (!clean.is_empty() && s.contains(clean)))
    {
        return found(name, MatchKind::Partial);
    }

    match policy {
        MatchPolicy::AllowAnyDocument => documents.next().and_then(|n| found(n, MatchKind::Fallback)),
        MatchPolicy::Strict => None,
    }
}
