//! services/api/src/web/files.rs
//!
//! Validation helpers for user-supplied file names.

pub const PDF_EXTENSIONS: &[&str] = &["pdf"];
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Reduces an uploaded file name to a safe object key.
///
/// Directory components are dropped, spaces become underscores, anything other
/// than ASCII alphanumerics, `.`, `-` and `_` is removed, and leading dots are
/// stripped so the result can never be hidden or relative.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(*c, '.' | '-' | '_'))
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

fn extension(name: &str) -> Option<String> {
    name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
}

pub fn has_extension(name: &str, allowed: &[&str]) -> bool {
    extension(name).is_some_and(|ext| allowed.contains(&ext.as_str()))
}

/// MIME type of an uploaded image, by extension.
pub fn image_mime_type(name: &str) -> &'static str {
    match extension(name).as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}
