//! String-in, string-out import and export helpers. No file I/O here.

use std::path::Path;

pub const MARKDOWN_FILE_NAME: &str = "document.md";
pub const HTML_FILE_NAME: &str = "document.html";

pub fn markdown_export(source: &str) -> String {
    source.to_string()
}

/// Wraps rendered HTML in a minimal standalone page.
pub fn html_document(rendered_html: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>Export</title></head><body>{rendered_html}</body></html>"
    )
}

/// The record name for an imported file: its file name, or `Untitled.md`.
pub fn import_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("Untitled.md")
        .to_string()
}
