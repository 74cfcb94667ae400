use std::sync::LazyLock;

use regex::Regex;

/// A fenced code block with a language, as it looks after sanitizing.
pub(crate) static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<pre><code class="language-(?P<lang>[A-Za-z0-9_+#.-]+)">(?P<body>.*?)</code></pre>"#)
        .unwrap()
});

pub(crate) static DIAGRAM_CONTAINER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<div class="mermaid">(?P<body>.*?)</div>"#).unwrap());

/// Decodes the entities the sanitizer emits in text content.
pub(crate) fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

/// Name of the element a tag opens or closes, lowercased.
pub(crate) fn tag_name(tag: &str) -> Option<(String, bool)> {
    let inner = tag.strip_prefix('<')?;
    let (closing, inner) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    let name: String = inner
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric())
        .map(|ch| ch.to_ascii_lowercase())
        .collect();
    if name.is_empty() {
        None
    } else {
        Some((name, closing))
    }
}
