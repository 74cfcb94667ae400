//! Conversion between Markdown source and its plain-text projection.
//!
//! The Markdown source is the only authoritative representation. The plain
//! projection is derived from it with [`to_plain`], a lossy reduction, and
//! edits made to the projection are taken back verbatim by [`to_markdown`].

use std::sync::LazyLock;

use regex::{Captures, Regex};

static FENCED_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?P<info>[^`\n]*)(?P<body>.*?)```").unwrap());
static IMAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap());
static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#{1,6}[ \t]*").unwrap());
static STRONG_STAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static STRONG_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"__(.*?)__").unwrap());
static EMPHASIS_STAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static EMPHASIS_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_(.*?)_").unwrap());
static BLOCKQUOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*>[ \t]?").unwrap());
static BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[-*+][ \t]+").unwrap());
static ORDERED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\d+\.[ \t]+").unwrap());

/// Strips Markdown syntax from `markdown`, keeping the reading content.
///
/// Fenced code bodies are copied verbatim; everything around them goes
/// through the inline rules in a fixed order (images, links, headings,
/// strong then regular emphasis, blockquotes, list markers, backticks).
/// Malformed or nested syntax may leave stray punctuation behind.
pub fn to_plain(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut last = 0;

    for caps in FENCED_CODE.captures_iter(markdown) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&strip_inline_syntax(&markdown[last..whole.start()]));
        out.push_str(&fence_content(&caps));
        last = whole.end();
    }
    out.push_str(&strip_inline_syntax(&markdown[last..]));
    out
}

/// Takes plain-text edits back as Markdown source.
///
/// Text is trusted as-is: characters such as `*` or `#` typed into the
/// projection become live Markdown syntax again. Nothing is escaped.
pub fn to_markdown(text: &str) -> String {
    text.to_string()
}

fn fence_content(caps: &Captures<'_>) -> String {
    let info = caps.name("info").map_or("", |m| m.as_str());
    let body = caps.name("body").map_or("", |m| m.as_str());
    if body.starts_with('\n') {
        // Block fence: the info string names the language and is dropped.
        body.to_string()
    } else {
        format!("{info}{body}")
    }
}

fn strip_inline_syntax(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = IMAGE.replace_all(text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = HEADING.replace_all(&text, "");
    let text = STRONG_STAR.replace_all(&text, "$1");
    let text = STRONG_UNDERSCORE.replace_all(&text, "$1");
    let text = EMPHASIS_STAR.replace_all(&text, "$1");
    let text = EMPHASIS_UNDERSCORE.replace_all(&text, "$1");
    let text = BLOCKQUOTE.replace_all(&text, "");
    let text = BULLET.replace_all(&text, "");
    let text = ORDERED.replace_all(&text, "");
    text.replace('`', "")
}

#[cfg(test)]
#[path = "transform_tests.rs"]
mod transform_tests;
