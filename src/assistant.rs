//! Assistant actions over a text selection.
//!
//! With a remote client configured the request goes out as one prompt and
//! the reply comes back verbatim. Without one, each action has a small local
//! transform; these are mechanical placeholders, not language models.

use std::{fmt, str::FromStr, sync::Arc, sync::LazyLock};

use log::{info, warn};
use regex::Regex;
use thiserror::Error;

use crate::config::AssistantConfig;

mod remote;

pub use remote::{CompletionClient, OpenAiClient, RemoteError};

const SUMMARY_FALLBACK_CHARS: usize = 200;
const SUMMARY_SENTENCES: usize = 3;
pub const UNKNOWN_ACTION: &str = "Unknown action";
pub const NO_HEADINGS: &str = "No headings found";

static ATX_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}[ \t]*(.+)$").unwrap());

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssistantAction {
    Summarize,
    Expand,
    Rewrite,
    ExtractHeadings,
}

impl AssistantAction {
    pub const ALL: [AssistantAction; 4] = [
        AssistantAction::Summarize,
        AssistantAction::Expand,
        AssistantAction::Rewrite,
        AssistantAction::ExtractHeadings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssistantAction::Summarize => "summarize",
            AssistantAction::Expand => "expand",
            AssistantAction::Rewrite => "rewrite",
            AssistantAction::ExtractHeadings => "extract_headings",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AssistantAction::Summarize => "Summarize",
            AssistantAction::Expand => "Expand",
            AssistantAction::Rewrite => "Rewrite",
            AssistantAction::ExtractHeadings => "Extract headings",
        }
    }

    /// The next action in [`Self::ALL`], wrapping around.
    pub fn cycle(self, delta: isize) -> Self {
        let len = Self::ALL.len() as isize;
        let idx = Self::ALL.iter().position(|action| *action == self).unwrap_or(0) as isize;
        Self::ALL[(idx + delta).rem_euclid(len) as usize]
    }
}

impl fmt::Display for AssistantAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown assistant action {0:?}")]
pub struct UnknownAction(pub String);

impl FromStr for AssistantAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "summarize" => Ok(AssistantAction::Summarize),
            "expand" => Ok(AssistantAction::Expand),
            "rewrite" => Ok(AssistantAction::Rewrite),
            "extract_headings" | "extractHeadings" => Ok(AssistantAction::ExtractHeadings),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssistantRequest {
    pub action: AssistantAction,
    pub instruction: String,
    pub selection: String,
}

impl AssistantRequest {
    pub fn new(
        action: AssistantAction,
        instruction: impl Into<String>,
        selection: impl Into<String>,
    ) -> Self {
        Self {
            action,
            instruction: instruction.into(),
            selection: selection.into(),
        }
    }

    /// The single prompt sent to a remote service.
    pub fn prompt(&self) -> String {
        format!("{}: {}\n\n{}", self.action, self.instruction, self.selection)
    }

    fn instruction(&self) -> Option<&str> {
        let instruction = self.instruction.trim();
        (!instruction.is_empty()).then_some(instruction)
    }
}

/// The selected text, or the whole source when nothing is selected.
pub fn resolve_selection<'a>(selected: Option<&'a str>, source: &'a str) -> &'a str {
    match selected {
        Some(text) if !text.is_empty() => text,
        _ => source,
    }
}

#[derive(Clone, Default)]
pub struct Assistant {
    client: Option<Arc<dyn CompletionClient + Send + Sync>>,
}

impl Assistant {
    /// Local transforms only.
    pub fn local() -> Self {
        Self::default()
    }

    pub fn with_client(client: impl CompletionClient + Send + Sync + 'static) -> Self {
        Self {
            client: Some(Arc::new(client)),
        }
    }

    /// Remote when a credential is available, local otherwise.
    pub fn from_config(config: &AssistantConfig) -> Self {
        match config.credential() {
            Some(key) => {
                info!("assistant uses {} at {}", config.model, config.endpoint);
                Self::with_client(OpenAiClient::new(config, key))
            }
            None => Self::local(),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.client.is_some()
    }

    /// Always yields text; remote failures come back as their message.
    pub fn dispatch(&self, request: &AssistantRequest) -> String {
        match &self.client {
            Some(client) => match client.complete(&request.prompt()) {
                Ok(reply) => reply,
                Err(err) => {
                    warn!("assistant request failed: {err}");
                    err.to_string()
                }
            },
            None => local_transform(request),
        }
    }

    /// Dispatches an action given by name; unknown names get a fixed reply.
    pub fn dispatch_named(&self, action: &str, instruction: &str, selection: &str) -> String {
        match action.parse::<AssistantAction>() {
            Ok(action) => self.dispatch(&AssistantRequest::new(action, instruction, selection)),
            Err(err) => {
                warn!("{err}");
                UNKNOWN_ACTION.to_string()
            }
        }
    }
}

pub fn local_transform(request: &AssistantRequest) -> String {
    let selection = request.selection.as_str();
    let instruction = request.instruction();
    match request.action {
        AssistantAction::Summarize => summarize(selection, instruction),
        AssistantAction::Expand => expand(selection, instruction),
        AssistantAction::Rewrite => rewrite(selection, instruction),
        AssistantAction::ExtractHeadings => extract_headings(selection),
    }
}

fn summarize(selection: &str, instruction: Option<&str>) -> String {
    let (segments, has_boundary) = sentence_segments(selection);
    let summary = if has_boundary {
        segments
            .into_iter()
            .take(SUMMARY_SENTENCES)
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        let mut truncated: String = selection.chars().take(SUMMARY_FALLBACK_CHARS).collect();
        if selection.chars().count() > SUMMARY_FALLBACK_CHARS {
            truncated.push('…');
        }
        truncated
    };
    match instruction {
        Some(instruction) => format!("({instruction})\n\n{summary}"),
        None => summary,
    }
}

/// Splits after `.`, `?` or `!` followed by whitespace. The flag tells
/// whether any such boundary was found.
fn sentence_segments(text: &str) -> (Vec<&str>, bool) {
    let mut segments = Vec::new();
    let mut has_boundary = false;
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        let at_boundary = matches!(ch, '.' | '?' | '!')
            && chars.peek().is_some_and(|(_, next)| next.is_whitespace());
        if !at_boundary {
            continue;
        }
        has_boundary = true;
        segments.push(&text[start..idx + ch.len_utf8()]);
        while chars.peek().is_some_and(|(_, next)| next.is_whitespace()) {
            chars.next();
        }
        start = chars.peek().map_or(text.len(), |(next_idx, _)| *next_idx);
    }
    if start < text.len() {
        segments.push(&text[start..]);
    }
    (segments, has_boundary)
}

fn expand(selection: &str, instruction: Option<&str>) -> String {
    let marker = instruction.unwrap_or("Additional detail: ");
    format!("{selection}\n\n{marker}— Add more content here.\n")
}

fn rewrite(selection: &str, instruction: Option<&str>) -> String {
    let single_line = selection
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ");
    let label = instruction.unwrap_or("polished");
    format!("{single_line}\n\n(Rewritten: {label})")
}

fn extract_headings(selection: &str) -> String {
    let headings: Vec<&str> = ATX_HEADING
        .captures_iter(selection)
        .filter_map(|caps| caps.get(1))
        .map(|text| text.as_str().trim())
        .filter(|text| !text.is_empty())
        .collect();
    if headings.is_empty() {
        NO_HEADINGS.to_string()
    } else {
        headings.join("\n")
    }
}

#[cfg(test)]
#[path = "assistant_tests.rs"]
mod assistant_tests;
