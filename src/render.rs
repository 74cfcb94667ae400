//! Markdown to sanitized, enhanced HTML.
//!
//! A render is parse, sanitize, diagram containers, then the enhancement
//! passes in order. Sanitizing always happens; enhancement passes may fail
//! individually and are recorded in the [`Rendered`] report.

use std::fmt;

use ammonia::Builder;
use log::warn;
use pulldown_cmark::{Event, Options, Parser, html};
use thiserror::Error;

use crate::config::RenderConfig;

mod markup;
mod passes;

pub use passes::{DiagramPass, HighlightPass, MathPass};

use markup::CODE_BLOCK;

/// A post-sanitize pass over the rendered HTML.
pub trait Enhancer {
    fn name(&self) -> &'static str;

    /// Returns the enhanced HTML. Returning the input unchanged means the
    /// pass had nothing to do.
    fn enhance(&self, html: &str) -> Result<String, EnhanceError>;
}

#[derive(Debug, Error)]
#[error("{pass} pass failed: {reason}")]
pub struct EnhanceError {
    pub pass: &'static str,
    pub reason: String,
}

impl EnhanceError {
    pub fn new(pass: &'static str, reason: impl Into<String>) -> Self {
        Self {
            pass,
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    Applied,
    Skipped,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassReport {
    pub pass: &'static str,
    pub outcome: PassOutcome,
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            PassOutcome::Applied => write!(f, "{}: applied", self.pass),
            PassOutcome::Skipped => write!(f, "{}: skipped", self.pass),
            PassOutcome::Failed(reason) => write!(f, "{}: failed ({reason})", self.pass),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    pub passes: Vec<PassReport>,
}

impl Rendered {
    pub fn failures(&self) -> impl Iterator<Item = &PassReport> {
        self.passes
            .iter()
            .filter(|report| matches!(report.outcome, PassOutcome::Failed(_)))
    }
}

pub struct RenderPipeline {
    options: Options,
    sanitizer: Builder<'static>,
    diagram_languages: Vec<String>,
    passes: Vec<Box<dyn Enhancer>>,
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

impl RenderPipeline {
    /// Parse and sanitize only, with `mermaid` containers but no passes.
    pub fn bare() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_FOOTNOTES);

        let mut sanitizer = Builder::default();
        sanitizer.add_generic_attributes(&["class"]);

        Self {
            options,
            sanitizer,
            diagram_languages: vec!["mermaid".to_string()],
            passes: Vec::new(),
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        let mut pipeline = Self::bare().with_diagram_languages(config.diagram_languages.clone());
        if config.diagrams {
            pipeline = pipeline.with_pass(DiagramPass);
        }
        if config.highlight {
            pipeline = pipeline.with_pass(HighlightPass::new());
        }
        if config.math {
            pipeline = pipeline.with_pass(MathPass);
        }
        pipeline
    }

    pub fn with_diagram_languages(mut self, languages: Vec<String>) -> Self {
        self.diagram_languages = languages;
        self
    }

    /// Appends a pass; passes run in the order they were added.
    pub fn with_pass(mut self, pass: impl Enhancer + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    pub fn render(&self, markdown: &str) -> String {
        self.render_with_report(markdown).html
    }

    pub fn render_with_report(&self, markdown: &str) -> Rendered {
        let raw = self.parse(markdown);
        let mut html = self.sanitizer.clean(&raw).to_string();
        html = self.diagram_containers(&html);

        let mut passes = Vec::with_capacity(self.passes.len());
        for pass in &self.passes {
            let outcome = match pass.enhance(&html) {
                Ok(enhanced) if enhanced == html => PassOutcome::Skipped,
                Ok(enhanced) => {
                    html = enhanced;
                    PassOutcome::Applied
                }
                Err(err) => {
                    warn!("{err}");
                    PassOutcome::Failed(err.reason)
                }
            };
            passes.push(PassReport {
                pass: pass.name(),
                outcome,
            });
        }

        Rendered { html, passes }
    }

    fn parse(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.options).map(|event| match event {
            Event::SoftBreak => Event::HardBreak,
            other => other,
        });
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }

    fn diagram_containers(&self, html: &str) -> String {
        if self.diagram_languages.is_empty() {
            return html.to_string();
        }
        CODE_BLOCK
            .replace_all(html, |caps: &regex::Captures<'_>| {
                let language = &caps["lang"];
                if self.diagram_languages.iter().any(|lang| lang == language) {
                    format!("<div class=\"mermaid\">{}</div>", &caps["body"])
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod render_tests;
