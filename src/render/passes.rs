use latex2mathml::{DisplayStyle, latex_to_mathml};
use syntect::{
    html::{ClassStyle, ClassedHTMLGenerator},
    parsing::SyntaxSet,
    util::LinesWithEndings,
};

use super::markup::{CODE_BLOCK, DIAGRAM_CONTAINER, tag_name, unescape};
use super::{EnhanceError, Enhancer};

const DIAGRAM_KINDS: &[&str] = &[
    "graph",
    "flowchart",
    "sequenceDiagram",
    "classDiagram",
    "stateDiagram",
    "stateDiagram-v2",
    "erDiagram",
    "journey",
    "gantt",
    "pie",
    "quadrantChart",
    "requirementDiagram",
    "gitGraph",
    "mindmap",
    "timeline",
    "C4Context",
    "sankey-beta",
    "xychart-beta",
    "block-beta",
    "packet-beta",
    "kanban",
    "architecture-beta",
];

/// Checks every diagram container and tags it with its diagram kind.
///
/// Drawing is left to the viewer; a container whose source does not start
/// with a known diagram kind fails the whole pass.
pub struct DiagramPass;

impl DiagramPass {
    fn kind_of(source: &str) -> Option<&'static str> {
        let header = source
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with("%%"))?;
        let keyword = header
            .split(|ch: char| ch.is_whitespace() || ch == ';')
            .next()?;
        DIAGRAM_KINDS.iter().copied().find(|kind| *kind == keyword)
    }
}

impl Enhancer for DiagramPass {
    fn name(&self) -> &'static str {
        "diagram"
    }

    fn enhance(&self, html: &str) -> Result<String, EnhanceError> {
        let mut out = String::with_capacity(html.len());
        let mut last = 0;
        for caps in DIAGRAM_CONTAINER.captures_iter(html) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let body = &caps["body"];
            let kind = Self::kind_of(&unescape(body)).ok_or_else(|| {
                let first = body.lines().next().unwrap_or_default();
                EnhanceError::new(self.name(), format!("unknown diagram type in {first:?}"))
            })?;
            out.push_str(&html[last..whole.start()]);
            out.push_str(&format!(
                "<div class=\"mermaid\" data-diagram=\"{kind}\">{body}</div>"
            ));
            last = whole.end();
        }
        out.push_str(&html[last..]);
        Ok(out)
    }
}

/// Syntax highlighting for fenced code with a known language.
pub struct HighlightPass {
    syntaxes: SyntaxSet,
}

impl Default for HighlightPass {
    fn default() -> Self {
        Self::new()
    }
}

impl HighlightPass {
    pub fn new() -> Self {
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
        }
    }

    fn highlight(&self, language: &str, code: &str) -> Result<Option<String>, EnhanceError> {
        let Some(syntax) = self.syntaxes.find_syntax_by_token(language) else {
            return Ok(None);
        };
        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntaxes, ClassStyle::Spaced);
        for line in LinesWithEndings::from(code) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .map_err(|err| EnhanceError::new("highlight", err.to_string()))?;
        }
        Ok(Some(generator.finalize()))
    }
}

impl Enhancer for HighlightPass {
    fn name(&self) -> &'static str {
        "highlight"
    }

    fn enhance(&self, html: &str) -> Result<String, EnhanceError> {
        let mut out = String::with_capacity(html.len());
        let mut last = 0;
        for caps in CODE_BLOCK.captures_iter(html) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let language = &caps["lang"];
            out.push_str(&html[last..whole.start()]);
            match self.highlight(language, &unescape(&caps["body"]))? {
                Some(highlighted) => out.push_str(&format!(
                    "<pre><code class=\"language-{language} highlighted\">{highlighted}</code></pre>"
                )),
                None => out.push_str(whole.as_str()),
            }
            last = whole.end();
        }
        out.push_str(&html[last..]);
        Ok(out)
    }
}

/// Typesets `$$display$$` and `$inline$` TeX to MathML.
///
/// Text inside `pre`, `code` and existing `math` elements is left alone.
pub struct MathPass;

const VERBATIM_ELEMENTS: &[&str] = &["pre", "code", "math", "script", "style"];

impl MathPass {
    fn typeset(&self, text: &str) -> Result<String, EnhanceError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find('$') {
            let (delimiter, style) = if rest[start..].starts_with("$$") {
                ("$$", DisplayStyle::Block)
            } else {
                ("$", DisplayStyle::Inline)
            };
            let body_start = start + delimiter.len();
            let Some(len) = rest[body_start..].find(delimiter) else {
                break;
            };
            let body_end = body_start + len;
            let source = &rest[body_start..body_end];
            let after = body_end + delimiter.len();
            if source.trim().is_empty() {
                out.push_str(&rest[..after]);
                rest = &rest[after..];
                continue;
            }

            let latex = unescape(source).replace('<', r"\lt ").replace('>', r"\gt ");
            let mathml = latex_to_mathml(&latex, style)
                .map_err(|err| EnhanceError::new(self.name(), format!("{source:?}: {err}")))?;
            out.push_str(&rest[..start]);
            out.push_str(&mathml);
            rest = &rest[after..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl Enhancer for MathPass {
    fn name(&self) -> &'static str {
        "math"
    }

    fn enhance(&self, html: &str) -> Result<String, EnhanceError> {
        if !html.contains('$') {
            return Ok(html.to_string());
        }
        let mut out = String::with_capacity(html.len());
        let mut verbatim_depth = 0usize;
        let mut rest = html;
        while let Some(open) = rest.find('<') {
            let (text, tail) = rest.split_at(open);
            if verbatim_depth == 0 {
                out.push_str(&self.typeset(text)?);
            } else {
                out.push_str(text);
            }
            let close = tail.find('>').map_or(tail.len(), |idx| idx + 1);
            let tag = &tail[..close];
            if let Some((name, closing)) = tag_name(tag)
                && VERBATIM_ELEMENTS.contains(&name.as_str())
                && !tag.ends_with("/>")
            {
                if closing {
                    verbatim_depth = verbatim_depth.saturating_sub(1);
                } else {
                    verbatim_depth += 1;
                }
            }
            out.push_str(tag);
            rest = &tail[close..];
        }
        if verbatim_depth == 0 {
            out.push_str(&self.typeset(rest)?);
        } else {
            out.push_str(rest);
        }
        Ok(out)
    }
}
