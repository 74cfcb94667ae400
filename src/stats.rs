use std::io::Cursor;

use tdoc::{Paragraph, ParagraphType, Span, markdown};

/// Words in a document, split by where they sit.
///
/// Fenced code counts like the plain projection treats it: its words are
/// kept, but tallied apart from prose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WordCount {
    pub prose: usize,
    pub code: usize,
}

impl WordCount {
    pub fn total(self) -> usize {
        self.prose + self.code
    }

    fn add(&mut self, words: usize, in_code: bool) {
        if in_code {
            self.code += words;
        } else {
            self.prose += words;
        }
    }
}

/// Counts over tdoc's parsed model so markup does not count. Falls back to
/// the plain projection, all prose, if parsing fails.
pub fn count_words(markdown_source: &str) -> WordCount {
    match markdown::parse(Cursor::new(markdown_source.to_string())) {
        Ok(document) => {
            let mut count = WordCount::default();
            for paragraph in &document.paragraphs {
                tally_paragraph(paragraph, &mut count);
            }
            count
        }
        Err(_) => WordCount {
            prose: crate::transform::to_plain(markdown_source)
                .split_whitespace()
                .count(),
            code: 0,
        },
    }
}

pub fn word_count(markdown_source: &str) -> usize {
    count_words(markdown_source).total()
}

fn words_in(spans: &[Span]) -> usize {
    spans
        .iter()
        .map(|span| span.text.split_whitespace().count() + words_in(&span.children))
        .sum()
}

fn tally_paragraph(paragraph: &Paragraph, count: &mut WordCount) {
    let in_code = paragraph.paragraph_type() == ParagraphType::CodeBlock;
    count.add(words_in(paragraph.content()), in_code);

    for child in paragraph.children() {
        tally_paragraph(child, count);
    }
    for entry in paragraph.entries() {
        for item in entry {
            tally_paragraph(item, count);
        }
    }
    for item in paragraph.checklist_items() {
        count.add(words_in(&item.content), false);
        for nested in &item.children {
            count.add(words_in(&nested.content), false);
        }
    }
}
