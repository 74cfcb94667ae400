use markpane::{
    RenderPipeline,
    buffer::TextBuffer,
    config::RenderConfig,
    stats, to_plain,
};
use std::{
    hint::black_box,
    time::{Duration, Instant},
};

/// Performance benchmarks for the work done on every keystroke
///
/// Run with: cargo test --release --bench performance -- --nocapture
///
/// This measures:
/// - Plain projection of the Markdown source
/// - HTML rendering with and without enhancement passes
/// - Word counting for the status line
/// - Cursor position lookups in large buffers
const SMALL_DOC_SECTIONS: usize = 10;
const MEDIUM_DOC_SECTIONS: usize = 100;
const LARGE_DOC_SECTIONS: usize = 1000;

const ITERATIONS: usize = 100;
const FRAME_BUDGET: Duration = Duration::from_millis(16);

const SAMPLE_WORDS: [&str; 20] = [
    "Lorem",
    "ipsum",
    "dolor",
    "sit",
    "amet",
    "consectetur",
    "adipiscing",
    "elit",
    "sed",
    "do",
    "eiusmod",
    "tempor",
    "incididunt",
    "ut",
    "labore",
    "et",
    "dolore",
    "magna",
    "aliqua",
    "enim",
];

/// Create a Markdown document cycling through the constructs the panes handle
fn create_test_markdown(num_sections: usize, words_per_section: usize) -> String {
    let mut doc = String::new();

    for i in 0..num_sections {
        let mut text = String::new();
        for j in 0..words_per_section {
            if j > 0 {
                text.push(' ');
            }
            text.push_str(SAMPLE_WORDS[(i + j) % SAMPLE_WORDS.len()]);
        }

        match i % 6 {
            0 => doc.push_str(&format!("# Section {i}\n\n{text}\n\n")),
            1 => doc.push_str(&format!("Some **bold** and *italic* words: {text}\n\n")),
            2 => doc.push_str(&format!("- {text}\n- [a link](https://example.com/{i})\n\n")),
            3 => doc.push_str(&format!("```rust\nfn section_{i}() {{\n    println!(\"{text}\");\n}}\n```\n\n")),
            4 => doc.push_str(&format!("> {text}\n\nInline math $x_{i} + y$ here.\n\n")),
            _ => doc.push_str(&format!("```mermaid\ngraph TD\n  A{i} --> B{i}\n```\n\n")),
        }
    }

    doc
}

/// Per-iteration samples of one measured operation, sorted ascending
struct Timing {
    label: String,
    samples: Vec<Duration>,
}

impl Timing {
    fn measure<T>(label: impl Into<String>, iterations: usize, mut f: impl FnMut() -> T) -> Self {
        for _ in 0..5 {
            black_box(f());
        }

        let mut samples: Vec<Duration> = (0..iterations.max(1))
            .map(|_| {
                let start = Instant::now();
                black_box(f());
                start.elapsed()
            })
            .collect();
        samples.sort();

        Self {
            label: label.into(),
            samples,
        }
    }

    fn mean(&self) -> Duration {
        self.samples.iter().sum::<Duration>() / self.samples.len() as u32
    }

    fn median(&self) -> Duration {
        self.samples[self.samples.len() / 2]
    }

    fn worst(&self) -> Duration {
        self.samples[self.samples.len() - 1]
    }

    fn report(&self) {
        println!(
            "{:<52} n={:<5} mean {:>11.2?}  median {:>11.2?}  worst {:>11.2?}",
            self.label,
            self.samples.len(),
            self.mean(),
            self.median(),
            self.worst()
        );

        // Every keystroke re-runs these, so a frame is the budget
        if self.median() > FRAME_BUDGET {
            println!("  ⚠️  median exceeds one frame ({FRAME_BUDGET:?}) per keystroke");
        }
    }
}

fn sample_documents() -> Vec<(&'static str, String)> {
    vec![
        (
            "Small (10 sections)",
            create_test_markdown(SMALL_DOC_SECTIONS, 20),
        ),
        (
            "Medium (100 sections)",
            create_test_markdown(MEDIUM_DOC_SECTIONS, 20),
        ),
        (
            "Large (1000 sections)",
            create_test_markdown(LARGE_DOC_SECTIONS, 20),
        ),
    ]
}

fn section(title: &str) {
    println!("\n{title}\n{}", "-".repeat(title.chars().count()));
}

#[test]
fn bench_plain_projection() {
    section("Plain projection");

    for (name, doc) in sample_documents() {
        Timing::measure(format!("to_plain - {name}"), ITERATIONS, || to_plain(&doc)).report();
    }
}

#[test]
fn bench_rendering() {
    section("HTML rendering");

    let bare = RenderPipeline::bare();
    let full = RenderPipeline::from_config(&RenderConfig::default());

    for (name, doc) in sample_documents() {
        let iterations = if name.contains("Large") { 10 } else { ITERATIONS };

        let without = Timing::measure(format!("render (no passes) - {name}"), iterations, || {
            bare.render(&doc)
        });
        without.report();

        let with = Timing::measure(format!("render (all passes) - {name}"), iterations, || {
            full.render_with_report(&doc)
        });
        with.report();

        let overhead = with.median().as_secs_f64() / without.median().as_secs_f64().max(1e-9);
        println!("  enhancement passes: {overhead:.2}x the bare render");
    }
}

#[test]
fn bench_word_count() {
    section("Status line word count");

    for (name, doc) in sample_documents() {
        let timing = Timing::measure(format!("count_words - {name}"), ITERATIONS, || {
            stats::count_words(&doc)
        });
        timing.report();
    }
}

#[test]
fn bench_cursor_position() {
    section("Cursor position at end of buffer");

    for (name, doc) in sample_documents() {
        let buffer = TextBuffer::new(doc);
        Timing::measure(
            format!("cursor_position - {name}"),
            ITERATIONS * 10,
            || buffer.cursor_position(),
        )
        .report();
    }
}
