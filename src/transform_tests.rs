use super::*;

#[test]
fn heading_and_emphasis_are_stripped() {
    assert_eq!(
        to_plain("# Title\n\n**bold** and *italic*"),
        "Title\n\nbold and italic"
    );
}

#[test]
fn fenced_code_keeps_body_and_drops_fences() {
    assert_eq!(to_plain("```js\nconst x=1;\n```"), "\nconst x=1;\n");
}

#[test]
fn fenced_code_body_is_not_stripped_further() {
    let markdown = "```\n# not a heading\n*x* and `y`\n```\n# Real";
    assert_eq!(to_plain(markdown), "\n# not a heading\n*x* and `y`\n\nReal");
}

#[test]
fn inline_triple_backticks_keep_their_text() {
    assert_eq!(to_plain("a ```b``` c"), "a b c");
}

#[test]
fn unterminated_fence_only_loses_backticks() {
    assert_eq!(to_plain("```rust\nfn main()"), "rust\nfn main()");
}

#[test]
fn images_keep_alt_text() {
    assert_eq!(
        to_plain("See ![a cat](http://x/cat.png) here"),
        "See a cat here"
    );
    assert_eq!(to_plain("![](data:image/png;base64,AAAA)"), "");
}

#[test]
fn links_keep_label() {
    assert_eq!(
        to_plain("Visit [the site](https://example.com)."),
        "Visit the site."
    );
}

#[test]
fn all_heading_levels_are_stripped() {
    assert_eq!(to_plain("## Two\n###### Six"), "Two\nSix");
}

#[test]
fn blockquote_markers_are_stripped() {
    assert_eq!(to_plain("> quoted\n>tight\n  > indented"), "quoted\ntight\nindented");
}

#[test]
fn list_markers_are_stripped() {
    let markdown = "- one\n* two\n+ three\n1. first\n10. tenth";
    assert_eq!(to_plain(markdown), "one\ntwo\nthree\nfirst\ntenth");
}

#[test]
fn bullet_marker_requires_following_space() {
    assert_eq!(to_plain("-5 degrees"), "-5 degrees");
}

#[test]
fn inline_code_loses_backticks() {
    assert_eq!(to_plain("Use `cargo build` now"), "Use cargo build now");
}

#[test]
fn underscore_emphasis_is_stripped() {
    assert_eq!(to_plain("__strong__ and _em_"), "strong and em");
}

#[test]
fn strong_runs_before_single_emphasis() {
    assert_eq!(to_plain("**a** and **b**"), "a and b");
    assert_eq!(to_plain("***both***"), "both");
}

#[test]
fn empty_input_yields_empty_output() {
    assert_eq!(to_plain(""), "");
    assert_eq!(to_markdown(""), "");
}

#[test]
fn plain_text_is_a_fixed_point() {
    let text = "Just some words.\nAnother line, with a comma.";
    let once = to_plain(text);
    assert_eq!(once, text);
    assert_eq!(to_plain(&once), once);
}

#[test]
fn no_line_starts_with_markdown_syntax() {
    let markdown = "# Heading\n\n> quote with **bold**\n\n- item one\n* item two\n3. item three\n\n`code` and _em_";
    let plain = to_plain(markdown);
    for line in plain.lines() {
        let trimmed = line.trim_start();
        for marker in ["#", "*", "_", "`", "- ", "+ ", ">"] {
            assert!(
                !trimmed.starts_with(marker),
                "line {line:?} starts with {marker:?}"
            );
        }
        assert!(!plain.contains('`'));
    }
}

#[test]
fn plain_edits_are_taken_back_verbatim() {
    let text = "# kept *as is* [x](y)";
    assert_eq!(to_markdown(text), text);
}
