use std::sync::Mutex;

use super::*;

struct EchoClient {
    prompts: Arc<Mutex<Vec<String>>>,
}

impl CompletionClient for EchoClient {
    fn complete(&self, prompt: &str) -> Result<String, RemoteError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(format!("remote says: {}", prompt.len()))
    }
}

struct DownClient;

impl CompletionClient for DownClient {
    fn complete(&self, _prompt: &str) -> Result<String, RemoteError> {
        Err(RemoteError::Transport("connection refused".to_string()))
    }
}

fn local(action: AssistantAction, instruction: &str, selection: &str) -> String {
    Assistant::local().dispatch(&AssistantRequest::new(action, instruction, selection))
}

#[test]
fn summarize_takes_first_three_sentences() {
    assert_eq!(
        local(AssistantAction::Summarize, "", "One. Two. Three. Four."),
        "One. Two. Three."
    );
}

#[test]
fn summarize_splits_on_all_terminators() {
    assert_eq!(
        local(
            AssistantAction::Summarize,
            "",
            "Really?  Yes!\nIndeed. Not this."
        ),
        "Really? Yes! Indeed."
    );
}

#[test]
fn summarize_keeps_unterminated_tail_segment() {
    assert_eq!(local(AssistantAction::Summarize, "", "One. two"), "One. two");
}

#[test]
fn summarize_without_boundary_truncates() {
    let long = "x".repeat(250);
    let summary = local(AssistantAction::Summarize, "", &long);
    assert_eq!(summary.chars().count(), 201);
    assert!(summary.ends_with('…'));

    assert_eq!(local(AssistantAction::Summarize, "", "short"), "short");
    assert_eq!(local(AssistantAction::Summarize, "", "3.14 is pi"), "3.14 is pi");
}

#[test]
fn summarize_prefixes_instruction() {
    assert_eq!(
        local(AssistantAction::Summarize, "brief", "One. Two."),
        "(brief)\n\nOne. Two."
    );
}

#[test]
fn expand_appends_marker_line() {
    assert_eq!(
        local(AssistantAction::Expand, "", "Base."),
        "Base.\n\nAdditional detail: — Add more content here.\n"
    );
    assert_eq!(
        local(AssistantAction::Expand, "Examples: ", "Base."),
        "Base.\n\nExamples:— Add more content here.\n"
    );
}

#[test]
fn rewrite_collapses_lines() {
    assert_eq!(
        local(AssistantAction::Rewrite, "", "  first line \nsecond\n\tthird"),
        "first line second third\n\n(Rewritten: polished)"
    );
    assert_eq!(
        local(AssistantAction::Rewrite, "formal", "a"),
        "a\n\n(Rewritten: formal)"
    );
}

#[test]
fn extract_headings_lists_heading_text() {
    let source = "# Title\ntext\n## Section *one*\n###### Deep\nnot # a heading";
    assert_eq!(
        local(AssistantAction::ExtractHeadings, "", source),
        "Title\nSection *one*\nDeep"
    );
}

#[test]
fn extract_headings_reports_none() {
    assert_eq!(
        local(AssistantAction::ExtractHeadings, "", "plain text only"),
        NO_HEADINGS
    );
    assert_eq!(local(AssistantAction::ExtractHeadings, "", ""), NO_HEADINGS);
}

#[test]
fn unknown_action_name_gets_fixed_reply() {
    let assistant = Assistant::local();
    assert_eq!(assistant.dispatch_named("translate", "", "x"), UNKNOWN_ACTION);
    assert_eq!(
        assistant.dispatch_named("extract_headings", "", "# A"),
        "A"
    );
    assert_eq!(assistant.dispatch_named("extractHeadings", "", "# B"), "B");
}

#[test]
fn remote_reply_is_returned_verbatim() {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let assistant = Assistant::with_client(EchoClient {
        prompts: Arc::clone(&prompts),
    });
    assert!(assistant.is_remote());

    let request = AssistantRequest::new(AssistantAction::Rewrite, "shorter", "Some text");
    let reply = assistant.dispatch(&request);
    assert_eq!(reply, format!("remote says: {}", request.prompt().len()));
    assert_eq!(
        *prompts.lock().unwrap(),
        vec!["rewrite: shorter\n\nSome text".to_string()]
    );
}

#[test]
fn remote_failure_becomes_output_text() {
    let assistant = Assistant::with_client(DownClient);
    let reply = assistant.dispatch(&AssistantRequest::new(
        AssistantAction::Summarize,
        "",
        "One. Two.",
    ));
    assert_eq!(reply, "OpenAI call failed: connection refused");
}

#[test]
fn selection_defaults_to_whole_source() {
    assert_eq!(resolve_selection(None, "all"), "all");
    assert_eq!(resolve_selection(Some(""), "all"), "all");
    assert_eq!(resolve_selection(Some("part"), "all"), "part");
}

#[test]
fn actions_cycle_and_parse() {
    assert_eq!(
        AssistantAction::Summarize.cycle(-1),
        AssistantAction::ExtractHeadings
    );
    assert_eq!(
        AssistantAction::ExtractHeadings.cycle(1),
        AssistantAction::Summarize
    );
    for action in AssistantAction::ALL {
        assert_eq!(action.as_str().parse::<AssistantAction>(), Ok(action));
    }
}

#[test]
fn unknown_action_names_the_input() {
    let err = "translate".parse::<AssistantAction>().unwrap_err();
    assert_eq!(err, UnknownAction("translate".to_string()));
    assert_eq!(err.to_string(), "unknown assistant action \"translate\"");
    let boxed: Box<dyn std::error::Error> = Box::new(err);
    assert!(boxed.source().is_none());
}
