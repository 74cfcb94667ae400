use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::AssistantConfig;

/// A text-completion service taking one composed prompt.
pub trait CompletionClient {
    fn complete(&self, prompt: &str) -> Result<String, RemoteError>;
}

/// Displays as the text the assistant panel shows in place of a reply.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("OpenAI error: {status} {body}")]
    Status { status: u16, body: String },
    #[error("OpenAI call failed: {0}")]
    Transport(String),
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Chat-completions client. The key lives only as long as the client.
pub struct OpenAiClient {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    max_tokens: u32,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(config: &AssistantConfig, api_key: String) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(60))
            .build();
        Self {
            agent,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_key,
        }
    }
}

impl CompletionClient for OpenAiClient {
    fn complete(&self, prompt: &str) -> Result<String, RemoteError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
        };
        let response = self
            .agent
            .post(&self.endpoint)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(&request);

        match response {
            Ok(response) => {
                let raw = response
                    .into_string()
                    .map_err(|err| RemoteError::Transport(err.to_string()))?;
                reply_text(&raw)
            }
            Err(ureq::Error::Status(status, response)) => Err(RemoteError::Status {
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(transport)) => {
                Err(RemoteError::Transport(transport.to_string()))
            }
        }
    }
}

/// The first choice's message, or the whole reply when it has none.
pub(crate) fn reply_text(raw: &str) -> Result<String, RemoteError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| RemoteError::Transport(format!("unreadable reply: {err}")))?;
    let content = value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|content| !content.is_empty());
    Ok(match content {
        Some(content) => content.to_string(),
        None => value.to_string(),
    })
}
