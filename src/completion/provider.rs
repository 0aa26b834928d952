//! Per-provider wire formats.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{ChatMessage, Prompt, Role, MAX_OUTPUT_TOKENS};
use crate::http::HttpRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Groq,
    Gemini,
    Anthropic,
    OpenAI,
}

/// What one streamed `data:` payload means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text to hand to the caller.
    Delta(String),
    /// The provider signalled the end of the response.
    Done,
    /// The provider reported an error inside the stream.
    Failed(String),
    /// Anything else: keep-alives, metadata events, unparsable noise.
    Ignore,
}

impl Provider {
    /// Fallback priority when the preferred provider has no key.
    pub const PRIORITY: [Provider; 4] = [
        Provider::Groq,
        Provider::Gemini,
        Provider::Anthropic,
        Provider::OpenAI,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Provider::Groq => "Groq",
            Provider::Gemini => "Gemini",
            Provider::Anthropic => "Anthropic",
            Provider::OpenAI => "OpenAI",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Groq => "llama-3.3-70b-versatile",
            Provider::Gemini => "gemini-2.0-flash",
            Provider::Anthropic => "claude-3-haiku-20240307",
            Provider::OpenAI => "gpt-4o-mini",
        }
    }

    /// Environment variable consulted when the config has no key.
    pub fn env_key(self) -> &'static str {
        match self {
            Provider::Groq => "GROQ_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }

    pub fn endpoint(self, model: &str) -> String {
        match self {
            Provider::Groq => "https://api.groq.com/openai/v1/chat/completions".into(),
            Provider::Gemini => format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{model}:streamGenerateContent?alt=sse"
            ),
            Provider::Anthropic => "https://api.anthropic.com/v1/messages".into(),
            Provider::OpenAI => "https://api.openai.com/v1/chat/completions".into(),
        }
    }

    fn auth_headers(self, credential: &str) -> Vec<(String, String)> {
        match self {
            Provider::Groq | Provider::OpenAI => {
                vec![("Authorization".into(), format!("Bearer {credential}"))]
            }
            Provider::Gemini => vec![("x-goog-api-key".into(), credential.into())],
            Provider::Anthropic => vec![
                ("x-api-key".into(), credential.into()),
                ("anthropic-version".into(), "2023-06-01".into()),
            ],
        }
    }

    /// The streaming request for `prompt`.
    pub fn build_request(self, prompt: &Prompt, credential: &str, model: &str) -> HttpRequest {
        let body = match self {
            Provider::Groq | Provider::OpenAI => {
                let mut messages = vec![json!({ "role": "system", "content": prompt.system })];
                messages.extend(prompt.messages.iter().map(|m| {
                    json!({ "role": role_name(m.role), "content": m.content })
                }));
                json!({
                    "model": model,
                    "messages": messages,
                    "max_tokens": MAX_OUTPUT_TOKENS,
                    "stream": true,
                })
            }
            Provider::Anthropic => json!({
                "model": model,
                "max_tokens": MAX_OUTPUT_TOKENS,
                "system": prompt.system,
                "messages": prompt
                    .messages
                    .iter()
                    .map(|m| json!({ "role": role_name(m.role), "content": m.content }))
                    .collect::<Vec<_>>(),
                "stream": true,
            }),
            Provider::Gemini => json!({
                "contents": gemini_contents(prompt),
                "generationConfig": { "maxOutputTokens": MAX_OUTPUT_TOKENS },
            }),
        };

        HttpRequest {
            url: self.endpoint(model),
            headers: self.auth_headers(credential),
            body,
        }
    }

    /// Interpret the payload of one `data:` line.
    pub fn decode_payload(self, payload: &str) -> StreamEvent {
        if payload == "[DONE]" && matches!(self, Provider::Groq | Provider::OpenAI) {
            return StreamEvent::Done;
        }
        let Ok(data) = serde_json::from_str::<Value>(payload) else {
            return StreamEvent::Ignore;
        };
        if let Some(message) = reported_error(&data) {
            return StreamEvent::Failed(message);
        }

        let delta = match self {
            Provider::Groq | Provider::OpenAI => data
                .pointer("/choices/0/delta/content")
                .and_then(Value::as_str)
                .map(String::from),
            Provider::Anthropic => match data.get("type").and_then(Value::as_str) {
                Some("content_block_delta") => data
                    .pointer("/delta/text")
                    .and_then(Value::as_str)
                    .map(String::from),
                Some("message_stop") => return StreamEvent::Done,
                _ => None,
            },
            Provider::Gemini => data
                .pointer("/candidates/0/content/parts")
                .and_then(Value::as_array)
                .map(|parts| {
                    parts
                        .iter()
                        .filter_map(|p| p.get("text").and_then(Value::as_str))
                        .collect::<String>()
                }),
        };

        match delta {
            Some(text) if !text.is_empty() => StreamEvent::Delta(text),
            _ => StreamEvent::Ignore,
        }
    }

    /// Message from a non-2xx response body, if it carries one.
    pub fn error_message(self, body: &str) -> Option<String> {
        let data: Value = serde_json::from_str(body).ok()?;
        reported_error(&data)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Gemini has no system role for this endpoint shape: the instruction is
/// fused into the first user turn, and assistant turns are `model`.
fn gemini_contents(prompt: &Prompt) -> Vec<Value> {
    let mut messages: Vec<ChatMessage> = prompt.messages.clone();
    match messages.iter_mut().find(|m| m.role == Role::User) {
        Some(first_user) => {
            first_user.content = format!("{}\n\n{}", prompt.system, first_user.content);
        }
        None => messages.insert(0, ChatMessage::user(prompt.system.clone())),
    }

    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect()
}

/// `{"error": {"message": ...}}` or `{"error": "..."}`; all four providers
/// report errors under `error`.
fn reported_error(data: &Value) -> Option<String> {
    let error = data.get("error").filter(|e| !e.is_null())?;
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map(String::from)
        .or_else(|| Some(error.to_string()))
}
