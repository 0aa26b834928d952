//! Server-sent event reading shared by all providers.

use futures_util::StreamExt;

use super::provider::{Provider, StreamEvent};
use super::Prompt;
use crate::error::{Error, Result};
use crate::http::HttpClient;

/// Splits a byte stream into lines. A line cut across two reads is held
/// back until its newline (or the end of the stream) arrives.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a read and return every line it completed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&line[..line.len() - 1]));
        }
        lines
    }

    /// The unterminated tail, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = decode_line(&self.pending);
        self.pending.clear();
        Some(line)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Payload of a `data:` line; other SSE fields and comments are `None`.
pub fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

/// Stream one completion, handing each text delta to `on_chunk` as it
/// arrives. Returns the concatenated text once the provider finishes.
pub async fn stream_complete(
    http: &dyn HttpClient,
    provider: Provider,
    prompt: &Prompt,
    credential: &str,
    model: &str,
    on_chunk: &mut (dyn FnMut(&str) + Send),
) -> Result<String> {
    let request = provider.build_request(prompt, credential, model);
    let response = http
        .post_stream(request)
        .await
        .map_err(|e| transport_error(provider, e))?;

    if !response.is_success() {
        let status = response.status;
        let body = response.text().await.unwrap_or_default();
        let message = provider
            .error_message(&body)
            .unwrap_or_else(|| format!("API error: {status}"));
        tracing::warn!(%provider, status, %message, "Completion request rejected");
        return Err(Error::Provider {
            provider,
            status: Some(status),
            message,
        });
    }

    let mut body = response.body;
    let mut lines = LineBuffer::new();
    let mut full = String::new();

    while let Some(read) = body.next().await {
        let bytes = read.map_err(|e| transport_error(provider, e))?;
        for line in lines.push(&bytes) {
            if handle_line(provider, &line, &mut full, on_chunk)? {
                return Ok(full);
            }
        }
    }
    if let Some(line) = lines.finish() {
        handle_line(provider, &line, &mut full, on_chunk)?;
    }

    tracing::debug!(%provider, chars = full.len(), "Completion stream ended");
    Ok(full)
}

/// Returns `true` once the provider signalled completion.
fn handle_line(
    provider: Provider,
    line: &str,
    full: &mut String,
    on_chunk: &mut (dyn FnMut(&str) + Send),
) -> Result<bool> {
    let Some(payload) = data_payload(line) else {
        return Ok(false);
    };
    match provider.decode_payload(payload) {
        StreamEvent::Delta(text) => {
            on_chunk(&text);
            full.push_str(&text);
            Ok(false)
        }
        StreamEvent::Done => Ok(true),
        StreamEvent::Failed(message) => Err(Error::Provider {
            provider,
            status: None,
            message,
        }),
        StreamEvent::Ignore => {
            tracing::trace!(%provider, payload, "Skipped stream payload");
            Ok(false)
        }
    }
}

fn transport_error(provider: Provider, error: Error) -> Error {
    Error::Provider {
        provider,
        status: None,
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::ChatMessage;
    use crate::test_support::FakeHttp;
    use pretty_assertions::assert_eq;

    fn prompt() -> Prompt {
        Prompt {
            system: "sys".into(),
            messages: vec![ChatMessage::user("hello")],
        }
    }

    async fn run(http: &FakeHttp, provider: Provider) -> (Result<String>, Vec<String>) {
        let mut chunks = Vec::new();
        let result = stream_complete(http, provider, &prompt(), "key", "model", &mut |c: &str| {
            chunks.push(c.to_string())
        })
        .await;
        (result, chunks)
    }

    #[test]
    fn line_buffer_carries_partial_lines() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.push(b"data: ab"), Vec::<String>::new());
        assert_eq!(buf.push(b"c\r\ndata: d\n\nda"), vec!["data: abc", "data: d", ""]);
        assert_eq!(buf.finish().as_deref(), Some("da"));
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn only_data_lines_have_payloads() {
        assert_eq!(data_payload("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(data_payload("data:[DONE]"), Some("[DONE]"));
        assert_eq!(data_payload("event: message_start"), None);
        assert_eq!(data_payload(": keep-alive"), None);
    }

    #[tokio::test]
    async fn deltas_split_mid_line_are_reassembled() {
        let http = FakeHttp::new();
        http.push_stream(
            200,
            &[
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hel",
                "lo\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n",
                "data: [DONE]\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n",
            ],
        );

        let (result, chunks) = run(&http, Provider::OpenAI).await;
        assert_eq!(result.unwrap(), "Hello world");
        assert_eq!(chunks, vec!["Hello", " world"]);
    }

    #[tokio::test]
    async fn gemini_stream_ends_at_eof_with_unterminated_tail() {
        let http = FakeHttp::new();
        http.push_stream(
            200,
            &[
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"One \"}]}}]}\r\n\r\n",
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"two\"}]}}]}",
            ],
        );

        let (result, chunks) = run(&http, Provider::Gemini).await;
        assert_eq!(result.unwrap(), "One two");
        assert_eq!(chunks.len(), 2);
    }

    #[tokio::test]
    async fn anthropic_events_and_noise() {
        let http = FakeHttp::new();
        http.push_stream(
            200,
            &[
                "event: message_start\ndata: {\"type\":\"message_start\"}\n\n",
                "data: not-json\n",
                "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"Sum\"}}\n",
                "data: {\"type\":\"message_stop\"}\n",
            ],
        );

        let (result, chunks) = run(&http, Provider::Anthropic).await;
        assert_eq!(result.unwrap(), "Sum");
        assert_eq!(chunks, vec!["Sum"]);
    }

    #[tokio::test]
    async fn non_success_status_reports_provider_message() {
        let http = FakeHttp::new();
        http.push_stream(401, &[r#"{"error":{"message":"Invalid API key"}}"#]);

        let (result, chunks) = run(&http, Provider::Groq).await;
        match result {
            Err(Error::Provider {
                provider,
                status,
                message,
            }) => {
                assert_eq!(provider, Provider::Groq);
                assert_eq!(status, Some(401));
                assert_eq!(message, "Invalid API key");
            }
            other => panic!("expected provider error, got {other:?}"),
        }
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn unreadable_error_body_falls_back_to_status() {
        let http = FakeHttp::new();
        http.push_stream(503, &["<html>busy</html>"]);

        let (result, _) = run(&http, Provider::OpenAI).await;
        assert!(matches!(
            result,
            Err(Error::Provider { status: Some(503), ref message, .. }) if message == "API error: 503"
        ));
    }

    #[tokio::test]
    async fn dropped_connection_is_error_after_partial_output() {
        let http = FakeHttp::new();
        http.push_broken_stream(&["data: {\"choices\":[{\"delta\":{\"content\":\"Part\"}}]}\n"]);

        let (result, chunks) = run(&http, Provider::OpenAI).await;
        assert_eq!(chunks, vec!["Part"]);
        assert!(matches!(result, Err(Error::Provider { status: None, .. })));
    }

    #[tokio::test]
    async fn in_stream_error_payload_fails() {
        let http = FakeHttp::new();
        http.push_stream(
            200,
            &["data: {\"type\":\"error\",\"error\":{\"message\":\"Overloaded\"}}\n"],
        );

        let (result, _) = run(&http, Provider::Anthropic).await;
        assert!(matches!(
            result,
            Err(Error::Provider { ref message, .. }) if message == "Overloaded"
        ));
    }
}
