use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use super::types::message::Message;

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| {
            json!({
                "role": message.role,
                "content": message.content,
            })
        })
        .collect()
}

/// Pull the reply text out of a non-streaming chat completion.
/// A reply with a null or missing content field is an empty reply, not an error.
pub fn openai_response_to_text(response: &Value) -> Result<String> {
    let message = response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| anyhow!("No choices in response: {}", response))?;

    Ok(message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string())
}

/// One parsed server-sent-event line of a streamed chat completion.
#[derive(Debug, PartialEq, Eq)]
pub enum SseEvent {
    /// A content fragment, possibly empty (role-only or finish chunks).
    Delta(String),
    /// The `[DONE]` terminator.
    Done,
}

/// Parse a single SSE line. Comments, blank lines and non-`data` fields yield `None`.
pub fn parse_sse_line(line: &str) -> Result<Option<SseEvent>> {
    let line = line.trim_end_matches('\r');
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim_start();

    if data == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }

    let chunk: Value = serde_json::from_str(data)
        .map_err(|e| anyhow!("Malformed stream chunk ({}): {}", e, data))?;

    if let Some(error) = chunk.get("error") {
        return Err(anyhow!("OpenAI API error: {}", error));
    }

    let delta = chunk
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default();

    Ok(Some(SseEvent::Delta(delta.to_string())))
}

/// Accumulates raw network bytes and hands back complete lines.
/// Network chunks split SSE lines at arbitrary byte offsets, including
/// inside multi-byte characters, so decoding waits for the newline.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
        }
        lines
    }

    /// Whatever is left once the connection closes without a trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Input message too long. Message: {0}")]
pub struct InitialMessageTooLargeError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<InitialMessageTooLargeError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(InitialMessageTooLargeError(message))
    } else {
        None
    }
}
