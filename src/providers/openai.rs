use anyhow::{anyhow, Context, Result};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use super::{
    base::{Provider, TextStream},
    configs::openai::OpenAiProviderConfig,
    types::message::Message,
    utils::{
        check_openai_context_length_error, messages_to_openai_spec, openai_response_to_text,
        parse_sse_line, LineBuffer, SseEvent,
    },
};

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn payload(model: &str, messages: &[Message], stream: bool) -> Value {
        json!({
            "model": model,
            "messages": messages_to_openai_spec(messages),
            "stream": stream,
        })
    }

    async fn post(&self, payload: &Value) -> Result<Response> {
        let url = format!("{}/v1/chat/completions", self.config.host);
        tracing::debug!(%url, "posting chat completion");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(payload)
            .send()
            .await
            .context("Failed to send request to the completion API")?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status => {
                let body: Value = response.json().await.unwrap_or(Value::Null);
                if let Some(err) = body.get("error").and_then(check_openai_context_length_error) {
                    return Err(err.into());
                }
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    // Implement retry logic here if needed
                    return Err(anyhow!("Server error: {}", status));
                }
                Err(anyhow!("Request failed: {}\nResponse: {}", status, body))
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(&self, model: &str, messages: &[Message]) -> Result<String> {
        let response: Value = self
            .post(&Self::payload(model, messages, false))
            .await?
            .json()
            .await
            .context("Failed to decode completion response")?;

        // Raise specific error if context length is exceeded
        if let Some(error) = response.get("error") {
            if let Some(err) = check_openai_context_length_error(error) {
                return Err(err.into());
            }
            return Err(anyhow!("OpenAI API error: {}", error));
        }

        openai_response_to_text(&response)
    }

    async fn stream(&self, model: &str, messages: &[Message]) -> Result<TextStream> {
        let response = self.post(&Self::payload(model, messages, true)).await?;
        let mut bytes = response.bytes_stream();

        let stream = stream! {
            let mut lines = LineBuffer::new();
            let mut tail = None;
            'read: loop {
                let chunk = match bytes.next().await {
                    Some(Ok(chunk)) => chunk,
                    Some(Err(e)) => {
                        yield Err(anyhow::Error::new(e).context("Failed to read stream chunk"));
                        return;
                    }
                    None => {
                        tail = lines.finish();
                        break;
                    }
                };
                for line in lines.push(&chunk) {
                    match parse_sse_line(&line) {
                        Ok(Some(SseEvent::Done)) => break 'read,
                        Ok(Some(SseEvent::Delta(text))) if !text.is_empty() => {
                            yield Ok(text);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
            // A final data line without a trailing newline
            if let Some(line) = tail {
                if let Ok(Some(SseEvent::Delta(text))) = parse_sse_line(&line) {
                    if !text.is_empty() {
                        yield Ok(text);
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use mockito::Server;

    fn provider_for(server: &Server) -> OpenAiProvider {
        OpenAiProvider::new(OpenAiProviderConfig::new(
            "test_api_key".to_string(),
            server.url(),
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_complete_basic() -> Result<()> {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test_api_key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": "chatcmpl-123",
                    "object": "chat.completion",
                    "choices": [{
                        "index": 0,
                        "message": {
                            "role": "assistant",
                            "content": "Hello! How can I assist you today?"
                        },
                        "finish_reason": "stop"
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let provider = provider_for(&server);
        let reply = provider
            .complete("o1-preview", &[Message::user("Hello?")])
            .await?;

        assert_eq!(reply, "Hello! How can I assist you today?");
        mock.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_stream_yields_fragments_until_done() -> Result<()> {
        let body = [
            r#"data: {"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#,
            r#"data: {"choices":[{"index":0,"delta":{"content":"Let me "}}]}"#,
            r#"data: {"choices":[{"index":0,"delta":{"content":"check."}}]}"#,
            "data: [DONE]",
            r#"data: {"choices":[{"index":0,"delta":{"content":"ignored"}}]}"#,
        ]
        .join("\n\n");

        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let provider = provider_for(&server);
        let stream = provider
            .stream("gpt-4o-mini", &[Message::user("weather?")])
            .await?;
        let fragments: Vec<String> = stream.try_collect().await?;

        assert_eq!(fragments, vec!["Let me ", "check."]);
        Ok(())
    }

    #[tokio::test]
    async fn test_context_length_error() -> Result<()> {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "error": {
                        "code": "context_length_exceeded",
                        "message": "This message is too long"
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let provider = provider_for(&server);
        let err = provider
            .complete("gpt-4o-mini", &[Message::user("long")])
            .await
            .unwrap_err();

        assert!(err
            .to_string()
            .starts_with("Input message too long. Message: This message is too long"));
        Ok(())
    }

    #[tokio::test]
    async fn test_server_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .create_async()
            .await;

        let provider = provider_for(&server);
        let result = provider.stream("gpt-4o-mini", &[Message::user("hi")]).await;

        assert!(result.is_err());
        assert!(result
            .err()
            .unwrap()
            .to_string()
            .contains("Server error: 503"));
    }
}
