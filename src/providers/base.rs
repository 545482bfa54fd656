use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

use super::types::message::Message;

/// A stream of text fragments, ending when the completion source signals end-of-stream.
pub type TextStream = BoxStream<'static, Result<String>>;

/// Base trait for completion sources (OpenAI and compatible endpoints, mocks)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Request the whole reply in one payload
    async fn complete(&self, model: &str, messages: &[Message]) -> Result<String>;

    /// Request the reply as incremental text fragments
    async fn stream(&self, model: &str, messages: &[Message]) -> Result<TextStream>;
}
