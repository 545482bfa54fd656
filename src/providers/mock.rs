use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream;
use std::sync::{Arc, Mutex};

use super::base::{Provider, TextStream};
use super::types::message::Message;

/// One pre-configured reply of a [`MockProvider`].
#[derive(Debug, Clone)]
pub struct MockReply {
    chunks: Vec<String>,
    fail_after: Option<usize>,
}

impl MockReply {
    /// A reply delivered as the given stream fragments, or concatenated when
    /// requested without streaming.
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            fail_after: None,
        }
    }

    pub fn text(text: &str) -> Self {
        Self::chunks([text])
    }

    /// Fail the request after `n` fragments have been delivered.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }
}

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    replies: Arc<Mutex<Vec<MockReply>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of replies
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every message list this provider has been asked to complete, in order.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self, messages: &[Message]) -> Result<MockReply> {
        self.requests
            .lock()
            .map_err(|_| anyhow!("mock provider lock poisoned"))?
            .push(messages.to_vec());

        let mut replies = self
            .replies
            .lock()
            .map_err(|_| anyhow!("mock provider lock poisoned"))?;
        if replies.is_empty() {
            // Return empty reply if no more pre-configured replies
            Ok(MockReply::chunks(Vec::<String>::new()))
        } else {
            Ok(replies.remove(0))
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, _model: &str, messages: &[Message]) -> Result<String> {
        let reply = self.next_reply(messages)?;
        if reply.fail_after.is_some() {
            return Err(anyhow!("mock completion failure"));
        }
        Ok(reply.chunks.concat())
    }

    async fn stream(&self, _model: &str, messages: &[Message]) -> Result<TextStream> {
        let reply = self.next_reply(messages)?;
        let delivered = reply.fail_after.unwrap_or(reply.chunks.len());

        let mut items: Vec<Result<String>> = reply
            .chunks
            .into_iter()
            .take(delivered)
            .map(Ok)
            .collect();
        if reply.fail_after.is_some() {
            items.push(Err(anyhow!("mock stream interrupted")));
        }

        Ok(Box::pin(stream::iter(items)))
    }
}
