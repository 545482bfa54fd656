use anyhow::{Context, Result};
use futures::StreamExt;
use tracing::{debug, info};

use crate::processor::ToolStreamProcessor;
use crate::prompt::system_prompt;
use crate::providers::base::Provider;
use crate::providers::models::ModelProfile;
use crate::providers::types::message::{create_object_id, Message};
use crate::session::Conversation;
use crate::tool::ToolRegistry;

/// What a call to [`Chat::send`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The prompt was blank; nothing was sent.
    Skipped,
    /// The reply finished; `content` is what the transcript now shows.
    Completed {
        content: String,
        tool_invocations: usize,
    },
}

/// Drives turns: sends the conversation to the completion source, runs the
/// reply through the tool processor and keeps the transcript up to date.
pub struct Chat<P: Provider> {
    provider: P,
    tools: ToolRegistry,
    conversation: Conversation,
    system_prompt: String,
}

impl<P: Provider> Chat<P> {
    pub fn new(provider: P, tools: ToolRegistry) -> Self {
        let system_prompt = system_prompt(&tools);
        Self {
            provider,
            tools,
            conversation: Conversation::new(),
            system_prompt,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn history(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn clear(&mut self) -> bool {
        self.conversation.clear()
    }

    pub fn recall_last_user_input(&self) -> Option<&str> {
        self.conversation.recall_last_user_input()
    }

    /// Run one turn for `text`. `on_update` receives the display text after
    /// every received fragment and once more when the reply is complete.
    ///
    /// If the completion source fails, the assistant message keeps whatever
    /// it had shown so far and the error is returned.
    pub async fn send<F>(
        &mut self,
        text: &str,
        model: &ModelProfile,
        mut on_update: F,
    ) -> Result<TurnOutcome>
    where
        F: FnMut(&str),
    {
        self.conversation.begin_turn()?;
        if !self.conversation.append_user_message(text) {
            self.conversation.end_turn();
            return Ok(TurnOutcome::Skipped);
        }

        let turn_id = create_object_id("turn");
        info!(turn = %turn_id, model = %model.name, stream = model.stream, "starting turn");

        let request = self
            .conversation
            .request_messages(&self.system_prompt, model.preamble);
        self.conversation.append_placeholder_assistant_message();

        let mut processor = ToolStreamProcessor::new(self.tools.clone());
        let result = self
            .consume(model, &request, &mut processor, &mut on_update)
            .await;
        self.conversation.end_turn();

        let content = result?;
        info!(
            turn = %turn_id,
            tool_invocations = processor.invocations(),
            "turn complete"
        );
        Ok(TurnOutcome::Completed {
            content,
            tool_invocations: processor.invocations(),
        })
    }

    async fn consume<F>(
        &mut self,
        model: &ModelProfile,
        request: &[Message],
        processor: &mut ToolStreamProcessor,
        on_update: &mut F,
    ) -> Result<String>
    where
        F: FnMut(&str),
    {
        let display = if model.stream {
            let mut fragments = self
                .provider
                .stream(&model.name, request)
                .await
                .context("Completion request failed")?;

            let mut raw = String::new();
            while let Some(fragment) = fragments.next().await {
                raw.push_str(&fragment.context("Completion stream failed")?);
                let display = processor.process(&raw, false).await;
                self.show(&display, on_update)?;
            }
            debug!(chars = raw.len(), "stream finished");
            processor.process(&raw, true).await
        } else {
            let raw = self
                .provider
                .complete(&model.name, request)
                .await
                .context("Completion request failed")?;
            processor.process(&raw, true).await
        };

        self.show(&display, on_update)?;
        Ok(display)
    }

    fn show<F>(&mut self, display: &str, on_update: &mut F) -> Result<()>
    where
        F: FnMut(&str),
    {
        self.conversation.update_last_assistant_content(display)?;
        on_update(display);
        Ok(())
    }
}
