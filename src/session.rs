use crate::errors::ConversationError;
use crate::providers::models::PreamblePlacement;
use crate::providers::types::message::{Message, Role};

/// Ordered message history of one chat, plus the in-flight flag that keeps
/// turns from overlapping.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    in_flight: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a user message. Blank input is ignored and reported with `false`.
    pub fn append_user_message(&mut self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.messages.push(Message::user(text));
        true
    }

    /// Append the empty assistant message that streamed content will fill.
    pub fn append_placeholder_assistant_message(&mut self) {
        self.messages.push(Message::assistant(""));
    }

    /// Replace the content of the most recent assistant message. Each call
    /// supersedes the previous one.
    pub fn update_last_assistant_content(&mut self, text: &str) -> Result<(), ConversationError> {
        let message = self
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .ok_or(ConversationError::NoAssistantMessage)?;

        message.content.clear();
        message.content.push_str(text);
        Ok(())
    }

    /// Empty the history. Refused (returns `false`) while a turn is in flight.
    pub fn clear(&mut self) -> bool {
        if self.is_in_flight() {
            return false;
        }
        self.messages.clear();
        true
    }

    pub fn recall_last_user_input(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn begin_turn(&mut self) -> Result<(), ConversationError> {
        if self.is_in_flight() {
            return Err(ConversationError::TurnInFlight);
        }
        self.in_flight = true;
        Ok(())
    }

    pub fn end_turn(&mut self) {
        self.in_flight = false;
    }

    /// The messages to send for the next completion: the preamble, placed as
    /// the model requires, then the history. A trailing empty assistant
    /// placeholder is the reply being requested and is left out.
    pub fn request_messages(&self, preamble: &str, placement: PreamblePlacement) -> Vec<Message> {
        let history = match self.messages.split_last() {
            Some((last, rest)) if last.role == Role::Assistant && last.is_empty() => rest,
            _ => &self.messages[..],
        };

        let preamble = match placement {
            PreamblePlacement::System => Message::system(preamble),
            PreamblePlacement::User => Message::user(preamble),
        };

        std::iter::once(preamble)
            .chain(history.iter().cloned())
            .collect()
    }
}
