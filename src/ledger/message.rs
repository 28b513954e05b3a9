use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::ChatRole;

/// Whether a turn was sent by the user or received from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

/// Streaming lifecycle of a turn.
///
/// `Completed` and `Canceled` are mutually exclusive terminal states; a
/// terminal turn accepts no further fragments and never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageState {
    #[default]
    Streaming,
    Completed,
    Canceled,
}

/// A single conversation turn, owned and mutated exclusively by the
/// [`MessageLedger`](super::MessageLedger).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    id: Uuid,
    role: ChatRole,
    direction: Direction,
    fragments: Vec<String>,
    original: Option<String>,
    state: MessageState,
    created_at: DateTime<Utc>,
}

impl Message {
    fn build(
        role: ChatRole,
        direction: Direction,
        fragments: Vec<String>,
        original: Option<String>,
        state: MessageState,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            direction,
            fragments,
            original,
            state,
            created_at: Utc::now(),
        }
    }

    /// A user turn carrying `text`. Sent turns never stream, so they are
    /// completed on creation.
    pub fn sent(text: impl Into<String>) -> Self {
        Self::build(
            ChatRole::User,
            Direction::Sent,
            vec![text.into()],
            None,
            MessageState::Completed,
        )
    }

    /// A user turn whose text was rendered through a template, retaining
    /// the pre-template input.
    pub fn sent_with_original(rendered: impl Into<String>, original: impl Into<String>) -> Self {
        Self::build(
            ChatRole::User,
            Direction::Sent,
            vec![rendered.into()],
            Some(original.into()),
            MessageState::Completed,
        )
    }

    /// An empty receiving turn awaiting stream fragments.
    pub fn received() -> Self {
        Self::build(
            ChatRole::Assistant,
            Direction::Received,
            Vec::new(),
            None,
            MessageState::Streaming,
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> ChatRole {
        self.role
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The append-only fragment sequence.
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// The pre-template input, if a template was applied.
    pub fn original(&self) -> Option<&str> {
        self.original.as_deref()
    }

    pub fn state(&self) -> MessageState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The rendered text: all fragments concatenated in arrival order.
    pub fn text(&self) -> String {
        self.fragments.concat()
    }

    pub fn is_completed(&self) -> bool {
        self.state == MessageState::Completed
    }

    pub fn is_canceled(&self) -> bool {
        self.state == MessageState::Canceled
    }

    pub fn is_terminal(&self) -> bool {
        self.state != MessageState::Streaming
    }

    /// Appends a fragment. Returns false if the turn is already terminal.
    pub(super) fn push_fragment(&mut self, text: &str) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.fragments.push(text.to_string());
        true
    }

    pub(super) fn complete(&mut self) {
        if self.state == MessageState::Streaming {
            self.state = MessageState::Completed;
        }
    }

    pub(super) fn cancel(&mut self) {
        if self.state == MessageState::Streaming {
            self.state = MessageState::Canceled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn received_turn_starts_streaming_and_empty() {
        let msg = Message::received();
        assert_eq!(msg.state(), MessageState::Streaming);
        assert!(msg.text().is_empty());
        assert_eq!(msg.role(), ChatRole::Assistant);
        assert_eq!(msg.direction(), Direction::Received);
    }

    #[test]
    fn sent_turn_is_terminal_on_creation() {
        let msg = Message::sent("hello");
        assert!(msg.is_completed());
        assert_eq!(msg.text(), "hello");
    }

    #[test]
    fn terminal_states_are_mutually_exclusive() {
        let mut msg = Message::received();
        msg.cancel();
        assert!(msg.is_canceled());

        // A canceled turn stays canceled.
        msg.complete();
        assert!(msg.is_canceled());
        assert!(!msg.is_completed());
    }

    #[test]
    fn terminal_turn_rejects_fragments() {
        let mut msg = Message::received();
        assert!(msg.push_fragment("a"));
        msg.complete();
        assert!(!msg.push_fragment("b"));
        assert_eq!(msg.text(), "a");
    }

    #[test]
    fn original_text_survives_templating() {
        let msg = Message::sent_with_original("Act as a translator: hi", "hi");
        assert_eq!(msg.original(), Some("hi"));
        assert_eq!(msg.text(), "Act as a translator: hi");
    }
}
