use std::fmt;

use super::message::Message;

/// Listener invoked with the full snapshot after a mutation batch completes.
pub type LedgerListener = Box<dyn Fn(&[Message]) + Send + Sync>;

/// Listener invoked after the ledger is cleared.
pub type ClearedListener = Box<dyn Fn() + Send + Sync>;

/// Ordered record of conversation turns with batch-mutation hooks.
///
/// The ledger is the sole mutator of its messages: streaming state changes
/// go through [`append_fragment`](Self::append_fragment),
/// [`complete_last`](Self::complete_last) and
/// [`cancel_last`](Self::cancel_last). At most one turn is non-terminal at
/// a time, since each streamer invocation appends exactly one receiving
/// turn.
#[derive(Default)]
pub struct MessageLedger {
    messages: Vec<Message>,
    on_mutated: Option<LedgerListener>,
    on_cleared: Option<ClearedListener>,
}

impl MessageLedger {
    /// Creates a ledger without listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ledger that notifies the given listeners.
    pub fn with_listeners(on_mutated: LedgerListener, on_cleared: ClearedListener) -> Self {
        Self {
            messages: Vec::new(),
            on_mutated: Some(on_mutated),
            on_cleared: Some(on_cleared),
        }
    }

    /// Adds a turn at the end. Does not notify.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Appends `text` to the last turn's fragment sequence.
    ///
    /// No-op on an empty ledger; a terminal last turn drops the fragment.
    pub fn append_fragment(&mut self, text: &str) {
        let Some(last) = self.messages.last_mut() else {
            return;
        };
        if !last.push_fragment(text) {
            log::debug!("dropping fragment for terminal message {}", last.id());
        }
    }

    /// Marks the last turn completed (a canceled turn stays canceled), then
    /// notifies the mutation listener with the full snapshot.
    pub fn complete_last(&mut self) {
        if let Some(last) = self.messages.last_mut() {
            last.complete();
        }
        if let Some(listener) = &self.on_mutated {
            listener(&self.messages);
        }
    }

    /// Cancels the last turn if it is still streaming. The streamer's stop
    /// check observes this through [`is_last_canceled`](Self::is_last_canceled)
    /// at its next chunk boundary.
    pub fn cancel_last(&mut self) {
        if let Some(last) = self.messages.last_mut() {
            last.cancel();
        }
    }

    /// True iff a last turn exists and was canceled.
    pub fn is_last_canceled(&self) -> bool {
        self.messages.last().map(Message::is_canceled).unwrap_or(false)
    }

    /// Empties the ledger and notifies the cleared listener.
    pub fn clear(&mut self) {
        self.messages.clear();
        if let Some(listener) = &self.on_cleared {
            listener();
        }
    }

    pub fn has_any(&self) -> bool {
        !self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Chronological snapshot of all turns.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Replaces the contents with a previously persisted snapshot.
    /// Does not notify.
    pub fn restore(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }
}

impl fmt::Debug for MessageLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageLedger")
            .field("messages", &self.messages)
            .field("on_mutated", &self.on_mutated.is_some())
            .field("on_cleared", &self.on_cleared.is_some())
            .finish()
    }
}
