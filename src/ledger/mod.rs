mod hooked;
mod message;

pub use hooked::{ClearedListener, LedgerListener, MessageLedger};
pub use message::{Direction, Message, MessageState};
