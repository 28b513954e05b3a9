//! Streaming chat and image generation for OpenAI-compatible APIs.
//!
//! The core of the crate is a cancellable streaming pipeline:
//!
//! - [`stream::ResponseStreamer`] consumes a transport's chunked completion
//!   response and republishes it as ordered [`stream::StreamEvent`]s, with a
//!   cooperative stop check polled between chunks.
//! - [`ledger::MessageLedger`] records conversation turns, tracks each
//!   turn's streaming state, and notifies listeners after mutation batches.
//! - [`session::ChatSession`] ties the two together: prompts are built from
//!   ledger history and stream events are folded back into the ledger.
//!
//! Transports implement [`chat::ChatTransport`]. The remote
//! [`backends::OpenAiTransport`] and the offline [`backends::MockTransport`]
//! satisfy the same contract, so mock mode is invisible to callers.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sidechat::backends::MockTransport;
//! use sidechat::session::{ChatSession, SessionOptions};
//! use sidechat::stream::ResponseStreamer;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), sidechat::ChatError> {
//! let streamer = ResponseStreamer::new(Arc::new(MockTransport::new(50)));
//! let session = ChatSession::new(streamer, SessionOptions::default());
//! session.send("Hello!").await?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod builder;
pub mod chat;
pub mod config;
pub mod error;
pub mod image;
pub mod ledger;
pub mod session;
pub mod store;
pub mod stream;
pub mod templates;

pub use builder::{TransportBackend, TransportBuilder};
pub use chat::{ChatMessage, ChatRole, ChatTransport, Prompt};
pub use config::AppConfig;
pub use error::ChatError;
pub use image::{GeneratedImage, ImageFormat, ImagePrompt, ImageSize};
pub use ledger::{Direction, Message, MessageLedger, MessageState};
pub use session::{ChatSession, SessionOptions};
pub use stream::{ControlSignal, ResponseStreamer, StreamEvent};

/// Initializes env_logger-based logging for binaries embedding the crate.
#[cfg(feature = "logging")]
pub fn init_logging() {
    env_logger::init();
}
