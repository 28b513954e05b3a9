use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::Stream;

use crate::error::ChatError;
use crate::image::{GeneratedImage, ImagePrompt};

use super::prompt::Prompt;

/// Fragment stream produced by a chat transport.
///
/// Each item is one incremental text fragment; an empty string means the
/// underlying chunk carried no text delta.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

/// Trait for transports that can stream chat completions and generate
/// images.
///
/// Implemented by the remote OpenAI-compatible client and the offline mock.
/// Both satisfy the same contract, so callers never observe which one is
/// active. Dropping a returned [`FragmentStream`] terminates the underlying
/// call; no further chunks are requested.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Opens a streaming completion request for `prompt`.
    async fn chat_stream(&self, prompt: &Prompt) -> Result<FragmentStream, ChatError>;

    /// Requests a batch of generated images.
    async fn generate_images(
        &self,
        _prompt: &ImagePrompt,
    ) -> Result<Vec<GeneratedImage>, ChatError> {
        Err(ChatError::Generic(
            "Image generation not supported by this transport".to_string(),
        ))
    }
}
