//! Deterministic offline transport used when mock mode is enabled.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::StreamExt;

use crate::chat::{ChatTransport, FragmentStream, Prompt};
use crate::error::ChatError;
use crate::image::{GeneratedImage, ImagePrompt};

/// Canned reply streamed word-by-word when no custom reply is configured.
const CANNED_REPLY: &str = "Lorem ipsum dolor sit amet consectetur adipisicing elit. \
    Maxime mollitia, molestiae quas vel sint commodi repudiandae consequuntur \
    voluptatum laborum numquam blanditiis harum quisquam eius sed odit fugiat \
    iusto fuga praesentium optio, eaque rerum!";

/// Placeholder reference returned by mock image generation.
const CANNED_IMAGE_URL: &str = "https://example.com/mock-image.png";

/// Offline transport that substitutes canned data for the remote API.
///
/// Satisfies the same contract as the remote transport: fragments arrive
/// word-by-word (each word keeps a trailing space), paced by the configured
/// delay, and dropping the stream breaks the loop.
#[derive(Debug, Clone)]
pub struct MockTransport {
    reply: String,
    interval: Duration,
}

impl MockTransport {
    /// Creates a mock with the built-in canned reply.
    pub fn new(interval_ms: u64) -> Self {
        Self::with_reply(CANNED_REPLY, interval_ms)
    }

    /// Creates a mock that streams `reply` instead of the built-in text.
    pub fn with_reply(reply: impl Into<String>, interval_ms: u64) -> Self {
        Self {
            reply: reply.into(),
            interval: Duration::from_millis(interval_ms),
        }
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn chat_stream(&self, _prompt: &Prompt) -> Result<FragmentStream, ChatError> {
        let words: Vec<String> = self
            .reply
            .split_whitespace()
            .map(|word| format!("{word} "))
            .collect();
        let interval = self.interval;

        let stream = futures::stream::iter(words).then(move |word| async move {
            tokio::time::sleep(interval).await;
            Ok::<String, ChatError>(word)
        });

        Ok(Box::pin(stream))
    }

    async fn generate_images(
        &self,
        prompt: &ImagePrompt,
    ) -> Result<Vec<GeneratedImage>, ChatError> {
        tokio::time::sleep(self.interval).await;
        Ok(vec![
            GeneratedImage::Url(CANNED_IMAGE_URL.to_string());
            prompt.count() as usize
        ])
    }
}
