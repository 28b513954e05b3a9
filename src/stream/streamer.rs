use std::pin::Pin;
use std::sync::Arc;

use futures::channel::mpsc;
use futures::stream::{Stream, StreamExt};

use crate::chat::{ChatTransport, Prompt};
use crate::error::ChatError;
use crate::image::{GeneratedImage, ImagePrompt};

/// Cooperative control signal polled by the streamer between chunks.
///
/// Produced by the caller's stop check and consumed at chunk boundaries;
/// not a preemptive interrupt. An in-flight chunk read runs to completion
/// before the signal takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ControlSignal {
    /// Stop consuming the stream and terminate the transport call.
    StopStream,
}

/// Ordered lifecycle events emitted by [`ResponseStreamer`].
///
/// Every invocation emits `Started` first and `Finished` exactly once, last,
/// on all exit paths (normal end, stop, or failure). `Failed` is emitted at
/// most once, always before `Finished`.
#[derive(Debug)]
pub enum StreamEvent {
    /// Emitted once, before any transport activity.
    Started,
    /// An incremental piece of generated text. Empty when the transport
    /// chunk carried no text delta.
    Fragment(String),
    /// The generated image batch, emitted exactly once on success.
    Images(Vec<GeneratedImage>),
    /// The single error of a failed invocation.
    Failed(ChatError),
    /// Guaranteed finalizer.
    Finished,
}

/// Stop check polled between chunks.
pub type StopCheck = Arc<dyn Fn() -> Option<ControlSignal> + Send + Sync>;

/// Event stream returned by streamer invocations.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// A stop check that never signals.
pub fn never_stop() -> StopCheck {
    Arc::new(|| None)
}

/// Consumes a transport's chunked completion response and republishes it as
/// ordered [`StreamEvent`]s with cooperative cancellation.
///
/// The transport is injected explicitly; the streamer holds no global state
/// and never raises an error past its own boundary.
pub struct ResponseStreamer {
    transport: Arc<dyn ChatTransport>,
}

impl ResponseStreamer {
    /// Creates a streamer over the given transport.
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self { transport }
    }

    /// The injected transport handle.
    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        &self.transport
    }

    /// Streams a chat completion for `prompt`.
    ///
    /// `stop` is polled before each fragment is forwarded; once it returns
    /// [`ControlSignal::StopStream`] the transport call is terminated and no
    /// further fragments are emitted. Fragments already emitted are not
    /// rolled back.
    pub fn stream(&self, prompt: Prompt, stop: StopCheck) -> EventStream {
        let transport = Arc::clone(&self.transport);
        let (tx, rx) = mpsc::unbounded();

        tokio::spawn(async move {
            let emit = |event: StreamEvent| {
                let _ = tx.unbounded_send(event);
            };

            emit(StreamEvent::Started);
            if let Err(err) = consume_chat(transport, prompt, stop, &emit).await {
                emit(StreamEvent::Failed(err));
            }
            emit(StreamEvent::Finished);
        });

        Box::pin(rx)
    }

    /// Requests an image batch for `prompt` under the same event contract:
    /// `Started` first, `Images` exactly once on success, `Failed` at most
    /// once, `Finished` always last. The stop check is consulted once,
    /// before the request is issued.
    pub fn generate(&self, prompt: ImagePrompt, stop: StopCheck) -> EventStream {
        let transport = Arc::clone(&self.transport);
        let (tx, rx) = mpsc::unbounded();

        tokio::spawn(async move {
            let emit = |event: StreamEvent| {
                let _ = tx.unbounded_send(event);
            };

            emit(StreamEvent::Started);
            if stop().is_none() {
                match transport.generate_images(&prompt).await {
                    Ok(images) => emit(StreamEvent::Images(images)),
                    Err(err) => emit(StreamEvent::Failed(err)),
                }
            }
            emit(StreamEvent::Finished);
        });

        Box::pin(rx)
    }
}

async fn consume_chat(
    transport: Arc<dyn ChatTransport>,
    prompt: Prompt,
    stop: StopCheck,
    emit: &impl Fn(StreamEvent),
) -> Result<(), ChatError> {
    let mut fragments = transport.chat_stream(&prompt).await?;
    while let Some(fragment) = fragments.next().await {
        if stop().is_some() {
            // Dropping the stream aborts the underlying transport call.
            break;
        }
        emit(StreamEvent::Fragment(fragment?));
    }
    Ok(())
}
