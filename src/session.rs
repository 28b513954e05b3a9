//! Caller-side glue: builds prompts from ledger history and folds the
//! streamer's events back into ledger mutations.

use std::sync::Arc;

use futures::stream::StreamExt;
use tokio::sync::RwLock;

use crate::chat::{ChatMessage, Prompt, DEFAULT_MODEL};
use crate::config::AppConfig;
use crate::error::ChatError;
use crate::image::{ImageFormat, ImagePrompt, ImageSize};
use crate::ledger::{Message, MessageLedger};
use crate::stream::{ControlSignal, EventStream, ResponseStreamer, StopCheck, StreamEvent};
use crate::templates::Template;

/// Generation options applied to every turn of a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub model: String,
    pub temperature: f32,
    /// System entry prepended to every prompt.
    pub system: Option<String>,
    /// Include the full ledger history in each prompt instead of only the
    /// current turn.
    pub remember_context: bool,
    pub image_count: u8,
    pub image_size: ImageSize,
    pub image_format: ImageFormat,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 1.0,
            system: None,
            remember_context: true,
            image_count: 1,
            image_size: ImageSize::default(),
            image_format: ImageFormat::default(),
        }
    }
}

impl SessionOptions {
    /// Session options matching the application configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.chat.model.clone(),
            temperature: config.chat.temperature,
            system: config.chat.system.clone(),
            remember_context: config.chat.remember_context,
            image_count: config.image.count,
            image_size: config.image.size,
            image_format: config.image.format,
        }
    }
}

/// A single conversation: one ledger, one streamer, at most one in-flight
/// turn at a time.
pub struct ChatSession {
    streamer: ResponseStreamer,
    ledger: Arc<RwLock<MessageLedger>>,
    options: SessionOptions,
    template: Option<Template>,
}

impl ChatSession {
    /// Creates a session with a fresh, listener-less ledger.
    pub fn new(streamer: ResponseStreamer, options: SessionOptions) -> Self {
        Self::with_ledger(
            streamer,
            Arc::new(RwLock::new(MessageLedger::new())),
            options,
        )
    }

    /// Creates a session over an existing (possibly restored) ledger.
    pub fn with_ledger(
        streamer: ResponseStreamer,
        ledger: Arc<RwLock<MessageLedger>>,
        options: SessionOptions,
    ) -> Self {
        Self {
            streamer,
            ledger,
            options,
            template: None,
        }
    }

    /// Shared handle to the session ledger, for observation and stopping.
    pub fn ledger(&self) -> Arc<RwLock<MessageLedger>> {
        Arc::clone(&self.ledger)
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Sets the template applied to subsequent sent turns.
    pub fn set_template(&mut self, template: Option<Template>) {
        self.template = template;
    }

    /// Cancels the in-flight turn, if any. Takes effect at the streamer's
    /// next chunk check; fragments already received are retained.
    pub async fn stop(&self) {
        self.ledger.write().await.cancel_last();
    }

    /// Sends a user turn and streams the model's reply into the ledger.
    ///
    /// Returns after the stream finalizer has run; a transport failure is
    /// returned as the error the stream delivered.
    pub async fn send(&self, input: &str) -> Result<(), ChatError> {
        let prompt = self.prepare_turn(input).await;
        let events = self.streamer.stream(prompt, self.stop_check());
        self.drive(events).await
    }

    /// Requests an image batch for a user turn; references to the
    /// generated images become the received turn's fragments.
    pub async fn send_image(&self, input: &str) -> Result<(), ChatError> {
        let rendered = self.render(input);
        {
            let mut ledger = self.ledger.write().await;
            ledger.append(self.sent_message(rendered.clone(), input));
            ledger.append(Message::received());
        }

        let prompt = ImagePrompt::with_params(
            rendered,
            self.options.image_count,
            self.options.image_size,
            self.options.image_format,
        );
        let events = self.streamer.generate(prompt, self.stop_check());
        self.drive(events).await
    }

    fn render(&self, input: &str) -> String {
        match &self.template {
            Some(template) => template.render(input),
            None => input.to_string(),
        }
    }

    fn sent_message(&self, rendered: String, input: &str) -> Message {
        if self.template.is_some() {
            Message::sent_with_original(rendered, input)
        } else {
            Message::sent(rendered)
        }
    }

    /// Appends the sent turn and the pending received turn, and builds the
    /// prompt from the history in between.
    async fn prepare_turn(&self, input: &str) -> Prompt {
        let rendered = self.render(input);
        let mut ledger = self.ledger.write().await;
        ledger.append(self.sent_message(rendered.clone(), input));

        let mut entries = Vec::new();
        if let Some(system) = &self.options.system {
            entries.push(ChatMessage::system().content(system.clone()).build());
        }
        if self.options.remember_context {
            entries.extend(
                ledger
                    .messages()
                    .iter()
                    .filter(|message| !message.text().is_empty())
                    .map(|message| ChatMessage::new(message.role(), message.text())),
            );
        } else {
            entries.push(ChatMessage::user().content(rendered).build());
        }

        ledger.append(Message::received());
        Prompt::with_params(entries, self.options.model.clone(), self.options.temperature)
    }

    /// The cooperative-cancellation bridge: the streamer polls this between
    /// chunks, and it reports whether the UI canceled the in-flight turn.
    fn stop_check(&self) -> StopCheck {
        let ledger = Arc::clone(&self.ledger);
        Arc::new(move || {
            // The check runs between chunk awaits; a contended lock just
            // defers cancellation to the next check.
            match ledger.try_read() {
                Ok(guard) if guard.is_last_canceled() => Some(ControlSignal::StopStream),
                _ => None,
            }
        })
    }

    async fn drive(&self, mut events: EventStream) -> Result<(), ChatError> {
        let mut failure = None;
        while let Some(event) = events.next().await {
            match event {
                StreamEvent::Started => {}
                StreamEvent::Fragment(text) => {
                    self.ledger.write().await.append_fragment(&text);
                }
                StreamEvent::Images(images) => {
                    let mut ledger = self.ledger.write().await;
                    for image in &images {
                        ledger.append_fragment(&image.to_reference());
                    }
                }
                StreamEvent::Failed(err) => {
                    log::error!("stream failed: {err}");
                    failure = Some(err);
                }
                StreamEvent::Finished => {
                    self.ledger.write().await.complete_last();
                }
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use super::*;
    use crate::backends::MockTransport;
    use crate::chat::{ChatRole, ChatTransport, FragmentStream};
    use crate::ledger::MessageState;

    /// Transport that records every prompt and replies with a fixed text.
    struct RecordingTransport {
        prompts: StdMutex<Vec<Prompt>>,
        reply: String,
    }

    impl RecordingTransport {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                prompts: StdMutex::new(Vec::new()),
                reply: reply.to_string(),
            })
        }
    }

    #[async_trait]
    impl ChatTransport for RecordingTransport {
        async fn chat_stream(&self, prompt: &Prompt) -> Result<FragmentStream, ChatError> {
            self.prompts.lock().unwrap().push(prompt.clone());
            let words: Vec<Result<String, ChatError>> = self
                .reply
                .split_whitespace()
                .map(|word| Ok(format!("{word} ")))
                .collect();
            Ok(Box::pin(futures::stream::iter(words)))
        }
    }

    fn mock_session(reply: &str) -> ChatSession {
        let streamer = ResponseStreamer::new(Arc::new(MockTransport::with_reply(reply, 0)));
        ChatSession::new(streamer, SessionOptions::default())
    }

    #[tokio::test]
    async fn send_streams_reply_into_the_ledger() {
        let session = mock_session("hello world");
        session.send("hi").await.expect("send");

        let ledger = session.ledger();
        let ledger = ledger.read().await;
        assert_eq!(ledger.len(), 2);

        let last = ledger.last().expect("received turn");
        assert_eq!(last.text(), "hello world ");
        assert_eq!(last.state(), MessageState::Completed);
    }

    #[tokio::test]
    async fn template_renders_input_and_keeps_original() {
        let mut session = mock_session("ok");
        session.set_template(Some(Template::new(
            "echo",
            "Repeat: {{message}}",
            "hi",
        )));
        session.send("hello").await.expect("send");

        let ledger = session.ledger();
        let ledger = ledger.read().await;
        let sent = &ledger.messages()[0];
        assert_eq!(sent.text(), "Repeat: hello");
        assert_eq!(sent.original(), Some("hello"));
    }

    #[tokio::test]
    async fn remember_context_off_sends_only_the_current_turn() {
        let transport = RecordingTransport::new("ok");
        let streamer = ResponseStreamer::new(Arc::clone(&transport) as Arc<dyn ChatTransport>);
        let options = SessionOptions {
            remember_context: false,
            ..SessionOptions::default()
        };
        let session = ChatSession::new(streamer, options);

        session.send("first").await.expect("send");
        session.send("second").await.expect("send");

        let prompts = transport.prompts.lock().unwrap();
        let entries = prompts[1].messages();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].role, ChatRole::User);
        assert_eq!(entries[0].content, "second");
    }

    #[tokio::test]
    async fn remember_context_on_replays_history_with_roles() {
        let transport = RecordingTransport::new("ok");
        let streamer = ResponseStreamer::new(Arc::clone(&transport) as Arc<dyn ChatTransport>);
        let options = SessionOptions {
            system: Some("be brief".to_string()),
            ..SessionOptions::default()
        };
        let session = ChatSession::new(streamer, options);

        session.send("first").await.expect("send");
        session.send("second").await.expect("send");

        let prompts = transport.prompts.lock().unwrap();
        let entries = prompts[1].messages();
        let roles: Vec<ChatRole> = entries.iter().map(|entry| entry.role).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::System,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User,
            ]
        );
        assert_eq!(entries[2].content, "ok ");
        assert_eq!(entries[3].content, "second");
    }

    #[tokio::test]
    async fn failed_send_returns_error_after_finalizer() {
        use crate::backends::OpenAiTransport;

        // Missing key: the configuration error is delivered through the
        // stream, and the finalizer still settles the pending turn.
        let transport = OpenAiTransport::new("", None, None).expect("transport");
        let session = ChatSession::new(
            ResponseStreamer::new(Arc::new(transport)),
            SessionOptions::default(),
        );

        let err = session.send("hi").await.err().expect("error");
        assert!(matches!(err, ChatError::Auth(_)));

        let ledger = session.ledger();
        let ledger = ledger.read().await;
        let last = ledger.last().expect("received turn");
        assert!(last.text().is_empty());
        assert_eq!(last.state(), MessageState::Completed);
    }

    #[tokio::test]
    async fn send_image_appends_references_as_fragments() {
        let streamer = ResponseStreamer::new(Arc::new(MockTransport::with_reply("unused", 0)));
        let options = SessionOptions {
            image_count: 2,
            ..SessionOptions::default()
        };
        let session = ChatSession::new(streamer, options);

        session.send_image("a lighthouse").await.expect("send");

        let ledger = session.ledger();
        let ledger = ledger.read().await;
        let last = ledger.last().expect("received turn");
        assert_eq!(last.fragments().len(), 2);
        assert!(last.fragments()[0].starts_with("https://"));
        assert_eq!(last.state(), MessageState::Completed);
    }

    #[tokio::test]
    async fn stop_truncates_the_in_flight_turn() {
        let reply = "one two three four five six seven eight nine ten \
                     eleven twelve thirteen fourteen fifteen sixteen";
        let streamer = ResponseStreamer::new(Arc::new(MockTransport::with_reply(reply, 5)));
        let session = ChatSession::new(streamer, SessionOptions::default());

        let ledger = session.ledger();
        let stopper = tokio::spawn(async move {
            // Cancel once the first fragments have landed.
            loop {
                {
                    let guard = ledger.read().await;
                    if guard
                        .last()
                        .map(|last| last.fragments().len() >= 2)
                        .unwrap_or(false)
                    {
                        break;
                    }
                }
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            }
            ledger.write().await.cancel_last();
        });

        session.send("go").await.expect("send");
        stopper.await.expect("stopper");

        let ledger = session.ledger();
        let ledger = ledger.read().await;
        let last = ledger.last().expect("received turn");
        assert_eq!(last.state(), MessageState::Canceled);
        assert!(last.fragments().len() < reply.split_whitespace().count());
        assert!(last.fragments().len() >= 2);
    }
}
