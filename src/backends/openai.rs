//! OpenAI-compatible API transport for streaming chat and image generation.
//!
//! Speaks the `chat/completions` SSE protocol and the `images/generations`
//! batch endpoint against any OpenAI-style base URL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::chat::{decode_sse_stream, ChatTransport, FragmentStream, Prompt};
use crate::error::ChatError;
use crate::image::{GeneratedImage, ImagePrompt};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";
const SSE_DONE_MARKER: &str = "[DONE]";

/// Configuration for the OpenAI-compatible transport.
#[derive(Debug)]
pub struct OpenAiConfig {
    /// API key for bearer authentication. May be empty; every request
    /// checks it before any network activity.
    pub api_key: String,
    /// Endpoint base, always ending in a slash.
    pub base_url: Url,
    /// Request timeout in seconds.
    pub timeout_seconds: Option<u64>,
}

/// Client for an OpenAI-compatible completion API.
///
/// The client uses `Arc` internally for configuration, making cloning cheap.
#[derive(Debug, Clone)]
pub struct OpenAiTransport {
    config: Arc<OpenAiConfig>,
    client: Client,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize, Debug)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize, Debug, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct ImageGenerationRequest<'a> {
    prompt: &'a str,
    n: u8,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Deserialize, Debug)]
struct ImageGenerationResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize, Debug)]
struct ImageDatum {
    url: Option<String>,
    b64_json: Option<String>,
}

impl OpenAiTransport {
    /// Creates a new transport.
    ///
    /// An empty API key is accepted here; the configuration error surfaces
    /// on the first request, before any network attempt.
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<String>,
        timeout_seconds: Option<u64>,
    ) -> Result<Self, ChatError> {
        let mut builder = Client::builder();
        if let Some(secs) = timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|err| ChatError::Http(err.to_string()))?;
        Self::with_client(client, api_key, base_url, timeout_seconds)
    }

    /// Creates a transport backed by a caller-supplied HTTP client.
    pub fn with_client(
        client: Client,
        api_key: impl Into<String>,
        base_url: Option<String>,
        timeout_seconds: Option<u64>,
    ) -> Result<Self, ChatError> {
        let base_url = parse_base_url(base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;
        Ok(Self {
            config: Arc::new(OpenAiConfig {
                api_key: api_key.into(),
                base_url,
                timeout_seconds,
            }),
            client,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.config.api_key
    }

    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    pub fn timeout_seconds(&self) -> Option<u64> {
        self.config.timeout_seconds
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn ensure_configured(&self) -> Result<(), ChatError> {
        if self.config.api_key.is_empty() {
            return Err(ChatError::Auth(
                "OpenAI API key is not configured".to_string(),
            ));
        }
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url, ChatError> {
        self.config
            .base_url
            .join(path)
            .map_err(|err| ChatError::Http(err.to_string()))
    }

    fn log_request_payload<T: Serialize>(&self, label: &str, body: &T) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        if let Ok(json) = serde_json::to_string(body) {
            log::trace!("{label}: {json}");
        }
    }

    async fn post_json<T: Serialize>(
        &self,
        path: &str,
        body: &T,
        context: &str,
    ) -> Result<reqwest::Response, ChatError> {
        let url = self.endpoint(path)?;
        self.log_request_payload(context, body);

        let mut request = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(body);
        if let Some(timeout) = self.config.timeout_seconds {
            request = request.timeout(Duration::from_secs(timeout));
        }

        let response = request.send().await?;
        log::debug!("{context} HTTP status: {}", response.status());
        ensure_success(response, context).await
    }
}

#[async_trait]
impl ChatTransport for OpenAiTransport {
    async fn chat_stream(&self, prompt: &Prompt) -> Result<FragmentStream, ChatError> {
        self.ensure_configured()?;

        let messages = prompt
            .messages()
            .iter()
            .map(|entry| WireMessage {
                role: entry.role.as_str(),
                content: &entry.content,
            })
            .collect();
        let body = ChatCompletionRequest {
            model: prompt.model(),
            messages,
            temperature: Some(prompt.temperature()),
            stream: true,
        };

        let response = self
            .post_json("chat/completions", &body, "chat completion stream")
            .await?;
        Ok(decode_sse_stream(response, parse_chunk_event))
    }

    async fn generate_images(
        &self,
        prompt: &ImagePrompt,
    ) -> Result<Vec<GeneratedImage>, ChatError> {
        self.ensure_configured()?;

        let body = ImageGenerationRequest {
            prompt: prompt.prompt(),
            n: prompt.count(),
            size: prompt.size().as_str(),
            response_format: prompt.format().as_str(),
        };

        let response = self
            .post_json("images/generations", &body, "image generation")
            .await?;
        let raw = response.text().await?;
        let parsed: ImageGenerationResponse =
            serde_json::from_str(&raw).map_err(|err| ChatError::ResponseFormat {
                message: format!("Failed to decode image generation response: {err}"),
                raw_response: raw,
            })?;
        parsed.data.into_iter().map(decode_image).collect()
    }
}

async fn ensure_success(
    response: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response, ChatError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response.text().await?;
    Err(ChatError::ResponseFormat {
        message: format!("{context} returned error status: {status}"),
        raw_response: error_text,
    })
}

fn parse_base_url(raw: &str) -> Result<Url, ChatError> {
    // join() would treat a base without a trailing slash as a file path.
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized)
        .map_err(|err| ChatError::InvalidRequest(format!("Invalid base URL: {err}")))
}

fn parse_chunk_event(event: &str) -> Result<Option<String>, ChatError> {
    let Some(data) = event.strip_prefix("data: ") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() || data == SSE_DONE_MARKER {
        return Ok(None);
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(data)?;
    // A chunk without a text delta is an empty fragment, not an error.
    let content = chunk
        .choices
        .first()
        .and_then(|choice| choice.delta.content.clone())
        .unwrap_or_default();
    Ok(Some(content))
}

fn decode_image(datum: ImageDatum) -> Result<GeneratedImage, ChatError> {
    if let Some(url) = datum.url {
        return Ok(GeneratedImage::Url(url));
    }
    if let Some(encoded) = datum.b64_json {
        let bytes = BASE64
            .decode(encoded.as_bytes())
            .map_err(|err| ChatError::ResponseFormat {
                message: format!("Invalid base64 image payload: {err}"),
                raw_response: String::new(),
            })?;
        return Ok(GeneratedImage::Inline(bytes));
    }
    Err(ChatError::ResponseFormat {
        message: "Image datum carries neither url nor b64_json".to_string(),
        raw_response: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use futures::stream::StreamExt;

    use super::*;
    use crate::chat::ChatMessage;

    fn transport_for(server: &mockito::ServerGuard) -> OpenAiTransport {
        OpenAiTransport::new("test-key", Some(server.url()), None).expect("transport")
    }

    fn prompt() -> Prompt {
        Prompt::new(vec![ChatMessage::user().content("hi").build()])
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = parse_base_url("http://localhost:1234/v1").unwrap();
        assert_eq!(url.as_str(), "http://localhost:1234/v1/");
    }

    #[test]
    fn chunk_parser_skips_done_marker() {
        assert_eq!(parse_chunk_event("data: [DONE]\n\n").unwrap(), None);
        assert_eq!(parse_chunk_event(": keep-alive\n\n").unwrap(), None);
    }

    #[test]
    fn chunk_without_delta_is_empty_fragment() {
        let event = "data: {\"choices\":[{\"delta\":{}}]}\n\n";
        assert_eq!(parse_chunk_event(event).unwrap(), Some(String::new()));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let transport = OpenAiTransport::new("", None, None).expect("transport");
        let err = transport.chat_stream(&prompt()).await.err().expect("error");
        assert!(matches!(err, ChatError::Auth(_)));
    }

    #[tokio::test]
    async fn chat_stream_yields_delta_contents() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
                "data: [DONE]\n\n",
            ))
            .create_async()
            .await;

        let transport = transport_for(&server);
        let mut stream = transport.chat_stream(&prompt()).await.expect("stream");

        let mut fragments = Vec::new();
        while let Some(item) = stream.next().await {
            fragments.push(item.expect("fragment"));
        }

        assert_eq!(fragments, vec!["Hel".to_string(), "lo".to_string()]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_is_reported_with_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let transport = transport_for(&server);
        let err = transport.chat_stream(&prompt()).await.err().expect("error");
        match err {
            ChatError::ResponseFormat { raw_response, .. } => {
                assert_eq!(raw_response, "upstream exploded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn generate_images_decodes_urls_and_inline_payloads() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/images/generations")
            .with_status(200)
            .with_body(
                "{\"data\":[{\"url\":\"https://img.example/one.png\"},{\"b64_json\":\"aGk=\"}]}",
            )
            .create_async()
            .await;

        let transport = transport_for(&server);
        let images = transport
            .generate_images(&ImagePrompt::new("a lighthouse"))
            .await
            .expect("images");

        assert_eq!(
            images,
            vec![
                GeneratedImage::Url("https://img.example/one.png".to_string()),
                GeneratedImage::Inline(b"hi".to_vec()),
            ]
        );
    }
}
