use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::backends::{MockTransport, OpenAiTransport};
use crate::chat::ChatTransport;
use crate::config::{AppConfig, DEFAULT_MOCK_INTERVAL_MS};
use crate::error::ChatError;
use crate::stream::ResponseStreamer;

/// Supported transport backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportBackend {
    /// Remote OpenAI-compatible API
    OpenAi,
    /// Canned offline responses
    Mock,
}

impl std::str::FromStr for TransportBackend {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(TransportBackend::OpenAi),
            "mock" => Ok(TransportBackend::Mock),
            _ => Err(ChatError::InvalidRequest(format!(
                "Unknown transport backend: {s}"
            ))),
        }
    }
}

/// Builder for configuring and instantiating a chat transport.
#[derive(Default)]
pub struct TransportBuilder {
    backend: Option<TransportBackend>,
    api_key: Option<SecretString>,
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
    mock_interval_ms: Option<u64>,
    mock_reply: Option<String>,
}

impl TransportBuilder {
    /// Creates a new empty builder instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder preset from the application configuration.
    ///
    /// Mock mode is decided here, once; callers built from the same config
    /// all share the same transport kind.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut builder = Self::new().backend(if config.mock.enabled {
            TransportBackend::Mock
        } else {
            TransportBackend::OpenAi
        });
        builder = builder.mock_interval_ms(config.mock.interval_ms);
        if let Some(reply) = &config.mock.reply {
            builder = builder.mock_reply(reply.clone());
        }
        if let Some(base_url) = &config.api.base_url {
            builder = builder.base_url(base_url.clone());
        }
        if let Some(timeout) = config.api.timeout_seconds {
            builder = builder.timeout_seconds(timeout);
        }
        builder
    }

    /// Sets the backend to instantiate.
    pub fn backend(mut self, backend: TransportBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Sets the API key for authentication.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(key.into()));
        self
    }

    /// Sets the base URL for API requests.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the request timeout in seconds.
    pub fn timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Sets the delay between canned mock fragments.
    pub fn mock_interval_ms(mut self, interval_ms: u64) -> Self {
        self.mock_interval_ms = Some(interval_ms);
        self
    }

    /// Overrides the canned mock reply.
    pub fn mock_reply(mut self, reply: impl Into<String>) -> Self {
        self.mock_reply = Some(reply.into());
        self
    }

    /// Builds the configured transport.
    pub fn build(self) -> Result<Arc<dyn ChatTransport>, ChatError> {
        match self.backend {
            Some(TransportBackend::Mock) => {
                let interval = self.mock_interval_ms.unwrap_or(DEFAULT_MOCK_INTERVAL_MS);
                let transport = match self.mock_reply {
                    Some(reply) => MockTransport::with_reply(reply, interval),
                    None => MockTransport::new(interval),
                };
                Ok(Arc::new(transport))
            }
            Some(TransportBackend::OpenAi) => {
                let api_key = self
                    .api_key
                    .map(|key| key.expose_secret().clone())
                    .unwrap_or_default();
                let transport =
                    OpenAiTransport::new(api_key, self.base_url, self.timeout_seconds)?;
                Ok(Arc::new(transport))
            }
            None => Err(ChatError::InvalidRequest(
                "No backend specified".to_string(),
            )),
        }
    }

    /// Builds the transport and wraps it in a [`ResponseStreamer`].
    pub fn build_streamer(self) -> Result<ResponseStreamer, ChatError> {
        Ok(ResponseStreamer::new(self.build()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_known_names() {
        assert_eq!(
            "openai".parse::<TransportBackend>().unwrap(),
            TransportBackend::OpenAi
        );
        assert_eq!(
            "Mock".parse::<TransportBackend>().unwrap(),
            TransportBackend::Mock
        );
        assert!("gemini".parse::<TransportBackend>().is_err());
    }

    #[test]
    fn build_without_backend_is_an_error() {
        assert!(TransportBuilder::new().build().is_err());
    }

    #[test]
    fn mock_mode_in_config_selects_the_mock_transport() {
        let mut config = AppConfig::default();
        config.mock.enabled = true;
        config.mock.interval_ms = 0;

        // Building must succeed without any API key.
        assert!(TransportBuilder::from_config(&config).build().is_ok());
    }

    #[test]
    fn openai_without_key_still_builds() {
        // The missing key surfaces per-invocation, before any network
        // attempt, so construction is infallible on that axis.
        let transport = TransportBuilder::new()
            .backend(TransportBackend::OpenAi)
            .build();
        assert!(transport.is_ok());
    }
}
