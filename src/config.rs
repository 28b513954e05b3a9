//! Application configuration, loaded once at process start.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chat::DEFAULT_MODEL;
use crate::error::ChatError;
use crate::image::{ImageFormat, ImageSize};

/// Delay between canned fragments when mock mode does not configure one.
pub const DEFAULT_MOCK_INTERVAL_MS: u64 = 100;

const DEFAULT_TEMPERATURE: f32 = 1.0;
const DEFAULT_IMAGE_COUNT: u8 = 1;

/// Mock-mode selection. Read once at startup; the chosen transport does not
/// change for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Substitute the canned offline transport for the remote API.
    pub enabled: bool,
    /// Artificial delay between canned fragments, in milliseconds.
    pub interval_ms: u64,
    /// Overrides the built-in canned reply.
    pub reply: Option<String>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: DEFAULT_MOCK_INTERVAL_MS,
            reply: None,
        }
    }
}

/// Chat generation defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub model: String,
    pub temperature: f32,
    /// Include the full conversation history in each prompt.
    pub remember_context: bool,
    /// System entry prepended to every prompt.
    pub system: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            remember_context: true,
            system: None,
        }
    }
}

/// Image generation defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub count: u8,
    pub size: ImageSize,
    pub format: ImageFormat,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_IMAGE_COUNT,
            size: ImageSize::default(),
            format: ImageFormat::default(),
        }
    }
}

/// Remote endpoint settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the OpenAI-compatible endpoint.
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: Option<u64>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mock: MockConfig,
    pub chat: ChatConfig,
    pub image: ImageConfig,
    pub api: ApiConfig,
}

impl AppConfig {
    /// Default config file path (`~/.sidechat/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".sidechat").join("config.toml"))
    }

    /// Loads the file at `path`. A missing file yields defaults; a file
    /// that fails to parse is an error, not a silent fallback.
    pub fn load(path: &Path) -> Result<Self, ChatError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .map_err(|err| ChatError::InvalidRequest(format!("Invalid config file: {err}"))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Writes the configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ChatError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|err| ChatError::Generic(format!("Failed to encode config: {err}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert!(!config.mock.enabled);
        assert_eq!(config.chat.model, DEFAULT_MODEL);
        assert!(config.chat.remember_context);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            concat!(
                "[mock]\n",
                "enabled = true\n",
                "interval_ms = 0\n",
                "\n",
                "[image]\n",
                "size = \"1024x1024\"\n",
            ),
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert!(config.mock.enabled);
        assert_eq!(config.mock.interval_ms, 0);
        assert_eq!(config.image.size, ImageSize::Large);
        assert_eq!(config.image.count, 1);
        assert_eq!(config.chat.temperature, 1.0);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "mock = \"not a table\"").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.mock.enabled = true;
        config.api.base_url = Some("http://localhost:8080/v1".to_string());
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert!(loaded.mock.enabled);
        assert_eq!(
            loaded.api.base_url.as_deref(),
            Some("http://localhost:8080/v1")
        );
    }
}
