use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

const MIN_IMAGE_COUNT: u8 = 1;
const MAX_IMAGE_COUNT: u8 = 10;

/// Square pixel dimensions accepted by the image endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ImageSize {
    #[serde(rename = "256x256")]
    Small,
    #[default]
    #[serde(rename = "512x512")]
    Medium,
    #[serde(rename = "1024x1024")]
    Large,
}

impl ImageSize {
    /// The wire name of this size.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Small => "256x256",
            ImageSize::Medium => "512x512",
            ImageSize::Large => "1024x1024",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ImageSize {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "256x256" => Ok(ImageSize::Small),
            "512x512" => Ok(ImageSize::Medium),
            "1024x1024" => Ok(ImageSize::Large),
            _ => Err(ChatError::InvalidRequest(format!(
                "Unknown image size: {s}"
            ))),
        }
    }
}

/// Requested encoding of generated images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ImageFormat {
    /// Hosted URL, fetched separately by the caller
    #[default]
    #[serde(rename = "url")]
    Url,
    /// Base64 payload inlined in the response
    #[serde(rename = "b64_json")]
    B64Json,
}

impl ImageFormat {
    /// The wire name of this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Url => "url",
            ImageFormat::B64Json => "b64_json",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url" => Ok(ImageFormat::Url),
            "b64_json" => Ok(ImageFormat::B64Json),
            _ => Err(ChatError::InvalidRequest(format!(
                "Unknown image format: {s}"
            ))),
        }
    }
}

/// An immutable image-generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePrompt {
    prompt: String,
    count: u8,
    size: ImageSize,
    format: ImageFormat,
}

impl ImagePrompt {
    /// Create a request for a single image with default size and format.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            count: MIN_IMAGE_COUNT,
            size: ImageSize::default(),
            format: ImageFormat::default(),
        }
    }

    /// Create a request with explicit parameters.
    ///
    /// The count is clamped to the range the endpoint accepts.
    pub fn with_params(
        prompt: impl Into<String>,
        count: u8,
        size: ImageSize,
        format: ImageFormat,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            count: normalize_count(count),
            size,
            format,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }
}

fn normalize_count(count: u8) -> u8 {
    let clamped = count.clamp(MIN_IMAGE_COUNT, MAX_IMAGE_COUNT);
    if clamped != count {
        log::warn!("Image count {count} out of range, using {clamped}");
    }
    clamped
}

/// A generated image delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneratedImage {
    /// Reference to a hosted image
    Url(String),
    /// Decoded inline image bytes
    Inline(Vec<u8>),
}

impl GeneratedImage {
    /// A renderable reference to the image: the hosted URL, or a PNG data
    /// URL for inline payloads.
    pub fn to_reference(&self) -> String {
        match self {
            GeneratedImage::Url(url) => url.clone(),
            GeneratedImage::Inline(bytes) => {
                format!("data:image/png;base64,{}", BASE64.encode(bytes))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("256x256", ImageSize::Small)]
    #[case("512x512", ImageSize::Medium)]
    #[case("1024x1024", ImageSize::Large)]
    fn parses_known_sizes(#[case] input: &str, #[case] expected: ImageSize) {
        assert_eq!(input.parse::<ImageSize>().unwrap(), expected);
        assert_eq!(expected.as_str(), input);
    }

    #[rstest]
    #[case("url", ImageFormat::Url)]
    #[case("b64_json", ImageFormat::B64Json)]
    fn parses_known_formats(#[case] input: &str, #[case] expected: ImageFormat) {
        assert_eq!(input.parse::<ImageFormat>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_size() {
        assert!("640x480".parse::<ImageSize>().is_err());
    }

    #[test]
    fn count_is_clamped() {
        assert_eq!(ImagePrompt::with_params("a cat", 0, ImageSize::Small, ImageFormat::Url).count(), 1);
        assert_eq!(ImagePrompt::with_params("a cat", 42, ImageSize::Small, ImageFormat::Url).count(), 10);
        assert_eq!(ImagePrompt::with_params("a cat", 3, ImageSize::Small, ImageFormat::Url).count(), 3);
    }

    #[test]
    fn inline_reference_is_a_data_url() {
        let image = GeneratedImage::Inline(b"hi".to_vec());
        assert_eq!(image.to_reference(), "data:image/png;base64,aGk=");
    }
}
