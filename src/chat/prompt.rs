use serde::{Deserialize, Serialize};

use crate::error::ChatError;

use super::message::ChatMessage;

/// Model requested when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

const DEFAULT_TEMPERATURE: f32 = 1.0;

/// Sampling temperature constrained to the range the API accepts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Temperature(f32);

impl Temperature {
    pub fn get(self) -> f32 {
        self.0
    }

    fn fallback() -> Self {
        Self(DEFAULT_TEMPERATURE)
    }
}

impl Default for Temperature {
    fn default() -> Self {
        Self::fallback()
    }
}

impl TryFrom<f32> for Temperature {
    type Error = ChatError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        if !(0.0..=2.0).contains(&value) {
            return Err(ChatError::InvalidRequest(
                "Temperature must be within 0.0..=2.0".to_string(),
            ));
        }
        Ok(Self(value))
    }
}

/// An immutable chat request: ordered role-tagged entries plus generation
/// parameters. Built fresh per request from ledger history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    messages: Vec<ChatMessage>,
    model: String,
    temperature: Temperature,
}

impl Prompt {
    /// Create a prompt with the default model and temperature.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: DEFAULT_MODEL.to_string(),
            temperature: Temperature::default(),
        }
    }

    /// Create a prompt with explicit generation parameters.
    ///
    /// An out-of-range temperature falls back to the default.
    pub fn with_params(
        messages: Vec<ChatMessage>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            messages,
            model: model.into(),
            temperature: normalize_temperature(temperature),
        }
    }

    /// Create a prompt with validation of the generation parameters.
    pub fn try_with_params(
        messages: Vec<ChatMessage>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self, ChatError> {
        Ok(Self {
            messages,
            model: model.into(),
            temperature: Temperature::try_from(temperature)?,
        })
    }

    /// The ordered role-tagged entries.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The sampling temperature.
    pub fn temperature(&self) -> f32 {
        self.temperature.get()
    }
}

fn normalize_temperature(value: f32) -> Temperature {
    match Temperature::try_from(value) {
        Ok(temperature) => temperature,
        Err(err) => {
            log::warn!("Invalid temperature: {err}");
            Temperature::fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;

    #[test]
    fn temperature_rejects_out_of_range() {
        assert!(Temperature::try_from(-0.1).is_err());
        assert!(Temperature::try_from(2.1).is_err());
        assert!(Temperature::try_from(f32::NAN).is_err());
    }

    #[test]
    fn temperature_accepts_bounds() {
        assert_eq!(Temperature::try_from(0.0).unwrap().get(), 0.0);
        assert_eq!(Temperature::try_from(2.0).unwrap().get(), 2.0);
    }

    #[test]
    fn with_params_falls_back_on_invalid_temperature() {
        let prompt = Prompt::with_params(vec![], "gpt-4", 9.0);
        assert_eq!(prompt.temperature(), 1.0);
    }

    #[test]
    fn try_with_params_rejects_invalid_temperature() {
        assert!(Prompt::try_with_params(vec![], "gpt-4", 9.0).is_err());
    }

    #[test]
    fn new_uses_defaults() {
        let prompt = Prompt::new(vec![ChatMessage::user().content("hi").build()]);
        assert_eq!(prompt.model(), DEFAULT_MODEL);
        assert_eq!(prompt.temperature(), 1.0);
        assert_eq!(prompt.messages().len(), 1);
    }
}
