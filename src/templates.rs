//! Prompt templates applied to user input before it is sent.

use serde::{Deserialize, Serialize};

/// Placeholder substituted with the user's message when a template renders.
pub const MESSAGE_PLACEHOLDER: &str = "{{message}}";

/// A reusable prompt wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    /// Template body containing [`MESSAGE_PLACEHOLDER`].
    pub template: String,
    /// Sample input shown alongside the template.
    pub example: String,
}

impl Template {
    pub fn new(
        name: impl Into<String>,
        template: impl Into<String>,
        example: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            example: example.into(),
        }
    }

    /// Renders `message` into the template body.
    ///
    /// Every placeholder occurrence is substituted. A template without a
    /// placeholder renders the message unchanged.
    pub fn render(&self, message: &str) -> String {
        if !self.template.contains(MESSAGE_PLACEHOLDER) {
            log::warn!(
                "template {:?} has no {MESSAGE_PLACEHOLDER} placeholder",
                self.name
            );
            return message.to_string();
        }
        self.template.replace(MESSAGE_PLACEHOLDER, message)
    }
}
