pub mod mock;
pub mod openai;

pub use mock::MockTransport;
pub use openai::{OpenAiConfig, OpenAiTransport};
