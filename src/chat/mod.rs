mod message;
mod prompt;
mod sse;
mod traits;

pub use message::{ChatMessage, ChatMessageBuilder, ChatRole};
pub use prompt::{Prompt, Temperature, DEFAULT_MODEL};
pub use traits::{ChatTransport, FragmentStream};

pub(crate) use sse::decode_sse_stream;
