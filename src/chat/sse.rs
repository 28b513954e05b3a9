use std::pin::Pin;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};

use crate::error::ChatError;

const EVENT_DELIMITER: &str = "\n\n";

/// Incremental decoder for server-sent event payloads.
///
/// Transport chunks may split both UTF-8 sequences and event boundaries;
/// the decoder buffers partial input and yields only complete events.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    pending_bytes: Vec<u8>,
    pending_text: String,
}

impl SseDecoder {
    /// Consume a transport chunk and return the complete events it closed.
    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.append_utf8(bytes);
        self.drain_events()
    }

    fn append_utf8(&mut self, bytes: &[u8]) {
        self.pending_bytes.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending_bytes) {
            Ok(text) => {
                self.pending_text.push_str(text);
                self.pending_bytes.clear();
            }
            Err(err) => {
                // Keep the split tail buffered until the rest arrives.
                let valid_up_to = err.valid_up_to();
                if valid_up_to > 0 {
                    let valid = String::from_utf8_lossy(&self.pending_bytes[..valid_up_to]);
                    self.pending_text.push_str(&valid);
                    self.pending_bytes.drain(..valid_up_to);
                }
            }
        }
    }

    fn drain_events(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        while let Some(pos) = self.pending_text.find(EVENT_DELIMITER) {
            let end = pos + EVENT_DELIMITER.len();
            events.push(self.pending_text[..end].to_string());
            self.pending_text.drain(..end);
        }
        events
    }
}

/// Adapts a streaming HTTP response into a fragment stream.
///
/// `parser` maps one complete SSE event to an optional fragment; `Ok(None)`
/// skips the event (comments, `[DONE]` markers and the like).
pub(crate) fn decode_sse_stream<F>(
    response: reqwest::Response,
    parser: F,
) -> Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>
where
    F: Fn(&str) -> Result<Option<String>, ChatError> + Send + 'static,
{
    let stream = response
        .bytes_stream()
        .scan(SseDecoder::default(), move |decoder, chunk| {
            let items = handle_chunk(decoder, chunk, &parser);
            async move { Some(items) }
        })
        .flat_map(futures::stream::iter);

    Box::pin(stream)
}

fn handle_chunk<F>(
    decoder: &mut SseDecoder,
    chunk: Result<Bytes, reqwest::Error>,
    parser: &F,
) -> Vec<Result<String, ChatError>>
where
    F: Fn(&str) -> Result<Option<String>, ChatError>,
{
    let bytes = match chunk {
        Ok(bytes) => bytes,
        Err(err) => return vec![Err(ChatError::Http(err.to_string()))],
    };

    decoder
        .feed(&bytes)
        .into_iter()
        .filter_map(|event| parser(&event).transpose())
        .collect()
}

#[cfg(test)]
#[path = "sse_tests.rs"]
mod tests;
