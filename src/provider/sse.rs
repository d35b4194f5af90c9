//! Server-sent-event decoding for Responses-style streams.

use std::fmt::Display;

use futures::{Stream, StreamExt};

use super::responses::parse_event;
use super::ProviderEventStream;
use crate::error::DeltaError;

/// Incremental SSE frame splitter.
///
/// Collects `data:` lines until a blank line ends the frame. Comment lines
/// (`:`) and other fields are skipped. Input is buffered as bytes and only
/// complete lines are decoded, so a UTF-8 sequence may straddle chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    pending_data: Vec<String>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the data of every frame it completed.
    ///
    /// Stops at `[DONE]`; later input is ignored.
    pub fn push(&mut self, chunk: impl AsRef<[u8]>) -> Vec<String> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }
        self.buffer.extend_from_slice(chunk.as_ref());

        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if self.pending_data.is_empty() {
                    continue;
                }
                let data = self.pending_data.join("\n");
                self.pending_data.clear();
                if data == "[DONE]" {
                    self.done = true;
                    self.buffer.clear();
                    break;
                }
                frames.push(data);
            } else if line.starts_with(':') {
                continue;
            } else if let Some(rest) = line.strip_prefix("data:") {
                let rest = rest.strip_prefix(' ').unwrap_or(rest);
                self.pending_data.push(rest.to_string());
            }
        }
        frames
    }

    /// Whether the `[DONE]` sentinel was seen.
    pub fn is_done(&self) -> bool {
        self.done
    }
}

/// Decode a byte stream of SSE frames into provider events.
///
/// Transport errors become [`DeltaError::Provider`]; a frame that is not
/// JSON is a protocol error.
pub fn decode_events<S, B, E>(bytes: S) -> ProviderEventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let stream = async_stream::try_stream! {
        let mut decoder = SseDecoder::new();
        futures::pin_mut!(bytes);

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|err| DeltaError::provider("sse", err.to_string()))?;
            for data in decoder.push(chunk) {
                let event: serde_json::Value = serde_json::from_str(&data).map_err(|err| {
                    DeltaError::protocol(format!("SSE frame is not JSON ({err}): {data}"))
                })?;
                yield parse_event(&event)?;
            }
            if decoder.is_done() {
                break;
            }
        }
    };
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{OutputItemKind, ProviderEvent};

    #[test]
    fn frames_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push("event: x\ndata: {\"a\":").is_empty());
        let frames = decoder.push("1}\n\n: keep-alive\n\ndata: 2\r\n\r\n");
        assert_eq!(frames, vec!["{\"a\":1}".to_string(), "2".to_string()]);
    }

    #[test]
    fn multi_line_data_is_joined() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push("data: a\ndata: b\n\n");
        assert_eq!(frames, vec!["a\nb".to_string()]);
    }

    #[test]
    fn done_stops_decoding() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push("data: 1\n\ndata: [DONE]\n\ndata: 2\n\n");
        assert_eq!(frames, vec!["1".to_string()]);
        assert!(decoder.is_done());
        assert!(decoder.push("data: 3\n\n").is_empty());
    }

    #[tokio::test]
    async fn decodes_a_byte_stream_into_events() {
        let body = concat!(
            "data: {\"type\":\"response.created\",\"response\":{\"id\":\"resp_1\"}}\n\n",
            "data: {\"type\":\"response.output_item.added\",\"item\":{\"id\":\"msg_1\",\"type\":\"message\"}}\n\n",
            "data: [DONE]\n\n",
        );
        let (head, tail) = body.split_at(40);
        let chunks = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(head.as_bytes().to_vec()),
            Ok(tail.as_bytes().to_vec()),
        ]);
        let events: Vec<_> = decode_events(chunks).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1].as_ref().unwrap(),
            &ProviderEvent::ItemAdded {
                item_id: "msg_1".into(),
                kind: OutputItemKind::Message
            }
        );
    }

    #[tokio::test]
    async fn multi_byte_characters_survive_chunk_boundaries() {
        let frame = "data: {\"type\":\"response.output_text.delta\",\"item_id\":\"msg_1\",\"delta\":\"café\"}\n\n";
        let bytes = frame.as_bytes();
        // Split between the two bytes of "é".
        let split = frame.find('é').unwrap() + 1;
        let chunks = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(bytes[..split].to_vec()),
            Ok(bytes[split..].to_vec()),
        ]);
        let events: Vec<_> = decode_events(chunks).collect().await;
        assert_eq!(
            events[0].as_ref().unwrap(),
            &ProviderEvent::TextDelta {
                item_id: "msg_1".into(),
                index: 0,
                text: "café".into()
            }
        );
    }

    #[tokio::test]
    async fn non_json_frames_are_protocol_errors() {
        let chunks = futures::stream::iter(vec![Ok::<_, std::io::Error>(b"data: nope\n\n".to_vec())]);
        let events: Vec<_> = decode_events(chunks).collect().await;
        assert!(matches!(events[0], Err(DeltaError::Protocol(_))));
    }
}
