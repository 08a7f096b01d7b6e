use futures::StreamExt;
use tokio::sync::mpsc;

use super::models::GeminiResponse;
use crate::providers::types::StreamEvent;

/// Incremental decoder for a `text/event-stream` body.
///
/// Bytes go in as they arrive from the network; the `data:` payload of every
/// complete event comes out. Multi-byte characters split across network chunks
/// are held back until the rest arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    byte_buf: Vec<u8>,
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.byte_buf.extend_from_slice(bytes);

        loop {
            match std::str::from_utf8(&self.byte_buf) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.byte_buf.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.byte_buf[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.byte_buf.drain(..valid + len);
                        }
                        None => {
                            // Truncated character; the rest comes with the next chunk
                            self.byte_buf.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        // Gemini uses \r\n line endings; a lone trailing \r waits for its \n
        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut payloads = Vec::new();
        while let Some(event_end) = self.buffer.find("\n\n") {
            let event_text: String = self.buffer.drain(..event_end + 2).collect();
            if let Some(data) = Self::event_data(&event_text) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flush a trailing event that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        Self::event_data(&rest)
    }

    fn event_data(event_text: &str) -> Option<String> {
        let mut data = String::new();
        for line in event_text.lines() {
            if let Some(payload) = line.strip_prefix("data: ") {
                data.push_str(payload);
            } else if let Some(payload) = line.strip_prefix("data:") {
                data.push_str(payload);
            }
        }
        if data.is_empty() {
            None
        } else {
            Some(data)
        }
    }
}

#[derive(Debug, Default)]
struct Usage {
    tokens_in: Option<i64>,
    tokens_out: Option<i64>,
}

enum Flow {
    Continue,
    Stop,
}

pub async fn parse_sse_stream(response: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::new();
    let mut usage = Usage::default();

    while let Some(chunk_result) = stream.next().await {
        let bytes = match chunk_result {
            Ok(b) => b,
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::Error(format!("Stream error: {}", e)))
                    .await;
                return;
            }
        };

        for data in decoder.push(&bytes) {
            if let Flow::Stop = handle_payload(&data, &tx, &mut usage).await {
                return;
            }
        }
    }

    if let Some(data) = decoder.finish() {
        if let Flow::Stop = handle_payload(&data, &tx, &mut usage).await {
            return;
        }
    }

    let _ = tx
        .send(StreamEvent::Done {
            tokens_in: usage.tokens_in,
            tokens_out: usage.tokens_out,
        })
        .await;
}

async fn handle_payload(data: &str, tx: &mpsc::Sender<StreamEvent>, usage: &mut Usage) -> Flow {
    let response = match serde_json::from_str::<GeminiResponse>(data) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Failed to parse SSE data: {}", e);
            let _ = tx
                .send(StreamEvent::Error(format!("Invalid response: {}", e)))
                .await;
            return Flow::Stop;
        }
    };

    if let Some(error) = &response.error {
        let msg = error
            .message
            .clone()
            .unwrap_or_else(|| "Unknown error".to_string());
        let _ = tx.send(StreamEvent::Error(msg)).await;
        return Flow::Stop;
    }

    if let Some(text) = response.text() {
        if tx.send(StreamEvent::Token(text)).await.is_err() {
            tracing::debug!("Stream receiver dropped, stopping");
            return Flow::Stop;
        }
    }

    // The last chunk usually has the totals
    if let Some(meta) = &response.usage_metadata {
        if meta.prompt_token_count.is_some() {
            usage.tokens_in = meta.prompt_token_count;
        }
        if meta.candidates_token_count.is_some() {
            usage.tokens_out = meta.candidates_token_count;
        }
    }

    Flow::Continue
}
