use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::ChatError;

/// Result from streaming: either a token update, completion, or error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamResult {
    Token {
        message_id: String,
        accumulated: String,
    },
    Done {
        message_id: String,
        full_content: String,
    },
    Error {
        message_id: String,
        error: String,
    },
}

/// Drive a fragment stream for the turn `message_id`.
///
/// `on_event` sees the full accumulated text after every fragment, then
/// exactly one `Done` or `Error`. Cancelling `cancel_token` keeps whatever has
/// arrived so far, or reports an error if nothing has.
pub async fn run_streaming<S, F>(
    mut stream: S,
    message_id: String,
    cancel_token: CancellationToken,
    mut on_event: F,
) where
    S: Stream<Item = Result<String, ChatError>> + Unpin,
    F: FnMut(StreamResult),
{
    let mut accumulated = String::new();

    loop {
        tokio::select! {
            biased;

            _ = cancel_token.cancelled() => {
                tracing::debug!(message_id = %message_id, "Generation cancelled");
                if !accumulated.is_empty() {
                    on_event(StreamResult::Done {
                        message_id,
                        full_content: accumulated,
                    });
                } else {
                    on_event(StreamResult::Error {
                        message_id,
                        error: "Generation stopped".to_string(),
                    });
                }
                return;
            }
            fragment = stream.next() => {
                match fragment {
                    Some(Ok(text)) => {
                        accumulated.push_str(&text);
                        on_event(StreamResult::Token {
                            message_id: message_id.clone(),
                            accumulated: accumulated.clone(),
                        });
                    }
                    Some(Err(e)) => {
                        on_event(StreamResult::Error {
                            message_id,
                            error: e.to_string(),
                        });
                        return;
                    }
                    None => {
                        on_event(StreamResult::Done {
                            message_id,
                            full_content: accumulated,
                        });
                        return;
                    }
                }
            }
        }
    }
}
