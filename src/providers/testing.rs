//! Scripted provider used by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::traits::AiProvider;
use super::types::{ChatRequest, ProviderError, StreamEvent};

pub enum Reply {
    Events(Vec<StreamEvent>),
    Reject(String),
}

impl Reply {
    pub fn tokens(tokens: &[&str]) -> Self {
        let mut events: Vec<StreamEvent> = tokens
            .iter()
            .map(|t| StreamEvent::Token(t.to_string()))
            .collect();
        events.push(StreamEvent::Done {
            tokens_in: None,
            tokens_out: None,
        });
        Reply::Events(events)
    }

    pub fn tokens_then_error(tokens: &[&str], error: &str) -> Self {
        let mut events: Vec<StreamEvent> = tokens
            .iter()
            .map(|t| StreamEvent::Token(t.to_string()))
            .collect();
        events.push(StreamEvent::Error(error.to_string()));
        Reply::Events(events)
    }
}

#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn stream_message(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        self.requests.lock().unwrap().push(request);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::tokens(&[]));

        match reply {
            Reply::Reject(msg) => Err(ProviderError::RequestFailed(msg)),
            Reply::Events(events) => {
                for event in events {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Ok(())
            }
        }
    }
}
