use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::ChatError;
use crate::models::{Attachment, Role};
use crate::providers::{AiProvider, ChatMessage, ChatRequest, ContentPart, StreamEvent};

/// Fragments buffered between the provider task and the consumer.
const STREAM_CHANNEL_CAPACITY: usize = 64;

type History = Arc<Mutex<Vec<ChatMessage>>>;

/// Build the parts for one user turn: images first, in attachment order, then
/// the text if it is not blank. Attachments without a payload are skipped.
pub fn build_parts(text: &str, attachments: &[Attachment]) -> Vec<ContentPart> {
    let mut parts: Vec<ContentPart> = attachments
        .iter()
        .filter_map(|att| {
            att.base64_data.as_ref().map(|data| ContentPart::InlineData {
                mime_type: att.mime_type.clone(),
                data: data.clone(),
            })
        })
        .collect();

    if !text.trim().is_empty() {
        parts.push(ContentPart::Text(text.to_string()));
    }

    parts
}

/// One conversation with the model. History only grows when an exchange
/// completes, so a failed send can simply be retried.
pub struct ChatSession {
    id: String,
    provider: Arc<dyn AiProvider>,
    config: AppConfig,
    history: History,
}

impl ChatSession {
    pub fn new(provider: Arc<dyn AiProvider>, config: AppConfig) -> Result<Self, ChatError> {
        if config.api_key.trim().is_empty() {
            return Err(ChatError::Initialization(
                "no API key configured (set GEMINI_API_KEY or pass --api-key)".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        tracing::debug!(session = %id, provider = provider.name(), model = %config.model, "Chat session created");

        Ok(Self {
            id,
            provider,
            config,
            history: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of committed messages (user and model) in this session.
    pub fn history_len(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Start a streamed reply to `text` plus `attachments`.
    ///
    /// The request runs on its own task; fragments are pulled from the
    /// returned stream in the order the transport delivers them.
    pub fn send_message_stream(&self, text: &str, attachments: &[Attachment]) -> ReplyStream {
        let user = ChatMessage {
            role: Role::User,
            parts: build_parts(text, attachments),
        };

        let mut messages = self
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        messages.push(user.clone());

        let request = ChatRequest {
            api_key: self.config.api_key.clone(),
            model: self.config.model.clone(),
            base_url: self.config.base_url.clone(),
            system_prompt: Some(self.config.system_prompt.clone()),
            messages,
        };

        let (tx, rx) = mpsc::channel::<StreamEvent>(STREAM_CHANNEL_CAPACITY);
        let provider = self.provider.clone();
        let session_id = self.id.clone();

        tokio::spawn(async move {
            if let Err(e) = provider.stream_message(request, tx.clone()).await {
                tracing::error!(session = %session_id, "Stream request failed: {}", e);
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
            }
        });

        ReplyStream {
            rx,
            history: self.history.clone(),
            pending_user: Some(user),
            reply: String::new(),
            finished: false,
        }
    }
}

/// Text fragments of one model reply.
///
/// Ends after the first error. Dropping it closes the channel, which stops the
/// provider task at its next send.
pub struct ReplyStream {
    rx: mpsc::Receiver<StreamEvent>,
    history: History,
    pending_user: Option<ChatMessage>,
    reply: String,
    finished: bool,
}

impl ReplyStream {
    fn commit(&mut self) {
        if let Some(user) = self.pending_user.take() {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            history.push(user);
            history.push(ChatMessage::model_text(std::mem::take(&mut self.reply)));
        }
    }
}

impl Stream for ReplyStream {
    type Item = Result<String, ChatError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            let event = match this.rx.poll_recv(cx) {
                Poll::Ready(event) => event,
                Poll::Pending => return Poll::Pending,
            };

            match event {
                Some(StreamEvent::Token(text)) => {
                    if text.is_empty() {
                        continue;
                    }
                    this.reply.push_str(&text);
                    return Poll::Ready(Some(Ok(text)));
                }
                Some(StreamEvent::Done {
                    tokens_in,
                    tokens_out,
                }) => {
                    tracing::debug!(?tokens_in, ?tokens_out, "Reply complete");
                    this.finished = true;
                    this.commit();
                    return Poll::Ready(None);
                }
                Some(StreamEvent::Error(error)) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(ChatError::Transport(error))));
                }
                None => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(ChatError::Transport(
                        "Stream ended unexpectedly".to_string(),
                    ))));
                }
            }
        }
    }
}

/// Owns the single live session and replaces it on demand.
pub struct SessionHolder {
    provider: Arc<dyn AiProvider>,
    config: AppConfig,
    session: Option<ChatSession>,
}

impl SessionHolder {
    pub fn new(provider: Arc<dyn AiProvider>, config: AppConfig) -> Self {
        Self {
            provider,
            config,
            session: None,
        }
    }

    /// Discard the current session and create a fresh one. On failure the
    /// holder is left empty.
    pub fn start(&mut self) -> Result<(), ChatError> {
        self.session = None;
        self.session = Some(ChatSession::new(self.provider.clone(), self.config.clone())?);
        Ok(())
    }

    pub fn current(&self) -> Option<&ChatSession> {
        self.session.as_ref()
    }

    /// The live session, starting one first if there is none.
    pub fn session(&mut self) -> Result<&ChatSession, ChatError> {
        if self.session.is_none() {
            self.start()?;
        }
        self.session
            .as_ref()
            .ok_or_else(|| ChatError::Initialization("Failed to initialize chat session".to_string()))
    }

    pub fn send_message_stream(
        &mut self,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<ReplyStream, ChatError> {
        Ok(self.session()?.send_message_stream(text, attachments))
    }
}
