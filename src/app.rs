use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, RESPONSE_ERROR_TEXT};
use crate::models::{Attachment, Message};
use crate::providers::AiProvider;
use crate::services::chat::{self, StreamResult};
use crate::services::{MessageStore, PendingAttachments, SessionHolder};
use crate::ui::ChatView;

/// Top-level owner of the conversation: the live session, the transcript,
/// and the images queued for the next message.
pub struct ChatController {
    sessions: SessionHolder,
    store: MessageStore,
    pending: PendingAttachments,
    model: String,
    is_loading: bool,
}

impl ChatController {
    pub fn new(provider: Arc<dyn AiProvider>, config: AppConfig) -> Self {
        let model = config.model.clone();
        let mut sessions = SessionHolder::new(provider, config);
        if let Err(e) = sessions.start() {
            // Retried lazily on the first send
            tracing::warn!("{}", e);
        }

        Self {
            sessions,
            store: MessageStore::new(),
            pending: PendingAttachments::new(),
            model,
            is_loading: false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn pending(&self) -> &[Attachment] {
        self.pending.items()
    }

    pub async fn attach<P: AsRef<Path>>(&mut self, paths: &[P]) -> usize {
        self.pending.add_files(paths).await
    }

    pub fn remove_attachment(&mut self, index: usize) -> Option<Attachment> {
        self.pending.remove(index)
    }

    /// Replace the session and clear the transcript.
    pub fn new_chat(&mut self, view: &mut dyn ChatView) {
        if let Err(e) = self.sessions.start() {
            tracing::warn!("{}", e);
        }
        self.store.clear();
        view.render(self.store.messages(), self.is_loading);
    }

    /// Send `text` with the queued images and stream the reply into the
    /// transcript. Returns false without doing anything when there is nothing
    /// to send or a reply is already in flight.
    pub async fn send(
        &mut self,
        text: &str,
        view: &mut dyn ChatView,
        cancel_token: CancellationToken,
    ) -> bool {
        if self.is_loading || (text.trim().is_empty() && self.pending.is_empty()) {
            return false;
        }

        let attachments = self.pending.take();
        self.store.push(Message::user(text, attachments.clone()));

        let placeholder = Message::model_placeholder();
        let message_id = placeholder.id.clone();
        self.store.push(placeholder);

        self.is_loading = true;
        view.render(self.store.messages(), true);

        match self.sessions.send_message_stream(text, &attachments) {
            Ok(stream) => {
                let store = &mut self.store;
                chat::run_streaming(stream, message_id, cancel_token, |event| {
                    apply_stream_result(store, event);
                    view.render(store.messages(), true);
                })
                .await;
            }
            Err(e) => {
                tracing::error!("Failed to generate response: {}", e);
                self.store.fail(&message_id, RESPONSE_ERROR_TEXT);
            }
        }

        self.is_loading = false;
        view.render(self.store.messages(), false);
        true
    }
}

fn apply_stream_result(store: &mut MessageStore, event: StreamResult) {
    match event {
        StreamResult::Token {
            message_id,
            accumulated,
        } => {
            store.set_text(&message_id, &accumulated);
        }
        StreamResult::Done {
            message_id,
            full_content,
        } => {
            store.set_text(&message_id, &full_content);
            store.finish(&message_id);
        }
        StreamResult::Error { message_id, error } => {
            tracing::error!("Failed to generate response: {}", error);
            store.fail(&message_id, RESPONSE_ERROR_TEXT);
        }
    }
}
