use crate::models::Message;

/// The turns of the current conversation, in order.
///
/// Turns are addressed by id. A turn's text can only change while it is
/// streaming; once finished or failed it is frozen.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn streaming_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_streaming).count()
    }

    /// Replace the text of a streaming turn. Returns false if the turn is
    /// unknown or already frozen.
    pub fn set_text(&mut self, id: &str, text: &str) -> bool {
        match self.streaming_mut(id) {
            Some(msg) => {
                msg.text.clear();
                msg.text.push_str(text);
                true
            }
            None => false,
        }
    }

    pub fn finish(&mut self, id: &str) -> bool {
        match self.streaming_mut(id) {
            Some(msg) => {
                msg.is_streaming = false;
                true
            }
            None => false,
        }
    }

    /// Mark a streaming turn as failed, replacing whatever text it had.
    pub fn fail(&mut self, id: &str, error_text: &str) -> bool {
        match self.streaming_mut(id) {
            Some(msg) => {
                msg.is_streaming = false;
                msg.is_error = true;
                msg.text = error_text.to_string();
                true
            }
            None => false,
        }
    }

    fn streaming_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .find(|m| m.id == id && m.is_streaming)
    }
}
