use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attachment::Attachment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    pub timestamp: DateTime<Utc>,
    pub is_streaming: bool,
    pub is_error: bool,
}

impl Message {
    pub fn user(text: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::User,
            text: text.into(),
            attachments,
            timestamp: Utc::now(),
            is_streaming: false,
            is_error: false,
        }
    }

    /// An empty model turn that receives streamed text.
    pub fn model_placeholder() -> Self {
        Self {
            id: new_message_id(),
            role: Role::Model,
            text: String::new(),
            attachments: Vec::new(),
            timestamp: Utc::now(),
            is_streaming: true,
            is_error: false,
        }
    }
}

pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}
