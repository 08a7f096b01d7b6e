use serde::{Deserialize, Serialize};

/// An image the user attached to a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// What the user sees for this image: its file name.
    pub preview: String,
    pub mime_type: String,
    /// Base64 payload. Attachments without one are not sent.
    #[serde(skip)]
    pub base64_data: Option<String>,
}
