pub mod attachments;
pub mod chat;
pub mod export;
pub mod markdown;
pub mod session;
pub mod transcript;

pub use attachments::PendingAttachments;
pub use session::{ChatSession, ReplyStream, SessionHolder};
pub use transcript::MessageStore;
