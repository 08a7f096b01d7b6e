pub mod terminal;

use crate::models::Message;

pub use terminal::TerminalView;

/// Receives the transcript whenever it changes.
pub trait ChatView {
    /// `messages` is the whole transcript in order; `is_loading` is set while
    /// a reply is in flight.
    fn render(&mut self, messages: &[Message], is_loading: bool);
}
