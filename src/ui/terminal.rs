use std::io::{self, Write};

use colored::Colorize;

use super::ChatView;
use crate::config::APP_NAME;
use crate::models::{Attachment, Message, Role};
use crate::services::markdown::render_markdown;

pub const HELP_TEXT: &str = "\
Commands:
  /new               start a new chat
  /attach <path>...  queue images for the next message
  /detach <index>    remove a queued image
  /pending           list queued images
  /history           reprint the conversation
  /export <path>     save the conversation as Markdown
  /help              show this help
  /quit              exit
Anything else is sent as a message. Ctrl-C stops a reply in progress.";

/// Progress of the model turn currently being printed.
struct LiveTurn {
    id: String,
    printed: usize,
}

/// Line-oriented view that streams replies as they arrive.
pub struct TerminalView<W: Write> {
    out: W,
    color: bool,
    /// Turns already printed in full.
    shown: usize,
    live: Option<LiveTurn>,
    welcomed: bool,
}

impl TerminalView<io::Stdout> {
    pub fn stdout(color: bool) -> Self {
        Self::new(io::stdout(), color)
    }
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            shown: 0,
            live: None,
            welcomed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn print_welcome(&mut self) {
        let title = format!("{}: how can I help you today?", APP_NAME);
        let body = "I can explain concepts, analyze images, write code, or just chat.\n\
                    Attach a photo with /attach to get started with visual tasks. /help lists commands.";
        let title = if self.color {
            title.bold().to_string()
        } else {
            title
        };
        let result = writeln!(self.out, "{}\n{}\n", title, body);
        self.report(result);
    }

    pub fn print_info(&mut self, text: &str) {
        let text = if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        };
        let result = writeln!(self.out, "{}", text);
        self.report(result);
    }

    pub fn print_help(&mut self) {
        let result = writeln!(self.out, "{}", HELP_TEXT);
        self.report(result);
    }

    pub fn print_pending(&mut self, pending: &[Attachment]) {
        if pending.is_empty() {
            self.print_info("No images queued.");
            return;
        }
        let lines: Vec<String> = pending
            .iter()
            .enumerate()
            .map(|(i, att)| format!("  [{}] {} ({})", i, att.preview, att.mime_type))
            .collect();
        let result = writeln!(self.out, "{}", lines.join("\n"));
        self.report(result);
    }

    /// Reprint every finished turn with markdown formatting.
    pub fn print_history(&mut self, messages: &[Message]) {
        if messages.is_empty() {
            self.print_info("Nothing here yet.");
            return;
        }
        for msg in messages {
            let result = self.write_history_entry(msg);
            self.report(result);
        }
    }

    fn write_history_entry(&mut self, msg: &Message) -> io::Result<()> {
        let body = if msg.is_error {
            self.paint_error(&msg.text)
        } else if msg.role == Role::User {
            msg.text.clone()
        } else {
            render_markdown(&msg.text, self.color)
        };
        self.write_label(msg)?;
        self.write_attachments(&msg.attachments)?;
        writeln!(self.out, "{}\n", body)
    }

    fn paint_error(&self, text: &str) -> String {
        if self.color {
            text.red().to_string()
        } else {
            format!("! {}", text)
        }
    }

    fn write_label(&mut self, msg: &Message) -> io::Result<()> {
        let label = match msg.role {
            Role::User => "You",
            Role::Model => APP_NAME,
        };
        if self.color {
            let label = match msg.role {
                Role::User => label.blue().bold(),
                Role::Model => label.green().bold(),
            };
            writeln!(self.out, "{}", label)
        } else {
            writeln!(self.out, "{}:", label)
        }
    }

    fn write_attachments(&mut self, attachments: &[Attachment]) -> io::Result<()> {
        for att in attachments {
            let line = format!("[image: {}]", att.preview);
            if self.color {
                writeln!(self.out, "{}", line.dimmed())?;
            } else {
                writeln!(self.out, "{}", line)?;
            }
        }
        Ok(())
    }

    fn write_turn(&mut self, msg: &Message, is_loading: bool) -> io::Result<bool> {
        match msg.role {
            Role::User => {
                self.write_label(msg)?;
                self.write_attachments(&msg.attachments)?;
                writeln!(self.out, "{}\n", msg.text)?;
                Ok(true)
            }
            Role::Model => {
                let continuing = self
                    .live
                    .as_ref()
                    .filter(|live| live.id == msg.id)
                    .map(|live| live.printed);
                let printed = match continuing {
                    Some(printed) => printed,
                    None => {
                        self.write_label(msg)?;
                        0
                    }
                };

                if msg.is_error {
                    if printed > 0 {
                        writeln!(self.out)?;
                    }
                    let error = self.paint_error(&msg.text);
                    writeln!(self.out, "{}\n", error)?;
                    self.live = None;
                    return Ok(true);
                }

                let fresh = msg.text.get(printed..).unwrap_or_default();
                write!(self.out, "{}", fresh)?;

                if msg.is_streaming {
                    self.live = Some(LiveTurn {
                        id: msg.id.clone(),
                        printed: msg.text.len(),
                    });
                    return Ok(false);
                }

                self.live = None;
                writeln!(self.out)?;
                if !is_loading {
                    writeln!(self.out)?;
                }
                Ok(true)
            }
        }
    }

    fn report(&mut self, result: io::Result<()>) {
        if let Err(e) = result.and_then(|_| self.out.flush()) {
            tracing::warn!("Failed to write to terminal: {}", e);
        }
    }
}

impl<W: Write> ChatView for TerminalView<W> {
    fn render(&mut self, messages: &[Message], is_loading: bool) {
        if messages.is_empty() {
            self.shown = 0;
            self.live = None;
            if !self.welcomed {
                self.welcomed = true;
                self.print_welcome();
            }
            return;
        }
        self.welcomed = false;

        if messages.len() < self.shown {
            // Cleared and refilled since the last render
            self.shown = 0;
            self.live = None;
        }

        let mut result = Ok(());
        for msg in &messages[self.shown..] {
            match self.write_turn(msg, is_loading) {
                Ok(true) => self.shown += 1,
                Ok(false) => break,
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        self.report(result);
    }
}
