use colored::Colorize;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// Render markdown as terminal text. With `color` off, formatting is dropped
/// and structure is kept with plain-text markers.
pub fn render_markdown(input: &str, color: bool) -> String {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let mut ctx = RenderContext::new(color);
    for event in Parser::new_ext(input, options) {
        ctx.handle_event(&event);
    }
    ctx.finish()
}

struct RenderContext {
    color: bool,
    lines: Vec<String>,
    current: String,
    // Inline formatting state
    bold: bool,
    italic: bool,
    strikethrough: bool,
    link_url: Option<String>,
    // Block-level state
    heading_level: Option<u8>,
    in_code_block: bool,
    quote_depth: usize,
    /// One entry per open list: next number for ordered lists, `None` for bullets.
    lists: Vec<Option<u64>>,
    pending_marker: Option<String>,
}

impl RenderContext {
    fn new(color: bool) -> Self {
        Self {
            color,
            lines: Vec::new(),
            current: String::new(),
            bold: false,
            italic: false,
            strikethrough: false,
            link_url: None,
            heading_level: None,
            in_code_block: false,
            quote_depth: 0,
            lists: Vec::new(),
            pending_marker: None,
        }
    }

    fn handle_event(&mut self, event: &Event) {
        match event {
            Event::Start(tag) => self.handle_start(tag),
            Event::End(tag) => self.handle_end(tag),
            Event::Text(text) => self.handle_text(text),
            Event::Code(code) => {
                let span = self.paint_inline_code(code);
                self.current.push_str(&span);
            }
            Event::SoftBreak => self.current.push(' '),
            Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.flush_line();
                let rule = if self.color {
                    "─".repeat(40).dimmed().to_string()
                } else {
                    "---".to_string()
                };
                self.lines.push(rule);
                self.blank_line();
            }
            _ => {}
        }
    }

    fn handle_start(&mut self, tag: &Tag) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush_line();
                self.heading_level = Some(heading_level_to_u8(level));
            }
            Tag::Strong => self.bold = true,
            Tag::Emphasis => self.italic = true,
            Tag::Strikethrough => self.strikethrough = true,
            Tag::Link { dest_url, .. } => {
                self.link_url = Some(dest_url.to_string());
            }
            Tag::CodeBlock(kind) => {
                self.flush_line();
                self.in_code_block = true;
                if let CodeBlockKind::Fenced(lang) = kind {
                    let lang = lang.trim();
                    if !lang.is_empty() {
                        let label = if self.color {
                            lang.to_uppercase().dimmed().bold().to_string()
                        } else {
                            format!("[{}]", lang)
                        };
                        let line = format!("{}{}", self.prefix(), label);
                        self.lines.push(line);
                    }
                }
            }
            Tag::BlockQuote(_) => {
                self.flush_line();
                self.quote_depth += 1;
            }
            Tag::List(start) => {
                self.flush_line();
                self.lists.push(*start);
            }
            Tag::Item => {
                self.flush_line();
                let color = self.color;
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ if color => "• ".to_string(),
                    _ => "- ".to_string(),
                };
                self.pending_marker = Some(marker);
            }
            _ => {}
        }
    }

    fn handle_end(&mut self, tag: &TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.flush_line();
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            TagEnd::Heading(_) => {
                let text = std::mem::take(&mut self.current);
                let level = self.heading_level.take().unwrap_or(1);
                self.current = if self.color {
                    text.bold().underline().to_string()
                } else {
                    format!("{} {}", "#".repeat(level as usize), text)
                };
                self.flush_line();
                self.blank_line();
            }
            TagEnd::Strong => self.bold = false,
            TagEnd::Emphasis => self.italic = false,
            TagEnd::Strikethrough => self.strikethrough = false,
            TagEnd::Link => {
                if let Some(url) = self.link_url.take() {
                    let suffix = format!(" ({})", url);
                    if self.color {
                        self.current.push_str(&suffix.dimmed().to_string());
                    } else {
                        self.current.push_str(&suffix);
                    }
                }
            }
            TagEnd::CodeBlock => {
                if !self.current.is_empty() {
                    self.push_code_line();
                }
                self.in_code_block = false;
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            TagEnd::BlockQuote(_) => {
                self.flush_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank_line();
            }
            TagEnd::List(_) => {
                self.flush_line();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            TagEnd::Item => self.flush_line(),
            TagEnd::TableCell => self.current.push_str(" | "),
            TagEnd::TableHead | TagEnd::TableRow => self.flush_line(),
            TagEnd::Table => self.blank_line(),
            _ => {}
        }
    }

    fn handle_text(&mut self, text: &pulldown_cmark::CowStr) {
        if self.in_code_block {
            for piece in text.split_inclusive('\n') {
                match piece.strip_suffix('\n') {
                    Some(line) => {
                        self.current.push_str(line);
                        self.push_code_line();
                    }
                    None => self.current.push_str(piece),
                }
            }
            return;
        }

        let span = self.paint_inline(text);
        self.current.push_str(&span);
    }

    fn paint_inline(&self, text: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        let mut span = text.normal();
        if self.bold {
            span = span.bold();
        }
        if self.italic {
            span = span.italic();
        }
        if self.strikethrough {
            span = span.strikethrough();
        }
        if self.link_url.is_some() {
            span = span.underline().blue();
        }
        span.to_string()
    }

    fn paint_inline_code(&self, code: &str) -> String {
        if self.color {
            code.cyan().to_string()
        } else {
            format!("`{}`", code)
        }
    }

    fn prefix(&self) -> String {
        let quote = if self.color { "│ " } else { "> " };
        let mut prefix = quote.repeat(self.quote_depth);
        if !self.lists.is_empty() {
            prefix.push_str(&"  ".repeat(self.lists.len() - 1));
        }
        prefix
    }

    fn push_code_line(&mut self) {
        let code = std::mem::take(&mut self.current);
        let code = if self.color {
            code.yellow().to_string()
        } else {
            code
        };
        let line = format!("{}    {}", self.prefix(), code);
        self.lines.push(line);
    }

    fn flush_line(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let mut line = self.prefix();
        match self.pending_marker.take() {
            Some(marker) => line.push_str(&marker),
            None if !self.lists.is_empty() => line.push_str("  "),
            None => {}
        }
        line.push_str(&std::mem::take(&mut self.current));
        self.lines.push(line);
    }

    fn blank_line(&mut self) {
        if matches!(self.lines.last(), Some(last) if !last.is_empty()) {
            self.lines.push(String::new());
        }
    }

    fn finish(mut self) -> String {
        self.flush_line();
        while matches!(self.lines.last(), Some(last) if last.is_empty()) {
            self.lines.pop();
        }
        self.lines.join("\n")
    }
}

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(input: &str) -> String {
        render_markdown(input, false)
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(plain("Hello world"), "Hello world");
    }

    #[test]
    fn test_plain_drops_emphasis_markers() {
        assert_eq!(plain("**bold** and *italic*"), "bold and italic");
    }

    #[test]
    fn test_paragraphs_separated_by_blank_line() {
        assert_eq!(plain("one\n\ntwo"), "one\n\ntwo");
    }

    #[test]
    fn test_code_block_indented_with_language() {
        assert_eq!(
            plain("```rust\nfn main() {}\nlet x = 1;\n```"),
            "[rust]\n    fn main() {}\n    let x = 1;"
        );
    }

    #[test]
    fn test_heading() {
        assert_eq!(plain("## Title\n\nbody"), "## Title\n\nbody");
    }

    #[test]
    fn test_unordered_list() {
        assert_eq!(plain("- one\n- two\n- three"), "- one\n- two\n- three");
    }

    #[test]
    fn test_ordered_list_numbers_from_start() {
        assert_eq!(plain("3. c\n4. d"), "3. c\n4. d");
    }

    #[test]
    fn test_nested_list_indents() {
        assert_eq!(plain("- outer\n  - inner"), "- outer\n  - inner");
    }

    #[test]
    fn test_blockquote() {
        assert_eq!(plain("> quoted text"), "> quoted text");
    }

    #[test]
    fn test_horizontal_rule() {
        assert_eq!(plain("above\n\n---\n\nbelow"), "above\n\n---\n\nbelow");
    }

    #[test]
    fn test_inline_code_and_link() {
        assert_eq!(
            plain("Use `foo()` from [docs](https://example.com)"),
            "Use `foo()` from docs (https://example.com)"
        );
    }

    #[test]
    fn test_color_emits_escape_codes() {
        colored::control::set_override(true);
        let out = render_markdown("**bold**", true);
        assert!(out.contains("\u{1b}["));
        assert!(out.contains("bold"));
    }
}
