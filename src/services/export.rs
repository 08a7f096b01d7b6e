use chrono::Utc;

use crate::config::APP_NAME;
use crate::models::{Message, Role};

pub fn export_to_markdown(model: &str, messages: &[Message]) -> String {
    let mut output = format!("# {} conversation\n\n", APP_NAME);
    output.push_str(&format!(
        "> Model: {} | Date: {}\n\n",
        model,
        messages
            .first()
            .map(|m| m.timestamp)
            .unwrap_or_else(Utc::now)
            .format("%Y-%m-%d %H:%M")
    ));

    output.push_str("---\n\n");

    for msg in messages {
        let role_label = match msg.role {
            Role::User => "You",
            Role::Model => APP_NAME,
        };
        output.push_str(&format!("### {}\n\n", role_label));
        for att in &msg.attachments {
            output.push_str(&format!("*[image: {}]*\n\n", att.preview));
        }
        if msg.is_error {
            output.push_str(&format!("> **Error:** {}\n\n", msg.text));
        } else {
            output.push_str(&format!("{}\n\n", msg.text));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Attachment;

    #[test]
    fn test_export_labels_turns() {
        let mut reply = Message::model_placeholder();
        reply.text = "A cat.".to_string();
        reply.is_streaming = false;
        let user = Message::user(
            "What is this?",
            vec![Attachment {
                preview: "cat.png".to_string(),
                mime_type: "image/png".to_string(),
                base64_data: None,
            }],
        );

        let md = export_to_markdown("gemini-2.5-flash", &[user, reply]);
        assert!(md.starts_with("# OpenAsk conversation"));
        assert!(md.contains("> Model: gemini-2.5-flash"));
        assert!(md.contains("### You\n\n*[image: cat.png]*\n\nWhat is this?"));
        assert!(md.contains("### OpenAsk\n\nA cat."));
    }

    #[test]
    fn test_export_marks_errors() {
        let mut reply = Message::model_placeholder();
        reply.text = "Sorry".to_string();
        reply.is_streaming = false;
        reply.is_error = true;

        let md = export_to_markdown("m", &[reply]);
        assert!(md.contains("> **Error:** Sorry"));
    }
}
