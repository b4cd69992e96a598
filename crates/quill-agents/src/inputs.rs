//! Turns the caller's free-text prompt, note attachments, and uploaded files
//! into the pieces each provider wants on the wire.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use quill_common::Attachment;

/// An uploaded file destined for inline transmission.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl FileInput {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn base64_data(&self) -> String {
        BASE64.encode(&self.data)
    }

    /// Data URI form for OpenAI-compatible `image_url` parts.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64_data())
    }
}

/// Compose the outgoing user text: the prompt itself, plus a delimited block
/// listing attachment paths when any notes are attached.
pub fn compose_user_text(message: &str, attachments: &[Attachment]) -> String {
    let mut text = message.to_string();
    if !attachments.is_empty() {
        text.push_str("\n###\nAttached notes: ");
        for note in attachments {
            text.push('\n');
            text.push_str(&note.path);
        }
        text.push_str("\n###\n");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_message_stays_untouched() {
        assert_eq!(compose_user_text("hello", &[]), "hello");
    }

    #[test]
    fn attachments_render_as_delimited_block() {
        let attachments = vec![
            Attachment::new("daily/2026-08-06.md"),
            Attachment::new("projects/quill.md"),
        ];
        let text = compose_user_text("summarize these", &attachments);
        assert_eq!(
            text,
            "summarize these\n###\nAttached notes: \ndaily/2026-08-06.md\nprojects/quill.md\n###\n"
        );
    }

    #[test]
    fn data_uri_round_trip() {
        let file = FileInput::new("sketch.png", "image/png", vec![1, 2, 3]);
        assert_eq!(
            file.data_uri(),
            format!("data:image/png;base64,{}", BASE64.encode([1u8, 2, 3]))
        );
    }
}
