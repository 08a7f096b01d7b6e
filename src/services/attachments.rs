use std::path::Path;

use base64::Engine;

use crate::error::ChatError;
use crate::models::Attachment;

fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png", // fallback
    }
}

/// Read an image file into a ready-to-send attachment.
pub async fn load_attachment(path: &Path) -> Result<Attachment, ChatError> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|source| ChatError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

    let preview = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string();

    Ok(Attachment {
        preview,
        mime_type: mime_type_for(path).to_string(),
        base64_data: Some(base64::engine::general_purpose::STANDARD.encode(&data)),
    })
}

/// Images waiting to go out with the next message.
#[derive(Debug, Default)]
pub struct PendingAttachments {
    items: Vec<Attachment>,
}

impl PendingAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load each file and queue it. Unreadable files are logged and skipped.
    /// Returns how many were added.
    pub async fn add_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> usize {
        let mut added = 0;
        for path in paths {
            match load_attachment(path.as_ref()).await {
                Ok(att) => {
                    self.items.push(att);
                    added += 1;
                }
                Err(e) => {
                    tracing::error!("Error processing file: {}", e);
                }
            }
        }
        added
    }

    pub fn push(&mut self, attachment: Attachment) {
        self.items.push(attachment);
    }

    /// Remove the attachment at `index`. Out of range is a no-op.
    pub fn remove(&mut self, index: usize) -> Option<Attachment> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    pub fn items(&self) -> &[Attachment] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn take(&mut self) -> Vec<Attachment> {
        std::mem::take(&mut self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_mime_type_from_extension() {
        assert_eq!(mime_type_for(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_type_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("a.gif")), "image/gif");
        assert_eq!(mime_type_for(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_type_for(Path::new("noext")), "image/png");
    }

    #[tokio::test]
    async fn test_load_attachment_encodes_base64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"hello")
            .unwrap();

        let att = load_attachment(&path).await.unwrap();
        assert_eq!(att.preview, "photo.jpg");
        assert_eq!(att.mime_type, "image/jpeg");
        assert_eq!(att.base64_data.as_deref(), Some("aGVsbG8="));
    }

    #[tokio::test]
    async fn test_unreadable_file_is_file_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_attachment(&dir.path().join("missing.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::FileRead { .. }));
    }

    #[tokio::test]
    async fn test_add_files_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good_a = dir.path().join("a.png");
        let good_b = dir.path().join("b.gif");
        std::fs::write(&good_a, b"a").unwrap();
        std::fs::write(&good_b, b"b").unwrap();
        let missing = dir.path().join("missing.png");

        let mut pending = PendingAttachments::new();
        let added = pending.add_files(&[good_a, missing, good_b]).await;

        assert_eq!(added, 2);
        let names: Vec<&str> = pending.items().iter().map(|a| a.preview.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.gif"]);
    }

    #[test]
    fn test_remove_by_index_keeps_order() {
        let mut pending = PendingAttachments::new();
        for name in ["one", "two", "three"] {
            pending.push(Attachment {
                preview: name.to_string(),
                mime_type: "image/png".to_string(),
                base64_data: Some(name.to_string()),
            });
        }

        assert_eq!(pending.remove(1).unwrap().preview, "two");
        assert!(pending.remove(5).is_none());

        let names: Vec<String> = pending.take().into_iter().map(|a| a.preview).collect();
        assert_eq!(names, vec!["one".to_string(), "three".to_string()]);
        assert!(pending.is_empty());
    }
}
