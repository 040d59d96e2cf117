//! Attachment fetches
//!
//! Pulls an inbound message's attachment off the chat transport into the
//! attachment working area. The working filename is the transport file id
//! plus the derived extension, so the destination resolver can match it the
//! same way it matches engine output. Content category and title are derived
//! here from the attachment's declared name and MIME type.

use crate::error::FetchError;
use crate::transport::{Attachment, Transport};
use crate::types::{ContentCategory, FetchedItem, Progress};
use std::path::Path;
use tokio::sync::mpsc;

/// Download an attachment into `working_dir` and describe the result
pub async fn fetch_attachment(
    transport: &dyn Transport,
    attachment: &Attachment,
    working_dir: &Path,
    progress: mpsc::Sender<Progress>,
) -> Result<FetchedItem, FetchError> {
    let category = category_for(attachment);
    let extension = extension_for(attachment);
    let title = title_for(attachment);

    let dest = working_dir.join(format!("{}.{extension}", attachment.file_id));
    transport
        .download_attachment(&attachment.file_id, &dest, progress)
        .await
        .map_err(|e| match e {
            crate::error::TransportError::Http(e) => FetchError::TransientNetwork(e.to_string()),
            other => FetchError::Unknown(other.to_string()),
        })?;

    Ok(FetchedItem {
        source_id: attachment.file_id.clone(),
        title,
        extension,
        working_dir: working_dir.to_path_buf(),
        category,
    })
}

/// Map an attachment's declared type to a destination category
///
/// Compressed photos are always photos; otherwise the MIME type decides, and
/// an attachment without one lands in the catch-all category.
pub fn category_for(attachment: &Attachment) -> ContentCategory {
    if attachment.is_photo {
        return ContentCategory::Photo;
    }
    let Some(mime) = attachment.mime_type.as_deref() else {
        return ContentCategory::Other;
    };
    if mime.starts_with("video/") {
        ContentCategory::Video
    } else if mime.starts_with("audio/") {
        ContentCategory::Audio
    } else if mime.starts_with("image/") {
        ContentCategory::Photo
    } else if attachment.file_name.is_some() {
        ContentCategory::Document
    } else {
        ContentCategory::Other
    }
}

fn extension_for(attachment: &Attachment) -> String {
    if let Some(name) = attachment.file_name.as_deref()
        && let Some((_, ext)) = name.rsplit_once('.')
        && !ext.is_empty()
    {
        return ext.to_ascii_lowercase();
    }
    if attachment.is_photo {
        return "jpg".to_string();
    }
    match attachment.mime_type.as_deref() {
        Some("video/mp4") => "mp4",
        Some("video/webm") => "webm",
        Some("audio/mpeg") => "mp3",
        Some("audio/ogg") => "ogg",
        Some("audio/mp4") => "m4a",
        Some("image/jpeg") => "jpg",
        Some("image/png") => "png",
        Some("image/gif") => "gif",
        Some("application/pdf") => "pdf",
        Some("application/zip") => "zip",
        _ => "bin",
    }
    .to_string()
}

fn title_for(attachment: &Attachment) -> String {
    if let Some(name) = attachment.file_name.as_deref() {
        let stem = name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name);
        if !stem.is_empty() {
            return stem.to_string();
        }
    }
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    if attachment.is_photo {
        format!("photo_{stamp}")
    } else {
        format!("file_{stamp}")
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::{ChatId, MessageHandle};
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn attachment(
        file_name: Option<&str>,
        mime_type: Option<&str>,
        is_photo: bool,
    ) -> Attachment {
        Attachment {
            file_id: "FILE123".into(),
            file_name: file_name.map(str::to_string),
            mime_type: mime_type.map(str::to_string),
            size: Some(64),
            is_photo,
        }
    }

    // --- category mapping ---

    #[test]
    fn video_mime_is_video() {
        assert_eq!(
            category_for(&attachment(Some("clip.mp4"), Some("video/mp4"), false)),
            ContentCategory::Video
        );
    }

    #[test]
    fn audio_mime_is_audio() {
        assert_eq!(
            category_for(&attachment(Some("song.mp3"), Some("audio/mpeg"), false)),
            ContentCategory::Audio
        );
    }

    #[test]
    fn compressed_photo_is_photo_regardless_of_mime() {
        assert_eq!(
            category_for(&attachment(None, None, true)),
            ContentCategory::Photo
        );
    }

    #[test]
    fn named_document_mime_is_document() {
        assert_eq!(
            category_for(&attachment(Some("notes.pdf"), Some("application/pdf"), false)),
            ContentCategory::Document
        );
    }

    #[test]
    fn missing_mime_is_other() {
        assert_eq!(
            category_for(&attachment(Some("mystery"), None, false)),
            ContentCategory::Other
        );
    }

    #[test]
    fn unnamed_non_media_is_other() {
        assert_eq!(
            category_for(&attachment(None, Some("application/octet-stream"), false)),
            ContentCategory::Other
        );
    }

    // --- extension and title derivation ---

    #[test]
    fn extension_prefers_the_declared_filename() {
        assert_eq!(
            extension_for(&attachment(Some("Movie.MP4"), Some("video/webm"), false)),
            "mp4"
        );
    }

    #[test]
    fn extension_falls_back_to_mime_then_bin() {
        assert_eq!(
            extension_for(&attachment(None, Some("audio/mpeg"), false)),
            "mp3"
        );
        assert_eq!(extension_for(&attachment(None, None, false)), "bin");
    }

    #[test]
    fn photo_defaults_to_jpg_and_timestamped_title() {
        let photo = attachment(None, None, true);
        assert_eq!(extension_for(&photo), "jpg");
        assert!(title_for(&photo).starts_with("photo_"));
    }

    #[test]
    fn title_strips_the_extension_from_the_name() {
        assert_eq!(
            title_for(&attachment(Some("My Notes.pdf"), Some("application/pdf"), false)),
            "My Notes"
        );
    }

    // --- fetch path ---

    struct WritingTransport;

    #[async_trait]
    impl Transport for WritingTransport {
        async fn send_message(
            &self,
            chat: ChatId,
            _text: &str,
        ) -> Result<MessageHandle, TransportError> {
            Ok(MessageHandle { chat, message_id: 1 })
        }

        async fn edit_message(
            &self,
            _handle: MessageHandle,
            _text: &str,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        async fn download_attachment(
            &self,
            _file_id: &str,
            dest_path: &Path,
            progress: mpsc::Sender<Progress>,
        ) -> Result<(), TransportError> {
            tokio::fs::write(dest_path, b"payload").await?;
            let _ = progress.try_send(Progress { received: 7, total: Some(7) });
            Ok(())
        }
    }

    #[tokio::test]
    async fn fetch_writes_under_file_id_with_derived_extension() {
        let tmp = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let att = attachment(Some("notes.pdf"), Some("application/pdf"), false);

        let item = fetch_attachment(&WritingTransport, &att, tmp.path(), tx)
            .await
            .unwrap();

        assert_eq!(item.source_id, "FILE123");
        assert_eq!(item.title, "notes");
        assert_eq!(item.extension, "pdf");
        assert_eq!(item.category, ContentCategory::Document);
        assert!(
            tmp.path().join("FILE123.pdf").exists(),
            "working filename must embed the file id for resolver matching"
        );
        assert_eq!(rx.try_recv().unwrap().received, 7);
    }
}
