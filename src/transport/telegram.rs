//! Telegram Bot API transport
//!
//! Thin client over the HTTP Bot API: long-poll updates, send and edit
//! messages, and download attachment bytes through `getFile`. The API base
//! URL is configurable so tests can point the client at a local mock server.

use super::{Attachment, ChatId, IncomingMessage, MessageHandle, Transport};
use crate::config::{ProxyConfig, TelegramConfig};
use crate::error::{Error, Result, TransportError};
use crate::types::Progress;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

/// Telegram Bot API client
#[derive(Clone, Debug)]
pub struct TelegramTransport {
    client: reqwest::Client,
    base: String,
    token: String,
    poll_timeout: Duration,
}

/// Standard Bot API response envelope
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiDocument {
    file_id: String,
    file_name: Option<String>,
    mime_type: Option<String>,
    file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiPhotoSize {
    file_id: String,
    file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message_id: i64,
    chat: ApiChat,
    text: Option<String>,
    caption: Option<String>,
    document: Option<ApiDocument>,
    video: Option<ApiDocument>,
    audio: Option<ApiDocument>,
    voice: Option<ApiDocument>,
    photo: Option<Vec<ApiPhotoSize>>,
}

#[derive(Debug, Deserialize)]
struct ApiUpdate {
    update_id: i64,
    message: Option<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiFile {
    file_path: Option<String>,
    file_size: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SendMessageParams<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct EditMessageParams<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GetUpdatesParams {
    offset: i64,
    timeout: u64,
}

#[derive(Debug, Serialize)]
struct GetFileParams<'a> {
    file_id: &'a str,
}

impl TelegramTransport {
    /// Build the transport from configuration
    ///
    /// When the proxy is enabled, both API calls and file downloads are
    /// routed through it.
    pub fn new(telegram: &TelegramConfig, proxy: &ProxyConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            // Long polling holds the request open for poll_timeout; give the
            // client headroom beyond it
            .timeout(Duration::from_secs(telegram.poll_timeout_secs + 30));

        if let Some(url) = proxy.socks5_url() {
            let p = reqwest::Proxy::all(&url).map_err(|e| Error::Config {
                message: format!("invalid proxy url '{url}': {e}"),
                key: Some("proxy".into()),
            })?;
            builder = builder.proxy(p);
        }

        let client = builder.build().map_err(|e| Error::Config {
            message: format!("failed to build HTTP client: {e}"),
            key: None,
        })?;

        Ok(Self {
            client,
            base: telegram.api_base.trim_end_matches('/').to_string(),
            token: telegram.token.clone(),
            poll_timeout: Duration::from_secs(telegram.poll_timeout_secs),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base, self.token)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{file_path}", self.base, self.token)
    }

    async fn call<T, P>(&self, method: &str, params: &P) -> std::result::Result<T, TransportError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(params)
            .send()
            .await?;

        let envelope: ApiEnvelope<T> = response.json().await?;
        if envelope.ok {
            envelope.result.ok_or_else(|| {
                TransportError::Decode(format!("{method}: ok response without result"))
            })
        } else {
            Err(TransportError::Api {
                code: envelope.error_code.unwrap_or(0),
                description: envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            })
        }
    }

    /// Long-poll for updates after `offset`, returning (update_id, message)
    /// pairs for updates that carry a chat message
    pub async fn poll_updates(
        &self,
        offset: i64,
    ) -> std::result::Result<Vec<(i64, IncomingMessage)>, TransportError> {
        let params = GetUpdatesParams {
            offset,
            timeout: self.poll_timeout.as_secs(),
        };
        let updates: Vec<ApiUpdate> = self.call("getUpdates", &params).await?;
        Ok(updates
            .into_iter()
            .filter_map(|u| u.message.map(|m| (u.update_id, to_incoming(m))))
            .collect())
    }
}

fn to_incoming(message: ApiMessage) -> IncomingMessage {
    let attachment = extract_attachment(&message);
    IncomingMessage {
        chat: ChatId(message.chat.id),
        text: message.text.or(message.caption),
        attachment,
    }
}

fn extract_attachment(message: &ApiMessage) -> Option<Attachment> {
    let from_doc = |d: &ApiDocument| Attachment {
        file_id: d.file_id.clone(),
        file_name: d.file_name.clone(),
        mime_type: d.mime_type.clone(),
        size: d.file_size,
        is_photo: false,
    };

    if let Some(d) = &message.document {
        return Some(from_doc(d));
    }
    if let Some(v) = &message.video {
        return Some(from_doc(v));
    }
    if let Some(a) = &message.audio {
        return Some(from_doc(a));
    }
    if let Some(v) = &message.voice {
        return Some(from_doc(v));
    }
    // Compressed photos arrive as a size ladder; take the largest rendition
    if let Some(sizes) = &message.photo {
        let largest = sizes.iter().max_by_key(|s| s.file_size.unwrap_or(0))?;
        return Some(Attachment {
            file_id: largest.file_id.clone(),
            file_name: None,
            mime_type: Some("image/jpeg".to_string()),
            size: largest.file_size,
            is_photo: true,
        });
    }
    None
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
    ) -> std::result::Result<MessageHandle, TransportError> {
        let params = SendMessageParams {
            chat_id: chat.0,
            text,
        };
        let message: ApiMessage = self.call("sendMessage", &params).await?;
        Ok(MessageHandle {
            chat: ChatId(message.chat.id),
            message_id: message.message_id,
        })
    }

    async fn edit_message(
        &self,
        handle: MessageHandle,
        text: &str,
    ) -> std::result::Result<(), TransportError> {
        let params = EditMessageParams {
            chat_id: handle.chat.0,
            message_id: handle.message_id,
            text,
        };
        let _: ApiMessage = self.call("editMessageText", &params).await?;
        Ok(())
    }

    async fn download_attachment(
        &self,
        file_id: &str,
        dest_path: &Path,
        progress: mpsc::Sender<Progress>,
    ) -> std::result::Result<(), TransportError> {
        let info: ApiFile = self.call("getFile", &GetFileParams { file_id }).await?;
        let file_path = info.file_path.ok_or_else(|| {
            TransportError::Decode("getFile: response without file_path".to_string())
        })?;

        let mut response = self
            .client
            .get(self.file_url(&file_path))
            .send()
            .await?
            .error_for_status()?;

        let total = info.file_size.or(response.content_length());
        let mut file = tokio::fs::File::create(dest_path).await?;
        let mut received: u64 = 0;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            // Slow consumers just miss intermediate updates
            let _ = progress.try_send(Progress { received, total });
        }
        file.flush().await?;
        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn transport_for(server: &MockServer) -> TelegramTransport {
        let telegram = TelegramConfig {
            token: "123:abc".into(),
            api_base: server.uri(),
            poll_timeout_secs: 1,
        };
        TelegramTransport::new(&telegram, &ProxyConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn send_message_returns_edit_handle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(json!({"chat_id": 42, "text": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 7, "chat": {"id": 42}}
            })))
            .mount(&server)
            .await;

        let transport = transport_for(&server).await;
        let handle = transport.send_message(ChatId(42), "hello").await.unwrap();
        assert_eq!(handle, MessageHandle { chat: ChatId(42), message_id: 7 });
    }

    #[tokio::test]
    async fn api_error_envelope_surfaces_code_and_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"
            })))
            .mount(&server)
            .await;

        let transport = transport_for(&server).await;
        let err = transport.send_message(ChatId(1), "x").await.unwrap_err();
        match err {
            TransportError::Api { code, description } => {
                assert_eq!(code, 403);
                assert!(description.contains("blocked"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn edit_message_targets_the_original_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/editMessageText"))
            .and(body_partial_json(json!({
                "chat_id": 42, "message_id": 7, "text": "updated"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 7, "chat": {"id": 42}}
            })))
            .mount(&server)
            .await;

        let transport = transport_for(&server).await;
        let handle = MessageHandle { chat: ChatId(42), message_id: 7 };
        transport.edit_message(handle, "updated").await.unwrap();
    }

    #[tokio::test]
    async fn poll_updates_maps_messages_and_captions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    {
                        "update_id": 100,
                        "message": {
                            "message_id": 1,
                            "chat": {"id": 42},
                            "text": "https://youtu.be/abc"
                        }
                    },
                    {
                        "update_id": 101,
                        "message": {
                            "message_id": 2,
                            "chat": {"id": 42},
                            "caption": "a file",
                            "document": {
                                "file_id": "DOC1",
                                "file_name": "notes.pdf",
                                "mime_type": "application/pdf",
                                "file_size": 1024
                            }
                        }
                    },
                    {"update_id": 102}
                ]
            })))
            .mount(&server)
            .await;

        let transport = transport_for(&server).await;
        let messages = transport.poll_updates(0).await.unwrap();

        assert_eq!(messages.len(), 2, "updates without a message are skipped");
        assert_eq!(messages[0].0, 100);
        assert_eq!(messages[0].1.text.as_deref(), Some("https://youtu.be/abc"));

        let (id, msg) = &messages[1];
        assert_eq!(*id, 101);
        assert_eq!(msg.text.as_deref(), Some("a file"), "caption becomes text");
        let attachment = msg.attachment.as_ref().unwrap();
        assert_eq!(attachment.file_id, "DOC1");
        assert_eq!(attachment.file_name.as_deref(), Some("notes.pdf"));
        assert!(!attachment.is_photo);
    }

    #[tokio::test]
    async fn photo_updates_pick_the_largest_rendition() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [{
                    "update_id": 1,
                    "message": {
                        "message_id": 3,
                        "chat": {"id": 42},
                        "photo": [
                            {"file_id": "SMALL", "file_size": 100},
                            {"file_id": "LARGE", "file_size": 90000},
                            {"file_id": "MEDIUM", "file_size": 9000}
                        ]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let transport = transport_for(&server).await;
        let messages = transport.poll_updates(0).await.unwrap();
        let attachment = messages[0].1.attachment.as_ref().unwrap();
        assert_eq!(attachment.file_id, "LARGE");
        assert!(attachment.is_photo);
    }

    #[tokio::test]
    async fn download_attachment_writes_bytes_and_reports_progress() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/getFile"))
            .and(body_partial_json(json!({"file_id": "DOC1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"file_path": "documents/file_1.pdf", "file_size": 11}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/file/bot123:abc/documents/file_1.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello bytes".to_vec()))
            .mount(&server)
            .await;

        let tmp = tempfile::TempDir::new().unwrap();
        let dest = tmp.path().join("DOC1.pdf");
        let (tx, mut rx) = mpsc::channel(16);

        let transport = transport_for(&server).await;
        transport
            .download_attachment("DOC1", &dest, tx)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"hello bytes");
        let last = std::iter::from_fn(|| rx.try_recv().ok()).last().unwrap();
        assert_eq!(last.received, 11);
        assert_eq!(last.total, Some(11));
    }
}
