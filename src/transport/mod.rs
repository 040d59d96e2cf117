//! Chat transport abstraction
//!
//! The orchestrator talks to the chat service through the [`Transport`]
//! trait: send a message, edit a previously sent message in place, and
//! download an attachment's bytes into the working area. The concrete
//! Telegram Bot API implementation lives in [`telegram`]; tests substitute
//! in-memory mocks.

pub mod telegram;

use crate::error::TransportError;
use crate::types::Progress;
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;

pub use telegram::TelegramTransport;

/// Identifier of a chat on the transport
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a sent message, used for in-place edits
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageHandle {
    /// Chat the message was sent to
    pub chat: ChatId,
    /// Transport-assigned message identifier
    pub message_id: i64,
}

/// Binary attachment carried by an inbound message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// Transport file identifier, stable for the lifetime of the message
    pub file_id: String,
    /// Original filename, when the transport reports one
    pub file_name: Option<String>,
    /// Declared MIME type, when the transport reports one
    pub mime_type: Option<String>,
    /// Declared size in bytes, when known
    pub size: Option<u64>,
    /// True when the attachment arrived as a compressed photo
    pub is_photo: bool,
}

/// An inbound message as seen by the classifier
#[derive(Clone, Debug)]
pub struct IncomingMessage {
    /// Chat the message arrived from
    pub chat: ChatId,
    /// Message text, if any
    pub text: Option<String>,
    /// Attachment, if any
    pub attachment: Option<Attachment>,
}

/// Outbound chat operations used by the orchestrator and reporter
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a message, returning a handle for later edits
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
    ) -> Result<MessageHandle, TransportError>;

    /// Edit a previously sent message in place
    async fn edit_message(
        &self,
        handle: MessageHandle,
        text: &str,
    ) -> Result<(), TransportError>;

    /// Download an attachment's bytes to `dest_path`, publishing byte-count
    /// progress on `progress` as chunks arrive
    async fn download_attachment(
        &self,
        file_id: &str,
        dest_path: &Path,
        progress: mpsc::Sender<Progress>,
    ) -> Result<(), TransportError>;
}
