//! Fetch stage: extraction engine and attachment downloads
//!
//! Link-origin content goes through the [`FetchAdapter`] trait, implemented
//! by the yt-dlp subprocess adapter in [`ytdlp`]. Attachment-origin content
//! is pulled straight off the chat transport by [`attachment`]. Both stages
//! land bytes in a per-origin working area; moving them to their final
//! destination is the resolver's job.

pub mod attachment;
pub mod cookies;
pub mod ytdlp;

use crate::config::{FetchConfig, ProxyConfig};
use crate::error::FetchError;
use crate::types::{FetchedItem, PlaylistEntry};
use async_trait::async_trait;

pub use ytdlp::YtDlpAdapter;

/// Per-fetch settings handed to the adapter
///
/// Snapshotted from configuration at job start so a job sees one consistent
/// set of options end to end.
#[derive(Clone, Debug)]
pub struct FetchOptions {
    /// Format selector
    pub format: String,
    /// Raw cookie string, materialized per fetch
    pub cookies: String,
    /// Proxy URL, when enabled
    pub proxy_url: Option<String>,
    /// Restrict filenames to ASCII-safe characters
    pub restrict_filenames: bool,
    /// Avoid characters invalid on Windows filesystems
    pub windows_safe_filenames: bool,
    /// Continue past inaccessible playlist entries
    pub ignore_errors: bool,
}

impl FetchOptions {
    /// Snapshot the fetch options from configuration
    pub fn from_config(fetch: &FetchConfig, proxy: &ProxyConfig) -> Self {
        Self {
            format: fetch.format.clone(),
            cookies: fetch.cookies.clone(),
            proxy_url: proxy.socks5_url(),
            restrict_filenames: fetch.restrict_filenames,
            windows_safe_filenames: fetch.windows_safe_filenames,
            ignore_errors: fetch.ignore_errors,
        }
    }
}

/// Extraction-engine operations used by the job runner
///
/// Tests substitute an in-memory implementation; production uses
/// [`YtDlpAdapter`].
#[async_trait]
pub trait FetchAdapter: Send + Sync {
    /// Fetch a single video into the working area
    async fn fetch_single(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchedItem, FetchError>;

    /// Enumerate a playlist without downloading anything
    ///
    /// The returned vector has one slot per playlist position, in order.
    /// Inaccessible entries (private, deleted) are `None`; they count toward
    /// the job total but are never fetched.
    async fn enumerate_playlist(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Vec<Option<PlaylistEntry>>, FetchError>;
}
