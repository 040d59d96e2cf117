//! yt-dlp subprocess adapter
//!
//! Drives the external yt-dlp binary: single-video fetches write into the
//! working area with a title-and-id output template, playlist enumeration
//! uses flat extraction so nothing is downloaded. stderr is classified into
//! [`FetchError`] kinds so the status reporter can render actionable text.

use super::cookies::CookieJarFile;
use super::{FetchAdapter, FetchOptions};
use crate::error::FetchError;
use crate::types::{ContentCategory, FetchedItem, PlaylistEntry};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Output template: the id in the filename is what the destination resolver
/// matches on, the title part is cosmetic
const OUTPUT_TEMPLATE: &str = "%(title)s-%(id)s.%(ext)s";

/// Fetch adapter backed by the yt-dlp executable
#[derive(Clone, Debug)]
pub struct YtDlpAdapter {
    binary: PathBuf,
    working_dir: PathBuf,
}

impl YtDlpAdapter {
    /// Create an adapter that writes fetched files under `working_dir`
    pub fn new(binary: PathBuf, working_dir: PathBuf) -> Self {
        Self {
            binary,
            working_dir,
        }
    }

    fn common_args(&self, options: &FetchOptions, cookie_jar: Option<&CookieJarFile>) -> Vec<String> {
        let mut args = vec!["--no-warnings".to_string()];
        if let Some(url) = &options.proxy_url {
            args.push("--proxy".to_string());
            args.push(url.clone());
        }
        if let Some(jar) = cookie_jar {
            args.push("--cookies".to_string());
            args.push(jar.path().to_string_lossy().into_owned());
        }
        args
    }

    fn cookie_jar(&self, options: &FetchOptions) -> Result<Option<CookieJarFile>, FetchError> {
        CookieJarFile::from_config_string(&options.cookies)
            .map_err(|e| FetchError::Unknown(format!("cannot write cookie file: {e}")))
    }

    async fn run(&self, args: &[String]) -> Result<std::process::Output, FetchError> {
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| FetchError::Unknown(format!("failed to run extraction engine: {e}")))
    }
}

#[async_trait]
impl FetchAdapter for YtDlpAdapter {
    async fn fetch_single(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchedItem, FetchError> {
        // The jar must outlive the subprocess; it is removed when this
        // function returns on any path
        let jar = self.cookie_jar(options)?;

        let mut args = self.common_args(options, jar.as_ref());
        args.push("-f".to_string());
        args.push(options.format.clone());
        args.push("--no-playlist".to_string());
        args.push("--print-json".to_string());
        if options.restrict_filenames {
            args.push("--restrict-filenames".to_string());
        }
        if options.windows_safe_filenames {
            args.push("--windows-filenames".to_string());
        }
        args.push("-o".to_string());
        args.push(
            self.working_dir
                .join(OUTPUT_TEMPLATE)
                .to_string_lossy()
                .into_owned(),
        );
        args.push(url.to_string());

        tracing::debug!(url, "starting single-video fetch");
        let output = self.run(&args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_ytdlp_error(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (source_id, title, extension) = parse_single_json(&stdout)?;
        Ok(FetchedItem {
            source_id,
            title,
            extension,
            working_dir: self.working_dir.clone(),
            category: ContentCategory::Video,
        })
    }

    async fn enumerate_playlist(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Vec<Option<PlaylistEntry>>, FetchError> {
        let jar = self.cookie_jar(options)?;

        let mut args = self.common_args(options, jar.as_ref());
        args.push("--flat-playlist".to_string());
        if options.ignore_errors {
            args.push("--ignore-errors".to_string());
        }
        args.push("-J".to_string());
        args.push(url.to_string());

        tracing::debug!(url, "enumerating playlist");
        let output = self.run(&args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_ytdlp_error(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_playlist_json(&stdout)
    }
}

/// The canonical watch URL for a playlist entry's id
pub fn watch_url(source_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={source_id}")
}

/// Classify engine stderr into a [`FetchError`] kind
pub(crate) fn classify_ytdlp_error(stderr: &str) -> FetchError {
    let line = last_error_line(stderr);

    if stderr.contains("Sign in to confirm") {
        return FetchError::AuthenticationRequired;
    }
    if stderr.contains("Requested format is not available") {
        return FetchError::FormatUnavailable;
    }
    if stderr.contains("Private video")
        || stderr.contains("Video unavailable")
        || stderr.contains("has been removed")
        || stderr.contains("This video is not available")
    {
        return FetchError::ItemUnavailable(line);
    }
    if stderr.contains("timed out")
        || stderr.contains("Connection refused")
        || stderr.contains("Connection reset")
        || stderr.contains("Temporary failure in name resolution")
        || stderr.contains("getaddrinfo failed")
    {
        return FetchError::TransientNetwork(line);
    }
    FetchError::Unknown(line)
}

fn last_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| stderr.lines().rev().find(|l| !l.trim().is_empty()))
        .unwrap_or("extraction engine failed without output")
        .trim()
        .to_string()
}

/// Parse the metadata JSON printed for a single-video fetch
///
/// yt-dlp may print one JSON object per downloaded format; the last line is
/// the final merged output.
fn parse_single_json(stdout: &str) -> Result<(String, String, String), FetchError> {
    let line = stdout
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with('{'))
        .ok_or_else(|| FetchError::Unknown("engine printed no metadata".to_string()))?;

    let value: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| FetchError::Unknown(format!("malformed engine metadata: {e}")))?;

    let field = |name: &str| -> Result<String, FetchError> {
        value
            .get(name)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| FetchError::Unknown(format!("engine metadata missing '{name}'")))
    };

    Ok((field("id")?, field("title")?, field("ext")?))
}

/// Parse flat-playlist JSON into ordered entry slots
///
/// Null entries and private/deleted placeholder titles become `None`; they
/// hold their position so the job total stays fixed.
fn parse_playlist_json(stdout: &str) -> Result<Vec<Option<PlaylistEntry>>, FetchError> {
    let value: serde_json::Value = serde_json::from_str(stdout.trim())
        .map_err(|e| FetchError::Unknown(format!("malformed playlist metadata: {e}")))?;

    let Some(entries) = value.get("entries").and_then(|e| e.as_array()) else {
        // A playlist-marker URL can still resolve to a single video
        let entry = entry_from_value(&value);
        return Ok(vec![entry]);
    };

    Ok(entries.iter().map(entry_from_value).collect())
}

fn entry_from_value(value: &serde_json::Value) -> Option<PlaylistEntry> {
    if value.is_null() {
        return None;
    }
    let id = value.get("id")?.as_str()?;
    let title = value.get("title").and_then(|t| t.as_str()).unwrap_or(id);
    if title == "[Private video]" || title == "[Deleted video]" {
        return None;
    }
    Some(PlaylistEntry {
        source_id: id.to_string(),
        title: title.to_string(),
    })
}
