//! Per-job status reporting
//!
//! One status message per job, sent when the job is accepted and edited in
//! place at later checkpoints. Intermediate edits are throttled so fetch
//! speed never dictates the edit rate; terminal edits are always sent.
//! Transport failures are logged and swallowed, a job never fails because a
//! status edit did.

use crate::config::ReporterConfig;
use crate::transport::{ChatId, MessageHandle, Transport};
use crate::types::{
    ItemOutcome, ItemResult, PlaylistSummary, Progress, RequestKind, Tally, TerminalState,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Status reporter for a single job
pub struct JobReporter {
    transport: Arc<dyn Transport>,
    chat: ChatId,
    handle: Option<MessageHandle>,
    last_edit: Option<Instant>,
    min_edit_interval: Duration,
    max_failure_lines: usize,
}

impl JobReporter {
    /// Create a reporter for a job in the given chat
    pub fn new(transport: Arc<dyn Transport>, chat: ChatId, config: &ReporterConfig) -> Self {
        Self {
            transport,
            chat,
            handle: None,
            last_edit: None,
            min_edit_interval: Duration::from_secs(config.min_edit_interval_secs),
            max_failure_lines: config.max_failure_lines,
        }
    }

    /// Send the initial status message for an accepted job
    pub async fn accepted(&mut self, kind: RequestKind) {
        let text = match kind {
            RequestKind::AttachedMedia => "Receiving your file...",
            RequestKind::SingleVideoLink => "Fetching the video...",
            RequestKind::PlaylistLink => "Enumerating the playlist...",
        };
        match self.transport.send_message(self.chat, text).await {
            Ok(handle) => self.handle = Some(handle),
            Err(e) => {
                tracing::warn!(chat = %self.chat, error = %e, "failed to send status message");
            }
        }
    }

    /// Report the fixed playlist total after enumeration
    pub async fn enumerated(&mut self, total: usize) {
        let text = format!("Found {total} entries. Starting downloads...");
        self.edit(&text, true).await;
    }

    /// Report a running tally after an item reached a terminal outcome
    pub async fn item_completed(&mut self, tally: Tally) {
        let done = tally.succeeded + tally.failed;
        let text = format!(
            "Progress: {done}/{} ({} ok, {} failed)",
            tally.total, tally.succeeded, tally.failed
        );
        self.edit(&text, false).await;
    }

    /// Report byte-count progress for an attachment download
    pub async fn progress(&mut self, progress: Progress) {
        let text = match progress.total {
            Some(total) => format!(
                "Downloading... {} / {}",
                human_bytes(progress.received),
                human_bytes(total)
            ),
            None => format!("Downloading... {}", human_bytes(progress.received)),
        };
        self.edit(&text, false).await;
    }

    /// Report the terminal result, always sent regardless of throttling
    pub async fn terminal(&mut self, items: &[ItemResult]) {
        let text = render_terminal(items, self.max_failure_lines);
        self.edit(&text, true).await;
    }

    async fn edit(&mut self, text: &str, force: bool) {
        let Some(handle) = self.handle else {
            tracing::debug!(chat = %self.chat, "no status message to edit, skipping");
            return;
        };
        if !force && !self.throttle_allows() {
            return;
        }
        self.last_edit = Some(Instant::now());
        if let Err(e) = self.transport.edit_message(handle, text).await {
            tracing::warn!(chat = %self.chat, error = %e, "failed to edit status message");
        }
    }

    fn throttle_allows(&self) -> bool {
        match self.last_edit {
            None => true,
            Some(at) => at.elapsed() >= self.min_edit_interval,
        }
    }
}

/// Render the terminal status text from a job's items
pub(crate) fn render_terminal(items: &[ItemResult], max_failure_lines: usize) -> String {
    let summary = PlaylistSummary::from_items(items);
    let mut out = match summary.terminal_state() {
        TerminalState::Succeeded => {
            if summary.total == 1 {
                let path = items.iter().find_map(|i| i.final_path.as_deref());
                match path {
                    Some(p) => format!("Done. Saved to {}", p.display()),
                    None => "Done.".to_string(),
                }
            } else {
                format!("Done. All {} items saved.", summary.total)
            }
        }
        TerminalState::PartiallyFailed => format!(
            "Finished with failures: {} of {} saved, {} failed.",
            summary.succeeded, summary.total, summary.failed
        ),
        TerminalState::Failed => {
            if summary.total <= 1 {
                "Failed.".to_string()
            } else {
                format!("Failed. None of the {} items could be saved.", summary.total)
            }
        }
    };

    if !summary.failures.is_empty() {
        for (title, reason) in summary.failures.iter().take(max_failure_lines) {
            out.push_str(&format!("\n- {title}: {reason}"));
        }
        let overflow = summary.failures.len().saturating_sub(max_failure_lines);
        if overflow > 0 {
            out.push_str(&format!("\n...and {overflow} more"));
        }
    }

    if items.iter().any(is_authentication_failure) {
        out.push_str(
            "\nThe site asked for a sign-in challenge. \
             Set your browser cookies in the fetch configuration and try again.",
        );
    }
    out
}

fn is_authentication_failure(item: &ItemResult) -> bool {
    matches!(&item.outcome, ItemOutcome::Failed(reason) if reason.is_authentication())
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, TransportError};
    use crate::types::FailureReason;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<String>>,
        edits: Mutex<Vec<String>>,
        fail_sends: bool,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_message(
            &self,
            chat: ChatId,
            text: &str,
        ) -> Result<MessageHandle, TransportError> {
            if self.fail_sends {
                return Err(TransportError::Api {
                    code: 500,
                    description: "down".into(),
                });
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(MessageHandle { chat, message_id: 1 })
        }

        async fn edit_message(
            &self,
            _handle: MessageHandle,
            text: &str,
        ) -> Result<(), TransportError> {
            self.edits.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn download_attachment(
            &self,
            _file_id: &str,
            _dest_path: &Path,
            _progress: mpsc::Sender<Progress>,
        ) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn moved_item(title: &str, path: &str) -> ItemResult {
        let mut item = ItemResult::pending("id", title);
        item.mark_fetched();
        item.mark_moved(PathBuf::from(path));
        item
    }

    fn failed_item(title: &str, reason: FetchError) -> ItemResult {
        ItemResult::failed(title, FailureReason::Fetch(reason))
    }

    fn reporter_config(min_interval: u64) -> ReporterConfig {
        ReporterConfig {
            max_failure_lines: 3,
            min_edit_interval_secs: min_interval,
        }
    }

    // --- throttling and lifecycle ---

    #[tokio::test]
    async fn intermediate_edits_are_throttled_but_terminal_is_not() {
        let transport = Arc::new(RecordingTransport::default());
        let mut reporter = JobReporter::new(transport.clone(), ChatId(1), &reporter_config(3600));

        reporter.accepted(RequestKind::PlaylistLink).await;
        for i in 0..5 {
            reporter
                .item_completed(Tally { succeeded: i, failed: 0, total: 5 })
                .await;
        }
        reporter.terminal(&[moved_item("a", "/d/a.mp4")]).await;

        let edits = transport.edits.lock().unwrap();
        // First intermediate edit passes, the rest are inside the interval
        assert_eq!(edits.len(), 2, "4 throttled edits must be dropped: {edits:?}");
        assert!(edits[0].starts_with("Progress:"));
        assert!(edits[1].starts_with("Done."));
    }

    #[tokio::test]
    async fn failed_initial_send_disables_edits_without_erroring() {
        let transport = Arc::new(RecordingTransport {
            fail_sends: true,
            ..Default::default()
        });
        let mut reporter = JobReporter::new(transport.clone(), ChatId(1), &reporter_config(0));

        reporter.accepted(RequestKind::SingleVideoLink).await;
        reporter.terminal(&[moved_item("a", "/d/a.mp4")]).await;

        assert!(transport.edits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn enumeration_checkpoint_reports_the_fixed_total() {
        let transport = Arc::new(RecordingTransport::default());
        let mut reporter = JobReporter::new(transport.clone(), ChatId(1), &reporter_config(0));

        reporter.accepted(RequestKind::PlaylistLink).await;
        reporter.enumerated(17).await;

        let edits = transport.edits.lock().unwrap();
        assert!(edits[0].contains("17"));
    }

    // --- terminal rendering ---

    #[test]
    fn single_success_names_the_final_path() {
        let text = render_terminal(&[moved_item("Title", "/dl/youtube/Title.mp4")], 3);
        assert!(text.contains("/dl/youtube/Title.mp4"), "got: {text}");
    }

    #[test]
    fn partial_failure_lists_titles_and_reasons() {
        let items = vec![
            moved_item("ok", "/d/ok.mp4"),
            failed_item("gone", FetchError::ItemUnavailable("private".into())),
        ];
        let text = render_terminal(&items, 3);
        assert!(text.contains("1 of 2 saved"), "got: {text}");
        assert!(text.contains("- gone:"), "got: {text}");
        assert!(text.contains("private"), "got: {text}");
    }

    #[test]
    fn failure_lines_overflow_into_a_count() {
        let items: Vec<ItemResult> = (0..6)
            .map(|i| failed_item(&format!("v{i}"), FetchError::Unknown("x".into())))
            .collect();
        let text = render_terminal(&items, 3);

        assert!(text.contains("- v2:"), "got: {text}");
        assert!(!text.contains("- v3:"), "line 4 must be folded: {text}");
        assert!(text.contains("...and 3 more"), "got: {text}");
    }

    #[test]
    fn authentication_failure_points_at_cookie_configuration() {
        let items = vec![failed_item("v", FetchError::AuthenticationRequired)];
        let text = render_terminal(&items, 3);
        assert!(
            text.contains("cookies in the fetch configuration"),
            "auth failures must carry the remediation hint: {text}"
        );
    }

    #[test]
    fn generic_failure_has_no_cookie_hint() {
        let items = vec![failed_item("v", FetchError::Unknown("boom".into()))];
        let text = render_terminal(&items, 3);
        assert!(!text.contains("cookies"), "got: {text}");
    }

    #[test]
    fn human_bytes_scales_units() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.0 KiB");
        assert_eq!(human_bytes(5 * 1024 * 1024), "5.0 MiB");
    }
}
