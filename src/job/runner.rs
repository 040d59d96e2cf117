//! Job state machine
//!
//! One task per job: classify has already happened by the time the task
//! starts; the runner walks Created → (Enumerating) → Running → Summarizing
//! → Terminal. Items are processed sequentially in enumeration order. A
//! per-item failure marks that item and moves on; only enumeration-level
//! failures end the whole job early.

use super::Orchestrator;
use crate::error::FetchError;
use crate::fetch::{attachment::fetch_attachment, ytdlp::watch_url, FetchOptions};
use crate::reporter::JobReporter;
use crate::resolver::Origin;
use crate::transport::{Attachment, IncomingMessage};
use crate::types::{
    Event, FailureReason, FetchedItem, ItemResult, JobId, JobState, PlaylistSummary,
    RequestKind, Tally,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const CANCELLED_REASON: &str = "cancelled by shutdown";

/// Apply a forward state transition, leaving a trace of the walk
fn advance(id: JobId, state: &mut JobState, next: JobState) {
    debug_assert!(!state.is_terminal(), "terminal job states are final");
    tracing::debug!(job = %id, from = ?state, to = ?next, "state transition");
    *state = next;
}

impl Orchestrator {
    pub(super) async fn run_job(
        &self,
        id: JobId,
        message: IncomingMessage,
        kind: RequestKind,
        cancel: CancellationToken,
    ) {
        let mut job_state = JobState::Created;
        let mut reporter = JobReporter::new(
            self.transport.clone(),
            message.chat,
            &self.config.reporter,
        );
        advance(id, &mut job_state, JobState::Classifying);
        reporter.accepted(kind).await;

        let options = FetchOptions::from_config(&self.config.fetch, &self.config.proxy);
        let items = match kind {
            RequestKind::AttachedMedia => {
                advance(id, &mut job_state, JobState::Running);
                self.run_attachment(id, &message, &mut reporter, &cancel).await
            }
            RequestKind::SingleVideoLink => {
                advance(id, &mut job_state, JobState::Running);
                self.run_single_link(id, &message, &options, &cancel).await
            }
            RequestKind::PlaylistLink => {
                advance(id, &mut job_state, JobState::Enumerating);
                self.run_playlist(id, &message, &options, &mut reporter, &mut job_state, &cancel)
                    .await
            }
        };

        advance(id, &mut job_state, JobState::Summarizing);
        let summary = PlaylistSummary::from_items(&items);
        let state = summary.terminal_state();
        advance(id, &mut job_state, JobState::Terminal(state));
        reporter.terminal(&items).await;
        self.emit_event(Event::JobFinished {
            id,
            state,
            succeeded: summary.succeeded,
            failed: summary.failed,
            total: summary.total,
        });
        tracing::info!(
            job = %id,
            ?state,
            succeeded = summary.succeeded,
            failed = summary.failed,
            total = summary.total,
            "job finished"
        );
    }

    async fn run_attachment(
        &self,
        id: JobId,
        message: &IncomingMessage,
        reporter: &mut JobReporter,
        cancel: &CancellationToken,
    ) -> Vec<ItemResult> {
        let Some(attachment) = &message.attachment else {
            // Classification requires an attachment for this kind
            return vec![ItemResult::failed(
                "attachment",
                FailureReason::Fetch(FetchError::Unknown("message has no attachment".into())),
            )];
        };

        let mut item = ItemResult::pending(&attachment.file_id, "attachment");
        match self
            .fetch_attachment_with_progress(id, attachment, reporter, cancel)
            .await
        {
            Ok(fetched) => {
                item.title = fetched.title.clone();
                item.category = fetched.category;
                item.mark_fetched();
                match self.resolver.move_item(Origin::Attachment, &fetched).await {
                    Ok(path) => item.mark_moved(path),
                    Err(e) => {
                        tracing::warn!(job = %id, error = %e, "attachment move failed");
                        item.mark_failed(FailureReason::Move(e));
                    }
                }
            }
            Err(e) => {
                tracing::warn!(job = %id, error = %e, "attachment fetch failed");
                item.mark_failed(FailureReason::Fetch(e));
            }
        }

        self.emit_item_completed(id, 0, &[item.clone()]);
        vec![item]
    }

    async fn fetch_attachment_with_progress(
        &self,
        id: JobId,
        attachment: &Attachment,
        reporter: &mut JobReporter,
        cancel: &CancellationToken,
    ) -> Result<FetchedItem, FetchError> {
        let working_dir = self.config.directories.attachment_working_dir();
        let (tx, mut rx) = mpsc::channel(32);
        let fetch = fetch_attachment(self.transport.as_ref(), attachment, &working_dir, tx);
        tokio::pin!(fetch);

        loop {
            tokio::select! {
                result = &mut fetch => {
                    // Deliver progress that was queued when the fetch ended
                    while let Ok(progress) = rx.try_recv() {
                        self.emit_event(Event::Progress {
                            id,
                            received: progress.received,
                            total: progress.total,
                        });
                        reporter.progress(progress).await;
                    }
                    return result;
                }
                Some(progress) = rx.recv() => {
                    self.emit_event(Event::Progress {
                        id,
                        received: progress.received,
                        total: progress.total,
                    });
                    reporter.progress(progress).await;
                }
                _ = cancel.cancelled() => {
                    return Err(FetchError::Unknown(CANCELLED_REASON.into()));
                }
            }
        }
    }

    async fn run_single_link(
        &self,
        id: JobId,
        message: &IncomingMessage,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> Vec<ItemResult> {
        let url = message.text.as_deref().unwrap_or_default().trim().to_string();
        let mut item = ItemResult::pending("", &url);
        self.process_link_item(id, &mut item, &url, options, cancel).await;
        self.emit_item_completed(id, 0, std::slice::from_ref(&item));
        vec![item]
    }

    async fn run_playlist(
        &self,
        id: JobId,
        message: &IncomingMessage,
        options: &FetchOptions,
        reporter: &mut JobReporter,
        job_state: &mut JobState,
        cancel: &CancellationToken,
    ) -> Vec<ItemResult> {
        let url = message.text.as_deref().unwrap_or_default().trim().to_string();

        tracing::debug!(job = %id, url, "enumerating playlist");
        let entries = match self.adapter.enumerate_playlist(&url, options).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(job = %id, error = %e, "playlist enumeration failed");
                return vec![ItemResult::failed(&url, FailureReason::Fetch(e))];
            }
        };

        // The total is fixed from this point on; inaccessible entries are
        // terminal failures that keep their slot
        let total = entries.len();
        self.emit_event(Event::Enumerated { id, total });
        reporter.enumerated(total).await;
        advance(id, job_state, JobState::Running);

        let mut items: Vec<ItemResult> = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| match entry {
                Some(entry) => ItemResult::pending(&entry.source_id, &entry.title),
                None => ItemResult::failed(
                    format!("entry {}", i + 1),
                    FailureReason::Fetch(FetchError::ItemUnavailable(
                        "private or deleted".into(),
                    )),
                ),
            })
            .collect();

        for index in 0..items.len() {
            if !items[index].outcome.is_terminal() {
                if cancel.is_cancelled() {
                    items[index].mark_failed(FailureReason::Fetch(FetchError::Unknown(
                        CANCELLED_REASON.into(),
                    )));
                } else {
                    let entry_url = watch_url(&items[index].source_id);
                    let mut item = items[index].clone();
                    self.process_link_item(id, &mut item, &entry_url, options, cancel)
                        .await;
                    items[index] = item;
                }
            }
            self.emit_item_completed(id, index, &items);
            reporter.item_completed(Tally::of(&items)).await;
        }
        items
    }

    /// Fetch one link-origin item and move it to its destination, marking
    /// the item terminal either way
    async fn process_link_item(
        &self,
        id: JobId,
        item: &mut ItemResult,
        url: &str,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) {
        if cancel.is_cancelled() {
            item.mark_failed(FailureReason::Fetch(FetchError::Unknown(
                CANCELLED_REASON.into(),
            )));
            return;
        }

        tracing::debug!(job = %id, url, "fetching item");
        let fetched = tokio::select! {
            result = self.adapter.fetch_single(url, options) => result,
            _ = cancel.cancelled() => Err(FetchError::Unknown(CANCELLED_REASON.into())),
        };

        match fetched {
            Ok(fetched) => {
                item.source_id = fetched.source_id.clone();
                item.title = fetched.title.clone();
                item.category = fetched.category;
                item.mark_fetched();
                match self.resolver.move_item(Origin::Link, &fetched).await {
                    Ok(path) => item.mark_moved(path),
                    Err(e) => {
                        tracing::warn!(job = %id, url, error = %e, "move failed");
                        item.mark_failed(FailureReason::Move(e));
                    }
                }
            }
            Err(e) => {
                tracing::warn!(job = %id, url, error = %e, "fetch failed");
                item.mark_failed(FailureReason::Fetch(e));
            }
        }
    }

    fn emit_item_completed(&self, id: JobId, index: usize, items: &[ItemResult]) {
        let tally = Tally::of(items);
        self.emit_event(Event::ItemCompleted {
            id,
            index,
            succeeded: tally.succeeded,
            failed: tally.failed,
            total: tally.total,
        });
    }
}
