//! Core types and events for tgmedia-dl

use crate::error::{FetchError, MoveError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for an acquisition job
///
/// Job state is transient and scoped to a single process instance, so the id
/// is a plain in-process counter value; there is no persistence behind it.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    /// Create a new JobId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of acquisition an inbound request asks for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// A file attached to the chat message
    AttachedMedia,
    /// A single video URL on the supported hosting domain
    SingleVideoLink,
    /// A playlist or channel-videos URL on the supported hosting domain
    PlaylistLink,
}

impl RequestKind {
    /// True for requests that fan out into multiple items
    pub fn is_playlist(&self) -> bool {
        matches!(self, RequestKind::PlaylistLink)
    }
}

/// Content category of a fetched unit, used for destination partitioning
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    /// Video content (video/* MIME or link-origin video)
    Video,
    /// Audio content (audio/* MIME)
    Audio,
    /// Photos and other images
    Photo,
    /// Named documents with a recognized document MIME type
    Document,
    /// Everything else, including attachments without a MIME type
    Other,
}

impl std::fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContentCategory::Video => "video",
            ContentCategory::Audio => "audio",
            ContentCategory::Photo => "photo",
            ContentCategory::Document => "document",
            ContentCategory::Other => "other",
        };
        f.write_str(s)
    }
}

/// Why an item ended up in a failed outcome
///
/// Stage errors are captured as values at the controller boundary, never
/// re-raised, so the reason keeps the original error kind around for the
/// status reporter (an authentication challenge renders differently from a
/// generic failure).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// The fetch stage failed
    Fetch(FetchError),
    /// The resolve/move stage failed
    Move(MoveError),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Fetch(e) => write!(f, "{e}"),
            FailureReason::Move(e) => write!(f, "{e}"),
        }
    }
}

impl FailureReason {
    /// True when the reason is an authentication/sign-in challenge
    pub fn is_authentication(&self) -> bool {
        matches!(self, FailureReason::Fetch(FetchError::AuthenticationRequired))
    }
}

/// Per-item outcome within a job
///
/// Outcomes are monotonic: Pending → Fetched → Moved, or Pending/Fetched →
/// Failed. Once terminal (Moved or Failed) an outcome never changes again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Fetch has not completed yet
    Pending,
    /// Bytes landed in the working area, move not done yet
    Fetched,
    /// Moved into its final destination path
    Moved,
    /// Failed at fetch or move, with the captured reason
    Failed(FailureReason),
}

impl ItemOutcome {
    /// True for Moved and Failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemOutcome::Moved | ItemOutcome::Failed(_))
    }
}

/// The per-unit outcome record within a job (one per video or playlist entry)
#[derive(Clone, Debug)]
pub struct ItemResult {
    /// Stable source identifier (e.g., the video id)
    pub source_id: String,
    /// Human-readable title, used for the destination filename
    pub title: String,
    /// Content category, decides the destination root
    pub category: ContentCategory,
    /// Current outcome; immutable once terminal
    pub outcome: ItemOutcome,
    /// Final destination path; set if and only if outcome is Moved
    pub final_path: Option<PathBuf>,
}

impl ItemResult {
    /// Create a pending item
    pub fn pending(source_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            title: title.into(),
            category: ContentCategory::Video,
            outcome: ItemOutcome::Pending,
            final_path: None,
        }
    }

    /// Create an item that failed before any fetch was attempted
    /// (private/removed playlist entries become these at enumeration time)
    pub fn failed(title: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            source_id: String::new(),
            title: title.into(),
            category: ContentCategory::Video,
            outcome: ItemOutcome::Failed(reason),
            final_path: None,
        }
    }

    /// Advance to Fetched. Ignored if the outcome is already terminal.
    pub fn mark_fetched(&mut self) {
        if !self.outcome.is_terminal() {
            self.outcome = ItemOutcome::Fetched;
        }
    }

    /// Advance to Moved with the final path. Ignored if already terminal.
    pub fn mark_moved(&mut self, path: PathBuf) {
        if !self.outcome.is_terminal() {
            self.outcome = ItemOutcome::Moved;
            self.final_path = Some(path);
        }
    }

    /// Advance to Failed with the captured reason. Ignored if already terminal.
    pub fn mark_failed(&mut self, reason: FailureReason) {
        if !self.outcome.is_terminal() {
            self.outcome = ItemOutcome::Failed(reason);
        }
    }
}

/// Terminal state of a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    /// Every item moved into its destination
    Succeeded,
    /// Some items moved, some failed (playlists only)
    PartiallyFailed,
    /// Every item failed (or the job failed before any item ran)
    Failed,
}

/// Job lifecycle state
///
/// States only move forward; terminal states are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    /// Job exists, no I/O yet
    Created,
    /// Request classification in progress
    Classifying,
    /// Playlist enumeration in progress (playlist jobs only)
    Enumerating,
    /// Items are being processed
    Running,
    /// All items processed, summary being computed
    Summarizing,
    /// Job is done
    Terminal(TerminalState),
}

impl JobState {
    /// True once the job has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Terminal(_))
    }
}

/// Running success/failure tally over a job's items
///
/// Counts only terminal outcomes, so tallies reported at successive
/// checkpoints are monotonically non-decreasing component-wise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    /// Items with outcome Moved
    pub succeeded: usize,
    /// Items with outcome Failed
    pub failed: usize,
    /// Fixed total recorded at enumeration time
    pub total: usize,
}

impl Tally {
    /// Compute the tally over a job's items
    pub fn of(items: &[ItemResult]) -> Self {
        let mut tally = Tally {
            total: items.len(),
            ..Default::default()
        };
        for item in items {
            match item.outcome {
                ItemOutcome::Moved => tally.succeeded += 1,
                ItemOutcome::Failed(_) => tally.failed += 1,
                _ => {}
            }
        }
        tally
    }
}

/// Summary of a finished job, derived on demand from its items
///
/// Never stored; recomputed for each status render.
#[derive(Clone, Debug)]
pub struct PlaylistSummary {
    /// Fixed total from enumeration time (1 for single-item jobs)
    pub total: usize,
    /// Items that reached Moved
    pub succeeded: usize,
    /// Items that reached Failed
    pub failed: usize,
    /// (title, reason) pairs for every failed item, in item order
    pub failures: Vec<(String, String)>,
}

impl PlaylistSummary {
    /// Compute the summary from a job's items
    pub fn from_items(items: &[ItemResult]) -> Self {
        let tally = Tally::of(items);
        let failures = items
            .iter()
            .filter_map(|item| match &item.outcome {
                ItemOutcome::Failed(reason) => {
                    Some((item.title.clone(), reason.to_string()))
                }
                _ => None,
            })
            .collect();
        Self {
            total: tally.total,
            succeeded: tally.succeeded,
            failed: tally.failed,
            failures,
        }
    }

    /// Derive the job's terminal state from the summary
    ///
    /// All moved → Succeeded; all failed → Failed; a mix → PartiallyFailed.
    /// Single-item jobs can only reach Succeeded or Failed.
    pub fn terminal_state(&self) -> TerminalState {
        if self.failed == 0 && self.succeeded == self.total && self.total > 0 {
            TerminalState::Succeeded
        } else if self.succeeded == 0 {
            TerminalState::Failed
        } else {
            TerminalState::PartiallyFailed
        }
    }
}

/// A fetched unit produced by the fetch adapter
#[derive(Clone, Debug)]
pub struct FetchedItem {
    /// Stable source identifier (video id or attachment file id)
    pub source_id: String,
    /// Declared title
    pub title: String,
    /// Declared file extension, without the leading dot
    pub extension: String,
    /// Working-area directory where the bytes were written; the exact file
    /// is matched by the destination resolver via id + extension
    pub working_dir: PathBuf,
    /// Content category
    pub category: ContentCategory,
}

/// One entry of an enumerated playlist
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaylistEntry {
    /// Stable source identifier of the entry
    pub source_id: String,
    /// Entry title as reported by the enumeration
    pub title: String,
}

/// Byte-count progress published by the fetch adapter
///
/// Consumed asynchronously by the status reporter; the reporter throttles
/// edits so fetch speed never dictates the edit rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    /// Bytes received so far
    pub received: u64,
    /// Total bytes if known
    pub total: Option<u64>,
}

/// Event emitted during the job lifecycle
///
/// Multiple subscribers are supported via a broadcast channel; the status
/// reporter is transport-facing and separate from this stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A job was accepted for processing
    JobAccepted {
        /// Job ID
        id: JobId,
        /// Request kind
        kind: RequestKind,
    },

    /// Playlist enumeration finished; the total is fixed from here on
    Enumerated {
        /// Job ID
        id: JobId,
        /// Number of entries, including inaccessible ones
        total: usize,
    },

    /// One item reached a terminal outcome
    ItemCompleted {
        /// Job ID
        id: JobId,
        /// Item index in enumeration order
        index: usize,
        /// Items succeeded so far
        succeeded: usize,
        /// Items failed so far
        failed: usize,
        /// Fixed total
        total: usize,
    },

    /// Attachment byte-count progress
    Progress {
        /// Job ID
        id: JobId,
        /// Bytes received so far
        received: u64,
        /// Total bytes if known
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
    },

    /// The job reached a terminal state
    JobFinished {
        /// Job ID
        id: JobId,
        /// Terminal state
        state: TerminalState,
        /// Items succeeded
        succeeded: usize,
        /// Items failed
        failed: usize,
        /// Fixed total
        total: usize,
    },

    /// Graceful shutdown initiated
    Shutdown,
}
