//! Error types for tgmedia-dl
//!
//! The error taxonomy mirrors the propagation policy of the orchestrator:
//! - [`Error`]: top-level errors (configuration, I/O, transport plumbing)
//! - [`FetchError`]: per-item fetch failures, folded into the item's outcome
//! - [`MoveError`]: per-item move failures, folded into the item's outcome
//! - [`TransportError`]: outbound messaging failures, logged and never raised
//!
//! Per-item errors never abort sibling items in a playlist; only configuration
//! errors prevent the process from starting at all.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tgmedia-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tgmedia-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "telegram.token")
        key: Option<String>,
    },

    /// Fetch failure (per-item; reaches this level only for job-level setup)
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Move failure (per-item; reaches this level only for job-level setup)
    #[error("move error: {0}")]
    Move(#[from] MoveError),

    /// Transport failure (outbound messaging, update polling)
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Per-item fetch failures surfaced by the fetch adapter
///
/// The adapter classifies extraction-engine output into these kinds so the
/// status reporter can render actionable text (notably
/// [`AuthenticationRequired`](FetchError::AuthenticationRequired), which
/// points at cookie configuration instead of the generic failure template).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The engine reported a bot/sign-in challenge
    #[error("authentication required: the site asked for a sign-in challenge")]
    AuthenticationRequired,

    /// The requested format selector matched nothing
    #[error("requested format is not available")]
    FormatUnavailable,

    /// The item is private, deleted, or otherwise inaccessible
    #[error("item unavailable: {0}")]
    ItemUnavailable(String),

    /// A network-level failure that may succeed on a later attempt
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// Anything the classifier could not recognize
    #[error("fetch failed: {0}")]
    Unknown(String),
}

/// Per-item move failures surfaced by the destination resolver
///
/// Variants carry owned strings rather than source errors so an item's
/// terminal outcome can store the reason without borrowing.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MoveError {
    /// No working-area file matched the source identifier and extension
    #[error("no working-area file matches id {source_id} with extension .{extension}")]
    SourceMissing {
        /// The source identifier that was searched for
        source_id: String,
        /// The exact extension that was required
        extension: String,
    },

    /// More than one working-area file matched; the move is never guessed
    #[error("{count} working-area files match id {source_id}; refusing to guess")]
    AmbiguousSource {
        /// The source identifier that was searched for
        source_id: String,
        /// How many candidates matched
        count: usize,
    },

    /// Could not find a collision-free destination name
    #[error("file collision at {}: {reason}", path.display())]
    Collision {
        /// The destination path where the collision occurred
        path: PathBuf,
        /// Why no unique name could be produced
        reason: String,
    },

    /// The rename/copy into the destination failed
    #[error("failed to move {} to {}: {reason}", source_path.display(), dest_path.display())]
    MoveFailed {
        /// The working-area file being moved
        source_path: PathBuf,
        /// The destination it was being moved to
        dest_path: PathBuf,
        /// The underlying I/O failure
        reason: String,
    },
}

/// Transport-level failures (send, edit, poll, file download)
///
/// These are never fatal to a job: the status reporter logs them and carries
/// on with later checkpoints.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed before the API answered
    #[error("transport request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The messaging API answered with an error payload
    #[error("transport API error {code}: {description}")]
    Api {
        /// API error code
        code: i64,
        /// Human-readable description from the API
        description: String,
    },

    /// The API response could not be decoded
    #[error("malformed transport response: {0}")]
    Decode(String),

    /// Writing downloaded attachment bytes failed
    #[error("attachment write failed: {0}")]
    Io(#[from] std::io::Error),
}
