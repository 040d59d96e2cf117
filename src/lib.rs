//! tgmedia-dl: a chat-driven media acquisition orchestrator
//!
//! Listens for messages on a chat transport, classifies each one as an
//! attached file, a single video link, or a playlist link, fetches the
//! content through an extraction engine or the transport itself, and files
//! the result into content-typed destination directories. Status is reported
//! back by editing a single message per job. A small scheduler can also send
//! fixed messages at configured times of day.
//!
//! # Architecture
//!
//! - [`classifier`]: pure classification of inbound messages
//! - [`job`]: the orchestrator and per-job state machine
//! - [`fetch`]: the extraction-engine adapter and attachment downloads
//! - [`resolver`]: destination mapping and collision-free moves
//! - [`reporter`]: throttled per-job status message edits
//! - [`transport`]: the chat transport trait and its Bot API implementation
//! - [`dispatcher`]: time-of-day scheduled messages
//!
//! All job state is in-memory and scoped to the process.

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fetch;
pub mod job;
pub mod reporter;
pub mod resolver;
pub mod transport;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use job::Orchestrator;
pub use types::{Event, JobId, RequestKind, TerminalState};

/// Wait for a shutdown signal (Ctrl-C, or SIGTERM on unix)
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM, using Ctrl-C only");
                tokio::signal::ctrl_c().await.ok();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("received Ctrl-C"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("received Ctrl-C");
    }
}
