//! Job orchestration
//!
//! The [`Orchestrator`] owns the shared pieces of the pipeline: the chat
//! transport, the fetch adapter, the destination resolver, and the set of
//! in-flight jobs. Inbound messages are classified here; anything actionable
//! becomes a job running on its own task, tracked by a cancellation token so
//! shutdown can stop accepting work, cancel stragglers, and wait.
//!
//! Job state is transient and in-process. A restart forgets everything.

mod runner;

use crate::classifier::{classify, Classification};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::FetchAdapter;
use crate::resolver::DestinationResolver;
use crate::transport::{IncomingMessage, Transport};
use crate::types::{Event, JobId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 256;

const HELP_TEXT: &str = "Send me a video link and I will download it for you.\n\
    A playlist or channel link downloads every entry.\n\
    Send a file, photo, or audio message and I will file it away by type.";

/// Media acquisition orchestrator
///
/// All state is behind shared handles, so clones are cheap and every job
/// task holds one.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    adapter: Arc<dyn FetchAdapter>,
    resolver: DestinationResolver,
    event_tx: broadcast::Sender<Event>,
    active_jobs: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
    accepting_new: Arc<AtomicBool>,
    next_job_id: Arc<AtomicU64>,
}

impl Orchestrator {
    /// Create an orchestrator over the given transport and fetch adapter
    pub fn new(
        config: Arc<Config>,
        transport: Arc<dyn Transport>,
        adapter: Arc<dyn FetchAdapter>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let resolver = DestinationResolver::new(&config.directories);
        Self {
            config,
            transport,
            adapter,
            resolver,
            event_tx,
            active_jobs: Arc::new(Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
            next_job_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    fn emit_event(&self, event: Event) {
        // Nobody listening is fine
        self.event_tx.send(event).ok();
    }

    /// Number of jobs currently in flight
    pub async fn active_job_count(&self) -> usize {
        self.active_jobs.lock().await.len()
    }

    /// Handle one inbound message
    ///
    /// Returns the job id when the message became a job, `None` when it was
    /// a command or not actionable. Rejected with [`Error::ShuttingDown`]
    /// once shutdown has begun.
    pub async fn handle_message(&self, message: IncomingMessage) -> Result<Option<JobId>> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        if message.text.as_deref().map(str::trim) == Some("/start") {
            if let Err(e) = self.transport.send_message(message.chat, HELP_TEXT).await {
                tracing::warn!(chat = %message.chat, error = %e, "failed to send help text");
            }
            return Ok(None);
        }

        let kind = match classify(message.text.as_deref(), message.attachment.is_some()) {
            Classification::Kind(kind) => kind,
            Classification::Unclassified => {
                tracing::debug!(chat = %message.chat, "message is not actionable, ignoring");
                return Ok(None);
            }
        };

        let id = JobId::new(self.next_job_id.fetch_add(1, Ordering::SeqCst));
        let cancel = CancellationToken::new();
        self.active_jobs.lock().await.insert(id, cancel.clone());
        self.emit_event(Event::JobAccepted { id, kind });
        tracing::info!(job = %id, ?kind, chat = %message.chat, "job accepted");

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_job(id, message, kind, cancel).await;
            orchestrator.active_jobs.lock().await.remove(&id);
        });

        Ok(Some(id))
    }

    /// Graceful shutdown: stop accepting, cancel in-flight jobs, wait
    ///
    /// Returns once every job task has drained or the timeout elapses.
    pub async fn shutdown(&self, timeout: Duration) {
        self.accepting_new.store(false, Ordering::SeqCst);
        self.emit_event(Event::Shutdown);

        {
            let jobs = self.active_jobs.lock().await;
            tracing::info!(active = jobs.len(), "shutting down, cancelling active jobs");
            for token in jobs.values() {
                token.cancel();
            }
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.active_jobs.lock().await.is_empty() {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                let remaining = self.active_jobs.lock().await.len();
                tracing::warn!(remaining, "shutdown timeout reached with jobs still active");
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
