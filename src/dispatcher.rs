//! Scheduled message dispatcher
//!
//! Fires configured messages at fixed local times of day, independent of the
//! job pipeline. Entries come from configuration; a malformed entry is
//! skipped with a warning at startup and never aborts the process. Each
//! entry fires at most once per matching minute.

use crate::config::RawScheduleEntry;
use crate::transport::{ChatId, Transport};
use chrono::{NaiveTime, Timelike};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TIME_FORMAT: &str = "%H:%M";
const TICK_INTERVAL: Duration = Duration::from_secs(20);

/// A validated schedule entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// Chat to send to
    pub target: ChatId,
    /// Message text
    pub message: String,
    /// Local time of day to fire at
    pub time: NaiveTime,
}

impl ScheduleEntry {
    /// Validate a raw config entry; `None` means the entry is unusable
    fn from_raw(raw: &RawScheduleEntry) -> Option<Self> {
        let target = raw.target?;
        let message = raw.message.as_deref()?.trim();
        if message.is_empty() {
            return None;
        }
        let time = NaiveTime::parse_from_str(raw.time.as_deref()?, TIME_FORMAT).ok()?;
        Some(Self {
            target: ChatId(target),
            message: message.to_string(),
            time,
        })
    }
}

/// Validate raw entries, logging and skipping anything unusable
pub fn validate_entries(raw: &[RawScheduleEntry]) -> Vec<ScheduleEntry> {
    raw.iter()
        .enumerate()
        .filter_map(|(i, entry)| match ScheduleEntry::from_raw(entry) {
            Some(entry) => Some(entry),
            None => {
                tracing::warn!(index = i, ?entry, "skipping invalid schedule entry");
                None
            }
        })
        .collect()
}

/// Runs the schedule loop until cancelled
pub struct ScheduledDispatcher {
    transport: Arc<dyn Transport>,
    entries: Vec<ScheduleEntry>,
}

impl ScheduledDispatcher {
    /// Build the dispatcher from raw config entries
    pub fn new(transport: Arc<dyn Transport>, raw: &[RawScheduleEntry]) -> Self {
        let entries = validate_entries(raw);
        tracing::info!(count = entries.len(), "schedule loaded");
        Self { transport, entries }
    }

    /// Run until the token is cancelled
    ///
    /// Send failures are logged and the loop keeps going; a missed delivery
    /// is not retried.
    pub async fn run(self, cancel: CancellationToken) {
        if self.entries.is_empty() {
            cancel.cancelled().await;
            return;
        }

        let mut last_fired_minute: Option<String> = None;
        loop {
            let now = chrono::Local::now();
            let minute_key = now.format("%Y-%m-%d %H:%M").to_string();
            if last_fired_minute.as_ref() != Some(&minute_key) {
                for entry in entries_due(&self.entries, now.time()) {
                    tracing::info!(chat = %entry.target, time = %entry.time, "sending scheduled message");
                    if let Err(e) = self
                        .transport
                        .send_message(entry.target, &entry.message)
                        .await
                    {
                        tracing::warn!(chat = %entry.target, error = %e, "scheduled send failed");
                    }
                }
                last_fired_minute = Some(minute_key);
            }

            tokio::select! {
                _ = tokio::time::sleep(TICK_INTERVAL) => {}
                _ = cancel.cancelled() => return,
            }
        }
    }
}

/// Entries whose time matches the given time to the minute
fn entries_due(entries: &[ScheduleEntry], now: NaiveTime) -> Vec<&ScheduleEntry> {
    entries
        .iter()
        .filter(|e| e.time.hour() == now.hour() && e.time.minute() == now.minute())
        .collect()
}
