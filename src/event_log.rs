//! Worker-to-UI log channel.
//!
//! The polling worker writes [`LogEntry`] values through an [`EventLog`]; the UI side
//! owns the [`LogReceiver`] and drains it on a timer into a [`LogBook`].

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, RwLock};

/// How often the UI side drains the channel.
pub const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// Tracing target of the mirrored activity log.
pub const EVENTS_TARGET: &str = "deal_hunter::events";

/// Entries kept by a [`LogBook`] before the oldest are dropped.
pub const DEFAULT_LOG_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTag {
    Deal,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub tag: Option<LogTag>,
    pub timestamp: DateTime<Local>,
}

impl LogEntry {
    pub fn new(message: impl Into<String>, tag: Option<LogTag>) -> Self {
        Self {
            message: message.into(),
            tag,
            timestamp: Local::now(),
        }
    }

    /// One terminal line. Deal entries are green and bold, errors red.
    pub fn render(&self, color: bool) -> String {
        let line = format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.message);
        match (color, self.tag) {
            (true, Some(LogTag::Deal)) => format!("\x1b[1;32m{}\x1b[0m", line),
            (true, Some(LogTag::Error)) => format!("\x1b[31m{}\x1b[0m", line),
            _ => line,
        }
    }
}

/// Sending half, cloned into the worker and the notifier.
#[derive(Debug, Clone)]
pub struct EventLog {
    tx: mpsc::UnboundedSender<LogEntry>,
}

pub struct LogReceiver {
    rx: mpsc::UnboundedReceiver<LogEntry>,
}

pub fn channel() -> (EventLog, LogReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventLog { tx }, LogReceiver { rx })
}

impl EventLog {
    pub fn info(&self, message: impl Into<String>) {
        self.push(LogEntry::new(message, None));
    }

    pub fn deal(&self, message: impl Into<String>) {
        self.push(LogEntry::new(message, Some(LogTag::Deal)));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogEntry::new(message, Some(LogTag::Error)));
    }

    pub fn push(&self, entry: LogEntry) {
        match entry.tag {
            None => tracing::info!(target: EVENTS_TARGET, "{}", entry.message.trim()),
            Some(LogTag::Deal) => tracing::warn!(target: EVENTS_TARGET, deal = true, "{}", entry.message.trim()),
            Some(LogTag::Error) => tracing::error!(target: EVENTS_TARGET, "{}", entry.message.trim()),
        }
        // A closed receiver means the UI is gone; nothing left to show the line to.
        let _ = self.tx.send(entry);
    }
}

impl LogReceiver {
    /// Everything queued right now, without waiting.
    pub fn drain(&mut self) -> Vec<LogEntry> {
        let mut entries = Vec::new();
        while let Ok(entry) = self.rx.try_recv() {
            entries.push(entry);
        }
        entries
    }

    pub async fn recv(&mut self) -> Option<LogEntry> {
        self.rx.recv().await
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedEntry {
    pub seq: u64,
    #[serde(flatten)]
    pub entry: LogEntry,
}

/// Bounded, sequenced buffer backing the dashboard's log pane.
#[derive(Debug)]
pub struct LogBook {
    entries: VecDeque<SequencedEntry>,
    next_seq: u64,
    capacity: usize,
}

impl Default for LogBook {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl LogBook {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
            next_seq: 1,
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(SequencedEntry {
            seq: self.next_seq,
            entry,
        });
        self.next_seq += 1;
    }

    /// Entries with a sequence number greater than `after`.
    pub fn since(&self, after: u64) -> Vec<SequencedEntry> {
        self.entries
            .iter()
            .filter(|e| e.seq > after)
            .cloned()
            .collect()
    }

    pub fn last_seq(&self) -> u64 {
        self.next_seq - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Drains `receiver` into `book` every [`DRAIN_INTERVAL`] until the sending side is dropped.
pub fn spawn_drain(mut receiver: LogReceiver, book: Arc<RwLock<LogBook>>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(DRAIN_INTERVAL);
        loop {
            ticker.tick().await;
            let mut entries = Vec::new();
            let mut closed = false;
            loop {
                match receiver.rx.try_recv() {
                    Ok(entry) => entries.push(entry),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        closed = true;
                        break;
                    }
                }
            }
            if !entries.is_empty() {
                let mut book = book.write().await;
                for entry in entries {
                    book.push(entry);
                }
            }
            if closed {
                break;
            }
        }
    })
}
