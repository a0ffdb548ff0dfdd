// Capped, insertion-ordered buffers shared between the loops and the API.

use crate::models::{LogEntry, TradeRecord};
use log::info;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Append-only ring buffer: new items go to the tail, the oldest are
/// evicted from the head once `capacity` is exceeded.
#[derive(Debug)]
pub struct BoundedBuffer<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
}

impl<T: Clone> BoundedBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn append(&self, item: T) {
        let mut items = self.items.lock().await;
        items.push_back(item);
        while items.len() > self.capacity {
            items.pop_front();
        }
    }

    /// Append several items under a single lock so they stay contiguous.
    pub async fn extend<I: IntoIterator<Item = T>>(&self, batch: I) {
        let mut items = self.items.lock().await;
        for item in batch {
            items.push_back(item);
        }
        while items.len() > self.capacity {
            items.pop_front();
        }
    }

    /// Point-in-time copy, oldest first.
    pub async fn snapshot(&self) -> Vec<T> {
        self.items.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }
}

/// The user-visible event log. Every entry is mirrored to the process log.
#[derive(Debug)]
pub struct EventLog {
    entries: BoundedBuffer<LogEntry>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BoundedBuffer::new(capacity),
        }
    }

    pub async fn push(&self, message: impl Into<String>) {
        let entry = LogEntry::now(message);
        info!("{}", entry);
        self.entries.append(entry).await;
    }

    /// Push a group of messages (e.g. one gate evaluation) without letting
    /// another writer interleave.
    pub async fn push_all(&self, messages: Vec<String>) {
        let entries: Vec<LogEntry> = messages.into_iter().map(LogEntry::now).collect();
        for entry in &entries {
            info!("{}", entry);
        }
        self.entries.extend(entries).await;
    }

    pub async fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.snapshot().await
    }

    pub async fn len(&self) -> usize {
        self.entries.len().await
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }
}

#[derive(Debug)]
pub struct TradeLedger {
    trades: BoundedBuffer<TradeRecord>,
}

impl TradeLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            trades: BoundedBuffer::new(capacity),
        }
    }

    pub async fn record(&self, trade: TradeRecord) {
        self.trades.append(trade).await;
    }

    pub async fn snapshot(&self) -> Vec<TradeRecord> {
        self.trades.snapshot().await
    }

    pub async fn len(&self) -> usize {
        self.trades.len().await
    }

    pub fn capacity(&self) -> usize {
        self.trades.capacity()
    }
}
