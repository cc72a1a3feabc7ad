//! Scan progress statuses and the broadcast event bus feeding SSE clients.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Per-file outcome reported by the scan engine's progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanStatus {
    UpToDate,
    Processed,
    Deleted,
    Killed,
    ErrorParse,
    ErrorComm,
    Skipped,
}

/// The five buckets a [`ScanStatus`] rolls up into for the coordinator's
/// progress counters. `Killed`, `ErrorParse`, and `ErrorComm` all count
/// as `errors`; their sum is the number of files visited.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct ScanCounters {
    pub up_to_date: u64,
    pub processed: u64,
    pub deleted: u64,
    pub skipped: u64,
    pub errors: u64,
}

impl ScanCounters {
    pub fn record(&mut self, status: ScanStatus) {
        match status {
            ScanStatus::UpToDate => self.up_to_date += 1,
            ScanStatus::Processed => self.processed += 1,
            ScanStatus::Deleted => self.deleted += 1,
            ScanStatus::Skipped => self.skipped += 1,
            ScanStatus::Killed | ScanStatus::ErrorParse | ScanStatus::ErrorComm => {
                self.errors += 1
            }
        }
    }

    pub fn visited(&self) -> u64 {
        self.up_to_date + self.processed + self.deleted + self.skipped + self.errors
    }

    pub fn merge(&mut self, other: &ScanCounters) {
        self.up_to_date += other.up_to_date;
        self.processed += other.processed;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}

/// A category's configured directories and the parser names enabled for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub dirs: Vec<String>,
    pub parsers: Vec<String>,
}

/// Snapshot of the coordinator's observable properties (the bus surface).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub db_path: String,
    pub is_scanning: bool,
    pub write_locked: bool,
    pub update_id: i64,
    pub categories: HashMap<String, CategoryInfo>,
}

/// Events broadcast over the daemon's SSE stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DaemonEvent {
    /// Throttled or final scan-progress update for one root/category.
    ScanProgress {
        category: String,
        path: String,
        counters: ScanCounters,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// Coalesced notification that one or more observable properties changed.
    PropertyChanged {
        status: DaemonStatus,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// A scan run finished, successfully or not.
    ScanCompleted {
        category: String,
        counters: ScanCounters,
        duration_seconds: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl DaemonEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DaemonEvent::ScanProgress { .. } => "ScanProgress",
            DaemonEvent::PropertyChanged { .. } => "PropertyChanged",
            DaemonEvent::ScanCompleted { .. } => "ScanCompleted",
        }
    }
}

/// Central event distribution bus. Uses `tokio::broadcast` internally:
/// publish never blocks, and a slow SSE subscriber just misses older
/// events rather than stalling the scanner task.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DaemonEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.tx.subscribe()
    }

    /// Publish an event, ignoring the case where nobody is listening.
    pub fn publish(&self, event: DaemonEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_roll_up_errors() {
        let mut c = ScanCounters::default();
        c.record(ScanStatus::UpToDate);
        c.record(ScanStatus::Processed);
        c.record(ScanStatus::Killed);
        c.record(ScanStatus::ErrorParse);
        assert_eq!(c.up_to_date, 1);
        assert_eq!(c.processed, 1);
        assert_eq!(c.errors, 2);
        assert_eq!(c.visited(), 4);
    }

    #[test]
    fn counters_merge_sums_fields() {
        let mut a = ScanCounters { up_to_date: 1, processed: 2, deleted: 0, skipped: 1, errors: 0 };
        let b = ScanCounters { up_to_date: 3, processed: 0, deleted: 1, skipped: 0, errors: 2 };
        a.merge(&b);
        assert_eq!(a.up_to_date, 4);
        assert_eq!(a.processed, 2);
        assert_eq!(a.deleted, 1);
        assert_eq!(a.skipped, 1);
        assert_eq!(a.errors, 2);
    }

    #[tokio::test]
    async fn bus_delivers_to_subscriber() {
        let bus = EventBus::new(8);
        assert_eq!(bus.subscriber_count(), 0);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(DaemonEvent::ScanProgress {
            category: "audio".into(),
            path: "/m".into(),
            counters: ScanCounters::default(),
            timestamp: chrono::Utc::now(),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "ScanProgress");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new(2);
        let sent = bus.publish(DaemonEvent::PropertyChanged {
            status: DaemonStatus {
                db_path: "/tmp/db.sqlite3".into(),
                is_scanning: false,
                write_locked: false,
                update_id: 0,
                categories: HashMap::new(),
            },
            timestamp: chrono::Utc::now(),
        });
        assert_eq!(sent, 0);
    }
}
