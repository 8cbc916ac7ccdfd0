use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Request outcome counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub books_created: Arc<AtomicU64>,
    pub books_updated: Arc<AtomicU64>,
    pub books_deleted: Arc<AtomicU64>,
    pub relations_updated: Arc<AtomicU64>,
    pub permission_denied: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            books_created: Arc::new(AtomicU64::new(0)),
            books_updated: Arc::new(AtomicU64::new(0)),
            books_deleted: Arc::new(AtomicU64::new(0)),
            relations_updated: Arc::new(AtomicU64::new(0)),
            permission_denied: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_books_created(&self) {
        self.books_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_books_updated(&self) {
        self.books_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_books_deleted(&self) {
        self.books_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_relations_updated(&self) {
        self.relations_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_permission_denied(&self) {
        self.permission_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            books_created: self.books_created.load(Ordering::Relaxed),
            books_updated: self.books_updated.load(Ordering::Relaxed),
            books_deleted: self.books_deleted.load(Ordering::Relaxed),
            relations_updated: self.relations_updated.load(Ordering::Relaxed),
            permission_denied: self.permission_denied.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub books_created: u64,
    pub books_updated: u64,
    pub books_deleted: u64,
    pub relations_updated: u64,
    pub permission_denied: u64,
    pub uptime_seconds: u64,
}
