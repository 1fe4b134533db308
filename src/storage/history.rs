//! In-memory, newest-first view of every captured request.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use crate::capture::CapturedRequest;
use crate::observability::metrics;

/// Process-wide history, ordered by descending timestamp.
///
/// Cheap to clone; all clones share the same sequence. Critical
/// sections are a single insert or a bounded copy.
#[derive(Debug, Clone, Default)]
pub struct HistoryCache {
    inner: Arc<RwLock<VecDeque<CapturedRequest>>>,
}

impl HistoryCache {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an unordered bulk load.
    ///
    /// The sort is stable, so records with equal timestamps keep their
    /// load order.
    pub fn from_records(mut records: Vec<CapturedRequest>) -> Self {
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        metrics::set_history_size(records.len());
        Self {
            inner: Arc::new(RwLock::new(records.into())),
        }
    }

    /// Insert a freshly captured record at the head.
    ///
    /// Callers stamp records in insertion order, so the head is always
    /// the newest.
    pub fn insert(&self, record: CapturedRequest) {
        let mut records = self.inner.write().expect("history lock poisoned");
        records.push_front(record);
        metrics::set_history_size(records.len());
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.inner.read().expect("history lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of `[start, end)` clipped to the current length.
    ///
    /// Empty when `start` is negative, `start > end`, or `start` is
    /// past the end.
    pub fn range(&self, start: i64, end: i64) -> Vec<CapturedRequest> {
        if start < 0 || start > end {
            return Vec::new();
        }
        let records = self.inner.read().expect("history lock poisoned");
        let len = records.len();
        let start = usize::try_from(start).unwrap_or(usize::MAX);
        if start >= len {
            return Vec::new();
        }
        let end = usize::try_from(end).unwrap_or(usize::MAX).min(len);
        records.range(start..end).cloned().collect()
    }

    /// Snapshot of the whole history, newest first.
    pub fn snapshot(&self) -> Vec<CapturedRequest> {
        self.inner
            .read()
            .expect("history lock poisoned")
            .iter()
            .cloned()
            .collect()
    }
}
