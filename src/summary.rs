//! Pluggable AI document summarization.
//!
//! The core does not talk to any LLM service itself: callers provide a
//! `SummarySink` and the engine handles metadata lookup plus an LRU
//! cache with a TTL. Failed generations are returned as structured
//! values and never cached.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde_json::Value;

/// Input handed to a summary sink: the document identity plus the
/// fields fetched from the metadata sidecar.
#[derive(Clone, Debug)]
pub struct SummaryRequest {
    pub cord_uid: String,
    pub title: String,
    pub abstract_text: String,
}

/// Result of one sink invocation.
#[derive(Clone, Debug)]
pub enum SummaryOutcome {
    /// Successful generation; will be cached.
    Generated(Value),
    /// Structured error object; returned to the caller, never cached.
    Failed(Value),
}

/// External summarization service.
pub trait SummarySink: Send + Sync {
    fn summarize(&self, request: &SummaryRequest) -> SummaryOutcome;
}

struct CachedEntry {
    value: Value,
    stored_at: Instant,
}

/// Count-bounded LRU of successful summaries with a TTL.
pub struct SummaryCache {
    entries: LruCache<String, CachedEntry>,
    ttl: Duration,
}

impl SummaryCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Cache key for a document's summary.
    pub fn key_for(cord_uid: &str) -> String {
        format!("summary|{cord_uid}")
    }

    /// Fetch a live entry; expired entries are evicted on access.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.stored_at.elapsed() < self.ttl {
                    return Some(entry.value.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.pop(key);
        }
        None
    }

    pub fn put(&mut self, key: String, value: Value) {
        self.entries.put(
            key,
            CachedEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
