//! The query engine: composes segments, autocomplete, semantic
//! expansion, and the metadata sidecar behind three operations —
//! `search`, `suggest`, `reload`.
//!
//! Readers work on an immutable snapshot obtained from an `ArcSwap`;
//! `reload` builds the complete replacement off to the side and
//! publishes it with a single atomic store, so searches straddling a
//! reload observe either the old or the new index, never a mix.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::index::{load_manifest, Segment};
use crate::metadata::{self, UidMeta};
use crate::metrics::EngineMetrics;
use crate::semantic::SemanticIndex;
use crate::suggest::SuggestTrie;
use crate::summary::{SummaryCache, SummaryOutcome, SummaryRequest, SummarySink};
use crate::text;

/// One ranked search result, hydrated for display.
#[derive(Clone, Debug, Serialize)]
pub struct SearchHit {
    pub score: f32,
    pub segment: String,
    #[serde(rename = "docId")]
    pub doc_id: u32,
    pub cord_uid: String,
    pub title: String,
    pub json_relpath: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Search response envelope.
#[derive(Clone, Debug, Serialize)]
pub struct SearchOutput {
    pub query: String,
    pub k: usize,
    pub segments: usize,
    pub found: u64,
    pub results: Vec<SearchHit>,
    pub search_time_ms: f64,
}

/// Suggest response envelope.
#[derive(Clone, Debug, Serialize)]
pub struct SuggestOutput {
    pub query: String,
    pub limit: usize,
    pub suggestions: Vec<String>,
}

/// Everything a reader needs, swapped as one unit.
struct LiveIndex {
    seg_names: Vec<String>,
    segments: Vec<Segment>,
    suggest: SuggestTrie,
    semantic: SemanticIndex,
    uid_meta: HashMap<String, UidMeta>,
}

impl LiveIndex {
    fn empty() -> Self {
        Self {
            seg_names: Vec::new(),
            segments: Vec::new(),
            suggest: SuggestTrie::empty(),
            semantic: SemanticIndex::disabled(),
            uid_meta: HashMap::new(),
        }
    }
}

/// Candidate during top-K selection. The total order makes ranking
/// deterministic: higher score wins, then the lexicographically
/// smaller `(segment_index, doc_id)`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Ranked {
    score: f32,
    seg: u32,
    doc: u32,
}

impl Eq for Ranked {}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.seg.cmp(&self.seg))
            .then_with(|| other.doc.cmp(&self.doc))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Multi-reader search engine over a segmented on-disk index.
pub struct Engine {
    config: EngineConfig,
    live: ArcSwap<LiveIndex>,
    reload_lock: Mutex<()>,
    summary_cache: Mutex<SummaryCache>,
    metrics: EngineMetrics,
}

impl Engine {
    /// Create an engine with no loaded segments. Call `reload` to load
    /// the initial index.
    pub fn new(config: EngineConfig) -> Self {
        let summary_cache = SummaryCache::new(
            config.summary_cache_capacity,
            config.summary_cache_ttl,
        );
        Self {
            config,
            live: ArcSwap::from_pointee(LiveIndex::empty()),
            reload_lock: Mutex::new(()),
            summary_cache: Mutex::new(summary_cache),
            metrics: EngineMetrics::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Number of live segments.
    pub fn segment_count(&self) -> usize {
        self.live.load().segments.len()
    }

    /// Load (or re-load) the index from disk and atomically swap it in.
    /// On any failure the previous live state is left untouched and
    /// `false` is returned.
    pub fn reload(&self) -> bool {
        let _guard = self.reload_lock.lock();

        match self.build_live() {
            Ok(live) => {
                info!(
                    segments = live.segments.len(),
                    terms = live.segments.iter().map(|s| s.term_count()).sum::<usize>(),
                    semantic = live.semantic.enabled(),
                    metadata_rows = live.uid_meta.len(),
                    "index reloaded"
                );
                self.metrics.record_reload(true, live.segments.len());
                self.live.store(Arc::new(live));
                true
            }
            Err(e) => {
                warn!(error = %e, "reload failed, keeping previous index");
                self.metrics.record_reload(false, 0);
                false
            }
        }
    }

    fn build_live(&self) -> Result<LiveIndex> {
        let seg_names = self.resolve_segment_names()?;

        let mut segments = Vec::with_capacity(seg_names.len());
        for name in &seg_names {
            let dir = self.config.segments_dir().join(name);
            let seg = Segment::load(&dir).map_err(|e| {
                warn!(segment = %name, error = %e, "segment failed to load");
                e
            })?;
            segments.push(seg);
        }

        // Merged term -> Σ df across segments: the autocomplete ranking
        // and the vocabulary restriction for embeddings.
        let mut term_scores: HashMap<String, u32> = HashMap::new();
        for seg in &segments {
            for (term, entry) in seg.terms() {
                *term_scores.entry(term.clone()).or_insert(0) += entry.df;
            }
        }
        let suggest = SuggestTrie::build(&term_scores, self.config.suggest_candidates);

        let vocabulary: HashSet<String> = term_scores.into_keys().collect();
        let semantic = self.load_semantic(&vocabulary);

        let uid_meta = match metadata::load_uid_meta(&self.config.metadata_path()) {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, "metadata sidecar unavailable");
                HashMap::new()
            }
        };

        Ok(LiveIndex {
            seg_names,
            segments,
            suggest,
            semantic,
            uid_meta,
        })
    }

    /// Manifest first; a directory scan of `segments/seg_*` is the
    /// fallback when the manifest is missing or empty.
    fn resolve_segment_names(&self) -> Result<Vec<String>> {
        let manifest = self.config.manifest_path();
        let mut names = match load_manifest(&manifest) {
            Ok(names) => names,
            Err(e) => {
                debug!(error = %e, "manifest unreadable, scanning segments directory");
                Vec::new()
            }
        };

        if names.is_empty() {
            let segroot = self.config.segments_dir();
            if segroot.is_dir() {
                for entry in std::fs::read_dir(&segroot)? {
                    let entry = entry?;
                    if !entry.file_type()?.is_dir() {
                        continue;
                    }
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if name.starts_with("seg_") {
                        names.push(name);
                    }
                }
                names.sort_unstable();
            }
        }

        if names.is_empty() {
            return Err(crate::error::CordexError::Manifest(format!(
                "no segments found under {}",
                self.config.index_dir.display()
            )));
        }
        Ok(names)
    }

    /// Embedding path precedence: explicit config, EMBEDDINGS_PATH,
    /// then conventional filenames in the index directory. Any failure
    /// just disables semantic expansion.
    fn load_semantic(&self, vocabulary: &HashSet<String>) -> SemanticIndex {
        let path = self.config.embeddings_path.clone().or_else(|| {
            std::env::var_os("EMBEDDINGS_PATH")
                .map(PathBuf::from)
                .or_else(|| {
                    ["embeddings.vec", "embeddings.txt", "glove.txt", "vectors.txt"]
                        .iter()
                        .map(|name| self.config.index_dir.join(name))
                        .find(|p| p.exists())
                })
        });

        let path = match path {
            Some(p) if p.exists() => p,
            _ => return SemanticIndex::disabled(),
        };

        match SemanticIndex::load_from_text(&path, vocabulary) {
            Ok(idx) if idx.enabled() => {
                info!(
                    terms = idx.len(),
                    dim = idx.dim(),
                    path = %path.display(),
                    "semantic embeddings loaded"
                );
                idx
            }
            Ok(_) => {
                warn!(path = %path.display(), "embedding file held no usable vectors, semantic expansion disabled");
                SemanticIndex::disabled()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "embedding file unreadable, semantic expansion disabled");
                SemanticIndex::disabled()
            }
        }
    }

    /// BM25 ranked search across all live segments.
    pub fn search(&self, query: &str, k: usize) -> SearchOutput {
        let t0 = Instant::now();
        let live = self.live.load();
        let capacity = k.clamp(1, 100);

        let mut out = SearchOutput {
            query: query.to_string(),
            k: capacity,
            segments: live.segments.len(),
            found: 0,
            results: Vec::new(),
            search_time_ms: 0.0,
        };

        let base_terms = text::query_terms(query);
        if base_terms.is_empty() || live.segments.is_empty() {
            out.search_time_ms = t0.elapsed().as_secs_f64() * 1000.0;
            self.metrics.record_search(t0.elapsed().as_secs_f64());
            return out;
        }

        let weighted: Vec<(String, f32)> = if live.semantic.enabled() {
            live.semantic.expand(&base_terms, &self.config.expansion)
        } else {
            base_terms.into_iter().map(|t| (t, 1.0)).collect()
        };

        let k1 = self.config.bm25.k1;
        let b = self.config.bm25.b;

        let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(capacity + 1);
        let mut found = 0u64;

        for (seg_idx, seg) in live.segments.iter().enumerate() {
            let stats = seg.stats();
            if stats.n == 0 || stats.avgdl <= 0.0 {
                continue;
            }
            let mut scores: HashMap<u32, f32> = HashMap::new();

            for (term, weight) in &weighted {
                let entry = match seg.lookup(term) {
                    Some(e) if e.df > 0 => *e,
                    _ => continue,
                };

                let idf = bm25_idf(stats.n, entry.df);
                let postings = match seg.read_postings(&entry) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(term = %term, error = %e, "posting read failed");
                        continue;
                    }
                };

                for (doc_id, tf) in postings {
                    let dl = match seg.doc(doc_id) {
                        Some(d) => d.doc_len as f32,
                        None => continue,
                    };
                    let tf = tf as f32;
                    let denom = tf + k1 * (1.0 - b + b * (dl / stats.avgdl));
                    let s = idf * (tf * (k1 + 1.0)) / denom;
                    *scores.entry(doc_id).or_insert(0.0) += weight * s;
                }
            }

            found += scores.len() as u64;

            for (doc_id, score) in scores {
                let candidate = Ranked {
                    score,
                    seg: seg_idx as u32,
                    doc: doc_id,
                };
                if heap.len() < capacity {
                    heap.push(Reverse(candidate));
                } else if let Some(Reverse(worst)) = heap.peek() {
                    if candidate > *worst {
                        heap.pop();
                        heap.push(Reverse(candidate));
                    }
                }
            }
        }

        out.found = found;

        let mut ranked: Vec<Ranked> = heap.into_iter().map(|r| r.0).collect();
        ranked.sort_by(|a, b| b.cmp(a));

        for r in ranked {
            let seg = &live.segments[r.seg as usize];
            let doc = match seg.doc(r.doc) {
                Some(d) => d,
                None => continue,
            };

            let mut hit = SearchHit {
                score: r.score,
                segment: live.seg_names[r.seg as usize].clone(),
                doc_id: r.doc,
                cord_uid: doc.cord_uid.clone(),
                title: doc.title.clone(),
                json_relpath: doc.json_relpath.clone(),
                url: None,
                publish_time: None,
                author: None,
            };

            if let Some(meta) = live.uid_meta.get(&doc.cord_uid) {
                // The url column may hold several URLs joined by ';'.
                let url = match meta.url.find(';') {
                    Some(pos) => &meta.url[..pos],
                    None => meta.url.as_str(),
                };
                if !url.is_empty() {
                    hit.url = Some(url.to_string());
                }
                if !meta.publish_time.is_empty() {
                    hit.publish_time = Some(meta.publish_time.clone());
                }
                if !meta.author.is_empty() {
                    hit.author = Some(meta.author.clone());
                }
            }

            out.results.push(hit);
        }

        out.search_time_ms = t0.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record_search(t0.elapsed().as_secs_f64());
        out
    }

    /// Prefix autocomplete over the merged vocabulary.
    pub fn suggest(&self, input: &str, k: usize) -> SuggestOutput {
        self.metrics.suggests_total.inc();
        let live = self.live.load();
        let limit = k.clamp(1, 10);
        SuggestOutput {
            query: input.to_string(),
            limit,
            suggestions: live.suggest.suggest(input, limit),
        }
    }

    /// Generate (or serve from cache) an AI summary for a document.
    /// Failures come back as structured error objects and are never
    /// cached.
    pub fn summarize(&self, cord_uid: &str, sink: &dyn SummarySink) -> Value {
        let key = SummaryCache::key_for(cord_uid);

        if let Some(mut cached) = self.summary_cache.lock().get(&key) {
            // A cache hit is still a served summary.
            self.metrics.summary_calls_total.inc();
            self.metrics.summary_cache_hits_total.inc();
            cached["cached"] = json!(true);
            return cached;
        }

        let live = self.live.load();
        let meta = match live.uid_meta.get(cord_uid) {
            Some(m) => m,
            None => {
                return json!({
                    "success": false,
                    "cord_uid": cord_uid,
                    "error": "cord_uid not found in metadata",
                })
            }
        };

        let record = match metadata::fetch(&self.config.metadata_path(), meta) {
            Ok(r) => r,
            Err(e) => {
                warn!(cord_uid, error = %e, "metadata fetch failed");
                return json!({
                    "success": false,
                    "cord_uid": cord_uid,
                    "error": "failed to read metadata row",
                });
            }
        };

        if record.abstract_text.is_empty() {
            return json!({
                "success": false,
                "cord_uid": cord_uid,
                "error": "no abstract available for this document",
            });
        }

        let request = SummaryRequest {
            cord_uid: cord_uid.to_string(),
            title: record.title,
            abstract_text: record.abstract_text,
        };

        match sink.summarize(&request) {
            SummaryOutcome::Generated(mut value) => {
                self.metrics.summary_calls_total.inc();
                value["cached"] = json!(false);
                self.summary_cache.lock().put(key, value.clone());
                value
            }
            SummaryOutcome::Failed(value) => value,
        }
    }
}

fn bm25_idf(n: u32, df: u32) -> f32 {
    (((n as f32 - df as f32 + 0.5) / (df as f32 + 0.5)) + 1.0).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bm25_idf_monotonic_in_rarity() {
        let common = bm25_idf(1000, 900);
        let rare = bm25_idf(1000, 5);
        assert!(rare > common);
        assert!(common > 0.0);
    }

    #[test]
    fn test_ranked_ordering() {
        let a = Ranked { score: 2.0, seg: 0, doc: 0 };
        let b = Ranked { score: 1.0, seg: 0, doc: 1 };
        assert!(a > b);

        // Equal scores: smaller (seg, doc) ranks higher.
        let c = Ranked { score: 1.0, seg: 0, doc: 0 };
        let d = Ranked { score: 1.0, seg: 1, doc: 0 };
        assert!(c > d);
        let e = Ranked { score: 1.0, seg: 1, doc: 2 };
        assert!(d > e);
    }

    #[test]
    fn test_search_on_empty_engine() {
        let engine = Engine::new(EngineConfig::new("/nonexistent"));
        let out = engine.search("alpha virus", 10);
        assert_eq!(out.segments, 0);
        assert_eq!(out.found, 0);
        assert!(out.results.is_empty());

        let sug = engine.suggest("alp", 5);
        assert!(sug.suggestions.is_empty());
        assert_eq!(sug.limit, 5);
    }

    #[test]
    fn test_reload_missing_index_returns_false() {
        let engine = Engine::new(EngineConfig::new("/nonexistent"));
        assert!(!engine.reload());
        assert_eq!(engine.segment_count(), 0);
    }
}
