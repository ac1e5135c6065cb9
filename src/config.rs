use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// BM25 ranking parameters
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation parameter
    pub k1: f32,
    /// Length normalization parameter
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Parameters for embedding-based query expansion
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ExpansionParams {
    /// Neighbors kept per original query term
    pub per_term: usize,
    /// Neighbors kept for the query centroid
    pub global_topk: usize,
    /// Minimum cosine similarity for a neighbor
    pub min_sim: f32,
    /// Neighbor weight multiplier (weight = alpha * sim)
    pub alpha: f32,
    /// Hard cap on the expanded term list
    pub max_total_terms: usize,
}

impl Default for ExpansionParams {
    fn default() -> Self {
        Self {
            per_term: 3,
            global_topk: 5,
            min_sim: 0.55,
            alpha: 0.6,
            max_total_terms: 40,
        }
    }
}

/// Engine configuration
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Root of the index directory (manifest.bin, segments/, metadata.csv)
    pub index_dir: PathBuf,
    /// Explicit embedding file path; overrides env and conventional names
    pub embeddings_path: Option<PathBuf>,
    /// BM25 parameters
    pub bm25: Bm25Params,
    /// Query expansion parameters
    pub expansion: ExpansionParams,
    /// Candidates retained per autocomplete trie node
    pub suggest_candidates: usize,
    /// Maximum entries in the AI summary cache
    pub summary_cache_capacity: usize,
    /// Time-to-live for cached AI summaries
    pub summary_cache_ttl: Duration,
}

impl EngineConfig {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            embeddings_path: None,
            bm25: Bm25Params::default(),
            expansion: ExpansionParams::default(),
            suggest_candidates: 10,
            summary_cache_capacity: 512,
            summary_cache_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Set an explicit embedding file path
    pub fn with_embeddings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.embeddings_path = Some(path.into());
        self
    }

    /// Path of the segments directory
    pub fn segments_dir(&self) -> PathBuf {
        self.index_dir.join("segments")
    }

    /// Path of the manifest file
    pub fn manifest_path(&self) -> PathBuf {
        self.index_dir.join("manifest.bin")
    }

    /// Path of the metadata sidecar CSV
    pub fn metadata_path(&self) -> PathBuf {
        self.index_dir.join("metadata.csv")
    }
}
