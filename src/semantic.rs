//! Static word-embedding index for semantic query expansion.
//!
//! Loads classic Word2Vec/GloVe/FastText text exports (`word v1 .. vD`
//! per line, optional `<vocab> <dim>` header) restricted to the terms
//! present in the live lexicons, normalizes every row to unit length,
//! and expands queries by cosine-nearest neighbors. Not transformer
//! based.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::warn;

use crate::config::ExpansionParams;
use crate::error::Result;

/// Row-major store of L2-normalized embedding vectors.
pub struct SemanticIndex {
    dim: usize,
    /// row -> term, aligned with `vecs`
    terms: Vec<String>,
    /// row * dim + j
    vecs: Vec<f32>,
    term_to_row: HashMap<String, u32>,
}

impl SemanticIndex {
    /// Index with no vectors; `expand` degenerates to identity weights.
    pub fn disabled() -> Self {
        Self {
            dim: 0,
            terms: Vec::new(),
            vecs: Vec::new(),
            term_to_row: HashMap::new(),
        }
    }

    /// At least one vector loaded.
    pub fn enabled(&self) -> bool {
        !self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Load vectors from a text embedding file, keeping only words in
    /// `needed_terms`. The dimension is inferred from the first
    /// accepted line; rows with a different width are dropped and
    /// counted in a warning.
    pub fn load_from_text(path: &Path, needed_terms: &HashSet<String>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut index = Self::disabled();
        let mut dropped = 0usize;
        let mut first_line = true;

        for line in reader.lines() {
            let line = line?;
            let mut fields = line.split_whitespace();
            let word = match fields.next() {
                Some(w) => w,
                None => continue,
            };
            let rest: Vec<&str> = fields.collect();

            // Optional "<vocab> <dim>" header.
            if first_line {
                first_line = false;
                if rest.len() == 1
                    && word.parse::<u64>().is_ok()
                    && rest[0].parse::<u64>().is_ok()
                {
                    continue;
                }
            }

            if !needed_terms.contains(word) {
                continue;
            }

            let mut vec = Vec::with_capacity(rest.len());
            let mut bad = false;
            for f in &rest {
                match f.parse::<f32>() {
                    Ok(v) => vec.push(v),
                    Err(_) => {
                        bad = true;
                        break;
                    }
                }
            }
            if bad || vec.is_empty() {
                dropped += 1;
                continue;
            }

            if index.dim == 0 {
                index.dim = vec.len();
            } else if vec.len() != index.dim {
                dropped += 1;
                continue;
            }

            if !l2_normalize(&mut vec) {
                dropped += 1;
                continue;
            }

            let row = index.terms.len() as u32;
            index.term_to_row.insert(word.to_string(), row);
            index.terms.push(word.to_string());
            index.vecs.extend_from_slice(&vec);
        }

        if dropped > 0 {
            warn!(dropped, path = %path.display(), "dropped malformed embedding rows");
        }

        Ok(index)
    }

    fn row_vec(&self, row: u32) -> &[f32] {
        let start = row as usize * self.dim;
        &self.vecs[start..start + self.dim]
    }

    fn vec_for(&self, term: &str) -> Option<&[f32]> {
        self.term_to_row.get(term).map(|&r| self.row_vec(r))
    }

    /// Top-k rows by cosine similarity to a unit query vector,
    /// excluding `banned` rows and anything below `min_sim`.
    fn most_similar(
        &self,
        qvec: &[f32],
        topk: usize,
        min_sim: f32,
        banned: &HashSet<u32>,
    ) -> Vec<(u32, f32)> {
        let mut hits: Vec<(u32, f32)> = Vec::new();
        for row in 0..self.terms.len() as u32 {
            if banned.contains(&row) {
                continue;
            }
            let sim = dot(qvec, self.row_vec(row));
            if sim >= min_sim {
                hits.push((row, sim));
            }
        }
        hits.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| self.terms[a.0 as usize].cmp(&self.terms[b.0 as usize]))
        });
        hits.truncate(topk);
        hits
    }

    /// Expand query terms with embedding neighbors.
    ///
    /// Originals always carry weight 1.0; each neighbor carries
    /// `alpha * sim`, duplicates keep the maximum, and the output is
    /// capped at `max_total_terms` with originals retained first.
    pub fn expand(&self, query_terms: &[String], params: &ExpansionParams) -> Vec<(String, f32)> {
        let mut out: Vec<(String, f32)> =
            query_terms.iter().map(|t| (t.clone(), 1.0f32)).collect();
        if !self.enabled() {
            out.truncate(params.max_total_terms);
            return out;
        }

        let banned: HashSet<u32> = query_terms
            .iter()
            .filter_map(|t| self.term_to_row.get(t).copied())
            .collect();

        let mut neighbor_weight: HashMap<String, f32> = HashMap::new();
        let mut merge = |index: &Self, rows: Vec<(u32, f32)>| {
            for (row, sim) in rows {
                let w = params.alpha * sim;
                let term = &index.terms[row as usize];
                neighbor_weight
                    .entry(term.clone())
                    .and_modify(|cur| *cur = cur.max(w))
                    .or_insert(w);
            }
        };

        // Per-term neighbors.
        let mut seen: HashSet<&str> = HashSet::new();
        let mut centroid = vec![0.0f32; self.dim];
        let mut centroid_parts = 0usize;
        for term in query_terms {
            if !seen.insert(term.as_str()) {
                continue;
            }
            if let Some(v) = self.vec_for(term) {
                for (c, x) in centroid.iter_mut().zip(v) {
                    *c += x;
                }
                centroid_parts += 1;
                merge(
                    self,
                    self.most_similar(v, params.per_term, params.min_sim, &banned),
                );
            }
        }

        // Centroid neighbors.
        if centroid_parts > 0 && l2_normalize(&mut centroid) {
            merge(
                self,
                self.most_similar(&centroid, params.global_topk, params.min_sim, &banned),
            );
        }

        let mut neighbors: Vec<(String, f32)> = neighbor_weight.into_iter().collect();
        neighbors.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        for nb in neighbors {
            if out.len() >= params.max_total_terms {
                break;
            }
            out.push(nb);
        }
        out.truncate(params.max_total_terms);
        out
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Normalize to unit length in place. Returns false for zero vectors.
fn l2_normalize(v: &mut [f32]) -> bool {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_vec_file(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("embeddings.vec");
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    fn needed(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_load_skips_header_and_unknown_words() {
        let tmp = TempDir::new().unwrap();
        let path = write_vec_file(&tmp, "4 2\ncat 1.0 0.0\ndog 0.0 1.0\nxyz 1.0 1.0\n");

        let idx =
            SemanticIndex::load_from_text(&path, &needed(&["cat", "dog"])).unwrap();
        assert!(idx.enabled());
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.dim(), 2);
    }

    #[test]
    fn test_load_drops_mismatched_widths() {
        let tmp = TempDir::new().unwrap();
        let path = write_vec_file(&tmp, "cat 1.0 0.0\ndog 0.0 1.0 0.5\n");

        let idx =
            SemanticIndex::load_from_text(&path, &needed(&["cat", "dog"])).unwrap();
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.dim(), 2);
    }

    #[test]
    fn test_vectors_are_normalized() {
        let tmp = TempDir::new().unwrap();
        let path = write_vec_file(&tmp, "cat 3.0 4.0\n");

        let idx = SemanticIndex::load_from_text(&path, &needed(&["cat"])).unwrap();
        let v = idx.vec_for("cat").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_expand_originals_weight_one() {
        let tmp = TempDir::new().unwrap();
        let path = write_vec_file(
            &tmp,
            "cat 1.0 0.0\nkitten 0.95 0.05\ndog 0.0 1.0\n",
        );
        let idx = SemanticIndex::load_from_text(
            &path,
            &needed(&["cat", "kitten", "dog"]),
        )
        .unwrap();

        let params = ExpansionParams::default();
        let terms = vec!["cat".to_string()];
        let expanded = idx.expand(&terms, &params);

        assert_eq!(expanded[0], ("cat".to_string(), 1.0));
        // kitten is a close neighbor; dog is orthogonal and below min_sim
        assert!(expanded.iter().any(|(t, _)| t == "kitten"));
        assert!(!expanded.iter().any(|(t, _)| t == "dog"));
        for (t, w) in &expanded[1..] {
            assert_ne!(t, "cat");
            assert!(*w > 0.0 && *w <= params.alpha, "weight {w} out of range");
        }
    }

    #[test]
    fn test_expand_disabled_is_identity() {
        let idx = SemanticIndex::disabled();
        let params = ExpansionParams::default();
        let terms = vec!["kitten".to_string(), "virus".to_string()];
        let expanded = idx.expand(&terms, &params);
        assert_eq!(
            expanded,
            vec![("kitten".to_string(), 1.0), ("virus".to_string(), 1.0)]
        );
    }

    #[test]
    fn test_expand_respects_max_total_terms() {
        let tmp = TempDir::new().unwrap();
        let mut content = String::from("query 1.0 0.0\n");
        for i in 0..30 {
            // All close to "query": same direction with tiny noise.
            content.push_str(&format!("neighbor{i} 1.0 0.0{i}\n"));
        }
        let all: Vec<String> = content
            .lines()
            .map(|l| l.split_whitespace().next().unwrap().to_string())
            .collect();
        let path = write_vec_file(&tmp, &content);
        let idx = SemanticIndex::load_from_text(
            &path,
            &all.iter().cloned().collect::<HashSet<_>>(),
        )
        .unwrap();

        let mut params = ExpansionParams::default();
        params.per_term = 10;
        params.global_topk = 10;
        params.max_total_terms = 5;
        let expanded = idx.expand(&[String::from("query")], &params);
        assert!(expanded.len() <= 5);
        assert_eq!(expanded[0].0, "query");
    }
}
