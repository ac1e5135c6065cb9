//! Segment and manifest writer.
//!
//! Produces the binary layout consumed by `io`/`segment`: used by
//! offline ingestion tools and by the test suite to build real indexes.
//! Documents are added in DocId order; postings therefore come out
//! sorted by construction. Invariants (tf > 0, doc_len > 0, df ==
//! posting count, sorted unique DocIds) are checked before anything is
//! written.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{CordexError, Result};
use crate::index::types::{DocEntry, SegmentStats};
use crate::text;

/// Builder for one on-disk segment.
pub struct SegmentWriter {
    docs: Vec<DocEntry>,
    /// term -> (dense term id, postings sorted by DocId)
    postings: HashMap<String, (u32, Vec<(u32, u32)>)>,
    next_term_id: u32,
    num_barrels: Option<u32>,
}

impl SegmentWriter {
    /// Writer producing a monolithic `inv.bin`.
    pub fn new() -> Self {
        Self {
            docs: Vec::new(),
            postings: HashMap::new(),
            next_term_id: 0,
            num_barrels: None,
        }
    }

    /// Writer sharding postings into `n` barrel files by `term_id % n`.
    pub fn with_barrels(n: u32) -> Self {
        Self {
            num_barrels: Some(n.max(1)),
            ..Self::new()
        }
    }

    /// Tokenize `text`, filter stop-words, and append a document.
    /// Returns the assigned DocId.
    pub fn add_document(
        &mut self,
        cord_uid: &str,
        title: &str,
        json_relpath: &str,
        text: &str,
    ) -> u32 {
        let doc_id = self.docs.len() as u32;
        let tokens = text::index_terms(text);

        let mut tf: HashMap<&str, u32> = HashMap::new();
        for t in &tokens {
            *tf.entry(t.as_str()).or_insert(0) += 1;
        }
        for (term, freq) in tf {
            let next_id = &mut self.next_term_id;
            let (_, list) = self
                .postings
                .entry(term.to_string())
                .or_insert_with(|| {
                    let id = *next_id;
                    *next_id += 1;
                    (id, Vec::new())
                });
            list.push((doc_id, freq));
        }

        self.docs.push(DocEntry {
            cord_uid: cord_uid.to_string(),
            title: title.to_string(),
            json_relpath: json_relpath.to_string(),
            doc_len: tokens.len() as u32,
        });
        doc_id
    }

    /// Validate invariants and write the segment files into `dir`.
    pub fn write(&self, dir: &Path) -> Result<()> {
        self.validate()?;
        std::fs::create_dir_all(dir)?;

        // Stable term order so offsets are deterministic.
        let mut terms: Vec<&String> = self.postings.keys().collect();
        terms.sort_unstable();

        let barrel_count = self.num_barrels.unwrap_or(1);
        let mut barrels: Vec<Vec<u8>> = vec![Vec::new(); barrel_count as usize];
        let mut lexicon = Vec::new();
        put_u32(&mut lexicon, terms.len() as u32);

        for term in &terms {
            let (term_id, list) = &self.postings[*term];
            let barrel_id = if self.num_barrels.is_some() {
                term_id % barrel_count
            } else {
                0
            };
            let buf = &mut barrels[barrel_id as usize];
            let offset = buf.len() as u64;
            for &(doc_id, tf) in list {
                put_u32(buf, doc_id);
                put_u32(buf, tf);
            }

            put_str(&mut lexicon, term.as_str());
            put_u32(&mut lexicon, list.len() as u32); // df
            put_u32(&mut lexicon, barrel_id);
            lexicon.extend_from_slice(&offset.to_le_bytes());
            put_u32(&mut lexicon, list.len() as u32); // count
        }

        write_bytes(&dir.join("lexicon.bin"), &lexicon)?;

        if self.num_barrels.is_some() {
            for (i, buf) in barrels.iter().enumerate() {
                write_bytes(&dir.join(format!("barrel_{i}.bin")), buf)?;
            }
        } else {
            write_bytes(&dir.join("inv.bin"), &barrels[0])?;
        }

        let mut docs_buf = Vec::new();
        put_u32(&mut docs_buf, self.docs.len() as u32);
        for d in &self.docs {
            put_str(&mut docs_buf, &d.cord_uid);
            put_str(&mut docs_buf, &d.title);
            put_str(&mut docs_buf, &d.json_relpath);
            put_u32(&mut docs_buf, d.doc_len);
        }
        let stats = SegmentStats::from_docs(&self.docs);
        docs_buf.extend_from_slice(&stats.avgdl.to_le_bytes());
        write_bytes(&dir.join("docs.bin"), &docs_buf)?;

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (i, d) in self.docs.iter().enumerate() {
            if d.doc_len == 0 {
                return Err(CordexError::InvalidSegment(format!(
                    "document {} ({}) has no indexable tokens",
                    i, d.cord_uid
                )));
            }
        }
        for (term, (_, list)) in &self.postings {
            if list.iter().any(|&(_, tf)| tf == 0) {
                return Err(CordexError::InvalidSegment(format!(
                    "term {term:?} has a zero-tf posting"
                )));
            }
            if !list.windows(2).all(|w| w[0].0 < w[1].0) {
                return Err(CordexError::InvalidSegment(format!(
                    "term {term:?} postings are not strictly ascending"
                )));
            }
        }
        Ok(())
    }
}

impl Default for SegmentWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Write `manifest.bin` with the given ordered segment names.
pub fn write_manifest(path: &Path, names: &[String]) -> Result<()> {
    let mut buf = Vec::new();
    put_u32(&mut buf, names.len() as u32);
    for name in names {
        put_str(&mut buf, name);
    }
    write_bytes(path, &buf)
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(bytes)?;
    w.flush()?;
    Ok(())
}
