//! Immutable in-memory handle to one on-disk segment.
//!
//! Posting files stay open for the lifetime of the handle. Reads go
//! through a per-file mutex around the (seek, read) pair so concurrent
//! searches never race on file position.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use parking_lot::Mutex;

use crate::error::{CordexError, Result};
use crate::index::io::{load_docs, load_lexicon};
use crate::index::types::{DocEntry, LexEntry, SegmentStats};

/// Posting storage: one monolithic file or N barrels selected by
/// the lexicon entry's `barrel_id`.
pub enum PostingSource {
    Monolithic(Mutex<File>),
    Barrels(Vec<Mutex<File>>),
}

impl PostingSource {
    fn file(&self, barrel_id: u32) -> Option<&Mutex<File>> {
        match self {
            PostingSource::Monolithic(f) => Some(f),
            PostingSource::Barrels(files) => files.get(barrel_id as usize),
        }
    }

    fn file_count(&self) -> usize {
        match self {
            PostingSource::Monolithic(_) => 1,
            PostingSource::Barrels(files) => files.len(),
        }
    }
}

/// One loaded segment: lexicon, document table, stats, open posting
/// files. Immutable after `load`.
pub struct Segment {
    lex: HashMap<String, LexEntry>,
    docs: Vec<DocEntry>,
    stats: SegmentStats,
    postings: PostingSource,
}

impl Segment {
    /// Load a segment directory, verifying that every lexicon entry's
    /// posting range fits inside its posting file.
    pub fn load(dir: &Path) -> Result<Self> {
        let lex = load_lexicon(&dir.join("lexicon.bin"))?;
        let (docs, stats) = load_docs(&dir.join("docs.bin"))?;

        let (postings, sizes) = open_posting_files(dir)?;

        for (term, entry) in &lex {
            let size = *sizes.get(entry.barrel_id as usize).ok_or_else(|| {
                CordexError::InvalidSegment(format!(
                    "term {:?} references barrel {} but only {} posting files exist",
                    term,
                    entry.barrel_id,
                    postings.file_count()
                ))
            })?;
            let end = entry
                .offset
                .checked_add(entry.count as u64 * POSTING_BYTES)
                .unwrap_or(u64::MAX);
            if end > size {
                return Err(CordexError::InvalidSegment(format!(
                    "term {:?} posting run [{}..{}) exceeds file size {}",
                    term, entry.offset, end, size
                )));
            }
        }

        Ok(Self {
            lex,
            docs,
            stats,
            postings,
        })
    }

    /// Look up a term's lexicon entry.
    pub fn lookup(&self, term: &str) -> Option<&LexEntry> {
        self.lex.get(term)
    }

    /// Read one term's posting run as `(doc_id, tf)` pairs.
    pub fn read_postings(&self, entry: &LexEntry) -> Result<Vec<(u32, u32)>> {
        let file = self.postings.file(entry.barrel_id).ok_or_else(|| {
            CordexError::InvalidSegment(format!("barrel {} not open", entry.barrel_id))
        })?;

        let mut buf = vec![0u8; entry.count as usize * POSTING_BYTES as usize];
        {
            let mut f = file.lock();
            f.seek(SeekFrom::Start(entry.offset))?;
            f.read_exact(&mut buf)?;
        }

        let mut out = Vec::with_capacity(entry.count as usize);
        for chunk in buf.chunks_exact(POSTING_BYTES as usize) {
            let doc_id = u32::from_le_bytes(chunk[0..4].try_into().unwrap());
            let tf = u32::from_le_bytes(chunk[4..8].try_into().unwrap());
            out.push((doc_id, tf));
        }
        Ok(out)
    }

    /// Document table row for a DocId.
    pub fn doc(&self, doc_id: u32) -> Option<&DocEntry> {
        self.docs.get(doc_id as usize)
    }

    /// Segment statistics.
    pub fn stats(&self) -> SegmentStats {
        self.stats
    }

    /// Number of documents.
    pub fn doc_count(&self) -> u32 {
        self.stats.n
    }

    /// Iterate over the lexicon (term, entry) pairs.
    pub fn terms(&self) -> impl Iterator<Item = (&String, &LexEntry)> {
        self.lex.iter()
    }

    /// Number of distinct terms.
    pub fn term_count(&self) -> usize {
        self.lex.len()
    }
}

/// Bytes per on-disk posting: u32 doc_id + u32 tf.
const POSTING_BYTES: u64 = 8;

/// Open inv.bin, or barrel_0.bin .. barrel_{n-1}.bin when barrels are
/// present. Returns the source plus per-file sizes for range checks.
fn open_posting_files(dir: &Path) -> Result<(PostingSource, Vec<u64>)> {
    if dir.join("barrel_0.bin").exists() {
        let mut files = Vec::new();
        let mut sizes = Vec::new();
        loop {
            let path = dir.join(format!("barrel_{}.bin", files.len()));
            if !path.exists() {
                break;
            }
            let file = File::open(&path)?;
            sizes.push(file.metadata()?.len());
            files.push(Mutex::new(file));
        }
        Ok((PostingSource::Barrels(files), sizes))
    } else {
        let path = dir.join("inv.bin");
        let file = File::open(&path).map_err(|e| {
            CordexError::SegmentLoad(format!("{}: {}", path.display(), e))
        })?;
        let size = file.metadata()?.len();
        Ok((PostingSource::Monolithic(Mutex::new(file)), vec![size]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::writer::SegmentWriter;
    use tempfile::TempDir;

    fn build_segment(dir: &Path, barrels: Option<u32>) {
        let mut writer = match barrels {
            Some(n) => SegmentWriter::with_barrels(n),
            None => SegmentWriter::new(),
        };
        writer.add_document("uid_a", "Alpha bravo", "json/a.json", "alpha bravo");
        writer.add_document("uid_b", "Alpha charlie", "json/b.json", "alpha charlie delta");
        writer.write(dir).unwrap();
    }

    #[test]
    fn test_load_and_lookup() {
        let tmp = TempDir::new().unwrap();
        build_segment(tmp.path(), None);

        let seg = Segment::load(tmp.path()).unwrap();
        assert_eq!(seg.doc_count(), 2);

        let entry = seg.lookup("alpha").unwrap();
        assert_eq!(entry.df, 2);
        assert!(seg.lookup("zulu").is_none());
    }

    #[test]
    fn test_postings_sorted_by_doc_id() {
        let tmp = TempDir::new().unwrap();
        build_segment(tmp.path(), None);

        let seg = Segment::load(tmp.path()).unwrap();
        let entry = *seg.lookup("alpha").unwrap();
        let postings = seg.read_postings(&entry).unwrap();

        assert_eq!(postings.len(), entry.df as usize);
        assert!(postings.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(postings.iter().all(|&(_, tf)| tf > 0));
    }

    #[test]
    fn test_barrels_match_monolithic() {
        let mono = TempDir::new().unwrap();
        let barr = TempDir::new().unwrap();
        build_segment(mono.path(), None);
        build_segment(barr.path(), Some(4));

        let seg_m = Segment::load(mono.path()).unwrap();
        let seg_b = Segment::load(barr.path()).unwrap();

        for term in ["alpha", "bravo", "charlie", "delta"] {
            let pm = seg_m.read_postings(seg_m.lookup(term).unwrap()).unwrap();
            let pb = seg_b.read_postings(seg_b.lookup(term).unwrap()).unwrap();
            assert_eq!(pm, pb, "postings differ for {term}");
        }
    }

    #[test]
    fn test_posting_range_overflow_rejected() {
        let tmp = TempDir::new().unwrap();
        build_segment(tmp.path(), None);

        // Truncate the posting file so lexicon ranges point past EOF.
        let inv = tmp.path().join("inv.bin");
        let file = std::fs::OpenOptions::new().write(true).open(&inv).unwrap();
        file.set_len(4).unwrap();

        assert!(Segment::load(tmp.path()).is_err());
    }

    #[test]
    fn test_missing_lexicon_rejected() {
        let tmp = TempDir::new().unwrap();
        build_segment(tmp.path(), None);
        std::fs::remove_file(tmp.path().join("lexicon.bin")).unwrap();

        assert!(Segment::load(tmp.path()).is_err());
    }
}
