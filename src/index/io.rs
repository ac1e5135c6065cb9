//! Little-endian binary readers for the index file formats.
//!
//! File layouts:
//! - manifest.bin: u32 count, then count length-prefixed names
//! - lexicon.bin:  u32 term_count, then records
//!                 { u32 term_len; bytes; u32 df; u32 barrel_id; u64 offset; u32 count }
//! - docs.bin:     u32 n, then records
//!                 { u32 uid_len; bytes; u32 title_len; bytes; u32 path_len; bytes; u32 doc_len },
//!                 then an f32 avgdl trailer
//!
//! Any shortfall against a length prefix is a corruption error that
//! fails the owning segment's load.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::{CordexError, Result};
use crate::index::types::{DocEntry, LexEntry, SegmentStats};

/// Buffered reader that validates every length prefix against the
/// bytes actually remaining in the file.
struct BinReader {
    inner: BufReader<File>,
    path: PathBuf,
    remaining: u64,
}

impl BinReader {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let remaining = file.metadata()?.len();
        Ok(Self {
            inner: BufReader::new(file),
            path: path.to_path_buf(),
            remaining,
        })
    }

    fn corrupt(&self, reason: impl Into<String>) -> CordexError {
        CordexError::corrupt(&self.path, reason)
    }

    fn take(&mut self, n: u64, what: &str) -> Result<()> {
        if self.remaining < n {
            return Err(self.corrupt(format!(
                "truncated {what}: need {n} bytes, {} left",
                self.remaining
            )));
        }
        self.remaining -= n;
        Ok(())
    }

    fn read_u32(&mut self, what: &str) -> Result<u32> {
        self.take(4, what)?;
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64(&mut self, what: &str) -> Result<u64> {
        self.take(8, what)?;
        let mut buf = [0u8; 8];
        self.inner.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn read_f32(&mut self, what: &str) -> Result<f32> {
        self.take(4, what)?;
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(f32::from_le_bytes(buf))
    }

    /// Length-prefixed UTF-8 string.
    fn read_string(&mut self, what: &str) -> Result<String> {
        let len = self.read_u32(what)? as u64;
        self.take(len, what)?;
        let mut buf = vec![0u8; len as usize];
        self.inner.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|_| self.corrupt(format!("{what} is not UTF-8")))
    }
}

/// Read the ordered segment-name list from `manifest.bin`.
pub fn load_manifest(path: &Path) -> Result<Vec<String>> {
    let mut r = BinReader::open(path)?;
    let count = r.read_u32("manifest count")?;
    let mut names = Vec::with_capacity(count as usize);
    for _ in 0..count {
        names.push(r.read_string("segment name")?);
    }
    Ok(names)
}

/// Read `lexicon.bin` into a term map. Entry order on disk is arbitrary.
pub fn load_lexicon(path: &Path) -> Result<HashMap<String, LexEntry>> {
    let mut r = BinReader::open(path)?;
    let term_count = r.read_u32("lexicon term count")?;
    let mut lex = HashMap::with_capacity(term_count as usize);
    for _ in 0..term_count {
        let term = r.read_string("lexicon term")?;
        let df = r.read_u32("df")?;
        let barrel_id = r.read_u32("barrel id")?;
        let offset = r.read_u64("posting offset")?;
        let count = r.read_u32("posting count")?;
        lex.insert(
            term,
            LexEntry {
                df,
                barrel_id,
                offset,
                count,
            },
        );
    }
    Ok(lex)
}

/// Read `docs.bin` into the document table plus segment stats.
///
/// The f32 avgdl trailer is used when present; otherwise avgdl is
/// recomputed from the document lengths.
pub fn load_docs(path: &Path) -> Result<(Vec<DocEntry>, SegmentStats)> {
    let mut r = BinReader::open(path)?;
    let n = r.read_u32("doc count")?;
    let mut docs = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let cord_uid = r.read_string("cord_uid")?;
        let title = r.read_string("title")?;
        let json_relpath = r.read_string("json relpath")?;
        let doc_len = r.read_u32("doc_len")?;
        docs.push(DocEntry {
            cord_uid,
            title,
            json_relpath,
            doc_len,
        });
    }

    let stats = match r.remaining {
        0 => SegmentStats::from_docs(&docs),
        4 => SegmentStats {
            n,
            avgdl: r.read_f32("avgdl trailer")?,
        },
        extra => {
            return Err(r.corrupt(format!("{extra} unexpected trailing bytes after doc table")))
        }
    };

    Ok((docs, stats))
}
