//! Metadata sidecar: lazy per-document fields from the source CSV.
//!
//! One streaming pass records each row's byte position plus a small
//! inline subset (url, publish_time, author) per cord_uid. Everything
//! else (title, abstract) is fetched on demand by re-reading the one
//! row. The reader is quote-aware: `"` quotes fields, `""` escapes a
//! literal quote, and newlines are allowed inside quoted fields.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::Result;

/// Byte position of a CSV row plus the retained inline fields.
#[derive(Clone, Debug, Default)]
pub struct UidMeta {
    pub offset: u64,
    pub length: u32,
    pub url: String,
    pub publish_time: String,
    pub author: String,
}

/// Full metadata record fetched on demand.
#[derive(Clone, Debug, Default)]
pub struct MetaRecord {
    pub cord_uid: String,
    pub title: String,
    pub abstract_text: String,
    pub url: String,
    pub publish_time: String,
    pub author: String,
}

/// Column positions discovered in the CSV header.
#[derive(Clone, Copy, Debug, Default)]
struct Columns {
    cord_uid: Option<usize>,
    title: Option<usize>,
    abstract_text: Option<usize>,
    authors: Option<usize>,
    url: Option<usize>,
    publish_time: Option<usize>,
}

impl Columns {
    fn detect(header: &[String]) -> Self {
        let mut cols = Self::default();
        for (i, name) in header.iter().enumerate() {
            match name.trim().to_ascii_lowercase().as_str() {
                "cord_uid" => cols.cord_uid = Some(i),
                "title" => cols.title = Some(i),
                "abstract" => cols.abstract_text = Some(i),
                "authors" => cols.authors = Some(i),
                "url" => cols.url = Some(i),
                "publish_time" => cols.publish_time = Some(i),
                _ => {}
            }
        }
        cols
    }

    fn field(fields: &[String], idx: Option<usize>) -> String {
        idx.and_then(|i| fields.get(i)).cloned().unwrap_or_default()
    }
}

/// Parse one raw CSV row into fields. Handles quoting, `""` escapes,
/// and embedded newlines; trailing CR/LF are stripped first.
fn parse_row(raw: &str) -> Vec<String> {
    let row = raw.trim_end_matches(['\n', '\r']);
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = row.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Reader yielding `(offset, length, raw_row)` for each logical row,
/// joining physical lines while a quote is open.
struct RowReader<R: BufRead> {
    inner: R,
    offset: u64,
}

impl<R: BufRead> RowReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    fn next_row(&mut self) -> std::io::Result<Option<(u64, u32, String)>> {
        let start = self.offset;
        let mut raw = String::new();
        let mut quotes = 0usize;

        loop {
            let before = raw.len();
            let n = self.inner.read_line(&mut raw)?;
            if n == 0 {
                if raw.is_empty() {
                    return Ok(None);
                }
                break;
            }
            self.offset += n as u64;
            quotes += raw[before..].matches('"').count();
            if quotes % 2 == 0 {
                break;
            }
        }

        let length = (self.offset - start) as u32;
        Ok(Some((start, length, raw)))
    }
}

/// Stream the metadata CSV once, building the cord_uid -> position map.
pub fn load_uid_meta(path: &Path) -> Result<HashMap<String, UidMeta>> {
    let mut rows = RowReader::new(BufReader::new(File::open(path)?));

    let header = match rows.next_row()? {
        Some((_, _, raw)) => parse_row(&raw),
        None => return Ok(HashMap::new()),
    };
    let cols = Columns::detect(&header);
    let uid_col = match cols.cord_uid {
        Some(c) => c,
        None => return Ok(HashMap::new()),
    };

    let mut map = HashMap::new();
    while let Some((offset, length, raw)) = rows.next_row()? {
        if raw.trim().is_empty() {
            continue;
        }
        let fields = parse_row(&raw);
        let uid = match fields.get(uid_col) {
            Some(u) if !u.is_empty() => u.clone(),
            _ => continue,
        };
        map.insert(
            uid,
            UidMeta {
                offset,
                length,
                url: Columns::field(&fields, cols.url),
                publish_time: Columns::field(&fields, cols.publish_time),
                author: Columns::field(&fields, cols.authors),
            },
        );
    }
    Ok(map)
}

/// Re-read one recorded row and return the full record.
pub fn fetch(path: &Path, meta: &UidMeta) -> Result<MetaRecord> {
    let mut file = File::open(path)?;

    // Header columns are needed to interpret the row.
    let cols = {
        let mut header_reader = RowReader::new(BufReader::new(&mut file));
        match header_reader.next_row()? {
            Some((_, _, raw)) => Columns::detect(&parse_row(&raw)),
            None => return Ok(MetaRecord::default()),
        }
    };

    file.seek(SeekFrom::Start(meta.offset))?;
    let mut raw = vec![0u8; meta.length as usize];
    file.read_exact(&mut raw)?;
    let raw = String::from_utf8_lossy(&raw);
    let fields = parse_row(&raw);

    Ok(MetaRecord {
        cord_uid: Columns::field(&fields, cols.cord_uid),
        title: Columns::field(&fields, cols.title),
        abstract_text: Columns::field(&fields, cols.abstract_text),
        url: Columns::field(&fields, cols.url),
        publish_time: Columns::field(&fields, cols.publish_time),
        author: Columns::field(&fields, cols.authors),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const CSV: &str = concat!(
        "cord_uid,title,abstract,publish_time,authors,url\n",
        "uid1,\"Alpha, the first\",\"Abstract one\",2020-01-01,\"Doe, J.\",https://a.example;https://b.example\n",
        "uid2,Plain title,\"Multi\nline abstract\",2020-02-02,Smith,https://c.example\n",
        "uid3,\"He said \"\"hi\"\"\",short,2020-03-03,,\n",
    );

    fn write_csv(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("metadata.csv");
        let mut f = File::create(&path).unwrap();
        f.write_all(CSV.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_parse_row_quotes_and_escapes() {
        let fields = parse_row("a,\"b,c\",\"say \"\"hi\"\"\",d\n");
        assert_eq!(fields, vec!["a", "b,c", "say \"hi\"", "d"]);
    }

    #[test]
    fn test_load_records_inline_subset() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(&tmp);

        let map = load_uid_meta(&path).unwrap();
        assert_eq!(map.len(), 3);

        let m1 = &map["uid1"];
        assert_eq!(m1.publish_time, "2020-01-01");
        assert_eq!(m1.author, "Doe, J.");
        assert_eq!(m1.url, "https://a.example;https://b.example");
    }

    #[test]
    fn test_multiline_quoted_field_spans_one_row() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(&tmp);

        let map = load_uid_meta(&path).unwrap();
        // uid2's abstract contains a newline; uid3 must still be seen.
        assert!(map.contains_key("uid2"));
        assert!(map.contains_key("uid3"));
    }

    #[test]
    fn test_fetch_full_record() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(&tmp);

        let map = load_uid_meta(&path).unwrap();
        let rec = fetch(&path, &map["uid2"]).unwrap();
        assert_eq!(rec.cord_uid, "uid2");
        assert_eq!(rec.title, "Plain title");
        assert_eq!(rec.abstract_text, "Multi\nline abstract");
        assert_eq!(rec.author, "Smith");

        let rec3 = fetch(&path, &map["uid3"]).unwrap();
        assert_eq!(rec3.title, "He said \"hi\"");
        assert!(rec3.author.is_empty());
    }

    #[test]
    fn test_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(load_uid_meta(&tmp.path().join("absent.csv")).is_err());
    }
}
