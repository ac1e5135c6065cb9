//! On-disk segment format: binary readers, the segment handle, and the
//! writer used by offline tools and tests.

pub mod io;
pub mod segment;
pub mod types;
pub mod writer;

pub use io::{load_docs, load_lexicon, load_manifest};
pub use segment::{PostingSource, Segment};
pub use types::{DocEntry, LexEntry, SegmentStats};
pub use writer::{write_manifest, SegmentWriter};
