//! Directory scan
//!
//! Turns the file names found in a log directory into the ordered list of
//! segment base offsets to load. Kept free of I/O so recovery ordering can be
//! tested from plain name lists.

use std::collections::BTreeSet;
use std::path::Path;

/// Extension of segment store files
pub const STORE_EXTENSION: &str = "store";

/// Extension of segment index files
pub const INDEX_EXTENSION: &str = "indx";

/// "42.store" → Some(42); anything that is not a segment file → None
pub fn parse_base_offset(name: &str) -> Option<u64> {
    let path = Path::new(name);
    let ext = path.extension()?.to_str()?;
    if ext != STORE_EXTENSION && ext != INDEX_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Distinct base offsets named by `names`, ascending
///
/// The store and index files of a segment collapse to a single entry.
pub fn base_offsets<I, S>(names: I) -> Vec<u64>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|name| parse_base_offset(name.as_ref()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// "<base>.store"
pub fn store_file_name(base_offset: u64) -> String {
    format!("{}.{}", base_offset, STORE_EXTENSION)
}

/// "<base>.indx"
pub fn index_file_name(base_offset: u64) -> String {
    format!("{}.{}", base_offset, INDEX_EXTENSION)
}
