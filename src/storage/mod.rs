//! Storage Module
//!
//! Segmented, append-only record log on local disk.
//!
//! ## Responsibilities
//! - Frame and persist record payloads (store)
//! - Map segment-relative offsets to store positions (index)
//! - Bound store/index pairs by offset range (segment)
//! - Rotate, route, truncate and recover segments (log)
//!
//! ## Directory Layout
//! ```text
//! {dir}/
//!   ├── 0.store      0.indx       (segment with base offset 0)
//!   ├── 16.store     16.indx      (segment with base offset 16)
//!   └── ...
//! ```
//!
//! ## File Formats
//! ```text
//! Store (per record)
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (8, BE)   │ Payload                  │
//! └──────────────────┴──────────────────────────┘
//!
//! Index (per record, preallocated to max_index_bytes while open)
//! ┌──────────────────────┬──────────────────────┐
//! │ Relative Offset (4)  │ Position (8)         │
//! └──────────────────────┴──────────────────────┘
//! ```

mod index;
mod log;
mod mmap;
mod reader;
pub mod scan;
mod segment;
mod store;

pub use index::{Index, IndexEntry, ENTRY_WIDTH, OFFSET_WIDTH, POSITION_WIDTH};
pub use log::Log;
pub use reader::LogReader;
pub use segment::Segment;
pub use store::{Store, LEN_WIDTH};
