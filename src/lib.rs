//! # commitlog
//!
//! A segmented, append-only commit log with:
//! - Offsets assigned on append, reads addressed by offset
//! - Length-prefixed store files and memory-mapped offset indexes
//! - Size-based segment rotation and segment-level truncation
//! - Recovery of offsets from the files on disk
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │            Service / Replication layers (external)          │
//! │           CommitLog (append, read) · Retention              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                         Log                                 │
//! │         RwLock<Vec<Segment>> (last = active)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼────────────┐
//!          ▼            ▼            ▼
//!   ┌─────────────┐ ┌────────┐ ┌─────────────┐
//!   │  Segment 0  │ │  ...   │ │ Segment N   │
//!   └──────┬──────┘ └────────┘ └─────────────┘
//!          │
//!     ┌────┴─────┐
//!     ▼          ▼
//! ┌────────┐ ┌────────────┐
//! │ Store  │ │   Index    │
//! │ (file) │ │  (mmap)    │
//! └────────┘ └────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod storage;
pub mod commit_log;
pub mod follower;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LogError, Result};
pub use config::{Config, SegmentConfig};
pub use record::Record;
pub use storage::{Log, LogReader};
pub use commit_log::{CommitLog, Retention};
pub use follower::Follower;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of commitlog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
