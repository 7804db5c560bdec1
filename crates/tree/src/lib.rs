//! # Outline Tree
//!
//! Reduction of the fact graph into per-file display trees, plus the
//! nested-position index that annotation state is keyed by.
//!
//! ## Architecture
//!
//! ```text
//! NodeRegistry (outline-facts)
//!     │
//!     ├──> Reducer
//!     │      ├─ relevance scan + ancestor propagation
//!     │      ├─ root selection (main programs, loop-bearing)
//!     │      ├─ max-chain call disambiguation (chain.rs)
//!     │      └─ head/tail elision, wrapper splicing
//!     │
//!     ├──> Indexer
//!     │      ├─ post-order positions + leftmost_position
//!     │      ├─ sequential serialization ids
//!     │      └─ anchor table for cross-snapshot position remapping
//!     │
//!     └──> Range cache
//!            └─ per-file position ranges, persisted with a snapshot key
//! ```

mod chain;
mod error;
pub mod indexer;
mod node;
mod range_cache;
mod reducer;

pub use error::{Result, TreeError};
pub use indexer::{
    anchor_table, assign_ids, assign_positions, remap_positions, verify_positions, PositionAnchor,
};
pub use node::{FileOutline, OutlineNode};
pub use range_cache::{
    cache_key, file_id, load as load_range_cache, save as save_range_cache, FileRange, RangeTable,
    RANGE_TABLE_SCHEMA_VERSION,
};
pub use reducer::{Reducer, ReducerConfig};
