//! # Outline Facts
//!
//! Typed view over a program-structure fact graph: containment and call
//! relations among source constructs (loops, branches, calls, subprograms,
//! compiler directives) as extracted by an external fact service.
//!
//! ## Architecture
//!
//! ```text
//! fact rows (already fetched, typed)
//!     │
//!     ├──> Row loaders (ConstructRow / CallRow / OtherCallRow / DirectiveRow)
//!     │      └─ intern nodes, wire Contains/Calls edges
//!     │
//!     └──> Node Registry (petgraph arena)
//!            ├─ Nodes: FactNode (identity, categories, line range)
//!            ├─ Edges: Contains (structural), Calls (call site -> callee)
//!            └─ Derived: container unit, closures, loop nesting depth
//! ```
//!
//! The registry is owned by one reduction run; it performs no I/O and can be
//! built per file or shared read-only across parallel reductions.

mod category;
mod error;
mod loader;
mod node;
mod registry;
mod row;

pub use category::{
    CategorySet, NodeType, CALL_CATS, DEFAULT_OMITTED, LOOP_CONSTRUCT, MAIN_PROGRAM, MPI_CALL,
    OTHER_CALL, RELEVANT_CATS, SUBPROG_CATS,
};
pub use error::{FactsError, Result};
pub use node::{FactNode, NodeKey};
pub use registry::{EdgeKind, NodeRegistry};
pub use row::{CallRow, ConstructRow, DirectiveRow, NodeRef, OtherCallRow};

pub use petgraph::graph::NodeIndex;

use serde::de::DeserializeOwned;

/// Decode newline-delimited JSON rows as produced by the fact-view dump.
/// Blank lines are skipped; a malformed line aborts with its line number.
pub fn parse_row_lines<T: DeserializeOwned>(input: &str) -> Result<Vec<T>> {
    let mut rows = Vec::new();
    for (i, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = serde_json::from_str(line).map_err(|source| FactsError::RowDecode {
            line: i + 1,
            source,
        })?;
        rows.push(row);
    }
    Ok(rows)
}
