//! # Outline Annotation
//!
//! Replay engine for the survey annotation log: an append-only stream of
//! per-node events, keyed by the nested-set positions the display trees are
//! indexed with.
//!
//! ## Architecture
//!
//! ```text
//! annotation log (JSON lines)
//!     │
//!     ├──> parse_log ──> AnnotationEvent
//!     │
//!     ├──> replay (per Partition: user × project × version)
//!     │      ├─ timestamp-ordered fold into NodeState
//!     │      ├─ subtree range ops over [leftmost_position, position)
//!     │      └─ expand/collapse markers with their clearing rules
//!     │
//!     └──> survey_progress (finished/total over a target set)
//! ```

mod error;
mod event;
mod progress;
mod replay;
mod state;

pub use error::{AnnotationError, Result};
pub use event::{AnnotationEvent, Partition};
pub use progress::{survey_progress, Progress, JUDGMENT_NOT_YET};
pub use replay::{replay, replay_partitioned};
pub use state::{remap_states, NodeState, StateMap};

/// Decode a newline-delimited JSON annotation log. Blank lines are skipped;
/// a malformed line aborts with its line number.
pub fn parse_log(input: &str) -> Result<Vec<AnnotationEvent>> {
    let mut events = Vec::new();
    for (i, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let ev = serde_json::from_str(line).map_err(|source| AnnotationError::EventDecode {
            line: i + 1,
            source,
        })?;
        events.push(ev);
    }
    Ok(events)
}
