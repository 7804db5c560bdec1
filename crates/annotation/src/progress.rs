use crate::event::AnnotationEvent;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Judgment value meaning "not yet surveyed".
pub const JUDGMENT_NOT_YET: &str = "NotYet";

/// Survey completion over a designated target set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub finished: usize,
    pub total: usize,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.finished, self.total)
    }
}

/// Count finished targets: for each target position, the latest judgment
/// recorded on a target-flagged event wins, and anything other than
/// [`JUDGMENT_NOT_YET`] counts as finished. Judgments on positions outside
/// the target set are ignored.
pub fn survey_progress(events: &[AnnotationEvent], targets: &BTreeSet<u64>) -> Progress {
    let mut ordered: Vec<&AnnotationEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.timestamp_ms);

    let mut judgments: BTreeMap<u64, &str> = BTreeMap::new();
    for ev in ordered {
        let (Some(pos), Some(judgment)) = (ev.position, ev.judgment.as_deref()) else {
            continue;
        };
        if ev.target != Some(true) || !targets.contains(&pos) {
            continue;
        }
        judgments.insert(pos, judgment);
    }

    let finished = judgments.values().filter(|j| **j != JUDGMENT_NOT_YET).count();
    Progress {
        finished,
        total: targets.len(),
    }
}
