//! Deterministic log replay.
//!
//! The annotation log is append-only; the current state of a partition is
//! obtained by folding its events in timestamp order. Range operations
//! exploit the nested-position index: a node's subtree is exactly the
//! positions in `[leftmost_position, position)`, with the node itself at
//! the upper end.

use crate::event::{AnnotationEvent, Partition};
use crate::state::{BoolFlag, NodeState, StateMap};
use std::collections::{BTreeMap, HashMap};

/// Subtree gate for an expand operation.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Gate {
    All,
    Relevant,
    Target,
}

/// Fold one partition's events into per-node states. Events lacking a
/// position are skipped; ordering ties resolve by log order, so replaying
/// the same log always yields the same map.
pub fn replay(events: &[AnnotationEvent]) -> StateMap {
    let mut ordered: Vec<&AnnotationEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.timestamp_ms);

    // first event for a position fixes its subtree range
    let mut leftmost_tbl: HashMap<u64, u64> = HashMap::new();
    let mut states = StateMap::new();

    for ev in ordered {
        let (Some(pos), Some(leftmost)) = (ev.position, ev.leftmost_position) else {
            continue;
        };
        let leftmost = *leftmost_tbl.entry(pos).or_insert(leftmost);
        // a record can carry a leftmost past its own position (stale or
        // corrupt log); such a range resolves no nodes, so subtree
        // operations are skipped while direct flag writes still apply
        let subtree = if leftmost <= pos {
            Some((leftmost, pos))
        } else {
            log::warn!("position {pos} carries leftmost {leftmost} beyond it, range skipped");
            None
        };

        {
            let stat = states.entry(pos).or_default();
            if let Some(comment) = &ev.comment {
                stat.comment = Some(comment.clone());
            }
            if let Some(judgment) = &ev.judgment {
                if !judgment.is_empty() {
                    stat.judgment = Some(judgment.clone());
                }
            }
            if let Some(scheme) = &ev.estimation_scheme {
                if !scheme.is_empty() {
                    stat.estimation_scheme = Some(scheme.clone());
                }
            }
        }

        // unchecking clears the whole subtree, not just the node
        apply_flag(&mut states, pos, ev.checked, BoolFlag::Checked, subtree);
        apply_flag(&mut states, pos, ev.opened, BoolFlag::Opened, None);
        apply_flag(&mut states, pos, ev.relevant, BoolFlag::Relevant, None);
        apply_flag(&mut states, pos, ev.target, BoolFlag::Target, None);
        apply_flag(
            &mut states,
            pos,
            ev.expand_target_loops,
            BoolFlag::ExpandTargetLoops,
            None,
        );
        apply_flag(
            &mut states,
            pos,
            ev.expand_relevant_loops,
            BoolFlag::ExpandRelevantLoops,
            None,
        );
        apply_flag(&mut states, pos, ev.expand_all, BoolFlag::ExpandAll, None);
        apply_flag(&mut states, pos, ev.collapse_all, BoolFlag::CollapseAll, None);

        let stat = states.get(&pos).cloned().unwrap_or_default();
        if let Some(range) = subtree {
            if stat.expand_all {
                clear_opened(&mut states, range, Gate::All, false);
            }
            if stat.expand_relevant_loops {
                clear_opened(&mut states, range, Gate::Relevant, false);
            }
            if stat.expand_target_loops {
                clear_opened(&mut states, range, Gate::Target, false);
            }
            if stat.collapse_all {
                // collapse folds the node itself too
                clear_opened(&mut states, range, Gate::All, true);
            }
        }
        if stat.collapse_all {
            // never persists, even when its range resolved nothing
            if let Some(s) = states.get_mut(&pos) {
                s.collapse_all = false;
            }
        }
    }

    states.retain(|_, s| !s.is_empty());
    states
}

/// Split a mixed log by (user, project, version) and replay each partition.
pub fn replay_partitioned(events: &[AnnotationEvent]) -> BTreeMap<Partition, StateMap> {
    let mut grouped: BTreeMap<Partition, Vec<AnnotationEvent>> = BTreeMap::new();
    for ev in events {
        grouped.entry(ev.partition()).or_default().push(ev.clone());
    }
    grouped
        .into_iter()
        .map(|(partition, events)| (partition, replay(&events)))
        .collect()
}

fn apply_flag(
    states: &mut StateMap,
    pos: u64,
    value: Option<bool>,
    flag: BoolFlag,
    subtree: Option<(u64, u64)>,
) {
    match value {
        None => {}
        Some(true) => states.entry(pos).or_default().set_flag(flag, true),
        Some(false) => {
            if let Some((lo, hi)) = subtree {
                for (_, s) in states.range_mut(lo..hi) {
                    s.set_flag(flag, false);
                }
            }
            if let Some(s) = states.get_mut(&pos) {
                s.set_flag(flag, false);
            }
        }
    }
}

/// Drop `opened` across a subtree range, gated by the given node flag, and
/// retire the expand markers the operation supersedes. `include_root`
/// extends the range to the subtree root itself (collapse semantics).
fn clear_opened(states: &mut StateMap, (lo, hi): (u64, u64), gate: Gate, include_root: bool) {
    let clear = |s: &mut NodeState| {
        let gated = match gate {
            Gate::All => true,
            Gate::Relevant => s.relevant,
            Gate::Target => s.target,
        };
        if gated {
            s.opened = false;
        }
        match gate {
            Gate::Relevant => s.expand_relevant_loops = false,
            Gate::Target => s.expand_target_loops = false,
            Gate::All => {
                s.expand_relevant_loops = false;
                s.expand_target_loops = false;
                s.expand_all = false;
            }
        }
    };
    if include_root {
        for (_, s) in states.range_mut(lo..=hi) {
            clear(s);
        }
    } else {
        for (_, s) in states.range_mut(lo..hi) {
            clear(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ev(pos: u64, leftmost: u64, time: i64) -> AnnotationEvent {
        AnnotationEvent::at("alice", "proj", "v1", pos, leftmost, time)
    }

    #[test]
    fn later_events_win_and_empty_states_drop() {
        let events = vec![
            AnnotationEvent {
                judgment: Some("NotYet".into()),
                ..ev(4, 1, 10)
            },
            AnnotationEvent {
                judgment: Some("Feasible".into()),
                ..ev(4, 1, 20)
            },
            AnnotationEvent {
                opened: Some(true),
                ..ev(2, 1, 15)
            },
            AnnotationEvent {
                opened: Some(false),
                ..ev(2, 1, 30)
            },
        ];
        let states = replay(&events);
        assert_eq!(states.len(), 1);
        assert_eq!(states[&4].judgment.as_deref(), Some("Feasible"));
    }

    #[test]
    fn timestamp_order_beats_log_order() {
        let events = vec![
            AnnotationEvent {
                comment: Some("second".into()),
                ..ev(4, 1, 20)
            },
            AnnotationEvent {
                comment: Some("first".into()),
                ..ev(4, 1, 10)
            },
        ];
        assert_eq!(replay(&events)[&4].comment.as_deref(), Some("second"));
    }

    #[test]
    fn empty_comment_is_recorded_but_empty_judgment_is_not() {
        let events = vec![AnnotationEvent {
            comment: Some(String::new()),
            judgment: Some(String::new()),
            ..ev(4, 1, 10)
        }];
        let states = replay(&events);
        assert_eq!(states[&4].comment.as_deref(), Some(""));
        assert_eq!(states[&4].judgment, None);
    }

    #[test]
    fn unchecking_clears_the_subtree() {
        // node 4 spans [1, 4); its descendants 1..3 were checked separately
        let events = vec![
            AnnotationEvent {
                checked: Some(true),
                ..ev(1, 1, 10)
            },
            AnnotationEvent {
                checked: Some(true),
                ..ev(3, 2, 11)
            },
            AnnotationEvent {
                checked: Some(true),
                ..ev(4, 1, 12)
            },
            AnnotationEvent {
                checked: Some(true),
                ..ev(9, 8, 13)
            },
            AnnotationEvent {
                checked: Some(false),
                ..ev(4, 1, 20)
            },
        ];
        let states = replay(&events);
        // everything inside [1, 4] is cleared, the unrelated node survives
        assert_eq!(states.len(), 1);
        assert!(states[&9].checked);
    }

    #[test]
    fn expand_all_reopens_the_subtree_and_stays_sticky() {
        let events = vec![
            AnnotationEvent {
                opened: Some(true),
                ..ev(2, 1, 10)
            },
            AnnotationEvent {
                opened: Some(true),
                expand_relevant_loops: Some(true),
                ..ev(3, 3, 11)
            },
            AnnotationEvent {
                expand_all: Some(true),
                ..ev(5, 1, 20)
            },
        ];
        let states = replay(&events);
        // descendants lose opened and any expand markers, which empties them
        assert_eq!(states.len(), 1);
        // the trigger itself keeps the marker
        assert!(states[&5].expand_all);
    }

    #[test]
    fn expand_relevant_loops_only_reopens_relevant_nodes() {
        let events = vec![
            AnnotationEvent {
                opened: Some(true),
                relevant: Some(true),
                ..ev(2, 1, 10)
            },
            AnnotationEvent {
                opened: Some(true),
                ..ev(3, 3, 11)
            },
            AnnotationEvent {
                expand_relevant_loops: Some(true),
                ..ev(5, 1, 20)
            },
        ];
        let states = replay(&events);
        assert!(!states[&2].opened);
        assert!(states[&2].relevant);
        assert!(states[&3].opened);
        assert!(states[&5].expand_relevant_loops);
    }

    #[test]
    fn expand_target_loops_only_reopens_target_nodes() {
        let events = vec![
            AnnotationEvent {
                opened: Some(true),
                target: Some(true),
                ..ev(2, 1, 10)
            },
            AnnotationEvent {
                opened: Some(true),
                ..ev(3, 3, 11)
            },
            AnnotationEvent {
                expand_target_loops: Some(true),
                ..ev(5, 1, 20)
            },
        ];
        let states = replay(&events);
        assert!(!states[&2].opened);
        assert!(states[&2].target);
        assert!(states[&3].opened);
        assert!(states[&5].expand_target_loops);
    }

    #[test]
    fn leftmost_beyond_position_skips_range_but_not_the_node() {
        // a corrupt record claims a subtree start past the node itself;
        // the unresolvable range clears nothing, the direct write lands
        let events = vec![
            AnnotationEvent {
                checked: Some(true),
                ..ev(1, 1, 10)
            },
            AnnotationEvent {
                checked: Some(true),
                ..ev(3, 7, 11)
            },
            AnnotationEvent {
                checked: Some(false),
                ..ev(3, 7, 20)
            },
        ];
        let states = replay(&events);
        assert!(states[&1].checked);
        assert!(states.get(&3).is_none());
    }

    #[test]
    fn collapse_with_unresolvable_range_still_retires_itself() {
        let events = vec![
            AnnotationEvent {
                opened: Some(true),
                ..ev(3, 7, 10)
            },
            AnnotationEvent {
                collapse_all: Some(true),
                ..ev(3, 7, 20)
            },
        ];
        let states = replay(&events);
        // nothing in range to fold, so the node keeps its opened flag and
        // only the collapse marker disappears
        assert!(states[&3].opened);
        assert!(!states[&3].collapse_all);
    }

    #[test]
    fn collapse_all_includes_the_root_and_does_not_persist() {
        let events = vec![
            AnnotationEvent {
                opened: Some(true),
                ..ev(2, 1, 10)
            },
            AnnotationEvent {
                opened: Some(true),
                ..ev(5, 1, 11)
            },
            AnnotationEvent {
                collapse_all: Some(true),
                ..ev(5, 1, 20)
            },
        ];
        let states = replay(&events);
        // both the descendant and the root close, and the collapse marker
        // leaves no residue, so nothing remains at all
        assert!(states.is_empty());
    }

    #[test]
    fn first_seen_leftmost_wins_for_a_position() {
        // a later event reports a different (stale) leftmost; the range
        // recorded first keeps governing subtree operations
        let events = vec![
            AnnotationEvent {
                opened: Some(true),
                ..ev(2, 1, 10)
            },
            AnnotationEvent {
                opened: Some(true),
                ..ev(5, 1, 11)
            },
            AnnotationEvent {
                collapse_all: Some(true),
                ..ev(5, 4, 20)
            },
        ];
        let states = replay(&events);
        // range stays [1, 5], so position 2 is still collapsed
        assert!(states.is_empty());
    }

    #[test]
    fn partitions_never_mix() {
        let mut bob = ev(4, 1, 10);
        bob.user = "bob".into();
        bob.checked = Some(true);
        let alice = AnnotationEvent {
            opened: Some(true),
            ..ev(4, 1, 10)
        };
        let by_partition = replay_partitioned(&[bob.clone(), alice.clone()]);
        assert_eq!(by_partition.len(), 2);
        assert!(by_partition[&alice.partition()][&4].opened);
        assert!(by_partition[&bob.partition()][&4].checked);
        assert!(!by_partition[&bob.partition()][&4].opened);
    }
}
