//! Nested-position numbering over reduced trees.
//!
//! Positions are assigned post-order from a running counter, so every
//! subtree occupies the contiguous range `[leftmost_position, position]`
//! with the subtree root's own position as the upper end. Annotation state
//! is keyed by these positions, which makes subtree operations (range
//! clears, expand/collapse) simple interval scans.

use crate::node::OutlineNode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Assign `position`/`leftmost_position` to every node of the subtree.
/// The counter carries across calls so several files of one snapshot share
/// a single position space with disjoint per-file ranges.
pub fn assign_positions(root: &mut OutlineNode, next: &mut u64) {
    for c in &mut root.children {
        assign_positions(c, next);
    }
    let pos = *next;
    *next += 1;
    root.position = Some(pos);
    root.leftmost_position = Some(
        root.children
            .first()
            .and_then(|c| c.leftmost_position)
            .unwrap_or(pos),
    );
}

/// Assign sequential serialization ids. Independent of the position index;
/// renumbering one never disturbs the other.
pub fn assign_ids(root: &mut OutlineNode, next: &mut u64) {
    for c in &mut root.children {
        assign_ids(c, next);
    }
    root.id = Some(*next);
    *next += 1;
}

/// Verify the nested-set shape of an assigned subtree: children strictly
/// precede their parent, sibling ranges are disjoint and ascending, and
/// every range is contained in its parent's.
pub fn verify_positions(root: &OutlineNode) -> Result<(), String> {
    fn rec(n: &OutlineNode) -> Result<(u64, u64), String> {
        let pos = n
            .position
            .ok_or_else(|| format!("{} has no position", n.cat))?;
        let leftmost = n
            .leftmost_position
            .ok_or_else(|| format!("{} has no leftmost position", n.cat))?;
        let mut prev_end = None;
        for c in &n.children {
            let (lo, hi) = rec(c)?;
            if hi >= pos {
                return Err(format!("child range end {hi} reaches parent position {pos}"));
            }
            if lo < leftmost {
                return Err(format!(
                    "child range start {lo} escapes parent leftmost {leftmost}"
                ));
            }
            if let Some(end) = prev_end {
                if lo <= end {
                    return Err(format!("sibling ranges overlap at {lo}"));
                }
            }
            prev_end = Some(hi);
        }
        match n.children.first() {
            Some(first) if first.leftmost_position != Some(leftmost) => Err(format!(
                "leftmost {leftmost} does not match first child's range"
            )),
            None if leftmost != pos => {
                Err(format!("leaf leftmost {leftmost} differs from position {pos}"))
            }
            _ => Ok((leftmost, pos)),
        }
    }
    rec(root).map(|_| ())
}

/// Structural identity of a node for cross-snapshot position matching.
/// Positions drift whenever the tree shape changes; anchors let annotation
/// state recorded against an older snapshot be re-keyed instead of lost.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionAnchor {
    pub loc: String,
    pub start_line: u32,
    pub cat: String,
}

/// Position -> anchor table for an assigned subtree.
pub fn anchor_table(root: &OutlineNode) -> HashMap<u64, PositionAnchor> {
    let mut table = HashMap::new();
    root.walk(&mut table, &mut |n, table| {
        if let Some(pos) = n.position {
            table.insert(
                pos,
                PositionAnchor {
                    loc: n.loc.clone(),
                    start_line: n.start_line,
                    cat: n.cat.clone(),
                },
            );
        }
    });
    table
}

/// Old position -> new position map for nodes whose anchor survives in the
/// new snapshot. Anchors absent from the new table drop out; a duplicated
/// anchor resolves to its lowest new position.
pub fn remap_positions(
    old: &HashMap<u64, PositionAnchor>,
    new: &HashMap<u64, PositionAnchor>,
) -> HashMap<u64, u64> {
    let mut by_anchor: HashMap<&PositionAnchor, u64> = HashMap::new();
    for (&pos, anchor) in new {
        by_anchor
            .entry(anchor)
            .and_modify(|p| *p = (*p).min(pos))
            .or_insert(pos);
    }
    let mut map = HashMap::new();
    for (&old_pos, anchor) in old {
        if let Some(&new_pos) = by_anchor.get(anchor) {
            map.insert(old_pos, new_pos);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn leaf(cat: &str, line: u32) -> OutlineNode {
        OutlineNode {
            cat: cat.to_string(),
            loc: "a.f90".to_string(),
            enclosing_unit: None,
            start_line: line,
            end_line: line,
            children: Vec::new(),
            callee_name: None,
            node_type: None,
            ignored_callees: None,
            id: None,
            position: None,
            leftmost_position: None,
        }
    }

    fn branch(cat: &str, line: u32, children: Vec<OutlineNode>) -> OutlineNode {
        OutlineNode {
            children,
            ..leaf(cat, line)
        }
    }

    #[test]
    fn positions_are_post_order_and_nested() {
        let mut root = branch(
            "file",
            0,
            vec![branch(
                "main-program",
                1,
                vec![
                    branch("do-construct", 2, vec![leaf("call-stmt", 3)]),
                    leaf("mpi-call", 8),
                ],
            )],
        );
        let mut next = 1;
        assign_positions(&mut root, &mut next);
        assert_eq!(next, 6);

        let main = &root.children[0];
        let lp = &main.children[0];
        assert_eq!(lp.children[0].position, Some(1));
        assert_eq!(lp.position, Some(2));
        assert_eq!(lp.leftmost_position, Some(1));
        assert_eq!(main.children[1].position, Some(3));
        assert_eq!(main.position, Some(4));
        assert_eq!(main.leftmost_position, Some(1));
        assert_eq!(root.position, Some(5));
        verify_positions(&root).unwrap();
    }

    #[test]
    fn counter_carries_across_files() {
        let mut a = branch("file", 0, vec![leaf("main-program", 1)]);
        let mut b = branch("file", 0, vec![leaf("main-program", 1)]);
        let mut next = 1;
        assign_positions(&mut a, &mut next);
        assign_positions(&mut b, &mut next);
        assert_eq!(a.position, Some(2));
        assert_eq!(b.leftmost_position, Some(3));
        assert_eq!(b.position, Some(4));
    }

    #[test]
    fn ids_are_independent_of_positions() {
        let mut root = branch("file", 0, vec![leaf("main-program", 1)]);
        let mut next_pos = 10;
        let mut next_id = 1;
        assign_positions(&mut root, &mut next_pos);
        assign_ids(&mut root, &mut next_id);
        assert_eq!(root.children[0].id, Some(1));
        assert_eq!(root.id, Some(2));
        assert_eq!(root.children[0].position, Some(10));
    }

    #[test]
    fn verify_rejects_broken_nesting() {
        let mut root = branch("file", 0, vec![leaf("main-program", 1)]);
        let mut next = 1;
        assign_positions(&mut root, &mut next);
        root.children[0].position = Some(99);
        assert!(verify_positions(&root).is_err());
    }

    #[test]
    fn remap_follows_surviving_anchors() {
        let mut old = branch(
            "file",
            0,
            vec![branch("main-program", 1, vec![leaf("do-construct", 5)])],
        );
        let mut next = 1;
        assign_positions(&mut old, &mut next);

        // new snapshot grew an extra loop before the old one
        let mut new = branch(
            "file",
            0,
            vec![branch(
                "main-program",
                1,
                vec![leaf("do-construct", 3), leaf("do-construct", 5)],
            )],
        );
        let mut next = 1;
        assign_positions(&mut new, &mut next);

        let map = remap_positions(&anchor_table(&old), &anchor_table(&new));
        // the loop at line 5 moved from position 1 to position 2
        assert_eq!(map.get(&1), Some(&2));
        // the main program and file keep matching anchors
        assert_eq!(map.get(&2), Some(&3));
        assert_eq!(map.get(&3), Some(&4));
    }
}
