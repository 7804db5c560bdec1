use crate::category::NodeType;
use crate::node::{FactNode, NodeKey};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// Relation kind between fact nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Structural parent/child (construct nesting, unit ownership).
    Contains,
    /// Call site to candidate callee container unit.
    Calls,
}

/// Arena of interned fact nodes plus their containment/call relations.
///
/// One registry is owned by one reduction run; nodes are addressed by
/// `NodeIndex` rather than by live aliasing, so reductions for different
/// snapshots can run in parallel without shared mutable state.
pub struct NodeRegistry {
    graph: DiGraph<FactNode, EdgeKind>,
    key_index: HashMap<NodeKey, NodeIndex>,

    container_memo: HashMap<NodeIndex, Option<NodeIndex>>,
    parents_in_container: HashMap<NodeIndex, Vec<NodeIndex>>,
    loop_depth_memo: HashMap<NodeIndex, usize>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        NodeRegistry {
            graph: DiGraph::new(),
            key_index: HashMap::new(),
            container_memo: HashMap::new(),
            parents_in_container: HashMap::new(),
            loop_depth_memo: HashMap::new(),
        }
    }

    /// Return the canonical node for `node`'s identity, registering `node`
    /// if the identity is new. All relation building routes through this so
    /// that graph edges converge on single nodes.
    ///
    /// The first registration wins; later rows for the same identity only
    /// fill in fields the canonical node is still missing (the fact view
    /// reports the same construct from several queries with varying detail).
    pub fn intern(&mut self, node: FactNode) -> NodeIndex {
        if let Some(&idx) = self.key_index.get(&node.key) {
            let canon = &mut self.graph[idx];
            if canon.cats.is_empty() && !node.cats.is_empty() {
                canon.cat = node.cat;
                canon.cats = node.cats;
            }
            if canon.sub.is_none() {
                canon.sub = node.sub;
            }
            if canon.unit.is_none() {
                canon.unit = node.unit;
            }
            if canon.callee_name.is_none() {
                canon.callee_name = node.callee_name;
            }
            if canon.start_line == 0 && canon.end_line == 0 {
                canon.start_line = node.start_line;
                canon.end_line = node.end_line;
            }
            return idx;
        }
        let key = node.key.clone();
        let idx = self.graph.add_node(node);
        self.key_index.insert(key, idx);
        idx
    }

    /// Record a relation in both directions. Self-loops are suppressed and
    /// duplicate edges collapse onto the existing one.
    pub fn add_edge(&mut self, parent: NodeIndex, child: NodeIndex, kind: EdgeKind) {
        if parent == child {
            return;
        }
        if self
            .graph
            .edges_connecting(parent, child)
            .any(|e| *e.weight() == kind)
        {
            return;
        }
        self.graph.add_edge(parent, child, kind);
    }

    pub fn node(&self, idx: NodeIndex) -> &FactNode {
        &self.graph[idx]
    }

    pub(crate) fn node_mut(&mut self, idx: NodeIndex) -> &mut FactNode {
        &mut self.graph[idx]
    }

    pub fn find(&self, key: &NodeKey) -> Option<NodeIndex> {
        self.key_index.get(key).copied()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// All parents, regardless of relation kind.
    pub fn parents(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut v: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| e.source())
            .collect();
        v.sort_by_key(|&p| (self.graph[p].start_line, self.graph[p].key.clone()));
        v.dedup();
        v
    }

    /// All children, regardless of relation kind, ordered by start line.
    pub fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut v: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.target())
            .collect();
        v.sort_by_key(|&c| (self.graph[c].start_line, self.graph[c].key.clone()));
        v.dedup();
        v
    }

    /// Call sites that may invoke `idx` (incoming call edges), ordered by
    /// (location, start line) for deterministic chain selection.
    pub fn callers(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut v: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| *e.weight() == EdgeKind::Calls)
            .map(|e| e.source())
            .collect();
        v.sort_by_key(|&p| {
            let n = &self.graph[p];
            (n.key.loc.clone(), n.start_line, n.key.uri.clone())
        });
        v.dedup();
        v
    }

    pub fn is_root(&self, idx: NodeIndex) -> bool {
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .next()
            .is_none()
    }

    pub fn roots(&self) -> Vec<NodeIndex> {
        let mut v: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&idx| self.is_root(idx))
            .collect();
        v.sort_by_key(|&idx| self.graph[idx].key.clone());
        v
    }

    /// Nearest enclosing subprogram or main program: the node itself if it is
    /// one, else the container of its unique structural parent.
    ///
    /// Multi-parent nodes are a fact-graph irregularity; they are reported
    /// and resolved against an arbitrary parent. Containment cycles resolve
    /// to no container.
    pub fn container(&mut self, idx: NodeIndex) -> Option<NodeIndex> {
        self.container_guarded(idx, &mut HashSet::new())
    }

    fn container_guarded(
        &mut self,
        idx: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
    ) -> Option<NodeIndex> {
        if let Some(&memo) = self.container_memo.get(&idx) {
            return memo;
        }
        if !visited.insert(idx) {
            log::warn!("containment cycle at {}", self.graph[idx]);
            return None;
        }

        let node = &self.graph[idx];
        let result = if node.cats.is_container_unit() {
            self.parents_in_container.insert(idx, Vec::new());
            Some(idx)
        } else {
            let parents = self.parents(idx);
            match parents.len() {
                1 => {
                    let p = parents[0];
                    let container = self.container_guarded(p, visited);
                    let mut chain = vec![p];
                    if let Some(above) = self.parents_in_container.get(&p) {
                        chain.extend(above.iter().copied());
                    }
                    self.parents_in_container.insert(idx, chain);
                    container
                }
                0 => None,
                _ => {
                    // preprocessor sections legitimately straddle units
                    if self.graph[idx].cats.node_type() != Some(NodeType::Pp) {
                        let list: Vec<String> = parents
                            .iter()
                            .map(|&p| self.graph[p].to_string())
                            .collect();
                        log::warn!(
                            "{} has multiple structural parents: [{}]",
                            self.graph[idx],
                            list.join(", ")
                        );
                    }
                    let p = parents[0];
                    self.container_guarded(p, visited)
                }
            }
        };
        self.container_memo.insert(idx, result);
        result
    }

    /// Strict ancestors of `idx` within its container unit (exclusive of
    /// `idx` itself), innermost first.
    pub fn parents_in_container(&mut self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.container(idx);
        self.parents_in_container
            .get(&idx)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of loop-construct ancestors `idx` has within its own container:
    /// the loop nesting depth at the point of call.
    pub fn loop_depth_in_container(&mut self, idx: NodeIndex) -> usize {
        if let Some(&d) = self.loop_depth_memo.get(&idx) {
            return d;
        }
        let depth = self
            .parents_in_container(idx)
            .iter()
            .filter(|&&p| self.graph[p].cats.is_loop())
            .count();
        self.loop_depth_memo.insert(idx, depth);
        depth
    }

    /// Transitive parent closure, including `idx`. Cycle-safe.
    pub fn ancestors(&self, idx: NodeIndex) -> HashSet<NodeIndex> {
        self.closure(idx, Direction::Incoming)
    }

    /// Transitive child closure, including `idx`. Cycle-safe.
    pub fn descendants(&self, idx: NodeIndex) -> HashSet<NodeIndex> {
        self.closure(idx, Direction::Outgoing)
    }

    fn closure(&self, idx: NodeIndex, dir: Direction) -> HashSet<NodeIndex> {
        let mut seen = HashSet::from([idx]);
        let mut stack = vec![idx];
        while let Some(n) = stack.pop() {
            for next in self.graph.neighbors_directed(n, dir) {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        seen
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::MAIN_PROGRAM;
    use pretty_assertions::assert_eq;

    fn node(reg: &mut NodeRegistry, uri: &str, cat: &str, lines: (u32, u32)) -> NodeIndex {
        reg.intern(FactNode::new(NodeKey::new("v1", "a.f90", uri), cat).with_lines(lines.0, lines.1))
    }

    #[test]
    fn intern_deduplicates_by_key() {
        let mut reg = NodeRegistry::new();
        let a = node(&mut reg, "x", "do-construct", (1, 5));
        let b = node(&mut reg, "x", "do-construct", (1, 5));
        assert_eq!(a, b);
        assert_eq!(reg.node_count(), 1);
    }

    #[test]
    fn intern_fills_in_missing_fields() {
        let mut reg = NodeRegistry::new();
        let bare = FactNode::new(NodeKey::new("v1", "a.f90", "c"), "call-stmt");
        let idx = reg.intern(bare);
        assert!(reg.node(idx).callee_name.is_none());

        let richer = FactNode::new(NodeKey::new("v1", "a.f90", "c"), "call-stmt")
            .with_lines(4, 4)
            .with_callee("work");
        let idx2 = reg.intern(richer);
        assert_eq!(idx, idx2);
        assert_eq!(reg.node(idx).callee_name.as_deref(), Some("work"));
        assert_eq!(reg.node(idx).start_line, 4);
    }

    #[test]
    fn self_loops_and_duplicate_edges_are_suppressed() {
        let mut reg = NodeRegistry::new();
        let a = node(&mut reg, "a", MAIN_PROGRAM, (1, 10));
        let b = node(&mut reg, "b", "do-construct", (2, 8));
        reg.add_edge(a, a, EdgeKind::Contains);
        reg.add_edge(a, b, EdgeKind::Contains);
        reg.add_edge(a, b, EdgeKind::Contains);
        assert_eq!(reg.children(a), vec![b]);
        assert!(reg.children(b).is_empty());
        assert_eq!(reg.parents(b), vec![a]);
    }

    #[test]
    fn container_resolves_through_nesting() {
        let mut reg = NodeRegistry::new();
        let main = node(&mut reg, "m", MAIN_PROGRAM, (1, 30));
        let outer = node(&mut reg, "o", "do-construct", (5, 20));
        let inner = node(&mut reg, "i", "do-construct", (7, 15));
        let call = node(&mut reg, "c", "call-stmt", (9, 9));
        reg.add_edge(main, outer, EdgeKind::Contains);
        reg.add_edge(outer, inner, EdgeKind::Contains);
        reg.add_edge(inner, call, EdgeKind::Contains);

        assert_eq!(reg.container(call), Some(main));
        assert_eq!(reg.container(main), Some(main));
        assert_eq!(reg.loop_depth_in_container(call), 2);
        assert_eq!(reg.loop_depth_in_container(outer), 0);
    }

    #[test]
    fn containment_cycle_yields_no_container() {
        let mut reg = NodeRegistry::new();
        let a = node(&mut reg, "a", "if-construct", (1, 5));
        let b = node(&mut reg, "b", "if-construct", (2, 4));
        reg.add_edge(a, b, EdgeKind::Contains);
        reg.add_edge(b, a, EdgeKind::Contains);
        assert_eq!(reg.container(a), None);
        assert_eq!(reg.container(b), None);
    }

    #[test]
    fn closures_terminate_on_cycles() {
        let mut reg = NodeRegistry::new();
        let a = node(&mut reg, "a", "if-construct", (1, 5));
        let b = node(&mut reg, "b", "if-construct", (2, 4));
        let c = node(&mut reg, "c", "call-stmt", (3, 3));
        reg.add_edge(a, b, EdgeKind::Contains);
        reg.add_edge(b, a, EdgeKind::Contains);
        reg.add_edge(b, c, EdgeKind::Contains);

        let desc = reg.descendants(a);
        assert_eq!(desc.len(), 3);
        let anc = reg.ancestors(c);
        assert!(anc.contains(&a) && anc.contains(&b));
    }

    #[test]
    fn callers_only_follow_call_edges() {
        let mut reg = NodeRegistry::new();
        let call = node(&mut reg, "c", "call-stmt", (3, 3));
        let sub = node(&mut reg, "s", "subroutine-external-subprogram", (10, 20));
        let constr = node(&mut reg, "l", "do-construct", (2, 6));
        reg.add_edge(constr, call, EdgeKind::Contains);
        reg.add_edge(call, sub, EdgeKind::Calls);

        assert_eq!(reg.callers(sub), vec![call]);
        assert!(reg.callers(call).is_empty());
    }
}
