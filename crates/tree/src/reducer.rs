use crate::chain::ChainMemo;
use crate::indexer;
use crate::node::{FileOutline, OutlineNode};
use crate::range_cache::file_id;
use outline_facts::{NodeIndex, NodeKey, NodeRegistry, NodeType, DEFAULT_OMITTED, RELEVANT_CATS};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Visit-table key: (caller subprogram name, callee, chain depth). A hit
/// means the callee was already expanded at this depth for this caller, so
/// the repeat occurrence is suppressed.
type VisitKey = (Option<String>, NodeIndex, usize);

/// Knobs of one reduction run.
#[derive(Debug, Clone)]
pub struct ReducerConfig {
    /// Categories spliced out of the tree; their children are promoted in
    /// place.
    pub omitted: BTreeSet<String>,
    /// Also treat uncalled subprograms as display roots, not just main
    /// programs.
    pub all_roots: bool,
    /// Drop roots whose subtree contains no loop construct.
    pub require_loop: bool,
    /// Extra relevance: call sites whose callee name matches are kept even
    /// when their categories alone would not qualify.
    pub marker_pattern: Option<Regex>,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        ReducerConfig {
            omitted: DEFAULT_OMITTED.iter().map(|s| s.to_string()).collect(),
            all_roots: false,
            require_loop: true,
            marker_pattern: None,
        }
    }
}

/// Reduces the fact graph to per-file display trees.
///
/// Owns the registry for the duration of the run; chain results and derived
/// registry properties are memoized across all files of the run.
pub struct Reducer {
    registry: NodeRegistry,
    config: ReducerConfig,
    chains: ChainMemo,
    relevant: HashSet<NodeIndex>,
    marked: Option<HashSet<NodeIndex>>,
}

impl Reducer {
    pub fn new(registry: NodeRegistry, config: ReducerConfig) -> Self {
        Reducer {
            registry,
            config,
            chains: ChainMemo::new(),
            relevant: HashSet::new(),
            marked: None,
        }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Restrict call expansion to the given nodes (and their ancestors, so
    /// the paths leading to them survive). Keys that resolve to no node are
    /// reported and skipped.
    pub fn mark_nodes(&mut self, keys: &[NodeKey]) {
        let mut marked = HashSet::new();
        for key in keys {
            match self.registry.find(key) {
                Some(idx) => {
                    marked.extend(self.registry.ancestors(idx));
                }
                None => log::warn!("marked node {key} is not in the fact graph"),
            }
        }
        self.marked = Some(marked);
    }

    /// Run the reduction: relevance scan, root selection, per-file tree
    /// construction, then position/id numbering per version.
    pub fn reduce(&mut self) -> Vec<FileOutline> {
        self.scan_relevance();

        // version -> loc -> roots
        let mut grouped: BTreeMap<String, BTreeMap<String, Vec<NodeIndex>>> = BTreeMap::new();
        for root in self.display_roots() {
            let key = self.registry.node(root).key.clone();
            grouped
                .entry(key.version)
                .or_default()
                .entry(key.loc)
                .or_default()
                .push(root);
        }

        let mut files = Vec::new();
        for (version, by_loc) in grouped {
            let mut next_position = 1u64;
            let mut next_id = 1u64;
            for (loc, mut roots) in by_loc {
                roots.sort_by_key(|&r| {
                    let n = self.registry.node(r);
                    (n.start_line, n.key.clone())
                });

                let mut children = Vec::with_capacity(roots.len());
                for root in roots {
                    let mut ntbl = HashSet::new();
                    children.push(self.reduce_node(root, &[root], &mut ntbl));
                }

                let mut file_node = OutlineNode {
                    cat: "file".to_string(),
                    loc: loc.clone(),
                    enclosing_unit: None,
                    start_line: 0,
                    end_line: 0,
                    children,
                    callee_name: None,
                    node_type: Some(NodeType::File),
                    ignored_callees: None,
                    id: None,
                    position: None,
                    leftmost_position: None,
                };
                indexer::assign_positions(&mut file_node, &mut next_position);
                indexer::assign_ids(&mut file_node, &mut next_id);

                files.push(FileOutline {
                    fid: file_id(&version, &loc),
                    version: version.clone(),
                    root: file_node,
                });
            }
        }
        files
    }

    /// A node is relevant when its categories qualify on their own, when it
    /// is a compiler directive, or when its callee name matches the marker
    /// pattern. Relevance propagates to all ancestors so the enclosing
    /// structure stays visible.
    fn scan_relevance(&mut self) {
        let mut seeds = Vec::new();
        for idx in self.registry.node_indices() {
            let node = self.registry.node(idx);
            let by_cat = node.cats.intersects(RELEVANT_CATS.iter().copied())
                || node.cats.is_compiler_directive();
            let by_marker = match (&self.config.marker_pattern, &node.callee_name) {
                (Some(pat), Some(name)) => pat.is_match(name),
                _ => false,
            };
            if by_cat || by_marker {
                seeds.push(idx);
            }
        }
        let mut relevant = HashSet::new();
        for idx in seeds {
            relevant.extend(self.registry.ancestors(idx));
        }
        // marked nodes are relevant by decree, even without a qualifying
        // category anywhere below them; the set is already ancestor-closed
        if let Some(marked) = &self.marked {
            relevant.extend(marked.iter().copied());
        }
        self.relevant = relevant;
    }

    /// Parentless container units that qualify as display roots.
    fn display_roots(&mut self) -> Vec<NodeIndex> {
        let mut roots = Vec::new();
        for idx in self.registry.roots() {
            let cats = &self.registry.node(idx).cats;
            let qualifies = cats.is_main_program() || (self.config.all_roots && cats.is_subprogram());
            if !qualifies {
                continue;
            }
            if self.config.require_loop {
                let has_loop = self
                    .registry
                    .descendants(idx)
                    .iter()
                    .any(|&d| self.registry.node(d).cats.is_loop());
                if !has_loop {
                    continue;
                }
            }
            roots.push(idx);
        }
        roots
    }

    fn reduce_node(
        &mut self,
        n: NodeIndex,
        ancl: &[NodeIndex],
        ntbl: &mut HashSet<VisitKey>,
    ) -> OutlineNode {
        let node = self.registry.node(n);
        let cats = node.cats.clone();
        let own_loc = node.key.loc.clone();
        let own_sub = node.sub.clone();
        let cat = node.cat.clone();
        let enclosing_unit = node.unit.clone().or_else(|| node.sub.clone());
        let (start_line, end_line) = (node.start_line, node.end_line);
        let callee_name = node.callee_name.clone();
        let node_type = cats.node_type();

        let mut ancl_: Vec<NodeIndex>;
        if cats.is_subprogram() || cats.is_call() {
            ancl_ = Vec::with_capacity(ancl.len() + 1);
            ancl_.push(n);
            ancl_.extend_from_slice(ancl);
        } else {
            ancl_ = ancl.to_vec();
        }

        if cats.is_subprogram() && !ancl.is_empty() {
            // entered through a call chain: record the visit so the same
            // callee is not expanded again at this depth for this caller
            let caller_sub = self.registry.node(ancl[0]).sub.clone();
            ntbl.insert((caller_sub, n, ancl.len()));
        }

        let mut children: Vec<NodeIndex> = self
            .registry
            .children(n)
            .into_iter()
            .filter(|c| !ancl.contains(c) && self.relevant.contains(c))
            .collect();

        if let Some(&first) = children.first() {
            if self.registry.node(n).is_constr_head_of(self.registry.node(first)) {
                children.remove(0);
            }
        }
        if let Some(&last) = children.last() {
            if self.registry.node(n).is_constr_tail_of(self.registry.node(last)) {
                children.pop();
            }
        }

        let mut ignored = 0usize;
        if cats.is_call() {
            let total = children.len();

            // candidate callees in the call's own file shadow external ones
            let in_file: Vec<NodeIndex> = children
                .iter()
                .copied()
                .filter(|&c| self.registry.node(c).key.loc == own_loc)
                .collect();
            if !in_file.is_empty() {
                children = in_file;
            }

            // keep a callee only when this call chain is its max chain and
            // it has not already been shown at this depth
            let mut kept = Vec::with_capacity(children.len());
            for c in children {
                let Some(chain) = self.chains.max_chain(&mut self.registry, c) else {
                    continue;
                };
                let agrees = chain.len() == ancl_.len() + 1
                    && chain.first() == Some(&c)
                    && chain[1..] == ancl_[..];
                if !agrees {
                    continue;
                }
                if ntbl.contains(&(own_sub.clone(), c, ancl_.len())) {
                    continue;
                }
                if let Some(marked) = &self.marked {
                    if !marked.contains(&c) {
                        continue;
                    }
                }
                kept.push(c);
            }
            children = kept;
            ignored = total - children.len();
        }

        let mut out_children = Vec::new();
        for c in children {
            let splice = self
                .registry
                .node(c)
                .cats
                .intersects(self.config.omitted.iter().map(String::as_str));
            let child_out = self.reduce_node(c, &ancl_, ntbl);
            if splice {
                out_children.extend(child_out.children);
            } else {
                out_children.push(child_out);
            }
        }

        OutlineNode {
            cat,
            loc: own_loc,
            enclosing_unit,
            start_line,
            end_line,
            children: out_children,
            callee_name,
            node_type,
            ignored_callees: (ignored > 0).then_some(ignored),
            id: None,
            position: None,
            leftmost_position: None,
        }
    }
}
