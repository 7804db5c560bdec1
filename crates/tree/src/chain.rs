use outline_facts::{NodeIndex, NodeRegistry};
use std::collections::HashMap;

/// Raised while walking caller chains when a container unit is revisited.
/// Distinct from "no chain found" so the affected branch can be scored −1
/// without conflating it with legitimate absence of a chain.
pub(crate) struct CycleDetected;

/// Memoized max-chain search.
///
/// For a node `n`, the max chain is the list `[n, call, caller, call, ...]`
/// ending at a main program, built by repeatedly following the incoming call
/// edge that maximizes [`score_of_chain`]. It picks the single calling
/// context under which a repeatedly-invoked subprogram is displayed.
#[derive(Default)]
pub(crate) struct ChainMemo {
    memo: HashMap<NodeIndex, Option<Vec<NodeIndex>>>,
}

impl ChainMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Best chain from `n` to a main program; `None` when `n` has no
    /// container context at all, `Some(vec![])` when no chain reaches a main
    /// program (both score −1).
    pub fn max_chain(&mut self, reg: &mut NodeRegistry, n: NodeIndex) -> Option<Vec<NodeIndex>> {
        match self.chain_from(reg, n, &[]) {
            Ok(chain) => chain,
            // cannot trigger with an empty visited set; scored -1 regardless
            Err(CycleDetected) => Some(Vec::new()),
        }
    }

    fn chain_from(
        &mut self,
        reg: &mut NodeRegistry,
        n: NodeIndex,
        visited: &[NodeIndex],
    ) -> Result<Option<Vec<NodeIndex>>, CycleDetected> {
        if let Some(chain) = self.memo.get(&n) {
            return Ok(chain.clone());
        }

        let Some(container) = reg.container(n) else {
            self.memo.insert(n, None);
            return Ok(None);
        };

        if container != n {
            // the chain of an inner construct is the chain of its container;
            // the walk restarts with a fresh visited set
            let chain = self.chain_from(reg, container, &[])?;
            self.memo.insert(n, chain.clone());
            return Ok(chain);
        }

        if visited.contains(&n) {
            return Err(CycleDetected);
        }

        let cats = reg.node(n).cats.clone();
        if cats.is_main_program() {
            let chain = Some(vec![n]);
            self.memo.insert(n, chain.clone());
            return Ok(chain);
        }
        if !cats.is_subprogram() {
            // some other root kind (e.g. a bare directive): no chain exists
            self.memo.insert(n, None);
            return Ok(None);
        }

        let callers = reg.callers(n);
        let mut next_visited = visited.to_vec();
        next_visited.push(n);

        let own_loc = reg.node(n).key.loc.clone();
        let mut best: Vec<NodeIndex> = Vec::new();
        let mut best_in_file = false;
        let mut best_line = u32::MAX;
        let mut best_loc: Option<String> = None;
        let mut skipped = 0usize;

        for &call in &callers {
            let Some(call_container) = reg.container(call) else {
                continue;
            };
            let upstream = match self.chain_from(reg, call_container, &next_visited) {
                Err(CycleDetected) => {
                    skipped += 1;
                    continue;
                }
                Ok(None) => continue,
                Ok(Some(chain)) => chain,
            };
            if upstream.contains(&n) {
                continue;
            }

            let mut cand = Vec::with_capacity(upstream.len() + 2);
            cand.push(n);
            cand.push(call);
            cand.extend(upstream.iter().copied());

            let cand_loc = reg.node(call).key.loc.clone();
            let cand_in_file = !upstream.is_empty() && cand_loc == own_loc;
            let cand_line = reg.node(call).start_line;

            let cand_score = score_of_chain(reg, &cand);
            let best_score = score_of_chain(reg, &best);

            let wins = cand_score > best_score
                || (cand_score == best_score && cand_in_file && !best_in_file)
                || (cand_score == best_score
                    && best_loc.as_deref() == Some(cand_loc.as_str())
                    && cand_line < best_line);
            if wins {
                best = cand;
                best_in_file = cand_in_file;
                best_line = cand_line;
                best_loc = Some(cand_loc);
            }
        }

        if !callers.is_empty() && skipped == callers.len() {
            // every caller sat on a call cycle; the outcome depends on the
            // current walk, so it is not memoized
            return Ok(Some(Vec::new()));
        }

        let chain = Some(best);
        self.memo.insert(n, chain.clone());
        Ok(chain)
    }
}

/// Chain score: −1 unless the chain terminates at a main program, else the
/// sum over its call sites of their loop nesting depth at the point of call.
pub(crate) fn score_of_chain(reg: &mut NodeRegistry, chain: &[NodeIndex]) -> i64 {
    let Some(&last) = chain.last() else {
        return -1;
    };
    if !reg.node(last).cats.is_main_program() {
        return -1;
    }
    let mut score = 0i64;
    for &idx in chain {
        if reg.node(idx).cats.is_call() {
            score += reg.loop_depth_in_container(idx) as i64;
        }
    }
    score
}
