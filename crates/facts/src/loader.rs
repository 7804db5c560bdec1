use crate::category::{MAIN_PROGRAM, MPI_CALL, OTHER_CALL};
use crate::node::{FactNode, NodeKey};
use crate::registry::{EdgeKind, NodeRegistry};
use crate::row::{CallRow, ConstructRow, DirectiveRow, NodeRef, OtherCallRow};
use petgraph::graph::NodeIndex;

/// Callee-name prefix that recategorizes an unresolved call as an MPI call.
const MPI_PREFIX: &str = "mpi_";

impl NodeRegistry {
    fn intern_ref(
        &mut self,
        version: &str,
        loc: &str,
        nref: &NodeRef,
        default_cat: &str,
    ) -> NodeIndex {
        let key = NodeKey::new(version, loc, nref.uri.clone());
        let cat = nref.cat.as_deref().unwrap_or(default_cat);
        let mut node = FactNode::new(key.clone(), cat);
        match (nref.start_line, nref.end_line) {
            (Some(start), Some(end)) => {
                node.start_line = start;
                node.end_line = end;
            }
            (Some(line), None) | (None, Some(line)) => {
                node.start_line = line;
                node.end_line = line;
            }
            (None, None) => {
                log::warn!("row for {key} carries no line range");
            }
        }
        if let Some(name) = &nref.name {
            node.sub = Some(name.clone());
        }
        self.intern(node)
    }

    /// Intern every enclosing-unit reference of a row, so later rows for the
    /// same units converge on them, and wire `child` under the innermost:
    /// the reported construct if any, else the enclosing subprogram, else
    /// the enclosing main program.
    fn attach_to_context(
        &mut self,
        version: &str,
        loc: &str,
        constr: Option<&NodeRef>,
        subprogram: Option<&NodeRef>,
        main: Option<&NodeRef>,
        child: NodeIndex,
    ) {
        let constr_idx = constr.map(|c| self.intern_ref(version, loc, c, ""));
        let sub_idx = subprogram.map(|sp| self.intern_ref(version, loc, sp, ""));
        let main_idx = main.map(|m| self.intern_ref(version, loc, m, MAIN_PROGRAM));
        if let Some(parent) = constr_idx.or(sub_idx).or(main_idx) {
            self.add_edge(parent, child, EdgeKind::Contains);
        }
    }

    fn context_names(row_sub: Option<&NodeRef>, main: Option<&NodeRef>) -> Option<String> {
        row_sub
            .and_then(|s| s.name.clone())
            .or_else(|| main.and_then(|m| m.name.clone().or_else(|| Some("<main>".to_string()))))
    }

    pub fn load_construct_row(&mut self, row: &ConstructRow) {
        let idx = self.intern_ref(&row.version, &row.loc, &row.constr, "");
        let node = self.node_mut(idx);
        if node.unit.is_none() {
            node.unit = row.unit_name.clone();
        }
        if node.sub.is_none() {
            node.sub = Self::context_names(row.subprogram.as_ref(), row.main.as_ref());
        }
        self.attach_to_context(
            &row.version,
            &row.loc,
            row.parent.as_ref(),
            row.subprogram.as_ref(),
            row.main.as_ref(),
            idx,
        );
    }

    pub fn load_call_row(&mut self, row: &CallRow) {
        let idx = self.intern_ref(&row.version, &row.loc, &row.call, "call-stmt");
        let node = self.node_mut(idx);
        node.callee_name = Some(row.callee_name.clone());
        if node.unit.is_none() {
            node.unit = row.unit_name.clone();
        }
        if node.sub.is_none() {
            node.sub = Self::context_names(row.subprogram.as_ref(), row.main.as_ref());
        }
        self.attach_to_context(
            &row.version,
            &row.loc,
            row.constr.as_ref(),
            row.subprogram.as_ref(),
            row.main.as_ref(),
            idx,
        );

        let mut callee_ref = row.callee.clone();
        if callee_ref.name.is_none() {
            callee_ref.name = Some(row.callee_name.clone());
        }
        let callee = self.intern_ref(&row.version, &row.callee_loc, &callee_ref, "");
        self.add_edge(idx, callee, EdgeKind::Calls);
    }

    pub fn load_other_call_row(&mut self, row: &OtherCallRow) {
        let cat = if row.callee_name.starts_with(MPI_PREFIX) {
            MPI_CALL
        } else {
            OTHER_CALL
        };
        let mut call_ref = row.call.clone();
        if call_ref.cat.as_deref().map_or(true, str::is_empty) {
            call_ref.cat = Some(cat.to_string());
        }
        let idx = self.intern_ref(&row.version, &row.loc, &call_ref, cat);
        let node = self.node_mut(idx);
        node.callee_name = Some(row.callee_name.clone());
        if node.unit.is_none() {
            node.unit = row.unit_name.clone();
        }
        if node.sub.is_none() {
            node.sub = Self::context_names(row.subprogram.as_ref(), row.main.as_ref());
        }
        self.attach_to_context(
            &row.version,
            &row.loc,
            row.constr.as_ref(),
            row.subprogram.as_ref(),
            row.main.as_ref(),
            idx,
        );
    }

    pub fn load_directive_row(&mut self, row: &DirectiveRow) {
        let idx = self.intern_ref(&row.version, &row.loc, &row.directive, "");
        let node = self.node_mut(idx);
        if node.unit.is_none() {
            node.unit = row.unit_name.clone();
        }
        if node.sub.is_none() {
            node.sub = Self::context_names(row.subprogram.as_ref(), row.main.as_ref());
        }
        self.attach_to_context(
            &row.version,
            &row.loc,
            row.constr.as_ref(),
            row.subprogram.as_ref(),
            row.main.as_ref(),
            idx,
        );
    }
}
