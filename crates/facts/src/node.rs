use crate::category::CategorySet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a fact node: one node is created per distinct key no
/// matter how many relation rows mention it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    /// Version the fact snapshot was extracted from.
    pub version: String,
    /// Source file location (repository-relative path).
    pub loc: String,
    /// Local URI of the construct within the fact graph.
    pub uri: String,
}

impl NodeKey {
    pub fn new(
        version: impl Into<String>,
        loc: impl Into<String>,
        uri: impl Into<String>,
    ) -> Self {
        NodeKey {
            version: version.into(),
            loc: loc.into(),
            uri: uri.into(),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.version, self.loc, self.uri)
    }
}

/// A typed node from the fact graph view.
///
/// Immutable once interned; relations live in the registry's graph, and
/// derived properties (container, closures, loop depth) are memoized by the
/// registry rather than on the node itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactNode {
    pub key: NodeKey,

    /// Raw category column as received from the fact view.
    pub cat: String,

    /// Parsed category label set.
    pub cats: CategorySet,

    pub start_line: u32,
    pub end_line: u32,

    /// Name of the innermost enclosing subprogram, when the fact view
    /// reported one.
    pub sub: Option<String>,

    /// Enclosing program-unit name (or main-program name).
    pub unit: Option<String>,

    /// Callee name, for call-site nodes.
    pub callee_name: Option<String>,
}

impl FactNode {
    pub fn new(key: NodeKey, cat: &str) -> Self {
        let cats = CategorySet::parse(cat);
        if cats.is_empty() {
            log::warn!("node {key} has no category labels");
        }
        FactNode {
            key,
            cat: cat.to_string(),
            cats,
            start_line: 0,
            end_line: 0,
            sub: None,
            unit: None,
            callee_name: None,
        }
    }

    pub fn with_lines(mut self, start: u32, end: u32) -> Self {
        self.start_line = start;
        self.end_line = end;
        self
    }

    pub fn with_sub(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_callee(mut self, callee: impl Into<String>) -> Self {
        self.callee_name = Some(callee.into());
        self
    }

    /// True when a construct child on the same head line is just the
    /// construct's own opening statement.
    pub fn is_constr_head_of(&self, child: &FactNode) -> bool {
        self.cats.is_construct()
            && self.start_line == child.start_line
            && !child.cats.is_construct()
            && !child.cats.is_block()
    }

    /// Tail counterpart of [`FactNode::is_constr_head_of`].
    pub fn is_constr_tail_of(&self, child: &FactNode) -> bool {
        self.cats.is_construct()
            && self.end_line == child.end_line
            && !child.cats.is_construct()
            && !child.cats.is_block()
    }
}

impl fmt::Display for FactNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_line == self.end_line {
            write!(f, "{}[{}:{}]", self.cat, self.start_line, self.key.loc)
        } else {
            write!(
                f,
                "{}[{}-{}:{}]",
                self.cat, self.start_line, self.end_line, self.key.loc
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(uri: &str) -> NodeKey {
        NodeKey::new("v1", "a.f90", uri)
    }

    #[test]
    fn head_tail_detection() {
        let construct = FactNode::new(key("c"), "do-construct").with_lines(10, 20);
        let head = FactNode::new(key("h"), "do-stmt").with_lines(10, 10);
        let tail = FactNode::new(key("t"), "end-do-stmt").with_lines(20, 20);
        let body = FactNode::new(key("b"), "do-block").with_lines(10, 20);

        assert!(construct.is_constr_head_of(&head));
        assert!(construct.is_constr_tail_of(&tail));
        // blocks are never elided as head/tail even when lines coincide
        assert!(!construct.is_constr_head_of(&body));
        // a statement node has no construct suffix, so it elides nothing
        assert!(!head.is_constr_head_of(&construct));
    }

    #[test]
    fn display_includes_range() {
        let n = FactNode::new(key("c"), "do-construct").with_lines(3, 7);
        assert_eq!(format!("{n}"), "do-construct[3-7:a.f90]");
    }
}
