use outline_facts::NodeType;
use serde::{Deserialize, Serialize};

/// One node of a reduced display tree.
///
/// A view over a fact node fixed at reduction time: children are already
/// ordered, filtered, and spliced; `position`/`leftmost_position` are filled
/// in by the indexing pass and `id` by serialization numbering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineNode {
    pub cat: String,
    pub loc: String,

    /// Enclosing program-unit name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enclosing_unit: Option<String>,

    pub start_line: u32,
    pub end_line: u32,

    pub children: Vec<OutlineNode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub callee_name: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,

    /// Candidate callees dropped at this call site by chain/visit filtering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored_callees: Option<usize>,

    /// Sequential serialization id, independent of the nested-position index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// Nested-set position (post-order rank).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,

    /// Position of the leftmost descendant; equals `position` for leaves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leftmost_position: Option<u64>,
}

impl OutlineNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Total node count of this subtree, root included.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(OutlineNode::subtree_len)
            .sum::<usize>()
    }

    /// Depth-first preorder walk with an explicit accumulator.
    pub fn walk<'a, A>(&'a self, acc: &mut A, f: &mut impl FnMut(&'a OutlineNode, &mut A)) {
        f(self, acc);
        for c in &self.children {
            c.walk(acc, f);
        }
    }
}

/// Per-file output: the file's reduced roots wrapped in a synthetic
/// `file`-category node carrying the stable file id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOutline {
    pub version: String,
    /// Stable file id derived from (version, location).
    pub fid: String,
    pub root: OutlineNode,
}

impl FileOutline {
    pub fn loc(&self) -> &str {
        &self.root.loc
    }
}
