use serde::{Deserialize, Serialize};

/// Reference to one fact-graph node inside a relation row.
///
/// Line information is optional on the wire: rows missing it are still
/// loaded (with a warning) so one malformed row never aborts a reduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub uri: String,
    #[serde(default)]
    pub cat: Option<String>,
    #[serde(default)]
    pub start_line: Option<u32>,
    #[serde(default)]
    pub end_line: Option<u32>,
    /// Subprogram/unit name, when the referenced node is a container unit.
    #[serde(default)]
    pub name: Option<String>,
}

impl NodeRef {
    pub fn new(uri: impl Into<String>) -> Self {
        NodeRef {
            uri: uri.into(),
            cat: None,
            start_line: None,
            end_line: None,
            name: None,
        }
    }

    pub fn cat(mut self, cat: impl Into<String>) -> Self {
        self.cat = Some(cat.into());
        self
    }

    pub fn lines(mut self, start: u32, end: u32) -> Self {
        self.start_line = Some(start);
        self.end_line = Some(end);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Construct-nesting row: one container construct plus its structural
/// context (parent construct, enclosing subprogram, enclosing main program).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructRow {
    pub version: String,
    pub loc: String,
    pub constr: NodeRef,
    #[serde(default)]
    pub parent: Option<NodeRef>,
    #[serde(default)]
    pub subprogram: Option<NodeRef>,
    #[serde(default)]
    pub main: Option<NodeRef>,
    /// Enclosing program-unit name.
    #[serde(default)]
    pub unit_name: Option<String>,
}

/// Resolved call row: a call site, its structural context, and one candidate
/// callee container unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRow {
    pub version: String,
    pub loc: String,
    pub call: NodeRef,
    pub callee_name: String,
    pub callee: NodeRef,
    /// Location of the file defining the callee (may differ from `loc`).
    pub callee_loc: String,
    #[serde(default)]
    pub constr: Option<NodeRef>,
    #[serde(default)]
    pub subprogram: Option<NodeRef>,
    #[serde(default)]
    pub main: Option<NodeRef>,
    #[serde(default)]
    pub unit_name: Option<String>,
}

/// Call row the fact view could not resolve to any callee definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtherCallRow {
    pub version: String,
    pub loc: String,
    pub call: NodeRef,
    pub callee_name: String,
    #[serde(default)]
    pub constr: Option<NodeRef>,
    #[serde(default)]
    pub subprogram: Option<NodeRef>,
    #[serde(default)]
    pub main: Option<NodeRef>,
    #[serde(default)]
    pub unit_name: Option<String>,
}

/// Compiler-directive row (OpenMP/OpenACC/vendor pragmas).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveRow {
    pub version: String,
    pub loc: String,
    pub directive: NodeRef,
    #[serde(default)]
    pub constr: Option<NodeRef>,
    #[serde(default)]
    pub subprogram: Option<NodeRef>,
    #[serde(default)]
    pub main: Option<NodeRef>,
    #[serde(default)]
    pub unit_name: Option<String>,
}
