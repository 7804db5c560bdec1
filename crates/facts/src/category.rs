use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Separator used by the fact view when several category labels are folded
/// into a single column.
pub const CAT_SEP: char = '&';

/// Category assigned to unresolved calls whose callee name starts with an
/// MPI prefix.
pub const MPI_CALL: &str = "mpi-call";

/// Category assigned to calls the fact view could not resolve to any callee.
pub const OTHER_CALL: &str = "call-stmt*";

pub const MAIN_PROGRAM: &str = "main-program";
pub const LOOP_CONSTRUCT: &str = "do-construct";

/// Subprogram categories: container units that can be call targets.
pub static SUBPROG_CATS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    BTreeSet::from([
        "subroutine-external-subprogram",
        "subroutine-internal-subprogram",
        "subroutine-module-subprogram",
        "function-external-subprogram",
        "function-internal-subprogram",
        "function-module-subprogram",
    ])
});

/// Call-site categories resolved by the fact view.
pub static CALL_CATS: Lazy<BTreeSet<&'static str>> =
    Lazy::new(|| BTreeSet::from(["call-stmt", "function-reference", "part-name"]));

/// Categories that make a node relevant for display on their own.
pub static RELEVANT_CATS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    let mut s = BTreeSet::from([
        "do-construct",
        "do-stmt",
        "end-do-stmt",
        "do-block",
        OTHER_CALL,
        MPI_CALL,
    ]);
    s.extend(CALL_CATS.iter());
    s
});

/// Structurally uninteresting wrappers spliced out of the display tree.
pub static DEFAULT_OMITTED: Lazy<BTreeSet<&'static str>> =
    Lazy::new(|| BTreeSet::from(["execution-part", "do-block"]));

/// Compiler-directive category prefixes (OpenMP, OpenACC, vendor pragmas).
const DIRECTIVE_PREFIXES: [&str; 5] = ["omp-", "acc-", "ocl-", "xlf-", "dec-"];

/// Coarse display bucket for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    Loop,
    Branch,
    Call,
    Main,
    Subroutine,
    Function,
    Part,
    Block,
    Pp,
    Mpi,
    Omp,
    Acc,
    Dec,
    Xlf,
    Ocl,
    #[serde(rename = "call*")]
    OtherCall,
}

static TYPE_TBL: Lazy<HashMap<&'static str, NodeType>> = Lazy::new(|| {
    let mut t = HashMap::new();
    t.insert("file", NodeType::File);

    t.insert("do-construct", NodeType::Loop);

    t.insert("if-construct", NodeType::Branch);
    t.insert("case-construct", NodeType::Branch);
    t.insert("select-type-construct", NodeType::Branch);
    t.insert("where-construct", NodeType::Branch);

    t.insert("call-stmt", NodeType::Call);
    t.insert("function-reference", NodeType::Call);
    t.insert("part-name", NodeType::Call);

    t.insert(MAIN_PROGRAM, NodeType::Main);
    t.insert("subroutine-external-subprogram", NodeType::Subroutine);
    t.insert("subroutine-internal-subprogram", NodeType::Subroutine);
    t.insert("subroutine-module-subprogram", NodeType::Subroutine);
    t.insert("function-external-subprogram", NodeType::Function);
    t.insert("function-internal-subprogram", NodeType::Function);
    t.insert("function-module-subprogram", NodeType::Function);

    t.insert("execution-part", NodeType::Part);

    for block in [
        "if-then-block",
        "else-if-block",
        "else-block",
        "case-block",
        "type-guard-block",
        "where-block",
        "do-block",
        "block-construct",
    ] {
        t.insert(block, NodeType::Block);
    }

    for pp in [
        "pp-branch",
        "pp-branch-do",
        "pp-branch-end-do",
        "pp-branch-if",
        "pp-branch-end-if",
        "pp-branch-forall",
        "pp-branch-end-forall",
        "pp-branch-select",
        "pp-branch-end-select",
        "pp-branch-where",
        "pp-branch-end-where",
        "pp-branch-pu",
        "pp-branch-end-pu",
        "pp-branch-function",
        "pp-branch-end-function",
        "pp-branch-subroutine",
        "pp-branch-end-subroutine",
        "pp-section-elif",
        "pp-section-else",
        "pp-section-if",
        "pp-section-ifdef",
        "pp-section-ifndef",
    ] {
        t.insert(pp, NodeType::Pp);
    }

    t.insert(MPI_CALL, NodeType::Mpi);
    t.insert(OTHER_CALL, NodeType::OtherCall);
    t
});

/// Set of category labels attached to one fact node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategorySet(BTreeSet<String>);

impl CategorySet {
    /// Parse a fact-view category column ("do-construct&container-unit").
    pub fn parse(raw: &str) -> Self {
        let set = raw
            .split(CAT_SEP)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        CategorySet(set)
    }

    pub fn single(cat: &str) -> Self {
        CategorySet::parse(cat)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, cat: &str) -> bool {
        self.0.contains(cat)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn intersects<'a, I>(&self, cats: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        cats.into_iter().any(|c| self.0.contains(c))
    }

    pub fn is_subprogram(&self) -> bool {
        self.intersects(SUBPROG_CATS.iter().copied())
    }

    pub fn is_main_program(&self) -> bool {
        self.contains(MAIN_PROGRAM)
    }

    /// Container unit: a syntactic scope that can own nested constructs and
    /// be a call target.
    pub fn is_container_unit(&self) -> bool {
        self.is_subprogram() || self.is_main_program()
    }

    pub fn is_call(&self) -> bool {
        self.intersects(CALL_CATS.iter().copied())
    }

    pub fn is_loop(&self) -> bool {
        self.contains(LOOP_CONSTRUCT)
    }

    pub fn is_compiler_directive(&self) -> bool {
        self.iter()
            .any(|c| DIRECTIVE_PREFIXES.iter().any(|p| c.starts_with(p)))
    }

    pub fn is_construct(&self) -> bool {
        self.iter().any(|c| c.ends_with("-construct"))
    }

    pub fn is_block(&self) -> bool {
        self.iter().any(|c| c.ends_with("-block"))
    }

    /// Coarse display bucket. Directive prefixes win over the table so that
    /// e.g. an `omp-parallel-do` directive is bucketed as `omp` even when a
    /// secondary label would match.
    pub fn node_type(&self) -> Option<NodeType> {
        for c in self.iter() {
            let directive = match c.split_once('-').map(|(p, _)| p) {
                Some("omp") => Some(NodeType::Omp),
                Some("acc") => Some(NodeType::Acc),
                Some("dec") => Some(NodeType::Dec),
                Some("xlf") => Some(NodeType::Xlf),
                Some("ocl") => Some(NodeType::Ocl),
                _ => None,
            };
            if let Some(ty) = directive {
                return Some(ty);
            }
            if let Some(ty) = TYPE_TBL.get(c) {
                return Some(*ty);
            }
        }
        None
    }
}

impl FromIterator<String> for CategorySet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        CategorySet(iter.into_iter().collect())
    }
}
