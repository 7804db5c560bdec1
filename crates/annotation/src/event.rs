use serde::{Deserialize, Serialize};

/// One record of the append-only annotation log.
///
/// Every field beyond the partition and position is optional; a record
/// carries only the attributes the annotator changed. Boolean fields are
/// three-valued on the wire: absent (no-op), `true` (set), `false` (clear).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationEvent {
    pub user: String,
    pub project: String,
    pub version: String,

    /// Nested-set position of the annotated node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,

    /// Leftmost position of the annotated node's subtree, recorded so range
    /// operations can run without loading the display tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leftmost_position: Option<u64>,

    pub timestamp_ms: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judgment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimation_scheme: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opened: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevant: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand_target_loops: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand_relevant_loops: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand_all: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapse_all: Option<bool>,
}

impl AnnotationEvent {
    /// Bare event for the given partition and position.
    pub fn at(
        user: impl Into<String>,
        project: impl Into<String>,
        version: impl Into<String>,
        position: u64,
        leftmost_position: u64,
        timestamp_ms: i64,
    ) -> Self {
        AnnotationEvent {
            user: user.into(),
            project: project.into(),
            version: version.into(),
            position: Some(position),
            leftmost_position: Some(leftmost_position),
            timestamp_ms,
            comment: None,
            judgment: None,
            estimation_scheme: None,
            checked: None,
            opened: None,
            relevant: None,
            target: None,
            expand_target_loops: None,
            expand_relevant_loops: None,
            expand_all: None,
            collapse_all: None,
        }
    }

    pub fn partition(&self) -> Partition {
        Partition {
            user: self.user.clone(),
            project: self.project.clone(),
            version: self.version.clone(),
        }
    }
}

/// Replay partition: states never mix across users or snapshots.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Partition {
    pub user: String,
    pub project: String,
    pub version: String,
}
