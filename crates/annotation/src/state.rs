use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Accumulated annotation state of one node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judgment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimation_scheme: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub checked: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub opened: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub relevant: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub target: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub expand_target_loops: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub expand_relevant_loops: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub expand_all: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub collapse_all: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl NodeState {
    /// A state with nothing set is dropped from the replay result.
    pub fn is_empty(&self) -> bool {
        self == &NodeState::default()
    }

    pub(crate) fn set_flag(&mut self, flag: BoolFlag, value: bool) {
        match flag {
            BoolFlag::Checked => self.checked = value,
            BoolFlag::Opened => self.opened = value,
            BoolFlag::Relevant => self.relevant = value,
            BoolFlag::Target => self.target = value,
            BoolFlag::ExpandTargetLoops => self.expand_target_loops = value,
            BoolFlag::ExpandRelevantLoops => self.expand_relevant_loops = value,
            BoolFlag::ExpandAll => self.expand_all = value,
            BoolFlag::CollapseAll => self.collapse_all = value,
        }
    }
}

/// Boolean attributes addressable by the replay machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoolFlag {
    Checked,
    Opened,
    Relevant,
    Target,
    ExpandTargetLoops,
    ExpandRelevantLoops,
    ExpandAll,
    CollapseAll,
}

/// Position -> state, ordered so range operations and serialization are
/// deterministic.
pub type StateMap = BTreeMap<u64, NodeState>;

/// Re-key replayed states through a position remap (old -> new). States at
/// positions absent from the map belong to nodes that did not survive the
/// snapshot change; they are dropped and reported.
pub fn remap_states(states: StateMap, map: &HashMap<u64, u64>) -> StateMap {
    let mut out = StateMap::new();
    for (pos, state) in states {
        match map.get(&pos) {
            Some(&new_pos) => {
                if out.insert(new_pos, state).is_some() {
                    log::warn!("two annotated nodes collapsed onto position {new_pos}");
                }
            }
            None => log::debug!("annotation state at position {pos} has no surviving node"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_state_detection() {
        assert!(NodeState::default().is_empty());
        let s = NodeState {
            opened: true,
            ..Default::default()
        };
        assert!(!s.is_empty());
        // an empty comment still counts as state
        let c = NodeState {
            comment: Some(String::new()),
            ..Default::default()
        };
        assert!(!c.is_empty());
    }

    #[test]
    fn serialization_omits_unset_attributes() {
        let s = NodeState {
            judgment: Some("Difficult".to_string()),
            checked: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, r#"{"judgment":"Difficult","checked":true}"#);
    }

    #[test]
    fn remap_drops_unmapped_positions() {
        let mut states = StateMap::new();
        states.insert(
            3,
            NodeState {
                checked: true,
                ..Default::default()
            },
        );
        states.insert(
            5,
            NodeState {
                opened: true,
                ..Default::default()
            },
        );
        let map = HashMap::from([(3, 7)]);
        let out = remap_states(states, &map);
        assert_eq!(out.len(), 1);
        assert!(out[&7].checked);
    }
}
