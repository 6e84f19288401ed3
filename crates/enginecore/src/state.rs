use crate::step_output::{IterationOutputs, StepOutput, StepOutputStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One level of loop nesting: the loop step's name and the 0-based iteration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoopIteration(pub String, pub usize);

/// Ordered path of loop iterations enclosing a step execution. Branch arms
/// do not add a level; their children share the branch's path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ancestors(Vec<LoopIteration>);

impl Ancestors {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, loop_name: impl Into<String>, iteration: usize) -> Self {
        let mut path = self.0.clone();
        path.push(LoopIteration(loop_name.into(), iteration));
        Self(path)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoopIteration> {
        self.0.iter()
    }
}

impl From<Vec<(&str, usize)>> for Ancestors {
    fn from(path: Vec<(&str, usize)>) -> Self {
        Self(
            path.into_iter()
                .map(|(name, i)| LoopIteration(name.to_string(), i))
                .collect(),
        )
    }
}

impl fmt::Display for Ancestors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for LoopIteration(name, i) in &self.0 {
            write!(f, "{}[{}].", name, i)?;
        }
        Ok(())
    }
}

/// Composite key of the execution state: step name plus loop path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepKey {
    pub name: String,
    #[serde(default)]
    pub ancestors: Ancestors,
}

impl StepKey {
    pub fn new(name: impl Into<String>, ancestors: Ancestors) -> Self {
        Self {
            name: name.into(),
            ancestors,
        }
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.ancestors, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateEntry {
    #[serde(flatten)]
    key: StepKey,
    output: StepOutput,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateRepr {
    #[serde(default)]
    steps: Vec<StateEntry>,
}

/// Every step output of one flow run, in insertion order.
///
/// Storage is a flat map keyed by [`StepKey`]; loop iterations get distinct
/// keys through their ancestor path. Insertion at an existing key overwrites
/// it in place, so a resumed step replaces its earlier record without
/// changing the trace order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StateRepr", into = "StateRepr")]
pub struct ExecutionState {
    entries: Vec<(StepKey, StepOutput)>,
    index: HashMap<StepKey, usize>,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_step(&mut self, name: &str, ancestors: &Ancestors, output: StepOutput) {
        let key = StepKey::new(name, ancestors.clone());
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = output,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, output));
            }
        }
    }

    pub fn get_step(&self, name: &str, ancestors: &Ancestors) -> Option<&StepOutput> {
        let key = StepKey::new(name, ancestors.clone());
        self.index.get(&key).map(|&pos| &self.entries[pos].1)
    }

    /// Look a step up from inside `ancestors`: the current iteration first,
    /// then each enclosing scope out to the top level.
    pub fn lookup_visible(&self, name: &str, ancestors: &Ancestors) -> Option<&StepOutput> {
        let mut scope = Some(ancestors.clone());
        while let Some(current) = scope {
            if let Some(found) = self.get_step(name, &current) {
                return Some(found);
            }
            scope = current.parent();
        }
        None
    }

    pub fn trigger_output(&self) -> Option<&StepOutput> {
        self.entries
            .iter()
            .find(|(key, output)| key.ancestors.is_root() && output.step_type.is_trigger())
            .map(|(_, output)| output)
    }

    /// Outputs recorded directly inside one loop iteration.
    pub fn children_of(&self, ancestors: &Ancestors) -> IterationOutputs {
        self.entries
            .iter()
            .filter(|(key, _)| &key.ancestors == ancestors)
            .map(|(key, output)| (key.name.clone(), output.clone()))
            .collect()
    }

    pub fn paused_steps(&self) -> Vec<&StepKey> {
        self.entries
            .iter()
            .filter(|(_, output)| output.status == StepOutputStatus::Paused)
            .map(|(key, _)| key)
            .collect()
    }

    pub fn steps(&self) -> impl Iterator<Item = (&StepKey, &StepOutput)> {
        self.entries.iter().map(|(key, output)| (key, output))
    }

    /// Rebuild the state with every output passed through `f`.
    pub fn map_outputs(self, mut f: impl FnMut(StepOutput) -> StepOutput) -> Self {
        let entries = self
            .entries
            .into_iter()
            .map(|(key, output)| (key, f(output)))
            .collect();
        Self {
            entries,
            index: self.index,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<StateRepr> for ExecutionState {
    fn from(repr: StateRepr) -> Self {
        let mut state = ExecutionState::new();
        for entry in repr.steps {
            state.insert_step(&entry.key.name, &entry.key.ancestors, entry.output);
        }
        state
    }
}

impl From<ExecutionState> for StateRepr {
    fn from(state: ExecutionState) -> Self {
        StateRepr {
            steps: state
                .entries
                .into_iter()
                .map(|(key, output)| StateEntry { key, output })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::StepType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn succeeded(output: serde_json::Value) -> StepOutput {
        StepOutput::running(StepType::Code, json!({}))
            .with_output(output)
            .with_status(StepOutputStatus::Succeeded)
    }

    #[test]
    fn test_insert_overwrites_same_key() {
        let mut state = ExecutionState::new();
        let root = Ancestors::root();
        state.insert_step("a", &root, StepOutput::running(StepType::Code, json!({})));
        state.insert_step("b", &root, succeeded(json!(2)));
        state.insert_step("a", &root, succeeded(json!(1)));

        assert_eq!(state.len(), 2);
        let names: Vec<&str> = state.steps().map(|(k, _)| k.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(state.get_step("a", &root).unwrap().output, Some(json!(1)));
    }

    #[test]
    fn test_iterations_get_distinct_keys() {
        let mut state = ExecutionState::new();
        let first = Ancestors::root().child("loop", 0);
        let second = Ancestors::root().child("loop", 1);
        state.insert_step("body", &first, succeeded(json!("x")));
        state.insert_step("body", &second, succeeded(json!("y")));

        assert_eq!(state.len(), 2);
        assert_eq!(state.get_step("body", &second).unwrap().output, Some(json!("y")));
        assert!(state.get_step("body", &Ancestors::root()).is_none());
        assert_eq!(state.children_of(&first).len(), 1);
    }

    #[test]
    fn test_lookup_visible_walks_outward() {
        let mut state = ExecutionState::new();
        let inner = Ancestors::root().child("loop", 3);
        state.insert_step("loop", &Ancestors::root(), succeeded(json!({"item": 7})));

        let found = state.lookup_visible("loop", &inner).unwrap();
        assert_eq!(found.output, Some(json!({"item": 7})));
    }

    #[test]
    fn test_json_round_trip_keeps_discriminants() {
        let mut state = ExecutionState::new();
        state.insert_step(
            "trigger",
            &Ancestors::root(),
            StepOutput::running(StepType::Webhook, json!({}))
                .with_status(StepOutputStatus::Succeeded),
        );
        state.insert_step(
            "step",
            &Ancestors::from(vec![("loop_1", 2)]),
            StepOutput::running(StepType::Piece, json!({})).with_status(StepOutputStatus::Paused),
        );

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["steps"][1]["ancestors"], json!([["loop_1", 2]]));
        assert_eq!(json["steps"][1]["output"]["status"], json!("PAUSED"));

        let back: ExecutionState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
        assert_eq!(back.paused_steps().len(), 1);
        assert_eq!(back.trigger_output().unwrap().step_type, StepType::Webhook);
    }
}
