use crate::condition::BranchCondition;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Discriminant shared by actions, triggers and the step outputs they produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    Code,
    Piece,
    LoopOnItems,
    Branch,
    Missing,
    Empty,
    Webhook,
    PieceTrigger,
}

impl StepType {
    pub fn is_trigger(&self) -> bool {
        matches!(self, StepType::Empty | StepType::Webhook | StepType::PieceTrigger)
    }
}

fn default_valid() -> bool {
    true
}

/// Fields common to every plain step; `S` is the variant's settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSpec<S> {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_valid")]
    pub valid: bool,
    pub settings: S,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<Box<Action>>,
}

impl<S> StepSpec<S> {
    pub fn new(name: impl Into<String>, settings: S) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            valid: true,
            settings,
            next_action: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_valid(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    pub fn then(mut self, next: Action) -> Self {
        self.next_action = Some(Box::new(next));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSettings {
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceSettings {
    pub piece_name: String,
    #[serde(default)]
    pub piece_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
    #[serde(default)]
    pub input: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopOnItemsSettings {
    pub items: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchSettings {
    /// Outer list is OR'd, inner lists are AND'd.
    #[serde(default)]
    pub conditions: Vec<Vec<BranchCondition>>,
}

pub type CodeActionSpec = StepSpec<CodeSettings>;
pub type PieceActionSpec = StepSpec<PieceSettings>;
pub type MissingActionSpec = StepSpec<Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopOnItemsActionSpec {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_valid")]
    pub valid: bool,
    pub settings: LoopOnItemsSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_loop_action: Option<Box<Action>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<Box<Action>>,
}

impl LoopOnItemsActionSpec {
    pub fn new(name: impl Into<String>, items: impl Into<Value>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            valid: true,
            settings: LoopOnItemsSettings { items: items.into() },
            first_loop_action: None,
            next_action: None,
        }
    }

    pub fn with_body(mut self, first: Action) -> Self {
        self.first_loop_action = Some(Box::new(first));
        self
    }

    pub fn then(mut self, next: Action) -> Self {
        self.next_action = Some(Box::new(next));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchActionSpec {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_valid")]
    pub valid: bool,
    pub settings: BranchSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success_action: Option<Box<Action>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure_action: Option<Box<Action>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<Box<Action>>,
}

impl BranchActionSpec {
    pub fn new(name: impl Into<String>, conditions: Vec<Vec<BranchCondition>>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            valid: true,
            settings: BranchSettings { conditions },
            on_success_action: None,
            on_failure_action: None,
            next_action: None,
        }
    }

    pub fn on_success(mut self, action: Action) -> Self {
        self.on_success_action = Some(Box::new(action));
        self
    }

    pub fn on_failure(mut self, action: Action) -> Self {
        self.on_failure_action = Some(Box::new(action));
        self
    }

    pub fn then(mut self, next: Action) -> Self {
        self.next_action = Some(Box::new(next));
        self
    }
}

/// A node of the action tree. Each variant owns only the child links it can
/// have, so sub-chains are never shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Code(CodeActionSpec),
    Piece(PieceActionSpec),
    LoopOnItems(LoopOnItemsActionSpec),
    Branch(BranchActionSpec),
    Missing(MissingActionSpec),
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::Code(a) => &a.name,
            Action::Piece(a) => &a.name,
            Action::LoopOnItems(a) => &a.name,
            Action::Branch(a) => &a.name,
            Action::Missing(a) => &a.name,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Action::Code(a) => &a.display_name,
            Action::Piece(a) => &a.display_name,
            Action::LoopOnItems(a) => &a.display_name,
            Action::Branch(a) => &a.display_name,
            Action::Missing(a) => &a.display_name,
        }
    }

    pub fn action_type(&self) -> StepType {
        match self {
            Action::Code(_) => StepType::Code,
            Action::Piece(_) => StepType::Piece,
            Action::LoopOnItems(_) => StepType::LoopOnItems,
            Action::Branch(_) => StepType::Branch,
            Action::Missing(_) => StepType::Missing,
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Action::Code(a) => a.valid,
            Action::Piece(a) => a.valid,
            Action::LoopOnItems(a) => a.valid,
            Action::Branch(a) => a.valid,
            Action::Missing(_) => false,
        }
    }

    pub fn next_action(&self) -> Option<&Action> {
        let next = match self {
            Action::Code(a) => &a.next_action,
            Action::Piece(a) => &a.next_action,
            Action::LoopOnItems(a) => &a.next_action,
            Action::Branch(a) => &a.next_action,
            Action::Missing(a) => &a.next_action,
        };
        next.as_deref()
    }

    /// Settings as raw JSON, the shape the variable resolver works on.
    pub fn settings_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            Action::Code(a) => serde_json::to_value(&a.settings),
            Action::Piece(a) => serde_json::to_value(&a.settings),
            Action::LoopOnItems(a) => serde_json::to_value(&a.settings),
            Action::Branch(a) => serde_json::to_value(&a.settings),
            Action::Missing(a) => Ok(a.settings.clone()),
        }
    }

    /// Child chains nested directly under this node (loop body, branch arms).
    pub fn child_chains(&self) -> Vec<&Action> {
        match self {
            Action::LoopOnItems(a) => a.first_loop_action.as_deref().into_iter().collect(),
            Action::Branch(a) => a
                .on_success_action
                .as_deref()
                .into_iter()
                .chain(a.on_failure_action.as_deref())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Iterate this action and its `nextAction` successors.
    pub fn chain(&self) -> Chain<'_> {
        Chain { current: Some(self) }
    }

    /// Depth-first search of this chain and every nested chain.
    pub fn find(&self, name: &str) -> Option<&Action> {
        for action in self.chain() {
            if action.name() == name {
                return Some(action);
            }
            for child in action.child_chains() {
                if let Some(found) = child.find(name) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Names of every step reachable from this action, in walk order.
    pub fn step_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for action in self.chain() {
            names.push(action.name().to_string());
            for child in action.child_chains() {
                names.extend(child.step_names());
            }
        }
        names
    }
}

impl From<CodeActionSpec> for Action {
    fn from(spec: CodeActionSpec) -> Self {
        Action::Code(spec)
    }
}

impl From<PieceActionSpec> for Action {
    fn from(spec: PieceActionSpec) -> Self {
        Action::Piece(spec)
    }
}

impl From<LoopOnItemsActionSpec> for Action {
    fn from(spec: LoopOnItemsActionSpec) -> Self {
        Action::LoopOnItems(spec)
    }
}

impl From<BranchActionSpec> for Action {
    fn from(spec: BranchActionSpec) -> Self {
        Action::Branch(spec)
    }
}

pub struct Chain<'a> {
    current: Option<&'a Action>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a Action;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = current.next_action();
        Some(current)
    }
}
