use serde::Serialize;
use serde_json::{json, Map, Value};

pub const UNTITLED_WORKFLOW: &str = "Untitled Workflow";
pub const UNNAMED_STEP: &str = "Unnamed Step";
pub const DEFAULT_PIECE_VERSION: &str = "~0.1.0";
pub const DEFAULT_PIECE_TYPE: &str = "OFFICIAL";
pub const DEFAULT_PACKAGE_TYPE: &str = "REGISTRY";

/// A normalized workflow document, ready to be written out verbatim.
///
/// Fields the normalizer never type-checks are kept as raw JSON values so
/// that whatever the generator produced survives untouched. Keys no rule
/// covers are carried in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    pub created: Value,
    pub updated: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    pub description: Value,
    pub tags: Value,
    pub blog_url: Value,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub pieces: Vec<String>,
    pub template: Template,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowDocument {
    /// The document name when it is a string.
    pub fn name_str(&self) -> Option<&str> {
        self.name.as_ref().and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DocumentKind {
    #[serde(rename = "workflow")]
    Workflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchemaVersion {
    #[serde(rename = "2")]
    V2,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub display_name: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Link>,
    pub connection_ids: Vec<Value>,
    pub schema_version: SchemaVersion,
    pub valid: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Template {
    /// Steps reachable from the trigger, head first.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        std::iter::successors(self.trigger.as_ref().and_then(Link::step), |step| {
            step.next_action.as_ref().and_then(Link::step)
        })
    }
}

/// Content of a `trigger` or `nextAction` slot.
///
/// Generators sometimes put a non-mapping value where a step belongs; such
/// values are kept as they are and end the chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Link {
    Step(Box<Step>),
    Opaque(Value),
}

impl Link {
    pub fn step(&self) -> Option<&Step> {
        match self {
            Link::Step(step) => Some(step),
            Link::Opaque(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub valid: Value,
    pub display_name: Value,
    pub settings: Settings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<Link>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    PieceTrigger,
    Piece,
    Code,
    LoopOnItems,
}

impl StepType {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "PIECE_TRIGGER" => Some(StepType::PieceTrigger),
            "PIECE" => Some(StepType::Piece),
            "CODE" => Some(StepType::Code),
            "LOOP_ON_ITEMS" => Some(StepType::LoopOnItems),
            _ => None,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            StepType::PieceTrigger => "PIECE_TRIGGER",
            StepType::Piece => "PIECE",
            StepType::Code => "CODE",
            StepType::LoopOnItems => "LOOP_ON_ITEMS",
        }
    }
}

/// Step settings. Optional keys keep the distinction between absent and
/// present-but-null, since presence alone drives the defaulting rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub piece_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub piece_version: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub piece_type: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_type: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    pub input_ui_info: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_handling_options: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorHandlingOptions {
    pub retry_on_failure: Toggle,
    pub continue_on_failure: Toggle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Toggle {
    pub value: bool,
}

impl ErrorHandlingOptions {
    pub fn to_value(self) -> Value {
        json!({
            "retryOnFailure": { "value": self.retry_on_failure.value },
            "continueOnFailure": { "value": self.continue_on_failure.value },
        })
    }
}
