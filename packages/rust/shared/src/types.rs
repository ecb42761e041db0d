//! Core domain types for techtree routes.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TechTreeError};

// ---------------------------------------------------------------------------
// StepId
// ---------------------------------------------------------------------------

/// Positive step identifier, unique within a route.
///
/// Serialized as a bare integer; as a `prereqs` key it is written in text
/// form (`"3"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub u32);

impl StepId {
    /// The id following this one, `None` once `u32::MAX` is reached.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for StepId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// A single node of the tech-tree, in the persisted field layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Step identifier.
    #[serde(rename = "index")]
    pub id: StepId,
    /// Short label.
    pub title: String,
    /// Free text description.
    pub details: String,
    /// Artifacts this step produces. Not required to be unique.
    pub products: Vec<String>,
    /// Producer step id → product strings that justified the dependency.
    pub prereqs: IndexMap<StepId, Vec<String>>,
}

impl Step {
    /// Create a step with no products or prereqs.
    pub fn new(id: StepId, title: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            details: details.into(),
            products: Vec::new(),
            prereqs: IndexMap::new(),
        }
    }

    /// Builder-style product list.
    pub fn with_products<I, S>(mut self, products: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.products = products.into_iter().map(Into::into).collect();
        self
    }

    /// Record that `matched` (a product of `producer`) is needed by this step.
    /// Strings under the same producer are merged without a duplicate check.
    pub fn link(&mut self, producer: StepId, matched: impl Into<String>) {
        self.prereqs.entry(producer).or_default().push(matched.into());
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self, origin: &Path) -> Result<()> {
        if self.id.0 == 0 {
            return Err(TechTreeError::malformed(
                origin,
                format!("step {:?} has index 0; indices start at 1", self.title),
            ));
        }
        if let Some(producer) = self.prereqs.keys().find(|p| p.0 == 0) {
            return Err(TechTreeError::malformed(
                origin,
                format!("step {} lists prereq producer {producer}", self.id),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "[{}] {}", self.id, self.title)?;
        if !self.details.is_empty() {
            writeln!(f, "    details:  {}", self.details)?;
        }
        if !self.products.is_empty() {
            writeln!(f, "    products: {}", self.products.join("; "))?;
        }
        for (producer, matched) in &self.prereqs {
            writeln!(f, "    needs:    {} from step {producer}", matched.join("; "))?;
        }
        Ok(())
    }
}

/// Input for appending a step to a route.
#[derive(Debug, Clone, Default)]
pub struct StepDraft {
    /// Explicit id; `None` means "next free id".
    pub id: Option<StepId>,
    pub title: String,
    pub details: String,
    pub products: Vec<String>,
    pub prereqs: IndexMap<StepId, Vec<String>>,
}

impl StepDraft {
    /// Same merge rule as [`Step::link`].
    pub fn link(&mut self, producer: StepId, matched: impl Into<String>) {
        self.prereqs.entry(producer).or_default().push(matched.into());
    }

    /// Turn the draft into a step, using `next` when no id was given.
    pub fn into_step(self, next: StepId) -> Step {
        Step {
            id: self.id.unwrap_or(next),
            title: self.title,
            details: self.details,
            products: self.products,
            prereqs: self.prereqs,
        }
    }
}

// ---------------------------------------------------------------------------
// Grouping / StepNode
// ---------------------------------------------------------------------------

/// Organizational container of steps. Contributes no edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    pub title: String,
    pub steps: Vec<StepNode>,
}

impl Grouping {
    /// An empty grouping.
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_steps(title, Vec::new())
    }

    pub fn with_steps(title: impl Into<String>, steps: Vec<StepNode>) -> Self {
        Self {
            title: title.into(),
            steps,
        }
    }
}

/// An element of a route's step collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepNode {
    Step(Step),
    Group(Grouping),
}

impl From<Step> for StepNode {
    fn from(step: Step) -> Self {
        Self::Step(step)
    }
}

impl From<Grouping> for StepNode {
    fn from(group: Grouping) -> Self {
        Self::Group(group)
    }
}

impl StepNode {
    /// Visit every step under this node depth-first, in insertion order.
    pub fn visit<'a>(&'a self, visitor: &mut impl FnMut(&'a Step)) {
        match self {
            Self::Step(step) => visitor(step),
            Self::Group(group) => walk(&group.steps, visitor),
        }
    }

    /// Parse one element of a grouped outline.
    ///
    /// Objects carrying `steps` are groupings, objects carrying `index` are
    /// steps (parsed strictly). Anything else is rejected.
    pub fn from_value(value: Value, origin: &Path) -> Result<Self> {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(TechTreeError::unknown_element(format!(
                    "expected a step or a grouping object, found {}",
                    kind_of(&other)
                )));
            }
        };

        if let Some(children) = map.remove("steps") {
            let title = match map.get("title") {
                Some(Value::String(title)) => title.clone(),
                _ => return Err(TechTreeError::malformed(origin, "grouping without a title")),
            };
            let Value::Array(children) = children else {
                return Err(TechTreeError::malformed(
                    origin,
                    format!("grouping {title:?}: `steps` must be an array"),
                ));
            };
            let steps = children
                .into_iter()
                .map(|child| Self::from_value(child, origin))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Self::Group(Grouping::with_steps(title, steps)));
        }

        if map.contains_key("index") {
            let step: Step = serde_json::from_value(Value::Object(map))
                .map_err(|e| TechTreeError::malformed(origin, e.to_string()))?;
            step.validate(origin)?;
            return Ok(Self::Step(step));
        }

        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        Err(TechTreeError::unknown_element(format!(
            "object with keys [{}] is neither a step nor a grouping",
            keys.join(", ")
        )))
    }
}

/// Visit every step in `nodes` depth-first, in insertion order.
pub fn walk<'a>(nodes: &'a [StepNode], visitor: &mut impl FnMut(&'a Step)) {
    for node in nodes {
        node.visit(visitor);
    }
}

/// All steps in `nodes`, groupings flattened away.
pub fn flatten(nodes: &[StepNode]) -> Vec<&Step> {
    let mut steps = Vec::new();
    walk(nodes, &mut |step| steps.push(step));
    steps
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
