//! Job-template graph model.
//!
//! A job template is a JSON object keyed by node ID, each value being a
//! node with a `class_type`, an `inputs` map and optional `_meta`
//! display data:
//!
//! ```json
//! {
//!   "6": {
//!     "class_type": "CLIPTextEncode",
//!     "inputs": { "text": "a red fox", "clip": ["4", 1] },
//!     "_meta": { "title": "CLIP Text Encode (Prompt)" }
//!   }
//! }
//! ```
//!
//! An input whose value is a two-element array `[node_id, slot]` is a
//! reference to another node's output.

use std::fmt;
use std::sync::OnceLock;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Embedded SDXL-Turbo template (1024x576, single step).
const DEFAULT_TEMPLATE_JSON: &str = include_str!("../templates/sdxl_turbo.json");

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// One node of a job template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Input name -> literal value or `[node_id, slot]` reference.
    #[serde(default)]
    pub inputs: IndexMap<String, serde_json::Value>,
    /// Engine node type (e.g. "KSampler", "CLIPTextEncode").
    pub class_type: String,
    /// Display metadata; ignored by the engine.
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl Node {
    pub fn new(class_type: impl Into<String>) -> Self {
        Self {
            inputs: IndexMap::new(),
            class_type: class_type.into(),
            meta: None,
        }
    }

    /// Builder-style helper for tests and programmatic templates.
    pub fn with_input(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.inputs.insert(name.into(), value);
        self
    }

    /// Display title from `_meta.title`, if any.
    pub fn title(&self) -> Option<&str> {
        self.meta.as_ref()?.get("title")?.as_str()
    }

    /// The reference held by input `name`, if that input is a reference.
    pub fn reference(&self, name: &str) -> Option<NodeRef> {
        self.inputs.get(name).and_then(NodeRef::from_value)
    }
}

/// A data-dependency edge target: output `slot` of node `node_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub node_id: String,
    pub slot: u64,
}

impl NodeRef {
    /// Interpret an input value as a reference.
    ///
    /// The engine encodes references as `[source_node_id, output_index]`
    /// where the node ID may be a string or an integer.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        let arr = value.as_array()?;
        if arr.len() != 2 {
            return None;
        }

        let node_id = if let Some(s) = arr[0].as_str() {
            s.to_string()
        } else if let Some(n) = arr[0].as_u64() {
            n.to_string()
        } else {
            return None;
        };

        let slot = arr[1].as_u64()?;

        Some(Self { node_id, slot })
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node_id, self.slot)
    }
}

/// A reference found while walking the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Node holding the reference.
    pub from_node: String,
    /// Input name on `from_node`.
    pub input: String,
    /// Referenced output.
    pub target: NodeRef,
}

/// A job graph: node ID -> node. Cloning is a deep copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobTemplate {
    nodes: IndexMap<String, Node>,
}

// ---------------------------------------------------------------------------
// JobTemplate
// ---------------------------------------------------------------------------

impl JobTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a template from JSON.
    ///
    /// The value must be a non-empty object whose entries are objects with
    /// a string `class_type`. A missing `inputs` field is treated as empty.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, CoreError> {
        let obj = json
            .as_object()
            .ok_or_else(|| CoreError::Validation("Job template must be an object".to_string()))?;

        if obj.is_empty() {
            return Err(CoreError::Validation(
                "Job template must contain at least one node".to_string(),
            ));
        }

        let mut nodes = IndexMap::with_capacity(obj.len());
        for (node_id, node_value) in obj {
            if !node_value.is_object() {
                return Err(CoreError::Validation(format!(
                    "Node '{node_id}' must be an object"
                )));
            }
            if node_value.get("class_type").and_then(|v| v.as_str()).is_none() {
                return Err(CoreError::Validation(format!(
                    "Node '{node_id}' is missing required 'class_type' field"
                )));
            }
            let node: Node = serde_json::from_value(node_value.clone()).map_err(|e| {
                CoreError::Validation(format!("Node '{node_id}' is malformed: {e}"))
            })?;
            nodes.insert(node_id.clone(), node);
        }

        Ok(Self { nodes })
    }

    /// Parse a template from a JSON string.
    pub fn from_json_str(text: &str) -> Result<Self, CoreError> {
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| CoreError::Validation(format!("Job template is not valid JSON: {e}")))?;
        Self::from_json(&json)
    }

    /// Serialize to the JSON shape the engine expects.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn get(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn get_mut(&mut self, node_id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(node_id)
    }

    pub fn insert(&mut self, node_id: impl Into<String>, node: Node) -> Option<Node> {
        self.nodes.insert(node_id.into(), node)
    }

    /// Remove a node, keeping the order of the remaining ones.
    pub fn remove(&mut self, node_id: &str) -> Option<Node> {
        self.nodes.shift_remove(node_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Node)> {
        self.nodes.iter_mut()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Every reference held by every node, in document order.
    pub fn references(&self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for (node_id, node) in &self.nodes {
            for (input, value) in &node.inputs {
                if let Some(target) = NodeRef::from_value(value) {
                    edges.push(Edge {
                        from_node: node_id.clone(),
                        input: input.clone(),
                        target,
                    });
                }
            }
        }
        edges
    }

    /// References whose target node does not exist in this template.
    pub fn dangling_references(&self) -> Vec<Edge> {
        self.references()
            .into_iter()
            .filter(|edge| !self.contains(&edge.target.node_id))
            .collect()
    }
}

/// The built-in SDXL-Turbo template.
///
/// Parsed once and shared read-only; callers work on a `clone()`.
pub fn default_template() -> &'static JobTemplate {
    static TEMPLATE: OnceLock<JobTemplate> = OnceLock::new();
    TEMPLATE.get_or_init(|| {
        JobTemplate::from_json_str(DEFAULT_TEMPLATE_JSON)
            .expect("embedded default template is valid")
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
