//! Shared types exchanged between the normalizer, the node factory, the
//! sourcing run, and the preview runtime.
//!
//! [`Document`] is what the CMS API returns. [`Node`] is what this crate hands
//! to the build orchestrator: metadata (`id`, `parent`, `children`,
//! `internal`) plus the normalized data flattened next to it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Content-addressed node identifier.
///
/// Always derived from a stable seed by [`crate::node::node_id`], never random,
/// so the same source entity yields the same id in every build and preview.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key marking a JSON object as a reference to another node.
pub const NODE_REF_KEY: &str = "__node";

/// A reference to another node, stored inline in normalized data as
/// `{"__node": "<id>"}`.
///
/// Slice zones normalize to lists of these, document links carry one in their
/// `document` field, and localized images carry one in `localFile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    #[serde(rename = "__node")]
    pub node: NodeId,
}

impl NodeRef {
    pub fn new(node: NodeId) -> Self {
        Self { node }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            NODE_REF_KEY.to_string(),
            Value::String(self.node.as_str().to_string()),
        );
        Value::Object(map)
    }

    /// Recognize a reference object. Objects with any other keys are data, not references.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        if map.len() != 1 {
            return None;
        }
        map.get(NODE_REF_KEY)
            .and_then(Value::as_str)
            .map(|id| Self::new(NodeId::new(id)))
    }
}

/// Orchestrator-facing metadata of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInternal {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(rename = "contentDigest")]
    pub content_digest: String,
}

/// The unit of output handed to the orchestrator's `createNode`.
///
/// `data` is flattened next to the metadata keys when serialized; the node
/// factory guarantees it never contains a reserved key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub children: Vec<NodeId>,
    pub internal: NodeInternal,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Node {
    pub fn type_name(&self) -> &str {
        &self.internal.type_name
    }

    /// The node as one JSON object, the shape a graph query returns it in.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// One content entry as returned by the CMS API.
///
/// Only the keys the pipeline reasons about are typed; everything else
/// (`href`, publication dates, `slugs`, ...) is kept in `extra` and carried
/// through to the document node untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(rename = "type")]
    pub custom_type: String,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub alternate_languages: Vec<Value>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
