//! Serialized DOM snapshot trees.
//!
//! Snapshots arrive as JSON produced by the capture driver (rrweb's serialized node format): every
//! node carries a numeric `type`, an optional `attributes` object and an optional `childNodes`
//! list. Only those three fields matter to archiving; everything else on a node (`id`, `tagName`,
//! `textContent`, `isSVG`, ...) is kept verbatim so the replay side sees exactly what was captured.

use crate::error::{Error, ParseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of a serialized snapshot node.
///
/// Unknown numeric kinds are preserved as [`NodeKind::Other`] rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum NodeKind {
  Document,
  DocumentType,
  Element,
  Text,
  CData,
  Comment,
  Other(u8),
}

impl From<u8> for NodeKind {
  fn from(value: u8) -> Self {
    match value {
      0 => NodeKind::Document,
      1 => NodeKind::DocumentType,
      2 => NodeKind::Element,
      3 => NodeKind::Text,
      4 => NodeKind::CData,
      5 => NodeKind::Comment,
      other => NodeKind::Other(other),
    }
  }
}

impl From<NodeKind> for u8 {
  fn from(kind: NodeKind) -> Self {
    match kind {
      NodeKind::Document => 0,
      NodeKind::DocumentType => 1,
      NodeKind::Element => 2,
      NodeKind::Text => 3,
      NodeKind::CData => 4,
      NodeKind::Comment => 5,
      NodeKind::Other(other) => other,
    }
  }
}

/// Value of a serialized attribute.
///
/// The capture format stores most attributes as strings, but boolean attributes and a few
/// numeric ones come through as JSON scalars. Only [`AttributeValue::Text`] can hold a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
  Text(String),
  Number(serde_json::Number),
  Flag(bool),
  Null,
}

impl AttributeValue {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      AttributeValue::Text(value) => Some(value),
      _ => None,
    }
  }
}

impl From<&str> for AttributeValue {
  fn from(value: &str) -> Self {
    AttributeValue::Text(value.to_string())
  }
}

impl From<String> for AttributeValue {
  fn from(value: String) -> Self {
    AttributeValue::Text(value)
  }
}

/// Attribute name to value, as found on element nodes.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// One node of a serialized DOM snapshot.
///
/// `attributes` and `child_nodes` are optional because the capture format omits them on nodes
/// that cannot have them (text, comments); presence is preserved across a parse/serialize cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub kind: Option<NodeKind>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub attributes: Option<Attributes>,
  #[serde(rename = "childNodes", default, skip_serializing_if = "Option::is_none")]
  pub child_nodes: Option<Vec<SnapshotNode>>,
  /// Every other field of the node, untouched.
  #[serde(flatten)]
  pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SnapshotNode {
  pub fn element(attributes: Attributes) -> Self {
    SnapshotNode {
      kind: Some(NodeKind::Element),
      attributes: Some(attributes),
      ..Default::default()
    }
  }

  pub fn with_children(mut self, children: Vec<SnapshotNode>) -> Self {
    self.child_nodes = Some(children);
    self
  }

  pub fn children(&self) -> &[SnapshotNode] {
    self.child_nodes.as_deref().unwrap_or(&[])
  }

  pub fn children_mut(&mut self) -> &mut [SnapshotNode] {
    self.child_nodes.as_deref_mut().unwrap_or(&mut [])
  }

  pub fn get_attribute_ref(&self, name: &str) -> Option<&str> {
    self
      .attributes
      .as_ref()
      .and_then(|attrs| attrs.get(name))
      .and_then(AttributeValue::as_str)
  }

  pub fn is_element(&self) -> bool {
    self.kind == Some(NodeKind::Element)
  }

  pub fn tag_name(&self) -> Option<&str> {
    self.extra.get("tagName").and_then(|v| v.as_str())
  }

  /// Visits every node of the subtree in pre-order.
  ///
  /// Captured pages can nest thousands of levels deep, so the walk keeps its own stack.
  pub fn walk_tree<F>(&self, f: &mut F)
  where
    F: FnMut(&SnapshotNode),
  {
    let mut stack = vec![self];
    while let Some(node) = stack.pop() {
      f(node);
      stack.extend(node.children().iter().rev());
    }
  }

  /// Number of nodes in the subtree rooted here, including this node.
  pub fn node_count(&self) -> usize {
    let mut count = 0;
    self.walk_tree(&mut |_| count += 1);
    count
  }
}

/// Parses raw snapshot bytes into a tree. `name` is only used for error reporting.
///
/// Nesting depth is unbounded: serde_json's recursion limit is lifted and deserialization grows
/// its stack on the heap as it descends.
pub fn parse_snapshot(name: &str, bytes: &[u8]) -> Result<SnapshotNode> {
  let invalid = |e: serde_json::Error| -> Error {
    ParseError::InvalidSnapshot {
      name: name.to_string(),
      message: e.to_string(),
    }
    .into()
  };

  let mut json = serde_json::Deserializer::from_slice(bytes);
  json.disable_recursion_limit();
  let root = SnapshotNode::deserialize(serde_stacker::Deserializer::new(&mut json))
    .map_err(invalid)?;
  json.end().map_err(invalid)?;
  Ok(root)
}

/// Serializes a tree back to compact JSON text.
pub fn serialize_snapshot(root: &SnapshotNode) -> Result<Vec<u8>> {
  Ok(serde_json::to_vec(root)?)
}
