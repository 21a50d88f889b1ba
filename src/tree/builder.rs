use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use super::{File, Folder, Node, TreeError};

/// Parsed listing of the vault
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    /// Numeric code sent alongside the status
    pub code: Option<i64>,
    /// Top level nodes, in the order the service returned them
    pub nodes: Vec<Node>,
    /// Nodes that were dropped while building
    pub skipped: Vec<SkippedNode>,
}

/// A node the builder could not turn into a [`Node`]
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedNode {
    /// Names of the enclosing folders, joined by `/`
    pub parent: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    UnknownType(String),
    MissingType,
    Malformed(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::UnknownType(kind) => write!(f, "Unknown type {}", kind),
            SkipReason::MissingType => write!(f, "Missing type"),
            SkipReason::Malformed(reason) => write!(f, "Malformed node: {}", reason),
        }
    }
}

/// Builds the forest from an already normalized (snake_case) response
///
/// Every element of `content` and of each nested `children` array is
/// dispatched on its `type` tag. Unknown tags are skipped and recorded in
/// [`Forest::skipped`], their siblings are still built.
pub fn build_forest(response: &Value) -> Result<Forest, TreeError> {
    let status = response
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| TreeError::MalformedResponse("missing status".to_string()))?;
    if status != "success" {
        return Err(TreeError::ApiStatus {
            status: status.to_string(),
            detail: response.get("content").map(describe).unwrap_or_default(),
        });
    }

    let content = match response.get("content") {
        Some(Value::Array(content)) => content.as_slice(),
        Some(Value::Null) | None => &[],
        Some(other) => {
            return Err(TreeError::MalformedResponse(format!(
                "content is not a list: {}",
                describe(other)
            )));
        }
    };

    let mut builder = Builder::default();
    let nodes = builder.nodes(content, "");
    Ok(Forest {
        code: response.get("code").and_then(Value::as_i64),
        nodes,
        skipped: builder.skipped,
    })
}

#[derive(Default)]
struct Builder {
    skipped: Vec<SkippedNode>,
}

impl Builder {
    fn nodes(&mut self, values: &[Value], parent: &str) -> Vec<Node> {
        values
            .iter()
            .filter_map(|value| self.node(value, parent))
            .collect()
    }

    fn node(&mut self, value: &Value, parent: &str) -> Option<Node> {
        let built = match value.get("type").and_then(Value::as_str) {
            Some("folder") => self.folder(value, parent).map(Node::Folder),
            Some("file") => File::deserialize(value)
                .map(Node::File)
                .map_err(|e| SkipReason::Malformed(e.to_string())),
            Some(other) => Err(SkipReason::UnknownType(other.to_string())),
            None => Err(SkipReason::MissingType),
        };
        match built {
            Ok(node) => {
                trace!("Built {:?} node {:?} in {:?}", kind(&node), node.name(), parent);
                Some(node)
            }
            Err(reason) => {
                self.skipped.push(SkippedNode {
                    parent: parent.to_string(),
                    reason,
                });
                None
            }
        }
    }

    fn folder(&mut self, value: &Value, parent: &str) -> Result<Folder, SkipReason> {
        let mut folder =
            Folder::deserialize(value).map_err(|e| SkipReason::Malformed(e.to_string()))?;
        let trail = if parent.is_empty() {
            folder.name.clone()
        } else {
            format!("{}/{}", parent, folder.name)
        };
        folder.children = match value.get("children") {
            Some(Value::Array(children)) => self.nodes(children, &trail),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(SkipReason::Malformed(format!(
                    "children of \"{}\" is not a list: {}",
                    trail,
                    describe(other)
                )));
            }
        };
        Ok(folder)
    }
}

fn kind(node: &Node) -> &'static str {
    match node {
        Node::Folder(_) => "folder",
        Node::File(_) => "file",
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
