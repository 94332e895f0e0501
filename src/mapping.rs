//! Mapping file loading.
//!
//! A mapping is a JSON object whose keys name destination entries and whose
//! values are either nested objects (categories) or source paths:
//!
//! ```json
//! {
//!   "docs": {
//!     "readme.txt": "/src/readme.txt",
//!     "assets": { "logo.png": "/src/logo.png" }
//!   }
//! }
//! ```

use serde::Deserialize;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::SyncError;

/// A single value in the mapping tree
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Nested category, becomes a subdirectory
    Category(MappingTree),
    /// Source file or directory location
    Source(String),
    /// Any other JSON value; kept so traversal can report it
    Unsupported(serde_json::Value),
}

impl TreeNode {
    /// Short description of the value type, used in log messages
    pub fn kind(&self) -> &'static str {
        match self {
            TreeNode::Category(_) => "mapping",
            TreeNode::Source(_) => "string",
            TreeNode::Unsupported(value) => match value {
                serde_json::Value::Null => "null",
                serde_json::Value::Bool(_) => "boolean",
                serde_json::Value::Number(_) => "number",
                serde_json::Value::Array(_) => "array",
                // Objects and strings always match the earlier variants
                serde_json::Value::String(_) | serde_json::Value::Object(_) => "value",
            },
        }
    }
}

/// Keyed mapping from destination names to tree nodes
///
/// Keys are iterated in sorted order. Duplicate keys in the source document
/// resolve to the last occurrence.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct MappingTree(BTreeMap<String, TreeNode>);

impl MappingTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a mapping from JSON text. The root must be an object.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn insert(&mut self, key: impl Into<String>, node: TreeNode) -> Option<TreeNode> {
        self.0.insert(key.into(), node)
    }

    pub fn get(&self, key: &str) -> Option<&TreeNode> {
        self.0.get(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, TreeNode> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Count leaf entries at every depth
    pub fn leaf_count(&self) -> usize {
        self.0
            .values()
            .map(|node| match node {
                TreeNode::Category(tree) => tree.leaf_count(),
                TreeNode::Source(_) | TreeNode::Unsupported(_) => 1,
            })
            .sum()
    }
}

impl<'a> IntoIterator for &'a MappingTree {
    type Item = (&'a String, &'a TreeNode);
    type IntoIter = btree_map::Iter<'a, String, TreeNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, TreeNode)> for MappingTree {
    fn from_iter<I: IntoIterator<Item = (K, TreeNode)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Load a mapping tree from a JSON file
pub fn load_mapping(path: &Path) -> Result<MappingTree, SyncError> {
    let text = fs::read_to_string(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            return SyncError::ConfigNotFound {
                path: path.to_path_buf(),
            };
        }
        SyncError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        }
    })?;

    MappingTree::from_json_str(&text).map_err(|e| SyncError::ConfigParse {
        path: path.to_path_buf(),
        source: e,
    })
}
