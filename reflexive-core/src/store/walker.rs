//! Recursive Model Walker
//!
//! Walks a `Model` depth-first and produces a `Tree` with the same key
//! structure, replacing every leaf with whatever the visitor returns.
//!
//! # Classification
//!
//! A value is an interior node only if it is a `Map` with at least one key.
//! Everything else is a leaf: primitives, arrays (never decomposed
//! element-wise), detached values, empty maps, and the bare values the cell
//! builder later rejects.
//!
//! # Paths
//!
//! Each leaf is visited with its full dot-path: `parent.child.leaf`, no
//! leading dot at the root. The same paths address leaves in `Tree::resolve`,
//! so a key that is empty or contains the separator is rejected while walking.

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::warn;

use super::model::Model;
use super::value::Value;
use crate::error::StoreError;

/// Path separator.
pub const PATH_SEPARATOR: char = '.';

/// Split a dot-path into its segments.
///
/// Returns `None` for an empty path or one with an empty segment.
pub fn split_path(path: &str) -> Option<SmallVec<[&str; 4]>> {
    let segments: SmallVec<[&str; 4]> = path.split(PATH_SEPARATOR).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    Some(segments)
}

/// Whether `key` can appear as one segment of a dot-path.
pub fn is_addressable_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(PATH_SEPARATOR)
}

/// Extend `prefix` with `key`.
pub fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}{PATH_SEPARATOR}{key}")
    }
}

/// A node of a walked tree.
#[derive(Clone, Debug, PartialEq)]
pub enum TreeNode<L> {
    /// A visited leaf.
    Leaf(L),
    /// A walked interior node.
    Node(Tree<L>),
}

impl<L> TreeNode<L> {
    pub fn as_leaf(&self) -> Option<&L> {
        match self {
            TreeNode::Leaf(leaf) => Some(leaf),
            TreeNode::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&Tree<L>> {
        match self {
            TreeNode::Leaf(_) => None,
            TreeNode::Node(tree) => Some(tree),
        }
    }
}

/// A shape-preserving tree of leaves.
#[derive(Clone, Debug, PartialEq)]
pub struct Tree<L> {
    children: IndexMap<String, TreeNode<L>>,
}

impl<L> Default for Tree<L> {
    fn default() -> Self {
        Self {
            children: IndexMap::new(),
        }
    }
}

impl<L> Tree<L> {
    /// Direct child by key.
    pub fn get(&self, key: &str) -> Option<&TreeNode<L>> {
        self.children.get(key)
    }

    /// Follow a dot-path from this node.
    pub fn resolve(&self, path: &str) -> Option<&TreeNode<L>> {
        let segments = split_path(path)?;
        let (last, parents) = segments.split_last()?;

        let mut current = self;
        for segment in parents {
            current = current.get(segment)?.as_node()?;
        }
        current.get(last)
    }

    /// Follow a dot-path and return the leaf there, if it is one.
    pub fn leaf(&self, path: &str) -> Option<&L> {
        self.resolve(path)?.as_leaf()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TreeNode<L>)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Total number of leaves below this node.
    pub fn leaf_count(&self) -> usize {
        self.children
            .values()
            .map(|child| match child {
                TreeNode::Leaf(_) => 1,
                TreeNode::Node(tree) => tree.leaf_count(),
            })
            .sum()
    }

    /// Every leaf with its dot-path, depth-first in key order.
    pub fn leaves(&self) -> Vec<(String, &L)> {
        let mut out = Vec::new();
        self.collect_leaves("", &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a L)>) {
        for (key, child) in &self.children {
            let path = join_path(prefix, key);
            match child {
                TreeNode::Leaf(leaf) => out.push((path, leaf)),
                TreeNode::Node(tree) => tree.collect_leaves(&path, out),
            }
        }
    }
}

/// Walk `model`, replacing every leaf with `visit_leaf(key, value, parent, path)`.
///
/// Stops at the first error; no partial tree is returned. Keys that no
/// dot-path could address fail with `InvalidProps`.
pub fn walk<L, E, F>(model: &Model, visit_leaf: &mut F) -> Result<Tree<L>, E>
where
    E: From<StoreError>,
    F: FnMut(&str, &Value, &Model, &str) -> Result<L, E>,
{
    walk_at(model, visit_leaf, "")
}

fn walk_at<L, E, F>(node: &Model, visit_leaf: &mut F, prefix: &str) -> Result<Tree<L>, E>
where
    E: From<StoreError>,
    F: FnMut(&str, &Value, &Model, &str) -> Result<L, E>,
{
    let mut children = IndexMap::with_capacity(node.len());

    for (key, value) in node {
        if !is_addressable_key(key) {
            warn!(target: "reflexive::store", key = %key, parent = prefix, "key cannot be addressed by a dot-path");
            let parent = if prefix.is_empty() { "the root" } else { prefix };
            return Err(StoreError::invalid_props(format!(
                "key {key:?} under {parent} is empty or contains `{PATH_SEPARATOR}`"
            ))
            .into());
        }
        let path = join_path(prefix, key);
        let child = match value {
            Value::Map(inner) if value.is_interior() => TreeNode::Node(walk_at(inner, visit_leaf, &path)?),
            _ => TreeNode::Leaf(visit_leaf(key, value, node, &path)?),
        };
        children.insert(key.clone(), child);
    }

    Ok(Tree { children })
}
