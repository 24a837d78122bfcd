//! Element hierarchy
//!
//! A single-rooted tree of named nodes stored in a slot map. Each node holds
//! at most one element id and an ordered child list; the parent link is a
//! plain key, so the tree owns no reference cycles.

use std::collections::BTreeMap;
use std::fmt;

use crate::elements::ElementId;
use crate::error::{ModelError, ModelResult};
use crate::foundation::collections::{NodeKey, NodeMap};

/// What happens to the children of a removed node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildPolicy {
    /// Children move up to the removed node's parent, in place
    #[default]
    Reparent,
    /// Children are removed along with the node
    Cascade,
}

/// Single node of the element tree
#[derive(Debug, Clone)]
pub struct TreeNode {
    name: String,
    element: Option<ElementId>,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
}

impl TreeNode {
    /// Node name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element held by this node, `None` for groups and the root
    pub fn element(&self) -> Option<ElementId> {
        self.element
    }

    /// Parent node, `None` for the root
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Ordered children
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// Check if this node has no children
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Spatial hierarchy of elements
#[derive(Debug, Clone)]
pub struct ElementTree {
    nodes: NodeMap<TreeNode>,
    root: NodeKey,
    element_nodes: BTreeMap<ElementId, NodeKey>,
}

impl Default for ElementTree {
    fn default() -> Self {
        Self::new("root")
    }
}

impl ElementTree {
    /// Create a tree holding only a root node
    pub fn new(root_name: impl Into<String>) -> Self {
        let mut nodes = NodeMap::with_key();
        let root = nodes.insert(TreeNode {
            name: root_name.into(),
            element: None,
            parent: None,
            children: Vec::new(),
        });
        Self {
            nodes,
            root,
            element_nodes: BTreeMap::new(),
        }
    }

    /// Root node key
    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Node by key
    pub fn node(&self, key: NodeKey) -> Option<&TreeNode> {
        self.nodes.get(key)
    }

    /// Check if a node exists
    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Total number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree holds only its root
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Rename a node
    pub fn rename(&mut self, key: NodeKey, name: impl Into<String>) -> ModelResult<()> {
        let node = self
            .nodes
            .get_mut(key)
            .ok_or_else(|| ModelError::Lookup(format!("tree node {key:?} does not exist")))?;
        node.name = name.into();
        Ok(())
    }

    /// Node holding an element
    pub fn find_element(&self, id: ElementId) -> Option<NodeKey> {
        self.element_nodes.get(&id).copied()
    }

    fn require(&self, key: NodeKey) -> ModelResult<&TreeNode> {
        self.nodes
            .get(key)
            .ok_or_else(|| ModelError::Lookup(format!("tree node {key:?} does not exist")))
    }

    /// Append a node under `parent`
    ///
    /// An element may appear under only one parent; adding it twice is a structural error.
    pub fn add_node(
        &mut self,
        parent: NodeKey,
        name: impl Into<String>,
        element: Option<ElementId>,
    ) -> ModelResult<NodeKey> {
        self.require(parent)?;
        if let Some(id) = element {
            if self.element_nodes.contains_key(&id) {
                return Err(ModelError::Structural(format!("element {id} already has a tree node")));
            }
        }
        let key = self.nodes.insert(TreeNode {
            name: name.into(),
            element,
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(key);
        }
        if let Some(id) = element {
            self.element_nodes.insert(id, key);
        }
        Ok(key)
    }

    /// Append an element-less group node under `parent`
    pub fn add_group(&mut self, parent: NodeKey, name: impl Into<String>) -> ModelResult<NodeKey> {
        self.add_node(parent, name, None)
    }

    /// Move `node` (with its subtree) to the end of `new_parent`'s children
    pub fn move_node(&mut self, node: NodeKey, new_parent: NodeKey) -> ModelResult<()> {
        self.require(node)?;
        self.require(new_parent)?;
        if node == self.root {
            return Err(ModelError::Structural("the root node cannot be moved".to_string()));
        }
        if node == new_parent || self.ancestors(new_parent).contains(&node) {
            return Err(ModelError::Structural(
                "moving a node below itself would create a cycle".to_string(),
            ));
        }

        if let Some(old_parent) = self.nodes.get(node).and_then(TreeNode::parent) {
            if let Some(parent) = self.nodes.get_mut(old_parent) {
                parent.children.retain(|&k| k != node);
            }
        }
        if let Some(parent) = self.nodes.get_mut(new_parent) {
            parent.children.push(node);
        }
        if let Some(n) = self.nodes.get_mut(node) {
            n.parent = Some(new_parent);
        }
        Ok(())
    }

    /// Remove a node, returning the elements whose nodes were removed
    pub fn remove_node(&mut self, node: NodeKey, policy: ChildPolicy) -> ModelResult<Vec<ElementId>> {
        self.require(node)?;
        if node == self.root {
            return Err(ModelError::Structural("the root node cannot be removed".to_string()));
        }

        let doomed: Vec<NodeKey> = match policy {
            ChildPolicy::Cascade => std::iter::once(node).chain(self.descendants(node)).collect(),
            ChildPolicy::Reparent => vec![node],
        };

        let Some(removed) = self.nodes.get(node).cloned() else {
            return Ok(Vec::new());
        };
        if let Some(parent_key) = removed.parent {
            let orphans = match policy {
                ChildPolicy::Reparent => removed.children.clone(),
                ChildPolicy::Cascade => Vec::new(),
            };
            for &child in &orphans {
                if let Some(c) = self.nodes.get_mut(child) {
                    c.parent = Some(parent_key);
                }
            }
            if let Some(parent) = self.nodes.get_mut(parent_key) {
                if let Some(position) = parent.children.iter().position(|&k| k == node) {
                    parent.children.splice(position..=position, orphans);
                }
            }
        }

        let mut elements = Vec::new();
        for key in doomed {
            if let Some(n) = self.nodes.remove(key) {
                if let Some(id) = n.element {
                    self.element_nodes.remove(&id);
                    elements.push(id);
                }
            }
        }
        Ok(elements)
    }

    /// Ancestors of a node, nearest first, ending at the root
    pub fn ancestors(&self, node: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut current = self.nodes.get(node).and_then(TreeNode::parent);
        while let Some(key) = current {
            out.push(key);
            current = self.nodes.get(key).and_then(TreeNode::parent);
        }
        out
    }

    /// All nodes below `node` in depth-first pre-order, `node` excluded
    pub fn descendants(&self, node: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeKey> = self
            .nodes
            .get(node)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(key) = stack.pop() {
            out.push(key);
            if let Some(n) = self.nodes.get(key) {
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }

    /// Every node in depth-first pre-order starting at the root
    pub fn depth_first(&self) -> Vec<NodeKey> {
        std::iter::once(self.root).chain(self.descendants(self.root)).collect()
    }

    /// Element ids in depth-first order
    pub fn elements(&self) -> Vec<ElementId> {
        self.depth_first()
            .into_iter()
            .filter_map(|key| self.nodes.get(key).and_then(TreeNode::element))
            .collect()
    }

    fn write_node(&self, f: &mut fmt::Formatter<'_>, key: NodeKey, depth: usize) -> fmt::Result {
        let Some(node) = self.nodes.get(key) else {
            return Ok(());
        };
        match node.element {
            Some(id) => writeln!(f, "{}{} [{}]", "  ".repeat(depth), node.name, id)?,
            None => writeln!(f, "{}{}", "  ".repeat(depth), node.name)?,
        }
        for &child in &node.children {
            self.write_node(f, child, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for ElementTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_node(f, self.root, 0)
    }
}
