use crate::error::ChemError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

struct Node<T> {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    payload: T,
}

/// An ownership tree: every node has at most one parent and owns its
/// children. Removing a node removes the whole subtree below it.
///
/// Visitors passed to [`CompositeTree::apply`] return `false` to stop the
/// traversal early, in which case `apply` returns `false` as well.
pub struct CompositeTree<T> {
    nodes: Vec<Option<Node<T>>>,
    free: Vec<usize>,
}

/*
 * Constructors
 */
impl<T> CompositeTree<T> {
    pub fn new(root_name: &str, payload: T) -> Self {
        CompositeTree {
            nodes: vec![Some(Node {
                name: root_name.to_string(),
                parent: None,
                children: Vec::new(),
                payload,
            })],
            free: Vec::new(),
        }
    }
}

/*
 * Access to data
 */
impl<T> CompositeTree<T> {
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn node(&self, id: NodeId) -> Result<&Node<T>, ChemError> {
        self.nodes
            .get(id.0)
            .and_then(|node| node.as_ref())
            .ok_or(ChemError::UnknownScope(id.0))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node<T>, ChemError> {
        self.nodes
            .get_mut(id.0)
            .and_then(|node| node.as_mut())
            .ok_or(ChemError::UnknownScope(id.0))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn get(&self, id: NodeId) -> Result<&T, ChemError> {
        Ok(&self.node(id)?.payload)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut T, ChemError> {
        Ok(&mut self.node_mut(id)?.payload)
    }

    pub fn name(&self, id: NodeId) -> Result<&str, ChemError> {
        Ok(&self.node(id)?.name)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, ChemError> {
        Ok(self.node(id)?.parent)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], ChemError> {
        Ok(&self.node(id)?.children)
    }

    pub fn is_root(&self, id: NodeId) -> Result<bool, ChemError> {
        Ok(self.node(id)?.parent.is_none())
    }

    pub fn root_of(&self, id: NodeId) -> Result<NodeId, ChemError> {
        let mut current = id;
        while let Some(parent) = self.node(current)?.parent {
            current = parent;
        }
        Ok(current)
    }

    /// `id` and its ancestors, nearest first.
    pub fn ancestry(&self, id: NodeId) -> Result<Vec<NodeId>, ChemError> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.node(current)?.parent {
            chain.push(parent);
            current = parent;
        }
        Ok(chain)
    }

    /// Depth-first pre-order listing of the subtree rooted at `id`.
    pub fn subtree(&self, id: NodeId) -> Result<Vec<NodeId>, ChemError> {
        self.node(id)?;
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            let node = self.node(current)?;
            stack.extend(node.children.iter().rev().copied());
        }
        Ok(order)
    }

    pub fn number_of_children(&self, id: NodeId) -> Result<usize, ChemError> {
        Ok(self.node(id)?.children.len())
    }

    /// Number of nodes strictly below `id`.
    pub fn count_descendants(&self, id: NodeId) -> Result<usize, ChemError> {
        Ok(self.subtree(id)?.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/*
 * Structure changes
 */
impl<T> CompositeTree<T> {
    pub fn add_child(&mut self, parent: NodeId, name: &str, payload: T) -> Result<NodeId, ChemError> {
        self.node(parent)?;
        let node = Node {
            name: name.to_string(),
            parent: Some(parent),
            children: Vec::new(),
            payload,
        };
        let id = match self.free.pop() {
            Some(index) => {
                self.nodes[index] = Some(node);
                NodeId(index)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        };
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Detaches and drops the subtree rooted at `id`, returning the payloads
    /// in post-order (children before their parent). The root cannot be
    /// removed.
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<Vec<(NodeId, T)>, ChemError> {
        let Some(parent) = self.node(id)?.parent else {
            return Err(ChemError::UnknownScope(id.0));
        };
        let order = self.subtree(id)?;
        self.node_mut(parent)?.children.retain(|&child| child != id);

        let mut removed = Vec::with_capacity(order.len());
        for node_id in order.into_iter().rev() {
            if let Some(node) = self.nodes[node_id.0].take() {
                removed.push((node_id, node.payload));
                self.free.push(node_id.0);
            }
        }
        Ok(removed)
    }

    /// Moves `child` (with its subtree) under `new_parent`. Moving a node
    /// below itself is rejected.
    pub fn transfer_child(&mut self, child: NodeId, new_parent: NodeId) -> Result<(), ChemError> {
        let Some(old_parent) = self.node(child)?.parent else {
            return Err(ChemError::UnknownScope(child.0));
        };
        if self.ancestry(new_parent)?.contains(&child) {
            return Err(ChemError::UnknownScope(new_parent.0));
        }
        self.node_mut(old_parent)?.children.retain(|&c| c != child);
        self.node_mut(new_parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(new_parent);
        Ok(())
    }
}

/*
 * Visiting
 */
impl<T> CompositeTree<T> {
    pub fn apply(
        &self,
        id: NodeId,
        mut visitor: impl FnMut(NodeId, &T) -> bool,
    ) -> Result<bool, ChemError> {
        self.apply_if(id, |_, _| true, &mut visitor)
    }

    /// Like [`CompositeTree::apply`], visiting only the nodes for which
    /// `predicate` holds. Skipped nodes are still descended into.
    pub fn apply_if(
        &self,
        id: NodeId,
        predicate: impl Fn(NodeId, &T) -> bool,
        mut visitor: impl FnMut(NodeId, &T) -> bool,
    ) -> Result<bool, ChemError> {
        for node_id in self.subtree(id)? {
            let payload = &self.node(node_id)?.payload;
            if predicate(node_id, payload) && !visitor(node_id, payload) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| node.as_ref().map(|node| (NodeId(i), &node.payload)))
    }
}
