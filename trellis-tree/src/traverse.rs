use std::collections::VecDeque;

use crate::node::{NodeId, NodeSlot};

/// Depth-first pre-order walk over every built node, open or closed.
pub struct PreOrder<'a, T, K, V> {
    nodes: &'a [NodeSlot<T, K, V>],
    stack: Vec<NodeId>,
}

impl<'a, T, K, V> PreOrder<'a, T, K, V> {
    pub(crate) fn new(
        nodes: &'a [NodeSlot<T, K, V>],
        roots: &[NodeId],
    ) -> Self {
        Self {
            nodes,
            stack: roots.iter().rev().copied().collect(),
        }
    }
}

impl<T, K, V> Iterator for PreOrder<'_, T, K, V> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        if let Some(slot) = self.nodes.get(id.index()) {
            self.stack.extend(slot.children.iter().rev().copied());
        }
        Some(id)
    }
}

/// Level-order walk over every built node, open or closed.
pub struct BreadthFirst<'a, T, K, V> {
    nodes: &'a [NodeSlot<T, K, V>],
    queue: VecDeque<NodeId>,
}

impl<'a, T, K, V> BreadthFirst<'a, T, K, V> {
    pub(crate) fn new(
        nodes: &'a [NodeSlot<T, K, V>],
        roots: &[NodeId],
    ) -> Self {
        Self {
            nodes,
            queue: roots.iter().copied().collect(),
        }
    }
}

impl<T, K, V> Iterator for BreadthFirst<'_, T, K, V> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.queue.pop_front()?;
        if let Some(slot) = self.nodes.get(id.index()) {
            self.queue.extend(slot.children.iter().copied());
        }
        Some(id)
    }
}

/// A node together with its item and view model, as handed to callers that
/// inspect rows without going through [`TreeNode`](crate::TreeNode).
#[derive(Debug)]
pub struct ExtractedData<'a, T, V> {
    pub node: NodeId,
    pub item: &'a T,
    pub view_model: Option<&'a V>,
}

impl<T, V> Clone for ExtractedData<'_, T, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, V> Copy for ExtractedData<'_, T, V> {}
