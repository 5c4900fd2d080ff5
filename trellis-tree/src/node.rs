use std::fmt;

/// Handle to a node owned by a [`TreeAdapter`](crate::TreeAdapter).
///
/// It consists of an arena slot index and the generation of the forest the
/// node was built in. [`TreeAdapter::set_items`] starts a new generation, so
/// a handle kept from an earlier forest never aliases a node of the current
/// one; the adapter treats it as unknown.
///
/// A forest holds at most `u32::MAX` nodes; building past that fails with
/// [`TreeError::CapacityExceeded`](crate::TreeError::CapacityExceeded).
///
/// [`TreeAdapter::set_items`]: crate::TreeAdapter::set_items
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self(index, generation)
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.1
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.0, self.1)
    }
}

/// Arena storage for one node.
///
/// `parent` is a lookup-only back reference; the arena owns every slot.
pub(crate) struct NodeSlot<T, K, V> {
    pub(crate) item: T,
    pub(crate) key: K,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) depth: usize,
    pub(crate) open: bool,
    pub(crate) view_model: Option<V>,
}

/// Borrowed, read-only view of a node.
///
/// Two views compare equal when their identity keys, open flags and child
/// counts match, regardless of which arena slot they live in.
pub struct TreeNode<'a, T, K, V> {
    id: NodeId,
    slot: &'a NodeSlot<T, K, V>,
}

impl<'a, T, K, V> TreeNode<'a, T, K, V> {
    pub(crate) fn new(id: NodeId, slot: &'a NodeSlot<T, K, V>) -> Self {
        Self { id, slot }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn item(&self) -> &'a T {
        &self.slot.item
    }

    pub fn key(&self) -> &'a K {
        &self.slot.key
    }

    pub fn is_open(&self) -> bool {
        self.slot.open
    }

    pub fn has_children(&self) -> bool {
        !self.slot.children.is_empty()
    }

    pub fn child_count(&self) -> usize {
        self.slot.children.len()
    }

    /// Direct children in item order, visible or not.
    pub fn children(&self) -> &'a [NodeId] {
        &self.slot.children
    }

    /// Parent node, `None` for top-level nodes.
    pub fn parent(&self) -> Option<NodeId> {
        self.slot.parent
    }

    /// Zero-based depth (`0` for top-level nodes).
    pub fn depth(&self) -> usize {
        self.slot.depth
    }

    /// Cached view model, if one was built already.
    pub fn view_model(&self) -> Option<&'a V> {
        self.slot.view_model.as_ref()
    }
}

impl<T, K, V> Clone for TreeNode<'_, T, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, K, V> Copy for TreeNode<'_, T, K, V> {}

impl<T, K: PartialEq, V> PartialEq for TreeNode<'_, T, K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.slot.open == other.slot.open
            && self.slot.children.len() == other.slot.children.len()
            && self.slot.key == other.slot.key
    }
}

impl<T: fmt::Debug, K, V> fmt::Debug for TreeNode<'_, T, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeNode")
            .field("id", &self.id)
            .field("opened", &self.slot.open)
            .field("children", &self.slot.children.len())
            .field("data", &self.slot.item)
            .finish()
    }
}
