use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Range;

use crate::error::{Result, TreeError};
use crate::extractor::{DataExtractor, ItemMatch, Structural, ViewModelFactory};
use crate::node::{NodeId, NodeSlot, TreeNode};
use crate::observer::TreeObserver;
use crate::traverse::{BreadthFirst, ExtractedData, PreOrder};

type Slot<T, X, V> = NodeSlot<T, <X as DataExtractor<T>>::Key, V>;

/// Flattened, position-addressable projection of a forest of items.
///
/// The adapter owns every node. Top-level nodes are always visible; the
/// children of a node are visible only while the node and all of its
/// ancestors are open. Opening and closing splice rows in and out of the
/// flattened list and report the exact affected range to the installed
/// [`TreeObserver`].
///
/// `Q` decides how item-based lookups ([`open`](Self::open),
/// [`close`](Self::close), [`is_expanded`](Self::is_expanded),
/// [`find_node_for_item`](Self::find_node_for_item)) match items. The
/// default, [`Structural`], compares with `PartialEq`; pick
/// [`NaturalOrder`](crate::NaturalOrder) to match by `Ord` instead, which
/// prefers the natural ordering whenever the item type has one.
///
/// The adapter performs no internal locking: mutate it from one thread at a
/// time.
pub struct TreeAdapter<T, X, V, Q = Structural>
where
    X: DataExtractor<T>,
{
    extractor: X,
    factory: Option<Box<dyn ViewModelFactory<T, V> + Send>>,
    observer: Box<dyn TreeObserver + Send>,
    nodes: Vec<Slot<T, X, V>>,
    tree: Vec<NodeId>,
    flattened: Vec<NodeId>,
    generation: u32,
    matcher: PhantomData<fn() -> Q>,
}

impl<T, X, V, Q> TreeAdapter<T, X, V, Q>
where
    X: DataExtractor<T>,
{
    /// Create an empty adapter without a view model factory.
    ///
    /// A factory must be installed with
    /// [`set_view_model_factory`](Self::set_view_model_factory) before any
    /// item is added.
    pub fn new(extractor: X) -> Self {
        Self {
            extractor,
            factory: None,
            observer: Box::new(()),
            nodes: Vec::new(),
            tree: Vec::new(),
            flattened: Vec::new(),
            generation: 0,
            matcher: PhantomData,
        }
    }

    /// Create an empty adapter with its view model factory.
    pub fn with_factory<F>(extractor: X, factory: F) -> Self
    where
        F: ViewModelFactory<T, V> + Send + 'static,
    {
        let mut adapter = Self::new(extractor);
        adapter.factory = Some(Box::new(factory));
        adapter
    }

    /// Install the observer notified about row changes.
    pub fn with_observer<O>(mut self, observer: O) -> Self
    where
        O: TreeObserver + Send + 'static,
    {
        self.observer = Box::new(observer);
        self
    }

    /// Replace the observer notified about row changes.
    pub fn set_observer<O>(&mut self, observer: O)
    where
        O: TreeObserver + Send + 'static,
    {
        self.observer = Box::new(observer);
    }

    /// Install or swap the view model factory.
    ///
    /// Every cached view model in the tree is dropped, visible or not, and a
    /// full reset is reported.
    pub fn set_view_model_factory<F>(&mut self, factory: F)
    where
        F: ViewModelFactory<T, V> + Send + 'static,
    {
        self.factory = Some(Box::new(factory));
        for slot in &mut self.nodes {
            slot.view_model = None;
        }
        log::debug!(
            "view model factory replaced, {} cached view models dropped",
            self.nodes.len()
        );
        self.observer.on_reset();
    }

    // --- Structure ---

    /// Replace the whole forest with `items`, all closed, and report a full
    /// reset.
    pub fn set_items<I>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        self.ensure_factory()?;

        self.nodes.clear();
        self.tree.clear();
        self.flattened.clear();
        self.generation = self.generation.wrapping_add(1);

        self.insert_top_level(items)?;
        log::debug!(
            "tree reset: {} top-level nodes, {} nodes built",
            self.tree.len(),
            self.nodes.len()
        );
        self.observer.on_reset();
        Ok(())
    }

    /// Append `items` as new top-level nodes.
    ///
    /// Each item's whole subtree is built right away. New nodes start
    /// closed, so they are appended at the end of the flattened rows and
    /// never interleave with visible descendants of earlier nodes. Returns
    /// the row range the new nodes occupy.
    pub fn add_items<I>(
        &mut self,
        items: I,
        notify: bool,
    ) -> Result<Range<usize>>
    where
        I: IntoIterator<Item = T>,
    {
        self.ensure_factory()?;

        let inserted = self.insert_top_level(items)?;
        if notify && !inserted.is_empty() {
            self.observer.on_range_inserted(inserted.start, inserted.len());
        }
        Ok(inserted)
    }

    fn ensure_factory(&self) -> Result<()> {
        if self.factory.is_none() {
            return Err(TreeError::MissingFactory);
        }
        Ok(())
    }

    fn insert_top_level<I>(&mut self, items: I) -> Result<Range<usize>>
    where
        I: IntoIterator<Item = T>,
    {
        let first = self.flattened.len();
        for item in items {
            let id = self.build_subtree(item)?;
            self.tree.push(id);
            self.flattened.push(id);
        }
        Ok(first..self.flattened.len())
    }

    /// Build `item` and all of its descendants in pre-order, returning the
    /// id of the subtree root.
    fn build_subtree(&mut self, item: T) -> Result<NodeId> {
        // The first node popped is the subtree root.
        let root = self.next_id()?;
        let mut pending = vec![(item, None, 0)];

        while let Some((item, parent, depth)) = pending.pop() {
            let id = self.next_id()?;
            let key = self.extractor.identity_key(&item);
            let children = self.extractor.children(&item);

            self.nodes.push(NodeSlot {
                item,
                key,
                parent,
                children: Vec::with_capacity(children.len()),
                depth,
                open: false,
                view_model: None,
            });
            if let Some(parent) = parent {
                self.nodes[parent.index()].children.push(id);
            }

            pending.extend(
                children
                    .into_iter()
                    .rev()
                    .map(|child| (child, Some(id), depth + 1)),
            );
        }

        Ok(root)
    }

    fn next_id(&self) -> Result<NodeId> {
        let index = u32::try_from(self.nodes.len())
            .map_err(|_| TreeError::CapacityExceeded)?;
        Ok(NodeId::new(index, self.generation))
    }

    // --- Rows ---

    /// Number of visible rows.
    pub fn item_count(&self) -> usize {
        self.flattened.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flattened.is_empty()
    }

    /// View model of the row at `position`, built on first access.
    pub fn view_model_at(&mut self, position: usize) -> Option<&V> {
        let id = *self.flattened.get(position)?;
        self.ensure_view_model(id)
    }

    /// Node shown at row `position`.
    pub fn node_at(
        &self,
        position: usize,
    ) -> Option<TreeNode<'_, T, X::Key, V>> {
        let id = *self.flattened.get(position)?;
        self.node(id)
    }

    /// Node, item and view model of the row at `position`.
    ///
    /// With `no_create` the view model is only reported when it is already
    /// cached.
    pub fn extract_data_at(
        &mut self,
        position: usize,
        no_create: bool,
    ) -> Option<ExtractedData<'_, T, V>> {
        let id = *self.flattened.get(position)?;
        if !no_create {
            let _ = self.ensure_view_model(id);
        }
        Some(self.extracted(id))
    }

    fn ensure_view_model(&mut self, id: NodeId) -> Option<&V> {
        let factory = self.factory.as_deref()?;
        let slot = self.nodes.get_mut(id.index())?;
        if slot.view_model.is_none() {
            slot.view_model = Some(factory.create_view_model(&slot.item));
        }
        slot.view_model.as_ref()
    }

    fn extracted(&self, id: NodeId) -> ExtractedData<'_, T, V> {
        let slot = &self.nodes[id.index()];
        ExtractedData {
            node: id,
            item: &slot.item,
            view_model: slot.view_model.as_ref(),
        }
    }

    // --- Nodes ---

    /// Read-only view of a node, `None` for handles from an earlier forest.
    pub fn node(&self, id: NodeId) -> Option<TreeNode<'_, T, X::Key, V>> {
        self.slot(id).map(|slot| TreeNode::new(id, slot))
    }

    fn slot(&self, id: NodeId) -> Option<&Slot<T, X, V>> {
        if id.generation() != self.generation {
            return None;
        }
        self.nodes.get(id.index())
    }

    /// Top-level nodes in insertion order.
    pub fn top_level_nodes(&self) -> &[NodeId] {
        &self.tree
    }

    /// Visible nodes in row order.
    pub fn flattened_nodes(&self) -> &[NodeId] {
        &self.flattened
    }

    pub fn top_level_items(&self) -> impl Iterator<Item = &T> + '_ {
        self.tree.iter().map(|id| &self.nodes[id.index()].item)
    }

    pub fn flattened_items(&self) -> impl Iterator<Item = &T> + '_ {
        self.flattened.iter().map(|id| &self.nodes[id.index()].item)
    }

    /// Top-most ancestor of `id` (itself for top-level nodes).
    pub fn root(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        let mut slot = self.slot(id)?;
        while let Some(parent) = slot.parent {
            current = parent;
            slot = &self.nodes[parent.index()];
        }
        Some(current)
    }

    /// Whether `ancestor` sits on the parent chain of `other`.
    ///
    /// With `find_closed == false` the walk stops at the first closed
    /// ancestor, so only ancestors through which `other` could be visible
    /// are considered.
    pub fn is_child(
        &self,
        ancestor: NodeId,
        other: NodeId,
        find_closed: bool,
    ) -> bool {
        let mut parent = self.slot(other).and_then(|slot| slot.parent);
        while let Some(current) = parent {
            let slot = &self.nodes[current.index()];
            if !find_closed && !slot.open {
                break;
            }
            if current == ancestor {
                return true;
            }
            parent = slot.parent;
        }
        false
    }

    /// Nearest node found on both ancestor chains, each chain starting at
    /// the node itself.
    ///
    /// Both chains are climbed one step at a time, remembering what each
    /// side visited, so the search also works for nodes at different
    /// depths. Nodes under different top-level nodes have no common parent.
    pub fn common_parent(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let mut a_seen = HashSet::new();
        let mut b_seen = HashSet::new();
        let mut a_cursor = self.slot(a).map(|_| a);
        let mut b_cursor = self.slot(b).map(|_| b);

        loop {
            if a_cursor.is_none() && b_cursor.is_none() {
                return None;
            }
            if a_cursor.is_some() && a_cursor == b_cursor {
                return a_cursor;
            }
            if let Some(node) = a_cursor {
                if b_seen.contains(&node) {
                    return Some(node);
                }
                a_seen.insert(node);
            }
            if let Some(node) = b_cursor {
                if a_seen.contains(&node) {
                    return Some(node);
                }
                b_seen.insert(node);
            }
            a_cursor = a_cursor.and_then(|node| self.parent_of(node));
            b_cursor = b_cursor.and_then(|node| self.parent_of(node));
        }
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].parent
    }

    // --- Traversal ---

    /// Every built node in depth-first pre-order, open or closed.
    pub fn pre_order(&self) -> PreOrder<'_, T, X::Key, V> {
        PreOrder::new(&self.nodes, &self.tree)
    }

    /// Every node of the subtree rooted at `from` (or of the whole forest
    /// for `None`) in level order, open or closed. Unknown handles yield
    /// nothing.
    pub fn breadth_first(
        &self,
        from: Option<NodeId>,
    ) -> BreadthFirst<'_, T, X::Key, V> {
        match from {
            None => BreadthFirst::new(&self.nodes, &self.tree),
            Some(id) if self.slot(id).is_some() => {
                BreadthFirst::new(&self.nodes, &[id])
            },
            Some(_) => BreadthFirst::new(&self.nodes, &[]),
        }
    }

    /// Like [`breadth_first`](Self::breadth_first), paired with each node's
    /// item and cached view model. View models are not built.
    pub fn breadth_first_extracted(
        &self,
        from: Option<NodeId>,
    ) -> impl Iterator<Item = ExtractedData<'_, T, V>> + '_ {
        self.breadth_first(from).map(|id| self.extracted(id))
    }

    // --- Open / close ---

    /// Open the node at row `position`. Returns `false` when the row does
    /// not exist, the node is already open or it has no children.
    pub fn open_at(&mut self, position: usize, notify: bool) -> bool {
        match self.flattened.get(position) {
            Some(&id) => self.open_visible(id, position, notify),
            None => false,
        }
    }

    /// Close the node at row `position`. Returns `false` when the row does
    /// not exist or the node is already closed.
    pub fn close_at(&mut self, position: usize, notify: bool) -> bool {
        match self.flattened.get(position) {
            Some(&id) => self.close_visible(id, position, notify),
            None => false,
        }
    }

    /// Open `node` if it is currently visible.
    pub fn open_node(&mut self, node: NodeId, notify: bool) -> bool {
        match self.row_of(node) {
            Some(position) => self.open_visible(node, position, notify),
            None => false,
        }
    }

    /// Close `node` if it is currently visible.
    pub fn close_node(&mut self, node: NodeId, notify: bool) -> bool {
        match self.row_of(node) {
            Some(position) => self.close_visible(node, position, notify),
            None => false,
        }
    }

    /// Close every direct child of `node`. Returns `true` if any closed.
    pub fn close_children(&mut self, node: NodeId, notify: bool) -> bool {
        let Some(slot) = self.slot(node) else {
            return false;
        };

        let children = slot.children.clone();

        let mut closed = false;
        for child in children {
            closed |= self.close_node(child, notify);
        }
        closed
    }

    /// Open every node from `ancestor` down to `target`, inclusive, so that
    /// `target` becomes visible.
    ///
    /// `ancestor` must be a strict ancestor of `target`. Returns `true` only
    /// if every node on the path ended up open; a leaf `target` cannot be
    /// opened, so the result is `false` even though the leaf is now visible.
    pub fn open_to_child(
        &mut self,
        ancestor: NodeId,
        target: NodeId,
        notify: bool,
    ) -> Result<bool> {
        if self.slot(ancestor).is_none() {
            return Err(TreeError::StaleNode(ancestor));
        }
        let Some(target_slot) = self.slot(target) else {
            return Err(TreeError::StaleNode(target));
        };

        let mut path = vec![target];
        let mut cursor = target_slot.parent;
        loop {
            match cursor {
                Some(node) if node == ancestor => {
                    path.push(node);
                    break;
                },
                Some(node) => {
                    path.push(node);
                    cursor = self.nodes[node.index()].parent;
                },
                None => {
                    return Err(TreeError::NotAnAncestor {
                        ancestor,
                        descendant: target,
                    });
                },
            }
        }

        let mut all_opened = true;
        for &node in path.iter().rev() {
            // Already-open nodes report `false`, so read the flag instead.
            let _ = self.open_node(node, notify);
            all_opened &= self.nodes[node.index()].open;
        }
        Ok(all_opened)
    }

    fn row_of(&self, node: NodeId) -> Option<usize> {
        self.flattened.iter().position(|&id| id == node)
    }

    fn open_visible(
        &mut self,
        id: NodeId,
        position: usize,
        notify: bool,
    ) -> bool {
        let slot = &mut self.nodes[id.index()];
        if slot.open || slot.children.is_empty() {
            return false;
        }

        slot.open = true;
        let start = position + 1;
        let count = slot.children.len();
        let _ = self
            .flattened
            .splice(start..start, slot.children.iter().copied());

        log::trace!("opened node {id} at row {position}: +{count} rows");
        if notify {
            self.observer.on_range_inserted(start, count);
        }
        true
    }

    fn close_visible(
        &mut self,
        id: NodeId,
        position: usize,
        notify: bool,
    ) -> bool {
        if !self.nodes[id.index()].open {
            return false;
        }

        let count = self.contributing_count(id);
        let start = position + 1;
        for removed in self.flattened.drain(start..start + count) {
            self.nodes[removed.index()].open = false;
        }
        self.nodes[id.index()].open = false;

        log::trace!("closed node {id} at row {position}: -{count} rows");
        if notify {
            self.observer.on_range_removed(start, count);
        }
        true
    }

    /// Number of rows currently shown below `id`: its children plus, for
    /// each open child, that child's own contributing rows.
    fn contributing_count(&self, id: NodeId) -> usize {
        let mut count = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = &self.nodes[current.index()];
            if slot.open {
                count += slot.children.len();
                stack.extend(slot.children.iter().copied());
            }
        }
        count
    }
}

impl<T, X, V, Q> TreeAdapter<T, X, V, Q>
where
    X: DataExtractor<T>,
    Q: ItemMatch<T>,
{
    /// Open the first visible row whose item matches `item`.
    pub fn open(&mut self, item: &T, notify: bool) -> bool {
        match self.row_of_item(item) {
            Some(position) => self.open_at(position, notify),
            None => false,
        }
    }

    /// Close the first visible row whose item matches `item`.
    pub fn close(&mut self, item: &T, notify: bool) -> bool {
        match self.row_of_item(item) {
            Some(position) => self.close_at(position, notify),
            None => false,
        }
    }

    /// Open flag of the first visible row matching `item`; `false` when no
    /// visible row matches.
    pub fn is_expanded(&self, item: &T) -> bool {
        self.row_of_item(item).is_some_and(|position| {
            self.nodes[self.flattened[position].index()].open
        })
    }

    /// First node, in level order over the whole forest, whose item matches
    /// `item`.
    pub fn find_node_for_item(&self, item: &T) -> Option<NodeId> {
        self.breadth_first(None)
            .find(|id| Q::same_item(&self.nodes[id.index()].item, item))
    }

    fn row_of_item(&self, item: &T) -> Option<usize> {
        self.flattened
            .iter()
            .position(|id| Q::same_item(&self.nodes[id.index()].item, item))
    }
}

impl<T, X, V, Q> fmt::Debug for TreeAdapter<T, X, V, Q>
where
    X: DataExtractor<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeAdapter")
            .field("nodes", &self.nodes.len())
            .field("top_level", &self.tree.len())
            .field("rows", &self.flattened.len())
            .field("generation", &self.generation)
            .field("has_factory", &self.factory.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{ChangeLog, TreeChange};

    #[derive(Clone, Debug, PartialEq)]
    struct Item {
        name: &'static str,
        children: Vec<Item>,
    }

    fn leaf(name: &'static str) -> Item {
        Item {
            name,
            children: Vec::new(),
        }
    }

    fn branch(name: &'static str, children: Vec<Item>) -> Item {
        Item { name, children }
    }

    struct Items;

    impl DataExtractor<Item> for Items {
        type Key = &'static str;

        fn identity_key(&self, item: &Item) -> Self::Key {
            item.name
        }

        fn children(&self, item: &Item) -> Vec<Item> {
            item.children.clone()
        }
    }

    type TestAdapter = TreeAdapter<Item, Items, String>;

    fn adapter() -> (TestAdapter, ChangeLog) {
        let log = ChangeLog::new();
        let adapter =
            TestAdapter::with_factory(Items, |item: &Item| item.name.to_owned())
                .with_observer(log.clone());
        (adapter, log)
    }

    /// R { A { A1 }, B }
    fn scenario_root() -> Item {
        branch("R", vec![branch("A", vec![leaf("A1")]), leaf("B")])
    }

    fn rows(adapter: &TestAdapter) -> Vec<&'static str> {
        adapter.flattened_items().map(|item| item.name).collect()
    }

    fn id_of(adapter: &TestAdapter, name: &'static str) -> NodeId {
        adapter
            .pre_order()
            .find(|id| {
                adapter.node(*id).map(|node| node.item().name) == Some(name)
            })
            .expect("node exists")
    }

    /// Rows recomputed from scratch: a node is visible when every ancestor
    /// is open.
    fn expected_rows(adapter: &TestAdapter) -> Vec<NodeId> {
        adapter
            .pre_order()
            .filter(|id| {
                let mut parent = adapter.node(*id).and_then(|n| n.parent());
                while let Some(current) = parent {
                    let node = adapter.node(current).expect("live parent");
                    if !node.is_open() {
                        return false;
                    }
                    parent = node.parent();
                }
                true
            })
            .collect()
    }

    fn assert_consistent(adapter: &TestAdapter) {
        assert_eq!(adapter.flattened_nodes(), expected_rows(adapter));
        for id in adapter.pre_order() {
            let node = adapter.node(id).expect("live node");
            assert!(
                !node.is_open() || node.has_children(),
                "childless node {id} is open"
            );
        }
    }

    #[test]
    fn given_nested_tree_when_opened_and_closed_then_ranges_are_reported() {
        let (mut adapter, log) = adapter();
        let root = scenario_root();

        adapter.set_items(vec![root.clone()]).expect("factory installed");
        assert_eq!(rows(&adapter), vec!["R"]);
        assert_eq!(log.take(), vec![TreeChange::Reset]);

        assert!(adapter.open(&root, true));
        assert_eq!(rows(&adapter), vec!["R", "A", "B"]);
        assert_eq!(
            log.take(),
            vec![TreeChange::Inserted { start: 1, count: 2 }]
        );

        assert!(adapter.open(&root.children[0], true));
        assert_eq!(rows(&adapter), vec!["R", "A", "A1", "B"]);
        assert_eq!(
            log.take(),
            vec![TreeChange::Inserted { start: 2, count: 1 }]
        );

        assert!(adapter.close(&root, true));
        assert_eq!(rows(&adapter), vec!["R"]);
        assert_eq!(log.take(), vec![TreeChange::Removed { start: 1, count: 3 }]);

        let a = adapter.node(id_of(&adapter, "A")).expect("A exists");
        let a1 = adapter.node(id_of(&adapter, "A1")).expect("A1 exists");
        assert!(!a.is_open());
        assert!(!a1.is_open());
        assert_consistent(&adapter);
    }

    #[test]
    fn given_open_node_when_closed_twice_then_second_close_is_noop() {
        let (mut adapter, log) = adapter();
        let root = scenario_root();
        adapter.set_items(vec![root.clone()]).expect("factory installed");

        assert!(adapter.open(&root, false));
        assert!(!adapter.open(&root, false));
        assert!(adapter.close(&root, false));
        assert!(!adapter.close(&root, false));
        assert_eq!(log.take(), vec![TreeChange::Reset]);
    }

    #[test]
    fn given_rows_when_opened_then_closed_then_rows_are_restored() {
        let (mut adapter, _log) = adapter();
        let second = branch("S", vec![leaf("S1"), leaf("S2")]);
        adapter
            .set_items(vec![scenario_root(), second])
            .expect("factory installed");
        assert!(adapter.open_at(0, true));
        let before = adapter.flattened_nodes().to_vec();

        assert!(adapter.open_at(1, true));
        assert!(adapter.close_at(1, true));

        assert_eq!(adapter.flattened_nodes(), before.as_slice());
        assert_consistent(&adapter);
    }

    #[test]
    fn given_open_subtree_when_closed_then_one_contiguous_range_is_removed() {
        let (mut adapter, log) = adapter();
        let wide = branch(
            "W",
            vec![
                branch("X", vec![leaf("X1"), branch("X2", vec![leaf("X2a")])]),
                leaf("Y"),
            ],
        );
        adapter
            .set_items(vec![leaf("top"), wide])
            .expect("factory installed");
        assert!(adapter.open_at(1, false));
        assert!(adapter.open_at(2, false));
        assert!(adapter.open_at(4, false));
        assert_eq!(
            rows(&adapter),
            vec!["top", "W", "X", "X1", "X2", "X2a", "Y"]
        );
        let len_before = adapter.item_count();

        let _ = log.take();

        assert!(adapter.close_at(2, true));

        assert_eq!(adapter.item_count(), len_before - 3);
        assert_eq!(rows(&adapter), vec!["top", "W", "X", "Y"]);
        assert_eq!(
            log.take(),
            vec![TreeChange::Removed { start: 3, count: 3 }]
        );
        assert_consistent(&adapter);
    }

    #[test]
    fn given_leaf_or_missing_row_when_opened_then_returns_false() {
        let (mut adapter, log) = adapter();
        adapter
            .set_items(vec![leaf("only")])
            .expect("factory installed");
        let _ = log.take();

        assert!(!adapter.open_at(0, true));
        assert!(!adapter.open_at(5, true));
        assert!(!adapter.close_at(5, true));
        assert!(!adapter.open(&leaf("missing"), true));
        assert!(log.take().is_empty());
    }

    #[test]
    fn given_no_factory_when_setting_items_then_configuration_error() {
        let mut adapter = TestAdapter::new(Items);

        assert_eq!(
            adapter.set_items(vec![leaf("a")]),
            Err(TreeError::MissingFactory)
        );
        assert_eq!(
            adapter.add_items(vec![leaf("a")], true),
            Err(TreeError::MissingFactory)
        );
        assert!(adapter.is_empty());
    }

    #[test]
    fn given_open_tree_when_items_added_then_appended_after_last_row() {
        let (mut adapter, log) = adapter();
        let root = scenario_root();
        adapter.set_items(vec![root.clone()]).expect("factory installed");
        assert!(adapter.open(&root, false));
        let _ = log.take();

        let inserted = adapter
            .add_items(vec![leaf("C"), branch("D", vec![leaf("D1")])], true)
            .expect("factory installed");

        assert_eq!(inserted, 3..5);
        assert_eq!(rows(&adapter), vec!["R", "A", "B", "C", "D"]);
        assert_eq!(
            log.take(),
            vec![TreeChange::Inserted { start: 3, count: 2 }]
        );
        let top: Vec<_> =
            adapter.top_level_items().map(|item| item.name).collect();
        assert_eq!(top, vec!["R", "C", "D"]);
    }

    #[test]
    fn given_deep_target_when_open_to_child_then_whole_path_is_expanded() {
        let (mut adapter, _log) = adapter();
        let root = branch(
            "R",
            vec![
                leaf("R0"),
                branch("A", vec![branch("A1", vec![leaf("A1x")])]),
            ],
        );
        adapter.set_items(vec![root.clone()]).expect("factory installed");
        let r = id_of(&adapter, "R");
        let a1 = id_of(&adapter, "A1");

        assert_eq!(adapter.open_to_child(r, a1, true), Ok(true));

        assert!(adapter.is_expanded(&root));
        assert!(adapter.is_expanded(&root.children[1]));
        assert!(adapter.is_expanded(&root.children[1].children[0]));
        assert_eq!(rows(&adapter), vec!["R", "R0", "A", "A1", "A1x"]);
        assert_consistent(&adapter);
    }

    #[test]
    fn given_leaf_target_when_open_to_child_then_visible_but_not_all_open() {
        let (mut adapter, _log) = adapter();
        adapter
            .set_items(vec![scenario_root()])
            .expect("factory installed");
        let r = id_of(&adapter, "R");
        let a1 = id_of(&adapter, "A1");

        assert_eq!(adapter.open_to_child(r, a1, true), Ok(false));
        assert_eq!(rows(&adapter), vec!["R", "A", "A1", "B"]);
    }

    #[test]
    fn given_non_descendant_when_open_to_child_then_invalid_argument() {
        let (mut adapter, _log) = adapter();
        adapter
            .set_items(vec![scenario_root(), leaf("other")])
            .expect("factory installed");
        let a = id_of(&adapter, "A");
        let b = id_of(&adapter, "B");
        let other = id_of(&adapter, "other");

        assert_eq!(
            adapter.open_to_child(a, b, true),
            Err(TreeError::NotAnAncestor {
                ancestor: a,
                descendant: b
            })
        );
        assert_eq!(
            adapter.open_to_child(a, a, true),
            Err(TreeError::NotAnAncestor {
                ancestor: a,
                descendant: a
            })
        );
        assert!(adapter.open_to_child(other, b, true).is_err());
        assert_eq!(rows(&adapter), vec!["R", "other"]);
    }

    #[test]
    fn given_nodes_when_common_parent_then_nearest_shared_ancestor() {
        let (mut adapter, _log) = adapter();
        adapter
            .set_items(vec![scenario_root(), branch("T", vec![leaf("T1")])])
            .expect("factory installed");
        let r = id_of(&adapter, "R");
        let a = id_of(&adapter, "A");
        let b = id_of(&adapter, "B");
        let a1 = id_of(&adapter, "A1");
        let t1 = id_of(&adapter, "T1");

        assert_eq!(adapter.common_parent(a, b), Some(r));
        assert_eq!(adapter.common_parent(a1, a), Some(a));
        assert_eq!(adapter.common_parent(a, a1), Some(a));
        assert_eq!(adapter.common_parent(a1, b), Some(r));
        assert_eq!(adapter.common_parent(a1, t1), None);
    }

    #[test]
    fn given_closed_tree_when_traversed_then_every_node_is_visited() {
        let (mut adapter, _log) = adapter();
        adapter
            .set_items(vec![scenario_root(), leaf("Z")])
            .expect("factory installed");
        let name = |id: NodeId| adapter.node(id).expect("live").item().name;

        let pre: Vec<_> = adapter.pre_order().map(name).collect();
        let bfs: Vec<_> = adapter.breadth_first(None).map(name).collect();
        let sub: Vec<_> = adapter
            .breadth_first(Some(id_of(&adapter, "A")))
            .map(name)
            .collect();

        assert_eq!(pre, vec!["R", "A", "A1", "B", "Z"]);
        assert_eq!(bfs, vec!["R", "Z", "A", "B", "A1"]);
        assert_eq!(sub, vec!["A", "A1"]);
    }

    #[test]
    fn given_cached_view_models_when_factory_swapped_then_rebuilt_and_reset() {
        let (mut adapter, log) = adapter();
        let root = scenario_root();
        adapter.set_items(vec![root.clone()]).expect("factory installed");
        assert!(adapter.open(&root, false));
        assert_eq!(adapter.view_model_at(1).map(String::as_str), Some("A"));
        let _ = log.take();

        adapter.set_view_model_factory(|item: &Item| {
            format!("<{}>", item.name)
        });

        assert_eq!(log.take(), vec![TreeChange::Reset]);
        let cached: Vec<_> = adapter
            .breadth_first_extracted(None)
            .filter_map(|data| data.view_model.cloned())
            .collect();
        assert!(cached.is_empty());
        assert_eq!(
            adapter.view_model_at(1).map(String::as_str),
            Some("<A>")
        );
        assert_eq!(adapter.view_model_at(9), None);
    }

    #[test]
    fn given_row_when_extracted_without_create_then_view_model_not_built() {
        let (mut adapter, _log) = adapter();
        adapter
            .set_items(vec![leaf("a"), leaf("b")])
            .expect("factory installed");

        let peek = adapter.extract_data_at(0, true).expect("row exists");
        assert_eq!(peek.item.name, "a");
        assert!(peek.view_model.is_none());

        let built = adapter.extract_data_at(0, false).expect("row exists");
        assert_eq!(built.view_model.map(String::as_str), Some("a"));
        assert!(adapter.extract_data_at(2, false).is_none());
    }

    #[test]
    fn given_handle_from_previous_forest_when_used_then_treated_as_unknown() {
        let (mut adapter, _log) = adapter();
        adapter
            .set_items(vec![scenario_root()])
            .expect("factory installed");
        let stale_root = id_of(&adapter, "R");
        let stale_a = id_of(&adapter, "A");

        adapter
            .set_items(vec![scenario_root()])
            .expect("factory installed");

        assert!(adapter.node(stale_root).is_none());
        assert!(!adapter.open_node(stale_root, true));
        assert_eq!(adapter.breadth_first(Some(stale_root)).count(), 0);
        assert_eq!(
            adapter.open_to_child(stale_root, stale_a, true),
            Err(TreeError::StaleNode(stale_root))
        );
        assert_eq!(adapter.common_parent(stale_a, stale_root), None);
    }

    #[test]
    fn given_closed_ancestor_when_is_child_then_find_closed_decides() {
        let (mut adapter, _log) = adapter();
        adapter
            .set_items(vec![scenario_root()])
            .expect("factory installed");
        let r = id_of(&adapter, "R");
        let a = id_of(&adapter, "A");
        let a1 = id_of(&adapter, "A1");

        assert!(adapter.is_child(r, a1, true));
        assert!(!adapter.is_child(r, a1, false));
        assert!(!adapter.is_child(a1, r, true));

        assert!(adapter.open_node(r, false));
        assert!(adapter.open_node(a, false));
        assert!(adapter.is_child(r, a1, false));
        assert_eq!(adapter.root(a1), Some(r));
    }

    #[test]
    fn given_open_children_when_close_children_then_parent_stays_open() {
        let (mut adapter, log) = adapter();
        adapter
            .set_items(vec![scenario_root()])
            .expect("factory installed");
        let r = id_of(&adapter, "R");
        let a = id_of(&adapter, "A");
        assert!(adapter.open_node(r, false));
        assert!(adapter.open_node(a, false));
        let _ = log.take();

        assert!(adapter.close_children(r, true));
        assert!(!adapter.close_children(r, true));

        assert_eq!(rows(&adapter), vec!["R", "A", "B"]);
        assert_eq!(log.take(), vec![TreeChange::Removed { start: 2, count: 1 }]);
        assert_consistent(&adapter);
    }

    #[test]
    fn given_nodes_with_same_key_when_compared_then_open_state_matters() {
        let (mut adapter, _log) = adapter();
        let twin = branch("twin", vec![leaf("child")]);
        adapter
            .set_items(vec![twin.clone(), twin.clone()])
            .expect("factory installed");
        let first = adapter.top_level_nodes()[0];
        let second = adapter.top_level_nodes()[1];

        assert_eq!(adapter.node(first), adapter.node(second));

        assert!(adapter.open_node(second, false));
        assert_ne!(adapter.node(first), adapter.node(second));
        assert_eq!(adapter.find_node_for_item(&twin), Some(first));
        assert_eq!(adapter.node_at(2).map(|node| node.depth()), Some(1));
    }

    #[test]
    fn given_mixed_operations_when_applied_then_rows_match_recomputed_rows() {
        let (mut adapter, _log) = adapter();
        adapter
            .set_items(vec![
                branch(
                    "P",
                    vec![
                        branch("P1", vec![leaf("P1a"), leaf("P1b")]),
                        branch("P2", vec![branch("P2a", vec![leaf("P2ax")])]),
                    ],
                ),
                branch("Q", vec![leaf("Q1")]),
            ])
            .expect("factory installed");

        let script: [(bool, usize); 10] = [
            (true, 0),
            (true, 2),
            (true, 1),
            (true, 5),
            (false, 1),
            (true, 3),
            (true, 1),
            (false, 0),
            (true, 0),
            (false, 4),
        ];
        for (open, row) in script {
            if open {
                let _ = adapter.open_at(row, true);
            } else {
                let _ = adapter.close_at(row, true);
            }
            assert_consistent(&adapter);
        }
    }

    struct Chain {
        depth: u32,
    }

    impl DataExtractor<u32> for Chain {
        type Key = u32;

        fn identity_key(&self, item: &u32) -> Self::Key {
            *item
        }

        fn children(&self, item: &u32) -> Vec<u32> {
            if *item + 1 < self.depth {
                vec![*item + 1]
            } else {
                Vec::new()
            }
        }
    }

    #[test]
    fn given_very_deep_chain_when_set_then_every_level_is_built() {
        const DEPTH: u32 = 50_000;
        let mut adapter: TreeAdapter<u32, Chain, u32> =
            TreeAdapter::with_factory(Chain { depth: DEPTH }, |item: &u32| {
                *item
            });

        adapter.set_items([0]).expect("factory installed");

        assert_eq!(adapter.pre_order().count(), DEPTH as usize);
        let deepest = adapter
            .pre_order()
            .last()
            .expect("chain is not empty");
        let node = adapter.node(deepest).expect("live node");
        assert_eq!(*node.item(), DEPTH - 1);
        assert_eq!(node.depth(), DEPTH as usize - 1);
        assert_eq!(
            adapter.root(deepest),
            adapter.top_level_nodes().first().copied()
        );

        assert!(adapter.open_at(0, true));
        let rows: Vec<u32> = adapter.flattened_items().copied().collect();
        assert_eq!(rows, [0, 1]);
    }
}
