use std::cmp::Ordering;
use std::ptr;

/// Describes how domain items form a tree.
///
/// The adapter calls [`DataExtractor::children`] once per item while it
/// builds a subtree, so the whole hierarchy below a top-level item is
/// materialised eagerly when that item is inserted.
pub trait DataExtractor<T> {
    /// Stable identity of an item, independent of where it sits in memory.
    type Key: PartialEq;

    /// Identity key used when comparing nodes by value.
    fn identity_key(&self, item: &T) -> Self::Key;

    /// Ordered child items of `item`. Leaves return an empty vector.
    fn children(&self, item: &T) -> Vec<T>;
}

/// Builds the presentation value shown for an item.
///
/// Results are cached per node and rebuilt only after the factory is
/// swapped with [`TreeAdapter::set_view_model_factory`].
///
/// [`TreeAdapter::set_view_model_factory`]: crate::TreeAdapter::set_view_model_factory
pub trait ViewModelFactory<T, V> {
    fn create_view_model(&self, item: &T) -> V;
}

impl<T, V, F> ViewModelFactory<T, V> for F
where
    F: Fn(&T) -> V,
{
    fn create_view_model(&self, item: &T) -> V {
        self(item)
    }
}

/// Strategy used to decide whether two items denote the same entry when an
/// item (rather than a row index or a node handle) is used for lookup.
///
/// Every strategy treats two references to the same value as equal before
/// looking at the values themselves.
pub trait ItemMatch<T: ?Sized> {
    fn same_item(left: &T, right: &T) -> bool;
}

/// Matches items with [`PartialEq`]. This is the adapter default.
#[derive(Clone, Copy, Debug, Default)]
pub struct Structural;

impl<T: PartialEq + ?Sized> ItemMatch<T> for Structural {
    fn same_item(left: &T, right: &T) -> bool {
        ptr::eq(left, right) || left == right
    }
}

/// Matches items through their natural ordering: two items are the same
/// entry when `cmp` reports [`Ordering::Equal`].
///
/// This can disagree with [`Structural`] for types whose ordering only looks
/// at part of the value (for instance a sort key), which is the point: pick
/// it when that partial view is what identifies a row.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaturalOrder;

impl<T: Ord + ?Sized> ItemMatch<T> for NaturalOrder {
    fn same_item(left: &T, right: &T) -> bool {
        ptr::eq(left, right) || left.cmp(right) == Ordering::Equal
    }
}
