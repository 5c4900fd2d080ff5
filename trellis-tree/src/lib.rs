//! Incrementally maintained flattened projection of an open/closed tree.
//!
//! The crate backs scrollable list views that show hierarchical data:
//! - [`DataExtractor`] tells the adapter how items nest and how to identify
//!   them;
//! - [`ViewModelFactory`] builds the presentation value of each row, lazily
//!   and cached per node;
//! - [`TreeAdapter`] owns the nodes and keeps the visible rows as an ordered
//!   list, splicing children in and out as nodes open and close;
//! - [`TreeObserver`] receives the exact row ranges each change touches.
//!
//! # Quick Example
//!
//! ```
//! use trellis_tree::{ChangeLog, DataExtractor, TreeAdapter, TreeChange};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Entry {
//!     name: &'static str,
//!     children: Vec<Entry>,
//! }
//!
//! struct Entries;
//!
//! impl DataExtractor<Entry> for Entries {
//!     type Key = &'static str;
//!
//!     fn identity_key(&self, item: &Entry) -> Self::Key {
//!         item.name
//!     }
//!
//!     fn children(&self, item: &Entry) -> Vec<Entry> {
//!         item.children.clone()
//!     }
//! }
//!
//! let leaf = |name| Entry { name, children: Vec::new() };
//! let root = Entry {
//!     name: "root",
//!     children: vec![leaf("a"), leaf("b")],
//! };
//!
//! type EntryAdapter = TreeAdapter<Entry, Entries, String>;
//!
//! let log = ChangeLog::new();
//! let mut adapter = EntryAdapter::with_factory(Entries, |entry: &Entry| {
//!     entry.name.to_uppercase()
//! })
//! .with_observer(log.clone());
//!
//! adapter.set_items(vec![root.clone()])?;
//! assert!(adapter.open(&root, true));
//! assert_eq!(adapter.item_count(), 3);
//! assert_eq!(adapter.view_model_at(1).map(String::as_str), Some("A"));
//! assert_eq!(
//!     log.take(),
//!     vec![TreeChange::Reset, TreeChange::Inserted { start: 1, count: 2 }]
//! );
//! # Ok::<(), trellis_tree::TreeError>(())
//! ```

mod adapter;
mod error;
mod extractor;
mod node;
mod observer;
mod traverse;

pub use adapter::TreeAdapter;
pub use error::{Result, TreeError};
pub use extractor::{
    DataExtractor, ItemMatch, NaturalOrder, Structural, ViewModelFactory,
};
pub use node::{NodeId, TreeNode};
pub use observer::{ChangeLog, TreeChange, TreeObserver};
pub use traverse::{BreadthFirst, ExtractedData, PreOrder};
