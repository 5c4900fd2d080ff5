use thiserror::Error;

use crate::node::NodeId;

/// Errors reported by [`TreeAdapter`](crate::TreeAdapter) operations.
///
/// Lookups that simply find nothing (an item that is not visible, an
/// out-of-range row) are not errors; they report `false` or `None`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error(
        "a view model factory must be installed before building tree nodes"
    )]
    MissingFactory,

    #[error("node {descendant} is not a descendant of node {ancestor}")]
    NotAnAncestor {
        ancestor: NodeId,
        descendant: NodeId,
    },

    #[error("node {0} does not belong to the current tree")]
    StaleNode(NodeId),

    #[error("a tree holds at most {} nodes", u32::MAX)]
    CapacityExceeded,
}

pub type Result<T> = std::result::Result<T, TreeError>;
