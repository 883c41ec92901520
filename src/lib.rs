//! An ordered map from string keys to unsigned integers, implemented with an AVL tree.
//!
//! Nodes keep a link to their parent, so rebalancing after an insertion or
//! removal walks up from the edited position to the root without recursion.
//! Leaves have height 0 and empty subtrees count as height -1.
//!
//! Cargo features:
//! - `tracing` (default): emits `tracing` events for rotations and rejected updates.
//! - `consistency_check`: makes `AvlTree::check_consistency` available outside of tests.

mod error;
mod tree;

pub use error::{Error, Result};
pub use tree::{AvlTree, Iter, Key, Value};

#[cfg(test)]
mod proptests;
