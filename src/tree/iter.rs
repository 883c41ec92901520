use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;

use super::{AvlTree, Link, Node, Value};

/// An iterator over the key-value pairs of a tree in ascending key order.
///
/// Follows parent links from node to node, so it needs no stack.
pub struct Iter<'a> {
    next: Link,
    remaining: usize,
    marker: PhantomData<&'a Node>,
}

impl<'a> Iter<'a> {
    pub(super) fn new(tree: &'a AvlTree) -> Self {
        Self {
            next: tree.root.map(AvlTree::leftmost),
            remaining: tree.num_nodes,
            marker: PhantomData,
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, Value);

    fn next(&mut self) -> Option<Self::Item> {
        let node_ptr = self.next?;
        self.next = AvlTree::successor(node_ptr);
        self.remaining -= 1;
        let node = unsafe { &*node_ptr.as_ptr() };
        Some((node.key.as_str(), node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl FusedIterator for Iter<'_> {}

impl Clone for Iter<'_> {
    fn clone(&self) -> Self {
        Self {
            next: self.next,
            remaining: self.remaining,
            marker: PhantomData,
        }
    }
}

impl fmt::Debug for Iter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}
