use std::cmp::{self, Ordering};
use std::fmt;
use std::iter::FromIterator;
use std::mem;
use std::ops::{Index, IndexMut};
use std::ptr::NonNull;

use crate::error::{Error, Result};

mod iter;

pub use iter::Iter;

/// Key type of the map.
pub type Key = String;

/// Value type of the map.
pub type Value = usize;

/// Indentation per tree level used by the `Display` dump.
const INDENT: usize = 4;

/// An ordered map from string keys to unsigned integers implemented with an AVL tree.
///
/// ```
/// use avltree::AvlTree;
/// let mut tree = AvlTree::new();
/// assert!(tree.insert("b", 2));
/// assert!(tree.insert("a", 1));
/// assert!(!tree.insert("a", 42));
/// assert_eq!(tree.get("a"), Some(1));
/// assert_eq!(tree.keys(), ["a", "b"]);
/// assert!(tree.remove("a"));
/// assert!(!tree.contains("a"));
/// ```
pub struct AvlTree {
    root: Link,
    num_nodes: usize,
}

struct Node {
    key: Key,
    value: Value,
    left: Link,
    right: Link,
    parent: Link,
    height: usize,
}

type NodePtr = NonNull<Node>;
type Link = Option<NodePtr>;
type LinkPtr = NonNull<Link>;

#[allow(clippy::enum_variant_names)]
enum Direction {
    FromParent,
    FromLeft,
    FromRight,
}

impl AvlTree {
    /// Creates an empty tree.
    /// No memory is allocated until the first item is inserted.
    pub fn new() -> Self {
        Self {
            root: None,
            num_nodes: 0,
        }
    }

    /// Returns true if the tree contains no elements.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the number of key-value pairs in the tree.
    pub fn size(&self) -> usize {
        self.num_nodes
    }

    /// Same as [`size`](Self::size).
    pub fn len(&self) -> usize {
        self.num_nodes
    }

    /// Returns the height of the tree in edges.
    /// Both the empty tree and a single node have height 0.
    pub fn height(&self) -> usize {
        match self.root {
            None => 0,
            Some(root_ptr) => unsafe { root_ptr.as_ref().height },
        }
    }

    /// Clears the tree, deallocating all memory.
    pub fn clear(&mut self) {
        self.postorder(|node_ptr| unsafe { Node::destroy(node_ptr) });
        self.root = None;
        self.num_nodes = 0;
    }

    /// Returns true if the tree contains the key.
    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Returns the value corresponding to the key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.find(key).map(|node_ptr| unsafe { node_ptr.as_ref().value })
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.find(key)
            .map(|node_ptr| unsafe { &mut (*node_ptr.as_ptr()).value })
    }

    /// Returns a mutable reference to the value corresponding to the key,
    /// or [`Error::KeyNotFound`] if the key is absent.
    /// Unlike indexing, this never panics.
    pub fn try_value_mut(&mut self, key: &str) -> Result<&mut Value> {
        self.get_mut(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_owned()))
    }

    /// Inserts a key-value pair into the tree.
    /// Returns false and leaves the tree untouched if the key is already present;
    /// the stored value is not updated in that case.
    pub fn insert(&mut self, key: impl Into<Key>, value: Value) -> bool {
        let key = key.into();
        match self.find_insert_pos(&key) {
            Some((parent, mut link_ptr)) => {
                unsafe {
                    *link_ptr.as_mut() = Some(Node::create(parent, key, value));
                }
                self.num_nodes += 1;
                self.rebalance(parent);
                true
            }
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!(key = %key, "insert: key already present");
                false
            }
        }
    }

    /// Removes a key from the tree.
    /// Returns whether the key was previously in the tree.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.find(key) {
            Some(node_ptr) => {
                debug_assert!(self.num_nodes >= 1);
                self.remove_node(node_ptr);
                self.num_nodes -= 1;
                debug_assert!(!self.contains(key));
                true
            }
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!(key, "remove: key not present");
                false
            }
        }
    }

    /// Returns all keys in ascending order.
    pub fn keys(&self) -> Vec<Key> {
        let mut keys = Vec::with_capacity(self.num_nodes);
        self.inorder(|node_ptr| keys.push(unsafe { node_ptr.as_ref() }.key.clone()));
        keys
    }

    /// Returns all values in ascending order of their keys.
    pub fn values(&self) -> Vec<Value> {
        self.iter().map(|(_, value)| value).collect()
    }

    /// Returns the keys `k` with `low <= k <= high` in ascending order.
    /// An inverted range yields no keys.
    pub fn find_range(&self, low: &str, high: &str) -> Vec<Key> {
        let mut keys = Vec::new();
        Self::collect_range(self.root, low, high, &mut keys);
        keys
    }

    /// Gets an iterator over the key-value pairs of the tree in ascending key order.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    /// Asserts parent links, key order, cached heights, AVL balance and node count.
    #[cfg(any(test, feature = "consistency_check"))]
    pub fn check_consistency(&self) {
        unsafe {
            // Check root link
            if let Some(root_node_ptr) = self.root {
                assert!(root_node_ptr.as_ref().parent.is_none());
            }

            // Check tree nodes
            let mut num_nodes = 0;
            self.preorder(|node_ptr| {
                let node = node_ptr.as_ref();

                // Check link for left child node
                if let Some(left_ptr) = node.left {
                    assert!(left_ptr.as_ref().parent == Some(node_ptr));
                    assert!(left_ptr.as_ref().key < node.key);
                }

                // Check link for right child node
                if let Some(right_ptr) = node.right {
                    assert!(right_ptr.as_ref().parent == Some(node_ptr));
                    assert!(right_ptr.as_ref().key > node.key);
                }

                // Check height
                let left_height = Self::height_of(node.left);
                let right_height = Self::height_of(node.right);
                assert_eq!(
                    node.height as isize,
                    1 + cmp::max(left_height, right_height),
                    "stale height at key {:?}",
                    node.key
                );

                // Check AVL condition (nearly balance)
                assert!(
                    (left_height - right_height).abs() <= 1,
                    "unbalanced at key {:?}",
                    node.key
                );

                num_nodes += 1;
            });

            // Check number of nodes
            assert_eq!(num_nodes, self.num_nodes);
        }
    }

    #[cfg(test)]
    pub(crate) fn root_key(&self) -> Option<&str> {
        self.root
            .map(|root_ptr| unsafe { &*root_ptr.as_ptr() }.key.as_str())
    }

    fn find(&self, key: &str) -> Link {
        let mut current = self.root;
        while let Some(node_ptr) = current {
            current = unsafe {
                match key.cmp(node_ptr.as_ref().key.as_str()) {
                    Ordering::Equal => break,
                    Ordering::Less => node_ptr.as_ref().left,
                    Ordering::Greater => node_ptr.as_ref().right,
                }
            }
        }
        current
    }

    fn find_insert_pos(&mut self, key: &str) -> Option<(Link, LinkPtr)> {
        let mut parent: Link = None;
        let mut link_ptr: LinkPtr = unsafe { LinkPtr::new_unchecked(&mut self.root) };
        unsafe {
            while let Some(mut node_ptr) = *link_ptr.as_ref() {
                parent = Some(node_ptr);
                link_ptr = match key.cmp(node_ptr.as_ref().key.as_str()) {
                    Ordering::Equal => return None,
                    Ordering::Less => LinkPtr::new_unchecked(&mut node_ptr.as_mut().left),
                    Ordering::Greater => LinkPtr::new_unchecked(&mut node_ptr.as_mut().right),
                };
            }
        }
        Some((parent, link_ptr))
    }

    fn collect_range(link: Link, low: &str, high: &str, keys: &mut Vec<Key>) {
        if let Some(node_ptr) = link {
            let node = unsafe { node_ptr.as_ref() };
            let key = node.key.as_str();
            if key > low {
                Self::collect_range(node.left, low, high, keys);
            }
            if low <= key && key <= high {
                keys.push(node.key.clone());
            }
            if key < high {
                Self::collect_range(node.right, low, high, keys);
            }
        }
    }

    /// Removes a node from the tree and deallocates it.
    ///
    /// A node with two children keeps its place: it takes over key and value of
    /// its in-order successor, and the successor (which has no left child) is
    /// unlinked instead.
    fn remove_node(&mut self, mut node_ptr: NodePtr) {
        unsafe {
            let unlink_ptr = match node_ptr.as_ref().right {
                Some(right_ptr) if node_ptr.as_ref().num_children() == 2 => {
                    let mut successor_ptr = Self::leftmost(right_ptr);
                    #[cfg(feature = "tracing")]
                    tracing::trace!(
                        key = %node_ptr.as_ref().key,
                        successor = %successor_ptr.as_ref().key,
                        "remove: promote in-order successor"
                    );
                    mem::swap(&mut node_ptr.as_mut().key, &mut successor_ptr.as_mut().key);
                    mem::swap(&mut node_ptr.as_mut().value, &mut successor_ptr.as_mut().value);
                    successor_ptr
                }
                _ => node_ptr,
            };

            let parent = self.splice_out(unlink_ptr);
            Node::destroy(unlink_ptr);

            // Parent of the unlinked node might be out of balance now
            self.rebalance(parent);
        }
    }

    /// Detaches a node with at most one child, moving the child into its place.
    /// Returns the former parent of the detached node.
    fn splice_out(&mut self, node_ptr: NodePtr) -> Link {
        unsafe {
            let node = node_ptr.as_ref();
            debug_assert!(node.num_children() <= 1);
            let child = if node.is_leaf() {
                None
            } else {
                node.left.or(node.right)
            };
            if let Some(mut child_ptr) = child {
                child_ptr.as_mut().parent = node.parent;
            }
            self.replace_child(node.parent, node_ptr, child);
            node.parent
        }
    }

    /// Makes `new` take the place of `old_ptr` below `parent`, or at the root.
    /// Does not touch the parent link of `new`.
    fn replace_child(&mut self, parent: Link, old_ptr: NodePtr, new: Link) {
        match parent {
            None => self.root = new,
            Some(mut parent_ptr) => unsafe {
                if parent_ptr.as_ref().left == Some(old_ptr) {
                    parent_ptr.as_mut().left = new;
                } else {
                    parent_ptr.as_mut().right = new;
                }
            },
        }
    }

    fn leftmost(mut node_ptr: NodePtr) -> NodePtr {
        unsafe {
            while let Some(left_ptr) = node_ptr.as_ref().left {
                node_ptr = left_ptr;
            }
        }
        node_ptr
    }

    /// Returns the node following the given one in key order.
    fn successor(node_ptr: NodePtr) -> Link {
        unsafe {
            if let Some(right_ptr) = node_ptr.as_ref().right {
                return Some(Self::leftmost(right_ptr));
            }
            let mut child_ptr = node_ptr;
            let mut current = node_ptr.as_ref().parent;
            while let Some(parent_ptr) = current {
                if parent_ptr.as_ref().left == Some(child_ptr) {
                    return Some(parent_ptr);
                }
                child_ptr = parent_ptr;
                current = parent_ptr.as_ref().parent;
            }
            None
        }
    }

    /// Height of a possibly empty subtree. An empty subtree has height -1.
    fn height_of(link: Link) -> isize {
        match link {
            None => -1,
            Some(node_ptr) => unsafe { node_ptr.as_ref().height as isize },
        }
    }

    fn balance_factor(node_ptr: NodePtr) -> isize {
        unsafe {
            let node = node_ptr.as_ref();
            Self::height_of(node.left) - Self::height_of(node.right)
        }
    }

    fn adjust_height(mut node_ptr: NodePtr) {
        unsafe {
            let node = node_ptr.as_mut();
            let height = 1 + cmp::max(Self::height_of(node.left), Self::height_of(node.right));
            node.height = height as usize;
        }
    }

    fn rotate_left(&mut self, mut node_ptr: NodePtr) {
        unsafe {
            if let Some(mut right_ptr) = node_ptr.as_ref().right {
                #[cfg(feature = "tracing")]
                tracing::trace!(pivot = %node_ptr.as_ref().key, "rotate left");

                node_ptr.as_mut().right = right_ptr.as_ref().left;
                if let Some(mut right_left_ptr) = right_ptr.as_ref().left {
                    right_left_ptr.as_mut().parent = Some(node_ptr);
                }

                right_ptr.as_mut().parent = node_ptr.as_ref().parent;
                self.replace_child(node_ptr.as_ref().parent, node_ptr, Some(right_ptr));

                right_ptr.as_mut().left = Some(node_ptr);
                node_ptr.as_mut().parent = Some(right_ptr);

                Self::adjust_height(node_ptr);
                Self::adjust_height(right_ptr);
            }
        }
    }

    fn rotate_right(&mut self, mut node_ptr: NodePtr) {
        unsafe {
            if let Some(mut left_ptr) = node_ptr.as_ref().left {
                #[cfg(feature = "tracing")]
                tracing::trace!(pivot = %node_ptr.as_ref().key, "rotate right");

                node_ptr.as_mut().left = left_ptr.as_ref().right;
                if let Some(mut left_right_ptr) = left_ptr.as_ref().right {
                    left_right_ptr.as_mut().parent = Some(node_ptr);
                }

                left_ptr.as_mut().parent = node_ptr.as_ref().parent;
                self.replace_child(node_ptr.as_ref().parent, node_ptr, Some(left_ptr));

                left_ptr.as_mut().right = Some(node_ptr);
                node_ptr.as_mut().parent = Some(left_ptr);

                Self::adjust_height(node_ptr);
                Self::adjust_height(left_ptr);
            }
        }
    }

    /// Rebalances nodes starting from given position up to the root node.
    /// Every ancestor is visited, since both insertion and removal may change
    /// heights all the way up.
    fn rebalance(&mut self, start_from: Link) {
        let mut current = start_from;
        while let Some(node_ptr) = current {
            let parent = unsafe { node_ptr.as_ref().parent };
            self.rebalance_node(node_ptr);
            current = parent;
        }
    }

    /// Adjusts height and restores AVL condition (balance) at given node if necessary.
    /// Initial balance factor must not exceed +2 or -2, which always holds after a single update.
    fn rebalance_node(&mut self, node_ptr: NodePtr) {
        Self::adjust_height(node_ptr);
        let balance = Self::balance_factor(node_ptr);
        debug_assert!((-2..=2).contains(&balance));
        unsafe {
            if balance > 1 {
                // Left heavy, left-right case needs a rotation of the left child first
                if let Some(left_ptr) = node_ptr.as_ref().left {
                    if Self::balance_factor(left_ptr) < 0 {
                        self.rotate_left(left_ptr);
                    }
                }
                self.rotate_right(node_ptr);
            } else if balance < -1 {
                // Right heavy, right-left case needs a rotation of the right child first
                if let Some(right_ptr) = node_ptr.as_ref().right {
                    if Self::balance_factor(right_ptr) > 0 {
                        self.rotate_right(right_ptr);
                    }
                }
                self.rotate_left(node_ptr);
            }
        }
    }

    /// Deep copy of a subtree, keeping the cached heights.
    fn copy_subtree(link: Link, parent: Link) -> Link {
        let source = unsafe { &*link?.as_ptr() };
        let mut node_ptr = Node::create(parent, source.key.clone(), source.value);
        unsafe {
            let node = node_ptr.as_mut();
            node.height = source.height;
            node.left = Self::copy_subtree(source.left, Some(node_ptr));
            node.right = Self::copy_subtree(source.right, Some(node_ptr));
        }
        Some(node_ptr)
    }

    /// Writes a subtree right-first, one `{key: value}` per line, indented by depth.
    fn fmt_subtree(link: Link, depth: usize, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(node_ptr) = link {
            let node = unsafe { node_ptr.as_ref() };
            Self::fmt_subtree(node.right, depth + 1, f)?;
            writeln!(
                f,
                "{:indent$}{{{}: {}}}",
                "",
                node.key,
                node.value,
                indent = depth * INDENT
            )?;
            Self::fmt_subtree(node.left, depth + 1, f)?;
        }
        Ok(())
    }

    #[cfg(any(test, feature = "consistency_check"))]
    fn preorder<F: FnMut(NodePtr)>(&self, f: F) {
        self.traverse(f, |_| {}, |_| {});
    }

    fn inorder<F: FnMut(NodePtr)>(&self, f: F) {
        self.traverse(|_| {}, f, |_| {});
    }

    fn postorder<F: FnMut(NodePtr)>(&self, f: F) {
        self.traverse(|_| {}, |_| {}, f);
    }

    fn traverse<Pre, In, Post>(&self, mut preorder: Pre, mut inorder: In, mut postorder: Post)
    where
        Pre: FnMut(NodePtr),
        In: FnMut(NodePtr),
        Post: FnMut(NodePtr),
    {
        if let Some(mut node_ptr) = self.root {
            let mut dir = Direction::FromParent;
            loop {
                match dir {
                    Direction::FromParent => {
                        preorder(node_ptr);
                        if let Some(left_ptr) = unsafe { node_ptr.as_ref().left } {
                            node_ptr = left_ptr;
                        } else {
                            dir = Direction::FromLeft;
                        }
                    }
                    Direction::FromLeft => {
                        inorder(node_ptr);
                        if let Some(right_ptr) = unsafe { node_ptr.as_ref().right } {
                            node_ptr = right_ptr;
                            dir = Direction::FromParent;
                        } else {
                            dir = Direction::FromRight;
                        }
                    }
                    Direction::FromRight => {
                        // Post order traversal is used for node deletion,
                        // so make sure not to use node pointer after postorder call.
                        if let Some(parent_ptr) = unsafe { node_ptr.as_ref().parent } {
                            if Some(node_ptr) == unsafe { parent_ptr.as_ref().left } {
                                dir = Direction::FromLeft;
                            } else {
                                dir = Direction::FromRight;
                            }
                            postorder(node_ptr);
                            node_ptr = parent_ptr;
                        } else {
                            postorder(node_ptr);
                            break;
                        }
                    }
                }
            }
        }
    }
}

impl Drop for AvlTree {
    fn drop(&mut self) {
        self.clear();
    }
}

impl Default for AvlTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for AvlTree {
    fn clone(&self) -> Self {
        Self {
            root: Self::copy_subtree(self.root, None),
            num_nodes: self.num_nodes,
        }
    }
}

impl PartialEq for AvlTree {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for AvlTree {}

impl fmt::Debug for AvlTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl fmt::Display for AvlTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Self::fmt_subtree(self.root, 0, f)
    }
}

impl Index<&str> for AvlTree {
    type Output = Value;

    /// Returns a reference to the value corresponding to the key.
    ///
    /// # Panics
    ///
    /// Panics if the key is not present in the tree.
    fn index(&self, key: &str) -> &Value {
        match self.find(key) {
            Some(node_ptr) => unsafe { &(*node_ptr.as_ptr()).value },
            None => panic!("key not found: {key:?}"),
        }
    }
}

impl IndexMut<&str> for AvlTree {
    /// Returns a mutable reference to the value corresponding to the key.
    /// Never inserts a missing key.
    ///
    /// # Panics
    ///
    /// Panics if the key is not present in the tree.
    fn index_mut(&mut self, key: &str) -> &mut Value {
        match self.get_mut(key) {
            Some(value) => value,
            None => panic!("key not found: {key:?}"),
        }
    }
}

impl<K: Into<Key>> FromIterator<(K, Value)> for AvlTree {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut tree = Self::new();
        tree.extend(iter);
        tree
    }
}

impl<K: Into<Key>> Extend<(K, Value)> for AvlTree {
    /// Inserts all pairs; for a key already present the first value wins.
    fn extend<I: IntoIterator<Item = (K, Value)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a> IntoIterator for &'a AvlTree {
    type Item = (&'a str, Value);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Node {
    fn create(parent: Link, key: Key, value: Value) -> NodePtr {
        let boxed = Box::new(Node {
            key,
            value,
            parent,
            left: None,
            right: None,
            height: 0,
        });
        unsafe { NodePtr::new_unchecked(Box::into_raw(boxed)) }
    }

    unsafe fn destroy(node_ptr: NodePtr) {
        drop(Box::from_raw(node_ptr.as_ptr()));
    }

    fn num_children(&self) -> usize {
        usize::from(self.left.is_some()) + usize::from(self.right.is_some())
    }

    fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}
