//! # rb-strmap
//!
//! An ordered map keyed by strings, balanced as a red-black tree.
//!
//! Every insert and remove runs a fixup pass (recoloring plus at most a few
//! rotations) so the tree height stays within `2 * log2(n + 1)`.
//!
//! ## Example
//!
//! ```rust
//! use rb_strmap::RedBlackTree;
//!
//! let mut tree: RedBlackTree<u64> = RedBlackTree::new();
//! assert!(tree.insert("hello", 1));
//! assert!(tree.insert("world", 2));
//! // Existing keys are never overwritten.
//! assert!(!tree.insert("hello", 3));
//!
//! assert_eq!(tree.get("hello"), Some(&1));
//! assert_eq!(tree.remove("world"), Some(2));
//! assert!(tree.validate());
//! ```

use std::cmp::Ordering;
use std::fmt;

use log::{debug, trace};

mod validate;

pub use validate::ValidationError;

// =============================================================================
// Configuration
// =============================================================================

/// Slots are addressed by `u32`, so the arena cannot grow past this.
const MAX_NODES: usize = u32::MAX as usize;

// =============================================================================
// Colors and sides
// =============================================================================

/// Node color. Absent children count as black.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Black,
}

/// Which child link of a node is meant. Every fixup case has a mirror image,
/// so the algorithms are written once against a `Side` and its opposite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl Side {
    #[inline]
    fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

// =============================================================================
// Node arena
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone)]
struct Node<V> {
    key: Box<str>,
    value: V,
    color: Color,
    /// Back-link for upward walks. Never owns anything.
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

impl<V> Node<V> {
    fn new(key: &str, value: V, parent: Option<NodeId>, color: Color) -> Self {
        Self {
            key: key.into(),
            value,
            color,
            parent,
            left: None,
            right: None,
        }
    }

    #[inline]
    fn child(&self, side: Side) -> Option<NodeId> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

/// Slot storage for tree nodes. Vacated slots go on a free list and are
/// handed out again before the arena grows.
#[derive(Clone)]
struct NodeArena<V> {
    slots: Vec<Option<Node<V>>>,
    free: Vec<u32>,
}

impl<V> NodeArena<V> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
        }
    }

    fn alloc(&mut self, node: Node<V>) -> NodeId {
        if let Some(slot) = self.free.pop() {
            debug_assert!(self.slots[slot as usize].is_none());
            self.slots[slot as usize] = Some(node);
            return NodeId(slot);
        }
        assert!(self.slots.len() < MAX_NODES, "node arena exhausted");
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Some(node));
        id
    }

    fn free_node(&mut self, id: NodeId) -> Node<V> {
        let node = self.slots[id.index()]
            .take()
            .expect("freeing a vacant node slot");
        self.free.push(id.0);
        node
    }

    #[inline]
    fn get(&self, id: NodeId) -> &Node<V> {
        self.slots[id.index()]
            .as_ref()
            .expect("node id points at a vacant slot")
    }

    #[inline]
    fn get_mut(&mut self, id: NodeId) -> &mut Node<V> {
        self.slots[id.index()]
            .as_mut()
            .expect("node id points at a vacant slot")
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }

    fn shrink_to_fit(&mut self) {
        // Trailing vacant slots can be dropped outright.
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        let len = self.slots.len() as u32;
        self.free.retain(|&slot| slot < len);
        self.slots.shrink_to_fit();
        self.free.shrink_to_fit();
    }

    fn memory_usage(&self) -> usize {
        let keys: usize = self.slots.iter().flatten().map(|n| n.key.len()).sum();
        self.slots.capacity() * std::mem::size_of::<Option<Node<V>>>()
            + self.free.capacity() * std::mem::size_of::<u32>()
            + keys
    }
}

// =============================================================================
// RedBlackTree
// =============================================================================

/// An ordered map from strings to `V`, kept balanced as a red-black tree.
///
/// Keys compare lexicographically by byte. Inserting a key that is already
/// present is a no-op: the stored value is kept and the new one is dropped.
#[derive(Clone)]
pub struct RedBlackTree<V> {
    nodes: NodeArena<V>,
    root: Option<NodeId>,
    count: usize,
}

impl<V> RedBlackTree<V> {
    pub fn new() -> Self {
        Self {
            nodes: NodeArena::new(),
            root: None,
            count: 0,
        }
    }

    /// Creates an empty tree with room for `capacity` nodes before the arena
    /// reallocates.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: NodeArena::with_capacity(capacity),
            root: None,
            count: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.count = 0;
    }

    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
    }

    /// Bytes reserved by node storage, including key bytes.
    pub fn memory_usage(&self) -> usize {
        self.nodes.memory_usage()
    }

    // -------------------------------------------------------------------------
    // Link helpers
    // -------------------------------------------------------------------------

    #[inline]
    fn node(&self, id: NodeId) -> &Node<V> {
        self.nodes.get(id)
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node<V> {
        self.nodes.get_mut(id)
    }

    #[inline]
    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    #[inline]
    fn child(&self, id: NodeId, side: Side) -> Option<NodeId> {
        self.node(id).child(side)
    }

    #[inline]
    fn set_child(&mut self, id: NodeId, side: Side, child: Option<NodeId>) {
        let node = self.node_mut(id);
        match side {
            Side::Left => node.left = child,
            Side::Right => node.right = child,
        }
    }

    #[inline]
    fn set_parent(&mut self, id: Option<NodeId>, parent: Option<NodeId>) {
        if let Some(id) = id {
            self.node_mut(id).parent = parent;
        }
    }

    /// Side of `parent` that `child` hangs from. `child` may be absent, in
    /// which case the absent link of `parent` is reported.
    #[inline]
    fn side_of(&self, parent: NodeId, child: Option<NodeId>) -> Side {
        if self.node(parent).left == child {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Absent nodes are black.
    #[inline]
    fn color_of(&self, id: Option<NodeId>) -> Color {
        id.map_or(Color::Black, |id| self.node(id).color)
    }

    #[inline]
    fn is_red(&self, id: Option<NodeId>) -> bool {
        self.color_of(id) == Color::Red
    }

    #[inline]
    fn is_black(&self, id: Option<NodeId>) -> bool {
        self.color_of(id) == Color::Black
    }

    #[inline]
    fn set_color(&mut self, id: NodeId, color: Color) {
        self.node_mut(id).color = color;
    }

    /// Points whatever held `old` (its parent's child link, or the root) at
    /// `new` instead.
    fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        match parent {
            None => self.root = new,
            Some(parent) => {
                let side = self.side_of(parent, Some(old));
                self.set_child(parent, side, new);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Structural primitives
    // -------------------------------------------------------------------------

    /// Rotates the subtree at `node` towards `dir`: the child on the opposite
    /// side takes `node`'s place and `node` becomes its `dir` child. A left
    /// rotation is `rotate(n, Side::Left)`.
    fn rotate(&mut self, node: NodeId, dir: Side) {
        let promoted = self
            .child(node, dir.opposite())
            .expect("rotation needs a child to promote");
        trace!(
            "rotate {:?} at {:?}, promoting {:?}",
            dir,
            self.node(node).key,
            self.node(promoted).key
        );

        let inner = self.child(promoted, dir);
        self.set_child(node, dir.opposite(), inner);
        self.set_parent(inner, Some(node));

        let parent = self.parent(node);
        self.node_mut(promoted).parent = parent;
        self.replace_child(parent, node, Some(promoted));

        self.set_child(promoted, dir, Some(node));
        self.node_mut(node).parent = Some(promoted);
    }

    /// Puts the subtree at `with` where the subtree at `target` was. The
    /// children of both are left alone.
    fn transplant(&mut self, target: NodeId, with: Option<NodeId>) {
        let parent = self.parent(target);
        self.replace_child(parent, target, with);
        self.set_parent(with, parent);
    }

    fn tree_minimum(&self, mut node: NodeId) -> NodeId {
        while let Some(left) = self.node(node).left {
            node = left;
        }
        node
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    fn find(&self, key: &str) -> Option<NodeId> {
        let mut current = self.root;
        while let Some(id) = current {
            let node = self.node(id);
            current = match key.cmp(&*node.key) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(id),
            };
        }
        None
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.find(key).map(|id| &self.node(id).value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        let id = self.find(key)?;
        Some(&mut self.node_mut(id).value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Color of the node holding `key`.
    pub fn color(&self, key: &str) -> Option<Color> {
        self.find(key).map(|id| self.node(id).color)
    }

    /// Number of nodes from the root down to `key`, counting both ends (the
    /// root has depth 1). Returns 0 when `key` is absent.
    pub fn depth(&self, key: &str) -> usize {
        let Some(mut current) = self.find(key) else {
            return 0;
        };
        let mut depth = 1;
        while let Some(parent) = self.parent(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Number of black ancestors of `key`, not counting its own node.
    /// Returns 0 when `key` is absent.
    pub fn black_depth(&self, key: &str) -> usize {
        let Some(id) = self.find(key) else {
            return 0;
        };
        let mut blacks = 0;
        let mut current = self.parent(id);
        while let Some(ancestor) = current {
            if self.node(ancestor).color == Color::Black {
                blacks += 1;
            }
            current = self.parent(ancestor);
        }
        blacks
    }

    /// Nodes on the longest root-to-leaf path; 0 for an empty tree.
    pub fn height(&self) -> usize {
        let mut stack: Vec<(NodeId, usize)> = Vec::new();
        if let Some(root) = self.root {
            stack.push((root, 1));
        }

        let mut height = 0;
        while let Some((id, depth)) = stack.pop() {
            height = height.max(depth);
            let node = self.node(id);
            for child in [node.left, node.right].into_iter().flatten() {
                stack.push((child, depth + 1));
            }
        }
        height
    }

    // -------------------------------------------------------------------------
    // Insert
    // -------------------------------------------------------------------------

    /// Adds `key -> value` if `key` is not present yet.
    ///
    /// Returns `false` and leaves the tree untouched when the key already
    /// exists; the stored value is not replaced.
    pub fn insert(&mut self, key: &str, value: V) -> bool {
        let Some(mut current) = self.root else {
            let id = self.nodes.alloc(Node::new(key, value, None, Color::Black));
            self.root = Some(id);
            self.count = 1;
            debug!("inserted {key:?} as root");
            return true;
        };

        let (parent, side) = loop {
            let node = self.node(current);
            let side = match key.cmp(&*node.key) {
                Ordering::Less => Side::Left,
                Ordering::Greater => Side::Right,
                Ordering::Equal => return false,
            };
            match node.child(side) {
                Some(next) => current = next,
                None => break (current, side),
            }
        };

        let id = self
            .nodes
            .alloc(Node::new(key, value, Some(parent), Color::Red));
        self.set_child(parent, side, Some(id));
        self.count += 1;
        debug!("inserted {key:?} as {side:?} child of {:?}", self.node(parent).key);

        self.fix_insertion(id);
        true
    }

    /// Restores the red-black rules after `node` was attached as a red leaf.
    /// The only rule that can break is "no red node has a red child", between
    /// `node` and its parent.
    fn fix_insertion(&mut self, mut node: NodeId) {
        while let Some(parent) = self.parent(node).filter(|&p| self.is_red(Some(p))) {
            // A red node is never the root, so the grandparent exists.
            let grandparent = self.parent(parent).expect("red node has a parent");
            let side = self.side_of(grandparent, Some(parent));
            let uncle = self.child(grandparent, side.opposite());

            if let Some(uncle) = uncle.filter(|&u| self.is_red(Some(u))) {
                trace!("insert fixup: red uncle, recoloring at {:?}", self.node(grandparent).key);
                self.set_color(parent, Color::Black);
                self.set_color(uncle, Color::Black);
                self.set_color(grandparent, Color::Red);
                node = grandparent;
                continue;
            }

            if self.child(parent, side.opposite()) == Some(node) {
                trace!("insert fixup: inner grandchild {:?}", self.node(node).key);
                node = parent;
                self.rotate(node, side);
            }

            trace!("insert fixup: outer grandchild {:?}", self.node(node).key);
            let parent = self.parent(node).expect("outer case has a parent");
            let grandparent = self.parent(parent).expect("outer case has a grandparent");
            self.set_color(parent, Color::Black);
            self.set_color(grandparent, Color::Red);
            self.rotate(grandparent, side.opposite());
        }

        if let Some(root) = self.root {
            self.set_color(root, Color::Black);
        }
    }

    // -------------------------------------------------------------------------
    // Remove
    // -------------------------------------------------------------------------

    /// Removes `key` and returns its value, or `None` if it was not present.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let target = self.find(key)?;
        let (left, right) = {
            let node = self.node(target);
            (node.left, node.right)
        };

        // `removed_color` is the color that disappears from the tree. `child`
        // is whatever now sits where that color was, and `child_parent` its
        // parent, recorded separately because `child` may be absent.
        let mut removed_color = self.node(target).color;
        let child;
        let child_parent;

        match (left, right) {
            (None, _) => {
                child = right;
                child_parent = self.parent(target);
                self.transplant(target, right);
            }
            (Some(_), None) => {
                child = left;
                child_parent = self.parent(target);
                self.transplant(target, left);
            }
            (Some(left), Some(right)) => {
                let successor = self.tree_minimum(right);
                removed_color = self.node(successor).color;
                child = self.node(successor).right;

                if self.parent(successor) == Some(target) {
                    // `child` already hangs off `successor`, which moves up
                    // into `target`'s place together with it.
                    child_parent = Some(successor);
                } else {
                    child_parent = self.parent(successor);
                    self.transplant(successor, child);
                    self.node_mut(successor).right = Some(right);
                    self.node_mut(right).parent = Some(successor);
                }

                self.transplant(target, Some(successor));
                self.node_mut(successor).left = Some(left);
                self.node_mut(left).parent = Some(successor);
                let color = self.node(target).color;
                self.set_color(successor, color);
            }
        }

        let removed = self.nodes.free_node(target);
        self.count -= 1;
        debug!("removed {key:?}");

        if removed_color == Color::Black {
            self.fix_deletion(child, child_parent);
        }
        Some(removed.value)
    }

    /// Repairs the missing black below `parent` on the side where `node`
    /// sits. `node` may be absent (a black leaf was removed); the deficit is
    /// still real and is repaired from its position.
    fn fix_deletion(&mut self, mut node: Option<NodeId>, mut parent: Option<NodeId>) {
        while node != self.root && self.is_black(node) {
            let Some(p) = parent else {
                break;
            };
            let side = self.side_of(p, node);
            // The deficit side is one black short, so the other side holds at
            // least one node.
            let mut sibling = self
                .child(p, side.opposite())
                .expect("double-black position has a sibling");

            if self.is_red(Some(sibling)) {
                trace!("delete fixup: red sibling {:?}", self.node(sibling).key);
                self.set_color(sibling, Color::Black);
                self.set_color(p, Color::Red);
                self.rotate(p, side);
                sibling = self
                    .child(p, side.opposite())
                    .expect("rotation leaves a sibling");
            }

            let near = self.child(sibling, side);
            let far = self.child(sibling, side.opposite());

            if self.is_black(near) && self.is_black(far) {
                trace!("delete fixup: black nephews, pushing deficit to {:?}", self.node(p).key);
                self.set_color(sibling, Color::Red);
                node = Some(p);
                parent = self.parent(p);
                continue;
            }

            if self.is_black(far) {
                trace!("delete fixup: red near nephew under {:?}", self.node(sibling).key);
                let near = near.expect("red nephew exists");
                self.set_color(near, Color::Black);
                self.set_color(sibling, Color::Red);
                self.rotate(sibling, side.opposite());
                sibling = self
                    .child(p, side.opposite())
                    .expect("rotation leaves a sibling");
            }

            trace!("delete fixup: red far nephew under {:?}", self.node(sibling).key);
            let parent_color = self.node(p).color;
            self.set_color(sibling, parent_color);
            self.set_color(p, Color::Black);
            if let Some(far) = self.child(sibling, side.opposite()) {
                self.set_color(far, Color::Black);
            }
            self.rotate(p, side);
            node = self.root;
            break;
        }

        if let Some(node) = node {
            self.set_color(node, Color::Black);
        }
    }
}

impl<V> Default for RedBlackTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for RedBlackTree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedBlackTree")
            .field("len", &self.count)
            .field("height", &self.height())
            .field("root", &self.root.map(|id| &self.node(id).key))
            .finish()
    }
}

#[cfg(test)]
impl<V> RedBlackTree<V> {
    /// Keys in in-order sequence, for ordering assertions.
    fn keys_in_order(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.count);
        let mut stack = Vec::new();
        let mut current = self.root;
        loop {
            while let Some(id) = current {
                stack.push(id);
                current = self.node(id).left;
            }
            let Some(id) = stack.pop() else {
                break;
            };
            keys.push(self.node(id).key.to_string());
            current = self.node(id).right;
        }
        keys
    }
}


#[cfg(test)]
mod proptests;
