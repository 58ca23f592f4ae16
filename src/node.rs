//! The `node` module defines the fixed-capacity [`Node`] blocks that
//! the [`crate::UnrolledList`] chains together.
//!
//! A node only knows about its own contiguous run of elements and its
//! two neighbour links; it performs local shifts on insert/erase, and
//! never looks at the rest of the chain.
use smallvec::SmallVec;

use crate::arena::NodeId;

/// Inline storage for up to `N` elements.  The list never pushes past
/// `N` elements, so this never spills to the heap.
pub(crate) type NodeItems<T, const N: usize> = SmallVec<[T; N]>;

/// A [`Node`] holds up to `N` live elements, in logical order, and
/// non-owning links to its neighbours in the chain.
#[derive(Debug)]
pub(crate) struct Node<T, const N: usize> {
    items: NodeItems<T, N>,
    pub(crate) prev: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
}

impl<T, const N: usize> Node<T, N> {
    /// Returns a fresh unlinked node without any element.
    #[must_use]
    #[inline(always)]
    pub fn new() -> Self {
        Node {
            items: SmallVec::new(),
            prev: None,
            next: None,
        }
    }

    /// Returns an unlinked node that holds `items`.
    #[must_use]
    #[inline(always)]
    pub fn with_items(items: NodeItems<T, N>) -> Self {
        assert!(items.len() <= N);
        Node {
            items,
            prev: None,
            next: None,
        }
    }

    #[must_use]
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.items.len() == N
    }

    #[must_use]
    #[inline(always)]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[must_use]
    #[inline(always)]
    pub fn items_mut(&mut self) -> &mut [T] {
        &mut self.items
    }

    /// Places `value` after the last live element.
    ///
    /// Panics if the node is full.
    #[inline(always)]
    pub fn append(&mut self, value: T) {
        assert!(!self.is_full(), "append to a full node");
        self.items.push(value);
    }

    /// Shifts the elements at `[local, len)` one slot toward the tail
    /// and places `value` at `local`.
    ///
    /// Panics if the node is full or `local > len`.
    #[inline(always)]
    pub fn insert_at(&mut self, local: usize, value: T) {
        assert!(!self.is_full(), "insert into a full node");
        assert!(local <= self.items.len());
        self.items.insert(local, value);
    }

    /// Removes and returns the element at `local`, shifting the tail
    /// one slot toward the head.
    ///
    /// Panics if `local >= len`.
    #[inline(always)]
    pub fn erase_at(&mut self, local: usize) -> T {
        self.items.remove(local)
    }

    /// Removes and returns the last element, if any.
    #[inline(always)]
    pub fn pop_last(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Moves the upper half of a full node out, in order: elements
    /// `[N / 2, N)` leave, and the first `N / 2` stay behind.
    #[must_use]
    pub fn split_off_upper_half(&mut self) -> NodeItems<T, N> {
        assert!(self.is_full(), "only full nodes are split");
        let upper: NodeItems<T, N> = self.items.drain(N / 2..).collect();

        assert_eq!(self.items.len(), N / 2);
        assert_eq!(upper.len(), N - N / 2);
        upper
    }

    /// Takes every element out of the node, leaving it empty.
    #[must_use]
    #[inline(always)]
    pub fn take_items(&mut self) -> NodeItems<T, N> {
        std::mem::take(&mut self.items)
    }
}

#[test]
fn test_append_insert_erase_miri() {
    let mut node: Node<u32, 4> = Node::new();
    assert!(node.is_empty());
    assert!(!node.is_full());

    node.append(1);
    node.append(3);
    node.insert_at(1, 2);
    node.insert_at(0, 0);
    assert_eq!(node.items(), &[0, 1, 2, 3]);
    assert!(node.is_full());

    assert_eq!(node.erase_at(1), 1);
    assert_eq!(node.items(), &[0, 2, 3]);
    assert_eq!(node.pop_last(), Some(3));
    assert_eq!(node.erase_at(0), 0);
    assert_eq!(node.items(), &[2]);
    assert_eq!(node.len(), 1);
}

#[test]
fn test_split_even_miri() {
    let mut node: Node<u32, 4> = Node::with_items([10, 11, 12, 13].into_iter().collect());

    let upper = node.split_off_upper_half();
    assert_eq!(node.items(), &[10, 11]);
    assert_eq!(&upper[..], &[12, 13]);
}

#[test]
fn test_split_odd_miri() {
    // The lower half keeps the floor of N / 2.
    let mut node: Node<u32, 5> = Node::with_items((0..5).collect());

    let upper = node.split_off_upper_half();
    assert_eq!(node.items(), &[0, 1]);
    assert_eq!(&upper[..], &[2, 3, 4]);
}

#[test]
fn test_split_drops_nothing_miri() {
    use std::rc::Rc;

    let token = Rc::new(());
    let mut node: Node<Rc<()>, 3> = Node::new();
    for _ in 0..3 {
        node.append(token.clone());
    }

    let upper = node.split_off_upper_half();
    assert_eq!(Rc::strong_count(&token), 4);
    drop(upper);
    assert_eq!(Rc::strong_count(&token), 2);
    drop(node);
    assert_eq!(Rc::strong_count(&token), 1);
}

#[test]
#[should_panic(expected = "insert into a full node")]
fn test_insert_full_miri() {
    let mut node: Node<u32, 2> = Node::new();
    node.append(1);
    node.append(2);
    node.insert_at(0, 0);
}

#[test]
#[should_panic(expected = "only full nodes are split")]
fn test_split_partial_miri() {
    let mut node: Node<u32, 2> = Node::new();
    node.append(1);
    let _ = node.split_off_upper_half();
}
