//! The `iter` module defines the borrowing and owning iterators over an
//! [`UnrolledList`].  All of them are double-ended and know their exact
//! length.
//!
//! The borrowing iterators walk one node slice at a time from each end,
//! and track the span of nodes that neither end has claimed yet.  Once
//! the span is exhausted, each end drains whatever is left in the
//! other end's slice.
#![deny(unsafe_op_in_unsafe_fn)]

use std::fmt;
use std::iter::FusedIterator;

use crate::allocator::NodeAllocator;
use crate::arena::NodeArena;
use crate::arena::NodeId;
use crate::arena::RawNodes;
use crate::UnrolledList;

/// The nodes `[head, tail]` of the chain that no end has claimed yet.
#[derive(Clone, Copy, Debug)]
struct Unclaimed {
    head: Option<NodeId>,
    tail: Option<NodeId>,
}

impl Unclaimed {
    /// Drops the head node from the span; `next` is its successor.
    #[inline(always)]
    fn claim_front(&mut self, next: Option<NodeId>) {
        if self.head == self.tail {
            self.head = None;
            self.tail = None;
        } else {
            self.head = next;
        }
    }

    /// Drops the tail node from the span; `prev` is its predecessor.
    #[inline(always)]
    fn claim_back(&mut self, prev: Option<NodeId>) {
        if self.head == self.tail {
            self.head = None;
            self.tail = None;
        } else {
            self.tail = prev;
        }
    }
}

/// Iterates over `&T` in an [`UnrolledList`].
pub struct Iter<'a, T, const N: usize> {
    nodes: &'a NodeArena<T, N>,
    front: std::slice::Iter<'a, T>,
    back: std::slice::Iter<'a, T>,
    span: Unclaimed,
    len: usize,
}

impl<'a, T, const N: usize> Iter<'a, T, N> {
    #[must_use]
    pub(crate) fn new(
        nodes: &'a NodeArena<T, N>,
        first: Option<NodeId>,
        last: Option<NodeId>,
        len: usize,
    ) -> Self {
        Iter {
            nodes,
            front: Default::default(),
            back: Default::default(),
            span: Unclaimed {
                head: first,
                tail: last,
            },
            len,
        }
    }
}

impl<'a, T, const N: usize> Iterator for Iter<'a, T, N> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        loop {
            if let Some(item) = self.front.next() {
                self.len -= 1;
                return Some(item);
            }

            match self.span.head {
                Some(id) => {
                    let node = self.nodes.node(id);
                    self.span.claim_front(node.next);
                    self.front = node.items().iter();
                }
                None => break,
            }
        }

        let item = self.back.next()?;
        self.len -= 1;
        Some(item)
    }

    #[inline(always)]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'a, T, const N: usize> DoubleEndedIterator for Iter<'a, T, N> {
    fn next_back(&mut self) -> Option<&'a T> {
        loop {
            if let Some(item) = self.back.next_back() {
                self.len -= 1;
                return Some(item);
            }

            match self.span.tail {
                Some(id) => {
                    let node = self.nodes.node(id);
                    self.span.claim_back(node.prev);
                    self.back = node.items().iter();
                }
                None => break,
            }
        }

        let item = self.front.next_back()?;
        self.len -= 1;
        Some(item)
    }
}

impl<T, const N: usize> ExactSizeIterator for Iter<'_, T, N> {}
impl<T, const N: usize> FusedIterator for Iter<'_, T, N> {}

impl<T, const N: usize> Clone for Iter<'_, T, N> {
    fn clone(&self) -> Self {
        Iter {
            nodes: self.nodes,
            front: self.front.clone(),
            back: self.back.clone(),
            span: self.span,
            len: self.len,
        }
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for Iter<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Iter").field(&self.clone().collect::<Vec<_>>()).finish()
    }
}

/// Iterates over `&mut T` in an [`UnrolledList`].
pub struct IterMut<'a, T, const N: usize> {
    nodes: RawNodes<'a, T, N>,
    front: std::slice::IterMut<'a, T>,
    back: std::slice::IterMut<'a, T>,
    span: Unclaimed,
    len: usize,
}

impl<'a, T, const N: usize> IterMut<'a, T, N> {
    #[must_use]
    pub(crate) fn new(
        nodes: RawNodes<'a, T, N>,
        first: Option<NodeId>,
        last: Option<NodeId>,
        len: usize,
    ) -> Self {
        IterMut {
            nodes,
            front: Default::default(),
            back: Default::default(),
            span: Unclaimed {
                head: first,
                tail: last,
            },
            len,
        }
    }
}

impl<'a, T, const N: usize> Iterator for IterMut<'a, T, N> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<&'a mut T> {
        loop {
            if let Some(item) = self.front.next() {
                self.len -= 1;
                return Some(item);
            }

            match self.span.head {
                Some(id) => {
                    // SAFETY: every node leaves the unclaimed span the
                    // first time it is looked up, so no id is looked up
                    // twice.
                    let node = unsafe { self.nodes.node_mut(id) };
                    self.span.claim_front(node.next);
                    self.front = node.items_mut().iter_mut();
                }
                None => break,
            }
        }

        let item = self.back.next()?;
        self.len -= 1;
        Some(item)
    }

    #[inline(always)]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'a, T, const N: usize> DoubleEndedIterator for IterMut<'a, T, N> {
    fn next_back(&mut self) -> Option<&'a mut T> {
        loop {
            if let Some(item) = self.back.next_back() {
                self.len -= 1;
                return Some(item);
            }

            match self.span.tail {
                Some(id) => {
                    // SAFETY: see `next`.
                    let node = unsafe { self.nodes.node_mut(id) };
                    self.span.claim_back(node.prev);
                    self.back = node.items_mut().iter_mut();
                }
                None => break,
            }
        }

        let item = self.front.next_back()?;
        self.len -= 1;
        Some(item)
    }
}

impl<T, const N: usize> ExactSizeIterator for IterMut<'_, T, N> {}
impl<T, const N: usize> FusedIterator for IterMut<'_, T, N> {}

impl<T, const N: usize> fmt::Debug for IterMut<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterMut").field("len", &self.len).finish()
    }
}

/// Moves elements out of an [`UnrolledList`], releasing each node as it
/// drains.
pub struct IntoIter<T, const N: usize, A: NodeAllocator> {
    list: UnrolledList<T, N, A>,
}

impl<T, const N: usize, A: NodeAllocator> IntoIter<T, N, A> {
    #[must_use]
    #[inline(always)]
    pub(crate) fn new(list: UnrolledList<T, N, A>) -> Self {
        IntoIter { list }
    }
}

impl<T, const N: usize, A: NodeAllocator> Iterator for IntoIter<T, N, A> {
    type Item = T;

    #[inline(always)]
    fn next(&mut self) -> Option<T> {
        self.list.pop_front()
    }

    #[inline(always)]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.list.len(), Some(self.list.len()))
    }
}

impl<T, const N: usize, A: NodeAllocator> DoubleEndedIterator for IntoIter<T, N, A> {
    #[inline(always)]
    fn next_back(&mut self) -> Option<T> {
        self.list.pop_back()
    }
}

impl<T, const N: usize, A: NodeAllocator> ExactSizeIterator for IntoIter<T, N, A> {}
impl<T, const N: usize, A: NodeAllocator> FusedIterator for IntoIter<T, N, A> {}

impl<T: fmt::Debug, const N: usize, A: NodeAllocator> fmt::Debug for IntoIter<T, N, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IntoIter").field(&self.list).finish()
    }
}

#[test]
fn test_iter_both_ends_miri() {
    let list: UnrolledList<u32, 3> = (0..10).collect();

    let mut iter = list.iter();
    assert_eq!(iter.len(), 10);
    assert_eq!(iter.next(), Some(&0));
    assert_eq!(iter.next_back(), Some(&9));
    assert_eq!(iter.next_back(), Some(&8));
    assert_eq!(iter.len(), 7);

    let rest: Vec<u32> = iter.clone().copied().collect();
    assert_eq!(rest, [1, 2, 3, 4, 5, 6, 7]);

    // Meet in the middle, in a node claimed by the front.
    assert_eq!(iter.next(), Some(&1));
    assert_eq!(iter.next(), Some(&2));
    assert_eq!(iter.next(), Some(&3));
    assert_eq!(iter.next_back(), Some(&7));
    assert_eq!(iter.next_back(), Some(&6));
    assert_eq!(iter.next_back(), Some(&5));
    assert_eq!(iter.next_back(), Some(&4));
    assert_eq!(iter.len(), 0);
    assert_eq!(iter.next_back(), None);
    assert_eq!(iter.next(), None);
}

#[test]
fn test_iter_single_node_miri() {
    let list: UnrolledList<u32, 8> = (0..5).collect();

    let mut iter = list.iter();
    assert_eq!(iter.next_back(), Some(&4));
    assert_eq!(iter.next(), Some(&0));
    assert_eq!(iter.next_back(), Some(&3));
    assert_eq!(iter.next(), Some(&1));
    assert_eq!(iter.next(), Some(&2));
    assert_eq!(iter.next(), None);
    assert_eq!(iter.next_back(), None);
}

#[test]
fn test_iter_reverse_miri() {
    let mut list: UnrolledList<u32, 2> = UnrolledList::new();
    for i in 0..9 {
        if i % 2 == 0 {
            list.push_back(i);
        } else {
            list.push_front(i);
        }
    }

    let forward: Vec<u32> = list.iter().copied().collect();
    let mut backward: Vec<u32> = list.iter().rev().copied().collect();
    backward.reverse();
    assert_eq!(forward, backward);
    assert_eq!(forward, [7, 5, 3, 1, 0, 2, 4, 6, 8]);
}

#[test]
fn test_iter_mut_miri() {
    let mut list: UnrolledList<u32, 3> = (0..10).collect();

    for item in list.iter_mut() {
        *item *= 10;
    }

    let mut iter = list.iter_mut();
    *iter.next_back().unwrap() += 1;
    *iter.next().unwrap() += 2;
    assert_eq!(iter.len(), 8);
    for item in iter.rev() {
        *item += 3;
    }

    assert_eq!(
        list.iter().copied().collect::<Vec<_>>(),
        [2, 13, 23, 33, 43, 53, 63, 73, 83, 91]
    );
}

#[test]
fn test_iter_mut_meet_miri() {
    let mut list: UnrolledList<u32, 4> = (0..6).collect();

    let mut iter = list.iter_mut();
    let a = iter.next().unwrap();
    let b = iter.next_back().unwrap();
    let c = iter.next_back().unwrap();
    let d = iter.next_back().unwrap();
    let e = iter.next_back().unwrap();
    let f = iter.next_back().unwrap();
    assert!(iter.next().is_none());

    // All six borrows are live at once.
    for item in [a, b, c, d, e, f] {
        *item += 100;
    }

    assert_eq!(
        list.iter().copied().collect::<Vec<_>>(),
        [100, 101, 102, 103, 104, 105]
    );
}

#[test]
fn test_into_iter_miri() {
    let list: UnrolledList<String, 2> = (0..5).map(|i| i.to_string()).collect();

    let mut iter = list.into_iter();
    assert_eq!(iter.len(), 5);
    assert_eq!(iter.next().as_deref(), Some("0"));
    assert_eq!(iter.next_back().as_deref(), Some("4"));
    assert_eq!(iter.collect::<Vec<_>>(), ["1", "2", "3"]);
}

#[test]
fn test_into_iter_drops_rest_miri() {
    use crate::allocator::BoundedAllocator;
    use std::rc::Rc;

    let alloc = BoundedAllocator::new(10);
    let token = Rc::new(());
    let mut list: UnrolledList<Rc<()>, 2, BoundedAllocator> = UnrolledList::new_in(alloc.clone());
    list.extend(std::iter::repeat(token.clone()).take(7));
    assert_eq!(alloc.live_nodes(), 4);

    let mut iter = list.into_iter();
    let _ = iter.next();
    drop(iter);

    assert_eq!(Rc::strong_count(&token), 1);
    assert_eq!(alloc.live_nodes(), 0);
}

#[test]
fn test_borrowing_into_iter_miri() {
    let mut list: UnrolledList<u32, 3> = (0..4).collect();

    for item in &mut list {
        *item += 1;
    }

    let mut sum = 0;
    for item in &list {
        sum += item;
    }
    assert_eq!(sum, 10);
}
