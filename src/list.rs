//! The `list` module defines the [`UnrolledList`] container.
//!
//! An [`UnrolledList`] stores its elements in fixed-capacity nodes of up
//! to `N` elements, chained in a doubly linked list.  Every node in the
//! chain holds at least one element:
//!
//! - inserting into a full node splits it: the upper half (`N - N / 2`
//!   elements) moves to a fresh node linked right after it, and the new
//!   element goes to whichever half contains its position;
//! - appending to a full last node (or prepending to a full head node)
//!   links a fresh node instead of splitting;
//! - an erase or pop that drains a node unlinks and releases it.
//!
//! There is no other rebalancing: nodes may stay sparse after erases.
//!
//! Nodes are admitted by the list's [`NodeAllocator`] before any link or
//! element moves, so a refused allocation leaves the list untouched.
use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::ops::Index;
use std::ops::IndexMut;

use log::debug;
use log::trace;

use crate::allocator::Global;
use crate::allocator::NodeAllocator;
use crate::arena::NodeArena;
use crate::arena::NodeId;
use crate::cursor::Cursor;
use crate::cursor::CursorMut;
use crate::cursor::Position;
use crate::iter::IntoIter;
use crate::iter::Iter;
use crate::iter::IterMut;
use crate::node::Node;
use crate::Error;
use crate::DEFAULT_NODE_CAPACITY;

/// An [`UnrolledList`] is a sequence of `T` stored in nodes of up to `N`
/// elements each, with node admission governed by the allocator `A`.
///
/// Positional operations work in terms of [`Position`]s; see there for
/// the invalidation rules.
///
/// Every operation that may need a new node comes in a `try_` flavour
/// that returns [`Error::AllocationFailed`], and a plain flavour that
/// panics on allocation failure (like [`Vec::push`] aborts on OOM).
pub struct UnrolledList<T, const N: usize = DEFAULT_NODE_CAPACITY, A: NodeAllocator = Global> {
    first: Option<NodeId>,
    last: Option<NodeId>,
    len: usize,
    nodes: NodeArena<T, N>,
    alloc: A,
}

#[cold]
#[inline(never)]
fn allocation_failure(err: Error) -> ! {
    panic!("unrolled list allocation failed: {}", err)
}

impl<T, const N: usize> UnrolledList<T, N, Global> {
    /// Creates a new empty [`UnrolledList`] on the global heap.
    #[must_use]
    #[inline(always)]
    pub fn new() -> Self {
        Self::new_in(Global)
    }

    /// Creates a list of `count` clones of `value`.
    #[must_use]
    pub fn from_elem(value: T, count: usize) -> Self
    where
        T: Clone,
    {
        Self::from_elem_in(value, count, Global)
    }
}

impl<T, const N: usize, A: NodeAllocator> UnrolledList<T, N, A> {
    const NONZERO_CAPACITY: () = assert!(N > 0, "node capacity must be positive");

    /// Creates a new empty [`UnrolledList`] that admits nodes with `alloc`.
    ///
    /// Does not allocate any node.
    #[must_use]
    pub fn new_in(alloc: A) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NONZERO_CAPACITY;

        UnrolledList {
            first: None,
            last: None,
            len: 0,
            nodes: Default::default(),
            alloc,
        }
    }

    /// Creates a list of the items of `items`, in order, with nodes from
    /// `alloc`.
    pub fn try_from_iter_in<I>(items: I, alloc: A) -> Result<Self, Error>
    where
        I: IntoIterator<Item = T>,
    {
        let mut ret = Self::new_in(alloc);
        ret.try_extend(items)?;
        Ok(ret)
    }

    /// Creates a list of the items of `items`, with nodes from `alloc`.
    ///
    /// Panics if `alloc` refuses a node.
    #[must_use]
    pub fn from_iter_in<I>(items: I, alloc: A) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::try_from_iter_in(items, alloc).unwrap_or_else(|err| allocation_failure(err))
    }

    /// Creates a list of `count` clones of `value`, with nodes from `alloc`.
    ///
    /// Panics if `alloc` refuses a node.
    #[must_use]
    pub fn from_elem_in(value: T, count: usize, alloc: A) -> Self
    where
        T: Clone,
    {
        let mut ret = Self::new_in(alloc);
        ret.resize(count, value);
        ret
    }

    /// Moves the contents of `source` into a new list that uses `alloc`,
    /// leaving `source` empty.
    ///
    /// When `alloc` compares equal to `source`'s allocator, the nodes
    /// change owner without touching any element.  Otherwise, every
    /// node is first admitted by `alloc`, then elements move over node
    /// by node; if `alloc` refuses any node, `source` is left untouched.
    pub fn take_in(source: &mut Self, alloc: A) -> Result<Self, Error> {
        if alloc == source.alloc {
            let empty = Self::new_in(source.alloc.clone());
            let mut taken = std::mem::replace(source, empty);
            taken.alloc = alloc;
            return Ok(taken);
        }

        debug!(
            "allocators differ, moving elements. len={} nodes={}",
            source.len,
            source.nodes.live()
        );

        let mut ret = Self::new_in(alloc);
        let reserved = ret.reserve_nodes(source.nodes.live())?;

        let mut cursor = source.first;
        for id in reserved {
            let from = cursor.expect("one reserved node per source node");
            let node = source.nodes.node_mut(from);
            cursor = node.next;

            let items = node.take_items();
            ret.len += items.len();
            *ret.nodes.node_mut(id) = Node::with_items(items);
            ret.link_after(ret.last, id);
        }

        assert_eq!(cursor, None);
        source.clear();
        ret.check_rep();
        Ok(ret)
    }

    /// Replaces the contents of `self` with a copy of `source`.
    ///
    /// `self` adopts `source`'s allocator when the policy of its own
    /// allocator says so.  On failure, `self` keeps the prefix of
    /// `source` copied so far.
    pub fn try_assign_clone(&mut self, source: &Self) -> Result<(), Error>
    where
        T: Clone,
    {
        self.clear();
        if self.alloc.policy().on_copy_assignment {
            self.alloc = source.alloc.clone();
        }

        self.try_extend(source.iter().cloned())
    }

    /// Replaces the contents of `self` with those of `source`, leaving
    /// `source` empty.
    ///
    /// `self` adopts `source`'s allocator when the policy of its own
    /// allocator says so.  Nodes change owner when the allocators then
    /// compare equal; elements move otherwise (see [`Self::take_in`]).
    /// On failure, `self` is empty and `source` is untouched.
    pub fn assign_take(&mut self, source: &mut Self) -> Result<(), Error> {
        self.clear();
        if self.alloc.policy().on_move_assignment {
            self.alloc = source.alloc.clone();
        }

        let alloc = self.alloc.clone();
        *self = Self::take_in(source, alloc)?;
        Ok(())
    }

    /// Returns a copy of `self` that uses the allocator chosen by
    /// [`NodeAllocator::select_on_container_copy`].
    pub fn try_clone(&self) -> Result<Self, Error>
    where
        T: Clone,
    {
        let mut ret = Self::new_in(self.alloc.select_on_container_copy());
        ret.try_extend(self.iter().cloned())?;
        Ok(ret)
    }

    /// Returns the list's allocator.
    #[must_use]
    #[inline(always)]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Returns the number of elements in the list.
    #[must_use]
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Determines whether the list has no element.
    #[must_use]
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of nodes currently in the chain.
    #[must_use]
    #[inline(always)]
    pub fn node_count(&self) -> usize {
        self.nodes.live()
    }

    /// Returns the largest number of elements the allocator could hold.
    #[must_use]
    #[inline(always)]
    pub fn max_len(&self) -> usize {
        self.alloc.max_nodes().saturating_mul(N)
    }

    /// Removes every element and releases every node.
    pub fn clear(&mut self) {
        let released = self.nodes.clear();
        for _ in 0..released {
            self.alloc.deallocate_node(N);
        }

        if released > 0 {
            trace!("cleared list. released_nodes={}", released);
        }

        self.first = None;
        self.last = None;
        self.len = 0;
        self.check_rep();
    }

    /// Exchanges the contents (and allocators) of `self` and `other`,
    /// without moving any element.
    #[inline(always)]
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other)
    }

    /// Returns a reference to the first element, if any.
    #[must_use]
    #[inline(always)]
    pub fn front(&self) -> Option<&T> {
        self.nodes.node(self.first?).items().first()
    }

    #[must_use]
    #[inline(always)]
    pub fn front_mut(&mut self) -> Option<&mut T> {
        let first = self.first?;
        self.nodes.node_mut(first).items_mut().first_mut()
    }

    /// Returns a reference to the last element, if any.
    #[must_use]
    #[inline(always)]
    pub fn back(&self) -> Option<&T> {
        self.nodes.node(self.last?).items().last()
    }

    #[must_use]
    #[inline(always)]
    pub fn back_mut(&mut self) -> Option<&mut T> {
        let last = self.last?;
        self.nodes.node_mut(last).items_mut().last_mut()
    }

    /// Returns a reference to the element at `index`, walking nodes from
    /// the closer end.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        let (id, local) = self.locate_index(index)?;
        self.nodes.node(id).items().get(local)
    }

    #[must_use]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        let (id, local) = self.locate_index(index)?;
        self.nodes.node_mut(id).items_mut().get_mut(local)
    }

    /// Returns an iterator over the elements, front to back.
    #[inline(always)]
    pub fn iter(&self) -> Iter<'_, T, N> {
        Iter::new(&self.nodes, self.first, self.last, self.len)
    }

    /// Returns an iterator over mutable references to the elements.
    #[inline(always)]
    pub fn iter_mut(&mut self) -> IterMut<'_, T, N> {
        IterMut::new(self.nodes.raw(), self.first, self.last, self.len)
    }

    /// Returns the position of the first element, or the end position
    /// for an empty list.
    #[must_use]
    #[inline(always)]
    pub fn begin(&self) -> Position {
        Position::node_start(self.first)
    }

    /// Returns the end position, one past the last element.
    #[must_use]
    #[inline(always)]
    pub fn end(&self) -> Position {
        Position::end()
    }

    /// Returns the position of the element at `index`, or the end
    /// position when `index == len`.
    pub fn position(&self, index: usize) -> Result<Position, Error> {
        if index == self.len {
            return Ok(Position::end());
        }

        let (id, local) = self.locate_index(index).ok_or(Error::InvalidPosition)?;
        Ok(Position::new(id, local))
    }

    /// Returns the index of the element at `pos` (`len` for the end
    /// position).
    pub fn index_of(&self, pos: Position) -> Result<usize, Error> {
        if pos.is_end() {
            return Ok(self.len);
        }

        let (target, local) = self.locate(pos)?;
        let mut index = 0;
        let mut cursor = self.first;
        while let Some(id) = cursor {
            if id == target {
                return Ok(index + local);
            }

            let node = self.nodes.node(id);
            index += node.len();
            cursor = node.next;
        }

        // Live nodes are always in the chain.
        unreachable!("live node missing from the chain")
    }

    /// Returns a reference to the element at `pos`, if `pos` addresses
    /// a live element.
    #[must_use]
    #[inline(always)]
    pub fn get_at(&self, pos: Position) -> Option<&T> {
        self.nodes.get(pos.node()?)?.items().get(pos.offset())
    }

    #[must_use]
    #[inline(always)]
    pub fn get_at_mut(&mut self, pos: Position) -> Option<&mut T> {
        self.nodes
            .get_mut(pos.node()?)?
            .items_mut()
            .get_mut(pos.offset())
    }

    /// Returns the position right after `pos`.
    ///
    /// Fails with [`Error::InvalidPosition`] if `pos` is the end
    /// position, or does not address a live element.
    pub fn advance(&self, pos: Position) -> Result<Position, Error> {
        let (id, local) = self.locate(pos)?;
        let node = self.nodes.node(id);

        if local + 1 < node.len() {
            Ok(Position::new(id, local + 1))
        } else {
            Ok(Position::node_start(node.next))
        }
    }

    /// Returns the position right before `pos`; the end position
    /// retreats to the last element.
    ///
    /// Fails with [`Error::RetreatPastStart`] if `pos` is the first
    /// element (or the end of an empty list).
    pub fn retreat(&self, pos: Position) -> Result<Position, Error> {
        let prev = if pos.is_end() {
            self.last
        } else {
            let (id, local) = self.locate(pos)?;
            if local > 0 {
                return Ok(Position::new(id, local - 1));
            }

            self.nodes.node(id).prev
        };

        let prev = prev.ok_or(Error::RetreatPastStart)?;
        Ok(Position::new(prev, self.nodes.node(prev).len() - 1))
    }

    /// Returns a read-only cursor at `pos`.
    #[inline(always)]
    pub fn cursor(&self, pos: Position) -> Cursor<'_, T, N, A> {
        Cursor::new(self, pos)
    }

    /// Returns a read-only cursor at the first element.
    #[inline(always)]
    pub fn cursor_front(&self) -> Cursor<'_, T, N, A> {
        Cursor::new(self, self.begin())
    }

    /// Returns a mutable cursor at `pos`.
    #[inline(always)]
    pub fn cursor_mut(&mut self, pos: Position) -> CursorMut<'_, T, N, A> {
        CursorMut::new(self, pos)
    }

    /// Returns a mutable cursor at the first element.
    #[inline(always)]
    pub fn cursor_front_mut(&mut self) -> CursorMut<'_, T, N, A> {
        let pos = self.begin();
        CursorMut::new(self, pos)
    }

    /// Appends `value` after the last element.
    pub fn try_push_back(&mut self, value: T) -> Result<(), Error> {
        self.append(value)?;
        Ok(())
    }

    /// Appends `value` after the last element.
    ///
    /// Panics if the allocator refuses a node.
    #[inline(always)]
    pub fn push_back(&mut self, value: T) {
        if let Err(err) = self.try_push_back(value) {
            allocation_failure(err)
        }
    }

    /// Removes and returns the last element, if any.
    pub fn pop_back(&mut self) -> Option<T> {
        let last = self.last?;
        let node = self.nodes.node_mut(last);
        let value = node.pop_last().expect("chain nodes are never empty");
        let drained = node.is_empty();

        self.len -= 1;
        if drained {
            self.release_node(last);
        }

        self.check_rep();
        Some(value)
    }

    /// Inserts `value` before the first element.
    ///
    /// When the head node is full, a fresh node is linked in front of
    /// it (no split).
    pub fn try_push_front(&mut self, value: T) -> Result<(), Error> {
        let head = match self.first {
            Some(first) if !self.nodes.node(first).is_full() => first,
            _ => {
                let id = self.alloc_node()?;
                self.link_after(None, id);
                id
            }
        };

        self.nodes.node_mut(head).insert_at(0, value);
        self.len += 1;
        self.check_rep();
        Ok(())
    }

    /// Inserts `value` before the first element.
    ///
    /// Panics if the allocator refuses a node.
    #[inline(always)]
    pub fn push_front(&mut self, value: T) {
        if let Err(err) = self.try_push_front(value) {
            allocation_failure(err)
        }
    }

    /// Removes and returns the first element, if any.
    pub fn pop_front(&mut self) -> Option<T> {
        let first = self.first?;
        let node = self.nodes.node_mut(first);
        let value = node.erase_at(0);
        let drained = node.is_empty();

        self.len -= 1;
        if drained {
            self.release_node(first);
        }

        self.check_rep();
        Some(value)
    }

    /// Inserts `value` right before `pos`, and returns the position of
    /// the new element.
    ///
    /// Inserting at the end position appends.  Inserting into a full
    /// node splits it.  Positions into the receiving node (and, on
    /// split, into the node that was split) are invalidated.
    pub fn try_insert(&mut self, pos: Position, value: T) -> Result<Position, Error> {
        if pos.is_end() {
            return self.append(value);
        }

        let (id, local) = self.locate(pos)?;
        let (target, local) = if self.nodes.node(id).is_full() {
            self.split(id, local)?
        } else {
            (id, local)
        };

        self.nodes.node_mut(target).insert_at(local, value);
        self.len += 1;
        self.check_rep();
        Ok(Position::new(target, local))
    }

    /// Inserts `value` right before `pos`; see [`Self::try_insert`].
    ///
    /// Panics if the allocator refuses a node.
    pub fn insert(&mut self, pos: Position, value: T) -> Result<Position, Error> {
        match self.try_insert(pos, value) {
            Err(err @ Error::AllocationFailed { .. }) => allocation_failure(err),
            ret => ret,
        }
    }

    /// Inserts `count` clones of `value` before `pos`.
    pub fn try_insert_n(&mut self, pos: Position, count: usize, value: T) -> Result<(), Error>
    where
        T: Clone,
    {
        self.try_insert_range(pos, std::iter::repeat(value).take(count))
    }

    /// Inserts `count` clones of `value` before `pos`.
    ///
    /// Panics if the allocator refuses a node.
    pub fn insert_n(&mut self, pos: Position, count: usize, value: T) -> Result<(), Error>
    where
        T: Clone,
    {
        self.insert_range(pos, std::iter::repeat(value).take(count))
    }

    /// Inserts every item of `items` before `pos`, in order, one at a
    /// time at sequentially advancing positions.
    ///
    /// On failure, the items inserted so far stay in the list.
    pub fn try_insert_range<I>(&mut self, pos: Position, items: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = T>,
    {
        if !pos.is_end() {
            self.locate(pos)?;
        }

        let mut pos = pos;
        for item in items {
            let inserted = self.try_insert(pos, item)?;
            pos = self.advance(inserted)?;
        }

        Ok(())
    }

    /// Inserts every item of `items` before `pos`.
    ///
    /// Panics if the allocator refuses a node.
    pub fn insert_range<I>(&mut self, pos: Position, items: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = T>,
    {
        match self.try_insert_range(pos, items) {
            Err(err @ Error::AllocationFailed { .. }) => allocation_failure(err),
            ret => ret,
        }
    }

    /// Inserts every item of `items` before the first element.
    pub fn try_prepend_range<I>(&mut self, items: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = T>,
    {
        self.try_insert_range(self.begin(), items)
    }

    /// Inserts every item of `items` before the first element.
    ///
    /// Panics if the allocator refuses a node.
    pub fn prepend_range<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        if let Err(err) = self.try_prepend_range(items) {
            allocation_failure(err)
        }
    }

    /// Appends every item of `items`.
    ///
    /// On failure, the items appended so far stay in the list.
    pub fn try_extend<I>(&mut self, items: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = T>,
    {
        for item in items {
            self.try_push_back(item)?;
        }

        Ok(())
    }

    /// Appends every item of `items`.
    ///
    /// Panics if the allocator refuses a node.
    #[inline(always)]
    pub fn append_range<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.extend(items)
    }

    /// Replaces the contents of the list with `items`.
    pub fn try_assign_range<I>(&mut self, items: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = T>,
    {
        self.clear();
        self.try_extend(items)
    }

    /// Replaces the contents of the list with `items`.
    ///
    /// Panics if the allocator refuses a node.
    pub fn assign_range<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        if let Err(err) = self.try_assign_range(items) {
            allocation_failure(err)
        }
    }

    /// Removes the element at `pos`.  Returns the element, and the
    /// position of the element that followed it (or the end position).
    ///
    /// A node drained by the erase is released.  Positions into the
    /// erased element's node are invalidated.
    pub fn erase(&mut self, pos: Position) -> Result<(T, Position), Error> {
        let (id, local) = self.locate(pos)?;
        let node = self.nodes.node_mut(id);
        let value = node.erase_at(local);
        let remaining = node.len();
        let next = node.next;

        self.len -= 1;
        let following = if remaining == 0 {
            self.release_node(id);
            Position::node_start(next)
        } else if local < remaining {
            Position::new(id, local)
        } else {
            Position::node_start(next)
        };

        self.check_rep();
        Ok((value, following))
    }

    /// Removes the elements in `[first, last)`, and returns the position
    /// of the element that followed them.
    ///
    /// Fails without removing anything if `last` isn't reachable from
    /// `first`.
    pub fn erase_range(&mut self, first: Position, last: Position) -> Result<Position, Error> {
        let count = self.distance(first, last)?;

        let mut pos = first;
        for _ in 0..count {
            pos = self.erase(pos)?.1;
        }

        Ok(pos)
    }

    /// Keeps the first `len` elements and drops the rest, from the back.
    pub fn truncate(&mut self, len: usize) {
        while self.len > len {
            let _ = self.pop_back();
        }
    }

    /// Resizes the list to `new_len` elements, appending values from
    /// `make` or popping from the back.
    pub fn try_resize_with<F>(&mut self, new_len: usize, mut make: F) -> Result<(), Error>
    where
        F: FnMut() -> T,
    {
        self.truncate(new_len);
        while self.len < new_len {
            self.try_push_back(make())?;
        }

        Ok(())
    }

    /// Resizes the list to `new_len` elements; see [`Self::try_resize_with`].
    ///
    /// Panics if the allocator refuses a node.
    pub fn resize_with<F>(&mut self, new_len: usize, make: F)
    where
        F: FnMut() -> T,
    {
        if let Err(err) = self.try_resize_with(new_len, make) {
            allocation_failure(err)
        }
    }

    /// Resizes the list to `new_len` elements, appending clones of
    /// `value` or popping from the back.
    pub fn try_resize(&mut self, new_len: usize, value: T) -> Result<(), Error>
    where
        T: Clone,
    {
        self.try_resize_with(new_len, || value.clone())
    }

    /// Resizes the list to `new_len` elements, appending clones of
    /// `value` or popping from the back.
    ///
    /// Panics if the allocator refuses a node.
    pub fn resize(&mut self, new_len: usize, value: T)
    where
        T: Clone,
    {
        if let Err(err) = self.try_resize(new_len, value) {
            allocation_failure(err)
        }
    }

    /// Resizes the list to `new_len` elements, appending default values
    /// or popping from the back.
    ///
    /// Panics if the allocator refuses a node.
    pub fn resize_default(&mut self, new_len: usize)
    where
        T: Default,
    {
        if let Err(err) = self.try_resize_with(new_len, T::default) {
            allocation_failure(err)
        }
    }

    /// Appends `value`, and returns its position.
    fn append(&mut self, value: T) -> Result<Position, Error> {
        let tail = match self.last {
            Some(last) if !self.nodes.node(last).is_full() => last,
            last => {
                let id = self.alloc_node()?;
                self.link_after(last, id);
                id
            }
        };

        let node = self.nodes.node_mut(tail);
        node.append(value);
        let offset = node.len() - 1;

        self.len += 1;
        self.check_rep();
        Ok(Position::new(tail, offset))
    }

    /// Splits the full node `id` to make room for an insertion at
    /// `local`, and returns the node and offset that should receive the
    /// new element.
    fn split(&mut self, id: NodeId, local: usize) -> Result<(NodeId, usize), Error> {
        let fresh = self.alloc_node()?;
        let half = N / 2;

        // Single-element nodes can't be halved; the new element gets
        // its own node in front instead.
        if half == 0 {
            let prev = self.nodes.node(id).prev;
            self.link_after(prev, fresh);
            return Ok((fresh, 0));
        }

        let upper = self.nodes.node_mut(id).split_off_upper_half();
        *self.nodes.node_mut(fresh) = Node::with_items(upper);
        self.link_after(Some(id), fresh);
        trace!("split node. left={:?} right={:?} half={}", id, fresh, half);

        if local < half {
            Ok((id, local))
        } else {
            Ok((fresh, local - half))
        }
    }

    /// Returns the node and in-node offset for `pos`, if it addresses a
    /// live element.
    fn locate(&self, pos: Position) -> Result<(NodeId, usize), Error> {
        let id = pos.node().ok_or(Error::InvalidPosition)?;
        let node = self.nodes.get(id).ok_or(Error::InvalidPosition)?;
        if pos.offset() >= node.len() {
            return Err(Error::InvalidPosition);
        }

        Ok((id, pos.offset()))
    }

    /// Finds the node and in-node offset for the element at `index`.
    fn locate_index(&self, index: usize) -> Option<(NodeId, usize)> {
        if index >= self.len {
            return None;
        }

        if index < self.len / 2 {
            let mut remaining = index;
            let mut cursor = self.first;
            while let Some(id) = cursor {
                let node = self.nodes.node(id);
                if remaining < node.len() {
                    return Some((id, remaining));
                }

                remaining -= node.len();
                cursor = node.next;
            }
        } else {
            // Count from the back.
            let mut remaining = self.len - 1 - index;
            let mut cursor = self.last;
            while let Some(id) = cursor {
                let node = self.nodes.node(id);
                if remaining < node.len() {
                    return Some((id, node.len() - 1 - remaining));
                }

                remaining -= node.len();
                cursor = node.prev;
            }
        }

        unreachable!("cached len must match the chain")
    }

    /// Counts the elements in `[from, to)`.
    fn distance(&self, mut from: Position, to: Position) -> Result<usize, Error> {
        let mut count = 0;
        while from != to {
            from = self.advance(from)?;
            count += 1;
        }

        Ok(count)
    }

    /// Asks the allocator for a node, and stores a fresh one in the arena.
    fn alloc_node(&mut self) -> Result<NodeId, Error> {
        if !self.alloc.allocate_node(N) {
            debug!(
                "node allocator refused a node. capacity={} live_nodes={}",
                N,
                self.nodes.live()
            );
            return Err(Error::AllocationFailed { capacity: N });
        }

        let id = self.nodes.insert(Node::new());
        trace!("allocated node. id={:?} live_nodes={}", id, self.nodes.live());
        Ok(id)
    }

    /// Admits `count` unlinked nodes, or none at all.
    fn reserve_nodes(&mut self, count: usize) -> Result<Vec<NodeId>, Error> {
        let mut reserved = Vec::with_capacity(count);
        for _ in 0..count {
            match self.alloc_node() {
                Ok(id) => reserved.push(id),
                Err(err) => {
                    for id in reserved {
                        let _ = self.nodes.remove(id);
                        self.alloc.deallocate_node(N);
                    }

                    return Err(err);
                }
            }
        }

        Ok(reserved)
    }

    /// Links the unlinked node `id` right after `prev`, or at the head
    /// when `prev` is `None`.
    fn link_after(&mut self, prev: Option<NodeId>, id: NodeId) {
        let next = match prev {
            Some(prev) => self.nodes.node(prev).next,
            None => self.first,
        };

        let node = self.nodes.node_mut(id);
        node.prev = prev;
        node.next = next;

        match prev {
            Some(prev) => self.nodes.node_mut(prev).next = Some(id),
            None => self.first = Some(id),
        }

        match next {
            Some(next) => self.nodes.node_mut(next).prev = Some(id),
            None => self.last = Some(id),
        }
    }

    /// Unlinks the drained node `id` and gives it back to the allocator.
    fn release_node(&mut self, id: NodeId) {
        let node = self.nodes.remove(id);
        assert!(node.is_empty(), "only drained nodes are released");

        match node.prev {
            Some(prev) => self.nodes.node_mut(prev).next = node.next,
            None => self.first = node.next,
        }

        match node.next {
            Some(next) => self.nodes.node_mut(next).prev = node.prev,
            None => self.last = node.prev,
        }

        self.alloc.deallocate_node(N);
        trace!("released node. id={:?} live_nodes={}", id, self.nodes.live());
    }

    #[inline(always)]
    #[cfg_attr(test, mutants::skip)] // obviously, removing checks will not be detected.
    fn check_rep(&self) {
        if !cfg!(debug_assertions) {
            return;
        }

        assert_eq!(self.first.is_none(), self.len == 0);
        assert_eq!(self.last.is_none(), self.len == 0);

        let mut prev = None;
        let mut cursor = self.first;
        let mut total = 0;
        let mut count = 0;
        while let Some(id) = cursor {
            let node = self.nodes.node(id);
            assert_eq!(node.prev, prev, "prev link must mirror next link");
            assert!(!node.is_empty(), "chain nodes are never empty");

            total += node.len();
            count += 1;
            prev = Some(id);
            cursor = node.next;
        }

        assert_eq!(prev, self.last);
        assert_eq!(total, self.len);
        assert_eq!(count, self.nodes.live());
    }

    /// Returns the length of each node, front to back.
    #[cfg(test)]
    pub(crate) fn node_lens(&self) -> Vec<usize> {
        let mut ret = Vec::new();
        let mut cursor = self.first;
        while let Some(id) = cursor {
            let node = self.nodes.node(id);
            ret.push(node.len());
            cursor = node.next;
        }

        ret
    }
}

impl<T, const N: usize, A: NodeAllocator> Drop for UnrolledList<T, N, A> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T, const N: usize, A: NodeAllocator + Default> Default for UnrolledList<T, N, A> {
    #[inline(always)]
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<T: Clone, const N: usize, A: NodeAllocator> Clone for UnrolledList<T, N, A> {
    fn clone(&self) -> Self {
        self.try_clone().unwrap_or_else(|err| allocation_failure(err))
    }

    fn clone_from(&mut self, source: &Self) {
        if let Err(err) = self.try_assign_clone(source) {
            allocation_failure(err)
        }
    }
}

impl<T: fmt::Debug, const N: usize, A: NodeAllocator> fmt::Debug for UnrolledList<T, N, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T, const N: usize, const M: usize, A, B> PartialEq<UnrolledList<T, M, B>>
    for UnrolledList<T, N, A>
where
    T: PartialEq,
    A: NodeAllocator,
    B: NodeAllocator,
{
    fn eq(&self, other: &UnrolledList<T, M, B>) -> bool {
        self.len() == other.len() && itertools::equal(self.iter(), other.iter())
    }
}

impl<T: Eq, const N: usize, A: NodeAllocator> Eq for UnrolledList<T, N, A> {}

impl<T: PartialOrd, const N: usize, A: NodeAllocator> PartialOrd for UnrolledList<T, N, A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<T: Ord, const N: usize, A: NodeAllocator> Ord for UnrolledList<T, N, A> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<T: Hash, const N: usize, A: NodeAllocator> Hash for UnrolledList<T, N, A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len);
        for item in self.iter() {
            item.hash(state);
        }
    }
}

impl<T, const N: usize, A: NodeAllocator> Index<usize> for UnrolledList<T, N, A> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        let len = self.len;
        match self.get(index) {
            Some(item) => item,
            None => panic!("index out of bounds: the len is {} but the index is {}", len, index),
        }
    }
}

impl<T, const N: usize, A: NodeAllocator> IndexMut<usize> for UnrolledList<T, N, A> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        let len = self.len;
        match self.get_mut(index) {
            Some(item) => item,
            None => panic!("index out of bounds: the len is {} but the index is {}", len, index),
        }
    }
}

impl<T, const N: usize, A: NodeAllocator> Extend<T> for UnrolledList<T, N, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, items: I) {
        if let Err(err) = self.try_extend(items) {
            allocation_failure(err)
        }
    }
}

impl<'a, T: Clone + 'a, const N: usize, A: NodeAllocator> Extend<&'a T> for UnrolledList<T, N, A> {
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, items: I) {
        if let Err(err) = self.try_extend(items.into_iter().cloned()) {
            allocation_failure(err)
        }
    }
}

impl<T, const N: usize, A: NodeAllocator + Default> FromIterator<T> for UnrolledList<T, N, A> {
    fn from_iter<I: IntoIterator<Item = T>>(items: I) -> Self {
        let mut ret = Self::default();
        ret.extend(items);
        ret
    }
}

impl<T, const N: usize, const M: usize> From<[T; M]> for UnrolledList<T, N, Global> {
    fn from(items: [T; M]) -> Self {
        items.into_iter().collect()
    }
}

impl<T: Clone, const N: usize> From<&[T]> for UnrolledList<T, N, Global> {
    fn from(items: &[T]) -> Self {
        items.iter().cloned().collect()
    }
}

impl<T, const N: usize, A: NodeAllocator> IntoIterator for UnrolledList<T, N, A> {
    type Item = T;
    type IntoIter = IntoIter<T, N, A>;

    #[inline(always)]
    fn into_iter(self) -> IntoIter<T, N, A> {
        IntoIter::new(self)
    }
}

impl<'a, T, const N: usize, A: NodeAllocator> IntoIterator for &'a UnrolledList<T, N, A> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, N>;

    #[inline(always)]
    fn into_iter(self) -> Iter<'a, T, N> {
        self.iter()
    }
}

impl<'a, T, const N: usize, A: NodeAllocator> IntoIterator for &'a mut UnrolledList<T, N, A> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T, N>;

    #[inline(always)]
    fn into_iter(self) -> IterMut<'a, T, N> {
        self.iter_mut()
    }
}

#[cfg(test)]
use crate::allocator::BoundedAllocator;
#[cfg(test)]
use crate::allocator::PropagationPolicy;

#[cfg(test)]
fn contents<T: Clone, const N: usize, A: NodeAllocator>(list: &UnrolledList<T, N, A>) -> Vec<T> {
    list.iter().cloned().collect()
}

#[test]
fn test_empty_miri() {
    let mut list: UnrolledList<u32, 4> = UnrolledList::new();

    assert!(list.is_empty());
    assert_eq!(list.len(), 0);
    assert_eq!(list.node_count(), 0);
    assert_eq!(list.front(), None);
    assert_eq!(list.back(), None);
    assert_eq!(list.pop_front(), None);
    assert_eq!(list.pop_back(), None);
    assert_eq!(list.get(0), None);
    assert_eq!(list.begin(), list.end());
    assert_eq!(list.iter().next(), None);
    assert_eq!(list.erase(list.begin()), Err(Error::InvalidPosition));
    assert_eq!(list.retreat(list.end()), Err(Error::RetreatPastStart));
}

#[test]
fn test_scenario_miri() {
    let mut list: UnrolledList<i32> = UnrolledList::new();

    list.push_back(1);
    list.push_back(2);
    list.push_back(3);
    list.push_front(0);
    assert_eq!(contents(&list), [0, 1, 2, 3]);

    let pos = list.position(1).expect("in range");
    let inserted = list.insert(pos, 10).expect("valid position");
    assert_eq!(list.get_at(inserted), Some(&10));
    assert_eq!(contents(&list), [0, 10, 1, 2, 3]);

    let pos = list.position(2).expect("in range");
    let (erased, next) = list.erase(pos).expect("valid position");
    assert_eq!(erased, 1);
    assert_eq!(list.get_at(next), Some(&2));
    assert_eq!(contents(&list), [0, 10, 2, 3]);
    assert_eq!(list.len(), 4);
}

#[test]
fn test_push_back_links_nodes_miri() {
    let mut list: UnrolledList<u32, 3> = UnrolledList::new();

    for i in 0..7 {
        list.push_back(i);
    }

    // Appending never splits: every node but the last is full.
    assert_eq!(list.node_lens(), [3, 3, 1]);
    assert_eq!(list.front(), Some(&0));
    assert_eq!(list.back(), Some(&6));
    assert_eq!(contents(&list), (0..7).collect::<Vec<_>>());
}

#[test]
fn test_push_front_links_nodes_miri() {
    let mut list: UnrolledList<u32, 3> = UnrolledList::new();

    for i in 0..7 {
        list.push_front(i);
    }

    assert_eq!(list.node_lens(), [1, 3, 3]);
    assert_eq!(contents(&list), [6, 5, 4, 3, 2, 1, 0]);
}

#[test]
fn test_pop_releases_nodes_miri() {
    let mut list: UnrolledList<u32, 2> = (0..5).collect();
    assert_eq!(list.node_lens(), [2, 2, 1]);

    assert_eq!(list.pop_back(), Some(4));
    assert_eq!(list.node_lens(), [2, 2]);
    assert_eq!(list.pop_front(), Some(0));
    assert_eq!(list.node_lens(), [1, 2]);
    assert_eq!(list.pop_front(), Some(1));
    assert_eq!(list.node_lens(), [2]);
    assert_eq!(list.pop_back(), Some(3));
    assert_eq!(list.pop_back(), Some(2));
    assert_eq!(list.node_count(), 0);
    assert!(list.is_empty());
    assert_eq!(list.begin(), list.end());

    // Still usable after draining.
    list.push_front(9);
    assert_eq!(contents(&list), [9]);
}

#[test]
fn test_split_sizes_miri() {
    for p in 0..=4 {
        let mut list: UnrolledList<u32, 4> = (0..4).collect();
        assert_eq!(list.node_lens(), [4]);

        let pos = list.position(p).expect("in range");
        let inserted = list.insert(pos, 100).expect("valid position");

        let mut expected: Vec<u32> = (0..4).collect();
        expected.insert(p, 100);
        assert_eq!(contents(&list), expected);
        assert_eq!(list.get_at(inserted), Some(&100));

        if p == 4 {
            // The end position appends to a fresh node instead.
            assert_eq!(list.node_lens(), [4, 1]);
        } else if p < 2 {
            assert_eq!(list.node_lens(), [3, 2]);
        } else {
            assert_eq!(list.node_lens(), [2, 3]);
        }
    }
}

#[test]
fn test_split_odd_capacity_miri() {
    for p in 0..5 {
        let mut list: UnrolledList<u32, 5> = (0..5).collect();
        let pos = list.position(p).expect("in range");
        list.insert(pos, 100).expect("valid position");

        // floor(5 / 2) on the left, 5 - floor(5 / 2) on the right,
        // plus the new element on whichever side holds `p`.
        if p < 2 {
            assert_eq!(list.node_lens(), [3, 3]);
        } else {
            assert_eq!(list.node_lens(), [2, 4]);
        }

        let mut expected: Vec<u32> = (0..5).collect();
        expected.insert(p, 100);
        assert_eq!(contents(&list), expected);
    }
}

#[test]
fn test_single_element_nodes_miri() {
    let mut list: UnrolledList<u32, 1> = UnrolledList::new();

    list.push_back(1);
    list.push_back(3);
    list.push_front(0);
    let pos = list.position(2).expect("in range");
    list.insert(pos, 2).expect("valid position");

    assert_eq!(contents(&list), [0, 1, 2, 3]);
    assert_eq!(list.node_lens(), [1, 1, 1, 1]);

    let (value, next) = list.erase(list.position(1).unwrap()).unwrap();
    assert_eq!(value, 1);
    assert_eq!(list.get_at(next), Some(&2));
    assert_eq!(list.node_count(), 3);
}

#[test]
fn test_erase_merge_on_empty_miri() {
    let mut list: UnrolledList<u32, 2> = (0..5).collect();
    assert_eq!(list.node_lens(), [2, 2, 1]);

    // Draining a non-head node removes it from the chain.
    let (value, next) = list.erase(list.position(4).unwrap()).unwrap();
    assert_eq!(value, 4);
    assert_eq!(next, list.end());
    assert_eq!(list.node_lens(), [2, 2]);

    // Draining the head node promotes its successor.
    list.erase(list.begin()).unwrap();
    let (value, next) = list.erase(list.begin()).unwrap();
    assert_eq!(value, 1);
    assert_eq!(list.get_at(next), Some(&2));
    assert_eq!(next, list.begin());
    assert_eq!(list.node_lens(), [2]);

    // Draining the only node leaves the list empty.
    list.erase(list.begin()).unwrap();
    let (_, next) = list.erase(list.begin()).unwrap();
    assert_eq!(next, list.end());
    assert!(list.is_empty());
    assert_eq!(list.len(), 0);
    assert_eq!(list.node_count(), 0);
}

#[test]
fn test_erase_returns_following_miri() {
    let mut list: UnrolledList<u32, 4> = (0..8).collect();
    assert_eq!(list.node_lens(), [4, 4]);

    // Erasing the last element of a node moves on to the next node.
    let (value, next) = list.erase(list.position(3).unwrap()).unwrap();
    assert_eq!(value, 3);
    assert_eq!(list.get_at(next), Some(&4));

    // Chained erases visit every element once.
    let mut pos = list.begin();
    let mut erased = Vec::new();
    while pos != list.end() {
        let (value, next) = list.erase(pos).unwrap();
        erased.push(value);
        pos = next;
    }

    assert_eq!(erased, [0, 1, 2, 4, 5, 6, 7]);
    assert!(list.is_empty());
}

#[test]
fn test_erase_range_miri() {
    let mut list: UnrolledList<u32, 3> = (0..10).collect();

    let first = list.position(2).unwrap();
    let last = list.position(4).unwrap();
    let next = list.erase_range(first, last).unwrap();
    assert_eq!(list.get_at(next), Some(&4));
    assert_eq!(contents(&list), [0, 1, 4, 5, 6, 7, 8, 9]);

    let first = list.position(1).unwrap();
    let next = list.erase_range(first, list.end()).unwrap();
    assert_eq!(next, list.end());
    assert_eq!(contents(&list), [0]);

    // Empty range.
    let next = list.erase_range(list.begin(), list.begin()).unwrap();
    assert_eq!(next, list.begin());
    assert_eq!(contents(&list), [0]);

    // Unreachable end: nothing happens.
    let mut list: UnrolledList<u32, 3> = (0..10).collect();
    let first = list.position(5).unwrap();
    let last = list.position(2).unwrap();
    assert_eq!(list.erase_range(first, last), Err(Error::InvalidPosition));
    assert_eq!(list.len(), 10);
}

#[test]
fn test_stale_position_miri() {
    let mut list: UnrolledList<u32, 2> = (0..4).collect();

    let pos = list.position(3).unwrap();
    list.pop_back();
    // Offset now out of range.
    assert_eq!(list.get_at(pos), None);
    assert_eq!(list.erase(pos), Err(Error::InvalidPosition));

    let pos = list.position(2).unwrap();
    list.pop_back();
    // Node released.
    assert_eq!(list.get_at(pos), None);
    assert_eq!(list.advance(pos), Err(Error::InvalidPosition));

    // The slot comes back for a new node, but the old position stays stale.
    list.push_back(7);
    assert_eq!(list.get_at(pos), None);
    assert_eq!(list.get(2), Some(&7));
}

#[test]
fn test_advance_retreat_miri() {
    let list: UnrolledList<u32, 2> = (0..5).collect();

    let mut pos = list.begin();
    let mut forward = Vec::new();
    while pos != list.end() {
        forward.push(*list.get_at(pos).unwrap());
        pos = list.advance(pos).unwrap();
    }
    assert_eq!(forward, [0, 1, 2, 3, 4]);
    assert_eq!(list.advance(list.end()), Err(Error::InvalidPosition));

    let mut backward = Vec::new();
    let mut pos = list.end();
    loop {
        match list.retreat(pos) {
            Ok(prev) => {
                backward.push(*list.get_at(prev).unwrap());
                pos = prev;
            }
            Err(err) => {
                assert_eq!(err, Error::RetreatPastStart);
                break;
            }
        }
    }
    assert_eq!(backward, [4, 3, 2, 1, 0]);
    assert_eq!(pos, list.begin());
}

#[test]
fn test_index_and_position_miri() {
    let mut list: UnrolledList<u32, 3> = (0..10).collect();

    for i in 0..10 {
        assert_eq!(list[i], i as u32);
        let pos = list.position(i).unwrap();
        assert_eq!(list.index_of(pos), Ok(i));
    }

    assert_eq!(list.position(10), Ok(list.end()));
    assert_eq!(list.index_of(list.end()), Ok(10));
    assert_eq!(list.position(11), Err(Error::InvalidPosition));

    list[4] = 40;
    *list.get_mut(9).unwrap() = 90;
    *list.front_mut().unwrap() = 100;
    *list.back_mut().unwrap() += 1;
    assert_eq!(contents(&list), [100, 1, 2, 3, 40, 5, 6, 7, 8, 91]);
}

#[test]
#[should_panic(expected = "index out of bounds: the len is 3 but the index is 3")]
fn test_index_out_of_bounds_miri() {
    let list: UnrolledList<u32, 2> = (0..3).collect();
    let _ = list[3];
}

#[test]
fn test_insert_range_miri() {
    let mut list: UnrolledList<u32, 3> = [0, 1, 8, 9].into();

    let pos = list.position(2).unwrap();
    list.insert_range(pos, 2..8).unwrap();
    assert_eq!(contents(&list), (0..10).collect::<Vec<_>>());

    list.prepend_range([100, 101]);
    list.append_range([200, 201]);
    assert_eq!(list.front(), Some(&100));
    assert_eq!(list.get(1), Some(&101));
    assert_eq!(list.get(2), Some(&0));
    assert_eq!(list.back(), Some(&201));
    assert_eq!(list.len(), 14);

    list.try_insert_n(list.end(), 3, 7).unwrap();
    assert_eq!(contents(&list)[14..], [7, 7, 7]);

    list.assign_range([5, 6]);
    assert_eq!(contents(&list), [5, 6]);

    assert_eq!(
        list.insert_range(Position::end(), std::iter::empty()),
        Ok(())
    );
    assert_eq!(contents(&list), [5, 6]);
}

#[test]
fn test_from_iter_in_miri() {
    let alloc = BoundedAllocator::new(3);

    let list: UnrolledList<u32, 2, BoundedAllocator> =
        UnrolledList::from_iter_in(0..5, alloc.clone());
    assert_eq!(contents(&list), [0, 1, 2, 3, 4]);
    assert_eq!(list.allocator(), &alloc);
    assert_eq!(alloc.live_nodes(), 3);

    let err = UnrolledList::<u32, 2, BoundedAllocator>::try_from_iter_in(0..2, alloc.clone())
        .unwrap_err();
    assert_eq!(err, Error::AllocationFailed { capacity: 2 });

    // The partial list was dropped with its nodes.
    assert_eq!(alloc.live_nodes(), 3);
    drop(list);
    assert_eq!(alloc.live_nodes(), 0);
}

#[test]
fn test_borrowed_sources_miri() {
    let items = [1u32, 2, 3, 4, 5];

    let mut list: UnrolledList<u32, 2> = UnrolledList::from(&items[..3]);
    assert_eq!(contents(&list), [1, 2, 3]);

    list.extend(&items[3..]);
    assert_eq!(contents(&list), [1, 2, 3, 4, 5]);

    list.try_assign_range(items.iter().rev().copied()).unwrap();
    assert_eq!(contents(&list), [5, 4, 3, 2, 1]);

    let alloc = BoundedAllocator::new(1);
    let mut bounded: UnrolledList<u32, 2, BoundedAllocator> = UnrolledList::new_in(alloc.clone());
    bounded.extend([7, 8]);
    assert_eq!(
        bounded.try_assign_range(items.iter().copied()),
        Err(Error::AllocationFailed { capacity: 2 })
    );
    // The prefix assigned before the refusal stays.
    assert_eq!(contents(&bounded), [1, 2]);
    assert_eq!(alloc.live_nodes(), 1);
}

#[test]
fn test_resize_miri() {
    let mut list: UnrolledList<u32, 4> = UnrolledList::from_elem(3, 5);
    assert_eq!(contents(&list), [3, 3, 3, 3, 3]);

    list.resize(2, 9);
    assert_eq!(contents(&list), [3, 3]);
    list.resize(4, 9);
    assert_eq!(contents(&list), [3, 3, 9, 9]);
    list.resize_default(6);
    assert_eq!(contents(&list), [3, 3, 9, 9, 0, 0]);
    let mut next = 0;
    list.resize_with(7, || {
        next += 1;
        next
    });
    assert_eq!(contents(&list), [3, 3, 9, 9, 0, 0, 1]);
    list.try_resize(5, 1).unwrap();
    assert_eq!(contents(&list), [3, 3, 9, 9, 0]);
    list.insert_n(list.begin(), 2, 8).unwrap();
    assert_eq!(contents(&list), [8, 8, 3, 3, 9, 9, 0]);
    list.resize_default(0);
    assert!(list.is_empty());
    assert_eq!(list.node_count(), 0);
}

#[test]
fn test_clear_frees_node_storage_miri() {
    let mut list: UnrolledList<[u64; 8], 16> = UnrolledList::new();
    for i in 0..1000 {
        list.push_back([i; 8]);
    }
    assert_eq!(list.node_count(), 63);
    assert!(list.nodes.slot_capacity() >= 63);
    let stale = list.position(500).unwrap();

    list.clear();
    assert_eq!(list.node_count(), 0);
    assert_eq!(list.nodes.slot_capacity(), 0);

    // Refill: the old position must not resolve to a new node.
    list.extend((0..1000).map(|i| [i; 8]));
    assert_eq!(list.get_at(stale), None);
    assert_eq!(list.get(500), Some(&[500; 8]));

    // Draining element by element frees the slots too.
    while list.pop_front().is_some() {}
    assert_eq!(list.nodes.slot_capacity(), 0);
}

#[test]
fn test_clear_idempotent_miri() {
    let mut list: UnrolledList<String, 3> = ["a", "b", "c", "d"]
        .into_iter()
        .map(String::from)
        .collect();

    list.clear();
    assert!(list.is_empty());
    assert_eq!(list.len(), 0);
    list.clear();
    assert!(list.is_empty());
    assert_eq!(list.len(), 0);
    assert_eq!(list.node_count(), 0);

    list.push_back("e".to_string());
    assert_eq!(contents(&list), ["e"]);
}

#[test]
fn test_drop_elements_miri() {
    use std::rc::Rc;

    let token = Rc::new(());
    {
        let mut list: UnrolledList<Rc<()>, 3> = UnrolledList::new();
        for _ in 0..10 {
            list.push_back(token.clone());
        }

        let pos = list.position(4).unwrap();
        list.insert(pos, token.clone()).unwrap();
        list.erase(list.begin()).unwrap();
        assert_eq!(Rc::strong_count(&token), 11);
    }

    assert_eq!(Rc::strong_count(&token), 1);
}

#[test]
fn test_equality_and_order_miri() {
    let a: UnrolledList<u32, 2> = (0..5).collect();
    let mut b: UnrolledList<u32, 3> = (1..5).collect();
    b.push_front(0);

    assert_eq!(a, b);
    b.push_back(5);
    assert_ne!(a, b);

    let c: UnrolledList<u32, 2> = (0..6).collect();
    let d: UnrolledList<u32, 2> = [0, 2].into();
    assert!(a < c);
    assert!(c < d);
    assert_eq!(a.cmp(&a.clone()), Ordering::Equal);

    assert_eq!(format!("{:?}", d), "[0, 2]");
}

#[test]
fn test_hash_matches_equality_miri() {
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    let a: UnrolledList<u32, 2> = (0..5).collect();
    let mut b: UnrolledList<u32, 2> = (1..5).collect();
    b.push_front(0);

    assert_eq!(a, b);
    assert_eq!(hash_of(&a), hash_of(&b));
}

#[test]
fn test_swap_miri() {
    let mut a: UnrolledList<u32, 2> = (0..5).collect();
    let mut b: UnrolledList<u32, 2> = [9].into();

    let pos = a.position(3).unwrap();
    a.swap(&mut b);

    assert_eq!(contents(&a), [9]);
    assert_eq!(contents(&b), [0, 1, 2, 3, 4]);
    // Nodes moved along, without touching elements.
    assert_eq!(b.get_at(pos), Some(&3));
}

#[test]
fn test_allocation_failure_push_miri() {
    let alloc = BoundedAllocator::new(2);
    let mut list: UnrolledList<u32, 2, BoundedAllocator> = UnrolledList::new_in(alloc.clone());

    for i in 0..4 {
        list.try_push_back(i).unwrap();
    }
    assert_eq!(alloc.live_nodes(), 2);

    assert_eq!(
        list.try_push_back(4),
        Err(Error::AllocationFailed { capacity: 2 })
    );
    assert_eq!(
        list.try_push_front(4),
        Err(Error::AllocationFailed { capacity: 2 })
    );
    assert_eq!(contents(&list), [0, 1, 2, 3]);

    // A split needs a node too; the list is left untouched.
    let pos = list.position(1).unwrap();
    assert_eq!(
        list.try_insert(pos, 4),
        Err(Error::AllocationFailed { capacity: 2 })
    );
    assert_eq!(contents(&list), [0, 1, 2, 3]);
    assert_eq!(list.node_lens(), [2, 2]);

    // Freeing a node makes room again.
    list.pop_back();
    list.pop_back();
    assert_eq!(alloc.live_nodes(), 1);
    list.try_insert(pos, 4).unwrap();
    assert_eq!(contents(&list), [0, 4, 1]);

    drop(list);
    assert_eq!(alloc.live_nodes(), 0);
}

#[test]
#[should_panic(expected = "unrolled list allocation failed")]
fn test_allocation_failure_panics_miri() {
    let mut list: UnrolledList<u32, 2, BoundedAllocator> =
        UnrolledList::new_in(BoundedAllocator::new(0));
    list.push_back(1);
}

#[test]
fn test_max_len_miri() {
    let list: UnrolledList<u32, 4> = UnrolledList::new();
    assert_eq!(list.max_len(), usize::MAX);

    let list: UnrolledList<u32, 4, BoundedAllocator> =
        UnrolledList::new_in(BoundedAllocator::new(3));
    assert_eq!(list.max_len(), 12);
}

#[test]
fn test_clone_selects_allocator_miri() {
    let shared = BoundedAllocator::new(10);
    let list: UnrolledList<u32, 2, BoundedAllocator> = {
        let mut list = UnrolledList::new_in(shared.clone());
        list.extend([1, 2, 3]);
        list
    };

    let copy = list.clone();
    assert_eq!(copy, list);
    assert_eq!(copy.allocator(), &shared);
    assert_eq!(shared.live_nodes(), 4);

    let fresh = BoundedAllocator::new(10).with_fresh_budget_on_copy(true);
    let mut list: UnrolledList<u32, 2, BoundedAllocator> = UnrolledList::new_in(fresh.clone());
    list.extend([1, 2, 3]);

    let copy = list.try_clone().unwrap();
    assert_eq!(copy, list);
    assert_ne!(copy.allocator(), &fresh);
    assert_eq!(copy.allocator().live_nodes(), 2);
    assert_eq!(fresh.live_nodes(), 2);
}

#[test]
fn test_clone_from_policy_miri() {
    let source_alloc = BoundedAllocator::new(10);
    let mut source: UnrolledList<u32, 2, BoundedAllocator> =
        UnrolledList::new_in(source_alloc.clone());
    source.extend([1, 2, 3]);

    // Without propagation, the destination keeps its allocator.
    let keep = BoundedAllocator::new(10);
    let mut dest: UnrolledList<u32, 2, BoundedAllocator> = UnrolledList::new_in(keep.clone());
    dest.extend([7, 8, 9, 10, 11]);
    dest.clone_from(&source);
    assert_eq!(dest, source);
    assert_eq!(dest.allocator(), &keep);
    assert_eq!(keep.live_nodes(), 2);

    // With propagation, it adopts the source's.
    let adopt = BoundedAllocator::new(10).with_policy(PropagationPolicy {
        on_copy_assignment: true,
        on_move_assignment: false,
    });
    let mut dest: UnrolledList<u32, 2, BoundedAllocator> = UnrolledList::new_in(adopt.clone());
    dest.extend([7, 8, 9]);
    dest.try_assign_clone(&source).unwrap();
    assert_eq!(dest, source);
    assert_eq!(dest.allocator(), &source_alloc);
    assert_eq!(adopt.live_nodes(), 0);
    assert_eq!(source_alloc.live_nodes(), 4);
}

#[test]
fn test_take_in_same_allocator_miri() {
    let alloc = BoundedAllocator::new(4);
    let mut source: UnrolledList<u32, 2, BoundedAllocator> = UnrolledList::new_in(alloc.clone());
    source.extend(0..7);
    let pos = source.position(5).unwrap();

    let taken = UnrolledList::take_in(&mut source, alloc.clone()).unwrap();

    assert!(source.is_empty());
    assert_eq!(source.allocator(), &alloc);
    assert_eq!(contents(&taken), [0, 1, 2, 3, 4, 5, 6]);
    // Same nodes, so positions carry over.
    assert_eq!(taken.get_at(pos), Some(&5));
    assert_eq!(alloc.live_nodes(), 4);
}

#[test]
fn test_take_in_other_allocator_miri() {
    let from = BoundedAllocator::new(4);
    let to = BoundedAllocator::new(4);
    let mut source: UnrolledList<String, 2, BoundedAllocator> = UnrolledList::new_in(from.clone());
    source.extend((0..7).map(|i| i.to_string()));

    let taken = UnrolledList::take_in(&mut source, to.clone()).unwrap();

    assert!(source.is_empty());
    assert_eq!(from.live_nodes(), 0);
    assert_eq!(to.live_nodes(), 4);
    assert_eq!(taken.allocator(), &to);
    assert_eq!(contents(&taken), ["0", "1", "2", "3", "4", "5", "6"]);
}

#[test]
fn test_take_in_refused_miri() {
    let from = BoundedAllocator::new(4);
    let to = BoundedAllocator::new(3);
    let mut source: UnrolledList<u32, 2, BoundedAllocator> = UnrolledList::new_in(from.clone());
    source.extend(0..7);

    let err = UnrolledList::take_in(&mut source, to.clone()).unwrap_err();

    assert_eq!(err, Error::AllocationFailed { capacity: 2 });
    assert_eq!(contents(&source), [0, 1, 2, 3, 4, 5, 6]);
    assert_eq!(from.live_nodes(), 4);
    assert_eq!(to.live_nodes(), 0);
}

#[test]
fn test_assign_take_policy_miri() {
    let source_alloc = BoundedAllocator::new(10);
    let mut source: UnrolledList<u32, 2, BoundedAllocator> =
        UnrolledList::new_in(source_alloc.clone());
    source.extend(0..5);

    // Without propagation, elements move into the destination's nodes.
    let keep = BoundedAllocator::new(10);
    let mut dest: UnrolledList<u32, 2, BoundedAllocator> = UnrolledList::new_in(keep.clone());
    dest.extend([9, 9]);
    dest.assign_take(&mut source).unwrap();
    assert_eq!(contents(&dest), [0, 1, 2, 3, 4]);
    assert!(source.is_empty());
    assert_eq!(dest.allocator(), &keep);
    assert_eq!(keep.live_nodes(), 3);
    assert_eq!(source_alloc.live_nodes(), 0);

    // With propagation, the nodes change owner.
    source.extend(0..5);
    let adopt = BoundedAllocator::new(10).with_policy(PropagationPolicy {
        on_copy_assignment: false,
        on_move_assignment: true,
    });
    let mut dest: UnrolledList<u32, 2, BoundedAllocator> = UnrolledList::new_in(adopt.clone());
    dest.extend([9, 9]);
    let pos = source.position(3).unwrap();
    dest.assign_take(&mut source).unwrap();
    assert_eq!(dest.allocator(), &source_alloc);
    assert_eq!(dest.get_at(pos), Some(&3));
    assert_eq!(adopt.live_nodes(), 0);
    assert_eq!(source_alloc.live_nodes(), 3);
}
