//! The `cursor` module addresses elements of an [`UnrolledList`] by
//! position.
//!
//! A [`Position`] is a plain `Copy` token: it names a node and an offset
//! in that node, and must be handed back to the list it came from.  The
//! [`Cursor`] and [`CursorMut`] types pair a position with a borrow of
//! the list, for read-only and mutable traversal respectively.  A
//! [`CursorMut`] can always be downgraded to a [`Cursor`], never the
//! other way around.
use std::fmt;

use crate::allocator::NodeAllocator;
use crate::arena::NodeId;
use crate::Error;
use crate::UnrolledList;

/// A [`Position`] addresses one element of an [`UnrolledList`], or the
/// end position one past the last element.
///
/// Positions are not borrowed from the list, so they survive mutations.
/// After a mutation, a position is only guaranteed to address the same
/// element if the mutation did not touch that element's node:
///
/// - positions whose node was released (drained by an erase or pop,
///   or dropped by `clear`) are detected, and rejected with
///   [`Error::InvalidPosition`];
/// - positions whose offset fell past the end of their node are
///   rejected the same way;
/// - positions into a node that was shifted in place (an insert, an
///   erase, or a split of that node) still resolve, but may now address
///   a different element.
///
/// All end positions compare equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    node: Option<NodeId>,
    offset: usize,
}

impl Position {
    #[must_use]
    #[inline(always)]
    pub(crate) fn new(node: NodeId, offset: usize) -> Self {
        Position {
            node: Some(node),
            offset,
        }
    }

    /// Returns the position of the first element of `node`, or the end
    /// position when `node` is `None`.
    #[must_use]
    #[inline(always)]
    pub(crate) fn node_start(node: Option<NodeId>) -> Self {
        Position { node, offset: 0 }
    }

    /// Returns the end position, valid for every list.
    #[must_use]
    #[inline(always)]
    pub fn end() -> Self {
        Position {
            node: None,
            offset: 0,
        }
    }

    /// Determines whether this is the end position.
    #[must_use]
    #[inline(always)]
    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }

    /// Returns the offset of the element in its node (0 for the end).
    #[must_use]
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    #[inline(always)]
    pub(crate) fn node(&self) -> Option<NodeId> {
        self.node
    }
}

/// A read-only cursor over an [`UnrolledList`].
pub struct Cursor<'a, T, const N: usize, A: NodeAllocator> {
    list: &'a UnrolledList<T, N, A>,
    pos: Position,
}

impl<'a, T, const N: usize, A: NodeAllocator> Cursor<'a, T, N, A> {
    #[must_use]
    #[inline(always)]
    pub(crate) fn new(list: &'a UnrolledList<T, N, A>, pos: Position) -> Self {
        Cursor { list, pos }
    }

    #[must_use]
    #[inline(always)]
    pub fn position(&self) -> Position {
        self.pos
    }

    #[must_use]
    #[inline(always)]
    pub fn is_end(&self) -> bool {
        self.pos.is_end()
    }

    /// Returns the element under the cursor, or `None` at the end (or
    /// for a stale position).
    #[must_use]
    #[inline(always)]
    pub fn get(&self) -> Option<&'a T> {
        self.list.get_at(self.pos)
    }

    /// Returns the index of the element under the cursor.
    pub fn index(&self) -> Result<usize, Error> {
        self.list.index_of(self.pos)
    }

    /// Moves to the next element (or the end position).
    ///
    /// Fails, without moving, at the end position.
    pub fn move_next(&mut self) -> Result<(), Error> {
        self.pos = self.list.advance(self.pos)?;
        Ok(())
    }

    /// Moves to the previous element.
    ///
    /// Fails, without moving, at the first element.
    pub fn move_prev(&mut self) -> Result<(), Error> {
        self.pos = self.list.retreat(self.pos)?;
        Ok(())
    }
}

impl<T, const N: usize, A: NodeAllocator> Clone for Cursor<'_, T, N, A> {
    #[inline(always)]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, const N: usize, A: NodeAllocator> Copy for Cursor<'_, T, N, A> {}

impl<T: fmt::Debug, const N: usize, A: NodeAllocator> fmt::Debug for Cursor<'_, T, N, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("pos", &self.pos)
            .field("current", &self.get())
            .finish()
    }
}

/// A cursor over an [`UnrolledList`] that may edit the list around the
/// current position.
///
/// Edits made through the cursor keep the cursor itself valid; other
/// positions follow the usual invalidation rules of [`Position`].
pub struct CursorMut<'a, T, const N: usize, A: NodeAllocator> {
    list: &'a mut UnrolledList<T, N, A>,
    pos: Position,
}

impl<'a, T, const N: usize, A: NodeAllocator> CursorMut<'a, T, N, A> {
    #[must_use]
    #[inline(always)]
    pub(crate) fn new(list: &'a mut UnrolledList<T, N, A>, pos: Position) -> Self {
        CursorMut { list, pos }
    }

    #[must_use]
    #[inline(always)]
    pub fn position(&self) -> Position {
        self.pos
    }

    #[must_use]
    #[inline(always)]
    pub fn is_end(&self) -> bool {
        self.pos.is_end()
    }

    #[must_use]
    #[inline(always)]
    pub fn get(&self) -> Option<&T> {
        self.list.get_at(self.pos)
    }

    #[must_use]
    #[inline(always)]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.list.get_at_mut(self.pos)
    }

    pub fn move_next(&mut self) -> Result<(), Error> {
        self.pos = self.list.advance(self.pos)?;
        Ok(())
    }

    pub fn move_prev(&mut self) -> Result<(), Error> {
        self.pos = self.list.retreat(self.pos)?;
        Ok(())
    }

    /// Returns a read-only cursor at the same position, borrowing from
    /// `self`.
    #[must_use]
    #[inline(always)]
    pub fn as_cursor(&self) -> Cursor<'_, T, N, A> {
        Cursor::new(&*self.list, self.pos)
    }

    /// Inserts `value` before the current element (or appends at the
    /// end position).  The cursor stays on the same element.
    pub fn insert_before(&mut self, value: T) -> Result<(), Error> {
        let inserted = self.list.try_insert(self.pos, value)?;
        self.pos = self.list.advance(inserted)?;
        Ok(())
    }

    /// Removes and returns the current element, and moves to the
    /// element that followed it.
    pub fn remove_current(&mut self) -> Result<T, Error> {
        let (value, next) = self.list.erase(self.pos)?;
        self.pos = next;
        Ok(value)
    }
}

impl<'a, T, const N: usize, A: NodeAllocator> From<CursorMut<'a, T, N, A>> for Cursor<'a, T, N, A> {
    #[inline(always)]
    fn from(cursor: CursorMut<'a, T, N, A>) -> Self {
        Cursor::new(cursor.list, cursor.pos)
    }
}

impl<T: fmt::Debug, const N: usize, A: NodeAllocator> fmt::Debug for CursorMut<'_, T, N, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorMut")
            .field("pos", &self.pos)
            .field("current", &self.get())
            .finish()
    }
}

#[test]
fn test_position_end_miri() {
    let end = Position::end();
    assert!(end.is_end());
    assert_eq!(end.offset(), 0);
    assert_eq!(end, Position::node_start(None));

    let list: UnrolledList<u32, 4> = UnrolledList::new();
    assert_eq!(list.end(), end);
    assert_eq!(list.begin(), end);
}

#[test]
fn test_cursor_walk_miri() {
    let list: UnrolledList<u32, 3> = (0..7).collect();

    let mut cursor = list.cursor_front();
    let mut seen = Vec::new();
    while let Some(item) = cursor.get() {
        assert_eq!(cursor.index(), Ok(seen.len()));
        seen.push(*item);
        cursor.move_next().unwrap();
    }

    assert!(cursor.is_end());
    assert_eq!(cursor.index(), Ok(7));
    assert_eq!(cursor.move_next(), Err(Error::InvalidPosition));
    assert_eq!(seen, [0, 1, 2, 3, 4, 5, 6]);

    let mut back = Vec::new();
    while cursor.move_prev().is_ok() {
        back.push(*cursor.get().unwrap());
    }
    assert_eq!(back, [6, 5, 4, 3, 2, 1, 0]);
    assert_eq!(cursor.position(), list.begin());

    // Copies move independently.
    let mut copy = cursor;
    copy.move_next().unwrap();
    assert_eq!(copy.get(), Some(&1));
    assert_eq!(cursor.get(), Some(&0));
}

#[test]
fn test_cursor_mut_edit_miri() {
    let mut list: UnrolledList<u32, 2> = [1, 3, 5].into();

    let mut cursor = list.cursor_front_mut();
    cursor.insert_before(0).unwrap();
    assert_eq!(cursor.get(), Some(&1));

    cursor.move_next().unwrap();
    *cursor.get_mut().unwrap() = 2;
    cursor.move_next().unwrap();
    assert_eq!(cursor.remove_current(), Ok(5));
    assert!(cursor.is_end());
    assert_eq!(cursor.remove_current(), Err(Error::InvalidPosition));

    cursor.insert_before(4).unwrap();
    assert!(cursor.is_end());
    cursor.move_prev().unwrap();
    assert_eq!(cursor.get(), Some(&4));
    assert_eq!(cursor.as_cursor().index(), Ok(3));

    let cursor: Cursor<'_, u32, 2, _> = cursor.into();
    assert_eq!(cursor.get(), Some(&4));

    assert_eq!(list.iter().copied().collect::<Vec<_>>(), [0, 1, 2, 4]);
}

#[test]
fn test_cursor_mut_insert_splits_miri() {
    let mut list: UnrolledList<u32, 4> = (0..4).collect();

    let pos = list.position(3).unwrap();
    let mut cursor = list.cursor_mut(pos);
    for i in 10..15 {
        cursor.insert_before(i).unwrap();
        assert_eq!(cursor.get(), Some(&3));
    }

    assert_eq!(
        list.iter().copied().collect::<Vec<_>>(),
        [0, 1, 2, 10, 11, 12, 13, 14, 3]
    );
}

#[test]
fn test_cursor_mut_drain_miri() {
    let mut list: UnrolledList<String, 2> = (0..5).map(|i| i.to_string()).collect();

    let mut cursor = list.cursor_front_mut();
    let mut removed = Vec::new();
    while !cursor.is_end() {
        removed.push(cursor.remove_current().unwrap());
    }

    assert_eq!(removed, ["0", "1", "2", "3", "4"]);
    assert!(list.is_empty());
    assert_eq!(list.node_count(), 0);
}
