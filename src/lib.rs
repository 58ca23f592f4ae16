//! The `unrolled_list` crate defines the [`UnrolledList`] container, a
//! doubly linked list of fixed-capacity nodes.
//!
//! Each node holds up to `N` elements (by default
//! [`DEFAULT_NODE_CAPACITY`]) contiguously, inline, so traversal touches
//! one small array per node instead of one heap block per element,
//! while insertion and removal near a known [`Position`] still only
//! shift elements inside a single node.
//!
//! A full node is split in half when an insertion lands in it, and a
//! node is released as soon as an erase drains it.  The container
//! never rebalances otherwise, so nodes may stay sparse after erases.
//!
//! Nodes are admitted by a [`NodeAllocator`].  The default [`Global`]
//! allocator admits everything; [`BoundedAllocator`] caps the number of
//! live nodes, and lets the caller pick how copies and assignments
//! carry the allocator along ([`PropagationPolicy`]).  Every operation
//! that may need a node has a `try_` flavour that reports a refused
//! node as [`Error::AllocationFailed`] and leaves the list as it was.
//!
//! # Examples
//!
//! ```rust
//! use unrolled_list::UnrolledList;
//!
//! let mut list: UnrolledList<u32, 4> = UnrolledList::new();
//! list.extend([1, 2, 3]);
//! list.push_front(0);
//!
//! let pos = list.position(1).unwrap();
//! let inserted = list.insert(pos, 10).unwrap();
//! assert_eq!(list.get_at(inserted), Some(&10));
//!
//! let (erased, next) = list.erase(list.position(2).unwrap()).unwrap();
//! assert_eq!(erased, 1);
//! assert_eq!(list.get_at(next), Some(&2));
//! assert_eq!(list.iter().copied().collect::<Vec<_>>(), [0, 10, 2, 3]);
//! ```
//!
//! ```rust
//! use unrolled_list::BoundedAllocator;
//! use unrolled_list::Error;
//! use unrolled_list::UnrolledList;
//!
//! let alloc = BoundedAllocator::new(1);
//! let mut list: UnrolledList<u32, 2, _> = UnrolledList::new_in(alloc.clone());
//! list.try_push_back(1).unwrap();
//! list.try_push_back(2).unwrap();
//! assert_eq!(list.try_push_back(3), Err(Error::AllocationFailed { capacity: 2 }));
//! assert_eq!(list.len(), 2);
//! assert_eq!(alloc.live_nodes(), 1);
//! ```

mod allocator;
mod arena;
mod cursor;
mod error;
mod iter;
mod list;
mod node;

#[cfg(test)]
mod model_tests;

pub use allocator::BoundedAllocator;
pub use allocator::Global;
pub use allocator::NodeAllocator;
pub use allocator::PropagationPolicy;

pub use cursor::Cursor;
pub use cursor::CursorMut;
pub use cursor::Position;

pub use error::Error;

pub use iter::IntoIter;
pub use iter::Iter;
pub use iter::IterMut;

pub use list::UnrolledList;

/// The number of elements per node when the capacity isn't specified.
pub const DEFAULT_NODE_CAPACITY: usize = 10;
