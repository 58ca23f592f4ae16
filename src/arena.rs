//! The `arena` module stores [`Node`]s in index-addressed slots.
//!
//! Links between nodes are [`NodeId`]s (slot index plus generation),
//! never pointers.  Nodes are boxed, so a released slot only keeps its
//! generation and an empty pointer until it is reused.  Every node gets
//! a fresh generation from an arena-wide counter that never repeats, so
//! any [`NodeId`] still pointing at a released node no longer resolves,
//! even after its slot is reused or the slot table shrinks.
#![deny(unsafe_op_in_unsafe_fn)]

use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::node::Node;

/// Names a node slot in a [`NodeArena`].  A [`NodeId`] only resolves
/// while the node it was issued for is alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeId {
    index: usize,
    generation: u64,
}

#[derive(Debug)]
pub(crate) struct Slot<T, const N: usize> {
    generation: u64,
    node: Option<Box<Node<T, N>>>,
}

/// A [`NodeArena`] owns every node of one list.
#[derive(Debug)]
pub(crate) struct NodeArena<T, const N: usize> {
    slots: Vec<Slot<T, N>>,
    free: Vec<usize>,
    live: usize,
    next_generation: u64,
}

impl<T, const N: usize> Default for NodeArena<T, N> {
    fn default() -> Self {
        NodeArena {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            next_generation: 0,
        }
    }
}

impl<T, const N: usize> NodeArena<T, N> {
    /// Returns the number of live nodes.
    #[must_use]
    #[inline(always)]
    pub fn live(&self) -> usize {
        self.live
    }

    /// Stores `node` in a free slot (or a fresh one) and returns its id.
    pub fn insert(&mut self, node: Node<T, N>) -> NodeId {
        let generation = self.next_generation;
        self.next_generation = generation
            .checked_add(1)
            .expect("node generations must not wrap around");
        self.live += 1;

        let node = Some(Box::new(node));
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            assert!(slot.node.is_none());
            *slot = Slot { generation, node };
            return NodeId { index, generation };
        }

        let index = self.slots.len();
        self.slots.push(Slot { generation, node });
        NodeId { index, generation }
    }

    /// Takes the node for `id` out of the arena and releases its slot.
    /// Once the last live node leaves, the slot table itself is freed.
    ///
    /// Panics if `id` does not resolve.
    pub fn remove(&mut self, id: NodeId) -> Node<T, N> {
        let node = self
            .slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.take())
            .expect("stale node id");

        self.free.push(id.index);
        self.live -= 1;
        if self.live == 0 {
            self.release_slots();
        }

        *node
    }

    /// Drops every live node, frees the slot table, and returns how many
    /// nodes were released.
    pub fn clear(&mut self) -> usize {
        let released = self.live;

        self.live = 0;
        self.release_slots();
        released
    }

    /// Gives the slot table back to the heap.  Generations keep counting
    /// from `next_generation`, so old ids stay stale.
    fn release_slots(&mut self) {
        assert_eq!(self.live, 0);
        self.slots = Vec::new();
        self.free = Vec::new();
    }

    /// Returns the node for `id`, if `id` still resolves.
    #[must_use]
    #[inline(always)]
    pub fn get(&self, id: NodeId) -> Option<&Node<T, N>> {
        let slot = self.slots.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }

        slot.node.as_deref()
    }

    #[must_use]
    #[inline(always)]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<T, N>> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }

        slot.node.as_deref_mut()
    }

    /// Returns the node for an id that the chain links guarantee is live.
    #[must_use]
    #[inline(always)]
    pub fn node(&self, id: NodeId) -> &Node<T, N> {
        self.get(id).expect("chain links must reference live nodes")
    }

    #[must_use]
    #[inline(always)]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node<T, N> {
        self.get_mut(id)
            .expect("chain links must reference live nodes")
    }

    /// Returns a handle that can lend out disjoint mutable nodes for the
    /// lifetime of the exclusive borrow of `self`.
    #[must_use]
    pub fn raw(&mut self) -> RawNodes<'_, T, N> {
        RawNodes {
            base: NonNull::from(&mut self.slots[..]).cast(),
            len: self.slots.len(),
            _marker: PhantomData,
        }
    }

    /// Returns the number of slots the arena has room for without
    /// growing.
    #[cfg(test)]
    pub(crate) fn slot_capacity(&self) -> usize {
        self.slots.capacity()
    }
}

/// Lends out `&'a mut Node`s for distinct ids out of one exclusive
/// borrow of a [`NodeArena`].
#[derive(Debug)]
pub(crate) struct RawNodes<'a, T, const N: usize> {
    base: NonNull<Slot<T, N>>,
    len: usize,
    _marker: PhantomData<&'a mut [Slot<T, N>]>,
}

impl<'a, T, const N: usize> RawNodes<'a, T, N> {
    /// Returns the node for `id`.
    ///
    /// Panics if `id` does not resolve.
    ///
    /// # Safety
    ///
    /// The caller must not call this method twice for the same `id`
    /// while the first reference is alive.
    #[must_use]
    pub unsafe fn node_mut(&self, id: NodeId) -> &'a mut Node<T, N> {
        assert!(id.index < self.len);
        // SAFETY: `id.index` is in bounds, the arena is exclusively
        // borrowed for `'a`, and the caller never aliases a slot.
        let slot = unsafe { &mut *self.base.as_ptr().add(id.index) };
        assert_eq!(slot.generation, id.generation, "stale node id");
        slot.node.as_deref_mut().expect("stale node id")
    }
}

// RawNodes is as thread-compatible as `&mut [Slot<T, N>]`.
unsafe impl<T: Send, const N: usize> Send for RawNodes<'_, T, N> {}
unsafe impl<T: Sync, const N: usize> Sync for RawNodes<'_, T, N> {}

#[test]
fn test_insert_remove_reuse_miri() {
    let mut arena: NodeArena<u32, 4> = Default::default();

    let a = arena.insert(Node::new());
    let b = arena.insert(Node::new());
    assert_ne!(a, b);
    assert_eq!(arena.live(), 2);

    arena.node_mut(a).append(1);
    assert_eq!(arena.node(a).items(), &[1]);

    let removed = arena.remove(a);
    assert_eq!(removed.items(), &[1]);
    assert_eq!(arena.live(), 1);
    assert!(arena.get(a).is_none());

    // The slot comes back, under a new generation.
    let c = arena.insert(Node::new());
    assert_eq!(c.index, a.index);
    assert_ne!(c, a);
    assert!(arena.get(a).is_none());
    assert!(arena.get(c).is_some());
}

#[test]
fn test_clear_miri() {
    let mut arena: NodeArena<u32, 4> = Default::default();

    let a = arena.insert(Node::new());
    let b = arena.insert(Node::new());
    arena.remove(b);

    assert_eq!(arena.clear(), 1);
    assert_eq!(arena.live(), 0);
    assert_eq!(arena.slot_capacity(), 0);
    assert!(arena.get(a).is_none());

    // Fresh slots reuse index 0 and 1, under new generations.
    let c = arena.insert(Node::new());
    let d = arena.insert(Node::new());
    assert_eq!(c.index, a.index);
    assert!(arena.get(a).is_none());
    assert!(arena.get(c).is_some());
    assert!(arena.get(d).is_some());
    assert_eq!(arena.live(), 2);
    assert_eq!(arena.slots.len(), 2);
}

#[test]
fn test_remove_last_frees_slots_miri() {
    let mut arena: NodeArena<u32, 4> = Default::default();

    let ids: Vec<NodeId> = (0..8).map(|_| arena.insert(Node::new())).collect();
    for &id in &ids[1..] {
        let _ = arena.remove(id);
    }
    assert!(arena.slot_capacity() >= 8);

    let _ = arena.remove(ids[0]);
    assert_eq!(arena.live(), 0);
    assert_eq!(arena.slot_capacity(), 0);
    assert!(ids.iter().all(|&id| arena.get(id).is_none()));
}

#[test]
fn test_free_slot_is_small_miri() {
    // Released slots don't keep room for N elements.
    assert!(
        std::mem::size_of::<Slot<[u64; 8], 16>>()
            <= 2 * std::mem::size_of::<u64>()
    );
}

#[test]
fn test_generation_past_u32_miri() {
    let mut arena: NodeArena<u32, 4> = Default::default();
    arena.next_generation = u32::MAX as u64;

    // Keep one node alive so the slot table survives the churn.
    let _anchor = arena.insert(Node::new());
    let old = arena.insert(Node::new());
    let _ = arena.remove(old);
    let new = arena.insert(Node::new());

    assert_eq!(new.index, old.index);
    assert!(new.generation > u32::MAX as u64);
    assert!(arena.get(old).is_none());
    assert!(arena.get(new).is_some());
}

#[test]
#[should_panic(expected = "stale node id")]
fn test_remove_after_slots_freed_miri() {
    let mut arena: NodeArena<u32, 4> = Default::default();

    let _ = arena.insert(Node::new());
    let b = arena.insert(Node::new());
    assert_eq!(arena.clear(), 2);
    arena.remove(b);
}

#[test]
#[should_panic(expected = "stale node id")]
fn test_remove_stale_miri() {
    let mut arena: NodeArena<u32, 4> = Default::default();

    let a = arena.insert(Node::new());
    arena.remove(a);
    let _ = arena.insert(Node::new());
    arena.remove(a);
}

#[test]
fn test_raw_disjoint_miri() {
    let mut arena: NodeArena<u32, 4> = Default::default();

    let a = arena.insert(Node::new());
    let b = arena.insert(Node::new());

    let raw = arena.raw();
    // SAFETY: distinct ids.
    let (x, y) = unsafe { (raw.node_mut(a), raw.node_mut(b)) };
    x.append(1);
    y.append(2);

    assert_eq!(arena.node(a).items(), &[1]);
    assert_eq!(arena.node(b).items(), &[2]);
}
