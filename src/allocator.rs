//! The `allocator` module defines the [`NodeAllocator`] abstraction that
//! governs node creation for an [`crate::UnrolledList`].
//!
//! Elements live inline in their node, so there is a single allocator
//! per list: it admits (or refuses) each new node and is told when a
//! node is released.  Allocators are stateful values with an identity
//! (`PartialEq`): two lists whose allocators compare equal may hand
//! nodes to each other wholesale, while lists with different
//! allocators must transfer elements into freshly admitted nodes.
//!
//! Whether assignment carries the allocator along is a plain
//! [`PropagationPolicy`] value chosen by the allocator instance.
use std::cell::Cell;
use std::rc::Rc;

/// Decides whether assignments transfer the allocator identity from
/// the source list to the destination list.
///
/// The default policy never propagates: the destination keeps its
/// own allocator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PropagationPolicy {
    /// [`crate::UnrolledList::try_assign_clone`] (and `clone_from`)
    /// adopt the source's allocator.
    pub on_copy_assignment: bool,
    /// [`crate::UnrolledList::assign_take`] adopts the source's
    /// allocator.
    pub on_move_assignment: bool,
}

/// A [`NodeAllocator`] admits and releases the nodes of a list.
pub trait NodeAllocator: Clone + PartialEq {
    /// Reserves room for one more node of `capacity` elements.
    ///
    /// Returns false when the allocator is exhausted; the caller then
    /// fails the operation without any side effect.
    fn allocate_node(&self, capacity: usize) -> bool;

    /// Releases one node previously admitted by `allocate_node`.
    fn deallocate_node(&self, capacity: usize);

    /// Returns the allocator a copy of a list should use.
    #[inline(always)]
    fn select_on_container_copy(&self) -> Self {
        self.clone()
    }

    /// Returns the propagation policy for assignments.
    #[inline(always)]
    fn policy(&self) -> PropagationPolicy {
        PropagationPolicy::default()
    }

    /// Returns the maximum number of nodes this allocator could admit.
    #[inline(always)]
    fn max_nodes(&self) -> usize {
        usize::MAX
    }
}

/// The [`Global`] allocator admits every node; memory comes from the
/// global heap.  All [`Global`] instances are equal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Global;

impl NodeAllocator for Global {
    #[inline(always)]
    fn allocate_node(&self, _capacity: usize) -> bool {
        true
    }

    #[inline(always)]
    fn deallocate_node(&self, _capacity: usize) {}
}

#[derive(Debug)]
struct Budget {
    limit: usize,
    live: Cell<usize>,
    high_water: Cell<usize>,
}

/// A [`BoundedAllocator`] admits at most `limit` live nodes, shared
/// by every clone of the allocator.
///
/// Clones compare equal (they draw from the same budget); separately
/// constructed allocators never do, even with the same limit.
#[derive(Clone, Debug)]
pub struct BoundedAllocator {
    budget: Rc<Budget>,
    policy: PropagationPolicy,
    fresh_on_copy: bool,
}

impl BoundedAllocator {
    /// Returns an allocator that admits up to `limit` live nodes.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        BoundedAllocator {
            budget: Rc::new(Budget {
                limit,
                live: Cell::new(0),
                high_water: Cell::new(0),
            }),
            policy: PropagationPolicy::default(),
            fresh_on_copy: false,
        }
    }

    /// Sets the propagation policy for lists that use this allocator.
    #[must_use]
    pub fn with_policy(mut self, policy: PropagationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// When `fresh` is true, copies of a list get a new budget with the
    /// same limit instead of sharing this one.
    #[must_use]
    pub fn with_fresh_budget_on_copy(mut self, fresh: bool) -> Self {
        self.fresh_on_copy = fresh;
        self
    }

    /// Returns the maximum number of live nodes.
    #[must_use]
    #[inline(always)]
    pub fn limit(&self) -> usize {
        self.budget.limit
    }

    /// Returns the number of nodes currently admitted.
    #[must_use]
    #[inline(always)]
    pub fn live_nodes(&self) -> usize {
        self.budget.live.get()
    }

    /// Returns the largest number of nodes ever admitted at once.
    #[must_use]
    #[inline(always)]
    pub fn high_water(&self) -> usize {
        self.budget.high_water.get()
    }
}

impl PartialEq for BoundedAllocator {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.budget, &other.budget)
    }
}

impl Eq for BoundedAllocator {}

impl NodeAllocator for BoundedAllocator {
    fn allocate_node(&self, _capacity: usize) -> bool {
        let live = self.budget.live.get();
        if live >= self.budget.limit {
            return false;
        }

        self.budget.live.set(live + 1);
        self.budget
            .high_water
            .set(self.budget.high_water.get().max(live + 1));
        true
    }

    fn deallocate_node(&self, _capacity: usize) {
        let live = self.budget.live.get();
        assert!(live > 0, "released more nodes than were allocated");
        self.budget.live.set(live - 1);
    }

    fn select_on_container_copy(&self) -> Self {
        if !self.fresh_on_copy {
            return self.clone();
        }

        BoundedAllocator::new(self.budget.limit)
            .with_policy(self.policy)
            .with_fresh_budget_on_copy(true)
    }

    #[inline(always)]
    fn policy(&self) -> PropagationPolicy {
        self.policy
    }

    #[inline(always)]
    fn max_nodes(&self) -> usize {
        self.budget.limit
    }
}

#[test]
fn test_global_miri() {
    assert!(Global.allocate_node(10));
    Global.deallocate_node(10);
    assert_eq!(Global.select_on_container_copy(), Global);
    assert_eq!(Global.policy(), PropagationPolicy::default());
    assert_eq!(Global.max_nodes(), usize::MAX);
}

#[test]
fn test_bounded_budget_miri() {
    let alloc = BoundedAllocator::new(2);
    let shared = alloc.clone();

    assert!(alloc.allocate_node(4));
    assert!(shared.allocate_node(4));
    assert!(!alloc.allocate_node(4));
    assert_eq!(alloc.live_nodes(), 2);

    shared.deallocate_node(4);
    assert_eq!(alloc.live_nodes(), 1);
    assert!(alloc.allocate_node(4));
    assert_eq!(alloc.high_water(), 2);
}

#[test]
fn test_bounded_identity_miri() {
    let alloc = BoundedAllocator::new(2);

    assert_eq!(alloc, alloc.clone());
    assert_ne!(alloc, BoundedAllocator::new(2));

    // Copies share the budget by default...
    assert_eq!(alloc.select_on_container_copy(), alloc);

    // ... unless asked for a fresh one.
    let fresh = alloc.clone().with_fresh_budget_on_copy(true);
    let copy = fresh.select_on_container_copy();
    assert_ne!(copy, fresh);
    assert_eq!(copy.limit(), 2);
    assert_eq!(copy.live_nodes(), 0);
}

#[test]
#[should_panic(expected = "released more nodes than were allocated")]
fn test_bounded_over_release_miri() {
    let alloc = BoundedAllocator::new(1);
    alloc.deallocate_node(4);
}
