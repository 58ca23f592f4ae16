/// Failures reported by [`crate::UnrolledList`] operations.
///
/// A failed operation has no effect on the list, except where the
/// operation's documentation says otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Error {
    /// The list's [`crate::NodeAllocator`] refused to admit a new node.
    #[error("node allocator refused a node of {capacity} elements")]
    AllocationFailed { capacity: usize },

    /// The position is the end position where an element is needed, or
    /// it names a node that was released or an offset out of range.
    #[error("position does not address a live element")]
    InvalidPosition,

    /// Retreating from the first element (or from the end of an empty
    /// list).
    #[error("cannot retreat past the first element")]
    RetreatPastStart,
}

#[test]
fn test_display_miri() {
    assert_eq!(
        Error::AllocationFailed { capacity: 10 }.to_string(),
        "node allocator refused a node of 10 elements"
    );
    assert_eq!(
        Error::InvalidPosition.to_string(),
        "position does not address a live element"
    );
    assert_eq!(
        Error::RetreatPastStart.to_string(),
        "cannot retreat past the first element"
    );
}
