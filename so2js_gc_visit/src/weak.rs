//! Weak references
//!
//! A `WeakRef` is a slot in the weak reference table that a managed object points at. A
//! `WeakRoot` is a weak pointer held outside the heap. Neither keeps its target alive.

use crate::pointer::GcPtr;

/// Lifecycle state of a weak reference slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeakSlotState {
    /// The slot is on the free list and holds nothing
    Free,
    /// In use, but not yet reached during the current marking pass
    Unmarked,
    /// In use and reached by the current marking pass
    Marked,
}

/// A weak reference slot.
#[derive(Debug)]
pub struct WeakRef {
    state: WeakSlotState,
    target: Option<GcPtr<u8>>,
}

impl WeakRef {
    pub fn new(target: Option<GcPtr<u8>>) -> WeakRef {
        WeakRef {
            state: WeakSlotState::Unmarked,
            target,
        }
    }

    pub fn free_slot() -> WeakRef {
        WeakRef {
            state: WeakSlotState::Free,
            target: None,
        }
    }

    #[inline]
    pub fn state(&self) -> WeakSlotState {
        self.state
    }

    #[inline]
    pub fn has_pointer(&self) -> bool {
        self.target.is_some()
    }

    #[inline]
    pub fn pointer(&self) -> Option<GcPtr<u8>> {
        self.target
    }

    #[inline]
    pub fn set_pointer(&mut self, target: Option<GcPtr<u8>>) {
        debug_assert!(self.state != WeakSlotState::Free, "writing to a free weak slot");
        self.target = target;
    }

    /// Clear the target after it has been collected.
    #[inline]
    pub fn clear_pointer(&mut self) {
        self.target = None;
    }

    #[inline]
    pub fn mark(&mut self) {
        debug_assert!(self.state != WeakSlotState::Free, "marking a free weak slot");
        self.state = WeakSlotState::Marked;
    }

    #[inline]
    pub fn unmark(&mut self) {
        if self.state == WeakSlotState::Marked {
            self.state = WeakSlotState::Unmarked;
        }
    }

    /// Return the slot to the free list.
    pub fn free(&mut self) {
        self.state = WeakSlotState::Free;
        self.target = None;
    }
}

/// A weak pointer held by a root.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WeakRoot {
    target: Option<GcPtr<u8>>,
}

impl WeakRoot {
    pub const fn new(target: Option<GcPtr<u8>>) -> WeakRoot {
        WeakRoot { target }
    }

    #[inline]
    pub fn get(&self) -> Option<GcPtr<u8>> {
        self.target
    }

    #[inline]
    pub fn set(&mut self, target: Option<GcPtr<u8>>) {
        self.target = target;
    }

    #[inline]
    pub fn clear(&mut self) {
        self.target = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weak_ref_states() {
        let mut weak = WeakRef::new(GcPtr::from_addr(0x100));
        assert_eq!(weak.state(), WeakSlotState::Unmarked);

        weak.mark();
        assert_eq!(weak.state(), WeakSlotState::Marked);

        weak.unmark();
        assert_eq!(weak.state(), WeakSlotState::Unmarked);
        assert!(weak.has_pointer());

        weak.free();
        assert_eq!(weak.state(), WeakSlotState::Free);
        assert!(!weak.has_pointer());
    }
}
