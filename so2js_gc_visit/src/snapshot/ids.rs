//! Snapshot node IDs
//!
//! Objects keep their ID across moves. Symbols and numbers get one ID per distinct value.

use hashbrown::HashMap;

use crate::{
    pointer::GcPtr,
    section::RootSection,
    value::{SymbolId, Value},
};

use super::NodeId;

/// Node IDs that are fixed for every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum ReservedObjectId {
    SuperRoot = 0,
    GcRoots = 1,
    // One ID per root section follows GcRoots
    Undefined = 2 + RootSection::COUNT as u64,
    Null,
    True,
    False,
    FirstNonReserved,
}

/// Assigns stable snapshot IDs to objects, symbols and numbers.
///
/// IDs are odd so they can be told apart from native (non-heap) node IDs. An object keeps its ID
/// across relocation as long as the collector reports the move with `move_object`.
#[derive(Debug)]
pub struct IdTracker {
    objects: HashMap<usize, NodeId>,
    symbols: HashMap<SymbolId, NodeId>,
    numbers: HashMap<u64, NodeId>,
    next_id: NodeId,
}

impl IdTracker {
    const ID_STEP: NodeId = 2;

    pub fn new() -> IdTracker {
        IdTracker {
            objects: HashMap::new(),
            symbols: HashMap::new(),
            numbers: HashMap::new(),
            next_id: IdTracker::reserved(ReservedObjectId::FirstNonReserved),
        }
    }

    #[inline]
    pub const fn reserved(id: ReservedObjectId) -> NodeId {
        IdTracker::reserved_index(id as u64)
    }

    #[inline]
    const fn reserved_index(index: u64) -> NodeId {
        index * IdTracker::ID_STEP + 1
    }

    /// ID of the synthetic node for a root section.
    #[inline]
    pub const fn root_section_id(section: RootSection) -> NodeId {
        IdTracker::reserved_index(ReservedObjectId::GcRoots as u64 + 1 + section.index() as u64)
    }

    fn next(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += IdTracker::ID_STEP;
        id
    }

    pub fn object_id(&mut self, ptr: GcPtr<u8>) -> NodeId {
        if let Some(id) = self.objects.get(&ptr.addr()) {
            return *id;
        }

        let id = self.next();
        self.objects.insert(ptr.addr(), id);
        id
    }

    pub fn symbol_id(&mut self, sym: SymbolId) -> NodeId {
        if let Some(id) = self.symbols.get(&sym) {
            return *id;
        }

        let id = self.next();
        self.symbols.insert(sym, id);
        id
    }

    pub fn number_id(&mut self, num: f64) -> NodeId {
        // All NaNs share one node
        let bits = if num.is_nan() {
            f64::NAN.to_bits()
        } else {
            num.to_bits()
        };

        if let Some(id) = self.numbers.get(&bits) {
            return *id;
        }

        let id = self.next();
        self.numbers.insert(bits, id);
        id
    }

    /// The node a value refers to, or `None` for values that have no node.
    pub fn value_id(&mut self, value: Value) -> Option<NodeId> {
        match value {
            Value::Empty => None,
            Value::Undefined => Some(IdTracker::reserved(ReservedObjectId::Undefined)),
            Value::Null => Some(IdTracker::reserved(ReservedObjectId::Null)),
            Value::Bool(true) => Some(IdTracker::reserved(ReservedObjectId::True)),
            Value::Bool(false) => Some(IdTracker::reserved(ReservedObjectId::False)),
            Value::Number(num) => Some(self.number_id(num)),
            Value::Symbol(sym) if sym.is_valid() => Some(self.symbol_id(sym)),
            Value::Symbol(_) => None,
            Value::Pointer(ptr) => Some(self.object_id(ptr)),
        }
    }

    /// Carry an object's ID over to its new address.
    pub fn move_object(&mut self, old: GcPtr<u8>, new: GcPtr<u8>) {
        if old.addr() == new.addr() {
            return;
        }

        match self.objects.remove(&old.addr()) {
            Some(id) => {
                self.objects.insert(new.addr(), id);
            }
            // Never snapshotted, nothing to carry over
            None => {
                self.objects.remove(&new.addr());
            }
        }
    }

    /// Forget an object that has been freed.
    pub fn untrack_object(&mut self, ptr: GcPtr<u8>) {
        self.objects.remove(&ptr.addr());
    }

    pub fn is_tracking(&self, ptr: GcPtr<u8>) -> bool {
        self.objects.contains_key(&ptr.addr())
    }
}

impl Default for IdTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ptr(addr: usize) -> GcPtr<u8> {
        GcPtr::from_addr(addr).unwrap()
    }

    #[test]
    fn test_reserved_ids_are_distinct_and_odd() {
        let mut ids = vec![
            IdTracker::reserved(ReservedObjectId::SuperRoot),
            IdTracker::reserved(ReservedObjectId::GcRoots),
            IdTracker::reserved(ReservedObjectId::Undefined),
            IdTracker::reserved(ReservedObjectId::Null),
            IdTracker::reserved(ReservedObjectId::True),
            IdTracker::reserved(ReservedObjectId::False),
        ];
        ids.extend(RootSection::ALL.iter().map(|s| IdTracker::root_section_id(*s)));

        let count = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), count);
        assert!(ids.iter().all(|id| id % 2 == 1));
    }

    #[test]
    fn test_object_ids_stable() {
        let mut tracker = IdTracker::new();
        let a = tracker.object_id(ptr(0x100));
        let b = tracker.object_id(ptr(0x200));
        assert_ne!(a, b);
        assert_eq!(tracker.object_id(ptr(0x100)), a);
        assert!(a >= IdTracker::reserved(ReservedObjectId::FirstNonReserved));
    }

    #[test]
    fn test_move_object_keeps_id() {
        let mut tracker = IdTracker::new();
        let id = tracker.object_id(ptr(0x100));

        tracker.move_object(ptr(0x100), ptr(0x900));
        assert!(!tracker.is_tracking(ptr(0x100)));
        assert_eq!(tracker.object_id(ptr(0x900)), id);
    }

    #[test]
    fn test_untracked_object_gets_fresh_id() {
        let mut tracker = IdTracker::new();
        let id = tracker.object_id(ptr(0x100));

        tracker.untrack_object(ptr(0x100));
        assert!(!tracker.is_tracking(ptr(0x100)));

        // A new object at a reused address is a different node
        let reused = tracker.object_id(ptr(0x100));
        assert_ne!(reused, id);
    }

    #[test]
    fn test_value_ids() {
        let mut tracker = IdTracker::new();
        assert_eq!(tracker.value_id(Value::Empty), None);
        assert_eq!(
            tracker.value_id(Value::Null),
            Some(IdTracker::reserved(ReservedObjectId::Null))
        );

        let n = tracker.value_id(Value::Number(2.5));
        assert_eq!(tracker.value_id(Value::Number(2.5)), n);
        assert_eq!(tracker.number_id(f64::NAN), tracker.number_id(-f64::NAN));
        assert_eq!(tracker.value_id(Value::Symbol(SymbolId::INVALID)), None);
    }
}
