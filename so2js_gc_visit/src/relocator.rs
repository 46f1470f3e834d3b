//! Relocation traversal
//!
//! After compaction has copied live objects to new addresses, `Relocator` rewrites every
//! reference that points at an old address, strong or weak, through the slot it was given.

use hashbrown::HashMap;

use crate::{
    pointer::{GcPtr, RootPtr},
    value::{GcPointer, GcSymbol, GcValue, PinnedValue, RootSymbol, Value},
    visitor::{RootSectionVisitor, RootVisitor, SlotVisitor, WeakRefVisitor, WeakRootVisitor},
    weak::{WeakRef, WeakRoot},
};

/// Maps old object addresses to their new location.
#[derive(Debug, Default)]
pub struct ForwardingTable {
    forwards: HashMap<usize, GcPtr<u8>>,
}

impl ForwardingTable {
    pub fn new() -> ForwardingTable {
        ForwardingTable::default()
    }

    /// Record that the object at `from` now lives at `to`.
    pub fn insert(&mut self, from: GcPtr<u8>, to: GcPtr<u8>) {
        self.forwards.insert(from.addr(), to);
    }

    /// The new address of `ptr`, if it moved.
    #[inline]
    pub fn forward(&self, ptr: GcPtr<u8>) -> Option<GcPtr<u8>> {
        self.forwards.get(&ptr.addr()).copied()
    }

    pub fn len(&self) -> usize {
        self.forwards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forwards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GcPtr<u8>, GcPtr<u8>)> + '_ {
        self.forwards
            .iter()
            .filter_map(|(from, to)| GcPtr::from_addr(*from).map(|from| (from, *to)))
    }
}

/// Rewrites references to moved objects.
pub struct Relocator<'a> {
    table: &'a ForwardingTable,
    relocated: usize,
}

impl<'a> Relocator<'a> {
    pub fn new(table: &'a ForwardingTable) -> Self {
        Relocator {
            table,
            relocated: 0,
        }
    }

    /// Number of slots rewritten so far.
    pub fn relocated(&self) -> usize {
        self.relocated
    }

    #[inline]
    fn relocate(&mut self, ptr: Option<GcPtr<u8>>) -> Option<GcPtr<u8>> {
        let ptr = ptr?;
        let forwarded = self.table.forward(ptr)?;
        self.relocated += 1;
        Some(forwarded)
    }

    #[inline]
    fn relocate_value(&mut self, value: Value) -> Option<Value> {
        self.relocate(value.pointer()).map(Value::Pointer)
    }
}

impl RootSectionVisitor for Relocator<'_> {}

impl RootVisitor for Relocator<'_> {
    fn accept_root(&mut self, ptr: &mut RootPtr) {
        if let Some(new) = self.relocate(*ptr) {
            *ptr = Some(new);
        }
    }

    fn accept_root_value(&mut self, value: &mut PinnedValue) {
        if let Some(new) = self.relocate_value(value.get()) {
            value.set(new);
        }
    }

    // Symbols do not move
    fn accept_root_symbol(&mut self, _: RootSymbol) {}
}

impl SlotVisitor for Relocator<'_> {
    fn accept_pointer(&mut self, ptr: &mut GcPointer) {
        if let Some(new) = self.relocate(ptr.get()) {
            ptr.set(Some(new));
        }
    }

    fn accept_value(&mut self, value: &mut GcValue) {
        if let Some(new) = self.relocate_value(value.get()) {
            value.set(new);
        }
    }

    fn accept_symbol(&mut self, _: GcSymbol) {}
}

impl WeakRefVisitor for Relocator<'_> {
    fn accept_weak_ref(&mut self, weak: &mut WeakRef) {
        if let Some(new) = self.relocate(weak.pointer()) {
            weak.set_pointer(Some(new));
        }
    }
}

impl WeakRootVisitor for Relocator<'_> {
    fn accept_weak(&mut self, root: &mut WeakRoot) {
        if let Some(new) = self.relocate(root.get()) {
            root.set(Some(new));
        }
    }
}
