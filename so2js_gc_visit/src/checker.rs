//! Heap well-formedness checks
//!
//! `WellFormedChecker` asserts that every reference it is given points inside the heap and that
//! every symbol it is given is live. A failed check means some object layout or root enumerator
//! reported a corrupt slot, so it panics rather than returning an error.

use crate::{
    pointer::{GcPtr, RootPtr},
    value::{GcPointer, GcSymbol, GcValue, PinnedValue, RootSymbol, SymbolId, Value},
    visitor::{RootSectionVisitor, RootVisitor, SlotVisitor, WeakRefVisitor, WeakRootVisitor},
    weak::{WeakRef, WeakRoot, WeakSlotState},
};

/// What the checker needs to know about the heap.
pub trait HeapBounds {
    /// Whether `ptr` points at an object inside the heap.
    fn is_valid_pointer(&self, ptr: GcPtr<u8>) -> bool;

    /// Whether `sym` is a live entry of the symbol table.
    fn is_symbol_live(&self, sym: SymbolId) -> bool;

    /// The string object backing `sym`, if it has one.
    fn string_for_symbol(&self, sym: SymbolId) -> Option<GcPtr<u8>>;
}

pub struct WellFormedChecker<'a, H: HeapBounds + ?Sized> {
    heap: &'a H,
    checked: usize,
}

impl<'a, H: HeapBounds + ?Sized> WellFormedChecker<'a, H> {
    pub fn new(heap: &'a H) -> Self {
        WellFormedChecker { heap, checked: 0 }
    }

    /// Number of references checked so far.
    pub fn checked(&self) -> usize {
        self.checked
    }

    fn check_pointer(&mut self, ptr: Option<GcPtr<u8>>) {
        self.checked += 1;
        if let Some(ptr) = ptr {
            assert!(
                self.heap.is_valid_pointer(ptr),
                "pointer {:p} is outside of the valid heap region",
                ptr
            );
        }
    }

    fn check_symbol(&mut self, sym: SymbolId) {
        if !sym.is_valid() {
            return;
        }
        assert!(
            self.heap.is_symbol_live(sym),
            "symbol {:?} is referenced but not live",
            sym
        );
        // The string backing the symbol must be valid too
        let string = self.heap.string_for_symbol(sym);
        self.check_pointer(string);
    }

    fn check_value(&mut self, value: Value) {
        match value {
            Value::Pointer(ptr) => self.check_pointer(Some(ptr)),
            Value::Symbol(sym) => self.check_symbol(sym),
            _ => self.checked += 1,
        }
    }
}

impl<H: HeapBounds + ?Sized> RootSectionVisitor for WellFormedChecker<'_, H> {}

impl<H: HeapBounds + ?Sized> RootVisitor for WellFormedChecker<'_, H> {
    fn accept_root(&mut self, ptr: &mut RootPtr) {
        self.check_pointer(*ptr);
    }

    fn accept_root_value(&mut self, value: &mut PinnedValue) {
        self.check_value(value.get());
    }

    fn accept_root_symbol(&mut self, sym: RootSymbol) {
        self.check_symbol(sym.id());
    }
}

impl<H: HeapBounds + ?Sized> SlotVisitor for WellFormedChecker<'_, H> {
    fn accept_pointer(&mut self, ptr: &mut GcPointer) {
        self.check_pointer(ptr.get());
    }

    fn accept_value(&mut self, value: &mut GcValue) {
        self.check_value(value.get());
    }

    fn accept_symbol(&mut self, sym: GcSymbol) {
        self.check_symbol(sym.id());
    }
}

impl<H: HeapBounds + ?Sized> WeakRefVisitor for WellFormedChecker<'_, H> {
    fn accept_weak_ref(&mut self, weak: &mut WeakRef) {
        // Empty and free weak refs are allowed
        if weak.state() != WeakSlotState::Free && weak.has_pointer() {
            self.check_pointer(weak.pointer());
        }
    }
}

impl<H: HeapBounds + ?Sized> WeakRootVisitor for WellFormedChecker<'_, H> {
    fn accept_weak(&mut self, root: &mut WeakRoot) {
        // Same checks as a strong pointer
        self.check_pointer(root.get());
    }
}
