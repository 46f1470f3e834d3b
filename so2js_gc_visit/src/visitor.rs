//! Visitor traits
//!
//! Object walkers and root enumerators report every reference they hold by calling `accept*`
//! methods on a visitor. The visitor is supplied by whichever traversal is running (marking,
//! relocation, snapshot, verification) and may rewrite the slot it is given.
//!
//! An accept method makes no assumption about where its slot lives. A walker may copy a slot into
//! a local, visit the local and write it back, e.g. for compressed pointers.
//!
//! Capabilities are split into narrow traits:
//! - `SlotVisitor`: references inside managed objects
//! - `WeakRefVisitor`: weak reference table slots
//! - `RootSectionVisitor`: section brackets around root enumeration
//! - `RootVisitor`: references held by roots
//! - `WeakRootVisitor`: weak pointers held by roots
//!
//! `CombinedVisitor` is implemented for everything that is both a `RootVisitor` and a
//! `SlotVisitor`. `NamedCombinedVisitor` implementors only write the named accept methods; the
//! unnamed ones are provided by blanket impls that pass `None` as the name.

use crate::{
    pointer::{erase_root_ptr, GcPtr, RootPtr},
    section::RootSection,
    snapshot::HeapSnapshot,
    value::{GcPointer, GcSymbol, GcValue, PinnedValue, RootSymbol},
    weak::{WeakRef, WeakRoot},
};

/// Accepts the references held inside an already allocated object.
///
/// Each method is called once per slot, in the order the object's layout declares them.
pub trait SlotVisitor {
    /// Visit a pointer slot.
    fn accept_pointer(&mut self, ptr: &mut GcPointer);

    /// Visit a value slot, whether or not it currently holds a pointer.
    fn accept_value(&mut self, value: &mut GcValue);

    /// Visit a symbol slot.
    fn accept_symbol(&mut self, sym: GcSymbol);
}

/// Accepts weak reference slots.
///
/// Weak references need different bookkeeping from strong slots, so they are visited through a
/// separate method name even on visitors that also implement `SlotVisitor`.
pub trait WeakRefVisitor {
    fn accept_weak_ref(&mut self, weak: &mut WeakRef);
}

/// Receives brackets around each section of root enumeration.
///
/// Both methods default to no-ops. `end_root_section` closes the most recent unmatched
/// `begin_root_section`.
pub trait RootSectionVisitor {
    #[inline]
    fn begin_root_section(&mut self, section: RootSection) {
        let _ = section;
    }

    #[inline]
    fn end_root_section(&mut self) {}
}

/// Accepts references held outside the heap.
pub trait RootVisitor: RootSectionVisitor {
    /// Visit an untyped root pointer. The visitor may relocate or null it.
    fn accept_root(&mut self, ptr: &mut RootPtr);

    /// Visit a root value.
    fn accept_root_value(&mut self, value: &mut PinnedValue);

    /// Visit a root symbol.
    fn accept_root_symbol(&mut self, sym: RootSymbol);
}

/// Typed root pointer convenience, available on every `RootVisitor`.
pub trait RootVisitorExt: RootVisitor {
    /// Visit a typed root pointer as an untyped one.
    ///
    /// No check is made on the pointed-to type. If the visitor rewrites the slot, `ptr` observes
    /// the new address.
    #[inline]
    fn accept_root_ptr<T>(&mut self, ptr: &mut Option<GcPtr<T>>) {
        // Visitors only write back relocated copies of the same object.
        self.accept_root(unsafe { erase_root_ptr(ptr) })
    }
}

impl<V: RootVisitor + ?Sized> RootVisitorExt for V {}

/// A visitor that walks both the root set and in-heap slots.
pub trait CombinedVisitor: RootVisitor + SlotVisitor {}

impl<V: RootVisitor + SlotVisitor + ?Sized> CombinedVisitor for V {}

/// A `CombinedVisitor` whose accept methods also carry an optional field name.
///
/// Names are diagnostic only (heap snapshots, root listings). Implementors write the six named
/// methods; the unnamed `RootVisitor` and `SlotVisitor` methods come from blanket impls that
/// forward with a `None` name and cannot be implemented separately.
pub trait NamedCombinedVisitor: RootSectionVisitor {
    fn accept_root_named(&mut self, ptr: &mut RootPtr, name: Option<&str>);

    fn accept_root_value_named(&mut self, value: &mut PinnedValue, name: Option<&str>);

    fn accept_root_symbol_named(&mut self, sym: RootSymbol, name: Option<&str>);

    fn accept_pointer_named(&mut self, ptr: &mut GcPointer, name: Option<&str>);

    fn accept_value_named(&mut self, value: &mut GcValue, name: Option<&str>);

    fn accept_symbol_named(&mut self, sym: GcSymbol, name: Option<&str>);

    /// Invoke `func` with the snapshot being built, if this visitor is building one.
    ///
    /// Visitors that are not part of a heap snapshot ignore the callback.
    #[inline]
    fn provide_snapshot(&mut self, func: &mut dyn FnMut(&mut HeapSnapshot)) {
        let _ = func;
    }
}

impl<V: NamedCombinedVisitor + ?Sized> RootVisitor for V {
    #[inline]
    fn accept_root(&mut self, ptr: &mut RootPtr) {
        self.accept_root_named(ptr, None)
    }

    #[inline]
    fn accept_root_value(&mut self, value: &mut PinnedValue) {
        self.accept_root_value_named(value, None)
    }

    #[inline]
    fn accept_root_symbol(&mut self, sym: RootSymbol) {
        self.accept_root_symbol_named(sym, None)
    }
}

impl<V: NamedCombinedVisitor + ?Sized> SlotVisitor for V {
    #[inline]
    fn accept_pointer(&mut self, ptr: &mut GcPointer) {
        self.accept_pointer_named(ptr, None)
    }

    #[inline]
    fn accept_value(&mut self, value: &mut GcValue) {
        self.accept_value_named(value, None)
    }

    #[inline]
    fn accept_symbol(&mut self, sym: GcSymbol) {
        self.accept_symbol_named(sym, None)
    }
}

/// Typed root pointer convenience with a name, available on every `NamedCombinedVisitor`.
pub trait NamedVisitorExt: NamedCombinedVisitor {
    #[inline]
    fn accept_root_ptr_named<T>(&mut self, ptr: &mut Option<GcPtr<T>>, name: Option<&str>) {
        // Visitors only write back relocated copies of the same object.
        self.accept_root_named(unsafe { erase_root_ptr(ptr) }, name)
    }
}

impl<V: NamedCombinedVisitor + ?Sized> NamedVisitorExt for V {}

/// Accepts weak pointers held by roots.
///
/// The method is `accept_weak` rather than `accept_*` on the root kinds so that a visitor
/// implementing both strong and weak root capabilities never confuses the two.
pub trait WeakRootVisitor: WeakRefVisitor + RootSectionVisitor {
    fn accept_weak(&mut self, root: &mut WeakRoot);
}

/// An object whose reference-bearing fields can be walked.
///
/// Implemented by the object model, which must report every slot in a stable order.
pub trait VisitSlots {
    /// Report every strong slot of this object.
    fn visit_slots(&mut self, visitor: &mut impl NamedCombinedVisitor);

    /// Report every weak reference slot of this object.
    fn visit_weak_refs(&mut self, visitor: &mut impl WeakRefVisitor) {
        let _ = visitor;
    }
}

/// The runtime's root set.
///
/// Implemented by the runtime (stack scanner, handle scopes, module tables). Roots should be
/// bracketed by root sections when attribution is wanted.
pub trait RootEnumerator {
    /// Report every strong root. `mark_long_lived` includes roots that only change between
    /// full collections.
    fn mark_roots(&mut self, visitor: &mut impl NamedCombinedVisitor, mark_long_lived: bool);

    /// Report every weak root.
    fn mark_weak_roots(&mut self, visitor: &mut impl WeakRootVisitor);
}
