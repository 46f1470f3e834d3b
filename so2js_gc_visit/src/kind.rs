//! Slot kinds
//!
//! Labels for the eight kinds of reference a visitor can be handed, used by diagnostic records.

/// The kinds of reference a visitor can be asked to accept.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// Untyped pointer held by a root
    RootPointer,
    /// Value held by a root
    RootValue,
    /// Symbol held by a root
    RootSymbol,
    /// Pointer slot inside a managed object
    Pointer,
    /// Value slot inside a managed object
    Value,
    /// Symbol slot inside a managed object
    Symbol,
    /// Weak reference table slot
    WeakRef,
    /// Weak pointer held by a root
    WeakRoot,
}

impl SlotKind {
    pub const fn is_root(&self) -> bool {
        matches!(
            self,
            SlotKind::RootPointer | SlotKind::RootValue | SlotKind::RootSymbol | SlotKind::WeakRoot
        )
    }

    pub const fn is_weak(&self) -> bool {
        matches!(self, SlotKind::WeakRef | SlotKind::WeakRoot)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            SlotKind::RootPointer => "root pointer",
            SlotKind::RootValue => "root value",
            SlotKind::RootSymbol => "root symbol",
            SlotKind::Pointer => "pointer",
            SlotKind::Value => "value",
            SlotKind::Symbol => "symbol",
            SlotKind::WeakRef => "weak ref",
            SlotKind::WeakRoot => "weak root",
        }
    }
}
