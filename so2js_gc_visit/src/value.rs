//! Slot types handed to visitors
//!
//! Heap slots (`GcPointer`, `GcValue`, `GcSymbol`) live inside managed objects. Root slots
//! (`RootPtr`, `PinnedValue`, `RootSymbol`) live outside the heap. Visitors get a mutable
//! reference to pointer and value slots so they can rewrite them, and symbols by value.

use crate::pointer::GcPtr;

/// Handle into the symbol table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    /// Sentinel for "no symbol".
    pub const INVALID: SymbolId = SymbolId(u32::MAX);

    #[inline]
    pub const fn new(index: u32) -> SymbolId {
        SymbolId(index)
    }

    #[inline]
    pub const fn index(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.0 != u32::MAX
    }
}

/// A self-describing value that may or may not hold a reference.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    /// An unset slot (array hole, uninitialized binding)
    Empty,
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Symbol(SymbolId),
    Pointer(GcPtr<u8>),
}

impl Value {
    #[inline]
    pub fn is_pointer(&self) -> bool {
        matches!(self, Value::Pointer(_))
    }

    #[inline]
    pub fn pointer(&self) -> Option<GcPtr<u8>> {
        match self {
            Value::Pointer(ptr) => Some(*ptr),
            _ => None,
        }
    }

    #[inline]
    pub fn is_symbol(&self) -> bool {
        matches!(self, Value::Symbol(_))
    }

    #[inline]
    pub fn symbol(&self) -> Option<SymbolId> {
        match self {
            Value::Symbol(sym) => Some(*sym),
            _ => None,
        }
    }

    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    #[inline]
    pub fn number(&self) -> Option<f64> {
        match self {
            Value::Number(num) => Some(*num),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Undefined
    }
}

/// A pointer slot inside a managed object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct GcPointer(Option<GcPtr<u8>>);

impl GcPointer {
    #[inline]
    pub const fn new(ptr: Option<GcPtr<u8>>) -> GcPointer {
        GcPointer(ptr)
    }

    #[inline]
    pub const fn null() -> GcPointer {
        GcPointer(None)
    }

    #[inline]
    pub fn get(&self) -> Option<GcPtr<u8>> {
        self.0
    }

    #[inline]
    pub fn set(&mut self, ptr: Option<GcPtr<u8>>) {
        self.0 = ptr;
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }
}

/// A value slot inside a managed object.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(transparent)]
pub struct GcValue(Value);

impl GcValue {
    #[inline]
    pub const fn new(value: Value) -> GcValue {
        GcValue(value)
    }

    #[inline]
    pub fn get(&self) -> Value {
        self.0
    }

    #[inline]
    pub fn set(&mut self, value: Value) {
        self.0 = value;
    }
}

/// A symbol held inside a managed object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GcSymbol(SymbolId);

impl GcSymbol {
    #[inline]
    pub const fn new(id: SymbolId) -> GcSymbol {
        GcSymbol(id)
    }

    #[inline]
    pub const fn id(&self) -> SymbolId {
        self.0
    }
}

/// A value held by a root (handle, register, global table). Roots are pinned: the value itself
/// does not move, though the object it points to may.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(transparent)]
pub struct PinnedValue(Value);

impl PinnedValue {
    #[inline]
    pub const fn new(value: Value) -> PinnedValue {
        PinnedValue(value)
    }

    #[inline]
    pub fn get(&self) -> Value {
        self.0
    }

    #[inline]
    pub fn set(&mut self, value: Value) {
        self.0 = value;
    }
}

/// A symbol held by a root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RootSymbol(SymbolId);

impl RootSymbol {
    #[inline]
    pub const fn new(id: SymbolId) -> RootSymbol {
        RootSymbol(id)
    }

    #[inline]
    pub const fn id(&self) -> SymbolId {
        self.0
    }
}

/// Base address that compressed pointers are relative to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointerBase {
    base: usize,
}

impl PointerBase {
    pub const fn new(base: usize) -> PointerBase {
        PointerBase { base }
    }

    pub const fn base(&self) -> usize {
        self.base
    }
}

/// A pointer slot stored as a 32-bit offset from a `PointerBase`. Offset zero is null.
///
/// Visitors never see this type. `visit_with` hands them a decompressed local copy and writes
/// the (possibly rewritten) copy back afterwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompressedPointer {
    offset: u32,
}

impl CompressedPointer {
    pub fn compress(base: PointerBase, ptr: Option<GcPtr<u8>>) -> CompressedPointer {
        let offset = match ptr {
            None => 0,
            Some(ptr) => {
                let addr = ptr.addr();
                assert!(
                    addr > base.base() && addr - base.base() <= u32::MAX as usize,
                    "pointer {:#x} cannot be compressed against base {:#x}",
                    addr,
                    base.base()
                );
                (addr - base.base()) as u32
            }
        };

        CompressedPointer { offset }
    }

    pub fn decompress(&self, base: PointerBase) -> Option<GcPtr<u8>> {
        if self.offset == 0 {
            return None;
        }

        GcPtr::from_addr(base.base() + self.offset as usize)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.offset == 0
    }

    /// Run `f` on a decompressed copy of this slot, then store the copy back.
    pub fn visit_with(&mut self, base: PointerBase, f: impl FnOnce(&mut GcPointer)) {
        let mut local = GcPointer::new(self.decompress(base));
        f(&mut local);
        *self = CompressedPointer::compress(base, local.get());
    }
}
