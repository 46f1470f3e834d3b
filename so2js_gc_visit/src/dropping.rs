//! Adapter from name-agnostic visitors to the named interface

use crate::{
    pointer::RootPtr,
    section::RootSection,
    value::{GcPointer, GcSymbol, GcValue, PinnedValue, RootSymbol},
    visitor::{CombinedVisitor, NamedCombinedVisitor, RootSectionVisitor},
};

/// Wraps a `CombinedVisitor` so it can be passed where a `NamedCombinedVisitor` is required.
///
/// Every name is discarded and the reference is forwarded to the wrapped visitor's unnamed
/// accept method. Root section brackets are forwarded unchanged. The adapter borrows the visitor
/// for the duration of one traversal.
///
/// ```ignore
/// let mut marker = Marker::new(&mut mark_state);
/// runtime.mark_roots(&mut NameDroppingAdapter::new(&mut marker), true);
/// ```
pub struct NameDroppingAdapter<'a, V: CombinedVisitor + ?Sized> {
    visitor: &'a mut V,
}

impl<'a, V: CombinedVisitor + ?Sized> NameDroppingAdapter<'a, V> {
    #[inline]
    pub fn new(visitor: &'a mut V) -> Self {
        NameDroppingAdapter { visitor }
    }

    /// The wrapped visitor
    #[inline]
    pub fn inner(&mut self) -> &mut V {
        self.visitor
    }
}

impl<V: CombinedVisitor + ?Sized> RootSectionVisitor for NameDroppingAdapter<'_, V> {
    #[inline]
    fn begin_root_section(&mut self, section: RootSection) {
        self.visitor.begin_root_section(section)
    }

    #[inline]
    fn end_root_section(&mut self) {
        self.visitor.end_root_section()
    }
}

impl<V: CombinedVisitor + ?Sized> NamedCombinedVisitor for NameDroppingAdapter<'_, V> {
    #[inline]
    fn accept_root_named(&mut self, ptr: &mut RootPtr, _: Option<&str>) {
        self.visitor.accept_root(ptr)
    }

    #[inline]
    fn accept_root_value_named(&mut self, value: &mut PinnedValue, _: Option<&str>) {
        self.visitor.accept_root_value(value)
    }

    #[inline]
    fn accept_root_symbol_named(&mut self, sym: RootSymbol, _: Option<&str>) {
        self.visitor.accept_root_symbol(sym)
    }

    #[inline]
    fn accept_pointer_named(&mut self, ptr: &mut GcPointer, _: Option<&str>) {
        self.visitor.accept_pointer(ptr)
    }

    #[inline]
    fn accept_value_named(&mut self, value: &mut GcValue, _: Option<&str>) {
        self.visitor.accept_value(value)
    }

    #[inline]
    fn accept_symbol_named(&mut self, sym: GcSymbol, _: Option<&str>) {
        self.visitor.accept_symbol(sym)
    }
}
