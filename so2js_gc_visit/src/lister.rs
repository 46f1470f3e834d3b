//! Root listing for diagnostics
//!
//! `RootLister` records every reference it is given, with the root section it was reported in
//! and its field name, without changing anything.

use crate::{
    kind::SlotKind,
    pointer::{GcPtr, RootPtr},
    section::{RootSection, SectionTracker},
    value::{GcPointer, GcSymbol, GcValue, PinnedValue, RootSymbol, SymbolId, Value},
    visitor::{NamedCombinedVisitor, RootSectionVisitor, WeakRefVisitor, WeakRootVisitor},
    weak::{WeakRef, WeakRoot},
};

/// What a listed reference refers to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Referent {
    Null,
    Object(usize),
    Symbol(SymbolId),
    /// A value slot holding a non-reference value
    Primitive(Value),
}

impl Referent {
    fn from_ptr(ptr: Option<GcPtr<u8>>) -> Referent {
        match ptr {
            Some(ptr) => Referent::Object(ptr.addr()),
            None => Referent::Null,
        }
    }

    fn from_value(value: Value) -> Referent {
        match value {
            Value::Pointer(ptr) => Referent::Object(ptr.addr()),
            Value::Symbol(sym) => Referent::Symbol(sym),
            other => Referent::Primitive(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RootRecord {
    /// Innermost open section, `InvalidSection` if none was open
    pub section: RootSection,
    pub kind: SlotKind,
    pub name: Option<String>,
    pub referent: Referent,
}

/// Records every reference it is given.
#[derive(Debug, Default)]
pub struct RootLister {
    records: Vec<RootRecord>,
    sections: SectionTracker,
}

impl RootLister {
    pub fn new() -> RootLister {
        RootLister::default()
    }

    pub fn records(&self) -> &[RootRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<RootRecord> {
        self.records
    }

    /// Records reported inside `section`.
    pub fn in_section(&self, section: RootSection) -> impl Iterator<Item = &RootRecord> + '_ {
        self.records
            .iter()
            .filter(move |record| record.section == section)
    }

    fn record(&mut self, kind: SlotKind, name: Option<&str>, referent: Referent) {
        self.records.push(RootRecord {
            section: self.sections.current(),
            kind,
            name: name.map(String::from),
            referent,
        });
    }
}

impl RootSectionVisitor for RootLister {
    fn begin_root_section(&mut self, section: RootSection) {
        self.sections.begin(section);
    }

    fn end_root_section(&mut self) {
        let section = self.sections.end();
        log::trace!(
            "listed {} roots in section {}",
            self.in_section(section).count(),
            section
        );
    }
}

impl NamedCombinedVisitor for RootLister {
    fn accept_root_named(&mut self, ptr: &mut RootPtr, name: Option<&str>) {
        self.record(SlotKind::RootPointer, name, Referent::from_ptr(*ptr));
    }

    fn accept_root_value_named(&mut self, value: &mut PinnedValue, name: Option<&str>) {
        self.record(SlotKind::RootValue, name, Referent::from_value(value.get()));
    }

    fn accept_root_symbol_named(&mut self, sym: RootSymbol, name: Option<&str>) {
        self.record(SlotKind::RootSymbol, name, Referent::Symbol(sym.id()));
    }

    fn accept_pointer_named(&mut self, ptr: &mut GcPointer, name: Option<&str>) {
        self.record(SlotKind::Pointer, name, Referent::from_ptr(ptr.get()));
    }

    fn accept_value_named(&mut self, value: &mut GcValue, name: Option<&str>) {
        self.record(SlotKind::Value, name, Referent::from_value(value.get()));
    }

    fn accept_symbol_named(&mut self, sym: GcSymbol, name: Option<&str>) {
        self.record(SlotKind::Symbol, name, Referent::Symbol(sym.id()));
    }
}

impl WeakRefVisitor for RootLister {
    fn accept_weak_ref(&mut self, weak: &mut WeakRef) {
        self.record(SlotKind::WeakRef, None, Referent::from_ptr(weak.pointer()));
    }
}

impl WeakRootVisitor for RootLister {
    fn accept_weak(&mut self, root: &mut WeakRoot) {
        self.record(SlotKind::WeakRoot, None, Referent::from_ptr(root.get()));
    }
}
