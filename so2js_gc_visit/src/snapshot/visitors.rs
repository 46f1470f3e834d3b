//! Visitors that build a heap snapshot
//!
//! A snapshot is built in passes over the same roots and objects:
//! 1. The super root links to the GC roots node, which links to one node per root section
//!    (`SnapshotRootSectionVisitor`).
//! 2. Each root section becomes a synthetic node with an edge per root (`SnapshotRootVisitor`).
//! 3. Each object becomes a node with an edge per slot (`EdgeAddingVisitor`).
//! 4. Numbers and symbols seen in any slot become shared nodes (`PrimitiveNodeVisitor`).

use hashbrown::HashSet;

use crate::{
    pointer::{GcPtr, RootPtr},
    section::{RootSection, SectionTracker},
    value::{GcPointer, GcSymbol, GcValue, PinnedValue, RootSymbol, SymbolId, Value},
    visitor::{
        NamedCombinedVisitor, RootEnumerator, RootSectionVisitor, VisitSlots, WeakRefVisitor,
        WeakRootVisitor,
    },
    weak::{WeakRef, WeakRoot, WeakSlotState},
};

use super::{EdgeType, HeapSnapshot, IdTracker, NodeId, NodeType, ReservedObjectId};

/// The live target of a weak reference slot, if it has one.
fn weak_ref_target(weak: &WeakRef) -> Option<GcPtr<u8>> {
    if weak.state() == WeakSlotState::Free {
        return None;
    }
    weak.pointer()
}

// ============================================================================
// Root sections
// ============================================================================

/// Adds an element edge from the currently open node to each root section that is begun.
///
/// All references are ignored; only the section brackets matter.
pub struct SnapshotRootSectionVisitor<'a> {
    snap: &'a mut HeapSnapshot,
    /// Root numbering starts at 1
    next_section_index: u32,
}

impl<'a> SnapshotRootSectionVisitor<'a> {
    pub fn new(snap: &'a mut HeapSnapshot) -> Self {
        SnapshotRootSectionVisitor {
            snap,
            next_section_index: 1,
        }
    }
}

impl RootSectionVisitor for SnapshotRootSectionVisitor<'_> {
    fn begin_root_section(&mut self, section: RootSection) {
        self.snap.add_indexed_edge(
            EdgeType::Element,
            self.next_section_index,
            IdTracker::root_section_id(section),
        );
        self.next_section_index += 1;
    }
}

impl NamedCombinedVisitor for SnapshotRootSectionVisitor<'_> {
    fn accept_root_named(&mut self, _: &mut RootPtr, _: Option<&str>) {}

    fn accept_root_value_named(&mut self, _: &mut PinnedValue, _: Option<&str>) {}

    fn accept_root_symbol_named(&mut self, _: RootSymbol, _: Option<&str>) {}

    fn accept_pointer_named(&mut self, _: &mut GcPointer, _: Option<&str>) {}

    fn accept_value_named(&mut self, _: &mut GcValue, _: Option<&str>) {}

    fn accept_symbol_named(&mut self, _: GcSymbol, _: Option<&str>) {}
}

impl WeakRefVisitor for SnapshotRootSectionVisitor<'_> {
    fn accept_weak_ref(&mut self, _: &mut WeakRef) {}
}

impl WeakRootVisitor for SnapshotRootSectionVisitor<'_> {
    fn accept_weak(&mut self, _: &mut WeakRoot) {}
}

// ============================================================================
// Roots
// ============================================================================

/// Turns each root section into a synthetic node with an edge to every root in it.
///
/// Named roots get named edges. Unnamed strong roots get element edges numbered from zero within
/// their section; unnamed weak roots get weak edges named by that number. An object reachable
/// from several roots only gets an edge from the first.
pub struct SnapshotRootVisitor<'a> {
    snap: &'a mut HeapSnapshot,
    ids: &'a mut IdTracker,
    seen: HashSet<NodeId>,
    sections: SectionTracker,
    /// Next unnamed edge index for each open section
    next_edge: Vec<u32>,
}

impl<'a> SnapshotRootVisitor<'a> {
    pub fn new(snap: &'a mut HeapSnapshot, ids: &'a mut IdTracker) -> Self {
        SnapshotRootVisitor {
            snap,
            ids,
            seen: HashSet::new(),
            sections: SectionTracker::new(),
            next_edge: Vec::new(),
        }
    }

    fn pointer_accept(&mut self, ptr: Option<GcPtr<u8>>, name: Option<&str>, weak: bool) {
        assert!(
            self.sections.current().is_valid(),
            "root accepted outside of a begin/end root section pair"
        );

        let ptr = match ptr {
            Some(ptr) => ptr,
            None => return,
        };

        let id = self.ids.object_id(ptr);
        if !self.seen.insert(id) {
            return;
        }

        let edge_type = if weak {
            EdgeType::Weak
        } else {
            EdgeType::Internal
        };

        match name.filter(|name| !name.is_empty()) {
            Some(name) => self.snap.add_named_edge(edge_type, name, id),
            None => {
                let index = self.take_edge_index();
                if weak {
                    self.snap
                        .add_named_edge(EdgeType::Weak, &index.to_string(), id);
                } else {
                    self.snap.add_indexed_edge(EdgeType::Element, index, id);
                }
            }
        }
    }

    fn take_edge_index(&mut self) -> u32 {
        match self.next_edge.last_mut() {
            Some(next) => {
                let index = *next;
                *next += 1;
                index
            }
            None => 0,
        }
    }
}

impl RootSectionVisitor for SnapshotRootVisitor<'_> {
    fn begin_root_section(&mut self, section: RootSection) {
        log::trace!("snapshot root section {}", section);
        self.sections.begin(section);
        self.next_edge.push(0);
        self.snap.begin_node();
    }

    fn end_root_section(&mut self) {
        let section = self.sections.end();
        self.next_edge.pop();
        // Synthetic nodes are zero sized so viewers don't count them as heap
        self.snap.end_node(
            NodeType::Synthetic,
            &section.snapshot_name(),
            IdTracker::root_section_id(section),
            0,
            0,
        );
    }
}

impl NamedCombinedVisitor for SnapshotRootVisitor<'_> {
    fn accept_root_named(&mut self, ptr: &mut RootPtr, name: Option<&str>) {
        self.pointer_accept(*ptr, name, false);
    }

    fn accept_root_value_named(&mut self, value: &mut PinnedValue, name: Option<&str>) {
        if let Some(ptr) = value.get().pointer() {
            self.pointer_accept(Some(ptr), name, false);
        }
    }

    fn accept_root_symbol_named(&mut self, _: RootSymbol, _: Option<&str>) {}

    fn accept_pointer_named(&mut self, ptr: &mut GcPointer, name: Option<&str>) {
        self.pointer_accept(ptr.get(), name, false);
    }

    fn accept_value_named(&mut self, value: &mut GcValue, name: Option<&str>) {
        if let Some(ptr) = value.get().pointer() {
            self.pointer_accept(Some(ptr), name, false);
        }
    }

    fn accept_symbol_named(&mut self, _: GcSymbol, _: Option<&str>) {}

    fn provide_snapshot(&mut self, func: &mut dyn FnMut(&mut HeapSnapshot)) {
        func(&mut *self.snap);
    }
}

impl WeakRefVisitor for SnapshotRootVisitor<'_> {
    fn accept_weak_ref(&mut self, weak: &mut WeakRef) {
        if let Some(target) = weak_ref_target(weak) {
            self.pointer_accept(Some(target), None, true);
        }
    }
}

impl WeakRootVisitor for SnapshotRootVisitor<'_> {
    fn accept_weak(&mut self, root: &mut WeakRoot) {
        self.pointer_accept(root.get(), None, true);
    }
}

// ============================================================================
// Objects
// ============================================================================

/// Adds an edge from the currently open node for every slot of an object.
///
/// Unnamed slots get empty names. Weak references are assumed to live in array-like storage and
/// are named by their index.
pub struct EdgeAddingVisitor<'a> {
    snap: &'a mut HeapSnapshot,
    ids: &'a mut IdTracker,
    next_weak_edge: u32,
}

impl<'a> EdgeAddingVisitor<'a> {
    pub fn new(snap: &'a mut HeapSnapshot, ids: &'a mut IdTracker) -> Self {
        EdgeAddingVisitor {
            snap,
            ids,
            next_weak_edge: 0,
        }
    }

    fn pointer_edge(&mut self, ptr: Option<GcPtr<u8>>, name: Option<&str>) {
        if let Some(ptr) = ptr {
            let id = self.ids.object_id(ptr);
            self.snap
                .add_named_edge(EdgeType::Internal, name.unwrap_or(""), id);
        }
    }

    fn value_edge(&mut self, value: Value, name: Option<&str>) {
        if let Some(id) = self.ids.value_id(value) {
            self.snap
                .add_named_edge(EdgeType::Internal, name.unwrap_or(""), id);
        }
    }

    fn symbol_edge(&mut self, sym: SymbolId, name: Option<&str>) {
        if !sym.is_valid() {
            return;
        }
        let id = self.ids.symbol_id(sym);
        self.snap
            .add_named_edge(EdgeType::Internal, name.unwrap_or(""), id);
    }
}

impl RootSectionVisitor for EdgeAddingVisitor<'_> {}

impl NamedCombinedVisitor for EdgeAddingVisitor<'_> {
    fn accept_root_named(&mut self, ptr: &mut RootPtr, name: Option<&str>) {
        self.pointer_edge(*ptr, name);
    }

    fn accept_root_value_named(&mut self, value: &mut PinnedValue, name: Option<&str>) {
        self.value_edge(value.get(), name);
    }

    fn accept_root_symbol_named(&mut self, sym: RootSymbol, name: Option<&str>) {
        self.symbol_edge(sym.id(), name);
    }

    fn accept_pointer_named(&mut self, ptr: &mut GcPointer, name: Option<&str>) {
        self.pointer_edge(ptr.get(), name);
    }

    fn accept_value_named(&mut self, value: &mut GcValue, name: Option<&str>) {
        self.value_edge(value.get(), name);
    }

    fn accept_symbol_named(&mut self, sym: GcSymbol, name: Option<&str>) {
        self.symbol_edge(sym.id(), name);
    }

    fn provide_snapshot(&mut self, func: &mut dyn FnMut(&mut HeapSnapshot)) {
        func(&mut *self.snap);
    }
}

impl WeakRefVisitor for EdgeAddingVisitor<'_> {
    fn accept_weak_ref(&mut self, weak: &mut WeakRef) {
        if let Some(target) = weak_ref_target(weak) {
            let id = self.ids.object_id(target);
            let name = self.next_weak_edge.to_string();
            self.next_weak_edge += 1;
            self.snap.add_named_edge(EdgeType::Weak, &name, id);
        }
    }
}

/// Collects every number and symbol that `EdgeAddingVisitor` links to, so each distinct one
/// gets a node.
pub struct PrimitiveNodeVisitor {
    seen_bits: HashSet<u64>,
    /// Distinct numbers in first-seen order
    numbers: Vec<f64>,
    seen_symbols: HashSet<SymbolId>,
    /// Distinct valid symbols in first-seen order
    symbols: Vec<SymbolId>,
}

impl PrimitiveNodeVisitor {
    pub fn new() -> Self {
        PrimitiveNodeVisitor {
            seen_bits: HashSet::new(),
            numbers: Vec::new(),
            seen_symbols: HashSet::new(),
            symbols: Vec::new(),
        }
    }

    fn record(&mut self, value: Value) {
        match value {
            Value::Number(num) => {
                let bits = if num.is_nan() {
                    f64::NAN.to_bits()
                } else {
                    num.to_bits()
                };
                if self.seen_bits.insert(bits) {
                    self.numbers.push(num);
                }
            }
            Value::Symbol(sym) => self.record_symbol(sym),
            _ => {}
        }
    }

    fn record_symbol(&mut self, sym: SymbolId) {
        if sym.is_valid() && self.seen_symbols.insert(sym) {
            self.symbols.push(sym);
        }
    }

    pub fn numbers(&self) -> &[f64] {
        &self.numbers
    }

    pub fn symbols(&self) -> &[SymbolId] {
        &self.symbols
    }

    /// Write nodes for the singleton primitives and every number and symbol seen.
    ///
    /// Symbols are named by their index. Use `write_all_nodes_with` to name them.
    pub fn write_all_nodes(&self, snap: &mut HeapSnapshot, ids: &mut IdTracker) {
        self.write_all_nodes_with(snap, ids, |_| None)
    }

    /// Like `write_all_nodes`, with `symbol_name` supplying a description for each symbol.
    pub fn write_all_nodes_with(
        &self,
        snap: &mut HeapSnapshot,
        ids: &mut IdTracker,
        mut symbol_name: impl FnMut(SymbolId) -> Option<String>,
    ) {
        let singletons = [
            ("undefined", ReservedObjectId::Undefined),
            ("null", ReservedObjectId::Null),
            ("true", ReservedObjectId::True),
            ("false", ReservedObjectId::False),
        ];
        for (name, reserved) in singletons {
            snap.begin_node();
            snap.end_node(NodeType::Object, name, IdTracker::reserved(reserved), 0, 0);
        }

        let mut buffer = ryu_js::Buffer::new();
        for num in &self.numbers {
            let id = ids.number_id(*num);
            // Numbers are stored inline, so they take no heap space of their own
            snap.begin_node();
            snap.end_node(NodeType::Number, buffer.format(*num), id, 0, 0);
        }

        for sym in &self.symbols {
            let id = ids.symbol_id(*sym);
            let name = symbol_name(*sym).unwrap_or_else(|| format!("symbol #{}", sym.index()));
            snap.begin_node();
            snap.end_node(NodeType::Symbol, &name, id, 0, 0);
        }
    }
}

impl Default for PrimitiveNodeVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl RootSectionVisitor for PrimitiveNodeVisitor {}

impl NamedCombinedVisitor for PrimitiveNodeVisitor {
    fn accept_root_named(&mut self, _: &mut RootPtr, _: Option<&str>) {}

    fn accept_root_value_named(&mut self, value: &mut PinnedValue, _: Option<&str>) {
        self.record(value.get());
    }

    fn accept_root_symbol_named(&mut self, sym: RootSymbol, _: Option<&str>) {
        self.record_symbol(sym.id());
    }

    fn accept_pointer_named(&mut self, _: &mut GcPointer, _: Option<&str>) {}

    fn accept_value_named(&mut self, value: &mut GcValue, _: Option<&str>) {
        self.record(value.get());
    }

    fn accept_symbol_named(&mut self, sym: GcSymbol, _: Option<&str>) {
        self.record_symbol(sym.id());
    }
}

// ============================================================================
// Drivers
// ============================================================================

/// Build the root portion of a snapshot: the super root, the GC roots node, and one node per
/// root section.
pub fn snapshot_roots(roots: &mut impl RootEnumerator, ids: &mut IdTracker) -> HeapSnapshot {
    let mut snap = HeapSnapshot::new();

    snap.begin_node();
    snap.add_indexed_edge(
        EdgeType::Element,
        1,
        IdTracker::reserved(ReservedObjectId::GcRoots),
    );
    snap.end_node(
        NodeType::Synthetic,
        "",
        IdTracker::reserved(ReservedObjectId::SuperRoot),
        0,
        0,
    );

    snap.begin_node();
    {
        let mut sections = SnapshotRootSectionVisitor::new(&mut snap);
        roots.mark_roots(&mut sections, true);
        roots.mark_weak_roots(&mut sections);
    }
    snap.end_node(
        NodeType::Synthetic,
        "(GC roots)",
        IdTracker::reserved(ReservedObjectId::GcRoots),
        0,
        0,
    );

    {
        let mut visitor = SnapshotRootVisitor::new(&mut snap, ids);
        roots.mark_roots(&mut visitor, true);
        roots.mark_weak_roots(&mut visitor);
    }

    log::debug!(
        "root snapshot: {} nodes, {} edges",
        snap.nodes().len(),
        snap.edges().len()
    );
    snap
}

/// Add a node for one object, with an edge per slot.
pub fn snapshot_object<O: VisitSlots + ?Sized>(
    snap: &mut HeapSnapshot,
    ids: &mut IdTracker,
    object: &mut O,
    addr: GcPtr<u8>,
    node_type: NodeType,
    name: &str,
    self_size: usize,
) {
    snap.begin_node();
    {
        let mut visitor = EdgeAddingVisitor::new(snap, ids);
        object.visit_slots(&mut visitor);
        object.visit_weak_refs(&mut visitor);
    }
    let id = ids.object_id(addr);
    snap.end_node(node_type, name, id, self_size, 0);
}
