//! Marking traversal
//!
//! `Marker` records every strongly reachable object in a `MarkState` and pushes newly marked
//! objects onto the mark stack. The collector drains the stack, walking each object's slots
//! with the same marker, until nothing is left. Weak references are not followed: weak slots are
//! flagged as reached, and weak roots are left for `WeakRootClearer` once marking is done.

use hashbrown::HashSet;

use crate::{
    dropping::NameDroppingAdapter,
    pointer::{GcPtr, RootPtr},
    section::RootSection,
    value::{GcPointer, GcSymbol, GcValue, PinnedValue, RootSymbol, SymbolId, Value},
    visitor::{
        RootEnumerator, RootSectionVisitor, RootVisitor, SlotVisitor, WeakRefVisitor,
        WeakRootVisitor,
    },
    weak::{WeakRef, WeakRoot},
};

/// State of one marking pass.
pub struct MarkState {
    marked: HashSet<usize>,
    /// Marked objects whose slots have not been visited yet
    mark_stack: Vec<GcPtr<u8>>,
    live_symbols: HashSet<SymbolId>,
    /// Number of weak reference slots reached
    weak_refs_reached: usize,
}

impl MarkState {
    pub fn new() -> MarkState {
        MarkState {
            marked: HashSet::new(),
            mark_stack: Vec::new(),
            live_symbols: HashSet::new(),
            weak_refs_reached: 0,
        }
    }

    /// Mark an object. Returns true if it was not already marked.
    #[inline]
    pub fn mark(&mut self, ptr: GcPtr<u8>) -> bool {
        if self.marked.insert(ptr.addr()) {
            self.mark_stack.push(ptr);
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn is_marked(&self, ptr: GcPtr<u8>) -> bool {
        self.marked.contains(&ptr.addr())
    }

    #[inline]
    pub fn mark_symbol(&mut self, sym: SymbolId) {
        if sym.is_valid() {
            self.live_symbols.insert(sym);
        }
    }

    #[inline]
    pub fn is_symbol_live(&self, sym: SymbolId) -> bool {
        self.live_symbols.contains(&sym)
    }

    pub fn num_marked(&self) -> usize {
        self.marked.len()
    }

    pub fn num_live_symbols(&self) -> usize {
        self.live_symbols.len()
    }

    pub fn weak_refs_reached(&self) -> usize {
        self.weak_refs_reached
    }

    /// Whether objects are still waiting to have their slots visited.
    pub fn has_pending(&self) -> bool {
        !self.mark_stack.is_empty()
    }

    /// Mark everything reachable from the roots of `roots`.
    ///
    /// `trace` is the object walker: given a marked object it must report that object's slots to
    /// the visitor it is passed.
    pub fn mark_all<R, F>(&mut self, roots: &mut R, mut trace: F)
    where
        R: RootEnumerator,
        F: FnMut(GcPtr<u8>, &mut NameDroppingAdapter<'_, Marker<'_>>),
    {
        {
            let mut marker = Marker::new(self);
            roots.mark_roots(&mut NameDroppingAdapter::new(&mut marker), true);
        }

        log::trace!("marked {} objects from roots", self.marked.len());

        self.drain(|ptr, marker| trace(ptr, &mut NameDroppingAdapter::new(marker)));

        log::debug!(
            "marking finished: {} objects, {} symbols",
            self.marked.len(),
            self.live_symbols.len()
        );
    }

    /// Pop objects off the mark stack and visit their slots until the stack is empty.
    ///
    /// Returns the number of objects visited.
    pub fn drain(&mut self, mut trace: impl FnMut(GcPtr<u8>, &mut Marker<'_>)) -> usize {
        let mut work_done = 0;
        while let Some(ptr) = self.mark_stack.pop() {
            let mut marker = Marker::new(self);
            trace(ptr, &mut marker);
            work_done += 1;
        }
        work_done
    }
}

impl Default for MarkState {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks every strongly held reference it is given.
pub struct Marker<'a> {
    state: &'a mut MarkState,
}

impl<'a> Marker<'a> {
    pub fn new(state: &'a mut MarkState) -> Self {
        Marker { state }
    }

    #[inline]
    fn mark_value(&mut self, value: Value) {
        match value {
            Value::Pointer(ptr) => {
                self.state.mark(ptr);
            }
            Value::Symbol(sym) => self.state.mark_symbol(sym),
            _ => {}
        }
    }
}

impl RootSectionVisitor for Marker<'_> {
    fn begin_root_section(&mut self, section: RootSection) {
        log::trace!("marking root section {}", section);
    }
}

impl RootVisitor for Marker<'_> {
    #[inline]
    fn accept_root(&mut self, ptr: &mut RootPtr) {
        if let Some(ptr) = *ptr {
            self.state.mark(ptr);
        }
    }

    #[inline]
    fn accept_root_value(&mut self, value: &mut PinnedValue) {
        self.mark_value(value.get());
    }

    #[inline]
    fn accept_root_symbol(&mut self, sym: RootSymbol) {
        self.state.mark_symbol(sym.id());
    }
}

impl SlotVisitor for Marker<'_> {
    #[inline]
    fn accept_pointer(&mut self, ptr: &mut GcPointer) {
        if let Some(ptr) = ptr.get() {
            self.state.mark(ptr);
        }
    }

    #[inline]
    fn accept_value(&mut self, value: &mut GcValue) {
        self.mark_value(value.get());
    }

    #[inline]
    fn accept_symbol(&mut self, sym: GcSymbol) {
        self.state.mark_symbol(sym.id());
    }
}

impl WeakRefVisitor for Marker<'_> {
    fn accept_weak_ref(&mut self, weak: &mut WeakRef) {
        // The slot is in use; its target is not traced
        weak.mark();
        self.state.weak_refs_reached += 1;
    }
}

impl WeakRootVisitor for Marker<'_> {
    fn accept_weak(&mut self, _root: &mut WeakRoot) {
        // Weak roots are processed after marking by WeakRootClearer
    }
}

/// Clears weak references and weak roots whose targets were not marked.
pub struct WeakRootClearer<'a> {
    state: &'a MarkState,
    cleared: usize,
}

impl<'a> WeakRootClearer<'a> {
    pub fn new(state: &'a MarkState) -> Self {
        WeakRootClearer { state, cleared: 0 }
    }

    /// Number of references cleared so far.
    pub fn cleared(&self) -> usize {
        self.cleared
    }

    fn is_dead(&self, target: Option<GcPtr<u8>>) -> bool {
        matches!(target, Some(ptr) if !self.state.is_marked(ptr))
    }
}

impl RootSectionVisitor for WeakRootClearer<'_> {}

impl WeakRefVisitor for WeakRootClearer<'_> {
    fn accept_weak_ref(&mut self, weak: &mut WeakRef) {
        if self.is_dead(weak.pointer()) {
            weak.clear_pointer();
            self.cleared += 1;
        }
        weak.unmark();
    }
}

impl WeakRootVisitor for WeakRootClearer<'_> {
    fn accept_weak(&mut self, root: &mut WeakRoot) {
        if self.is_dead(root.get()) {
            root.clear();
            self.cleared += 1;
        }
    }
}
