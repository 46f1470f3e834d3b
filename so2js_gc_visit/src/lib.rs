//! SO2JS GC Visitation
//!
//! The contract between the collector's traversals and the layout of managed objects. Objects
//! and root enumerators report each reference they hold to a visitor; the visitor belongs to the
//! running traversal (marking, relocation, heap snapshot, verification, root listing) and may
//! rewrite the slot it is given.
//!
//! Key traits:
//! - `SlotVisitor`, `RootVisitor`, `CombinedVisitor`: strong references in objects and roots
//! - `NamedCombinedVisitor`: the same, with diagnostic field names
//! - `WeakRefVisitor`, `WeakRootVisitor`: weak references
//! - `RootSectionVisitor`: attribution of roots to sections
//!
//! Key types:
//! - `NameDroppingAdapter`: lets a name-agnostic visitor stand in for a named one
//! - `ExperimentFlags`: process-wide collector tuning bits
//! - `Marker`, `Relocator`, `RootLister`, `WellFormedChecker`: traversals

mod checker;
mod dropping;
mod experiments;
mod kind;
mod lister;
mod marker;
mod pointer;
mod relocator;
mod section;
pub mod snapshot;
mod value;
mod visitor;
mod weak;

pub use checker::{HeapBounds, WellFormedChecker};
pub use dropping::NameDroppingAdapter;
pub use experiments::{
    experiment_flags, init_experiment_flags, ExperimentFlags, ExperimentsAlreadySet, MemoryAdvice,
    ParseExperimentError,
};
pub use kind::SlotKind;
pub use lister::{Referent, RootLister, RootRecord};
pub use marker::{MarkState, Marker, WeakRootClearer};
pub use pointer::{erase_root_ptr, GcPtr, RootPtr};
pub use relocator::{ForwardingTable, Relocator};
pub use section::{visit_section, RootSection, SectionTracker};
pub use snapshot::HeapSnapshot;
pub use value::{
    CompressedPointer, GcPointer, GcSymbol, GcValue, PinnedValue, PointerBase, RootSymbol,
    SymbolId, Value,
};
pub use visitor::{
    CombinedVisitor, NamedCombinedVisitor, NamedVisitorExt, RootEnumerator, RootSectionVisitor,
    RootVisitor, RootVisitorExt, SlotVisitor, VisitSlots, WeakRefVisitor, WeakRootVisitor,
};
pub use weak::{WeakRef, WeakRoot, WeakSlotState};
