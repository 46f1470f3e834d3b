//! Root sections
//!
//! Root enumeration is split into labelled sections so that snapshots and diagnostics can
//! attribute each root to the part of the runtime that holds it. Sections carry no identity
//! beyond their label.

use crate::visitor::RootSectionVisitor;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RootSection {
    Registers,
    InstanceVars,
    RuntimeInstanceVars,
    RuntimeModules,
    CharStrings,
    StringCycleCheckVisited,
    Builtins,
    Jobs,
    WeakRefs,
    Prototypes,
    IdentifierTable,
    GcScopes,
    SymbolRegistry,
    SamplingProfiler,
    CodeCoverageProfiler,
    Custom,
    /// Number of real sections, not a section itself
    NumSections,
    /// Sentinel for "no section"
    InvalidSection,
}

impl RootSection {
    /// Every real section, in declaration order.
    pub const ALL: [RootSection; RootSection::COUNT] = [
        RootSection::Registers,
        RootSection::InstanceVars,
        RootSection::RuntimeInstanceVars,
        RootSection::RuntimeModules,
        RootSection::CharStrings,
        RootSection::StringCycleCheckVisited,
        RootSection::Builtins,
        RootSection::Jobs,
        RootSection::WeakRefs,
        RootSection::Prototypes,
        RootSection::IdentifierTable,
        RootSection::GcScopes,
        RootSection::SymbolRegistry,
        RootSection::SamplingProfiler,
        RootSection::CodeCoverageProfiler,
        RootSection::Custom,
    ];

    pub const COUNT: usize = RootSection::NumSections as usize;

    #[inline]
    pub const fn index(&self) -> usize {
        *self as usize
    }

    /// Whether this is a real section rather than one of the two sentinels.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        (*self as usize) < RootSection::COUNT
    }

    pub const fn name(&self) -> &'static str {
        match self {
            RootSection::Registers => "Registers",
            RootSection::InstanceVars => "InstanceVars",
            RootSection::RuntimeInstanceVars => "RuntimeInstanceVars",
            RootSection::RuntimeModules => "RuntimeModules",
            RootSection::CharStrings => "CharStrings",
            RootSection::StringCycleCheckVisited => "StringCycleCheckVisited",
            RootSection::Builtins => "Builtins",
            RootSection::Jobs => "Jobs",
            RootSection::WeakRefs => "WeakRefs",
            RootSection::Prototypes => "Prototypes",
            RootSection::IdentifierTable => "IdentifierTable",
            RootSection::GcScopes => "GcScopes",
            RootSection::SymbolRegistry => "SymbolRegistry",
            RootSection::SamplingProfiler => "SamplingProfiler",
            RootSection::CodeCoverageProfiler => "CodeCoverageProfiler",
            RootSection::Custom => "Custom",
            RootSection::NumSections => "NumSections",
            RootSection::InvalidSection => "InvalidSection",
        }
    }

    /// Name of the synthetic snapshot node for this section, e.g. `(Registers)`.
    pub fn snapshot_name(&self) -> String {
        format!("({})", self.name())
    }
}

impl std::fmt::Display for RootSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Tracks the currently open root sections of one traversal.
///
/// `end` always closes the most recently opened section. Closing with nothing open is a bug in
/// the root enumerator and panics.
#[derive(Debug, Default)]
pub struct SectionTracker {
    open: Vec<RootSection>,
}

impl SectionTracker {
    pub const fn new() -> SectionTracker {
        SectionTracker { open: Vec::new() }
    }

    pub fn begin(&mut self, section: RootSection) {
        assert!(section.is_valid(), "cannot begin sentinel root section {}", section);
        self.open.push(section);
    }

    /// Close the innermost open section and return it.
    pub fn end(&mut self) -> RootSection {
        match self.open.pop() {
            Some(section) => section,
            None => panic!("end_root_section called without a matching begin_root_section"),
        }
    }

    /// The innermost open section, or `InvalidSection` when none is open.
    #[inline]
    pub fn current(&self) -> RootSection {
        self.open
            .last()
            .copied()
            .unwrap_or(RootSection::InvalidSection)
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    #[inline]
    pub fn is_balanced(&self) -> bool {
        self.open.is_empty()
    }
}

/// Run `f` inside a matched `begin_root_section`/`end_root_section` pair.
pub fn visit_section<V, R>(visitor: &mut V, section: RootSection, f: impl FnOnce(&mut V) -> R) -> R
where
    V: RootSectionVisitor + ?Sized,
{
    visitor.begin_root_section(section);
    let result = f(visitor);
    visitor.end_root_section();
    result
}
