use clap::Parser;

use so2js_gc_visit::{
    experiment_flags, init_experiment_flags,
    snapshot::{snapshot_object, snapshot_roots, IdTracker, NodeType, PrimitiveNodeVisitor},
    visit_section, ExperimentFlags, GcPointer, GcPtr, GcSymbol, GcValue, HeapBounds, MarkState,
    NameDroppingAdapter, NamedCombinedVisitor, NamedVisitorExt, PinnedValue, RootEnumerator,
    RootLister, RootSection, RootSymbol, RootVisitor, SymbolId, Value, VisitSlots, WeakRef,
    WeakRefVisitor, WeakRoot, WeakRootClearer, WeakRootVisitor, WellFormedChecker,
};

/// Raw command line arguments.
#[derive(Parser)]
#[command(about = "Walk a small synthetic heap with each collector traversal")]
pub struct Args {
    /// Experiment flags, as names or a number, separated by `,` or `|`
    #[arg(long, env = "SO2JS_GC_EXPERIMENTS")]
    pub experiments: Option<String>,

    /// Print every root with its section and name
    #[arg(long, default_value_t = false)]
    pub list: bool,

    /// Print a heap snapshot as JSON
    #[arg(long, default_value_t = false)]
    pub snapshot: bool,

    /// Check that every reference in the heap is well formed before marking
    #[arg(long, default_value_t = false)]
    pub verify: bool,

    /// Number of objects in the linked list reachable from the roots
    #[arg(long, default_value_t = 4)]
    pub length: usize,
}

pub fn print_error_message_and_exit(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

/// A heap object with one slot of each kind.
struct DemoObject {
    name: &'static str,
    next: GcPointer,
    payload: GcValue,
    tag: GcSymbol,
    weak: WeakRef,
}

impl VisitSlots for DemoObject {
    fn visit_slots(&mut self, visitor: &mut impl NamedCombinedVisitor) {
        visitor.accept_pointer_named(&mut self.next, Some("next"));
        visitor.accept_value_named(&mut self.payload, Some("payload"));
        visitor.accept_symbol_named(self.tag, Some("tag"));
    }

    fn visit_weak_refs(&mut self, visitor: &mut impl WeakRefVisitor) {
        visitor.accept_weak_ref(&mut self.weak);
    }
}

struct DemoHeap {
    objects: Vec<Box<DemoObject>>,
    symbols: Vec<&'static str>,
}

impl DemoHeap {
    fn new() -> DemoHeap {
        DemoHeap {
            objects: Vec::new(),
            symbols: vec!["length", "prototype", "constructor"],
        }
    }

    fn alloc(&mut self, name: &'static str, tag: u32) -> GcPtr<u8> {
        let object = Box::new(DemoObject {
            name,
            next: GcPointer::null(),
            payload: GcValue::new(Value::Undefined),
            tag: GcSymbol::new(SymbolId::new(tag)),
            weak: WeakRef::free_slot(),
        });
        let ptr = DemoHeap::address_of(&object);
        self.objects.push(object);
        ptr
    }

    fn address_of(object: &DemoObject) -> GcPtr<u8> {
        GcPtr::from_non_null(std::ptr::NonNull::from(object).cast())
    }

    fn get_mut(&mut self, ptr: GcPtr<u8>) -> Option<&mut DemoObject> {
        self.objects
            .iter_mut()
            .map(|object| &mut **object)
            .find(|object| &**object as *const DemoObject as usize == ptr.addr())
    }

    fn addresses(&self) -> Vec<GcPtr<u8>> {
        self.objects
            .iter()
            .map(|object| DemoHeap::address_of(object))
            .collect()
    }

    /// A snapshot of the heap's extent for the well-formedness checker.
    fn bounds(&self) -> HeapView {
        HeapView {
            addresses: self.addresses(),
            num_symbols: self.symbols.len(),
        }
    }
}

struct HeapView {
    addresses: Vec<GcPtr<u8>>,
    num_symbols: usize,
}

impl HeapBounds for HeapView {
    fn is_valid_pointer(&self, ptr: GcPtr<u8>) -> bool {
        self.addresses.contains(&ptr)
    }

    fn is_symbol_live(&self, sym: SymbolId) -> bool {
        (sym.index() as usize) < self.num_symbols
    }

    fn string_for_symbol(&self, _: SymbolId) -> Option<GcPtr<u8>> {
        None
    }
}

/// Registers, handles, and the symbol registry of a stopped mutator.
struct DemoRoots {
    registers: Vec<Option<GcPtr<u8>>>,
    handles: Vec<PinnedValue>,
    symbols: Vec<RootSymbol>,
    global: Option<GcPtr<DemoObject>>,
    weak_roots: Vec<WeakRoot>,
}

impl RootEnumerator for DemoRoots {
    fn mark_roots(&mut self, visitor: &mut impl NamedCombinedVisitor, _mark_long_lived: bool) {
        visit_section(visitor, RootSection::Registers, |v| {
            for reg in &mut self.registers {
                v.accept_root(reg);
            }
        });
        visit_section(visitor, RootSection::GcScopes, |v| {
            for handle in &mut self.handles {
                v.accept_root_value(handle);
            }
        });
        visit_section(visitor, RootSection::SymbolRegistry, |v| {
            for sym in &self.symbols {
                v.accept_root_symbol(*sym);
            }
        });
        visit_section(visitor, RootSection::Custom, |v| {
            v.accept_root_ptr_named(&mut self.global, Some("global"));
        });
    }

    fn mark_weak_roots(&mut self, visitor: &mut impl WeakRootVisitor) {
        visit_section(visitor, RootSection::WeakRefs, |v| {
            for root in &mut self.weak_roots {
                v.accept_weak(root);
            }
        });
    }
}

/// A list of `length` objects hanging off a register, plus one garbage object that is only
/// reachable weakly.
fn build_demo(length: usize) -> (DemoHeap, DemoRoots) {
    const NAMES: [&str; 4] = ["head", "middle", "tail", "extra"];

    let mut heap = DemoHeap::new();
    let mut prev: Option<GcPtr<u8>> = None;
    let mut head = None;
    for i in 0..length {
        let ptr = heap.alloc(NAMES[i.min(NAMES.len() - 1)], (i % 3) as u32);
        if let Some(object) = heap.get_mut(ptr) {
            object.payload.set(Value::Number(i as f64 * 1.5));
        }
        match prev {
            Some(prev) => {
                if let Some(object) = heap.get_mut(prev) {
                    object.next.set(Some(ptr));
                }
            }
            None => head = Some(ptr),
        }
        prev = Some(ptr);
    }

    let garbage = heap.alloc("garbage", 0);
    if let Some(head) = head {
        if let Some(object) = heap.get_mut(head) {
            object.weak = WeakRef::new(Some(garbage));
        }
    }

    let roots = DemoRoots {
        registers: vec![head, None],
        handles: vec![
            PinnedValue::new(Value::Bool(true)),
            PinnedValue::new(Value::Symbol(SymbolId::new(1))),
        ],
        symbols: vec![RootSymbol::new(SymbolId::new(2))],
        global: head.map(|head| head.cast()),
        weak_roots: vec![WeakRoot::new(Some(garbage)), WeakRoot::new(head)],
    };

    (heap, roots)
}

fn list_roots(roots: &mut DemoRoots) {
    let mut lister = RootLister::new();
    roots.mark_roots(&mut lister, true);
    roots.mark_weak_roots(&mut lister);

    for record in lister.records() {
        println!(
            "{:<16} {:<12} {:<8} {:?}",
            record.section.name(),
            record.kind.name(),
            record.name.as_deref().unwrap_or("-"),
            record.referent
        );
    }
}

fn print_snapshot(heap: &mut DemoHeap, roots: &mut DemoRoots) {
    let mut ids = IdTracker::new();
    let mut snap = snapshot_roots(roots, &mut ids);

    let mut primitives = PrimitiveNodeVisitor::new();
    roots.mark_roots(&mut primitives, true);

    for ptr in heap.addresses() {
        if let Some(object) = heap.get_mut(ptr) {
            object.visit_slots(&mut primitives);
            let name = object.name;
            let size = std::mem::size_of::<DemoObject>();
            snapshot_object(&mut snap, &mut ids, object, ptr, NodeType::Object, name, size);
        }
    }
    primitives.write_all_nodes_with(&mut snap, &mut ids, |sym| {
        heap.symbols
            .get(sym.index() as usize)
            .map(|name| name.to_string())
    });

    match serde_json::to_string_pretty(&snap) {
        Ok(json) => println!("{json}"),
        Err(err) => print_error_message_and_exit(&format!("could not serialize snapshot: {err}")),
    }
}

fn verify(heap: &mut DemoHeap, roots: &mut DemoRoots) {
    let bounds = heap.bounds();
    let mut checker = WellFormedChecker::new(&bounds);
    roots.mark_roots(&mut NameDroppingAdapter::new(&mut checker), true);
    roots.mark_weak_roots(&mut checker);
    for ptr in &bounds.addresses {
        if let Some(object) = heap.get_mut(*ptr) {
            object.visit_slots(&mut NameDroppingAdapter::new(&mut checker));
            object.visit_weak_refs(&mut checker);
        }
    }

    println!("verified {} references", checker.checked());
}

fn collect(heap: &mut DemoHeap, roots: &mut DemoRoots) {
    let mut state = MarkState::new();
    state.mark_all(roots, |ptr, visitor| {
        if let Some(object) = heap.get_mut(ptr) {
            object.visit_slots(visitor);
            object.visit_weak_refs(visitor.inner());
        }
    });

    let mut clearer = WeakRootClearer::new(&state);
    roots.mark_weak_roots(&mut clearer);
    for ptr in heap.addresses() {
        if state.is_marked(ptr) {
            if let Some(object) = heap.get_mut(ptr) {
                object.visit_weak_refs(&mut clearer);
            }
        }
    }

    let before = heap.objects.len();
    heap.objects
        .retain(|object| state.is_marked(DemoHeap::address_of(object)));

    println!(
        "marked {} of {} objects, {} live symbols, cleared {} weak references",
        state.num_marked(),
        before,
        state.num_live_symbols(),
        clearer.cleared()
    );
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Some(experiments) = &args.experiments {
        let flags = match experiments.parse::<ExperimentFlags>() {
            Ok(flags) => flags,
            Err(err) => print_error_message_and_exit(&err.to_string()),
        };
        if let Err(err) = init_experiment_flags(flags) {
            print_error_message_and_exit(&err.to_string());
        }
    }

    let flags = experiment_flags();
    log::info!(
        "experiments: {} (heap advice {:?}, string advice {:?})",
        flags,
        flags.heap_advice(),
        flags.string_advice()
    );

    let (mut heap, mut roots) = build_demo(args.length.max(1));

    if args.list {
        list_roots(&mut roots);
    }

    if args.verify {
        verify(&mut heap, &mut roots);
    }

    if args.snapshot {
        print_snapshot(&mut heap, &mut roots);
    }

    collect(&mut heap, &mut roots);
}
