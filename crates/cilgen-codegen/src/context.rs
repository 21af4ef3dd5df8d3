use crate::{
    asm::Assembly,
    binder::{ItemTable, SavedContext},
    diagnostic::Reporter,
    image::Image,
    label::LabelLedger,
    peephole::PeepholeQueue,
    scope::ScopeArena,
    slot::MethodFrame,
};
use ast::{NodeId, ScopeId};

/// Per-unit options chosen by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Apply the peephole rewrites.
    pub peephole: bool,

    /// Use overflow-checked arithmetic by default.
    pub checked: bool,

    /// The name of the produced assembly.
    pub assembly_name: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            peephole: true,
            checked: false,
            assembly_name: String::from("program"),
        }
    }
}

/// Everything the backend knows about the compilation unit being generated. The driver
/// creates one per unit and threads it, mutably, through every backend call.
#[derive(Debug)]
pub struct CompilationContext {
    pub options: Options,
    pub reporter: Reporter,
    pub image: Image,
    pub scopes: ScopeArena,

    /// The scope names are currently resolved in.
    pub current_scope: ScopeId,

    /// The definition node of the class being generated, if any.
    pub current_class: Option<NodeId>,

    /// The namespace node enclosing the current declaration, if any.
    pub current_namespace: Option<NodeId>,

    /// The generic parameters of the current class.
    pub type_formals: Option<NodeId>,

    /// The generic parameters of the current method.
    pub method_formals: Option<NodeId>,

    /// Whether arithmetic is currently overflow-checked.
    pub overflow_insns: bool,

    /// Whether arithmetic is overflow-checked outside of any `checked` or `unchecked`
    /// region.
    pub overflow_global: bool,

    /// Whether a `checked` or `unchecked` region changed the overflow mode.
    pub overflow_changed: bool,

    pub(crate) output: Assembly,
    pub(crate) peephole: PeepholeQueue,
    pub(crate) labels: LabelLedger,
    pub(crate) bindings: ItemTable,
    pub(crate) method: Option<MethodFrame>,
    pub(crate) stack_height: i32,
    pub(crate) max_stack_height: u32,
}

impl CompilationContext {
    /// Create the context of a new compilation unit, reporting diagnostics on the
    /// standard error stream.
    #[must_use]
    pub fn new(options: Options) -> Self {
        let scopes = ScopeArena::new();
        Self {
            current_scope: scopes.global(),
            current_class: None,
            current_namespace: None,
            type_formals: None,
            method_formals: None,
            overflow_insns: options.checked,
            overflow_global: options.checked,
            overflow_changed: false,
            reporter: Reporter::new(),
            image: Image::new(),
            scopes,
            output: Assembly::new(),
            peephole: PeepholeQueue::new(options.peephole),
            labels: LabelLedger::new(),
            bindings: ItemTable::default(),
            method: None,
            stack_height: 0,
            max_stack_height: 0,
            options,
        }
    }

    /// Take a snapshot of the lexical context: scope, class, namespace, formals and
    /// overflow mode.
    #[must_use]
    pub fn snapshot(&self) -> SavedContext {
        SavedContext::capture(self)
    }

    /// Run a closure with arithmetic overflow checking forced on or off, as a `checked`
    /// or `unchecked` region does, restoring the previous mode afterwards.
    pub fn with_overflow<T, F: FnOnce(&mut Self) -> T>(&mut self, checked: bool, f: F) -> T {
        let (insns, changed) = (self.overflow_insns, self.overflow_changed);
        self.overflow_insns = checked;
        self.overflow_changed = true;
        let result = f(self);
        self.overflow_insns = insns;
        self.overflow_changed = changed;
        result
    }

    /// Get the listing produced so far. Queued instructions are committed first.
    pub fn assembly(&mut self) -> &Assembly {
        self.flush();
        &self.output
    }

    /// Finish the compilation unit and hand the listing over.
    ///
    /// # Panics
    /// Panics if a method is still open, or if a label was created but never placed.
    #[must_use]
    pub fn finish(mut self) -> Assembly {
        assert!(
            self.method.is_none(),
            "compilation unit finished inside a method"
        );
        self.flush();
        self.labels.assert_all_placed("the compilation unit");
        let leave_targets = self.labels.leave_targets().clone();
        self.output.resolve_branch_or_leave(0, &leave_targets);

        let stats = self.label_stats();
        tracing::debug!(
            lines = self.output.len(),
            labels = stats.created,
            rewrites = self.peephole.rewrites(),
            "compilation unit finished"
        );
        self.output
    }
}
