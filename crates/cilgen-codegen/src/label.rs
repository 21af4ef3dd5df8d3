//! Labels and branches. A label is created unplaced, can be the target of any number of
//! jumps before and after it is placed, and is placed exactly once.
//!
//! A *leave* label lies outside the exception-protected regions some of its jumps come
//! from. Whether a given `goto` leaves a protected region is not always known when the
//! jump is emitted, so unconditional jumps to leave labels are emitted as the
//! `br.or.leave` pseudo-instruction and turned into `leave` or `br` when the method ends,
//! depending on how the target ended up being placed.
use crate::{
    asm::{Insn, LabelId, Line, Operand},
    context::CompilationContext,
    error::{GenError, Result},
};
use lang::Opcode;
use std::collections::{BTreeSet, HashSet};

/// A branch target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label {
    id: LabelId,
    leave: bool,
}

impl Label {
    #[must_use]
    pub fn id(&self) -> LabelId {
        self.id
    }

    /// Check if jumps to the label may have to leave a protected region.
    #[must_use]
    pub fn is_leave(&self) -> bool {
        self.leave
    }
}

/// Label counters, for instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LabelStats {
    pub created: usize,
    pub placed: usize,
}

/// The book-keeping of every label of a compilation unit.
#[derive(Debug, Clone)]
pub(crate) struct LabelLedger {
    next: u32,
    stats: LabelStats,
    unplaced: BTreeSet<LabelId>,
    placed: HashSet<LabelId>,
    leave_targets: HashSet<LabelId>,
    switch: Option<Vec<LabelId>>,
}

impl LabelLedger {
    pub(crate) fn new() -> Self {
        Self {
            next: 1,
            stats: LabelStats::default(),
            unplaced: BTreeSet::new(),
            placed: HashSet::new(),
            leave_targets: HashSet::new(),
            switch: None,
        }
    }

    fn allocate(&mut self, leave: bool) -> Result<Label> {
        let id = LabelId(self.next);
        self.next = self.next.checked_add(1).ok_or(GenError::LabelsExhausted)?;
        self.unplaced.insert(id);
        self.stats.created += 1;
        Ok(Label { id, leave })
    }

    fn mark_placed(&mut self, label: &Label, leave: bool) {
        assert!(
            self.placed.insert(label.id),
            "label {} placed twice",
            label.id
        );
        self.unplaced.remove(&label.id);
        if leave {
            self.leave_targets.insert(label.id);
        }
        self.stats.placed += 1;
    }

    pub(crate) fn leave_targets(&self) -> &HashSet<LabelId> {
        &self.leave_targets
    }

    /// # Panics
    /// Panics if a label is still unplaced or a switch table is still open.
    pub(crate) fn assert_all_placed(&self, context: &str) {
        assert!(
            self.switch.is_none(),
            "switch table still open at the end of {context}"
        );
        if !self.unplaced.is_empty() {
            let names = self
                .unplaced
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            panic!("labels never placed at the end of {context}: {names}");
        }
    }
}

impl CompilationContext {
    /// Create a new unplaced label.
    ///
    /// # Errors
    /// Returns [`GenError::LabelsExhausted`] when every label identifier is in use.
    pub fn new_label(&mut self) -> Result<Label> {
        self.labels.allocate(false)
    }

    /// Create a new unplaced leave label.
    ///
    /// # Errors
    /// Returns [`GenError::LabelsExhausted`] when every label identifier is in use.
    pub fn new_leave_label(&mut self) -> Result<Label> {
        self.labels.allocate(true)
    }

    /// Emit a branch to a label, placed or not.
    ///
    /// # Panics
    /// Panics if the opcode is not a branch.
    pub fn jump(&mut self, opcode: Opcode, label: &Label) {
        assert!(opcode.is_branch(), "{opcode} is not a branch");
        let opcode = if label.leave && opcode.is_unconditional_branch() {
            Opcode::BranchOrLeave
        } else {
            opcode
        };
        self.flush();
        self.output
            .push(Line::Insn(Insn::new(opcode, Operand::Target(label.id))));
    }

    /// Place a label at the current position.
    ///
    /// # Panics
    /// Panics if the label was already placed.
    pub fn place(&mut self, label: &Label) {
        self.place_label(label, false);
    }

    /// Place a label at the current position, outside the protected regions the jumps
    /// to it come from: pending `br.or.leave` jumps to it will become `leave`.
    ///
    /// # Panics
    /// Panics if the label was already placed.
    pub fn place_leave(&mut self, label: &Label) {
        self.place_label(label, true);
    }

    fn place_label(&mut self, label: &Label, leave: bool) {
        self.flush();
        self.labels.mark_placed(label, leave);
        tracing::trace!(label = %label.id, leave, "place label");
        self.output.push(Line::Label { id: label.id, leave });
    }

    /// Start a `switch` table.
    ///
    /// # Panics
    /// Panics if another table is still open.
    pub fn switch_start(&mut self) {
        assert!(self.labels.switch.is_none(), "nested switch tables");
        self.flush();
        self.labels.switch = Some(Vec::new());
    }

    /// Add a target to the open `switch` table. `is_first` must be set for the first
    /// target only.
    ///
    /// # Panics
    /// Panics if no table is open, or if `is_first` does not match the position of the
    /// target in the table.
    pub fn switch_ref(&mut self, label: &Label, is_first: bool) {
        let Some(targets) = self.labels.switch.as_mut() else {
            panic!("switch reference outside of a switch table");
        };
        assert_eq!(
            targets.is_empty(),
            is_first,
            "switch reference {} out of order",
            label.id
        );
        targets.push(label.id);
    }

    /// Close the open `switch` table, emitting the `switch` instruction after whatever
    /// was queued while the table was open.
    ///
    /// # Panics
    /// Panics if no table is open.
    pub fn switch_end(&mut self) {
        let Some(targets) = self.labels.switch.take() else {
            panic!("switch table closed without being opened");
        };
        self.flush();
        self.output
            .push(Line::Insn(Insn::new(Opcode::Switch, Operand::Switch(targets))));
    }

    /// Get the label counters.
    #[must_use]
    pub fn label_stats(&self) -> LabelStats {
        self.labels.stats
    }
}
