//! The peephole queue. Instructions emitted through the queue are held in a short window
//! before they are committed to the listing, so that a pair of adjacent instructions that
//! cancel each other out can be dropped before anybody sees it.
//!
//! Every rewrite only ever looks at the tail of the window, so an instruction committed to
//! the listing is final. A flush commits the whole window and is what makes branches,
//! labels, calls and directives safe: nothing emitted before them can be rewritten with
//! something emitted after them.
use crate::asm::{Assembly, Insn, Line};
use lang::Opcode;
use std::collections::VecDeque;

/// The number of instructions held back before the oldest one is committed.
const WINDOW: usize = 4;

#[derive(Debug, Clone)]
pub struct PeepholeQueue {
    window: VecDeque<Insn>,
    enabled: bool,
    rewrites: usize,
}

impl PeepholeQueue {
    /// Create an empty queue. A disabled queue commits every instruction right away.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            window: VecDeque::with_capacity(WINDOW + 1),
            enabled,
            rewrites: 0,
        }
    }

    /// Check if rewrites are applied.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable rewrites. Disabling commits what the window holds.
    pub fn set_enabled(&mut self, enabled: bool, out: &mut Assembly) {
        if !enabled {
            self.flush(out);
        }
        self.enabled = enabled;
    }

    /// Get the number of rewrites applied since the queue was created.
    #[must_use]
    pub fn rewrites(&self) -> usize {
        self.rewrites
    }

    /// Get the number of instructions waiting in the window.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.window.len()
    }

    /// Queue an instruction, committing the oldest ones once the window is full.
    pub fn push(&mut self, insn: Insn, out: &mut Assembly) {
        if !self.enabled {
            out.push(Line::Insn(insn));
            return;
        }

        self.window.push_back(insn);
        self.rewrite();
        while self.window.len() > WINDOW {
            if let Some(oldest) = self.window.pop_front() {
                out.push(Line::Insn(oldest));
            }
        }
    }

    /// Commit every queued instruction, in order.
    pub fn flush(&mut self, out: &mut Assembly) {
        for insn in self.window.drain(..) {
            out.push(Line::Insn(insn));
        }
    }

    /// Apply rewrites to the tail of the window until none applies anymore. Dropping a
    /// pair can make two older instructions adjacent, hence the loop.
    fn rewrite(&mut self) {
        loop {
            let len = self.window.len();
            if len < 2 {
                return;
            }

            let (first, second) = (&self.window[len - 2], &self.window[len - 1]);
            if cancels_out(first.opcode, second.opcode) {
                tracing::trace!(first = %first.opcode, second = %second.opcode, "peephole: drop pair");
                self.window.truncate(len - 2);
            } else if first == second && first.opcode.is_conversion() {
                tracing::trace!(conv = %first.opcode, "peephole: collapse conversion");
                self.window.truncate(len - 1);
            } else {
                return;
            }
            self.rewrites += 1;
        }
    }
}

/// Check if executing `first` then `second` leaves the stack and every location exactly
/// as they were.
fn cancels_out(first: Opcode, second: Opcode) -> bool {
    match (first, second) {
        (Opcode::Dup, Opcode::Pop) => true,
        (load, Opcode::Pop) if load.is_pure_load() => true,
        (Opcode::Neg, Opcode::Neg) | (Opcode::Not, Opcode::Not) => true,
        (Opcode::LdcI40, Opcode::Add | Opcode::Sub | Opcode::Or | Opcode::Xor) => true,
        (Opcode::LdcI41, Opcode::Mul | Opcode::Div) => true,
        _ => false,
    }
}
