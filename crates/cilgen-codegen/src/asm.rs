//! The assembly listing produced by the backend. Instructions are kept structured until
//! the very end so that the label resolver can still rewrite the `branch-or-leave`
//! pseudo-instructions of a method once its labels are all placed, and so that tests can
//! inspect the listing without parsing text back.
use lang::Opcode;
use std::collections::{HashMap, HashSet};

/// The identifier of a label. Identifiers start at 1 and render as `?L<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub(crate) u32);

impl LabelId {
    /// Get the numeric value of the identifier.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for LabelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "?L{}", self.0)
    }
}

/// The operand of an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,

    /// A signed integer, rendered in decimal.
    Int(i64),

    /// An unsigned integer, rendered in decimal.
    UInt(u64),

    /// A 64-bit constant, rendered as `0x` followed by 16 hexadecimal digits.
    Hex64(u64),

    /// A single precision constant, rendered by its bit pattern.
    Float32(f32),

    /// A double precision constant, rendered by its bit pattern.
    Float64(f64),

    /// A string literal, escaped when rendered.
    Str(String),

    /// A branch target.
    Target(LabelId),

    /// The targets of a `switch`.
    Switch(Vec<LabelId>),

    /// A metadata token already rendered as text: a type, a field or a method reference.
    Token(String),
}

/// An instruction of the listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Insn {
    pub opcode: Opcode,
    pub operand: Operand,
}

impl Insn {
    /// Create an instruction without operand.
    #[must_use]
    pub fn simple(opcode: Opcode) -> Self {
        Self {
            opcode,
            operand: Operand::None,
        }
    }

    /// Create an instruction with an operand.
    #[must_use]
    pub fn new(opcode: Opcode, operand: Operand) -> Self {
        Self { opcode, operand }
    }
}

/// A line of the listing.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    /// An instruction.
    Insn(Insn),

    /// A placed label. The flag records whether it was placed as a leave label, that is
    /// outside the exception-protected regions of the jumps targeting it.
    Label { id: LabelId, leave: bool },

    /// Any other assembler directive, rendered verbatim.
    Directive(String),
}

/// The listing of a whole compilation unit. It is append-only: the only rewrite ever
/// applied to emitted lines is the resolution of `branch-or-leave` pseudo-instructions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    lines: Vec<Line>,
}

impl Assembly {
    /// Create an empty listing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line to the listing.
    pub fn push(&mut self, line: Line) {
        self.lines.push(line);
    }

    /// Get the lines of the listing.
    #[must_use]
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Get the number of lines of the listing.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if the listing is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Iterate over the instructions of the listing, skipping labels and directives.
    pub fn insns(&self) -> impl Iterator<Item = &Insn> {
        self.lines.iter().filter_map(|line| match line {
            Line::Insn(insn) => Some(insn),
            _ => None,
        })
    }

    /// Map every placed label to the index of the line it was placed at.
    #[must_use]
    pub fn label_positions(&self) -> HashMap<LabelId, usize> {
        self.lines
            .iter()
            .enumerate()
            .filter_map(|(idx, line)| match line {
                Line::Label { id, .. } => Some((*id, idx)),
                _ => None,
            })
            .collect()
    }

    /// List every branch of the listing as the index of the branching line along with
    /// the label it targets. A `switch` contributes one entry per target.
    #[must_use]
    pub fn branch_targets(&self) -> Vec<(usize, LabelId)> {
        let mut targets = Vec::new();
        for (idx, line) in self.lines.iter().enumerate() {
            if let Line::Insn(insn) = line {
                match &insn.operand {
                    Operand::Target(label) => targets.push((idx, *label)),
                    Operand::Switch(labels) => {
                        targets.extend(labels.iter().map(|label| (idx, *label)));
                    }
                    _ => {}
                }
            }
        }
        targets
    }

    /// Turn every `branch-or-leave` pseudo-instruction emitted since the line `from` into
    /// a `leave` when its target belongs to `leave_targets`, and into a `br` otherwise.
    /// Returns the number of rewritten instructions.
    pub fn resolve_branch_or_leave(
        &mut self,
        from: usize,
        leave_targets: &HashSet<LabelId>,
    ) -> usize {
        let mut resolved = 0;
        for line in self.lines.iter_mut().skip(from) {
            if let Line::Insn(insn) = line {
                if let (Opcode::BranchOrLeave, Operand::Target(label)) =
                    (insn.opcode, &insn.operand)
                {
                    insn.opcode = if leave_targets.contains(label) {
                        Opcode::Leave
                    } else {
                        Opcode::Br
                    };
                    resolved += 1;
                }
            }
        }
        resolved
    }

    /// Write the listing as assembly text.
    ///
    /// # Errors
    /// Returns an error if the writer fails.
    pub fn write_to(&self, writer: &mut dyn std::io::Write) -> crate::Result<()> {
        write!(writer, "{self}")?;
        Ok(())
    }
}

impl std::fmt::Display for Assembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for line in &self.lines {
            write!(f, "{line}")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Line::Insn(insn) => write!(f, "{insn}"),
            Line::Label { id, .. } => writeln!(f, "{id}:"),
            Line::Directive(text) => writeln!(f, "{text}"),
        }
    }
}

impl std::fmt::Display for Insn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = self.opcode;
        match &self.operand {
            Operand::None => writeln!(f, "\t{op}"),
            Operand::Int(value) => writeln!(f, "\t{op}\t{value}"),
            Operand::UInt(value) => writeln!(f, "\t{op}\t{value}"),
            Operand::Hex64(value) => writeln!(f, "\t{op}\t0x{value:016x}"),
            Operand::Float32(value) => writeln!(f, "\t{op}\tfloat32(0x{:08X})", value.to_bits()),
            Operand::Float64(value) => {
                writeln!(f, "\t{op}\tfloat64(0x{:016X})", value.to_bits())
            }
            Operand::Str(text) => {
                write!(f, "\t{op}\t\"")?;
                write_escaped(f, text)?;
                writeln!(f, "\"")
            }
            Operand::Target(label) => writeln!(f, "\t{op}\t{label}"),
            Operand::Switch(labels) => {
                writeln!(f, "\t{op} (")?;
                for (idx, label) in labels.iter().enumerate() {
                    let comma = if idx + 1 < labels.len() { "," } else { "" };
                    writeln!(f, "\t\t{label}{comma}")?;
                }
                writeln!(f, "\t)")
            }
            Operand::Token(token) => writeln!(f, "\t{op}\t{token}"),
        }
    }
}

/// Escape a string literal: quotes and backslashes get a backslash, printable ASCII is
/// kept as is and every other byte becomes a three-digit octal escape.
fn write_escaped(f: &mut std::fmt::Formatter<'_>, text: &str) -> std::fmt::Result {
    for byte in text.bytes() {
        match byte {
            b'"' | b'\\' => write!(f, "\\{}", byte as char)?,
            b' '..=b'~' => write!(f, "{}", byte as char)?,
            _ => write!(f, "\\{byte:03o}")?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(insn: Insn) -> String {
        Line::Insn(insn).to_string()
    }

    #[test]
    fn render_operands() {
        assert_eq!(render(Insn::simple(Opcode::Ret)), "\tret\n");
        assert_eq!(render(Insn::new(Opcode::LdcI4S, Operand::Int(-5))), "\tldc.i4.s\t-5\n");
        assert_eq!(
            render(Insn::new(Opcode::LdcI8, Operand::Hex64(0x1_0000_0002))),
            "\tldc.i8\t0x0000000100000002\n"
        );
        assert_eq!(
            render(Insn::new(Opcode::LdcR4, Operand::Float32(1.0))),
            "\tldc.r4\tfloat32(0x3F800000)\n"
        );
        assert_eq!(
            render(Insn::new(Opcode::LdcR8, Operand::Float64(0.1))),
            "\tldc.r8\tfloat64(0x3FB999999999999A)\n"
        );
    }

    #[test]
    fn render_escaped_strings() {
        assert_eq!(
            render(Insn::new(Opcode::Ldstr, Operand::Str("say \"hi\"\\\n".into()))),
            "\tldstr\t\"say \\\"hi\\\"\\\\\\012\"\n"
        );
        assert_eq!(
            render(Insn::new(Opcode::Ldstr, Operand::Str("é".into()))),
            "\tldstr\t\"\\303\\251\"\n"
        );
    }

    #[test]
    fn render_switch_table() {
        let insn = Insn::new(Opcode::Switch, Operand::Switch(vec![LabelId(1), LabelId(2)]));
        assert_eq!(render(insn), "\tswitch (\n\t\t?L1,\n\t\t?L2\n\t)\n");
    }

    #[test]
    fn resolve_pseudo_branches() {
        let mut asm = Assembly::new();
        asm.push(Line::Insn(Insn::new(Opcode::BranchOrLeave, Operand::Target(LabelId(1)))));
        asm.push(Line::Insn(Insn::new(Opcode::BranchOrLeave, Operand::Target(LabelId(2)))));
        asm.push(Line::Label { id: LabelId(1), leave: true });
        asm.push(Line::Label { id: LabelId(2), leave: false });

        let leave = HashSet::from([LabelId(1)]);
        assert_eq!(asm.resolve_branch_or_leave(0, &leave), 2);
        assert_eq!(asm.to_string(), "\tleave\t?L1\n\tbr\t?L2\n?L1:\n?L2:\n");
        assert_eq!(asm.label_positions()[&LabelId(2)], 3);
        assert_eq!(asm.branch_targets(), vec![(0, LabelId(1)), (1, LabelId(2))]);
    }
}
