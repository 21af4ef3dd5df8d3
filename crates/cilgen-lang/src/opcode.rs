//! The CIL instruction set as the emitter sees it. Opcodes are only ever rendered as
//! text (the assembler takes care of the binary encoding), so an opcode is little more
//! than its mnemonic plus a few classification helpers used by the label resolver and
//! the peephole queue.

/// Declare the opcode enumeration together with its mnemonic table, so the two can
/// never get out of sync.
macro_rules! opcodes {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// A CIL opcode. Mnemonics follow the ECMA-335 spelling.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($variant,)*
        }

        impl Opcode {
            /// Every opcode known to the emitter, in declaration order.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant,)*];

            /// Get the assembly mnemonic of the opcode.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Opcode::$variant => $name,)*
                }
            }
        }
    };
}

opcodes! {
    Nop => "nop",
    Break => "break",
    Ldarg0 => "ldarg.0",
    Ldarg1 => "ldarg.1",
    Ldarg2 => "ldarg.2",
    Ldarg3 => "ldarg.3",
    Ldloc0 => "ldloc.0",
    Ldloc1 => "ldloc.1",
    Ldloc2 => "ldloc.2",
    Ldloc3 => "ldloc.3",
    Stloc0 => "stloc.0",
    Stloc1 => "stloc.1",
    Stloc2 => "stloc.2",
    Stloc3 => "stloc.3",
    LdargS => "ldarg.s",
    LdargaS => "ldarga.s",
    StargS => "starg.s",
    LdlocS => "ldloc.s",
    LdlocaS => "ldloca.s",
    StlocS => "stloc.s",
    Ldnull => "ldnull",
    LdcI4M1 => "ldc.i4.m1",
    LdcI40 => "ldc.i4.0",
    LdcI41 => "ldc.i4.1",
    LdcI42 => "ldc.i4.2",
    LdcI43 => "ldc.i4.3",
    LdcI44 => "ldc.i4.4",
    LdcI45 => "ldc.i4.5",
    LdcI46 => "ldc.i4.6",
    LdcI47 => "ldc.i4.7",
    LdcI48 => "ldc.i4.8",
    LdcI4S => "ldc.i4.s",
    LdcI4 => "ldc.i4",
    LdcI8 => "ldc.i8",
    LdcR4 => "ldc.r4",
    LdcR8 => "ldc.r8",
    Dup => "dup",
    Pop => "pop",
    Jmp => "jmp",
    Call => "call",
    Calli => "calli",
    Ret => "ret",
    BrS => "br.s",
    BrfalseS => "brfalse.s",
    BrtrueS => "brtrue.s",
    BeqS => "beq.s",
    BgeS => "bge.s",
    BgtS => "bgt.s",
    BleS => "ble.s",
    BltS => "blt.s",
    BneUnS => "bne.un.s",
    Br => "br",
    Brfalse => "brfalse",
    Brtrue => "brtrue",
    Beq => "beq",
    Bge => "bge",
    Bgt => "bgt",
    Ble => "ble",
    Blt => "blt",
    BneUn => "bne.un",
    BgeUn => "bge.un",
    BgtUn => "bgt.un",
    BleUn => "ble.un",
    BltUn => "blt.un",
    Switch => "switch",
    LdindI1 => "ldind.i1",
    LdindU1 => "ldind.u1",
    LdindI2 => "ldind.i2",
    LdindU2 => "ldind.u2",
    LdindI4 => "ldind.i4",
    LdindU4 => "ldind.u4",
    LdindI8 => "ldind.i8",
    LdindI => "ldind.i",
    LdindR4 => "ldind.r4",
    LdindR8 => "ldind.r8",
    LdindRef => "ldind.ref",
    StindRef => "stind.ref",
    StindI1 => "stind.i1",
    StindI2 => "stind.i2",
    StindI4 => "stind.i4",
    StindI8 => "stind.i8",
    StindR4 => "stind.r4",
    StindR8 => "stind.r8",
    StindI => "stind.i",
    Add => "add",
    Sub => "sub",
    Mul => "mul",
    Div => "div",
    DivUn => "div.un",
    Rem => "rem",
    RemUn => "rem.un",
    And => "and",
    Or => "or",
    Xor => "xor",
    Shl => "shl",
    Shr => "shr",
    ShrUn => "shr.un",
    Neg => "neg",
    Not => "not",
    ConvI1 => "conv.i1",
    ConvI2 => "conv.i2",
    ConvI4 => "conv.i4",
    ConvI8 => "conv.i8",
    ConvR4 => "conv.r4",
    ConvR8 => "conv.r8",
    ConvU4 => "conv.u4",
    ConvU8 => "conv.u8",
    ConvU2 => "conv.u2",
    ConvU1 => "conv.u1",
    ConvI => "conv.i",
    ConvU => "conv.u",
    ConvRUn => "conv.r.un",
    ConvOvfI1 => "conv.ovf.i1",
    ConvOvfU1 => "conv.ovf.u1",
    ConvOvfI2 => "conv.ovf.i2",
    ConvOvfU2 => "conv.ovf.u2",
    ConvOvfI4 => "conv.ovf.i4",
    ConvOvfU4 => "conv.ovf.u4",
    ConvOvfI8 => "conv.ovf.i8",
    ConvOvfU8 => "conv.ovf.u8",
    ConvOvfI => "conv.ovf.i",
    ConvOvfU => "conv.ovf.u",
    ConvOvfI1Un => "conv.ovf.i1.un",
    ConvOvfU1Un => "conv.ovf.u1.un",
    ConvOvfI2Un => "conv.ovf.i2.un",
    ConvOvfU2Un => "conv.ovf.u2.un",
    ConvOvfI4Un => "conv.ovf.i4.un",
    ConvOvfU4Un => "conv.ovf.u4.un",
    ConvOvfI8Un => "conv.ovf.i8.un",
    ConvOvfU8Un => "conv.ovf.u8.un",
    ConvOvfIUn => "conv.ovf.i.un",
    ConvOvfUUn => "conv.ovf.u.un",
    Callvirt => "callvirt",
    Cpobj => "cpobj",
    Ldobj => "ldobj",
    Ldstr => "ldstr",
    Newobj => "newobj",
    Castclass => "castclass",
    Isinst => "isinst",
    Unbox => "unbox",
    Throw => "throw",
    Ldfld => "ldfld",
    Ldflda => "ldflda",
    Stfld => "stfld",
    Ldsfld => "ldsfld",
    Ldsflda => "ldsflda",
    Stsfld => "stsfld",
    Stobj => "stobj",
    Box => "box",
    Newarr => "newarr",
    Ldlen => "ldlen",
    Ldelema => "ldelema",
    LdelemI1 => "ldelem.i1",
    LdelemU1 => "ldelem.u1",
    LdelemI2 => "ldelem.i2",
    LdelemU2 => "ldelem.u2",
    LdelemI4 => "ldelem.i4",
    LdelemU4 => "ldelem.u4",
    LdelemI8 => "ldelem.i8",
    LdelemI => "ldelem.i",
    LdelemR4 => "ldelem.r4",
    LdelemR8 => "ldelem.r8",
    LdelemRef => "ldelem.ref",
    StelemI => "stelem.i",
    StelemI1 => "stelem.i1",
    StelemI2 => "stelem.i2",
    StelemI4 => "stelem.i4",
    StelemI8 => "stelem.i8",
    StelemR4 => "stelem.r4",
    StelemR8 => "stelem.r8",
    StelemRef => "stelem.ref",
    AddOvf => "add.ovf",
    AddOvfUn => "add.ovf.un",
    MulOvf => "mul.ovf",
    MulOvfUn => "mul.ovf.un",
    SubOvf => "sub.ovf",
    SubOvfUn => "sub.ovf.un",
    Endfinally => "endfinally",
    Leave => "leave",
    LeaveS => "leave.s",
    Ldtoken => "ldtoken",
    Ceq => "ceq",
    Cgt => "cgt",
    CgtUn => "cgt.un",
    Clt => "clt",
    CltUn => "clt.un",
    Ldftn => "ldftn",
    Ldvirtftn => "ldvirtftn",
    Ldarg => "ldarg",
    Ldarga => "ldarga",
    Starg => "starg",
    Ldloc => "ldloc",
    Ldloca => "ldloca",
    Stloc => "stloc",
    Localloc => "localloc",
    Endfilter => "endfilter",
    Volatile => "volatile.",
    Tail => "tail.",
    Initobj => "initobj",
    Cpblk => "cpblk",
    Initblk => "initblk",
    Rethrow => "rethrow",
    Sizeof => "sizeof",
    BranchOrLeave => "br.or.leave",
}

impl Opcode {
    /// Check if the opcode lives in the two-byte (`0xFE`-prefixed) part of the
    /// instruction table.
    #[must_use]
    pub fn is_prefixed(&self) -> bool {
        matches!(
            self,
            Opcode::Ceq
                | Opcode::Cgt
                | Opcode::CgtUn
                | Opcode::Clt
                | Opcode::CltUn
                | Opcode::Ldftn
                | Opcode::Ldvirtftn
                | Opcode::Ldarg
                | Opcode::Ldarga
                | Opcode::Starg
                | Opcode::Ldloc
                | Opcode::Ldloca
                | Opcode::Stloc
                | Opcode::Localloc
                | Opcode::Endfilter
                | Opcode::Volatile
                | Opcode::Tail
                | Opcode::Initobj
                | Opcode::Cpblk
                | Opcode::Initblk
                | Opcode::Rethrow
                | Opcode::Sizeof
        )
    }

    /// Check if the opcode is the pseudo-instruction emitted for jumps whose target may
    /// lie outside an exception-protected region. It never reaches the final listing.
    #[must_use]
    pub fn is_pseudo(&self) -> bool {
        matches!(self, Opcode::BranchOrLeave)
    }

    /// Check if the opcode takes a label as its operand.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        self.is_unconditional_branch() || self.is_conditional_branch()
    }

    /// Check if the opcode always transfers control to its target.
    #[must_use]
    pub fn is_unconditional_branch(&self) -> bool {
        matches!(
            self,
            Opcode::Br | Opcode::BrS | Opcode::Leave | Opcode::LeaveS | Opcode::BranchOrLeave
        )
    }

    /// Check if the opcode only transfers control to its target when its condition holds.
    #[must_use]
    pub fn is_conditional_branch(&self) -> bool {
        matches!(
            self,
            Opcode::BrfalseS
                | Opcode::BrtrueS
                | Opcode::BeqS
                | Opcode::BgeS
                | Opcode::BgtS
                | Opcode::BleS
                | Opcode::BltS
                | Opcode::BneUnS
                | Opcode::Brfalse
                | Opcode::Brtrue
                | Opcode::Beq
                | Opcode::Bge
                | Opcode::Bgt
                | Opcode::Ble
                | Opcode::Blt
                | Opcode::BneUn
                | Opcode::BgeUn
                | Opcode::BgtUn
                | Opcode::BleUn
                | Opcode::BltUn
        )
    }

    /// Check if the opcode pushes a value without any side effect, so that pushing it
    /// and popping it right away is a no-op.
    #[must_use]
    pub fn is_pure_load(&self) -> bool {
        matches!(
            self,
            Opcode::Ldarg0
                | Opcode::Ldarg1
                | Opcode::Ldarg2
                | Opcode::Ldarg3
                | Opcode::LdargS
                | Opcode::Ldarg
                | Opcode::LdargaS
                | Opcode::Ldarga
                | Opcode::Ldloc0
                | Opcode::Ldloc1
                | Opcode::Ldloc2
                | Opcode::Ldloc3
                | Opcode::LdlocS
                | Opcode::Ldloc
                | Opcode::LdlocaS
                | Opcode::Ldloca
                | Opcode::Ldnull
                | Opcode::Ldstr
                | Opcode::LdcR4
                | Opcode::LdcR8
                | Opcode::LdcI8
        ) || self.is_int32_constant()
    }

    /// Check if the opcode is one of the `ldc.i4` forms.
    #[must_use]
    pub fn is_int32_constant(&self) -> bool {
        matches!(
            self,
            Opcode::LdcI4M1
                | Opcode::LdcI40
                | Opcode::LdcI41
                | Opcode::LdcI42
                | Opcode::LdcI43
                | Opcode::LdcI44
                | Opcode::LdcI45
                | Opcode::LdcI46
                | Opcode::LdcI47
                | Opcode::LdcI48
                | Opcode::LdcI4S
                | Opcode::LdcI4
        )
    }

    /// Check if the opcode is a plain (non overflow-checked) conversion.
    #[must_use]
    pub fn is_conversion(&self) -> bool {
        matches!(
            self,
            Opcode::ConvI1
                | Opcode::ConvI2
                | Opcode::ConvI4
                | Opcode::ConvI8
                | Opcode::ConvR4
                | Opcode::ConvR8
                | Opcode::ConvU1
                | Opcode::ConvU2
                | Opcode::ConvU4
                | Opcode::ConvU8
                | Opcode::ConvI
                | Opcode::ConvU
        )
    }

    /// Get the overflow-checked variant of an arithmetic or conversion opcode. Opcodes
    /// without a checked variant are returned unchanged. The `unsigned` flag selects the
    /// `.un` flavour, which treats the operands as unsigned integers.
    #[must_use]
    pub fn overflow_checked(self, unsigned: bool) -> Opcode {
        match (self, unsigned) {
            (Opcode::Add, false) => Opcode::AddOvf,
            (Opcode::Add, true) => Opcode::AddOvfUn,
            (Opcode::Sub, false) => Opcode::SubOvf,
            (Opcode::Sub, true) => Opcode::SubOvfUn,
            (Opcode::Mul, false) => Opcode::MulOvf,
            (Opcode::Mul, true) => Opcode::MulOvfUn,
            (Opcode::ConvI1, false) => Opcode::ConvOvfI1,
            (Opcode::ConvI1, true) => Opcode::ConvOvfI1Un,
            (Opcode::ConvU1, false) => Opcode::ConvOvfU1,
            (Opcode::ConvU1, true) => Opcode::ConvOvfU1Un,
            (Opcode::ConvI2, false) => Opcode::ConvOvfI2,
            (Opcode::ConvI2, true) => Opcode::ConvOvfI2Un,
            (Opcode::ConvU2, false) => Opcode::ConvOvfU2,
            (Opcode::ConvU2, true) => Opcode::ConvOvfU2Un,
            (Opcode::ConvI4, false) => Opcode::ConvOvfI4,
            (Opcode::ConvI4, true) => Opcode::ConvOvfI4Un,
            (Opcode::ConvU4, false) => Opcode::ConvOvfU4,
            (Opcode::ConvU4, true) => Opcode::ConvOvfU4Un,
            (Opcode::ConvI8, false) => Opcode::ConvOvfI8,
            (Opcode::ConvI8, true) => Opcode::ConvOvfI8Un,
            (Opcode::ConvU8, false) => Opcode::ConvOvfU8,
            (Opcode::ConvU8, true) => Opcode::ConvOvfU8Un,
            (Opcode::ConvI, false) => Opcode::ConvOvfI,
            (Opcode::ConvI, true) => Opcode::ConvOvfIUn,
            (Opcode::ConvU, false) => Opcode::ConvOvfU,
            (Opcode::ConvU, true) => Opcode::ConvOvfUUn,
            (other, _) => other,
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn mnemonics_are_unique() {
        let names = Opcode::ALL.iter().map(Opcode::as_str).collect::<HashSet<_>>();
        assert_eq!(names.len(), Opcode::ALL.len());
    }

    #[test]
    fn branch_classification() {
        assert!(Opcode::Br.is_unconditional_branch());
        assert!(Opcode::LeaveS.is_branch());
        assert!(Opcode::Brtrue.is_conditional_branch());
        assert!(!Opcode::Brtrue.is_unconditional_branch());
        assert!(!Opcode::Add.is_branch());
    }

    #[test]
    fn checked_arithmetic() {
        assert_eq!(Opcode::Add.overflow_checked(false), Opcode::AddOvf);
        assert_eq!(Opcode::Mul.overflow_checked(true), Opcode::MulOvfUn);
        assert_eq!(Opcode::ConvU1.overflow_checked(false), Opcode::ConvOvfU1);
        assert_eq!(Opcode::Div.overflow_checked(false), Opcode::Div);
    }
}
