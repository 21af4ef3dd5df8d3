//! Vocabulary shared by the code generator and the front ends: the CIL opcodes, the
//! machine types that select opcode families, and the IL types of AST nodes.
pub mod machine;
pub mod opcode;
pub mod ty;

pub use machine::MachineType;
pub use opcode::Opcode;
pub use ty::{ClassName, Type};

/// The name of the assembly that holds the builtin class library. Imported classes
/// of the `System` namespace are qualified with it in assembly text.
pub const LIBRARY_SCOPE: &str = ".library";
