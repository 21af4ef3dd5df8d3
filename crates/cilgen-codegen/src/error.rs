//! Errors that stop the code generation of a compilation unit. These are not user
//! diagnostics (those go through the [`Reporter`](crate::diagnostic::Reporter)), but
//! resource limits of the target format that the backend cannot work around.
use thiserror::Error;

/// The maximum number of local variables a method can declare. Local indices are encoded
/// on 16 bits and the last index is reserved by the assembler.
pub const MAX_LOCALS: usize = 0xFFFF;

/// The maximum number of arguments a method can take, including the implicit `this`.
pub const MAX_ARGUMENTS: usize = 0xFFFF;

#[derive(Debug, Error)]
pub enum GenError {
    /// A method declares more local variables than can be addressed.
    #[error("too many local variables in method '{method}' (at most {MAX_LOCALS} are allowed)")]
    TooManyLocals { method: String },

    /// A method takes more arguments than can be addressed.
    #[error("too many arguments for method '{method}' (at most {MAX_ARGUMENTS} are allowed)")]
    TooManyArguments { method: String },

    /// Every label identifier has been handed out.
    #[error("out of label identifiers")]
    LabelsExhausted,

    /// The assembly text could not be written out.
    #[error("cannot write the assembly output: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GenError>;
