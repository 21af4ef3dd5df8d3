//! The CIL code generation backend shared by the front ends.
//!
//! Everything goes through a [`CompilationContext`], created by the driver for one
//! compilation unit and passed mutably to every backend call. Its methods are split by
//! concern across the modules of this crate:
//!  - [`emit`]: instruction emission, through the peephole queue of [`peephole`].
//!  - [`label`]: labels, branches and `switch` tables.
//!  - [`slot`]: method bodies, local and argument slots, array and pointer accesses.
//!  - [`binder`]: item to node bindings and the switch to the context of another item.
//!
//! The definite-assignment tracker of [`varusage`] is independent from the context: the
//! front end keeps one table per live control-flow path.
pub mod asm;
pub mod binder;
pub mod context;
pub mod diagnostic;
pub mod emit;
pub mod error;
pub mod image;
pub mod label;
pub mod peephole;
pub mod scope;
pub mod slot;
pub mod varusage;

pub use asm::{Assembly, LabelId};
pub use binder::{leave_item_context, ItemContextGuard, SavedContext};
pub use context::{CompilationContext, Options};
pub use diagnostic::{DiagFn, Reporter};
pub use error::{GenError, Result};
pub use image::{ClassId, FieldId, Image, ItemId, MemberId, MethodId, MethodSig};
pub use label::{Label, LabelStats};
pub use slot::{PendingArrayStore, VarSlot};
pub use varusage::VarUsageTable;

#[cfg(test)]
mod tests;
