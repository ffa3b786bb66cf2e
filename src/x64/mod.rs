// This module contains the x86-64 target of minic: the register set and value locations,
// the sequentialization of parallel phi copies, and the AT&T assembly printer that turns
// an allocated schedule into text.

//! x86-64 target.

pub mod codegen;
pub mod moves;
pub mod regs;

pub use codegen::{CodeGenerator, EmittedFunction};
pub use moves::sequentialize;
pub use regs::{Location, X86Reg};
