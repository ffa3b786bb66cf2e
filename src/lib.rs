//! minic - SSA middle end and x86-64 back end for a small C-like language.
//!
//! The crate takes a type-checked syntax tree, builds an SSA graph with
//! on-the-fly phi placement and local value numbering, computes liveness as
//! a fixpoint, colors the interference graph in maximum cardinality search
//! order and prints x86-64 AT&T assembly.
//!
//! # Primary Usage
//!
//! ```
//! use bumpalo::Bump;
//! use minic::ast::{Expr, Program, Stmt};
//! use minic::core::{CompilationSession, CompilerConfig};
//! use minic::Compiler;
//!
//! let arena = Bump::new();
//! let session = CompilationSession::new(&arena);
//! let program = Program::main(vec![Stmt::ret(Expr::int(0))]);
//! let text = Compiler::new(&session, CompilerConfig::default())
//!     .compile_program(&program)
//!     .unwrap();
//! assert!(text.contains("_main:"));
//! ```
//!
//! # Architecture
//!
//! - [`ast`] - Syntax tree handed over by the front end
//! - [`ir`] - SSA graph, construction and local optimization
//! - [`regalloc`] - Schedule, liveness and register allocation
//! - [`x64`] - x86-64 registers and assembly emission
//! - [`core`] - Session, errors and configuration

pub mod ast;
pub mod compiler;
pub mod core;
pub mod ir;
pub mod regalloc;
pub mod x64;

pub use compiler::{compile, Compiler};
pub use crate::core::{CompilationSession, CompileError, CompileResult, CompilerConfig};
