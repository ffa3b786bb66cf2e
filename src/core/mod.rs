// This module serves as the hub for the shared infrastructure of minic that every pass
// builds on. It exports and organizes the session (the bumpalo arena backing per-function
// scratch, string interning and compilation statistics), the error type every pass
// returns, and the compiler configuration read from the environment.

//! Core minic infrastructure.
//!
//! # Key Components
//!
//! ## Session Management (`session`)
//! - Arena-based memory allocation using `bumpalo`
//! - Compilation statistics per pass
//!
//! ## Errors (`error`)
//! - `CompileError` for internal invariant violations, built on `thiserror`
//!
//! ## Configuration (`config`)
//! - Graph dump directory from the `DUMP_GRAPHS` environment variable

pub mod config;
pub mod error;
pub mod session;

pub use config::{CompilerConfig, DUMP_GRAPHS_VAR};
pub use error::{CompileError, CompileResult};
pub use session::{CompilationSession, SessionStats};
