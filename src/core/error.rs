// This module defines the error type for the minic back end using the thiserror crate.
// Every error here is an internal invariant violation: the syntax tree handed to the
// core has already been checked by the front end, so a failure means an earlier pass
// left the graph in a state a later pass cannot consume. Variants carry the function
// name and the node or register involved so that the defect can be located from the
// message alone. CompileResult<T> is the alias every pass returns.

//! Error types for the minic back end.
//!
//! Using thiserror for more idiomatic error handling.

use thiserror::Error;

use crate::ir::NodeId;
use crate::regalloc::VirtualRegister;

/// Main error type for function compilation.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("{function}: node {node} of kind {kind} must not reach {stage}")]
    UnexpectedNode {
        function: String,
        node: NodeId,
        kind: String,
        stage: &'static str,
    },

    #[error("{function}: phi {node} has {operands} operands but its block has {predecessors} predecessors")]
    PhiArity {
        function: String,
        node: NodeId,
        operands: usize,
        predecessors: usize,
    },

    #[error("{function}: no virtual register assigned to node {node}")]
    MissingRegister {
        function: String,
        node: NodeId,
    },

    #[error("{function}: no location allocated for register {register}")]
    MissingLocation {
        function: String,
        register: VirtualRegister,
    },

    #[error("{function}: block {block} has no terminator")]
    MissingTerminator {
        function: String,
        block: String,
    },

    #[error("failed to write graph dump for {function}")]
    DumpFailed {
        function: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to format assembly")]
    Format(#[from] std::fmt::Error),
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
