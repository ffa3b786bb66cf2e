// This module hands out virtual registers. Every scheduled node that produces a value gets
// its own register: constants, undefined values, binary operations, comparisons and value
// phis. Division and modulo are referenced through their result projection, so lookups
// look through projections to the producing node. Side-effect phis, blocks and control
// nodes never hold a value and therefore never get a register. Numbering follows the
// schedule's postorder, so operands are numbered before the nodes that consume them.

//! Virtual register numbering.

use std::fmt;

use hashbrown::HashMap;

use super::schedule::Schedule;
use crate::core::{CompileError, CompileResult};
use crate::ir::{IrGraph, NodeId, NodeKind};

/// Function-local value slot before physical assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualRegister(u32);

impl VirtualRegister {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for VirtualRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Node to virtual register mapping of one function.
#[derive(Debug, Default)]
pub struct RegisterAssignment {
    registers: HashMap<NodeId, VirtualRegister>,
}

impl RegisterAssignment {
    pub fn allocate(graph: &IrGraph, schedule: &Schedule) -> Self {
        let mut registers = HashMap::new();
        for &node in schedule.postorder() {
            if Self::needs_register(graph.kind(node)) {
                let next = VirtualRegister::new(registers.len() as u32);
                registers.insert(node, next);
            }
        }
        log::trace!("{}: {} virtual registers", graph.name(), registers.len());
        Self { registers }
    }

    fn needs_register(kind: &NodeKind) -> bool {
        match kind {
            NodeKind::ConstInt(_)
            | NodeKind::ConstBool(_)
            | NodeKind::Undefined
            | NodeKind::Binary(_)
            | NodeKind::Compare(_) => true,
            NodeKind::Phi(_) => kind.is_value_phi(),
            _ => false,
        }
    }

    /// Register holding the value of `node`, looking through projections.
    pub fn register(&self, graph: &IrGraph, node: NodeId) -> CompileResult<VirtualRegister> {
        let producer = graph.skip_proj(node);
        self.registers
            .get(&producer)
            .copied()
            .ok_or_else(|| CompileError::MissingRegister {
                function: graph.name().to_string(),
                node: producer,
            })
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}
