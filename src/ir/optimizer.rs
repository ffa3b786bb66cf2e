//! Local value numbering.
//!
//! Nodes are offered to an [`Optimizer`] right after construction. The
//! value-numbering optimizer answers with an earlier node of the same shape
//! in the same block when one exists, so pure computations are never built
//! twice. Constants live in the start block, which makes them shared by the
//! whole function.

use hashbrown::HashMap;

use super::graph::IrGraph;
use super::node::{BinaryOp, CompareOp, NodeId, NodeKind};

/// Hook applied to every freshly built node.
pub trait Optimizer {
    /// Return `node` or an equivalent node that already exists.
    fn transform(&mut self, graph: &mut IrGraph, node: NodeId) -> NodeId;
}

/// Optimizer that keeps every node as built.
#[derive(Debug, Default)]
pub struct NoOptimizer;

impl Optimizer for NoOptimizer {
    fn transform(&mut self, _graph: &mut IrGraph, node: NodeId) -> NodeId {
        node
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Shape {
    ConstInt(i32),
    ConstBool(bool),
    Undefined,
    Binary(BinaryOp),
    Compare(CompareOp),
    CondValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ValueKey {
    shape: Shape,
    block: NodeId,
    operands: Vec<NodeId>,
}

/// Structural deduplication of pure nodes within a block.
#[derive(Debug, Default)]
pub struct LocalValueNumbering {
    known: HashMap<ValueKey, NodeId>,
    hits: usize,
}

impl LocalValueNumbering {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes that were answered with an existing node.
    pub fn hits(&self) -> usize {
        self.hits
    }

    fn key(graph: &IrGraph, node: NodeId) -> Option<ValueKey> {
        let (shape, commutative) = match graph.kind(node) {
            NodeKind::ConstInt(value) => (Shape::ConstInt(*value), false),
            NodeKind::ConstBool(value) => (Shape::ConstBool(*value), false),
            NodeKind::Undefined => (Shape::Undefined, false),
            NodeKind::Binary(op) if !op.has_side_effect() => {
                (Shape::Binary(*op), op.is_commutative())
            }
            NodeKind::Compare(op) => (Shape::Compare(*op), op.is_commutative()),
            NodeKind::CondValue => (Shape::CondValue, false),
            NodeKind::Binary(_)
            | NodeKind::Start
            | NodeKind::Block { .. }
            | NodeKind::Phi(_)
            | NodeKind::Proj(_)
            | NodeKind::Jump { .. }
            | NodeKind::CondJump { .. }
            | NodeKind::Return => return None,
        };

        let mut operands = graph.operands(node).to_vec();
        if commutative {
            operands.sort();
        }
        Some(ValueKey {
            shape,
            block: graph.block_of(node),
            operands,
        })
    }
}

impl Optimizer for LocalValueNumbering {
    fn transform(&mut self, graph: &mut IrGraph, node: NodeId) -> NodeId {
        let Some(key) = Self::key(graph, node) else {
            return node;
        };
        match self.known.get(&key) {
            Some(&existing) => {
                graph.detach(node);
                self.hits += 1;
                log::trace!("value numbering: {} reuses {}", node, existing);
                existing
            }
            None => {
                self.known.insert(key, node);
                node
            }
        }
    }
}
