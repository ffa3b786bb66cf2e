//! Lowering of conditional-value nodes.
//!
//! Short-circuit operators and `?:` are built as [`NodeKind::CondValue`]
//! nodes. Before the back end runs, each one is folded into a plain boolean
//! operation where its shape allows it, and otherwise replaced by the
//! branch-free select `f ^ ((t ^ f) & (0 - c))`. Both arms are evaluated
//! unconditionally, so unlike C an arm that divides by zero traps even when
//! the condition would have skipped it.

use super::graph::IrGraph;
use super::node::{BinaryOp, NodeId, NodeKind};
use super::optimizer::Optimizer;

/// Replace every used conditional value in `graph`. Returns how many were lowered.
pub fn lower_cond_values<O: Optimizer>(graph: &mut IrGraph, optimizer: &mut O) -> usize {
    // Operands are always created before their users, so id order lowers
    // nested conditional values inside out.
    let pending: Vec<NodeId> = graph
        .node_ids()
        .filter(|node| matches!(graph.kind(*node), NodeKind::CondValue))
        .collect();

    let mut lowered = 0;
    for node in pending {
        let operands = graph.operands(node).to_vec();
        let &[cond, if_true, if_false] = operands.as_slice() else {
            continue;
        };
        if graph.users(node).is_empty() {
            graph.detach(node);
            continue;
        }

        let block = graph.block_of(node);
        let mut lowering = Lowering {
            graph: &mut *graph,
            optimizer: &mut *optimizer,
            block,
        };
        let replacement = lowering.lower(cond, if_true, if_false);
        log::trace!(
            "{}: conditional value {} lowered to {}",
            graph.name(),
            node,
            replacement
        );
        graph.replace_all_uses(node, replacement);
        graph.detach(node);
        lowered += 1;
    }
    lowered
}

struct Lowering<'g, O> {
    graph: &'g mut IrGraph,
    optimizer: &'g mut O,
    block: NodeId,
}

impl<O: Optimizer> Lowering<'_, O> {
    fn lower(&mut self, cond: NodeId, if_true: NodeId, if_false: NodeId) -> NodeId {
        match self.graph.kind(cond) {
            NodeKind::ConstBool(true) => return if_true,
            NodeKind::ConstBool(false) => return if_false,
            _ => {}
        }
        if if_true == if_false {
            return if_true;
        }

        match (self.bool_const(if_true), self.bool_const(if_false)) {
            (Some(true), Some(false)) => cond,
            (Some(false), Some(true)) => {
                let one = self.constant(NodeKind::ConstBool(true));
                self.binary(BinaryOp::BitXor, cond, one)
            }
            (_, Some(false)) => self.binary(BinaryOp::LogicAnd, cond, if_true),
            (Some(true), _) => self.binary(BinaryOp::LogicOr, cond, if_false),
            _ => {
                let zero = self.constant(NodeKind::ConstInt(0));
                let diff = self.binary(BinaryOp::BitXor, if_true, if_false);
                let mask = self.binary(BinaryOp::Sub, zero, cond);
                let picked = self.binary(BinaryOp::BitAnd, diff, mask);
                self.binary(BinaryOp::BitXor, if_false, picked)
            }
        }
    }

    fn bool_const(&self, node: NodeId) -> Option<bool> {
        match self.graph.kind(node) {
            NodeKind::ConstBool(value) => Some(*value),
            _ => None,
        }
    }

    fn constant(&mut self, kind: NodeKind) -> NodeId {
        let start = self.graph.start_block();
        let node = self.graph.add_node(kind, start, Vec::new());
        self.optimizer.transform(self.graph, node)
    }

    fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        let node = self
            .graph
            .add_node(NodeKind::Binary(op), self.block, vec![lhs, rhs]);
        self.optimizer.transform(self.graph, node)
    }
}
