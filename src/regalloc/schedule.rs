// This module linearizes a function graph into the order shared by liveness analysis and
// code generation. Blocks are laid out in reverse post-order from the start block, following
// the targets of each block's terminator. The nodes to emit are those reachable from the
// terminators of the laid-out blocks; within a block they are ordered so that every node
// follows the same-block nodes it depends on (projections are looked through, so the
// side-effect chain orders divisions) and the terminator comes last. Phis produce no
// instruction of their own: for every control edge into a block with value phis, a
// phi-move item is placed in the predecessor block right before its terminator, which is
// where the incoming operands are consumed.

//! Block-linear schedule of a function graph.

use hashbrown::{HashMap, HashSet};

use crate::core::{CompileError, CompileResult};
use crate::ir::{IrGraph, NodeId};

/// One entry of a scheduled block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleItem {
    /// Instruction produced by a node.
    Node(NodeId),
    /// Copies into the value phis of `target` along its `pred_index`-th incoming edge.
    PhiMoves { target: NodeId, pred_index: usize },
}

#[derive(Debug, Clone)]
pub struct ScheduledBlock {
    pub block: NodeId,
    pub items: Vec<ScheduleItem>,
}

/// Emission order of one function.
#[derive(Debug, Clone)]
pub struct Schedule {
    blocks: Vec<ScheduledBlock>,
    postorder: Vec<NodeId>,
    scheduled: HashSet<NodeId>,
    value_phis: HashMap<NodeId, Vec<NodeId>>,
}

impl Schedule {
    pub fn build(graph: &IrGraph) -> CompileResult<Self> {
        let mut terminators: HashMap<NodeId, NodeId> = HashMap::new();
        for node in graph.node_ids() {
            if graph.kind(node).is_terminator() {
                terminators.entry(graph.block_of(node)).or_insert(node);
            }
        }

        let order = Self::block_order(graph, &terminators);
        let mut roots = Vec::with_capacity(order.len());
        for &block in &order {
            match terminators.get(&block) {
                Some(&terminator) => roots.push(terminator),
                None => {
                    return Err(CompileError::MissingTerminator {
                        function: graph.name().to_string(),
                        block: graph.label(block).to_string(),
                    })
                }
            }
        }

        let laid_out: HashSet<NodeId> = order.iter().copied().collect();
        let postorder: Vec<NodeId> = graph
            .postorder_from(&roots)
            .into_iter()
            .filter(|node| laid_out.contains(&graph.block_of(*node)))
            .collect();
        let scheduled: HashSet<NodeId> = postorder.iter().copied().collect();

        let mut value_phis: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut members: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for node in graph.node_ids().filter(|n| scheduled.contains(n)) {
            let kind = graph.kind(node);
            if kind.is_value_phi() {
                let block = graph.block_of(node);
                let predecessors = graph.operands(block).len();
                if graph.operands(node).len() != predecessors {
                    return Err(CompileError::PhiArity {
                        function: graph.name().to_string(),
                        node,
                        operands: graph.operands(node).len(),
                        predecessors,
                    });
                }
                value_phis.entry(block).or_default().push(node);
            } else if !kind.is_marker() && !kind.is_phi() && !kind.is_terminator() {
                members.entry(graph.block_of(node)).or_default().push(node);
            }
        }

        let mut blocks = Vec::with_capacity(order.len());
        for (&block, &terminator) in order.iter().zip(&roots) {
            let block_members = members.get(&block).map(Vec::as_slice);
            let mut items = Self::order_block(graph, block, block_members);
            items.push(ScheduleItem::Node(terminator));
            blocks.push(ScheduledBlock { block, items });
        }

        let position: HashMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, b)| (*b, i)).collect();
        for &block in &order {
            let Some(&phi) = value_phis.get(&block).and_then(|phis| phis.first()) else {
                continue;
            };
            // Every phi of a block consumes operand i in the same predecessor.
            for pred_index in 0..graph.operands(phi).len() {
                let pred = graph.effective_block(phi, pred_index);
                if let Some(&at) = position.get(&pred) {
                    let items = &mut blocks[at].items;
                    let terminator = items.len() - 1;
                    items.insert(
                        terminator,
                        ScheduleItem::PhiMoves {
                            target: block,
                            pred_index,
                        },
                    );
                }
            }
        }

        log::debug!(
            "{}: scheduled {} blocks, {} nodes",
            graph.name(),
            blocks.len(),
            postorder.len()
        );
        Ok(Self {
            blocks,
            postorder,
            scheduled,
            value_phis,
        })
    }

    /// Reverse post-order over terminator targets, starting at the start block.
    fn block_order(graph: &IrGraph, terminators: &HashMap<NodeId, NodeId>) -> Vec<NodeId> {
        let mut post = Vec::new();
        let mut stack = vec![(graph.start_block(), false)];
        let mut visited = HashSet::new();
        while let Some((block, processed)) = stack.pop() {
            if processed {
                post.push(block);
                continue;
            }
            if !visited.insert(block) {
                continue;
            }
            stack.push((block, true));
            if let Some(&terminator) = terminators.get(&block) {
                // The target pushed first finishes last and is laid out first.
                for succ in graph.control_successors(terminator) {
                    stack.push((succ, false));
                }
            }
        }
        post.reverse();
        post
    }

    /// Dependency order of the non-terminator nodes of one block.
    fn order_block(
        graph: &IrGraph,
        block: NodeId,
        members: Option<&[NodeId]>,
    ) -> Vec<ScheduleItem> {
        let Some(members) = members else {
            return Vec::new();
        };
        let member_set: HashSet<NodeId> = members.iter().copied().collect();
        let mut items = Vec::with_capacity(members.len() + 1);
        let mut visited = HashSet::new();

        for &root in members {
            let mut stack = vec![(root, false)];
            while let Some((node, processed)) = stack.pop() {
                if processed {
                    items.push(ScheduleItem::Node(node));
                    continue;
                }
                if !visited.insert(node) {
                    continue;
                }
                stack.push((node, true));
                for &operand in graph.operands(node).iter().rev() {
                    let operand = graph.skip_proj(operand);
                    if member_set.contains(&operand) && graph.block_of(operand) == block {
                        stack.push((operand, false));
                    }
                }
            }
        }
        items
    }

    pub fn blocks(&self) -> &[ScheduledBlock] {
        &self.blocks
    }

    /// Scheduled nodes, each after its operands.
    pub fn postorder(&self) -> &[NodeId] {
        &self.postorder
    }

    pub fn is_scheduled(&self, node: NodeId) -> bool {
        self.scheduled.contains(&node)
    }

    /// Value phis of `block` in creation order.
    pub fn value_phis(&self, block: NodeId) -> &[NodeId] {
        self.value_phis.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }
}
