// This module computes liveness over the instruction lines of a scheduled function. Every
// schedule item becomes one line recording the virtual registers it defines and uses and
// the lines control can reach next: the following line for ordinary instructions, the
// first line of the target blocks for jumps, nothing for returns. A phi-move item becomes a
// single parallel-assignment line that defines every value phi of the target block from
// the operands of the matching predecessor edge. The solver propagates facts of the form
// "register v is live into line l" backwards from each use until they reach the
// definition: each new fact is queued for the predecessors that do not define v. The fact
// queue and the predecessor table are scratch data allocated in the session arena.

//! Fixpoint liveness over instruction lines.

use std::collections::BTreeSet;

use bumpalo::{collections::Vec as BumpVec, Bump};
use hashbrown::{HashMap, HashSet};

use super::schedule::{Schedule, ScheduleItem};
use super::virtual_regs::{RegisterAssignment, VirtualRegister};
use crate::core::{CompileError, CompileResult};
use crate::ir::{IrGraph, NodeId, NodeKind};

/// Instruction category of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOp {
    Load,
    Binary,
    Compare,
    Jump,
    CondJump,
    Return,
    PhiAssign,
}

#[derive(Debug, Clone)]
pub struct LivenessLine {
    pub item: ScheduleItem,
    pub op: LineOp,
    pub defs: Vec<VirtualRegister>,
    pub uses: Vec<VirtualRegister>,
    pub succs: Vec<usize>,
    pub live_in: BTreeSet<VirtualRegister>,
}

impl LivenessLine {
    pub fn defines(&self, register: VirtualRegister) -> bool {
        self.defs.contains(&register)
    }
}

/// Solved liveness of one function.
#[derive(Debug)]
pub struct LivenessAnalysis {
    lines: Vec<LivenessLine>,
}

impl LivenessAnalysis {
    pub fn analyze(
        arena: &Bump,
        graph: &IrGraph,
        schedule: &Schedule,
        regs: &RegisterAssignment,
    ) -> CompileResult<Self> {
        let mut lines = Self::build_lines(graph, schedule, regs)?;
        let facts = Self::solve(arena, &mut lines);
        log::debug!(
            "{}: liveness over {} lines settled after {} facts",
            graph.name(),
            lines.len(),
            facts
        );
        Ok(Self { lines })
    }

    fn build_lines(
        graph: &IrGraph,
        schedule: &Schedule,
        regs: &RegisterAssignment,
    ) -> CompileResult<Vec<LivenessLine>> {
        let mut first_line = HashMap::new();
        let mut count = 0;
        for block in schedule.blocks() {
            first_line.insert(block.block, count);
            count += block.items.len();
        }
        let target_line = |target: NodeId| {
            first_line
                .get(&target)
                .copied()
                .ok_or_else(|| CompileError::MissingTerminator {
                    function: graph.name().to_string(),
                    block: graph.label(target).to_string(),
                })
        };

        let mut lines = Vec::with_capacity(count);
        for block in schedule.blocks() {
            for &item in &block.items {
                let next = lines.len() + 1;
                let line = match item {
                    ScheduleItem::PhiMoves { target, pred_index } => {
                        let mut defs = Vec::new();
                        let mut uses = Vec::new();
                        for &phi in schedule.value_phis(target) {
                            defs.push(regs.register(graph, phi)?);
                            uses.push(regs.register(graph, graph.operand(phi, pred_index))?);
                        }
                        Self::line(item, LineOp::PhiAssign, defs, uses, vec![next])
                    }
                    ScheduleItem::Node(node) => match graph.kind(node) {
                        NodeKind::ConstInt(_) | NodeKind::ConstBool(_) | NodeKind::Undefined => {
                            let def = regs.register(graph, node)?;
                            Self::line(item, LineOp::Load, vec![def], Vec::new(), vec![next])
                        }
                        kind @ (NodeKind::Binary(_) | NodeKind::Compare(_)) => {
                            let op = match kind {
                                NodeKind::Compare(_) => LineOp::Compare,
                                _ => LineOp::Binary,
                            };
                            let def = regs.register(graph, node)?;
                            let lhs = regs.register(graph, graph.operand(node, 0))?;
                            let rhs = regs.register(graph, graph.operand(node, 1))?;
                            Self::line(item, op, vec![def], vec![lhs, rhs], vec![next])
                        }
                        NodeKind::Jump { target } => {
                            let succ = target_line(*target)?;
                            Self::line(item, LineOp::Jump, Vec::new(), Vec::new(), vec![succ])
                        }
                        NodeKind::CondJump { if_true, if_false } => {
                            let cond = regs.register(graph, graph.operand(node, 0))?;
                            let succs = vec![target_line(*if_true)?, target_line(*if_false)?];
                            Self::line(item, LineOp::CondJump, Vec::new(), vec![cond], succs)
                        }
                        NodeKind::Return => {
                            let result = regs.register(graph, graph.operand(node, 1))?;
                            Self::line(item, LineOp::Return, Vec::new(), vec![result], Vec::new())
                        }
                        other => {
                            return Err(CompileError::UnexpectedNode {
                                function: graph.name().to_string(),
                                node,
                                kind: other.to_string(),
                                stage: "liveness",
                            })
                        }
                    },
                };
                lines.push(line);
            }
        }
        Ok(lines)
    }

    fn line(
        item: ScheduleItem,
        op: LineOp,
        defs: Vec<VirtualRegister>,
        uses: Vec<VirtualRegister>,
        succs: Vec<usize>,
    ) -> LivenessLine {
        LivenessLine {
            item,
            op,
            defs,
            uses,
            succs,
            live_in: BTreeSet::new(),
        }
    }

    /// Propagate live-in facts to a fixpoint. Returns the number of facts.
    fn solve(arena: &Bump, lines: &mut [LivenessLine]) -> usize {
        let mut preds: BumpVec<BumpVec<usize>> = BumpVec::new_in(arena);
        for _ in 0..lines.len() {
            preds.push(BumpVec::new_in(arena));
        }
        for (index, line) in lines.iter().enumerate() {
            for &succ in &line.succs {
                if succ < preds.len() {
                    preds[succ].push(index);
                }
            }
        }

        let mut queued: HashSet<(usize, VirtualRegister), _, _> = HashSet::new_in(arena);
        let mut worklist = BumpVec::new_in(arena);
        for (index, line) in lines.iter().enumerate() {
            for &register in &line.uses {
                if queued.insert((index, register)) {
                    worklist.push((index, register));
                }
            }
        }

        while let Some((index, register)) = worklist.pop() {
            lines[index].live_in.insert(register);
            for &pred in &preds[index] {
                if !lines[pred].defines(register) && queued.insert((pred, register)) {
                    worklist.push((pred, register));
                }
            }
        }
        queued.len()
    }

    pub fn lines(&self) -> &[LivenessLine] {
        &self.lines
    }

    /// Registers live after line `index`: the union of its successors' live-in sets.
    pub fn live_out(&self, index: usize) -> BTreeSet<VirtualRegister> {
        let mut out = BTreeSet::new();
        for &succ in &self.lines[index].succs {
            if let Some(line) = self.lines.get(succ) {
                out.extend(line.live_in.iter().copied());
            }
        }
        out
    }
}
