// This module builds the interference graph from solved liveness. Two registers interfere
// when they are live into the same line, when one is defined by a line after which the
// other is still live, or when both are targets of the same parallel phi assignment. A
// binary operation or comparison also makes its target interfere with its right operand,
// since the generated code writes the target before it reads that operand. The graph also
// records move-related pairs (a phi target and its incoming operand) so the coloring can
// try to give both the same location and turn the copy into a no-op.

//! Interference graph over virtual registers.

use std::collections::{BTreeMap, BTreeSet};

use super::liveness::{LineOp, LivenessAnalysis};
use super::virtual_regs::VirtualRegister;

#[derive(Debug, Default, Clone)]
pub struct InterferenceGraph {
    edges: BTreeMap<VirtualRegister, BTreeSet<VirtualRegister>>,
    moves: BTreeMap<VirtualRegister, BTreeSet<VirtualRegister>>,
}

impl InterferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(liveness: &LivenessAnalysis) -> Self {
        let mut graph = Self::new();
        for (index, line) in liveness.lines().iter().enumerate() {
            for &register in line.defs.iter().chain(&line.uses) {
                graph.add_vertex(register);
            }

            let live_in: Vec<VirtualRegister> = line.live_in.iter().copied().collect();
            for (i, &a) in live_in.iter().enumerate() {
                for &b in &live_in[i + 1..] {
                    graph.add_edge(a, b);
                }
            }

            let live_out = liveness.live_out(index);
            for &def in &line.defs {
                for &live in &live_out {
                    graph.add_edge(def, live);
                }
            }

            match line.op {
                LineOp::Binary | LineOp::Compare => {
                    if let (Some(&def), Some(&rhs)) = (line.defs.first(), line.uses.get(1)) {
                        graph.add_edge(def, rhs);
                    }
                }
                LineOp::PhiAssign => {
                    for (i, &a) in line.defs.iter().enumerate() {
                        for &b in &line.defs[i + 1..] {
                            graph.add_edge(a, b);
                        }
                    }
                    for (&def, &source) in line.defs.iter().zip(&line.uses) {
                        graph.add_move(def, source);
                    }
                }
                LineOp::Load | LineOp::Jump | LineOp::CondJump | LineOp::Return => {}
            }
        }
        graph
    }

    pub fn add_vertex(&mut self, register: VirtualRegister) {
        self.edges.entry(register).or_default();
    }

    /// Add an undirected edge. Self loops are ignored.
    pub fn add_edge(&mut self, a: VirtualRegister, b: VirtualRegister) {
        if a == b {
            return;
        }
        self.edges.entry(a).or_default().insert(b);
        self.edges.entry(b).or_default().insert(a);
    }

    /// Record that `a` is copied from or into `b`.
    pub fn add_move(&mut self, a: VirtualRegister, b: VirtualRegister) {
        if a == b {
            return;
        }
        self.moves.entry(a).or_default().insert(b);
        self.moves.entry(b).or_default().insert(a);
    }

    pub fn vertices(&self) -> impl Iterator<Item = VirtualRegister> + '_ {
        self.edges.keys().copied()
    }

    pub fn vertex_count(&self) -> usize {
        self.edges.len()
    }

    pub fn neighbors(
        &self,
        register: VirtualRegister,
    ) -> impl Iterator<Item = VirtualRegister> + '_ {
        self.edges.get(&register).into_iter().flatten().copied()
    }

    pub fn interferes(&self, a: VirtualRegister, b: VirtualRegister) -> bool {
        self.edges.get(&a).is_some_and(|n| n.contains(&b))
    }

    /// Registers connected to `register` by a phi copy.
    pub fn move_partners(
        &self,
        register: VirtualRegister,
    ) -> impl Iterator<Item = VirtualRegister> + '_ {
        self.moves.get(&register).into_iter().flatten().copied()
    }

    pub fn edges(&self) -> impl Iterator<Item = (VirtualRegister, VirtualRegister)> + '_ {
        self.edges
            .iter()
            .flat_map(|(&a, n)| n.iter().filter(move |&&b| a < b).map(move |&b| (a, b)))
    }
}
