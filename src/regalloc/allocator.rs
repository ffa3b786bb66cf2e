// This module maps virtual registers to physical locations by coloring the interference
// graph. The visiting order comes from a maximum cardinality search: repeatedly take the
// remaining register with the most already-taken neighbors (lowest register id on ties)
// and bump the weight of its remaining neighbors. Registers are then colored in reverse
// removal order with the lowest color no colored neighbor uses, except that a free color
// already held by a move-related register is taken first. Colors below the number of
// allocatable registers select a register in priority order; every further color becomes
// a 4-byte spill slot addressed from the stack pointer.

//! Graph-coloring physical register allocation.

use std::collections::{BTreeMap, BTreeSet};

use super::interference::InterferenceGraph;
use super::liveness::LivenessAnalysis;
use super::virtual_regs::VirtualRegister;
use crate::x64::{Location, X86Reg};

/// Bytes reserved per spill slot.
pub const SPILL_SLOT_SIZE: i32 = 4;

/// Physical locations of one function's virtual registers.
#[derive(Debug, Clone, Default)]
pub struct Allocation {
    locations: BTreeMap<VirtualRegister, Location>,
    colors: BTreeMap<VirtualRegister, usize>,
    spill_slots: usize,
}

impl Allocation {
    pub fn location(&self, register: VirtualRegister) -> Option<Location> {
        self.locations.get(&register).copied()
    }

    pub fn color(&self, register: VirtualRegister) -> Option<usize> {
        self.colors.get(&register).copied()
    }

    pub fn locations(&self) -> impl Iterator<Item = (VirtualRegister, Location)> + '_ {
        self.locations.iter().map(|(r, l)| (*r, *l))
    }

    pub fn spill_slots(&self) -> usize {
        self.spill_slots
    }

    /// Bytes the prologue reserves below the frame pointer.
    pub fn frame_size(&self) -> i32 {
        self.spill_slots as i32 * SPILL_SLOT_SIZE
    }
}

/// Colors the interference graph onto a fixed register set.
#[derive(Debug, Clone)]
pub struct PhysicalRegisterAllocator {
    registers: Vec<X86Reg>,
}

impl Default for PhysicalRegisterAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicalRegisterAllocator {
    pub fn new() -> Self {
        Self::with_registers(X86Reg::ALLOCATABLE.to_vec())
    }

    /// Allocate onto a subset of the allocatable registers, in the given priority.
    pub fn with_registers(registers: Vec<X86Reg>) -> Self {
        Self { registers }
    }

    pub fn registers(&self) -> &[X86Reg] {
        &self.registers
    }

    pub fn allocate(&self, liveness: &LivenessAnalysis) -> Allocation {
        let graph = InterferenceGraph::build(liveness);
        self.allocate_graph(&graph)
    }

    pub fn allocate_graph(&self, graph: &InterferenceGraph) -> Allocation {
        let order = maximum_cardinality_search(graph);

        let mut colors: BTreeMap<VirtualRegister, usize> = BTreeMap::new();
        for &register in order.iter().rev() {
            let taken: BTreeSet<usize> = graph
                .neighbors(register)
                .filter_map(|n| colors.get(&n).copied())
                .collect();
            let preferred = graph
                .move_partners(register)
                .filter_map(|p| colors.get(&p).copied())
                .find(|color| !taken.contains(color));
            let color = match preferred {
                Some(color) => color,
                None => (0..).find(|c| !taken.contains(c)).unwrap_or(taken.len()),
            };
            colors.insert(register, color);
        }

        let mut locations = BTreeMap::new();
        let mut spill_slots = 0;
        for (&register, &color) in &colors {
            let location = match self.registers.get(color) {
                Some(&reg) => Location::Register(reg),
                None => {
                    let slot = color - self.registers.len();
                    spill_slots = spill_slots.max(slot + 1);
                    Location::Stack(slot as i32 * SPILL_SLOT_SIZE)
                }
            };
            locations.insert(register, location);
        }

        log::debug!(
            "colored {} registers with {} colors, {} spill slots",
            colors.len(),
            colors.values().max().map_or(0, |c| c + 1),
            spill_slots
        );
        Allocation {
            locations,
            colors,
            spill_slots,
        }
    }
}

/// Removal order of a maximum cardinality search.
pub fn maximum_cardinality_search(graph: &InterferenceGraph) -> Vec<VirtualRegister> {
    let mut weights: BTreeMap<VirtualRegister, usize> =
        graph.vertices().map(|v| (v, 0)).collect();
    let mut order = Vec::with_capacity(weights.len());

    while !weights.is_empty() {
        let mut best: Option<(VirtualRegister, usize)> = None;
        for (&register, &weight) in &weights {
            if best.map_or(true, |(_, w)| weight > w) {
                best = Some((register, weight));
            }
        }
        let Some((register, _)) = best else {
            break;
        };
        weights.remove(&register);
        for neighbor in graph.neighbors(register) {
            if let Some(weight) = weights.get_mut(&neighbor) {
                *weight += 1;
            }
        }
        order.push(register);
    }
    order
}
