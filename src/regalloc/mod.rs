// This module contains the register allocation pipeline of minic. A function graph is first
// linearized into a Schedule (blocks in reverse post-order, nodes in dependency order, phi
// copies placed on incoming edges), then every value node receives a virtual register, the
// liveness solver computes live-in sets per instruction line, and the physical allocator
// colors the resulting interference graph onto the x86-64 register set, spilling excess
// colors to stack slots.

//! Scheduling, liveness and register allocation.

pub mod allocator;
pub mod interference;
pub mod liveness;
pub mod schedule;
pub mod virtual_regs;

pub use allocator::{maximum_cardinality_search, Allocation, PhysicalRegisterAllocator};
pub use interference::InterferenceGraph;
pub use liveness::{LineOp, LivenessAnalysis, LivenessLine};
pub use schedule::{Schedule, ScheduleItem, ScheduledBlock};
pub use virtual_regs::{RegisterAssignment, VirtualRegister};
