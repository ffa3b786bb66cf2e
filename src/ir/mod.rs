// This module contains the SSA intermediate representation of minic and everything that
// produces it. A function is an IrGraph: an arena of nodes where blocks are nodes too,
// operands are explicit edges, and division and modulo are ordered by a side-effect chain.
// GraphConstructor builds the graph incrementally with on-the-fly phi placement and
// trivial-phi elimination, LocalValueNumbering shares structurally equal pure nodes, the
// translation walks the syntax tree and lowers structured control flow, and the lowering
// pass folds conditional values into plain operations. The dump module renders a graph as
// GraphViz text for inspection.

//! SSA intermediate representation.

pub mod constructor;
pub mod dump;
pub mod graph;
pub mod lower;
pub mod node;
pub mod optimizer;
pub mod translation;

pub use constructor::GraphConstructor;
pub use graph::IrGraph;
pub use node::{BinaryOp, CompareOp, Node, NodeId, NodeKind, PhiChannel, ProjKind};
pub use optimizer::{LocalValueNumbering, NoOptimizer, Optimizer};
pub use translation::{translate, TranslatedFunction};
