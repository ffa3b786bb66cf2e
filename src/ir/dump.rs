//! GraphViz rendering of a function graph.
//!
//! Only nodes reachable from the end block are drawn. Operand edges point
//! from the operand to its user and are labelled with the operand index;
//! dotted edges tie a node to its block.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::{CompileError, CompileResult};

use super::graph::IrGraph;
use super::node::NodeKind;

/// Display adapter producing DOT text.
pub struct DotGraph<'g>(pub &'g IrGraph);

impl fmt::Display for DotGraph<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.0;
        writeln!(f, "digraph \"{}\" {{", graph.name())?;
        writeln!(f, "  node [fontname=\"monospace\"];")?;

        let nodes = graph.reachable_postorder();
        for &node in &nodes {
            let shape = match graph.kind(node) {
                NodeKind::Block { .. } => "box",
                NodeKind::Phi(_) => "diamond",
                kind if kind.is_terminator() => "invhouse",
                _ => "ellipse",
            };
            writeln!(
                f,
                "  {} [label=\"{}: {}\", shape={}];",
                node,
                node,
                graph.kind(node),
                shape
            )?;
        }

        for &node in &nodes {
            for (index, operand) in graph.operands(node).iter().enumerate() {
                writeln!(f, "  {} -> {} [label=\"{}\"];", operand, node, index)?;
            }
            let block = graph.block_of(node);
            if block != node {
                writeln!(f, "  {} -> {} [style=dotted, arrowhead=none];", node, block)?;
            }
        }
        writeln!(f, "}}")
    }
}

/// Render `graph` as DOT text.
pub fn to_dot(graph: &IrGraph) -> String {
    DotGraph(graph).to_string()
}

/// Write `<dir>/<function>.dot` and return its path.
pub fn write_dot(graph: &IrGraph, dir: &Path) -> CompileResult<PathBuf> {
    let path = dir.join(format!("{}.dot", graph.name()));
    fs::create_dir_all(dir)
        .and_then(|_| fs::write(&path, to_dot(graph)))
        .map_err(|source| CompileError::DumpFailed {
            function: graph.name().to_string(),
            source,
        })?;
    Ok(path)
}
