// This module implements GraphConstructor, the incremental SSA builder. It follows the
// read/write-variable protocol: every block keeps the last definition of each variable,
// a read that misses walks to the predecessors, and a read in a block whose predecessors
// are not all known yet (an unsealed block) places a placeholder phi that is completed
// when the block is sealed. Completed phis that merge at most one distinct value are
// removed on the spot and their phi users are re-checked recursively. The side-effect
// chain is threaded through a second channel with the same machinery so that division and
// modulo stay ordered across branches and loops. Placeholder phis and the forwarding of
// retired phis never leave this module: readers only ever observe resolved values.

//! Incremental SSA graph construction.

use hashbrown::{HashMap, HashSet};

use super::graph::IrGraph;
use super::node::{BinaryOp, CompareOp, NodeId, NodeKind, PhiChannel, ProjKind};
use super::optimizer::Optimizer;

/// Builds one function graph in SSA form while the syntax tree is walked.
pub struct GraphConstructor<O: Optimizer> {
    graph: IrGraph,
    optimizer: O,
    current_block: NodeId,
    /// variable -> block -> last definition in that block
    current_def: HashMap<String, HashMap<NodeId, NodeId>>,
    incomplete_phis: HashMap<NodeId, Vec<(String, NodeId)>>,
    current_side_effect: HashMap<NodeId, NodeId>,
    incomplete_side_effect_phis: HashMap<NodeId, NodeId>,
    sealed: HashSet<NodeId>,
    /// Retired phi -> the value that replaced it.
    forwarded: HashMap<NodeId, NodeId>,
}

impl<O: Optimizer> GraphConstructor<O> {
    pub fn new(name: &str, optimizer: O) -> Self {
        let graph = IrGraph::new(name);
        let start_block = graph.start_block();
        let mut constructor = Self {
            graph,
            optimizer,
            current_block: start_block,
            current_def: HashMap::new(),
            incomplete_phis: HashMap::new(),
            current_side_effect: HashMap::new(),
            incomplete_side_effect_phis: HashMap::new(),
            sealed: HashSet::new(),
            forwarded: HashMap::new(),
        };
        constructor.seal_block(start_block);
        let start = constructor.graph.start();
        let effect = constructor.graph.project(start, ProjKind::SideEffect);
        constructor.write_side_effect(start_block, effect);
        constructor
    }

    pub fn graph(&self) -> &IrGraph {
        &self.graph
    }

    pub fn current_block(&self) -> NodeId {
        self.current_block
    }

    pub fn set_current_block(&mut self, block: NodeId) {
        self.current_block = block;
    }

    pub fn is_sealed(&self, block: NodeId) -> bool {
        self.sealed.contains(&block)
    }

    /// Number of phis retired by trivial-phi elimination so far.
    pub fn phis_removed(&self) -> usize {
        self.forwarded.len()
    }

    /// Hand out the finished graph together with the optimizer state.
    pub fn finish(self) -> (IrGraph, O) {
        if !self.incomplete_phis.is_empty() || !self.incomplete_side_effect_phis.is_empty() {
            log::warn!(
                "{}: graph finished with unsealed blocks",
                self.graph.name()
            );
        }
        (self.graph, self.optimizer)
    }

    pub fn new_block(&mut self, role: &str) -> NodeId {
        self.graph.new_block(role)
    }

    fn add(&mut self, kind: NodeKind, block: NodeId, operands: Vec<NodeId>) -> NodeId {
        let node = self.graph.add_node(kind, block, operands);
        self.optimizer.transform(&mut self.graph, node)
    }

    pub fn new_const_int(&mut self, value: i32) -> NodeId {
        let block = self.graph.start_block();
        self.add(NodeKind::ConstInt(value), block, Vec::new())
    }

    pub fn new_const_bool(&mut self, value: bool) -> NodeId {
        let block = self.graph.start_block();
        self.add(NodeKind::ConstBool(value), block, Vec::new())
    }

    pub fn new_undefined(&mut self) -> NodeId {
        let block = self.graph.start_block();
        self.add(NodeKind::Undefined, block, Vec::new())
    }

    /// Build `lhs op rhs` in the current block and return the node carrying the value.
    ///
    /// Division and modulo consume the current side effect and produce a new
    /// one, so the returned value is their result projection.
    pub fn new_binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        let block = self.current_block;
        if !op.has_side_effect() {
            return self.add(NodeKind::Binary(op), block, vec![lhs, rhs]);
        }

        let effect = self.read_side_effect();
        let node = self.add(NodeKind::Binary(op), block, vec![lhs, rhs, effect]);
        let next_effect = self.graph.project(node, ProjKind::SideEffect);
        self.write_side_effect(block, next_effect);
        self.graph.project(node, ProjKind::Result)
    }

    pub fn new_compare(&mut self, op: CompareOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        let block = self.current_block;
        self.add(NodeKind::Compare(op), block, vec![lhs, rhs])
    }

    pub fn new_cond_value(&mut self, cond: NodeId, if_true: NodeId, if_false: NodeId) -> NodeId {
        let block = self.current_block;
        self.add(NodeKind::CondValue, block, vec![cond, if_true, if_false])
    }

    pub fn new_jump(&mut self, target: NodeId) -> NodeId {
        let block = self.current_block;
        let jump = self.graph.add_node(NodeKind::Jump { target }, block, Vec::new());
        self.graph.push_operand(target, jump);
        jump
    }

    pub fn new_cond_jump(&mut self, cond: NodeId, if_true: NodeId, if_false: NodeId) -> NodeId {
        let block = self.current_block;
        let jump = self
            .graph
            .add_node(NodeKind::CondJump { if_true, if_false }, block, vec![cond]);
        self.graph.push_operand(if_true, jump);
        self.graph.push_operand(if_false, jump);
        jump
    }

    pub fn new_return(&mut self, result: NodeId) -> NodeId {
        let block = self.current_block;
        let effect = self.read_side_effect();
        let ret = self.graph.add_node(NodeKind::Return, block, vec![effect, result]);
        let end = self.graph.end_block();
        self.graph.push_operand(end, ret);
        ret
    }

    fn new_phi(&mut self, block: NodeId, channel: PhiChannel) -> NodeId {
        self.graph.add_node(NodeKind::Phi(channel), block, Vec::new())
    }

    fn resolve(&self, mut node: NodeId) -> NodeId {
        while let Some(&next) = self.forwarded.get(&node) {
            node = next;
        }
        node
    }

    pub fn write_variable(&mut self, name: &str, block: NodeId, value: NodeId) {
        self.current_def
            .entry(name.to_string())
            .or_default()
            .insert(block, value);
    }

    pub fn read_variable(&mut self, name: &str, block: NodeId) -> NodeId {
        let known = self
            .current_def
            .get(name)
            .and_then(|defs| defs.get(&block))
            .copied();
        match known {
            Some(value) => self.resolve(value),
            None => self.read_variable_recursive(name, block),
        }
    }

    fn read_variable_recursive(&mut self, name: &str, block: NodeId) -> NodeId {
        let value = if !self.sealed.contains(&block) {
            let phi = self.new_phi(block, PhiChannel::Value);
            self.incomplete_phis
                .entry(block)
                .or_default()
                .push((name.to_string(), phi));
            phi
        } else if self.graph.operands(block).len() == 1 {
            let pred = self.graph.predecessor_block(block, 0);
            self.read_variable(name, pred)
        } else {
            let phi = self.new_phi(block, PhiChannel::Value);
            // Break cycles through this block before visiting the predecessors.
            self.write_variable(name, block, phi);
            self.add_phi_operands(name, phi)
        };
        self.write_variable(name, block, value);
        value
    }

    fn add_phi_operands(&mut self, name: &str, phi: NodeId) -> NodeId {
        let block = self.graph.block_of(phi);
        for index in 0..self.graph.operands(block).len() {
            let pred = self.graph.predecessor_block(block, index);
            let value = self.read_variable(name, pred);
            self.graph.push_operand(phi, value);
        }
        self.try_remove_trivial_phi(phi)
    }

    fn try_remove_trivial_phi(&mut self, phi: NodeId) -> NodeId {
        let mut same = None;
        for &operand in self.graph.operands(phi) {
            if Some(operand) == same || operand == phi {
                continue;
            }
            if same.is_some() {
                return phi;
            }
            same = Some(operand);
        }
        // No operand besides itself: the phi sits in an unreachable block.
        let same = match same {
            Some(value) => value,
            None => self.new_undefined(),
        };

        let users: Vec<NodeId> = self
            .graph
            .users(phi)
            .into_iter()
            .filter(|user| *user != phi)
            .collect();
        self.graph.replace_all_uses(phi, same);
        self.graph.detach(phi);
        self.forwarded.insert(phi, same);
        log::trace!("{}: trivial phi {} replaced by {}", self.graph.name(), phi, same);

        for user in users {
            if self.graph.kind(user).is_phi() && !self.forwarded.contains_key(&user) {
                self.try_remove_trivial_phi(user);
            }
        }
        self.resolve(same)
    }

    pub fn write_side_effect(&mut self, block: NodeId, value: NodeId) {
        self.current_side_effect.insert(block, value);
    }

    /// Current side effect of the block being built.
    pub fn read_side_effect(&mut self) -> NodeId {
        let block = self.current_block;
        self.read_side_effect_in(block)
    }

    fn read_side_effect_in(&mut self, block: NodeId) -> NodeId {
        match self.current_side_effect.get(&block).copied() {
            Some(value) => self.resolve(value),
            None => self.read_side_effect_recursive(block),
        }
    }

    fn read_side_effect_recursive(&mut self, block: NodeId) -> NodeId {
        let value = if !self.sealed.contains(&block) {
            let phi = self.new_phi(block, PhiChannel::SideEffect);
            self.incomplete_side_effect_phis.insert(block, phi);
            phi
        } else if self.graph.operands(block).len() == 1 {
            let pred = self.graph.predecessor_block(block, 0);
            self.read_side_effect_in(pred)
        } else {
            let phi = self.new_phi(block, PhiChannel::SideEffect);
            self.write_side_effect(block, phi);
            self.add_side_effect_phi_operands(phi)
        };
        self.write_side_effect(block, value);
        value
    }

    fn add_side_effect_phi_operands(&mut self, phi: NodeId) -> NodeId {
        let block = self.graph.block_of(phi);
        for index in 0..self.graph.operands(block).len() {
            let pred = self.graph.predecessor_block(block, index);
            let value = self.read_side_effect_in(pred);
            self.graph.push_operand(phi, value);
        }
        self.try_remove_trivial_phi(phi)
    }

    /// Declare that all predecessors of `block` are known and complete its placeholders.
    pub fn seal_block(&mut self, block: NodeId) {
        if let Some(pending) = self.incomplete_phis.remove(&block) {
            for (name, phi) in pending {
                self.add_phi_operands(&name, phi);
            }
        }
        if let Some(phi) = self.incomplete_side_effect_phis.remove(&block) {
            self.add_side_effect_phi_operands(phi);
        }
        self.sealed.insert(block);
    }
}
