// This module implements IrGraph, the arena that owns every node of one function. Nodes
// are addressed by NodeId indices and never freed individually; the whole graph is dropped
// once the function has been emitted. Each node stores its ordered operand list and the
// graph keeps the reverse direction (users) in sync on every edge mutation, so rewiring a
// retired phi or a lowered conditional value updates both directions in one call. Blocks
// are nodes too: their operands are the jump and conditional-jump nodes targeting them and
// the end block collects the return nodes. The module also provides the traversals every
// later pass builds on: the postorder walk from the end block, control successors of a
// terminator, projection skipping and the effective-block query for phi operands.

//! Arena-based SSA graph of one function.

use hashbrown::{HashMap, HashSet};

use super::node::{Node, NodeId, NodeKind, ProjKind};

/// SSA graph of one function.
#[derive(Debug, Clone)]
pub struct IrGraph {
    name: String,
    nodes: Vec<Node>,
    /// One entry per operand edge pointing at the node.
    users: Vec<Vec<NodeId>>,
    start_block: NodeId,
    end_block: NodeId,
    start: NodeId,
    label_counts: HashMap<String, usize>,
}

impl IrGraph {
    /// Create a graph holding the start block, the start marker and the end block.
    pub fn new(name: &str) -> Self {
        let mut graph = Self {
            name: name.to_string(),
            nodes: Vec::new(),
            users: Vec::new(),
            start_block: NodeId::new(0),
            end_block: NodeId::new(0),
            start: NodeId::new(0),
            label_counts: HashMap::new(),
        };
        graph.start_block = graph.new_block("start");
        graph.start = graph.add_node(NodeKind::Start, graph.start_block, Vec::new());
        graph.end_block = graph.new_block("end");
        graph
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_block(&self) -> NodeId {
        self.start_block
    }

    pub fn end_block(&self) -> NodeId {
        self.end_block
    }

    /// The start marker whose side-effect projection seeds the effect chain.
    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId::new)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn block_of(&self, id: NodeId) -> NodeId {
        self.nodes[id.index()].block
    }

    pub fn operands(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].operands
    }

    pub fn operand(&self, id: NodeId, index: usize) -> NodeId {
        self.nodes[id.index()].operands[index]
    }

    /// Distinct users of `id` in the order their edges were added.
    pub fn users(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.users[id.index()]
            .iter()
            .copied()
            .filter(|user| seen.insert(*user))
            .collect()
    }

    /// Label of a block node. Non-block nodes answer their block's label.
    pub fn label(&self, block: NodeId) -> &str {
        match &self.nodes[self.block_of(block).index()].kind {
            NodeKind::Block { label } => label,
            _ => "",
        }
    }

    /// Create a block whose label is `<function>_<role>`, suffixed when the role repeats.
    pub fn new_block(&mut self, role: &str) -> NodeId {
        let count = self.label_counts.entry(role.to_string()).or_insert(0);
        let label = if *count == 0 {
            format!("{}_{}", self.name, role)
        } else {
            format!("{}_{}_{}", self.name, role, count)
        };
        *count += 1;

        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind: NodeKind::Block { label },
            block: id,
            operands: Vec::new(),
        });
        self.users.push(Vec::new());
        id
    }

    /// Append a node to the arena and register it as a user of its operands.
    pub fn add_node(&mut self, kind: NodeKind, block: NodeId, operands: Vec<NodeId>) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        for operand in &operands {
            self.users[operand.index()].push(id);
        }
        self.nodes.push(Node {
            kind,
            block,
            operands,
        });
        self.users.push(Vec::new());
        id
    }

    pub fn push_operand(&mut self, node: NodeId, operand: NodeId) {
        self.nodes[node.index()].operands.push(operand);
        self.users[operand.index()].push(node);
    }

    pub fn set_operand(&mut self, node: NodeId, index: usize, operand: NodeId) {
        let old = std::mem::replace(&mut self.nodes[node.index()].operands[index], operand);
        self.remove_user(old, node);
        self.users[operand.index()].push(node);
    }

    /// Rewire every operand slot that refers to `old` so it refers to `new`.
    pub fn replace_all_uses(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        for user in self.users(old) {
            for index in 0..self.nodes[user.index()].operands.len() {
                if self.nodes[user.index()].operands[index] == old {
                    self.set_operand(user, index, new);
                }
            }
        }
    }

    /// Drop all operand edges of a node that no longer takes part in the graph.
    pub fn detach(&mut self, node: NodeId) {
        let operands = std::mem::take(&mut self.nodes[node.index()].operands);
        for operand in operands {
            self.remove_user(operand, node);
        }
    }

    fn remove_user(&mut self, operand: NodeId, user: NodeId) {
        let users = &mut self.users[operand.index()];
        if let Some(position) = users.iter().position(|u| *u == user) {
            users.swap_remove(position);
        }
    }

    /// Block of the `index`-th control predecessor of `block`.
    pub fn predecessor_block(&self, block: NodeId, index: usize) -> NodeId {
        self.block_of(self.operand(block, index))
    }

    /// Block in which operand `index` of `user` is consumed.
    ///
    /// Phi operands are consumed at the end of the corresponding predecessor
    /// block; every other operand is consumed in the user's own block.
    pub fn effective_block(&self, user: NodeId, index: usize) -> NodeId {
        if self.kind(user).is_phi() {
            let block = self.block_of(user);
            if index < self.operands(block).len() {
                return self.predecessor_block(block, index);
            }
        }
        self.block_of(user)
    }

    /// Targets of a terminator, true target first.
    pub fn control_successors(&self, terminator: NodeId) -> Vec<NodeId> {
        match self.kind(terminator) {
            NodeKind::Jump { target } => vec![*target],
            NodeKind::CondJump { if_true, if_false } => vec![*if_true, *if_false],
            _ => Vec::new(),
        }
    }

    /// Follow projections to the node that actually produces the value.
    pub fn skip_proj(&self, mut id: NodeId) -> NodeId {
        while let NodeKind::Proj(_) = self.kind(id) {
            match self.operands(id).first() {
                Some(&inner) => id = inner,
                None => break,
            }
        }
        id
    }

    /// Create the result and side-effect projections of a node.
    pub fn project(&mut self, node: NodeId, kind: ProjKind) -> NodeId {
        let block = self.block_of(node);
        self.add_node(NodeKind::Proj(kind), block, vec![node])
    }

    /// Every node reachable from the end block, each after its operands.
    pub fn reachable_postorder(&self) -> Vec<NodeId> {
        self.postorder_from(&[self.end_block])
    }

    /// Every node reachable from `roots`, each after its operands.
    ///
    /// The walk follows operand edges and the edge from a node to its block,
    /// so blocks, the jumps into them and everything they compute are found.
    /// Back edges through phis are cut where the walk meets a node already on
    /// the stack.
    pub fn postorder_from(&self, roots: &[NodeId]) -> Vec<NodeId> {
        let mut post = Vec::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<(NodeId, bool)> =
            roots.iter().rev().map(|root| (*root, false)).collect();
        while let Some((node, processed)) = stack.pop() {
            if processed {
                post.push(node);
                continue;
            }
            if !visited.insert(node) {
                continue;
            }
            stack.push((node, true));
            let block = self.block_of(node);
            if block != node {
                stack.push((block, false));
            }
            for operand in self.operands(node).iter().rev() {
                stack.push((*operand, false));
            }
        }
        post
    }
}
