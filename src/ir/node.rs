//! Node model of the SSA graph.
//!
//! Every operation, including basic blocks themselves, is a [`Node`] stored
//! in the arena of an [`IrGraph`](super::IrGraph) and addressed by its
//! [`NodeId`]. The kind is a single sum type so that every pass matches over
//! all of them exhaustively.

use std::fmt;

/// Index of a node in its graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Arithmetic, bitwise and logical operators producing a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    LogicAnd,
    LogicOr,
}

impl BinaryOp {
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Mul
                | BinaryOp::BitAnd
                | BinaryOp::BitOr
                | BinaryOp::BitXor
                | BinaryOp::LogicAnd
                | BinaryOp::LogicOr
        )
    }

    /// Division and modulo may trap, so they are ordered on the side-effect chain.
    pub fn has_side_effect(self) -> bool {
        matches!(self, BinaryOp::Div | BinaryOp::Mod)
    }

    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "Add",
            BinaryOp::Sub => "Sub",
            BinaryOp::Mul => "Mul",
            BinaryOp::Div => "Div",
            BinaryOp::Mod => "Mod",
            BinaryOp::BitAnd => "And",
            BinaryOp::BitOr => "Or",
            BinaryOp::BitXor => "Xor",
            BinaryOp::Shl => "Shl",
            BinaryOp::Shr => "Shr",
            BinaryOp::LogicAnd => "LogicAnd",
            BinaryOp::LogicOr => "LogicOr",
        }
    }
}

/// Integer comparisons producing a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Equal,
    NotEqual,
}

impl CompareOp {
    pub fn is_commutative(self) -> bool {
        matches!(self, CompareOp::Equal | CompareOp::NotEqual)
    }

    pub fn name(self) -> &'static str {
        match self {
            CompareOp::Less => "Less",
            CompareOp::LessEq => "LessEq",
            CompareOp::Greater => "Greater",
            CompareOp::GreaterEq => "GreaterEq",
            CompareOp::Equal => "Equal",
            CompareOp::NotEqual => "NotEqual",
        }
    }
}

/// Which output of a multi-result node a projection selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjKind {
    Result,
    SideEffect,
}

/// Whether a phi merges ordinary values or the side-effect chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhiChannel {
    Value,
    SideEffect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Marker producing the initial side effect; lives in the start block.
    Start,
    /// Basic block. Its operands are the control nodes that jump to it.
    Block { label: String },
    ConstInt(i32),
    ConstBool(bool),
    /// Value of a variable read on a path with no definition.
    Undefined,
    /// Operands: left, right and, for division and modulo, the side effect.
    Binary(BinaryOp),
    /// Operands: left, right.
    Compare(CompareOp),
    /// Operands: condition, value if true, value if false.
    CondValue,
    Phi(PhiChannel),
    /// Operand: the projected node.
    Proj(ProjKind),
    Jump { target: NodeId },
    /// Operand: the condition.
    CondJump { if_true: NodeId, if_false: NodeId },
    /// Operands: side effect, result.
    Return,
}

impl NodeKind {
    pub fn is_block(&self) -> bool {
        matches!(self, NodeKind::Block { .. })
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, NodeKind::Phi(_))
    }

    pub fn is_value_phi(&self) -> bool {
        matches!(self, NodeKind::Phi(PhiChannel::Value))
    }

    /// Jumps, conditional jumps and returns end a block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            NodeKind::Jump { .. } | NodeKind::CondJump { .. } | NodeKind::Return
        )
    }

    /// Markers carry structure only and never produce an instruction.
    pub fn is_marker(&self) -> bool {
        matches!(
            self,
            NodeKind::Start | NodeKind::Block { .. } | NodeKind::Proj(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Start => "Start",
            NodeKind::Block { .. } => "Block",
            NodeKind::ConstInt(_) => "ConstInt",
            NodeKind::ConstBool(_) => "ConstBool",
            NodeKind::Undefined => "Undefined",
            NodeKind::Binary(op) => op.name(),
            NodeKind::Compare(op) => op.name(),
            NodeKind::CondValue => "CondValue",
            NodeKind::Phi(_) => "Phi",
            NodeKind::Proj(_) => "Proj",
            NodeKind::Jump { .. } => "Jump",
            NodeKind::CondJump { .. } => "CondJump",
            NodeKind::Return => "Return",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Block { label } => write!(f, "Block {}", label),
            NodeKind::ConstInt(value) => write!(f, "Const {}", value),
            NodeKind::ConstBool(value) => write!(f, "Const {}", value),
            NodeKind::Phi(PhiChannel::SideEffect) => write!(f, "Phi [effect]"),
            NodeKind::Proj(ProjKind::Result) => write!(f, "Proj result"),
            NodeKind::Proj(ProjKind::SideEffect) => write!(f, "Proj effect"),
            other => f.write_str(other.name()),
        }
    }
}

/// One arena slot.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    /// Owning block. A block node owns itself.
    pub block: NodeId,
    /// Ordered operand (predecessor) edges.
    pub operands: Vec<NodeId>,
}
