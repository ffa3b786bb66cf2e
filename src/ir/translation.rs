// This module walks a function's syntax tree and drives the GraphConstructor. Expressions
// become value nodes (negation and bitwise complement are rewritten to subtraction from
// zero and xor with all ones, short-circuit operators and the conditional operator become
// conditional values), compound assignments are desugared to the plain operator, and
// structured statements are lowered to blocks joined by jumps. Each block is sealed as
// soon as its last predecessor exists: then/else right after the branch, the merge block
// after both arms, and a loop header only after the back edge from the body. Statements
// following a return, or an if whose arms both return, are never translated. Once the walk
// is complete, conditional values are lowered so the graph handed to the back end only
// contains nodes the code generator understands.

//! Syntax tree to SSA graph translation.

use crate::ast::{BinaryOperator, Expr, Function, Stmt};

use super::constructor::GraphConstructor;
use super::graph::IrGraph;
use super::lower::lower_cond_values;
use super::node::{BinaryOp, CompareOp, NodeId};
use super::optimizer::LocalValueNumbering;

/// A translated function graph and what it took to build it.
#[derive(Debug)]
pub struct TranslatedFunction {
    pub graph: IrGraph,
    pub phis_removed: usize,
    pub values_reused: usize,
    pub cond_values_lowered: usize,
}

/// Whether control can continue after a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continues,
    Returns,
}

/// Build the SSA graph of one function.
pub fn translate(function: &Function) -> TranslatedFunction {
    let mut translation = SsaTranslation {
        constructor: GraphConstructor::new(&function.name, LocalValueNumbering::new()),
    };
    translation.statements(&function.body);

    let phis_removed = translation.constructor.phis_removed();
    let (mut graph, mut optimizer) = translation.constructor.finish();
    let cond_values_lowered = lower_cond_values(&mut graph, &mut optimizer);

    log::debug!(
        "{}: {} nodes, {} trivial phis removed, {} values reused, {} conditional values lowered",
        function.name,
        graph.len(),
        phis_removed,
        optimizer.hits(),
        cond_values_lowered
    );
    TranslatedFunction {
        graph,
        phis_removed,
        values_reused: optimizer.hits(),
        cond_values_lowered,
    }
}

struct SsaTranslation {
    constructor: GraphConstructor<LocalValueNumbering>,
}

impl SsaTranslation {
    fn statements(&mut self, statements: &[Stmt]) -> Flow {
        for statement in statements {
            if self.statement(statement) == Flow::Returns {
                return Flow::Returns;
            }
        }
        Flow::Continues
    }

    fn statement(&mut self, statement: &Stmt) -> Flow {
        match statement {
            Stmt::Declare { name, init, .. } => {
                if let Some(init) = init {
                    let value = self.expression(init);
                    self.write(name, value);
                }
                Flow::Continues
            }
            Stmt::Assign { name, op, value } => {
                let rhs = self.expression(value);
                let value = match op {
                    Some(op) => {
                        let current = self.read(name);
                        self.binary(*op, current, rhs)
                    }
                    None => rhs,
                };
                self.write(name, value);
                Flow::Continues
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => self.if_statement(cond, then, otherwise.as_deref()),
            Stmt::While { cond, body } => {
                self.while_statement(cond, body);
                Flow::Continues
            }
            Stmt::Return(value) => {
                let value = self.expression(value);
                self.constructor.new_return(value);
                Flow::Returns
            }
            Stmt::Block(statements) => self.statements(statements),
        }
    }

    fn if_statement(&mut self, cond: &Expr, then: &Stmt, otherwise: Option<&Stmt>) -> Flow {
        let condition = self.expression(cond);
        let then_block = self.constructor.new_block("then");
        let else_block = match otherwise {
            Some(_) => Some(self.constructor.new_block("else")),
            None => None,
        };
        let merge = self.constructor.new_block("merge");
        self.constructor
            .new_cond_jump(condition, then_block, else_block.unwrap_or(merge));

        self.constructor.seal_block(then_block);
        self.constructor.set_current_block(then_block);
        let then_flow = self.statement(then);
        if then_flow == Flow::Continues {
            self.constructor.new_jump(merge);
        }

        let else_flow = match (otherwise, else_block) {
            (Some(otherwise), Some(else_block)) => {
                self.constructor.seal_block(else_block);
                self.constructor.set_current_block(else_block);
                let flow = self.statement(otherwise);
                if flow == Flow::Continues {
                    self.constructor.new_jump(merge);
                }
                flow
            }
            _ => Flow::Continues,
        };

        self.constructor.seal_block(merge);
        self.constructor.set_current_block(merge);
        if then_flow == Flow::Returns && else_flow == Flow::Returns {
            Flow::Returns
        } else {
            Flow::Continues
        }
    }

    fn while_statement(&mut self, cond: &Expr, body: &Stmt) {
        let header = self.constructor.new_block("header");
        let body_block = self.constructor.new_block("body");
        let exit = self.constructor.new_block("exit");
        self.constructor.new_jump(header);

        self.constructor.set_current_block(header);
        let condition = self.expression(cond);
        self.constructor.new_cond_jump(condition, body_block, exit);

        self.constructor.seal_block(body_block);
        self.constructor.set_current_block(body_block);
        if self.statement(body) == Flow::Continues {
            self.constructor.new_jump(header);
        }

        self.constructor.seal_block(header);
        self.constructor.seal_block(exit);
        self.constructor.set_current_block(exit);
    }

    fn read(&mut self, name: &str) -> NodeId {
        let block = self.constructor.current_block();
        self.constructor.read_variable(name, block)
    }

    fn write(&mut self, name: &str, value: NodeId) {
        let block = self.constructor.current_block();
        self.constructor.write_variable(name, block, value);
    }

    fn expression(&mut self, expr: &Expr) -> NodeId {
        match expr {
            Expr::IntLiteral(value) => self.constructor.new_const_int(*value),
            Expr::BoolLiteral(value) => self.constructor.new_const_bool(*value),
            Expr::Ident(name) => self.read(name),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.expression(lhs);
                let rhs = self.expression(rhs);
                self.binary(*op, lhs, rhs)
            }
            Expr::Negate(operand) => {
                let value = self.expression(operand);
                let zero = self.constructor.new_const_int(0);
                self.constructor.new_binary(BinaryOp::Sub, zero, value)
            }
            Expr::BitNot(operand) => {
                let value = self.expression(operand);
                let all_ones = self.constructor.new_const_int(-1);
                self.constructor.new_binary(BinaryOp::BitXor, value, all_ones)
            }
            Expr::LogicNot(operand) => {
                let value = self.expression(operand);
                let f = self.constructor.new_const_bool(false);
                let t = self.constructor.new_const_bool(true);
                self.constructor.new_cond_value(value, f, t)
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.expression(cond);
                let then = self.expression(then);
                let otherwise = self.expression(otherwise);
                self.constructor.new_cond_value(cond, then, otherwise)
            }
        }
    }

    fn binary(&mut self, op: BinaryOperator, lhs: NodeId, rhs: NodeId) -> NodeId {
        let arithmetic = match op {
            BinaryOperator::Add => BinaryOp::Add,
            BinaryOperator::Sub => BinaryOp::Sub,
            BinaryOperator::Mul => BinaryOp::Mul,
            BinaryOperator::Div => BinaryOp::Div,
            BinaryOperator::Mod => BinaryOp::Mod,
            BinaryOperator::BitAnd => BinaryOp::BitAnd,
            BinaryOperator::BitOr => BinaryOp::BitOr,
            BinaryOperator::BitXor => BinaryOp::BitXor,
            BinaryOperator::Shl => BinaryOp::Shl,
            BinaryOperator::Shr => BinaryOp::Shr,
            BinaryOperator::Less => return self.compare(CompareOp::Less, lhs, rhs),
            BinaryOperator::LessEq => return self.compare(CompareOp::LessEq, lhs, rhs),
            BinaryOperator::Greater => return self.compare(CompareOp::Greater, lhs, rhs),
            BinaryOperator::GreaterEq => return self.compare(CompareOp::GreaterEq, lhs, rhs),
            BinaryOperator::Equal => return self.compare(CompareOp::Equal, lhs, rhs),
            BinaryOperator::NotEqual => return self.compare(CompareOp::NotEqual, lhs, rhs),
            BinaryOperator::LogicAnd => {
                let f = self.constructor.new_const_bool(false);
                return self.constructor.new_cond_value(lhs, rhs, f);
            }
            BinaryOperator::LogicOr => {
                let t = self.constructor.new_const_bool(true);
                return self.constructor.new_cond_value(lhs, t, rhs);
            }
        };
        self.constructor.new_binary(arithmetic, lhs, rhs)
    }

    fn compare(&mut self, op: CompareOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.constructor.new_compare(op, lhs, rhs)
    }
}
