//! Function-level syntax tree consumed by the back end.
//!
//! The tree is produced and type checked by the front end. Nothing in this
//! crate re-validates it: conditions are booleans, operands agree with their
//! operators, every variable is declared before use and every function
//! returns on all paths.

/// Scalar types of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Int,
    Bool,
}

/// Binary operators as they appear in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
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
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Equal,
    NotEqual,
    LogicAnd,
    LogicOr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    IntLiteral(i32),
    BoolLiteral(bool),
    Ident(String),
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Arithmetic negation `-e`.
    Negate(Box<Expr>),
    /// Bitwise complement `~e`.
    BitNot(Box<Expr>),
    /// Logical negation `!e`.
    LogicNot(Box<Expr>),
    /// `cond ? then : otherwise`
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    pub fn int(value: i32) -> Self {
        Expr::IntLiteral(value)
    }

    pub fn bool(value: bool) -> Self {
        Expr::BoolLiteral(value)
    }

    pub fn var(name: &str) -> Self {
        Expr::Ident(name.to_string())
    }

    pub fn binary(op: BinaryOperator, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn negate(operand: Expr) -> Self {
        Expr::Negate(Box::new(operand))
    }

    pub fn bit_not(operand: Expr) -> Self {
        Expr::BitNot(Box::new(operand))
    }

    pub fn logic_not(operand: Expr) -> Self {
        Expr::LogicNot(Box::new(operand))
    }

    pub fn conditional(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Declare {
        name: String,
        ty: Type,
        init: Option<Expr>,
    },
    /// `name = value` or, with an operator, `name op= value`.
    Assign {
        name: String,
        op: Option<BinaryOperator>,
        value: Expr,
    },
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Return(Expr),
    Block(Vec<Stmt>),
}

impl Stmt {
    pub fn declare(name: &str, ty: Type, init: Expr) -> Self {
        Stmt::Declare {
            name: name.to_string(),
            ty,
            init: Some(init),
        }
    }

    pub fn assign(name: &str, value: Expr) -> Self {
        Stmt::Assign {
            name: name.to_string(),
            op: None,
            value,
        }
    }

    pub fn compound(name: &str, op: BinaryOperator, value: Expr) -> Self {
        Stmt::Assign {
            name: name.to_string(),
            op: Some(op),
            value,
        }
    }

    pub fn if_then(cond: Expr, then: Stmt) -> Self {
        Stmt::If {
            cond,
            then: Box::new(then),
            otherwise: None,
        }
    }

    pub fn if_else(cond: Expr, then: Stmt, otherwise: Stmt) -> Self {
        Stmt::If {
            cond,
            then: Box::new(then),
            otherwise: Some(Box::new(otherwise)),
        }
    }

    pub fn while_loop(cond: Expr, body: Stmt) -> Self {
        Stmt::While {
            cond,
            body: Box::new(body),
        }
    }

    pub fn ret(value: Expr) -> Self {
        Stmt::Return(value)
    }

    pub fn block(statements: Vec<Stmt>) -> Self {
        Stmt::Block(statements)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub return_type: Type,
    pub body: Vec<Stmt>,
}

impl Function {
    pub fn new(name: &str, body: Vec<Stmt>) -> Self {
        Self {
            name: name.to_string(),
            return_type: Type::Int,
            body,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub functions: Vec<Function>,
}

impl Program {
    pub fn new(functions: Vec<Function>) -> Self {
        Self { functions }
    }

    /// A program consisting of `int main() { <body> }`.
    pub fn main(body: Vec<Stmt>) -> Self {
        Self::new(vec![Function::new("main", body)])
    }
}
