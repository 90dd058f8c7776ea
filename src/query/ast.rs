//! Expression tree for parsed queries

use serde_json::Value;

/// Binary operators, in JSONata spelling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Concat,
    Equal,
    NotEqual,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
    In,
}

impl BinaryOp {
    /// Left binding power used by the parser
    pub fn binding_power(self) -> u8 {
        match self {
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 60,
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Concat => 50,
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Less
            | BinaryOp::LessEq
            | BinaryOp::Greater
            | BinaryOp::GreaterEq
            | BinaryOp::In => 40,
            BinaryOp::And => 30,
            BinaryOp::Or => 25,
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Subtract,
            "*" => BinaryOp::Multiply,
            "/" => BinaryOp::Divide,
            "%" => BinaryOp::Modulo,
            "&" => BinaryOp::Concat,
            "=" => BinaryOp::Equal,
            "!=" => BinaryOp::NotEqual,
            "<" => BinaryOp::Less,
            "<=" => BinaryOp::LessEq,
            ">" => BinaryOp::Greater,
            ">=" => BinaryOp::GreaterEq,
            "and" => BinaryOp::And,
            "or" => BinaryOp::Or,
            "in" => BinaryOp::In,
            _ => return None,
        })
    }
}

/// Parsed query expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Field lookup against the context item
    Name(String),
    /// `*`, every value of the context object
    Wildcard,
    /// `$`
    Context,
    /// `$$`
    Root,
    /// `a.b.c`; each step is evaluated against every item produced by the previous one
    Path(Vec<Expr>),
    /// `base[predicate]`, index selection or filtering
    Filter {
        base: Box<Expr>,
        predicate: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Negate(Box<Expr>),
    /// `$name(args...)`
    Call { name: String, args: Vec<Expr> },
    /// `[a, b, ...]`
    Array(Vec<Expr>),
}
