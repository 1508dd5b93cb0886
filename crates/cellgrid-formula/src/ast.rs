//! Formula syntax tree
//!
//! The parser produces an [`Expr`] and the evaluators walk it. Infix chains
//! are kept flat (`Infix` holds all operands and operators of one chain)
//! rather than folded into a binary tree: operands must be evaluated
//! left-to-right *before* precedence folding so that side effects in custom
//! functions fire in source order.

use cellgrid_core::{CellRef, ExcelError, Value};

/// A unary `+` or `-` prefix sign. Signs stack: `--1` carries two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

/// A binary infix operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Pow,
    Mul,
    Div,
    Add,
    Sub,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl InfixOp {
    /// Precedence tier, lower binds tighter. A flat chain is folded one
    /// tier at a time.
    pub fn tier(&self) -> u8 {
        match self {
            InfixOp::Pow => 1,
            InfixOp::Mul | InfixOp::Div => 2,
            InfixOp::Add | InfixOp::Sub => 3,
            InfixOp::Concat => 4,
            InfixOp::Eq | InfixOp::Ne | InfixOp::Lt | InfixOp::Le | InfixOp::Gt | InfixOp::Ge => 5,
        }
    }

    /// Number of precedence tiers.
    pub const TIERS: u8 = 5;

    pub fn symbol(&self) -> &'static str {
        match self {
            InfixOp::Pow => "^",
            InfixOp::Mul => "*",
            InfixOp::Div => "/",
            InfixOp::Add => "+",
            InfixOp::Sub => "-",
            InfixOp::Concat => "&",
            InfixOp::Eq => "=",
            InfixOp::Ne => "<>",
            InfixOp::Lt => "<",
            InfixOp::Le => "<=",
            InfixOp::Gt => ">",
            InfixOp::Ge => ">=",
        }
    }
}

/// A parsed formula expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    Number(f64),
    Text(String),
    Bool(bool),
    Error(ExcelError),
    /// Array literal `{1,2;3,4}`; rows of constants, row-major.
    ArrayLit(Vec<Vec<Value>>),

    // References
    Cell(CellRef),
    /// Bare column in a column span, e.g. both sides of `A:C`.
    Column(u32),
    /// Defined name, resolved by the evaluation context.
    Name(String),
    /// Sheet qualifier applied to the expression it prefixes,
    /// e.g. `Sheet1!A1:B2`.
    WithSheet { sheet: String, inner: Box<Expr> },

    // Reference operators
    /// `:`-joined chain; operands merge into one bounding range.
    Range(Vec<Expr>),
    /// Whitespace intersection chain, e.g. `A1:B3 B2:C4`.
    Intersect(Vec<Expr>),
    /// Parenthesized comma list, e.g. `(A1, B2:B4)`.
    Union(Vec<Expr>),

    // Value operators
    Prefix { signs: Vec<Sign>, operand: Box<Expr> },
    Percent(Box<Expr>),
    /// Flat binary-operator chain in source order.
    Infix { operands: Vec<Expr>, ops: Vec<InfixOp> },

    /// Function call; `None` marks an explicitly omitted argument slot as in
    /// `ROUND(1.5,)`.
    Call { name: String, args: Vec<Option<Expr>> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tier_order() {
        assert!(InfixOp::Pow.tier() < InfixOp::Mul.tier());
        assert!(InfixOp::Mul.tier() < InfixOp::Add.tier());
        assert!(InfixOp::Add.tier() < InfixOp::Concat.tier());
        assert!(InfixOp::Concat.tier() < InfixOp::Eq.tier());
        assert_eq!(InfixOp::Div.tier(), InfixOp::Mul.tier());
        assert_eq!(InfixOp::Ge.tier(), InfixOp::TIERS);
    }
}
