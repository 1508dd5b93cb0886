//! Expression evaluation
//!
//! [`evaluate`] walks a parsed [`Expr`] against an [`EvalContext`]. The
//! compute engine and the dependency tracker both implement the context
//! trait, so one tree walk serves both: the compute side resolves
//! references through the data source while the dependency side records
//! them and fabricates zeros.

use crate::algebra::{self, Operand, Resolver};
use crate::ast::Expr;
use crate::error::FormulaResult;
use cellgrid_core::{Position, Reference, Value};

/// A function-call argument as the grammar saw it: either an expression
/// result or an explicitly omitted slot (`ROUND(1.5,)`).
#[derive(Debug, Clone, PartialEq)]
pub enum RawArg {
    Omitted,
    Operand(Operand),
}

/// The seam between the grammar walk and an evaluation mode.
pub trait EvalContext: Resolver {
    /// Where the formula lives, if the caller said so.
    fn position(&self) -> Option<&Position>;

    /// Resolve a defined name to a reference or value.
    fn resolve_name(&mut self, name: &str) -> FormulaResult<Operand>;

    /// Dispatch a function call. Arguments arrive unresolved; the context
    /// decides per function how to normalize them.
    fn invoke_function(&mut self, name: &str, args: Vec<RawArg>) -> FormulaResult<Operand>;
}

/// Evaluate an expression tree. Operands are evaluated strictly
/// left-to-right; precedence only affects how results combine.
pub fn evaluate(ctx: &mut dyn EvalContext, expr: &Expr) -> FormulaResult<Operand> {
    match expr {
        Expr::Number(n) => Ok(Operand::Value(Value::Number(*n))),
        Expr::Text(s) => Ok(Operand::Value(Value::Text(s.clone()))),
        Expr::Bool(b) => Ok(Operand::Value(Value::Bool(*b))),
        Expr::Error(e) => Ok(Operand::Value(Value::Error(*e))),
        Expr::ArrayLit(rows) => Ok(Operand::Value(Value::Array(rows.clone()))),

        Expr::Cell(cell) => Ok(Operand::Reference(Reference::Cell(cell.clone()))),
        Expr::Column(col) => Ok(Operand::Reference(Reference::WholeCol {
            sheet: None,
            col: *col,
        })),
        Expr::Name(name) => ctx.resolve_name(name),

        Expr::WithSheet { sheet, inner } => {
            let mut operand = evaluate(ctx, inner)?;
            if let Operand::Reference(reference) = &mut operand {
                reference.set_sheet(sheet.clone());
            }
            Ok(operand)
        }

        Expr::Range(parts) => {
            let operands = eval_all(ctx, parts)?;
            algebra::apply_range(operands)
        }
        Expr::Intersect(parts) => {
            let operands = eval_all(ctx, parts)?;
            algebra::apply_intersect(operands)
        }
        Expr::Union(parts) => {
            let operands = eval_all(ctx, parts)?;
            algebra::apply_union(ctx, operands)
        }

        Expr::Prefix { signs, operand } => {
            let operand = evaluate(ctx, operand)?;
            Ok(Operand::Value(algebra::apply_prefix(ctx, signs, operand)?))
        }
        Expr::Percent(inner) => {
            let operand = evaluate(ctx, inner)?;
            Ok(Operand::Value(algebra::apply_percent(ctx, operand)?))
        }
        Expr::Infix { operands, ops } => {
            let operands = eval_all(ctx, operands)?;
            algebra::fold_infix_chain(ctx, operands, ops.clone())
        }

        Expr::Call { name, args } => {
            let mut raw_args = Vec::with_capacity(args.len());
            for arg in args {
                match arg {
                    Some(expr) => raw_args.push(RawArg::Operand(evaluate(ctx, expr)?)),
                    None => raw_args.push(RawArg::Omitted),
                }
            }
            ctx.invoke_function(name, raw_args)
        }
    }
}

fn eval_all(ctx: &mut dyn EvalContext, exprs: &[Expr]) -> FormulaResult<Vec<Operand>> {
    exprs.iter().map(|e| evaluate(ctx, e)).collect()
}
