//! The compute-mode formula engine
//!
//! [`FormulaEngine`] owns a [`DataSource`] and turns formula text into a
//! [`Value`]. One `parse` call owns the engine's mutable position state for
//! its duration; the engine is single-threaded by design (custom async
//! functions may be `!Send`).
//!
//! ```
//! use cellgrid_formula::FormulaEngine;
//! use cellgrid_core::Value;
//!
//! let mut engine = FormulaEngine::default();
//! let result = engine.parse("=1+2*3", None, false).unwrap();
//! assert_eq!(result, Value::Number(7.0));
//! ```

use crate::algebra::{self, Extracted, Operand, Resolver};
use crate::ast::Expr;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{self, EvalContext, RawArg};
use crate::functions::{self, Argument, FunctionContext};
use crate::parser::parse_formula;
use ahash::AHashMap;
use cellgrid_core::{CellRef, ExcelError, Position, RangeRef, Reference, Value};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

/// Supplies cell data and defined names to the engine. Every method has a
/// zero-ish default so a partial implementation stays usable.
pub trait DataSource {
    /// The value of one cell. The reference's sheet is already defaulted
    /// from the formula's position.
    fn cell(&self, reference: &CellRef) -> Value {
        let _ = reference;
        Value::Number(0.0)
    }

    /// The values of a rectangular range, row-major.
    fn range(&self, reference: &RangeRef) -> Vec<Vec<Value>> {
        let _ = reference;
        vec![vec![Value::Number(0.0)]]
    }

    /// Resolve a defined name to a reference, or `None` for `#NAME?`.
    fn variable(&self, name: &str, position: Option<&Position>) -> Option<Reference> {
        let _ = (name, position);
        None
    }
}

/// A data source with no data behind it.
pub struct NullSource;

impl DataSource for NullSource {}

/// A custom function over normalized arguments.
pub type CustomFn = Rc<dyn Fn(&[Argument]) -> FormulaResult<Value>>;

/// A custom function that also sees the formula's position.
pub type CustomContextFn = Rc<dyn Fn(Option<&Position>, &[Argument]) -> FormulaResult<Value>>;

/// A custom asynchronous function. The future need not be `Send`.
pub type CustomAsyncFn = Rc<dyn Fn(Vec<Argument>) -> LocalBoxFuture<'static, FormulaResult<Value>>>;

/// Formula parser and evaluator over a data source.
pub struct FormulaEngine {
    source: Box<dyn DataSource>,
    customs: AHashMap<String, CustomFn>,
    customs_with_context: AHashMap<String, CustomContextFn>,
    customs_async: AHashMap<String, CustomAsyncFn>,
    position: Option<Position>,
    lenient: bool,
    missing: Vec<String>,
}

impl Default for FormulaEngine {
    fn default() -> Self {
        Self::new(Box::new(NullSource))
    }
}

impl FormulaEngine {
    pub fn new(source: Box<dyn DataSource>) -> Self {
        Self {
            source,
            customs: AHashMap::new(),
            customs_with_context: AHashMap::new(),
            customs_async: AHashMap::new(),
            position: None,
            lenient: false,
            missing: Vec::new(),
        }
    }

    /// In lenient mode an unknown function logs, is recorded in
    /// [`missing_functions`](Self::missing_functions) and evaluates to 0
    /// instead of failing the parse.
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Register a custom function. Custom names shadow built-ins.
    pub fn set_function<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[Argument]) -> FormulaResult<Value> + 'static,
    {
        self.customs.insert(name.to_uppercase(), Rc::new(f));
    }

    /// Register a custom function that reads the formula position.
    pub fn set_context_function<F>(&mut self, name: &str, f: F)
    where
        F: Fn(Option<&Position>, &[Argument]) -> FormulaResult<Value> + 'static,
    {
        self.customs_with_context
            .insert(name.to_uppercase(), Rc::new(f));
    }

    /// Register a custom asynchronous function; only reachable through
    /// [`parse_async`](Self::parse_async).
    pub fn set_async_function<F>(&mut self, name: &str, f: F)
    where
        F: Fn(Vec<Argument>) -> LocalBoxFuture<'static, FormulaResult<Value>> + 'static,
    {
        self.customs_async.insert(name.to_uppercase(), Rc::new(f));
    }

    /// Unknown functions encountered while lenient, in first-seen order.
    pub fn missing_functions(&self) -> &[String] {
        &self.missing
    }

    /// All callable function names, built-ins and customs, sorted.
    pub fn supported_functions(&self) -> Vec<String> {
        let mut names: Vec<String> = functions::builtins()
            .supported_functions()
            .into_iter()
            .map(str::to_string)
            .collect();
        names.extend(self.customs.keys().cloned());
        names.extend(self.customs_with_context.keys().cloned());
        names.extend(self.customs_async.keys().cloned());
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Evaluate a formula. A leading `=` is allowed and ignored; error
    /// locations are relative to the text after it.
    ///
    /// With `allow_array` false (the spreadsheet-cell convention), a range
    /// result collapses to a single cell where Excel would, and arrays
    /// collapse to their top-left element.
    pub fn parse(
        &mut self,
        input: &str,
        position: Option<Position>,
        allow_array: bool,
    ) -> FormulaResult<Value> {
        let expr = compile(input)?;
        self.position = position;
        let operand = evaluator::evaluate(self, &expr)?;
        self.check_formula_result(operand, allow_array)
    }

    /// As [`parse`](Self::parse), but custom async functions are awaited.
    /// Argument evaluation stays strictly left-to-right, value-for-value
    /// identical to the synchronous path.
    pub async fn parse_async(
        &mut self,
        input: &str,
        position: Option<Position>,
        allow_array: bool,
    ) -> FormulaResult<Value> {
        let expr = compile(input)?;
        self.position = position;
        let operand = self.eval_async(&expr).await?;
        self.check_formula_result(operand, allow_array)
    }

    fn eval_async<'a>(&'a mut self, expr: &'a Expr) -> LocalBoxFuture<'a, FormulaResult<Operand>> {
        Box::pin(async move {
            match expr {
                Expr::Call { name, args } => {
                    let mut raw_args = Vec::with_capacity(args.len());
                    for arg in args {
                        match arg {
                            Some(e) => raw_args.push(RawArg::Operand(self.eval_async(e).await?)),
                            None => raw_args.push(RawArg::Omitted),
                        }
                    }
                    self.call_function_async(name, raw_args).await
                }
                Expr::WithSheet { sheet, inner } => {
                    let mut operand = self.eval_async(inner).await?;
                    if let Operand::Reference(reference) = &mut operand {
                        reference.set_sheet(sheet.clone());
                    }
                    Ok(operand)
                }
                Expr::Range(parts) => {
                    let operands = self.eval_all_async(parts).await?;
                    algebra::apply_range(operands)
                }
                Expr::Intersect(parts) => {
                    let operands = self.eval_all_async(parts).await?;
                    algebra::apply_intersect(operands)
                }
                Expr::Union(parts) => {
                    let operands = self.eval_all_async(parts).await?;
                    algebra::apply_union(self, operands)
                }
                Expr::Prefix { signs, operand } => {
                    let operand = self.eval_async(operand).await?;
                    Ok(Operand::Value(algebra::apply_prefix(self, signs, operand)?))
                }
                Expr::Percent(inner) => {
                    let operand = self.eval_async(inner).await?;
                    Ok(Operand::Value(algebra::apply_percent(self, operand)?))
                }
                Expr::Infix { operands, ops } => {
                    let operands = self.eval_all_async(operands).await?;
                    algebra::fold_infix_chain(self, operands, ops.clone())
                }
                // leaves cannot contain calls; share the sync path
                leaf => evaluator::evaluate(self, leaf),
            }
        })
    }

    async fn eval_all_async(&mut self, exprs: &[Expr]) -> FormulaResult<Vec<Operand>> {
        let mut operands = Vec::with_capacity(exprs.len());
        for expr in exprs {
            operands.push(self.eval_async(expr).await?);
        }
        Ok(operands)
    }

    async fn call_function_async(
        &mut self,
        name: &str,
        raw_args: Vec<RawArg>,
    ) -> FormulaResult<Operand> {
        let name = normalize_name(name);
        let result = match self.customs_async.get(&name).cloned() {
            Some(f) => {
                // async customs read omitted slots as ""
                match functions::normalize_value_args(self, false, false, raw_args) {
                    Ok(args) => f(args).await.map(Operand::Value),
                    Err(e) => Err(e),
                }
            }
            None => self.call_function_inner(&name, raw_args),
        };
        unthrow(result)
    }

    fn call_function(&mut self, name: &str, raw_args: Vec<RawArg>) -> FormulaResult<Operand> {
        let name = normalize_name(name);
        if self.customs_async.contains_key(&name) {
            return Err(FormulaError::Eval(format!(
                "function {name} is asynchronous; evaluate with parse_async"
            )));
        }
        let result = self.call_function_inner(&name, raw_args);
        unthrow(result)
    }

    fn call_function_inner(&mut self, name: &str, raw_args: Vec<RawArg>) -> FormulaResult<Operand> {
        // custom names shadow built-ins
        if let Some(f) = self.customs.get(name).cloned() {
            let args = functions::normalize_value_args(self, false, false, raw_args)?;
            return Ok(Operand::Value(f(&args)?));
        }
        if let Some(f) = self.customs_with_context.get(name).cloned() {
            let args = functions::normalize_value_args(self, false, false, raw_args)?;
            return Ok(Operand::Value(f(self.position.as_ref(), &args)?));
        }
        if let Some(def) = functions::builtins().get(name) {
            log::trace!("dispatching {name} with {} argument(s)", raw_args.len());
            return functions::dispatch(def, self, raw_args);
        }
        if self.lenient {
            log::debug!("function {name} is not implemented, returning 0");
            if !self.missing.iter().any(|n| n == name) {
                self.missing.push(name.to_string());
            }
            return Ok(Operand::Value(Value::Number(0.0)));
        }
        Err(FormulaError::NotImplemented(name.to_string()))
    }

    /// Final top-level normalization: resolve a leftover reference per the
    /// array policy, map NaN/infinities to error values, drop negative zero.
    fn check_formula_result(
        &mut self,
        operand: Operand,
        allow_array: bool,
    ) -> FormulaResult<Value> {
        let value = match operand {
            Operand::Value(value) => {
                if !allow_array {
                    match value {
                        Value::Array(_) => value
                            .first_element()
                            .cloned()
                            .unwrap_or(Value::Error(ExcelError::Value)),
                        other => other,
                    }
                } else {
                    value
                }
            }
            Operand::Reference(reference) => {
                if allow_array {
                    self.retrieve_reference(&reference)?
                } else {
                    match &reference {
                        Reference::Cell(_) => self.retrieve_reference(&reference)?,
                        // a single-column range collapses to its top corner
                        Reference::Range(r) if r.from.col == r.to.col => {
                            let corner = Reference::Cell(CellRef::new(r.from.row, r.from.col));
                            self.retrieve_reference(&corner)?
                        }
                        _ => Value::Error(ExcelError::Value),
                    }
                }
            }
            Operand::Collection(_) => Value::Error(ExcelError::Value),
        };
        Ok(normalize_number(value))
    }
}

fn compile(input: &str) -> FormulaResult<Expr> {
    if input.is_empty() {
        return Err(FormulaError::EmptyInput);
    }
    let text = input.strip_prefix('=').unwrap_or(input);
    parse_formula(text)
}

/// Strip an `_xlfn.` future-function prefix and uppercase.
fn normalize_name(name: &str) -> String {
    let rest = match name.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("_xlfn.") => &name[6..],
        _ => name,
    };
    rest.to_uppercase()
}

/// A thrown error value becomes a returned error value at the function
/// boundary; real failures keep propagating.
fn unthrow(result: FormulaResult<Operand>) -> FormulaResult<Operand> {
    match result {
        Err(FormulaError::Excel(e)) => Ok(Operand::Value(Value::Error(e))),
        other => other,
    }
}

fn normalize_number(value: Value) -> Value {
    match value {
        Value::Number(n) if n.is_nan() => Value::Error(ExcelError::Value),
        Value::Number(n) if n.is_infinite() => Value::Error(ExcelError::Num),
        // -0 + 0 is +0
        Value::Number(n) => Value::Number(n + 0.0),
        other => other,
    }
}

impl Resolver for FormulaEngine {
    fn retrieve_reference(&mut self, reference: &Reference) -> FormulaResult<Value> {
        let position_sheet = || {
            self.position
                .as_ref()
                .and_then(|p| p.sheet.clone())
        };
        match reference {
            Reference::Cell(cell) => {
                let mut cell = cell.clone();
                if cell.sheet.is_none() {
                    cell.sheet = position_sheet();
                }
                Ok(self.source.cell(&cell))
            }
            Reference::Range(range) => {
                let mut range = range.clone();
                if range.sheet.is_none() {
                    range.sheet = position_sheet();
                }
                Ok(Value::Array(self.source.range(&range)))
            }
            // whole rows/columns cannot be materialized as data
            Reference::WholeRow { .. } | Reference::WholeCol { .. } => {
                Ok(Value::Error(ExcelError::Ref))
            }
        }
    }
}

impl EvalContext for FormulaEngine {
    fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    fn resolve_name(&mut self, name: &str) -> FormulaResult<Operand> {
        match self.source.variable(name, self.position.as_ref()) {
            Some(reference) => Ok(Operand::Reference(reference)),
            None => Ok(Operand::Value(Value::Error(ExcelError::Name))),
        }
    }

    fn invoke_function(&mut self, name: &str, args: Vec<RawArg>) -> FormulaResult<Operand> {
        self.call_function(name, args)
    }
}

impl FunctionContext for FormulaEngine {
    fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    fn retrieve(&mut self, operand: Operand) -> FormulaResult<Extracted> {
        algebra::extract_ref_value(self, operand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// 3x3 grid: value at (row, col) is row*10+col.
    struct Grid;

    impl DataSource for Grid {
        fn cell(&self, reference: &CellRef) -> Value {
            Value::Number((reference.row * 10 + reference.col) as f64)
        }

        fn range(&self, reference: &RangeRef) -> Vec<Vec<Value>> {
            let (r1, c1, r2, c2) = reference.bounds();
            (r1..=r2)
                .map(|r| {
                    (c1..=c2)
                        .map(|c| Value::Number((r * 10 + c) as f64))
                        .collect()
                })
                .collect()
        }

        fn variable(&self, name: &str, _position: Option<&Position>) -> Option<Reference> {
            match name {
                "target" => Some(Reference::Cell(CellRef::new(2, 2))),
                _ => None,
            }
        }
    }

    fn engine() -> FormulaEngine {
        FormulaEngine::new(Box::new(Grid))
    }

    #[test]
    fn test_arithmetic() {
        let mut e = engine();
        assert_eq!(e.parse("=1+2*3", None, false).unwrap(), Value::Number(7.0));
        assert_eq!(e.parse("2^3^2", None, false).unwrap(), Value::Number(64.0));
        assert_eq!(e.parse("=50%", None, false).unwrap(), Value::Number(0.5));
        assert_eq!(
            e.parse("=10/0", None, false).unwrap(),
            Value::Error(ExcelError::Div0)
        );
    }

    #[test]
    fn test_cell_and_range_resolution() {
        let mut e = engine();
        assert_eq!(e.parse("=B2", None, false).unwrap(), Value::Number(22.0));
        assert_eq!(
            e.parse("=SUM(A1:A3)", None, false).unwrap(),
            Value::Number(11.0 + 21.0 + 31.0)
        );
    }

    #[test]
    fn test_variable_resolution() {
        let mut e = engine();
        assert_eq!(e.parse("=target", None, false).unwrap(), Value::Number(22.0));
        assert_eq!(
            e.parse("=nope", None, false).unwrap(),
            Value::Error(ExcelError::Name)
        );
    }

    #[test]
    fn test_range_result_collapses_single_column() {
        let mut e = engine();
        // a bare multi-cell single-column range collapses to its top cell
        assert_eq!(e.parse("=A1:A3", None, false).unwrap(), Value::Number(11.0));
        // a wide range cannot collapse
        assert_eq!(
            e.parse("=A1:B3", None, false).unwrap(),
            Value::Error(ExcelError::Value)
        );
        // with arrays allowed the values come back whole
        assert_eq!(
            e.parse("=A1:B1", None, true).unwrap(),
            Value::Array(vec![vec![Value::Number(11.0), Value::Number(12.0)]])
        );
    }

    #[test]
    fn test_position_dependent_functions() {
        let mut e = engine();
        let pos = Position::with_sheet("Sheet1", 5, 3);
        assert_eq!(
            e.parse("=ROW()", Some(pos.clone()), false).unwrap(),
            Value::Number(5.0)
        );
        assert_eq!(
            e.parse("=COLUMN()", Some(pos), false).unwrap(),
            Value::Number(3.0)
        );
    }

    #[test]
    fn test_unknown_function_strict_and_lenient() {
        let mut strict = engine();
        assert!(matches!(
            strict.parse("=NOPE(1)", None, false),
            Err(FormulaError::NotImplemented(name)) if name == "NOPE"
        ));

        let mut lenient = engine().lenient(true);
        assert_eq!(
            lenient.parse("=NOPE(1)+5", None, false).unwrap(),
            Value::Number(5.0)
        );
        assert_eq!(lenient.missing_functions(), ["NOPE".to_string()]);
    }

    #[test]
    fn test_xlfn_prefix_and_case() {
        let mut e = engine();
        assert_eq!(
            e.parse("=_xlfn.sum(1,2)", None, false).unwrap(),
            Value::Number(3.0)
        );
    }

    #[test]
    fn test_custom_function_shadows_builtin() {
        let mut e = engine();
        e.set_function("SUM", |_args| Ok(Value::Number(42.0)));
        assert_eq!(e.parse("=SUM(1,2)", None, false).unwrap(), Value::Number(42.0));
    }

    #[test]
    fn test_custom_context_function() {
        let mut e = engine();
        e.set_context_function("WHEREAMI", |position, _args| {
            Ok(Value::Number(position.map_or(0, |p| p.row) as f64))
        });
        let pos = Position::new(9, 1);
        assert_eq!(
            e.parse("=WHEREAMI()", Some(pos), false).unwrap(),
            Value::Number(9.0)
        );
    }

    #[test]
    fn test_async_function_requires_async_parse() {
        let mut e = engine();
        e.set_async_function("FETCH", |_args| Box::pin(async { Ok(Value::Number(1.0)) }));
        assert!(e.parse("=FETCH()", None, false).is_err());
    }

    #[test]
    fn test_empty_input_is_hard_error() {
        let mut e = engine();
        assert!(matches!(
            e.parse("", None, false),
            Err(FormulaError::EmptyInput)
        ));
    }

    #[test]
    fn test_negative_zero_normalizes() {
        let mut e = engine();
        let result = e.parse("=-1*0", None, false).unwrap();
        match result {
            Value::Number(n) => assert!(n == 0.0 && n.is_sign_positive()),
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_function_error_becomes_value() {
        let mut e = engine();
        assert_eq!(
            e.parse("=ISERROR(SQRT(-1))", None, false).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            e.parse("=SQRT(-1)", None, false).unwrap(),
            Value::Error(ExcelError::Num)
        );
    }
}
