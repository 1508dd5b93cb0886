//! Dependency extraction
//!
//! [`DepParser`] walks a formula with the same grammar and reference algebra
//! as the engine, but instead of computing a result it records every cell and
//! range the formula reads. Cells and ranges evaluate to zero placeholders,
//! functions are never dispatched, and no data source is consulted, so
//! extraction is safe to run before any data exists.

use crate::algebra::{self, Extracted, Operand, Resolver};
use crate::error::FormulaResult;
use crate::evaluator::{self, EvalContext, RawArg};
use crate::functions::FunctionContext;
use crate::parser::parse_formula;
use cellgrid_core::{Position, Reference, Value};

/// Callback resolving a defined name to a reference during extraction.
pub type VariableResolver = dyn Fn(&str, Option<&Position>) -> Option<Reference>;

/// Collects the references a formula depends on, in first-read order.
pub struct DepParser<'a> {
    on_variable: Option<&'a VariableResolver>,
    position: Option<Position>,
    data: Vec<Reference>,
}

impl Default for DepParser<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> DepParser<'a> {
    pub fn new() -> Self {
        Self {
            on_variable: None,
            position: None,
            data: Vec::new(),
        }
    }

    /// Resolve defined names through `f`; unresolved names yield `#NAME?`
    /// placeholders and no dependency.
    pub fn with_variables(f: &'a VariableResolver) -> Self {
        Self {
            on_variable: Some(f),
            position: None,
            data: Vec::new(),
        }
    }

    /// Extract the references `input` reads, deduplicated, in first-read
    /// order. With `ignore_errors` a malformed formula yields the references
    /// found before the failure instead of an error.
    pub fn parse(
        &mut self,
        input: &str,
        position: Option<Position>,
        ignore_errors: bool,
    ) -> FormulaResult<Vec<Reference>> {
        self.position = position;
        self.data.clear();
        let result = self.walk(input);
        let data = std::mem::take(&mut self.data);
        match result {
            Ok(()) => Ok(data),
            Err(_) if ignore_errors => Ok(data),
            Err(e) => Err(e),
        }
    }

    fn walk(&mut self, input: &str) -> FormulaResult<()> {
        let text = input.strip_prefix('=').unwrap_or(input);
        let expr = parse_formula(text)?;
        let operand = evaluator::evaluate(self, &expr)?;
        // a formula that IS a reference depends on it even though nothing
        // retrieved it
        self.register_operand(&operand);
        Ok(())
    }

    fn register(&mut self, reference: &Reference) {
        let mut reference = reference.clone();
        if reference.sheet().is_none() {
            if let Some(sheet) = self.position.as_ref().and_then(|p| p.sheet.clone()) {
                reference.set_sheet(sheet);
            }
        }
        if !self.data.contains(&reference) {
            log::trace!("registering dependency {reference:?}");
            self.data.push(reference);
        }
    }

    fn register_operand(&mut self, operand: &Operand) {
        match operand {
            Operand::Reference(reference) => self.register(reference),
            Operand::Collection(collection) => {
                let refs: Vec<Reference> = collection.references().cloned().collect();
                for reference in &refs {
                    self.register(reference);
                }
            }
            Operand::Value(_) => {}
        }
    }
}

impl Resolver for DepParser<'_> {
    fn retrieve_reference(&mut self, reference: &Reference) -> FormulaResult<Value> {
        self.register(reference);
        match reference {
            Reference::Cell(_) => Ok(Value::Number(0.0)),
            _ => Ok(Value::Array(vec![vec![Value::Number(0.0)]])),
        }
    }
}

impl EvalContext for DepParser<'_> {
    fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    fn resolve_name(&mut self, name: &str) -> FormulaResult<Operand> {
        let resolved = self
            .on_variable
            .and_then(|f| f(name, self.position.as_ref()));
        match resolved {
            Some(reference) => {
                self.register(&reference);
                Ok(Operand::Reference(reference))
            }
            None => Ok(Operand::Value(Value::Error(cellgrid_core::ExcelError::Name))),
        }
    }

    fn invoke_function(&mut self, _name: &str, args: Vec<RawArg>) -> FormulaResult<Operand> {
        // arguments may still hold unretrieved references
        for arg in &args {
            if let RawArg::Operand(operand) = arg {
                self.register_operand(operand);
            }
        }
        Ok(Operand::Value(Value::Number(0.0)))
    }
}

impl FunctionContext for DepParser<'_> {
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
    use cellgrid_core::{CellRef, Coord, RangeRef};
    use pretty_assertions::assert_eq;

    fn cell(row: u32, col: u32) -> Reference {
        Reference::Cell(CellRef::new(row, col))
    }

    fn range(r1: u32, c1: u32, r2: u32, c2: u32) -> Reference {
        Reference::Range(RangeRef::new(Coord::new(r1, c1), Coord::new(r2, c2)))
    }

    #[test]
    fn test_bare_reference_registers() {
        let mut p = DepParser::new();
        assert_eq!(p.parse("=A1", None, false).unwrap(), vec![cell(1, 1)]);
    }

    #[test]
    fn test_function_arguments_register() {
        let mut p = DepParser::new();
        assert_eq!(
            p.parse("=SUM(A1:B2, C3)", None, false).unwrap(),
            vec![range(1, 1, 2, 2), cell(3, 3)]
        );
    }

    #[test]
    fn test_range_of_ranges_collapses_to_one() {
        let mut p = DepParser::new();
        // the reference algebra folds this before anything registers
        assert_eq!(
            p.parse("=A1:B1:A1", None, false).unwrap(),
            vec![range(1, 1, 1, 2)]
        );
    }

    #[test]
    fn test_operators_register_both_sides() {
        let mut p = DepParser::new();
        // higher-precedence operands resolve first
        assert_eq!(
            p.parse("=A1+B2*2", None, false).unwrap(),
            vec![cell(2, 2), cell(1, 1)]
        );
    }

    #[test]
    fn test_duplicates_collapse() {
        let mut p = DepParser::new();
        assert_eq!(
            p.parse("=A1+A1+A1", None, false).unwrap(),
            vec![cell(1, 1)]
        );
    }

    #[test]
    fn test_position_supplies_sheet() {
        let mut p = DepParser::new();
        let pos = Position::with_sheet("Data", 1, 1);
        let deps = p.parse("=A1+Other!B2", Some(pos), false).unwrap();
        let mut expected_a1 = CellRef::new(1, 1);
        expected_a1.sheet = Some("Data".to_string());
        let mut expected_b2 = CellRef::new(2, 2);
        expected_b2.sheet = Some("Other".to_string());
        assert_eq!(
            deps,
            vec![
                Reference::Cell(expected_a1),
                Reference::Cell(expected_b2)
            ]
        );
    }

    #[test]
    fn test_variables_resolve_through_callback() {
        let resolve: &VariableResolver = &|name, _pos| match name {
            "rates" => Some(range(1, 1, 10, 1)),
            _ => None,
        };
        let mut p = DepParser::with_variables(resolve);
        assert_eq!(
            p.parse("=SUM(rates)", None, false).unwrap(),
            vec![range(1, 1, 10, 1)]
        );
        // unresolved names yield no dependency and no failure
        assert_eq!(p.parse("=mystery+1", None, false).unwrap(), vec![]);
    }

    #[test]
    fn test_union_registers_every_member() {
        let mut p = DepParser::new();
        assert_eq!(
            p.parse("=SUM((A1,B2:C3))", None, false).unwrap(),
            vec![cell(1, 1), range(2, 2, 3, 3)]
        );
    }

    #[test]
    fn test_ignore_errors_swallows_failures() {
        let mut p = DepParser::new();
        assert!(p.parse("=A1+", None, false).is_err());
        assert_eq!(p.parse("=A1+", None, true).unwrap(), vec![]);
        // state resets between calls either way
        assert_eq!(p.parse("=B2", None, false).unwrap(), vec![cell(2, 2)]);
    }
}
