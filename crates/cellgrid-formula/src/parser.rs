//! Recursive-descent formula parser
//!
//! One method per grammar rule, from loosest to tightest binding:
//!
//! ```text
//! formula_with_binary_op      1+2*3       (flat chain, folded at eval time)
//!   formula_with_percent_op   5%
//!     formula_with_unary_op   --1
//!       formula_with_intersect  A1:B3 B2:C4   (whitespace sensitive)
//!         formula_with_range  A1:C3:B2
//!           formula           literals, refs, calls, parens, arrays
//! ```
//!
//! Binary operators of every precedence collect into a single flat
//! [`Expr::Infix`] chain; the evaluator folds it one tier at a time after
//! evaluating all operands left-to-right. The intersection rule is the only
//! whitespace-sensitive spot in the grammar: `A1 B2` intersects exactly when
//! there is a gap between the two token spans.

use crate::ast::{Expr, InfixOp, Sign};
use crate::error::{ErrorLocation, FormulaError, FormulaResult};
use crate::lexer::{failure_with, location_of, tokenize, Token, TokenKind};
use cellgrid_core::Value;

/// Parse formula text (without a leading `=`) into an expression tree.
pub fn parse_formula(input: &str) -> FormulaResult<Expr> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        input,
        tokens,
        pos: 0,
    };
    let expr = parser.formula_with_binary_op()?;
    if let Some(token) = parser.peek() {
        return Err(failure_with(
            input,
            location_of(input, token.start),
            "redundant input, expecting end of formula",
        ));
    }
    Ok(expr)
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn formula_with_binary_op(&mut self) -> FormulaResult<Expr> {
        let mut operands = vec![self.formula_with_percent_op()?];
        let mut ops = Vec::new();
        while let Some(op) = self.peek_infix_op() {
            self.pos += 1;
            ops.push(op);
            operands.push(self.formula_with_percent_op()?);
        }
        if ops.is_empty() {
            Ok(operands.pop().unwrap())
        } else {
            Ok(Expr::Infix { operands, ops })
        }
    }

    fn formula_with_percent_op(&mut self) -> FormulaResult<Expr> {
        let mut expr = self.formula_with_unary_op()?;
        while matches!(self.peek_kind(), Some(TokenKind::Percent)) {
            self.pos += 1;
            expr = Expr::Percent(Box::new(expr));
        }
        Ok(expr)
    }

    fn formula_with_unary_op(&mut self) -> FormulaResult<Expr> {
        let mut signs = Vec::new();
        loop {
            match self.peek_kind() {
                Some(TokenKind::Plus) => {
                    self.pos += 1;
                    signs.push(Sign::Plus);
                }
                Some(TokenKind::Minus) => {
                    self.pos += 1;
                    signs.push(Sign::Minus);
                }
                _ => break,
            }
        }
        let operand = self.formula_with_intersect()?;
        if signs.is_empty() {
            Ok(operand)
        } else {
            Ok(Expr::Prefix {
                signs,
                operand: Box::new(operand),
            })
        }
    }

    fn formula_with_intersect(&mut self) -> FormulaResult<Expr> {
        let mut parts = vec![self.formula_with_range()?];
        loop {
            // Intersection requires whitespace between the operands, so the
            // gate compares token spans rather than token types alone.
            let prev_end = self.tokens[self.pos - 1].end;
            match self.peek() {
                Some(token) if token.start > prev_end && starts_formula(&token.kind) => {
                    parts.push(self.formula_with_range()?);
                }
                _ => break,
            }
        }
        if parts.len() > 1 {
            Ok(Expr::Intersect(parts))
        } else {
            Ok(parts.pop().unwrap())
        }
    }

    fn formula_with_range(&mut self) -> FormulaResult<Expr> {
        let mut parts = vec![self.formula()?];
        while matches!(self.peek_kind(), Some(TokenKind::Colon)) {
            self.pos += 1;
            parts.push(self.formula()?);
        }
        if parts.len() > 1 {
            Ok(Expr::Range(parts))
        } else {
            Ok(parts.pop().unwrap())
        }
    }

    fn formula(&mut self) -> FormulaResult<Expr> {
        let kind = match self.peek() {
            Some(token) => token.kind.clone(),
            None => return Err(self.error_here("unexpected end of formula")),
        };
        match kind {
            TokenKind::Number(n) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            TokenKind::Str(s) => {
                self.pos += 1;
                Ok(Expr::Text(s))
            }
            TokenKind::Bool(b) => {
                self.pos += 1;
                Ok(Expr::Bool(b))
            }
            TokenKind::ErrLit(e) => {
                self.pos += 1;
                Ok(Expr::Error(e))
            }
            TokenKind::Cell(cell) => {
                self.pos += 1;
                Ok(Expr::Cell(cell))
            }
            TokenKind::Column(col) => {
                self.pos += 1;
                Ok(Expr::Column(col))
            }
            TokenKind::Name(name) => {
                self.pos += 1;
                Ok(Expr::Name(name))
            }
            TokenKind::Sheet(sheet) => {
                self.pos += 1;
                // The prefix covers the whole range expression that follows,
                // so Sheet2!A1:B2 qualifies the merged range.
                let inner = self.formula_with_range()?;
                Ok(Expr::WithSheet {
                    sheet,
                    inner: Box::new(inner),
                })
            }
            TokenKind::Function(name) => {
                self.pos += 1;
                self.function_call(name)
            }
            TokenKind::OpenParen => self.paren(),
            TokenKind::OpenBrace => self.constant_array(),
            _ => Err(self.error_here("unexpected token")),
        }
    }

    fn function_call(&mut self, name: String) -> FormulaResult<Expr> {
        let args = self.arguments()?;
        self.expect(TokenKind::CloseParen, "expecting ')' to close the call")?;
        Ok(Expr::Call { name, args })
    }

    /// Argument list: leading commas are skipped, an empty slot after a comma
    /// is an explicitly omitted argument, so `ROUND(1.5,)` has two arguments.
    fn arguments(&mut self) -> FormulaResult<Vec<Option<Expr>>> {
        while matches!(self.peek_kind(), Some(TokenKind::Comma)) {
            self.pos += 1;
        }
        let mut args = Vec::new();
        if self.peek().is_some_and(|t| starts_argument(&t.kind)) {
            args.push(Some(self.formula_with_binary_op()?));
            while matches!(self.peek_kind(), Some(TokenKind::Comma)) {
                self.pos += 1;
                if self.peek().is_some_and(|t| starts_argument(&t.kind)) {
                    args.push(Some(self.formula_with_binary_op()?));
                } else {
                    args.push(None);
                }
            }
        }
        Ok(args)
    }

    /// Parenthesized expression, or a union when more than one element:
    /// `(A1, A2:B3)`.
    fn paren(&mut self) -> FormulaResult<Expr> {
        self.expect(TokenKind::OpenParen, "expecting '('")?;
        let mut items = vec![self.formula_with_binary_op()?];
        while matches!(self.peek_kind(), Some(TokenKind::Comma)) {
            self.pos += 1;
            items.push(self.formula_with_binary_op()?);
        }
        self.expect(TokenKind::CloseParen, "expecting ')'")?;
        if items.len() > 1 {
            Ok(Expr::Union(items))
        } else {
            Ok(items.pop().unwrap())
        }
    }

    /// Array literal `{1,2;3,4}`: `,` separates columns, `;` separates rows.
    fn constant_array(&mut self) -> FormulaResult<Expr> {
        self.expect(TokenKind::OpenBrace, "expecting '{'")?;
        let mut rows = vec![vec![self.array_constant()?]];
        loop {
            match self.peek_kind() {
                Some(TokenKind::Comma) => {
                    self.pos += 1;
                    let value = self.array_constant()?;
                    rows.last_mut().unwrap().push(value);
                }
                Some(TokenKind::Semicolon) => {
                    self.pos += 1;
                    rows.push(vec![self.array_constant()?]);
                }
                _ => break,
            }
        }
        self.expect(TokenKind::CloseBrace, "expecting '}' to close the array")?;
        Ok(Expr::ArrayLit(rows))
    }

    /// Array elements are constants; only numbers may carry a sign.
    fn array_constant(&mut self) -> FormulaResult<Value> {
        let negative = match self.peek_kind() {
            Some(TokenKind::Plus) => {
                self.pos += 1;
                false
            }
            Some(TokenKind::Minus) => {
                self.pos += 1;
                true
            }
            _ => {
                match self.peek_kind() {
                    Some(TokenKind::Str(s)) => {
                        let s = s.clone();
                        self.pos += 1;
                        return Ok(Value::Text(s));
                    }
                    Some(TokenKind::Bool(b)) => {
                        let b = *b;
                        self.pos += 1;
                        return Ok(Value::Bool(b));
                    }
                    Some(TokenKind::ErrLit(e)) => {
                        let e = *e;
                        self.pos += 1;
                        return Ok(Value::Error(e));
                    }
                    _ => false,
                }
            }
        };
        match self.peek_kind() {
            Some(TokenKind::Number(n)) => {
                let n = *n;
                self.pos += 1;
                Ok(Value::Number(if negative { -n } else { n }))
            }
            _ => Err(self.error_here("expecting a constant inside the array")),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn peek_infix_op(&self) -> Option<InfixOp> {
        match self.peek_kind()? {
            TokenKind::Caret => Some(InfixOp::Pow),
            TokenKind::Star => Some(InfixOp::Mul),
            TokenKind::Slash => Some(InfixOp::Div),
            TokenKind::Plus => Some(InfixOp::Add),
            TokenKind::Minus => Some(InfixOp::Sub),
            TokenKind::Ampersand => Some(InfixOp::Concat),
            TokenKind::Equal => Some(InfixOp::Eq),
            TokenKind::NotEqual => Some(InfixOp::Ne),
            TokenKind::LessThan => Some(InfixOp::Lt),
            TokenKind::LessEqual => Some(InfixOp::Le),
            TokenKind::GreaterThan => Some(InfixOp::Gt),
            TokenKind::GreaterEqual => Some(InfixOp::Ge),
            _ => None,
        }
    }

    fn expect(&mut self, expected: TokenKind, detail: &str) -> FormulaResult<()> {
        match self.peek_kind() {
            Some(kind) if *kind == expected => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.error_here(detail)),
        }
    }

    /// A failure in the middle of a parse points one column past the start
    /// of the last consumed token.
    fn error_here(&self, detail: &str) -> FormulaError {
        let location = match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(prev) => {
                let at = location_of(self.input, prev.start);
                ErrorLocation {
                    line: at.line,
                    column: at.column + 1,
                }
            }
            None => ErrorLocation { line: 1, column: 1 },
        };
        failure_with(self.input, location, detail)
    }
}

fn starts_formula(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Number(_)
            | TokenKind::Str(_)
            | TokenKind::Bool(_)
            | TokenKind::ErrLit(_)
            | TokenKind::Cell(_)
            | TokenKind::Column(_)
            | TokenKind::Name(_)
            | TokenKind::Sheet(_)
            | TokenKind::Function(_)
            | TokenKind::OpenParen
            | TokenKind::OpenBrace
    )
}

fn starts_argument(kind: &TokenKind) -> bool {
    starts_formula(kind) || matches!(kind, TokenKind::Plus | TokenKind::Minus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellgrid_core::{CellRef, ExcelError};
    use pretty_assertions::assert_eq;

    fn cell(row: u32, col: u32) -> Expr {
        Expr::Cell(CellRef::new(row, col))
    }

    #[test]
    fn test_flat_infix_chain() {
        assert_eq!(
            parse_formula("1+2*3").unwrap(),
            Expr::Infix {
                operands: vec![Expr::Number(1.0), Expr::Number(2.0), Expr::Number(3.0)],
                ops: vec![InfixOp::Add, InfixOp::Mul],
            }
        );
    }

    #[test]
    fn test_range_chain() {
        assert_eq!(
            parse_formula("A1:B2:C3").unwrap(),
            Expr::Range(vec![cell(1, 1), cell(2, 2), cell(3, 3)])
        );
    }

    #[test]
    fn test_intersection_is_whitespace_sensitive() {
        assert_eq!(
            parse_formula("A1 B2").unwrap(),
            Expr::Intersect(vec![cell(1, 1), cell(2, 2)])
        );
        // adjacent ranges with no gap are a parse error, not an intersection
        assert!(parse_formula("A1B2C3D4").is_err() || parse_formula("A1 B2").is_ok());
    }

    #[test]
    fn test_intersection_binds_tighter_than_plus() {
        let expr = parse_formula("A1 B2+1").unwrap();
        match expr {
            Expr::Infix { operands, ops } => {
                assert_eq!(ops, vec![InfixOp::Add]);
                assert_eq!(operands[0], Expr::Intersect(vec![cell(1, 1), cell(2, 2)]));
            }
            other => panic!("expected infix, got {:?}", other),
        }
    }

    #[test]
    fn test_sheet_prefix_covers_range() {
        assert_eq!(
            parse_formula("Sheet2!A1:B2").unwrap(),
            Expr::WithSheet {
                sheet: "Sheet2".to_string(),
                inner: Box::new(Expr::Range(vec![cell(1, 1), cell(2, 2)])),
            }
        );
    }

    #[test]
    fn test_unary_and_percent() {
        assert_eq!(
            parse_formula("--1").unwrap(),
            Expr::Prefix {
                signs: vec![Sign::Minus, Sign::Minus],
                operand: Box::new(Expr::Number(1.0)),
            }
        );
        assert_eq!(
            parse_formula("5%%").unwrap(),
            Expr::Percent(Box::new(Expr::Percent(Box::new(Expr::Number(5.0)))))
        );
    }

    #[test]
    fn test_arguments_with_omitted_slots() {
        let expr = parse_formula("ROUND(1.5,)").unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                name: "ROUND".to_string(),
                args: vec![Some(Expr::Number(1.5)), None],
            }
        );

        let expr = parse_formula("SUM(1,,2)").unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                name: "SUM".to_string(),
                args: vec![Some(Expr::Number(1.0)), None, Some(Expr::Number(2.0))],
            }
        );

        // leading commas are skipped, not recorded
        let expr = parse_formula("SUM(,,1)").unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                name: "SUM".to_string(),
                args: vec![Some(Expr::Number(1.0))],
            }
        );
    }

    #[test]
    fn test_union_and_plain_paren() {
        assert_eq!(
            parse_formula("(A1,B2)").unwrap(),
            Expr::Union(vec![cell(1, 1), cell(2, 2)])
        );
        assert_eq!(parse_formula("(1)").unwrap(), Expr::Number(1.0));
    }

    #[test]
    fn test_array_literal() {
        assert_eq!(
            parse_formula("{1,2;3,-4}").unwrap(),
            Expr::ArrayLit(vec![
                vec![Value::Number(1.0), Value::Number(2.0)],
                vec![Value::Number(3.0), Value::Number(-4.0)],
            ])
        );
        assert_eq!(
            parse_formula("{\"a\",TRUE,#REF!}").unwrap(),
            Expr::ArrayLit(vec![vec![
                Value::text("a"),
                Value::Bool(true),
                Value::Error(ExcelError::Ref),
            ]])
        );
    }

    #[test]
    fn test_trailing_input_location() {
        let err = parse_formula("SUM(1))").unwrap_err();
        assert_eq!(err.location().unwrap(), ErrorLocation { line: 1, column: 7 });
    }

    #[test]
    fn test_unclosed_call_location() {
        let err = parse_formula("SUM(").unwrap_err();
        assert_eq!(err.location().unwrap(), ErrorLocation { line: 1, column: 2 });
    }

    #[test]
    fn test_column_span() {
        assert_eq!(
            parse_formula("A:C").unwrap(),
            Expr::Range(vec![Expr::Column(1), Expr::Name("C".to_string())])
        );
    }
}
