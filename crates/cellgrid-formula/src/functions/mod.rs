//! Built-in spreadsheet functions
//!
//! Functions come in three shapes:
//!
//! - `Plain`: works on normalized [`Argument`]s, returns a [`Value`]
//! - `Contextual`: normalized arguments plus the [`FunctionContext`]
//! - `Raw`: receives the grammar-level [`RawArg`]s unresolved; for
//!   functions that inspect references themselves (`ROW`, `INDEX`,
//!   `OFFSET`, `IF`, `SUMIF`)
//!
//! Implementations may fail by returning an [`ExcelError`] through `?`; the
//! invocation boundary converts that into an error *value*, so `=ISERROR(
//! SQRT(-1))` still sees `#NUM!` as data rather than an aborted parse.

pub mod criteria;
pub mod info;
pub mod logical;
pub mod math;
pub mod reference;
pub mod statistical;
pub mod text;

use crate::algebra::{coerce_number, Extracted, Operand};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::RawArg;
use ahash::AHashMap;
use cellgrid_core::{ExcelError, Position, Reference, Value};
use std::sync::OnceLock;

/// Context handed to function implementations that need more than their
/// argument values.
pub trait FunctionContext {
    /// The position of the formula being evaluated, if the caller gave one.
    fn position(&self) -> Option<&Position>;

    /// Resolve an operand down to its value.
    fn retrieve(&mut self, operand: Operand) -> FormulaResult<Extracted>;
}

/// A normalized function argument.
#[derive(Debug, Clone)]
pub struct Argument {
    pub value: Value,
    /// The raw operand was an array literal (not a range that happened to
    /// resolve to a grid).
    pub from_literal_array: bool,
    /// The slot was explicitly left empty, e.g. the second of `ROUND(1.5,)`.
    pub omitted: bool,
    /// Source reference, kept only for reference-preserving functions
    /// (the information family).
    pub reference: Option<Reference>,
    pub is_cell_ref: bool,
    pub is_range_ref: bool,
}

impl Argument {
    fn for_omitted(null_as_zero: bool) -> Self {
        Argument {
            value: if null_as_zero {
                Value::Number(0.0)
            } else {
                Value::Text(String::new())
            },
            from_literal_array: false,
            omitted: true,
            reference: None,
            is_cell_ref: false,
            is_range_ref: false,
        }
    }

    /// Scalar view, collapsing an array to its top-left element.
    fn scalar(&self) -> Value {
        self.value
            .first_element()
            .cloned()
            .unwrap_or(Value::Blank)
    }

    /// Coerce to a number with the operator rules.
    pub fn number(&self) -> Result<f64, ExcelError> {
        coerce_number(&self.value, self.from_literal_array)
    }

    /// Coerce to a whole number, truncating toward zero the way argument
    /// positions and lengths do.
    pub fn integer(&self) -> Result<i64, ExcelError> {
        Ok(self.number()?.trunc() as i64)
    }

    /// Coerce to text. Blank is the empty string.
    pub fn text(&self) -> Result<String, ExcelError> {
        match self.scalar() {
            Value::Error(e) => Err(e),
            Value::Blank => Ok(String::new()),
            other => Ok(other.to_string()),
        }
    }

    /// Coerce to a boolean: blank is false, numbers test nonzero, text must
    /// spell TRUE or FALSE.
    pub fn boolean(&self) -> Result<bool, ExcelError> {
        match self.scalar() {
            Value::Blank => Ok(false),
            Value::Number(n) => Ok(n != 0.0),
            Value::Bool(b) => Ok(b),
            Value::Text(s) => match s.to_uppercase().as_str() {
                "TRUE" => Ok(true),
                "FALSE" => Ok(false),
                _ => Err(ExcelError::Value),
            },
            Value::Error(e) => Err(e),
            Value::Array(_) => Err(ExcelError::Value),
        }
    }

    /// Numbers this argument contributes to an aggregate. Direct scalars
    /// coerce (so `SUM("3")` works and `SUM("abc")` is `#VALUE!`); values
    /// inside a range or array only count when they already are numbers.
    pub fn numeric_values(&self) -> Result<Vec<f64>, ExcelError> {
        match &self.value {
            Value::Array(rows) => {
                let mut out = Vec::new();
                for value in rows.iter().flatten() {
                    match value {
                        Value::Number(n) => out.push(*n),
                        Value::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
                Ok(out)
            }
            Value::Blank => Ok(Vec::new()),
            scalar => Ok(vec![coerce_number(scalar, false)?]),
        }
    }

    /// All scalar values the argument carries, flattened row-major.
    pub fn flat_values(&self) -> Vec<&Value> {
        match &self.value {
            Value::Array(rows) => rows.iter().flatten().collect(),
            scalar => vec![scalar],
        }
    }

    pub fn is_reference(&self) -> bool {
        self.is_cell_ref || self.is_range_ref
    }
}

/// Plain implementation: normalized arguments in, value out.
pub type PlainFn = fn(&[Argument]) -> FormulaResult<Value>;

/// Implementation that needs the evaluation context.
pub type ContextFn = fn(&mut dyn FunctionContext, &[Argument]) -> FormulaResult<Operand>;

/// Implementation that works on unresolved operands.
pub type RawFn = fn(&mut dyn FunctionContext, &[RawArg]) -> FormulaResult<Operand>;

pub enum Callable {
    Plain(PlainFn),
    Contextual(ContextFn),
    Raw(RawFn),
}

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    pub callable: Callable,
    /// Omitted arguments read as 0 rather than "" (the math, statistical,
    /// logical and reference families).
    pub null_as_zero: bool,
    /// Arguments keep their source reference (the information family).
    pub preserve_ref: bool,
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

/// The shared built-in registry, constructed once.
pub fn builtins() -> &'static FunctionRegistry {
    static REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();
    REGISTRY.get_or_init(FunctionRegistry::new)
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_math_functions();
        registry.register_statistical_functions();
        registry.register_logical_functions();
        registry.register_text_functions();
        registry.register_reference_functions();
        registry.register_info_functions();

        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    /// Registered function names, sorted.
    pub fn supported_functions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.values().map(|def| def.name).collect();
        names.sort_unstable();
        names
    }

    fn plain(&mut self, name: &'static str, min: usize, max: Option<usize>, f: PlainFn) {
        self.register(FunctionDef {
            name,
            min_args: min,
            max_args: max,
            callable: Callable::Plain(f),
            null_as_zero: true,
            preserve_ref: false,
        });
    }

    fn register_math_functions(&mut self) {
        self.plain("SUM", 1, None, math::fn_sum);
        self.plain("PRODUCT", 1, None, math::fn_product);
        self.plain("ABS", 1, Some(1), math::fn_abs);
        self.plain("INT", 1, Some(1), math::fn_int);
        self.plain("MOD", 2, Some(2), math::fn_mod);
        self.plain("ROUND", 2, Some(2), math::fn_round);
        self.plain("SIGN", 1, Some(1), math::fn_sign);
        self.plain("SQRT", 1, Some(1), math::fn_sqrt);
        self.plain("POWER", 2, Some(2), math::fn_power);
    }

    fn register_statistical_functions(&mut self) {
        self.plain("AVERAGE", 1, None, statistical::fn_average);
        self.plain("COUNT", 1, None, statistical::fn_count);
        self.plain("COUNTA", 1, None, statistical::fn_counta);
        self.plain("MAX", 1, None, statistical::fn_max);
        self.plain("MIN", 1, None, statistical::fn_min);

        // SUMIF walks its ranges itself
        self.register(FunctionDef {
            name: "SUMIF",
            min_args: 2,
            max_args: Some(3),
            callable: Callable::Raw(statistical::fn_sumif),
            null_as_zero: true,
            preserve_ref: false,
        });
    }

    fn register_logical_functions(&mut self) {
        self.register(FunctionDef {
            name: "IF",
            min_args: 1,
            max_args: Some(3),
            callable: Callable::Raw(logical::fn_if),
            null_as_zero: true,
            preserve_ref: false,
        });
        self.plain("AND", 1, None, logical::fn_and);
        self.plain("OR", 1, None, logical::fn_or);
        self.plain("NOT", 1, Some(1), logical::fn_not);
        self.plain("TRUE", 0, Some(0), logical::fn_true);
        self.plain("FALSE", 0, Some(0), logical::fn_false);
        self.plain("IFERROR", 2, Some(2), logical::fn_iferror);
    }

    fn register_text_functions(&mut self) {
        // text functions read omitted arguments as ""
        let mut text_fn = |name: &'static str, min: usize, max: Option<usize>, f: PlainFn| {
            self.register(FunctionDef {
                name,
                min_args: min,
                max_args: max,
                callable: Callable::Plain(f),
                null_as_zero: false,
                preserve_ref: false,
            });
        };
        text_fn("CONCATENATE", 1, None, text::fn_concatenate);
        text_fn("LEN", 1, Some(1), text::fn_len);
        text_fn("UPPER", 1, Some(1), text::fn_upper);
        text_fn("LOWER", 1, Some(1), text::fn_lower);
        text_fn("TRIM", 1, Some(1), text::fn_trim);
        text_fn("LEFT", 1, Some(2), text::fn_left);
        text_fn("RIGHT", 1, Some(2), text::fn_right);
        text_fn("MID", 3, Some(3), text::fn_mid);
    }

    fn register_reference_functions(&mut self) {
        let mut raw_fn = |name: &'static str, min: usize, max: Option<usize>, f: RawFn| {
            self.register(FunctionDef {
                name,
                min_args: min,
                max_args: max,
                callable: Callable::Raw(f),
                null_as_zero: true,
                preserve_ref: false,
            });
        };
        raw_fn("ROW", 0, Some(1), reference::fn_row);
        raw_fn("ROWS", 1, Some(1), reference::fn_rows);
        raw_fn("COLUMN", 0, Some(1), reference::fn_column);
        raw_fn("COLUMNS", 1, Some(1), reference::fn_columns);
        raw_fn("INDEX", 2, Some(3), reference::fn_index);
        raw_fn("OFFSET", 3, Some(5), reference::fn_offset);

        self.register(FunctionDef {
            name: "CHOOSE",
            min_args: 2,
            max_args: None,
            callable: Callable::Contextual(reference::fn_choose),
            null_as_zero: true,
            preserve_ref: false,
        });
        self.register(FunctionDef {
            name: "INDIRECT",
            min_args: 1,
            max_args: Some(1),
            callable: Callable::Contextual(reference::fn_indirect),
            null_as_zero: true,
            preserve_ref: false,
        });
    }

    fn register_info_functions(&mut self) {
        let mut info_fn = |name: &'static str, f: PlainFn| {
            self.register(FunctionDef {
                name,
                min_args: 1,
                max_args: Some(1),
                callable: Callable::Plain(f),
                null_as_zero: false,
                preserve_ref: true,
            });
        };
        info_fn("ISBLANK", info::fn_isblank);
        info_fn("ISERROR", info::fn_iserror);
        info_fn("ISNA", info::fn_isna);
        info_fn("ISNUMBER", info::fn_isnumber);
        info_fn("ISTEXT", info::fn_istext);
        info_fn("ISLOGICAL", info::fn_islogical);
        info_fn("ISREF", info::fn_isref);
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a registered function: check arity, normalize arguments per the
/// definition's flags, call the implementation.
pub fn dispatch(
    def: &FunctionDef,
    ctx: &mut dyn FunctionContext,
    raw_args: Vec<RawArg>,
) -> FormulaResult<Operand> {
    if raw_args.len() < def.min_args || def.max_args.is_some_and(|max| raw_args.len() > max) {
        return Err(FormulaError::Excel(ExcelError::Na));
    }
    match def.callable {
        Callable::Raw(f) => f(ctx, &raw_args),
        Callable::Plain(f) => {
            let args = normalize_args(ctx, def, raw_args)?;
            Ok(Operand::Value(f(&args)?))
        }
        Callable::Contextual(f) => {
            let args = normalize_args(ctx, def, raw_args)?;
            f(ctx, &args)
        }
    }
}

fn normalize_args(
    ctx: &mut dyn FunctionContext,
    def: &FunctionDef,
    raw_args: Vec<RawArg>,
) -> FormulaResult<Vec<Argument>> {
    normalize_value_args(ctx, def.null_as_zero, def.preserve_ref, raw_args)
}

/// Resolve raw arguments into value arguments. Custom functions use this
/// too, with their own omitted-slot policy.
pub(crate) fn normalize_value_args(
    ctx: &mut dyn FunctionContext,
    null_as_zero: bool,
    preserve_ref: bool,
    raw_args: Vec<RawArg>,
) -> FormulaResult<Vec<Argument>> {
    raw_args
        .into_iter()
        .map(|arg| match arg {
            RawArg::Omitted => Ok(Argument::for_omitted(null_as_zero)),
            RawArg::Operand(operand) => {
                let is_cell_ref = matches!(operand, Operand::Reference(Reference::Cell(_)));
                let is_range_ref = matches!(
                    operand,
                    Operand::Reference(
                        Reference::Range(_)
                            | Reference::WholeRow { .. }
                            | Reference::WholeCol { .. }
                    )
                );
                let reference = if preserve_ref {
                    operand.reference().cloned()
                } else {
                    None
                };
                let extracted = ctx.retrieve(operand)?;
                Ok(Argument {
                    value: extracted.value,
                    from_literal_array: extracted.from_literal_array,
                    omitted: false,
                    reference,
                    is_cell_ref,
                    is_range_ref,
                })
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    /// Build a plain scalar argument for implementation tests.
    pub fn arg(value: Value) -> Argument {
        let from_literal_array = matches!(value, Value::Array(_));
        Argument {
            value,
            from_literal_array,
            omitted: false,
            reference: None,
            is_cell_ref: false,
            is_range_ref: false,
        }
    }

    /// An argument carrying the values of a range.
    pub fn range_arg(rows: Vec<Vec<Value>>) -> Argument {
        Argument {
            value: Value::Array(rows),
            from_literal_array: false,
            omitted: false,
            reference: None,
            is_cell_ref: false,
            is_range_ref: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_registry_lookup_is_case_insensitive() {
        let registry = builtins();
        assert!(registry.get("sum").is_some());
        assert!(registry.get("SUM").is_some());
        assert!(registry.get("NOPE").is_none());
    }

    #[test]
    fn test_supported_functions_sorted() {
        let names = builtins().supported_functions();
        assert!(names.contains(&"SUM"));
        assert!(names.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_argument_coercions() {
        let a = test_util::arg(Value::text("2.5"));
        assert_eq!(a.number(), Ok(2.5));
        let a = test_util::arg(Value::Bool(true));
        assert_eq!(a.number(), Ok(1.0));
        assert_eq!(a.text(), Ok("TRUE".to_string()));
        assert_eq!(a.boolean(), Ok(true));
        let a = test_util::arg(Value::text("nope"));
        assert_eq!(a.number(), Err(ExcelError::Value));
    }

    #[test]
    fn test_numeric_values_skips_text_in_ranges() {
        let a = test_util::range_arg(vec![vec![
            Value::Number(1.0),
            Value::text("x"),
            Value::Bool(true),
            Value::Number(2.0),
        ]]);
        assert_eq!(a.numeric_values(), Ok(vec![1.0, 2.0]));

        // but a direct text scalar must coerce or fail
        let a = test_util::arg(Value::text("x"));
        assert_eq!(a.numeric_values(), Err(ExcelError::Value));
    }
}
