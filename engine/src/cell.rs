//! FILENAME: engine/src/cell.rs
//! PURPOSE: A single spreadsheet cell: either a literal value or a
//! formula's AST root.
//! CONTEXT: `Cell` never holds a pointer to the `Sheet` that contains
//! it; evaluation takes the sheet in as a `&dyn Resolver` argument.

use parser::{parse_formula, Expr, ParseError, Resolver, Value};

/// A single cell's contents.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Literal(Value),
    Formula(Expr),
}

impl Cell {
    /// Builds a cell from raw input text per the construction rules:
    /// empty text is a (literal, empty-string) cell; a leading `=`
    /// invokes the formula parser; anything else that parses as a
    /// full finite `f64` becomes a number literal, otherwise a text
    /// literal holding the raw string verbatim.
    ///
    /// Callers that need to reject empty input before construction
    /// (the sheet's `set_cell`) do that check themselves; this
    /// constructor documents the unconditional contract.
    pub fn from_raw(s: &str) -> Result<Cell, ParseError> {
        if s.is_empty() {
            return Ok(Cell::Literal(Value::Text(String::new())));
        }
        if s.starts_with('=') {
            let expr = parse_formula(s)?;
            return Ok(Cell::Formula(expr));
        }
        match s.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Cell::Literal(Value::Number(n))),
            _ => Ok(Cell::Literal(Value::Text(s.to_string()))),
        }
    }

    /// Resolves this cell to a value, threading the shared cycle
    /// counter through any nested reference resolution.
    pub fn evaluate(&self, resolver: &dyn Resolver, counter: &mut u32) -> Value {
        match self {
            Cell::Literal(v) => v.clone(),
            Cell::Formula(expr) => expr.evaluate(resolver, counter),
        }
    }

    /// Produces an independent clone with reference targets shifted by
    /// `(dx, dy)` on unpinned axes. Literals are unaffected.
    pub fn clone_shifted(&self, dx: i64, dy: i64) -> Cell {
        match self {
            Cell::Literal(v) => Cell::Literal(v.clone()),
            Cell::Formula(expr) => Cell::Formula(expr.clone_shifted(dx, dy)),
        }
    }

    /// Renders the cell back to the textual form `from_raw` would
    /// accept to reconstruct it: formulas render with a leading `=`,
    /// number literals in default decimal form, text literals as the
    /// raw characters (not quoted — only formula-internal `TextLit`
    /// nodes use the quoted/escaped form).
    pub fn render(&self) -> String {
        match self {
            Cell::Literal(Value::Empty) => String::new(),
            Cell::Literal(Value::Number(n)) => format!("{}", n),
            Cell::Literal(Value::Text(s)) => s.clone(),
            Cell::Formula(expr) => expr.render(true),
        }
    }
}
