//! FILENAME: parser/src/ast.rs
//! PURPOSE: The formula expression AST: literals, references, unary
//! negation, binary arithmetic, and binary comparisons.
//! CONTEXT: Every node supports three operations — `evaluate`,
//! `clone_shifted`, and `render` — per the formula subsystem's contract.
//! Evaluation never holds a pointer back to a sheet; it takes a
//! `&dyn Resolver` argument instead, so the AST has no knowledge of
//! whatever owns cells.

use crate::reference::Reference;
use crate::value::Value;

/// The seam between a `Ref` node and whatever owns cells. A `Sheet`
/// implementation elsewhere in the workspace implements this trait:
/// it increments `counter`, checks the cycle bound, looks up `pos`,
/// and (if found) delegates to that cell's own `evaluate`.
pub trait Resolver {
    fn resolve(&self, pos: crate::position::Position, counter: &mut u32) -> Value;
}

/// A parsed formula expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    NumLit(f64),
    TextLit(String),
    Ref(Reference),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Ge(Box<Expr>, Box<Expr>),
}

#[derive(Clone, Copy, PartialEq)]
enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Expr {
    /// Evaluates this node, resolving references through `resolver` and
    /// threading the shared cycle counter down through every child call.
    pub fn evaluate(&self, resolver: &dyn Resolver, counter: &mut u32) -> Value {
        match self {
            Expr::NumLit(n) => Value::Number(*n),
            Expr::TextLit(s) => Value::Text(s.clone()),
            Expr::Ref(r) => resolver.resolve(r.target, counter),
            Expr::Neg(x) => match x.evaluate(resolver, counter) {
                Value::Number(n) => Value::Number(-n),
                _ => Value::Empty,
            },
            Expr::Add(l, r) => eval_add(l, r, resolver, counter),
            Expr::Sub(l, r) => eval_numeric(l, r, resolver, counter, |a, b| a - b),
            Expr::Mul(l, r) => eval_numeric(l, r, resolver, counter, |a, b| a * b),
            Expr::Div(l, r) => eval_div(l, r, resolver, counter),
            Expr::Pow(l, r) => eval_numeric(l, r, resolver, counter, f64::powf),
            Expr::Eq(l, r) => eval_cmp(l, r, resolver, counter, Cmp::Eq),
            Expr::Ne(l, r) => eval_cmp(l, r, resolver, counter, Cmp::Ne),
            Expr::Lt(l, r) => eval_cmp(l, r, resolver, counter, Cmp::Lt),
            Expr::Le(l, r) => eval_cmp(l, r, resolver, counter, Cmp::Le),
            Expr::Gt(l, r) => eval_cmp(l, r, resolver, counter, Cmp::Gt),
            Expr::Ge(l, r) => eval_cmp(l, r, resolver, counter, Cmp::Ge),
        }
    }

    /// Produces a structurally identical, fully independent clone in
    /// which only `Ref` targets change: shifted by `(dx, dy)` on axes
    /// that are not pinned by `$`. Used by `copy_rect`.
    pub fn clone_shifted(&self, dx: i64, dy: i64) -> Expr {
        match self {
            Expr::NumLit(n) => Expr::NumLit(*n),
            Expr::TextLit(s) => Expr::TextLit(s.clone()),
            Expr::Ref(r) => Expr::Ref(r.shifted(dx, dy)),
            Expr::Neg(x) => Expr::Neg(Box::new(x.clone_shifted(dx, dy))),
            Expr::Add(l, r) => Expr::Add(Box::new(l.clone_shifted(dx, dy)), Box::new(r.clone_shifted(dx, dy))),
            Expr::Sub(l, r) => Expr::Sub(Box::new(l.clone_shifted(dx, dy)), Box::new(r.clone_shifted(dx, dy))),
            Expr::Mul(l, r) => Expr::Mul(Box::new(l.clone_shifted(dx, dy)), Box::new(r.clone_shifted(dx, dy))),
            Expr::Div(l, r) => Expr::Div(Box::new(l.clone_shifted(dx, dy)), Box::new(r.clone_shifted(dx, dy))),
            Expr::Pow(l, r) => Expr::Pow(Box::new(l.clone_shifted(dx, dy)), Box::new(r.clone_shifted(dx, dy))),
            Expr::Eq(l, r) => Expr::Eq(Box::new(l.clone_shifted(dx, dy)), Box::new(r.clone_shifted(dx, dy))),
            Expr::Ne(l, r) => Expr::Ne(Box::new(l.clone_shifted(dx, dy)), Box::new(r.clone_shifted(dx, dy))),
            Expr::Lt(l, r) => Expr::Lt(Box::new(l.clone_shifted(dx, dy)), Box::new(r.clone_shifted(dx, dy))),
            Expr::Le(l, r) => Expr::Le(Box::new(l.clone_shifted(dx, dy)), Box::new(r.clone_shifted(dx, dy))),
            Expr::Gt(l, r) => Expr::Gt(Box::new(l.clone_shifted(dx, dy)), Box::new(r.clone_shifted(dx, dy))),
            Expr::Ge(l, r) => Expr::Ge(Box::new(l.clone_shifted(dx, dy)), Box::new(r.clone_shifted(dx, dy))),
        }
    }

    /// Renders this node back to formula text. `top_level` controls the
    /// leading `=`. Binary operators always render fully parenthesized;
    /// precedence is encoded by grouping, not by operator priority.
    pub fn render(&self, top_level: bool) -> String {
        let mut out = String::new();
        if top_level {
            out.push('=');
        }
        self.render_inner(&mut out);
        out
    }

    fn render_inner(&self, out: &mut String) {
        match self {
            Expr::NumLit(n) => out.push_str(&format!("{}", n)),
            Expr::TextLit(s) => out.push_str(&render_text_literal(s)),
            Expr::Ref(r) => out.push_str(&r.render()),
            Expr::Neg(x) => {
                out.push('(');
                out.push('-');
                x.render_inner(out);
                out.push(')');
            }
            Expr::Add(l, r) => render_binary(out, l, "+", r),
            Expr::Sub(l, r) => render_binary(out, l, "-", r),
            Expr::Mul(l, r) => render_binary(out, l, "*", r),
            Expr::Div(l, r) => render_binary(out, l, "/", r),
            Expr::Pow(l, r) => render_binary(out, l, "^", r),
            Expr::Eq(l, r) => render_binary(out, l, "=", r),
            Expr::Ne(l, r) => render_binary(out, l, "<>", r),
            Expr::Lt(l, r) => render_binary(out, l, "<", r),
            Expr::Le(l, r) => render_binary(out, l, "<=", r),
            Expr::Gt(l, r) => render_binary(out, l, ">", r),
            Expr::Ge(l, r) => render_binary(out, l, ">=", r),
        }
    }
}

fn render_binary(out: &mut String, l: &Expr, op: &str, r: &Expr) {
    out.push('(');
    l.render_inner(out);
    out.push_str(op);
    r.render_inner(out);
    out.push(')');
}

/// Renders a text literal as a double-quoted string with embedded `"`
/// doubled, so it re-lexes as the same literal (see DESIGN.md).
fn render_text_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' {
            out.push('"');
            out.push('"');
        } else {
            out.push(c);
        }
    }
    out.push('"');
    out
}

fn eval_add(l: &Expr, r: &Expr, resolver: &dyn Resolver, counter: &mut u32) -> Value {
    let lv = l.evaluate(resolver, counter);
    let rv = r.evaluate(resolver, counter);
    match (&lv, &rv) {
        (Value::Empty, _) | (_, Value::Empty) => Value::Empty,
        (Value::Text(_), _) | (_, Value::Text(_)) => {
            let mut s = lv.as_concat_text().unwrap_or_default();
            s.push_str(&rv.as_concat_text().unwrap_or_default());
            Value::Text(s)
        }
        (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
    }
}

fn eval_numeric(
    l: &Expr,
    r: &Expr,
    resolver: &dyn Resolver,
    counter: &mut u32,
    op: impl Fn(f64, f64) -> f64,
) -> Value {
    let lv = l.evaluate(resolver, counter);
    let rv = r.evaluate(resolver, counter);
    match (lv, rv) {
        (Value::Number(a), Value::Number(b)) => Value::Number(op(a, b)),
        _ => Value::Empty,
    }
}

fn eval_div(l: &Expr, r: &Expr, resolver: &dyn Resolver, counter: &mut u32) -> Value {
    let lv = l.evaluate(resolver, counter);
    let rv = r.evaluate(resolver, counter);
    match (lv, rv) {
        (Value::Number(_), Value::Number(b)) if b == 0.0 => Value::Empty,
        (Value::Number(a), Value::Number(b)) => Value::Number(a / b),
        _ => Value::Empty,
    }
}

fn eval_cmp(l: &Expr, r: &Expr, resolver: &dyn Resolver, counter: &mut u32, cmp: Cmp) -> Value {
    let lv = l.evaluate(resolver, counter);
    let rv = r.evaluate(resolver, counter);
    let ordering = match (&lv, &rv) {
        (Value::Empty, _) | (_, Value::Empty) => return Value::Empty,
        (Value::Text(a), Value::Text(b)) => a.as_bytes().cmp(b.as_bytes()),
        (Value::Number(a), Value::Number(b)) => match a.partial_cmp(b) {
            Some(o) => o,
            None => return Value::Empty,
        },
        _ => return Value::Empty,
    };
    let truth = match cmp {
        Cmp::Eq => ordering.is_eq(),
        Cmp::Ne => !ordering.is_eq(),
        Cmp::Lt => ordering.is_lt(),
        Cmp::Le => ordering.is_le(),
        Cmp::Gt => ordering.is_gt(),
        Cmp::Ge => ordering.is_ge(),
    };
    Value::Number(if truth { 1.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    struct FixedResolver(std::collections::HashMap<Position, Value>);

    impl Resolver for FixedResolver {
        fn resolve(&self, pos: Position, counter: &mut u32) -> Value {
            *counter += 1;
            self.0.get(&pos).cloned().unwrap_or(Value::Empty)
        }
    }

    fn resolver() -> FixedResolver {
        let mut m = std::collections::HashMap::new();
        m.insert(Position::new(1, 1), Value::Number(10.0));
        m.insert(Position::new(1, 2), Value::Text("hi".to_string()));
        FixedResolver(m)
    }

    #[test]
    fn add_concatenates_when_either_side_is_text() {
        let expr = Expr::Add(
            Box::new(Expr::TextLit("x=".to_string())),
            Box::new(Expr::NumLit(5.0)),
        );
        let mut c = 0;
        assert_eq!(expr.evaluate(&resolver(), &mut c), Value::Text("x=5".to_string()));
    }

    #[test]
    fn div_by_zero_is_empty() {
        let expr = Expr::Div(Box::new(Expr::NumLit(1.0)), Box::new(Expr::NumLit(0.0)));
        let mut c = 0;
        assert_eq!(expr.evaluate(&resolver(), &mut c), Value::Empty);
    }

    #[test]
    fn mixed_type_arithmetic_is_empty() {
        let expr = Expr::Sub(
            Box::new(Expr::TextLit("a".to_string())),
            Box::new(Expr::NumLit(1.0)),
        );
        let mut c = 0;
        assert_eq!(expr.evaluate(&resolver(), &mut c), Value::Empty);
    }

    #[test]
    fn comparisons_absorb_empty() {
        let expr = Expr::Lt(Box::new(Expr::Ref(Reference::parse("Z9").unwrap())), Box::new(Expr::NumLit(1.0)));
        let mut c = 0;
        assert_eq!(expr.evaluate(&resolver(), &mut c), Value::Empty);
    }

    #[test]
    fn text_comparison_is_byte_lexicographic() {
        let expr = Expr::Lt(
            Box::new(Expr::TextLit("apple".to_string())),
            Box::new(Expr::TextLit("banana".to_string())),
        );
        let mut c = 0;
        assert_eq!(expr.evaluate(&resolver(), &mut c), Value::Number(1.0));
    }

    #[test]
    fn clone_shifted_only_moves_unfixed_axes() {
        let expr = Expr::Add(
            Box::new(Expr::Ref(Reference::parse("$A1").unwrap())),
            Box::new(Expr::Ref(Reference::parse("B$2").unwrap())),
        );
        let shifted = expr.clone_shifted(3, 5);
        match shifted {
            Expr::Add(l, r) => {
                match *l {
                    Expr::Ref(r) => assert_eq!(r.target, Position::new(1, 6)),
                    _ => panic!(),
                }
                match *r {
                    Expr::Ref(r) => assert_eq!(r.target, Position::new(5, 2)),
                    _ => panic!(),
                }
            }
            _ => panic!(),
        }
    }

    #[test]
    fn render_roundtrips_through_parser() {
        let expr = Expr::Add(
            Box::new(Expr::Neg(Box::new(Expr::Ref(Reference::parse("A1").unwrap())))),
            Box::new(Expr::TextLit("she said \"hi\"".to_string())),
        );
        let rendered = expr.render(true);
        let reparsed = crate::parser::parse_formula(&rendered).unwrap();
        let mut c = 0;
        assert_eq!(
            expr.evaluate(&resolver(), &mut c),
            reparsed.evaluate(&resolver(), &mut c)
        );
    }
}
