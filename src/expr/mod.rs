//! Expressions used by conditionals, visibility rules and calculated
//! variables.
//!
//! ```text
//! {IF session.hours >= 35 && student.funded}
//! <p data-show-if="invoice.total > 0">...</p>
//! {SUM(items.price)}   {CALC(hours * rate)}   {ROUND(total / 3, 2)}
//! ```

mod parser;

use serde_json::Value;

use crate::util::format_number;
use crate::variables::{Scope, Segment, as_number, display, is_truthy};

pub use parser::parse;

/// Function names accepted in `{NAME(...)}` calculated tokens.
pub const FUNCTIONS: &[&str] = &[
    "SUM", "AVERAGE", "AVG", "COUNT", "MIN", "MAX", "ROUND", "ABS", "CALC",
];

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("{function} expects {expected} argument(s), got {got}")]
    Arity {
        function: String,
        expected: &'static str,
        got: usize,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("'{0}' is not a number")]
    NotANumber(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    /// A variable path, with its source text kept for messages.
    Path(String, Vec<Segment>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

impl Expr {
    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary(op, Box::new(left), Box::new(right))
    }

    /// Evaluate against a scope.
    pub fn eval(&self, scope: &Scope<'_>) -> Result<Value, ExprError> {
        match self {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(number(*n)),
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Path(_, segments) => Ok(scope.lookup_segments(segments).unwrap_or(Value::Null)),
            Expr::Unary(UnaryOp::Not, inner) => Ok(Value::Bool(!is_truthy(&inner.eval(scope)?))),
            Expr::Unary(UnaryOp::Neg, inner) => {
                let value = inner.eval(scope)?;
                Ok(number(-arithmetic_operand(&value)?))
            }
            Expr::Binary(BinaryOp::Or, l, r) => {
                let left = l.eval(scope)?;
                if is_truthy(&left) {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(is_truthy(&r.eval(scope)?)))
            }
            Expr::Binary(BinaryOp::And, l, r) => {
                let left = l.eval(scope)?;
                if !is_truthy(&left) {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(is_truthy(&r.eval(scope)?)))
            }
            Expr::Binary(op, l, r) => {
                let left = l.eval(scope)?;
                let right = r.eval(scope)?;
                binary(*op, &left, &right)
            }
            Expr::Call(name, args) => call(name, args, scope),
        }
    }

    /// Evaluate and test for truth, as `{IF}` does.
    pub fn test(&self, scope: &Scope<'_>) -> Result<bool, ExprError> {
        Ok(is_truthy(&self.eval(scope)?))
    }
}

fn number(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Operand of arithmetic: null counts as zero, other non-numbers fail.
fn arithmetic_operand(value: &Value) -> Result<f64, ExprError> {
    if value.is_null() {
        return Ok(0.0);
    }
    as_number(value).ok_or_else(|| ExprError::NotANumber(display(value)))
}

fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (as_number(left), as_number(right)) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(display(left).cmp(&display(right))),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    use std::cmp::Ordering;

    let result = match op {
        BinaryOp::Eq => Value::Bool(compare(left, right) == Some(Ordering::Equal)),
        BinaryOp::Ne => Value::Bool(compare(left, right) != Some(Ordering::Equal)),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::Ge => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::Le => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Add => {
            let numeric = |v: &Value| v.is_null() || as_number(v).is_some();
            if numeric(left) && numeric(right) {
                number(arithmetic_operand(left)? + arithmetic_operand(right)?)
            } else {
                Value::String(format!("{}{}", display(left), display(right)))
            }
        }
        BinaryOp::Sub => number(arithmetic_operand(left)? - arithmetic_operand(right)?),
        BinaryOp::Mul => number(arithmetic_operand(left)? * arithmetic_operand(right)?),
        BinaryOp::Div | BinaryOp::Rem => {
            let divisor = arithmetic_operand(right)?;
            if divisor == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            let dividend = arithmetic_operand(left)?;
            if op == BinaryOp::Div {
                number(dividend / divisor)
            } else {
                number(dividend % divisor)
            }
        }
        BinaryOp::Or | BinaryOp::And => unreachable!("short-circuit operators are evaluated in eval"),
    };
    Ok(result)
}

/// Flatten aggregate arguments into their numeric values.
///
/// Arrays are expanded (one level deep per nesting), nulls and
/// non-numeric strings are skipped.
fn collect_numbers(values: &[Value], out: &mut Vec<f64>) {
    for value in values {
        match value {
            Value::Array(items) => collect_numbers(items, out),
            other => {
                if let Some(n) = as_number(other) {
                    out.push(n);
                }
            }
        }
    }
}

fn call(name: &str, args: &[Expr], scope: &Scope<'_>) -> Result<Value, ExprError> {
    let values = args
        .iter()
        .map(|a| a.eval(scope))
        .collect::<Result<Vec<_>, _>>()?;

    let arity = |expected: &'static str, ok: bool| {
        if ok {
            Ok(())
        } else {
            Err(ExprError::Arity {
                function: name.to_string(),
                expected,
                got: values.len(),
            })
        }
    };

    match name {
        "SUM" | "AVERAGE" | "AVG" | "MIN" | "MAX" => {
            arity("at least 1", !values.is_empty())?;
            let mut numbers = Vec::new();
            collect_numbers(&values, &mut numbers);
            let result = match name {
                "SUM" => number(numbers.iter().sum()),
                "AVERAGE" | "AVG" if numbers.is_empty() => number(0.0),
                "AVERAGE" | "AVG" => number(numbers.iter().sum::<f64>() / numbers.len() as f64),
                "MIN" => numbers
                    .iter()
                    .copied()
                    .reduce(f64::min)
                    .map(number)
                    .unwrap_or(Value::Null),
                _ => numbers
                    .iter()
                    .copied()
                    .reduce(f64::max)
                    .map(number)
                    .unwrap_or(Value::Null),
            };
            Ok(result)
        }
        "COUNT" => {
            arity("1", values.len() == 1)?;
            let count = match &values[0] {
                Value::Array(items) => items.len(),
                Value::Null => 0,
                _ => 1,
            };
            Ok(number(count as f64))
        }
        "ROUND" => {
            arity("1 or 2", matches!(values.len(), 1 | 2))?;
            let value = arithmetic_operand(&values[0])?;
            let digits = match values.get(1) {
                Some(d) => arithmetic_operand(d)?.clamp(0.0, 10.0) as i32,
                None => 0,
            };
            let factor = 10f64.powi(digits);
            Ok(number((value * factor).round() / factor))
        }
        "ABS" => {
            arity("1", values.len() == 1)?;
            Ok(number(arithmetic_operand(&values[0])?.abs()))
        }
        "CALC" => {
            arity("1", values.len() == 1)?;
            Ok(values.into_iter().next().unwrap_or(Value::Null))
        }
        other => Err(ExprError::UnknownFunction(other.to_string())),
    }
}

/// Display form of a calculated result: numbers are formatted for
/// documents, anything else uses the normal display form.
pub fn format_result(value: &Value) -> String {
    match value {
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_default(),
        other => display(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::Variables;
    use serde_json::json;

    fn eval(src: &str, data: Value) -> Result<Value, ExprError> {
        let vars = Variables::from_data(&data);
        let scope = Scope::new(&vars);
        parse(src)?.eval(&scope)
    }

    fn data() -> Value {
        json!({
            "hours": 35,
            "rate": "42,5",
            "name": "Marie",
            "funded": true,
            "items": [{ "price": 100 }, { "price": 250.5 }, { "price": null }],
            "empty": []
        })
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("hours * rate", data()).unwrap(), json!(1487.5));
        assert_eq!(eval("(1 + 2) * 3 - 4 / 2", data()).unwrap(), json!(7.0));
        assert_eq!(eval("-hours + 5", data()).unwrap(), json!(-30.0));
        assert_eq!(eval("10 % 4", data()).unwrap(), json!(2.0));
    }

    #[test]
    fn test_concatenation() {
        assert_eq!(eval("name + ' C.'", data()).unwrap(), json!("Marie C."));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("hours >= 35", data()).unwrap(), json!(true));
        assert_eq!(eval("rate > 42", data()).unwrap(), json!(true));
        assert_eq!(eval("name = 'Marie'", data()).unwrap(), json!(true));
        assert_eq!(eval("name != 'Marie'", data()).unwrap(), json!(false));
        assert_eq!(eval("missing == null", data()).unwrap(), json!(true));
    }

    #[test]
    fn test_logic_short_circuits() {
        // The right side would divide by zero if evaluated
        assert_eq!(eval("funded || 1 / 0", data()).unwrap(), json!(true));
        assert_eq!(eval("!funded && 1 / 0", data()).unwrap(), json!(false));
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(eval("SUM(items.price)", data()).unwrap(), json!(350.5));
        assert_eq!(eval("AVERAGE(items.price)", data()).unwrap(), json!(175.25));
        assert_eq!(eval("COUNT(items)", data()).unwrap(), json!(3.0));
        assert_eq!(eval("MIN(items.price, 5)", data()).unwrap(), json!(5.0));
        assert_eq!(eval("MAX(items.price)", data()).unwrap(), json!(250.5));
        assert_eq!(eval("SUM(empty)", data()).unwrap(), json!(0.0));
        assert_eq!(eval("AVG(empty)", data()).unwrap(), json!(0.0));
        assert_eq!(eval("MAX(empty)", data()).unwrap(), Value::Null);
    }

    #[test]
    fn test_round_abs_calc() {
        assert_eq!(eval("ROUND(10 / 3, 2)", data()).unwrap(), json!(3.33));
        assert_eq!(eval("ROUND(2.5)", data()).unwrap(), json!(3.0));
        assert_eq!(eval("ABS(-4)", data()).unwrap(), json!(4.0));
        assert_eq!(eval("CALC(hours * 2)", data()).unwrap(), json!(70.0));
    }

    #[test]
    fn test_errors() {
        assert_eq!(eval("1 / 0", data()), Err(ExprError::DivisionByZero));
        assert_eq!(
            eval("FOO(1)", data()),
            Err(ExprError::UnknownFunction("FOO".into()))
        );
        assert!(matches!(eval("name * 2", data()), Err(ExprError::NotANumber(_))));
        assert!(matches!(eval("COUNT()", data()), Err(ExprError::Arity { .. })));
    }

    #[test]
    fn test_format_result() {
        assert_eq!(format_result(&json!(1487.5)), "1487.5");
        assert_eq!(format_result(&json!(70.0)), "70");
        assert_eq!(format_result(&json!(10.0 / 3.0)), "3.33");
        assert_eq!(format_result(&json!("x")), "x");
        assert_eq!(format_result(&Value::Null), "");
    }
}
