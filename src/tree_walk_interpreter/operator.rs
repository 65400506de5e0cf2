use std::cmp::Ordering;

use crate::ast::BinaryOp;

use super::{ExecutionErrorKind, Value};

/// Applies an eagerly evaluated operator. `&&`, `||` and `=` never reach here.
pub(super) fn apply(op: BinaryOp, left: Value, right: Value) -> Result<Value, ExecutionErrorKind> {
    if let Some(holds) = relation(op) {
        return match (left, right) {
            (Value::Number(a), Value::Number(b)) => {
                Ok(Value::Boolean(a.partial_cmp(&b).is_some_and(holds)))
            }
            (Value::String(a), Value::String(b)) => Ok(Value::Boolean(holds(a.cmp(&b)))),
            (left, right) => Err(ExecutionErrorKind::InvalidOperands { op, left, right }),
        };
    }

    match (op, left, right) {
        (BinaryOp::Equal, a, b) => Ok(Value::Boolean(a == b)),
        (BinaryOp::NotEqual, a, b) => Ok(Value::Boolean(a != b)),
        (BinaryOp::Plus, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (BinaryOp::Plus, Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
        (BinaryOp::Minus, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
        (BinaryOp::Multiply, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
        (BinaryOp::Divide | BinaryOp::Remainder, Value::Number(_), Value::Number(b))
            if b == 0.0 =>
        {
            Err(ExecutionErrorKind::DivisionByZero { op })
        }
        (BinaryOp::Divide, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
        (BinaryOp::Remainder, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a % b)),
        (op, left, right) => Err(ExecutionErrorKind::InvalidOperands { op, left, right }),
    }
}

fn relation(op: BinaryOp) -> Option<fn(Ordering) -> bool> {
    match op {
        BinaryOp::LessThan => Some(Ordering::is_lt),
        BinaryOp::LessThanOrEqual => Some(Ordering::is_le),
        BinaryOp::GreaterThan => Some(Ordering::is_gt),
        BinaryOp::GreaterThanOrEqual => Some(Ordering::is_ge),
        _ => None,
    }
}
