use crate::ast::{InfixOperator, UnaryOperator};

use super::{ExecutionErrorKind, TypeError, Value};

/// Applies `op` to two already evaluated operands. There is no short
/// circuit: `and` and `or` always receive both sides.
pub(super) fn binary(
    op: InfixOperator,
    left: Value,
    right: Value,
) -> Result<Value, ExecutionErrorKind> {
    match op {
        InfixOperator::And => {
            let (left, right) = (left.to_boolean()?, right.to_boolean()?);
            Ok(Value::Boolean(left && right))
        }
        InfixOperator::Or => {
            let (left, right) = (left.to_boolean()?, right.to_boolean()?);
            Ok(Value::Boolean(left || right))
        }
        InfixOperator::Equal => Ok(Value::Boolean(equals(op, &left, &right)?)),
        InfixOperator::NotEqual => Ok(Value::Boolean(!equals(op, &left, &right)?)),
        InfixOperator::LessThan => {
            let (a, b) = numbers(op, &left, &right)?;
            Ok(Value::Boolean(a < b))
        }
        InfixOperator::LessThanOrEqual => {
            let (a, b) = numbers(op, &left, &right)?;
            Ok(Value::Boolean(a <= b))
        }
        InfixOperator::GreaterThan => {
            let (a, b) = numbers(op, &left, &right)?;
            Ok(Value::Boolean(a > b))
        }
        InfixOperator::GreaterThanOrEqual => {
            let (a, b) = numbers(op, &left, &right)?;
            Ok(Value::Boolean(a >= b))
        }
        InfixOperator::Plus => add(left, right),
        InfixOperator::Minus => {
            let (a, b) = numbers(op, &left, &right)?;
            Ok(Value::Float(a - b))
        }
        InfixOperator::Multiply => {
            let (a, b) = numbers(op, &left, &right)?;
            Ok(Value::Float(a * b))
        }
        InfixOperator::Divide => {
            let (a, b) = numbers(op, &left, &right)?;
            if b == 0.0 {
                return Err(ExecutionErrorKind::DivisionByZero);
            }
            Ok(Value::Float(a / b))
        }
        InfixOperator::Modulo => match (left, right) {
            (Value::Integer(_), Value::Integer(0)) => Err(ExecutionErrorKind::ModuloByZero),
            (Value::Integer(a), Value::Integer(b)) => a
                .checked_rem(b)
                .map(Value::Integer)
                .ok_or(ExecutionErrorKind::IntegerOverflow),
            (left, right) => Err(invalid_operands(op, &left, &right).into()),
        },
    }
}

pub(super) fn unary(op: UnaryOperator, operand: Value) -> Result<Value, ExecutionErrorKind> {
    match op {
        UnaryOperator::Negate => match operand {
            Value::Integer(n) => n
                .checked_neg()
                .map(Value::Integer)
                .ok_or(ExecutionErrorKind::IntegerOverflow),
            Value::Float(n) => Ok(Value::Float(-n)),
            other => Err(TypeError::InvalidNegate(other.type_name()).into()),
        },
    }
}

fn add(left: Value, right: Value) -> Result<Value, ExecutionErrorKind> {
    match (left, right) {
        (left @ Value::String(_), right) | (left, right @ Value::String(_)) => {
            Ok(Value::String(format!("{}{}", left, right)))
        }
        (Value::Integer(a), Value::Integer(b)) => a
            .checked_add(b)
            .map(Value::Integer)
            .ok_or(ExecutionErrorKind::IntegerOverflow),
        (left, right) => {
            let (a, b) = numbers(InfixOperator::Plus, &left, &right)?;
            Ok(Value::Float(a + b))
        }
    }
}

fn equals(op: InfixOperator, left: &Value, right: &Value) -> Result<bool, TypeError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Ok(a == b),
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            let (a, b) = numbers(op, left, right)?;
            Ok(a == b)
        }
        (Value::String(a), Value::String(b)) => Ok(a == b),
        (Value::Boolean(a), Value::Boolean(b)) => Ok(a == b),
        (Value::Null, Value::Null) => Ok(true),
        _ => Err(invalid_operands(op, left, right)),
    }
}

fn numbers(op: InfixOperator, left: &Value, right: &Value) -> Result<(f64, f64), TypeError> {
    match (left.to_number(), right.to_number()) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        _ => Err(invalid_operands(op, left, right)),
    }
}

fn invalid_operands(op: InfixOperator, left: &Value, right: &Value) -> TypeError {
    TypeError::InvalidOperands {
        op,
        left: left.type_name(),
        right: right.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(s: &str) -> Value {
        Value::String(s.to_string())
    }

    #[test]
    fn test_plus_keeps_integers_and_promotes_floats() {
        assert_eq!(
            binary(InfixOperator::Plus, Value::Integer(1), Value::Integer(2)).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            binary(InfixOperator::Plus, Value::Integer(1), Value::Float(0.5)).unwrap(),
            Value::Float(1.5)
        );
    }

    #[test]
    fn test_plus_concatenates_when_either_side_is_a_string() {
        assert_eq!(
            binary(InfixOperator::Plus, string("a"), Value::Integer(1)).unwrap(),
            string("a1")
        );
        assert_eq!(
            binary(InfixOperator::Plus, Value::Float(2.5), string("x")).unwrap(),
            string("2.5x")
        );
        assert_eq!(
            binary(InfixOperator::Plus, Value::Null, string("!")).unwrap(),
            string("null!")
        );
    }

    #[test]
    fn test_plus_rejects_booleans() {
        let error = binary(InfixOperator::Plus, Value::Boolean(true), Value::Integer(1)).unwrap_err();
        assert!(matches!(
            error,
            ExecutionErrorKind::TypeError(TypeError::InvalidOperands {
                op: InfixOperator::Plus,
                left: "boolean",
                right: "integer",
            })
        ));
    }

    #[test]
    fn test_other_arithmetic_always_produces_floats() {
        assert_eq!(
            binary(InfixOperator::Minus, Value::Integer(5), Value::Integer(2)).unwrap(),
            Value::Float(3.0)
        );
        assert_eq!(
            binary(InfixOperator::Multiply, Value::Integer(2), Value::Integer(3)).unwrap(),
            Value::Float(6.0)
        );
        assert_eq!(
            binary(InfixOperator::Divide, Value::Integer(1), Value::Integer(2)).unwrap(),
            Value::Float(0.5)
        );
    }

    #[test]
    fn test_division_and_modulo_by_zero() {
        assert!(matches!(
            binary(InfixOperator::Divide, Value::Integer(1), Value::Float(0.0)),
            Err(ExecutionErrorKind::DivisionByZero)
        ));
        assert!(matches!(
            binary(InfixOperator::Modulo, Value::Integer(5), Value::Integer(0)),
            Err(ExecutionErrorKind::ModuloByZero)
        ));
    }

    #[test]
    fn test_modulo_requires_integers() {
        assert_eq!(
            binary(InfixOperator::Modulo, Value::Integer(-7), Value::Integer(3)).unwrap(),
            Value::Integer(-1)
        );
        assert!(matches!(
            binary(InfixOperator::Modulo, Value::Float(7.0), Value::Integer(3)),
            Err(ExecutionErrorKind::TypeError(_))
        ));
    }

    #[test]
    fn test_integer_overflow() {
        assert!(matches!(
            binary(InfixOperator::Plus, Value::Integer(i64::MAX), Value::Integer(1)),
            Err(ExecutionErrorKind::IntegerOverflow)
        ));
        assert!(matches!(
            binary(InfixOperator::Modulo, Value::Integer(i64::MIN), Value::Integer(-1)),
            Err(ExecutionErrorKind::IntegerOverflow)
        ));
        assert!(matches!(
            unary(UnaryOperator::Negate, Value::Integer(i64::MIN)),
            Err(ExecutionErrorKind::IntegerOverflow)
        ));
    }

    #[test]
    fn test_equality() {
        let eq = |left, right| binary(InfixOperator::Equal, left, right);
        assert_eq!(eq(Value::Integer(2), Value::Float(2.0)).unwrap(), Value::Boolean(true));
        assert_eq!(eq(string("a"), string("a")).unwrap(), Value::Boolean(true));
        assert_eq!(
            eq(Value::Boolean(true), Value::Boolean(false)).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(eq(Value::Null, Value::Null).unwrap(), Value::Boolean(true));
        assert!(matches!(
            eq(string("true"), Value::Boolean(true)),
            Err(ExecutionErrorKind::TypeError(_))
        ));
        assert_eq!(
            binary(InfixOperator::NotEqual, Value::Integer(1), Value::Integer(2)).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_comparison_coerces_to_numbers() {
        assert_eq!(
            binary(InfixOperator::LessThan, Value::Integer(1), Value::Float(1.5)).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            binary(InfixOperator::GreaterThanOrEqual, Value::Integer(2), Value::Integer(2)).unwrap(),
            Value::Boolean(true)
        );
        assert!(matches!(
            binary(InfixOperator::LessThan, string("a"), string("b")),
            Err(ExecutionErrorKind::TypeError(_))
        ));
    }

    #[test]
    fn test_logical_operators_coerce_both_sides() {
        assert_eq!(
            binary(InfixOperator::And, Value::Integer(1), Value::Boolean(true)).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            binary(InfixOperator::Or, Value::Float(0.0), Value::Integer(0)).unwrap(),
            Value::Boolean(false)
        );
        // The right side is checked even when the left decides the result.
        assert!(matches!(
            binary(InfixOperator::Or, Value::Boolean(true), string("x")),
            Err(ExecutionErrorKind::TypeError(TypeError::NotABoolean("string")))
        ));
    }

    #[test]
    fn test_negate_preserves_kind() {
        assert_eq!(
            unary(UnaryOperator::Negate, Value::Integer(3)).unwrap(),
            Value::Integer(-3)
        );
        assert_eq!(
            unary(UnaryOperator::Negate, Value::Float(1.5)).unwrap(),
            Value::Float(-1.5)
        );
        assert!(matches!(
            unary(UnaryOperator::Negate, Value::Boolean(true)),
            Err(ExecutionErrorKind::TypeError(TypeError::InvalidNegate("boolean")))
        ));
    }
}
