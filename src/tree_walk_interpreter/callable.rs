use std::{io::Write, rc::Rc};

use tracing::{debug, trace};

use crate::{ast::Expression, span::Span};

use super::{ExecutionError, ExecutionErrorKind, Flow, Interpreter, Value};

/// A host function: receives the interpreter, the evaluated arguments and
/// the position of the call.
pub type NativeFunction = fn(&mut Interpreter, &[Value], Span) -> Result<Value, ExecutionError>;

pub(super) fn register_builtins(interpreter: &mut Interpreter) {
    interpreter.register_native("print", print);
    interpreter.register_native("pow", pow);
    interpreter.register_native("clock", clock);
}

impl Interpreter {
    pub(super) fn call(
        &mut self,
        name: &str,
        args: &[Expression],
        span: Span,
    ) -> Result<Value, ExecutionError> {
        if let Some(native) = self.natives.get(name).copied() {
            let args = self.evaluate_arguments(args)?;
            trace!(name, args = args.len(), "calling native");
            return native(self, &args, span);
        }

        let decl = self
            .functions
            .get(name)
            .map(Rc::clone)
            .ok_or_else(|| ExecutionErrorKind::UndefinedFunction(name.to_string()).at(span))?;

        if args.len() != decl.params.len() {
            return Err(ExecutionErrorKind::ArgumentCountMismatch {
                name: name.to_string(),
                expected: decl.params.len(),
                found: args.len(),
            }
            .at(span));
        }

        // Arguments see the caller's frame, never the callee's parameters.
        let args = self.evaluate_arguments(args)?;

        debug!(name, depth = self.environment.depth() + 1, "calling function");
        let flow = self.execute_in_frame(|interpreter| {
            for (param, value) in decl.params.iter().zip(args) {
                interpreter.environment.assign(param.clone(), value);
            }
            interpreter.execute_block(&decl.body)
        })?;

        Ok(match flow {
            Flow::Returning(value) => value,
            Flow::Completed => Value::Null,
        })
    }

    fn evaluate_arguments(&mut self, args: &[Expression]) -> Result<Vec<Value>, ExecutionError> {
        args.iter().map(|arg| self.evaluate(arg)).collect()
    }
}

fn expect_arity(name: &str, args: &[Value], expected: usize, span: Span) -> Result<(), ExecutionError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ExecutionErrorKind::ArgumentCountMismatch {
            name: name.to_string(),
            expected,
            found: args.len(),
        }
        .at(span))
    }
}

fn print(interpreter: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, ExecutionError> {
    let line = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(interpreter.stdout.borrow_mut(), "{}", line)
        .map_err(|e| ExecutionErrorKind::from(e).at(span))?;
    Ok(Value::Null)
}

fn pow(_: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, ExecutionError> {
    expect_arity("pow", args, 2, span)?;
    let base = args[0].to_number().map_err(|e| e.at(span))?;
    let exponent = args[1].to_number().map_err(|e| e.at(span))?;
    Ok(Value::Float(base.powf(exponent)))
}

fn clock(_: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, ExecutionError> {
    expect_arity("clock", args, 0, span)?;
    let seconds = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default();
    Ok(Value::Float(seconds))
}
