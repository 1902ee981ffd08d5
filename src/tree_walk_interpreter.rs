mod callable;
mod operators;
mod scope;

use std::{
    cell::RefCell,
    fmt::{Debug, Display},
    rc::Rc,
};

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::{
    ast::{
        Block, Expression, ExpressionKind, FunctionDecl, InfixOperator, Literal, Program,
        Statement, StatementKind,
    },
    span::Span,
};

pub use self::callable::NativeFunction;
use self::scope::Environment;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Null => "null",
        }
    }

    /// Truthiness used by `if`, `loop` and the logical operators. Strings and
    /// null have none.
    pub fn to_boolean(&self) -> Result<bool, TypeError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::Integer(n) => Ok(*n != 0),
            Value::Float(n) => Ok(*n != 0.0),
            other => Err(TypeError::NotABoolean(other.type_name())),
        }
    }

    pub fn to_number(&self) -> Result<f64, TypeError> {
        match self {
            Value::Integer(n) => Ok(*n as f64),
            Value::Float(n) => Ok(*n),
            other => Err(TypeError::NotANumber(other.type_name())),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => {
                let text = format!("{:.6}", n);
                if text.contains('.') {
                    write!(f, "{}", text.trim_end_matches('0').trim_end_matches('.'))
                } else {
                    write!(f, "{}", text)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
        }
    }
}

/// How a statement finished. `Returning` carries the value of a `return`
/// up to the nearest function call.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Completed,
    Returning(Value),
}

#[derive(Debug, thiserror::Error)]
#[error("Runtime error at {span}: {kind}")]
pub struct ExecutionError {
    pub kind: ExecutionErrorKind,
    pub span: Span,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionErrorKind {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("Undefined function: {0}")]
    UndefinedFunction(String),
    #[error("Argument count mismatch: {name} expects {expected} arguments, got {found}")]
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Type error: {0}")]
    TypeError(#[from] TypeError),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Modulo by zero")]
    ModuloByZero,
    #[error("Integer overflow")]
    IntegerOverflow,
}

impl ExecutionErrorKind {
    pub fn at(self, span: Span) -> ExecutionError {
        ExecutionError { kind: self, span }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("Invalid operands for '{op}': {left} and {right}")]
    InvalidOperands {
        op: InfixOperator,
        left: &'static str,
        right: &'static str,
    },
    #[error("Cannot negate {0}")]
    InvalidNegate(&'static str),
    #[error("Expected a boolean condition, found {0}")]
    NotABoolean(&'static str),
    #[error("Expected a number, found {0}")]
    NotANumber(&'static str),
    #[error("Expected integer count or boolean condition, found {0}")]
    InvalidLoopCondition(&'static str),
}

impl TypeError {
    pub fn at(self, span: Span) -> ExecutionError {
        ExecutionErrorKind::TypeError(self).at(span)
    }
}

#[derive(Clone)]
pub struct Interpreter {
    environment: Environment,
    functions: FxHashMap<String, Rc<FunctionDecl>>,
    natives: FxHashMap<&'static str, NativeFunction>,
    stdout: Rc<RefCell<dyn std::io::Write>>,
}

impl Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("environment", &self.environment)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("natives", &self.natives.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Rc::new(RefCell::new(std::io::stdout())))
    }
}

impl Interpreter {
    pub fn new(stdout: Rc<RefCell<dyn std::io::Write>>) -> Self {
        let mut interpreter = Self {
            environment: Environment::new(),
            functions: FxHashMap::default(),
            natives: FxHashMap::default(),
            stdout,
        };
        callable::register_builtins(&mut interpreter);
        interpreter
    }

    /// Registers a host function. Natives are looked up before user
    /// functions, so they shadow definitions with the same name.
    pub fn register_native(&mut self, name: &'static str, function: NativeFunction) {
        self.natives.insert(name, function);
    }

    /// Runs every statement of `program` in order. A top-level `return`
    /// stops the run and is handed back as `Flow::Returning`.
    pub fn interpret(&mut self, program: &Program) -> Result<Flow, ExecutionError> {
        for statement in program.0.iter() {
            if let Flow::Returning(value) = self.execute(statement)? {
                warn!(span = %statement.span, "return outside of a function");
                return Ok(Flow::Returning(value));
            }
        }

        Ok(Flow::Completed)
    }

    /// Looks `name` up through the whole frame stack.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.environment.get(name)
    }

    /// Number of frames currently on the stack, the global frame included.
    pub fn frame_depth(&self) -> usize {
        self.environment.depth()
    }

    fn execute(&mut self, stmt: &Statement) -> Result<Flow, ExecutionError> {
        match &stmt.kind {
            StatementKind::Block(block) => {
                self.execute_in_frame(|interpreter| interpreter.execute_block(block))
            }
            StatementKind::Assignment(name, expression) => {
                let value = self.evaluate(expression)?;
                self.environment.assign(name.clone(), value);
                Ok(Flow::Completed)
            }
            StatementKind::FunctionDeclaration(decl) => {
                debug!(name = %decl.name, params = decl.params.len(), "defining function");
                self.functions.insert(decl.name.clone(), Rc::clone(decl));
                Ok(Flow::Completed)
            }
            StatementKind::Expression(expression) => {
                self.evaluate(expression)?;
                Ok(Flow::Completed)
            }
            StatementKind::Return(expression) => {
                let value = self.evaluate_optional(expression.as_ref())?;
                Ok(Flow::Returning(value))
            }
            StatementKind::Loop(condition, body) => {
                self.execute_loop(condition.as_ref(), body, stmt.span)
            }
            StatementKind::If(condition, then_branch, else_branch) => {
                let span = condition.as_ref().map_or(stmt.span, |c| c.span);
                let condition = self
                    .evaluate_optional(condition.as_ref())?
                    .to_boolean()
                    .map_err(|e| e.at(span))?;
                if condition {
                    self.execute_block(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute_block(else_branch)
                } else {
                    Ok(Flow::Completed)
                }
            }
        }
    }

    /// Runs the statements of `block` in the current frame.
    fn execute_block(&mut self, block: &Block) -> Result<Flow, ExecutionError> {
        for statement in block.statements.iter() {
            if let flow @ Flow::Returning(_) = self.execute(statement)? {
                return Ok(flow);
            }
        }
        Ok(Flow::Completed)
    }

    /// Runs `f` with a fresh frame on top of the stack. The frame is popped
    /// whatever `f` returns.
    fn execute_in_frame<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ExecutionError>,
    ) -> Result<T, ExecutionError> {
        self.environment.push();
        let result = f(self);
        self.environment.pop();
        result
    }

    fn execute_loop(
        &mut self,
        condition: Option<&Expression>,
        body: &Block,
        span: Span,
    ) -> Result<Flow, ExecutionError> {
        let span = condition.map_or(span, |c| c.span);

        match self.evaluate_optional(condition)? {
            // The count is evaluated once.
            Value::Integer(count) => {
                for _ in 0..count.max(0) {
                    if let flow @ Flow::Returning(_) = self.execute_block(body)? {
                        return Ok(flow);
                    }
                }
            }
            Value::Boolean(mut running) => {
                while running {
                    if let flow @ Flow::Returning(_) = self.execute_block(body)? {
                        return Ok(flow);
                    }
                    running = match self.evaluate_optional(condition)? {
                        Value::Boolean(b) => b,
                        other => {
                            return Err(TypeError::InvalidLoopCondition(other.type_name()).at(span))
                        }
                    };
                }
            }
            other => return Err(TypeError::InvalidLoopCondition(other.type_name()).at(span)),
        }

        Ok(Flow::Completed)
    }

    fn evaluate(&mut self, expression: &Expression) -> Result<Value, ExecutionError> {
        match &expression.kind {
            ExpressionKind::Literal(literal) => Ok(match literal {
                Literal::String(s) => Value::String(s.clone()),
                Literal::Integer(n) => Value::Integer(*n),
                Literal::Float(n) => Value::Float(*n),
                Literal::Boolean(b) => Value::Boolean(*b),
            }),
            ExpressionKind::Variable(name) => self.environment.get(name).cloned().ok_or_else(|| {
                ExecutionErrorKind::UndefinedVariable(name.clone()).at(expression.span)
            }),
            ExpressionKind::Binary(left, op, right) => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                operators::binary(*op, left, right).map_err(|kind| kind.at(expression.span))
            }
            ExpressionKind::Unary(op, operand) => {
                let operand = self.evaluate(operand)?;
                operators::unary(*op, operand).map_err(|kind| kind.at(expression.span))
            }
            ExpressionKind::FunctionCall(name, args) => self.call(name, args, expression.span),
        }
    }

    /// Absent expressions evaluate to null.
    fn evaluate_optional(&mut self, expression: Option<&Expression>) -> Result<Value, ExecutionError> {
        match expression {
            Some(expression) => self.evaluate(expression),
            None => Ok(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_to_string() {
        assert_eq!(Value::Integer(-12).to_string(), "-12");
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
        assert_eq!(Value::Float(2.0).to_string(), "2");
        assert_eq!(Value::Float(1.0 / 3.0).to_string(), "0.333333");
        assert_eq!(Value::Float(100.25).to_string(), "100.25");
        assert_eq!(Value::String("a b".to_string()).to_string(), "a b");
        assert_eq!(Value::Boolean(false).to_string(), "false");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn test_boolean_coercion() {
        assert_eq!(Value::Boolean(true).to_boolean(), Ok(true));
        assert_eq!(Value::Integer(0).to_boolean(), Ok(false));
        assert_eq!(Value::Integer(-3).to_boolean(), Ok(true));
        assert_eq!(Value::Float(0.0).to_boolean(), Ok(false));
        assert_eq!(
            Value::String("x".to_string()).to_boolean(),
            Err(TypeError::NotABoolean("string"))
        );
        assert_eq!(Value::Null.to_boolean(), Err(TypeError::NotABoolean("null")));
    }

    #[test]
    fn test_error_message_carries_position() {
        let error = ExecutionErrorKind::UndefinedVariable("x".to_string()).at(Span::new(3, 7));
        assert_eq!(error.to_string(), "Runtime error at 3:7: Undefined variable: x");
    }
}
