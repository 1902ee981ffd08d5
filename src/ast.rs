use std::{fmt::Display, rc::Rc};

use crate::span::Span;

#[derive(Debug, Clone, Default)]
pub struct Program(pub Vec<Statement>);

#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Block(Block),
    Assignment(String, Expression),
    FunctionDeclaration(Rc<FunctionDecl>),
    Expression(Expression),
    Return(Option<Expression>),
    Loop(Option<Expression>, Block),
    If(Option<Expression>, Block, Option<Block>),
}

#[derive(Debug, Clone)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExpressionKind {
    Literal(Literal),
    Variable(String),
    Binary(Box<Expression>, InfixOperator, Box<Expression>),
    Unary(UnaryOperator, Box<Expression>),
    FunctionCall(String, Vec<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOperator {
    Or,
    And,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
}

impl Statement {
    pub fn new(kind: StatementKind, span: Span) -> Self {
        Self { kind, span }
    }
}

impl Expression {
    pub fn new(kind: ExpressionKind, span: Span) -> Self {
        Self { kind, span }
    }
}

impl Block {
    pub fn new(statements: Vec<Statement>, span: Span) -> Self {
        Self { statements, span }
    }
}

// The Display impls below print canonical Sia source. Binary and unary
// expressions are always parenthesized so printing and re-parsing gives back
// the same tree.

const INDENT: &str = "    ";

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for statement in &self.0 {
            statement.write_indented(f, 0)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_indented(f, 0)
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_indented(f, 0)
    }
}

impl Statement {
    fn write_indented(&self, f: &mut std::fmt::Formatter<'_>, depth: usize) -> std::fmt::Result {
        write!(f, "{}", INDENT.repeat(depth))?;
        match &self.kind {
            StatementKind::Block(block) => block.write_indented(f, depth),
            StatementKind::Assignment(name, expr) => write!(f, "{name} = {expr};"),
            StatementKind::FunctionDeclaration(decl) => {
                write!(f, "function {}({}) ", decl.name, decl.params.join(", "))?;
                decl.body.write_indented(f, depth)
            }
            StatementKind::Expression(expr) => write!(f, "{expr};"),
            StatementKind::Return(expr) => match expr {
                Some(expr) => write!(f, "return {expr};"),
                None => write!(f, "return;"),
            },
            StatementKind::Loop(condition, body) => {
                write!(f, "loop (")?;
                if let Some(condition) = condition {
                    write!(f, "{condition}")?;
                }
                write!(f, ") ")?;
                body.write_indented(f, depth)
            }
            StatementKind::If(..) => self.write_if(f, depth),
        }
    }

    fn write_if(&self, f: &mut std::fmt::Formatter<'_>, depth: usize) -> std::fmt::Result {
        let StatementKind::If(condition, then_branch, else_branch) = &self.kind else {
            return Ok(());
        };

        write!(f, "if (")?;
        if let Some(condition) = condition {
            write!(f, "{condition}")?;
        }
        write!(f, ") ")?;
        then_branch.write_indented(f, depth)?;

        let Some(else_branch) = else_branch else {
            return Ok(());
        };
        write!(f, " else ")?;
        match else_branch.else_if() {
            Some(nested) => nested.write_if(f, depth),
            None => else_branch.write_indented(f, depth),
        }
    }
}

impl Block {
    /// The nested conditional when this block is the synthetic wrapper the
    /// parser builds for `else if`.
    pub fn else_if(&self) -> Option<&Statement> {
        match self.statements.as_slice() {
            [statement]
                if matches!(statement.kind, StatementKind::If(..))
                    && statement.span == self.span =>
            {
                Some(statement)
            }
            _ => None,
        }
    }

    fn write_indented(&self, f: &mut std::fmt::Formatter<'_>, depth: usize) -> std::fmt::Result {
        writeln!(f, "{{")?;
        for statement in &self.statements {
            statement.write_indented(f, depth + 1)?;
            writeln!(f)?;
        }
        write!(f, "{}}}", INDENT.repeat(depth))
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ExpressionKind::Literal(literal) => write!(f, "{}", literal),
            ExpressionKind::Variable(name) => write!(f, "{}", name),
            ExpressionKind::Binary(left, op, right) => write!(f, "({} {} {})", left, op, right),
            ExpressionKind::Unary(op, operand) => write!(f, "({}{})", op, operand),
            ExpressionKind::FunctionCall(name, args) => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    write!(f, "{}", arg)?;
                    if i != args.len() - 1 {
                        write!(f, ", ")?;
                    }
                }
                write!(f, ")")
            }
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::String(s) => write!(f, "\"{}\"", s),
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Float(n) => {
                let text = n.to_string();
                if text.contains('.') {
                    write!(f, "{}", text)
                } else {
                    write!(f, "{}.0", text)
                }
            }
            Literal::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl Display for InfixOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfixOperator::Or => write!(f, "or"),
            InfixOperator::And => write!(f, "and"),
            InfixOperator::Equal => write!(f, "=="),
            InfixOperator::NotEqual => write!(f, "!="),
            InfixOperator::LessThan => write!(f, "<"),
            InfixOperator::LessThanOrEqual => write!(f, "<="),
            InfixOperator::GreaterThan => write!(f, ">"),
            InfixOperator::GreaterThanOrEqual => write!(f, ">="),
            InfixOperator::Plus => write!(f, "+"),
            InfixOperator::Minus => write!(f, "-"),
            InfixOperator::Multiply => write!(f, "*"),
            InfixOperator::Divide => write!(f, "/"),
            InfixOperator::Modulo => write!(f, "%"),
        }
    }
}

impl Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
        }
    }
}
