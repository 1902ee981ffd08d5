use std::{cell::RefCell, rc::Rc};

use tracing::{debug, trace};

use crate::{
    ast::{
        Block, Expression, ExpressionKind, FunctionDecl, InfixOperator, Literal, Program,
        Statement, StatementKind, UnaryOperator,
    },
    span::Span,
    tokenizer::{Token, TokenType, TokenizeError, Tokenizer},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
    context: Vec<&'static str>,
}

impl ParseError {
    /// The grammar rules that were being parsed when the error occurred,
    /// outermost first.
    pub fn context(&self) -> &[&'static str] {
        &self.context
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error at {}: {}", self.span, self.kind)?;
        if !self.context.is_empty() {
            write!(f, "\nWhile parsing {}", self.context.join(" > "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
    #[error("Expected \"{expected}\" but found {found}")]
    Expected { expected: TokenType, found: String },
    #[error("Expected one of {expected} but found {found}")]
    ExpectedOneOf { expected: String, found: String },
    #[error("Expected {expected} but found {found}")]
    Unexpected {
        expected: &'static str,
        found: String,
    },
    #[error("Invalid number literal \"{0}\"")]
    InvalidNumber(String),
}

#[derive(Debug, Default)]
struct ParseContext {
    stack: RefCell<Vec<&'static str>>,
}

impl ParseContext {
    fn push(self: &Rc<Self>, name: &'static str) -> ParseContextGuard {
        self.stack.borrow_mut().push(name);
        ParseContextGuard {
            context: Rc::clone(self),
        }
    }

    fn pop(&self) {
        self.stack.borrow_mut().pop();
    }

    fn snapshot(&self) -> Vec<&'static str> {
        self.stack.borrow().clone()
    }
}

struct ParseContextGuard {
    context: Rc<ParseContext>,
}

impl Drop for ParseContextGuard {
    fn drop(&mut self) {
        self.context.pop();
    }
}

/// Parses a whole Sia source text. Stops at the first error.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let mut parser = Parser::new(source)?;
    let program = parser.program()?;
    debug!(statements = program.0.len(), "parsed program");
    Ok(program)
}

struct Parser<'a> {
    tokenizer: Tokenizer<'a>,
    current: Token<'a>,
    context: Rc<ParseContext>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Result<Self, ParseError> {
        let mut tokenizer = Tokenizer::new(source);
        let context = Rc::new(ParseContext::default());
        let current = tokenizer.token().map_err(|error| ParseError {
            span: error.span(),
            kind: error.into(),
            context: Vec::new(),
        })?;

        Ok(Self {
            tokenizer,
            current,
            context,
        })
    }

    fn advance(&mut self) -> Result<Token<'a>, ParseError> {
        let next = match self.tokenizer.token() {
            Ok(token) => token,
            Err(error) => return Err(self.error_at(error.span(), error.into())),
        };
        trace!(token = %next.token_type, lexeme = next.lexeme, "advance");
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn check(&self, token_type: TokenType) -> bool {
        self.current.token_type == token_type
    }

    fn consume(&mut self, token_type: TokenType) -> Result<Token<'a>, ParseError> {
        if self.check(token_type) {
            self.advance()
        } else {
            Err(self.error(ParseErrorKind::Expected {
                expected: token_type,
                found: self.current.describe(),
            }))
        }
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        self.error_at(self.current.span, kind)
    }

    fn error_at(&self, span: Span, kind: ParseErrorKind) -> ParseError {
        ParseError {
            kind,
            span,
            context: self.context.snapshot(),
        }
    }

    fn expected_one_of(&self, expected: &[TokenType]) -> ParseError {
        let expected = expected
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(", ");
        self.error(ParseErrorKind::ExpectedOneOf {
            expected,
            found: self.current.describe(),
        })
    }

    fn program(&mut self) -> Result<Program, ParseError> {
        let _guard = self.context.push("program");
        let mut statements = Vec::new();
        while !self.check(TokenType::Eof) {
            statements.push(self.statement()?);
        }
        Ok(Program(statements))
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        let _guard = self.context.push("statement");
        match self.current.token_type {
            TokenType::Function => self.function(),
            TokenType::Loop => self.loop_statement(),
            TokenType::If => self.if_statement(),
            TokenType::Return => self.return_statement(),
            TokenType::Identifier => self.identifier_statement(),
            TokenType::LeftBrace => {
                let block = self.block()?;
                let span = block.span;
                Ok(Statement::new(StatementKind::Block(block), span))
            }
            _ => Err(self.error(ParseErrorKind::Unexpected {
                expected: "statement",
                found: self.current.describe(),
            })),
        }
    }

    fn function(&mut self) -> Result<Statement, ParseError> {
        let _guard = self.context.push("function");
        let keyword = self.consume(TokenType::Function)?;
        let name = self.consume(TokenType::Identifier)?.lexeme.to_string();
        self.consume(TokenType::LeftParen)?;

        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                params.push(self.consume(TokenType::Identifier)?.lexeme.to_string());
                match self.current.token_type {
                    TokenType::Comma => {
                        self.advance()?;
                    }
                    TokenType::RightParen => break,
                    _ => {
                        return Err(
                            self.expected_one_of(&[TokenType::Comma, TokenType::RightParen])
                        )
                    }
                }
            }
        }
        self.consume(TokenType::RightParen)?;

        let body = self.block()?;
        Ok(Statement::new(
            StatementKind::FunctionDeclaration(Rc::new(FunctionDecl { name, params, body })),
            keyword.span,
        ))
    }

    fn loop_statement(&mut self) -> Result<Statement, ParseError> {
        let _guard = self.context.push("loop");
        let keyword = self.consume(TokenType::Loop)?;
        let condition = self.parenthesized_condition()?;
        let body = self.block()?;
        Ok(Statement::new(
            StatementKind::Loop(condition, body),
            keyword.span,
        ))
    }

    fn if_statement(&mut self) -> Result<Statement, ParseError> {
        let _guard = self.context.push("if");
        let keyword = self.consume(TokenType::If)?;
        let condition = self.parenthesized_condition()?;
        let then_branch = self.block()?;

        let else_branch = if self.check(TokenType::Else) {
            self.advance()?;
            if self.check(TokenType::If) {
                // `else if` is kept as a block holding only the nested conditional.
                let nested = self.if_statement()?;
                let span = nested.span;
                Some(Block::new(vec![nested], span))
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };

        Ok(Statement::new(
            StatementKind::If(condition, then_branch, else_branch),
            keyword.span,
        ))
    }

    fn parenthesized_condition(&mut self) -> Result<Option<Expression>, ParseError> {
        self.consume(TokenType::LeftParen)?;
        let condition = if self.check(TokenType::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::RightParen)?;
        Ok(condition)
    }

    fn return_statement(&mut self) -> Result<Statement, ParseError> {
        let _guard = self.context.push("return");
        let keyword = self.consume(TokenType::Return)?;
        let value = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::Semicolon)?;
        Ok(Statement::new(StatementKind::Return(value), keyword.span))
    }

    fn identifier_statement(&mut self) -> Result<Statement, ParseError> {
        let name = self.consume(TokenType::Identifier)?;
        match self.current.token_type {
            TokenType::Equal => {
                let _guard = self.context.push("assignment");
                self.advance()?;
                let value = self.expression()?;
                self.consume(TokenType::Semicolon)?;
                Ok(Statement::new(
                    StatementKind::Assignment(name.lexeme.to_string(), value),
                    name.span,
                ))
            }
            TokenType::LeftParen => {
                let _guard = self.context.push("call");
                let args = self.arguments()?;
                if self.check(TokenType::Semicolon) {
                    self.advance()?;
                }
                let call = Expression::new(
                    ExpressionKind::FunctionCall(name.lexeme.to_string(), args),
                    name.span,
                );
                Ok(Statement::new(StatementKind::Expression(call), name.span))
            }
            _ => Err(self.expected_one_of(&[TokenType::Equal, TokenType::LeftParen])),
        }
    }

    fn block(&mut self) -> Result<Block, ParseError> {
        let _guard = self.context.push("block");
        let open = self.consume(TokenType::LeftBrace)?;
        let mut statements = Vec::new();

        while !self.check(TokenType::RightBrace) {
            if self.check(TokenType::Eof) {
                return Err(self.error(ParseErrorKind::Expected {
                    expected: TokenType::RightBrace,
                    found: self.current.describe(),
                }));
            }
            statements.push(self.statement()?);
        }
        self.consume(TokenType::RightBrace)?;

        Ok(Block::new(statements, open.span))
    }

    fn arguments(&mut self) -> Result<Vec<Expression>, ParseError> {
        self.consume(TokenType::LeftParen)?;
        let mut args = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                args.push(self.expression()?);
                match self.current.token_type {
                    TokenType::Comma => {
                        self.advance()?;
                    }
                    TokenType::RightParen => break,
                    _ => {
                        return Err(
                            self.expected_one_of(&[TokenType::Comma, TokenType::RightParen])
                        )
                    }
                }
            }
        }
        self.consume(TokenType::RightParen)?;
        Ok(args)
    }

    fn expression(&mut self) -> Result<Expression, ParseError> {
        let _guard = self.context.push("expression");
        self.logical_or()
    }

    fn binary(
        &mut self,
        operand: fn(&mut Self) -> Result<Expression, ParseError>,
        operator: fn(TokenType) -> Option<InfixOperator>,
    ) -> Result<Expression, ParseError> {
        let mut expr = operand(self)?;

        while let Some(op) = operator(self.current.token_type) {
            let token = self.advance()?;
            let right = operand(self)?;
            expr = Expression::new(
                ExpressionKind::Binary(Box::new(expr), op, Box::new(right)),
                token.span,
            );
        }

        Ok(expr)
    }

    fn logical_or(&mut self) -> Result<Expression, ParseError> {
        self.binary(Self::logical_and, |token_type| match token_type {
            TokenType::Or => Some(InfixOperator::Or),
            _ => None,
        })
    }

    fn logical_and(&mut self) -> Result<Expression, ParseError> {
        self.binary(Self::comparison, |token_type| match token_type {
            TokenType::And => Some(InfixOperator::And),
            _ => None,
        })
    }

    fn comparison(&mut self) -> Result<Expression, ParseError> {
        self.binary(Self::term, |token_type| match token_type {
            TokenType::Less => Some(InfixOperator::LessThan),
            TokenType::LessEqual => Some(InfixOperator::LessThanOrEqual),
            TokenType::Greater => Some(InfixOperator::GreaterThan),
            TokenType::GreaterEqual => Some(InfixOperator::GreaterThanOrEqual),
            TokenType::EqualEqual => Some(InfixOperator::Equal),
            TokenType::BangEqual => Some(InfixOperator::NotEqual),
            _ => None,
        })
    }

    fn term(&mut self) -> Result<Expression, ParseError> {
        self.binary(Self::factor, |token_type| match token_type {
            TokenType::Plus => Some(InfixOperator::Plus),
            TokenType::Minus => Some(InfixOperator::Minus),
            _ => None,
        })
    }

    fn factor(&mut self) -> Result<Expression, ParseError> {
        self.binary(Self::unary, |token_type| match token_type {
            TokenType::Star => Some(InfixOperator::Multiply),
            TokenType::Slash => Some(InfixOperator::Divide),
            TokenType::Percent => Some(InfixOperator::Modulo),
            _ => None,
        })
    }

    fn unary(&mut self) -> Result<Expression, ParseError> {
        if self.check(TokenType::Minus) {
            let token = self.advance()?;
            let operand = self.unary()?;
            return Ok(Expression::new(
                ExpressionKind::Unary(UnaryOperator::Negate, Box::new(operand)),
                token.span,
            ));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expression, ParseError> {
        let _guard = self.context.push("primary");
        match self.current.token_type {
            TokenType::LeftParen => {
                self.advance()?;
                let expr = self.expression()?;
                self.consume(TokenType::RightParen)?;
                Ok(expr)
            }
            TokenType::True | TokenType::False => {
                let token = self.advance()?;
                let value = token.token_type == TokenType::True;
                Ok(Expression::new(
                    ExpressionKind::Literal(Literal::Boolean(value)),
                    token.span,
                ))
            }
            TokenType::String => {
                let token = self.advance()?;
                let value = token.lexeme[1..token.lexeme.len() - 1].to_string();
                Ok(Expression::new(
                    ExpressionKind::Literal(Literal::String(value)),
                    token.span,
                ))
            }
            TokenType::Number => self.number(),
            TokenType::Identifier => {
                let token = self.advance()?;
                let name = token.lexeme.to_string();
                if self.check(TokenType::LeftParen) {
                    let _guard = self.context.push("call");
                    let args = self.arguments()?;
                    Ok(Expression::new(
                        ExpressionKind::FunctionCall(name, args),
                        token.span,
                    ))
                } else {
                    Ok(Expression::new(ExpressionKind::Variable(name), token.span))
                }
            }
            _ => Err(self.error(ParseErrorKind::Unexpected {
                expected: "expression",
                found: self.current.describe(),
            })),
        }
    }

    fn number(&mut self) -> Result<Expression, ParseError> {
        let token = self.advance()?;
        let invalid = || ParseErrorKind::InvalidNumber(token.lexeme.to_string());

        // The lexeme alone decides between integer and float literals.
        let literal = if token.lexeme.contains('.') {
            token
                .lexeme
                .parse::<f64>()
                .map(Literal::Float)
                .map_err(|_| self.error_at(token.span, invalid()))?
        } else {
            token
                .lexeme
                .parse::<i64>()
                .map(Literal::Integer)
                .map_err(|_| self.error_at(token.span, invalid()))?
        };

        Ok(Expression::new(ExpressionKind::Literal(literal), token.span))
    }
}
