use std::fmt::Display;

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    // Single-character tokens
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Semicolon,
    Minus,
    Plus,
    Slash,
    Star,
    Percent,

    // One or two character tokens
    Equal,
    EqualEqual,
    BangEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Literals
    Identifier,
    String,
    Number,

    // Keywords
    And,
    Else,
    False,
    Function,
    If,
    Loop,
    Or,
    Return,
    True,

    Eof,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TokenType::LeftParen => "(",
            TokenType::RightParen => ")",
            TokenType::LeftBrace => "{",
            TokenType::RightBrace => "}",
            TokenType::Comma => ",",
            TokenType::Semicolon => ";",
            TokenType::Minus => "-",
            TokenType::Plus => "+",
            TokenType::Slash => "/",
            TokenType::Star => "*",
            TokenType::Percent => "%",
            TokenType::Equal => "=",
            TokenType::EqualEqual => "==",
            TokenType::BangEqual => "!=",
            TokenType::Greater => ">",
            TokenType::GreaterEqual => ">=",
            TokenType::Less => "<",
            TokenType::LessEqual => "<=",
            TokenType::Identifier => "identifier",
            TokenType::String => "string",
            TokenType::Number => "number",
            TokenType::And => "and",
            TokenType::Else => "else",
            TokenType::False => "false",
            TokenType::Function => "function",
            TokenType::If => "if",
            TokenType::Loop => "loop",
            TokenType::Or => "or",
            TokenType::Return => "return",
            TokenType::True => "true",
            TokenType::Eof => "end of input",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub token_type: TokenType,
    pub lexeme: &'a str,
    pub span: Span,
}

impl Token<'_> {
    /// Human readable form used in diagnostics.
    pub fn describe(&self) -> String {
        match self.token_type {
            TokenType::Eof => "end of input".to_string(),
            _ => format!("\"{}\"", self.lexeme),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenizeError {
    #[error("Unexpected character '{character}' at {span}")]
    UnexpectedCharacter { character: char, span: Span },
    #[error("Unterminated string starting at {span}")]
    UnterminatedString { span: Span },
}

impl TokenizeError {
    pub fn span(&self) -> Span {
        match self {
            TokenizeError::UnexpectedCharacter { span, .. } => *span,
            TokenizeError::UnterminatedString { span } => *span,
        }
    }
}

/// Pull-based tokenizer. Each call to [`Tokenizer::token`] produces the next
/// token; once the input is exhausted it keeps returning `Eof`.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    rest: &'a str,
    span: Span,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            rest: source,
            span: Span::default(),
        }
    }

    pub fn token(&mut self) -> Result<Token<'a>, TokenizeError> {
        while let Some((_, rest)) = maximal(&[whitespace, line_comment, block_comment], self.rest)
        {
            self.consume(rest);
        }

        let span = self.span;
        let Some(first) = self.rest.chars().next() else {
            return Ok(Token {
                token_type: TokenType::Eof,
                lexeme: self.rest,
                span,
            });
        };

        let Some((token_type, rest)) = maximal(
            &[
                // Single-character tokens
                left_paren,
                right_paren,
                left_brace,
                right_brace,
                comma,
                semicolon,
                minus,
                plus,
                slash,
                star,
                percent,
                // One or two character tokens
                equal,
                equal_equal,
                bang_equal,
                greater,
                greater_equal,
                less,
                less_equal,
                // Keywords
                and,
                else_,
                false_,
                function,
                if_,
                loop_,
                or,
                return_,
                true_,
                // Literals
                identifier,
                string,
                number,
            ],
            self.rest,
        ) else {
            return Err(if first == '"' {
                TokenizeError::UnterminatedString { span }
            } else {
                TokenizeError::UnexpectedCharacter {
                    character: first,
                    span,
                }
            });
        };

        let source = self.rest;
        let lexeme = &source[..source.len() - rest.len()];
        self.consume(rest);

        Ok(Token {
            token_type,
            lexeme,
            span,
        })
    }

    fn consume(&mut self, rest: &'a str) {
        let source = self.rest;
        self.span = self.span.advance(&source[..source.len() - rest.len()]);
        self.rest = rest;
    }
}

/// Tokenizes the whole source, including the trailing `Eof` token.
pub fn tokens(source: &str) -> Result<Vec<Token<'_>>, TokenizeError> {
    let mut tokenizer = Tokenizer::new(source);
    let mut tokens = Vec::new();

    loop {
        let token = tokenizer.token()?;
        let done = token.token_type == TokenType::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }

    Ok(tokens)
}

fn maximal<'a, T: std::fmt::Debug>(
    parsers: &[fn(&str) -> Option<(T, &str)>],
    source: &'a str,
) -> Option<(T, &'a str)> {
    let mut min_left = source.len() + 1;
    let mut max_match = None;

    let matching_parsers = parsers.iter().filter_map(|parser| parser(source));
    for (m, rest) in matching_parsers {
        let left = rest.len();
        if left < min_left {
            min_left = left;
            max_match = Some((m, rest));
        }
    }

    max_match
}

fn whitespace(source: &str) -> Option<((), &str)> {
    let len = source
        .chars()
        .take_while(|c| c.is_whitespace())
        .map(char::len_utf8)
        .sum();
    if len > 0 {
        Some(((), &source[len..]))
    } else {
        None
    }
}

fn line_comment(source: &str) -> Option<((), &str)> {
    if source.starts_with("//") {
        let len = source
            .chars()
            .take_while(|c| *c != '\n')
            .map(char::len_utf8)
            .sum();
        Some(((), &source[len..]))
    } else {
        None
    }
}

// An unterminated block comment runs to the end of the input.
fn block_comment(source: &str) -> Option<((), &str)> {
    let body = source.strip_prefix("/*")?;
    match body.find("*/") {
        Some(end) => Some(((), &body[end + 2..])),
        None => Some(((), &body[body.len()..])),
    }
}

macro_rules! match_literal {
    ($name:ident, $word:literal, $token:expr) => {
        fn $name(source: &str) -> Option<(TokenType, &str)> {
            if source.starts_with($word) {
                Some(($token, &source[$word.len()..]))
            } else {
                None
            }
        }
    };
}

match_literal! { left_paren, "(", TokenType::LeftParen }
match_literal! { right_paren, ")", TokenType::RightParen }
match_literal! { left_brace, "{", TokenType::LeftBrace }
match_literal! { right_brace, "}", TokenType::RightBrace }
match_literal! { comma, ",", TokenType::Comma }
match_literal! { semicolon, ";", TokenType::Semicolon }
match_literal! { minus, "-", TokenType::Minus }
match_literal! { plus, "+", TokenType::Plus }
match_literal! { slash, "/", TokenType::Slash }
match_literal! { star, "*", TokenType::Star }
match_literal! { percent, "%", TokenType::Percent }
match_literal! { equal, "=", TokenType::Equal }
match_literal! { greater, ">", TokenType::Greater }
match_literal! { less, "<", TokenType::Less }
match_literal! { equal_equal, "==", TokenType::EqualEqual }
match_literal! { bang_equal, "!=", TokenType::BangEqual }
match_literal! { greater_equal, ">=", TokenType::GreaterEqual }
match_literal! { less_equal, "<=", TokenType::LessEqual }
match_literal! { and, "and", TokenType::And }
match_literal! { else_, "else", TokenType::Else }
match_literal! { false_, "false", TokenType::False }
match_literal! { function, "function", TokenType::Function }
match_literal! { if_, "if", TokenType::If }
match_literal! { loop_, "loop", TokenType::Loop }
match_literal! { or, "or", TokenType::Or }
match_literal! { return_, "return", TokenType::Return }
match_literal! { true_, "true", TokenType::True }

fn identifier(source: &str) -> Option<(TokenType, &str)> {
    let mut chars = source.chars();

    let first = chars.next()?;
    if !first.is_ascii_alphabetic() && first != '_' {
        return None;
    }

    let len = first.len_utf8()
        + chars
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .map(char::len_utf8)
            .sum::<usize>();

    Some((TokenType::Identifier, &source[len..]))
}

fn string(source: &str) -> Option<(TokenType, &str)> {
    let body = source.strip_prefix('"')?;
    let end = body.find('"')?;
    Some((TokenType::String, &body[end + 1..]))
}

fn number(source: &str) -> Option<(TokenType, &str)> {
    let integer_len = source.chars().take_while(char::is_ascii_digit).count();
    if integer_len == 0 {
        return None;
    }

    let mut len = integer_len;
    if source[len..].starts_with('.') {
        len += 1;
        len += source[len..].chars().take_while(char::is_ascii_digit).count();
    }

    Some((TokenType::Number, &source[len..]))
}

#[cfg(test)]
mod test {
    use super::*;

    fn token_types(source: &str) -> Vec<TokenType> {
        tokens(source)
            .unwrap()
            .into_iter()
            .map(|token| token.token_type)
            .collect()
    }

    #[test]
    fn test_tokens() {
        let source = "x = 1;";
        let expected = vec![
            TokenType::Identifier,
            TokenType::Equal,
            TokenType::Number,
            TokenType::Semicolon,
            TokenType::Eof,
        ];
        assert_eq!(token_types(source), expected);
    }

    #[test]
    fn test_tokens_with_comments() {
        let source = "x = 1; // comment\n/* block\ncomment */ y";
        let expected = vec![
            TokenType::Identifier,
            TokenType::Equal,
            TokenType::Number,
            TokenType::Semicolon,
            TokenType::Identifier,
            TokenType::Eof,
        ];
        assert_eq!(token_types(source), expected);
    }

    #[test]
    fn test_tokens_with_string() {
        let tokens = tokens("x = \"hello world\";").unwrap();
        assert_eq!(tokens[2].token_type, TokenType::String);
        assert_eq!(tokens[2].lexeme, "\"hello world\"");
    }

    #[test]
    fn test_numbers_keep_their_lexeme() {
        let tokens = tokens("12 3.25 4.").unwrap();
        let lexemes: Vec<_> = tokens.iter().map(|t| t.lexeme).collect();
        assert_eq!(lexemes, vec!["12", "3.25", "4.", ""]);
    }

    #[test]
    fn test_keywords_win_ties_but_not_longer_identifiers() {
        let expected = vec![
            TokenType::If,
            TokenType::Identifier,
            TokenType::Function,
            TokenType::Identifier,
            TokenType::Loop,
            TokenType::Eof,
        ];
        assert_eq!(token_types("if iffy function functions loop"), expected);
    }

    #[test]
    fn test_two_character_operators() {
        let expected = vec![
            TokenType::Identifier,
            TokenType::EqualEqual,
            TokenType::Identifier,
            TokenType::BangEqual,
            TokenType::LessEqual,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::Eof,
        ];
        assert_eq!(token_types("a==b != <= >= <"), expected);
    }

    #[test]
    fn test_positions() {
        let tokens = tokens("x = 1;\n  print(x);").unwrap();
        assert_eq!(tokens[0].span, Span::new(1, 1));
        assert_eq!(tokens[2].span, Span::new(1, 5));
        assert_eq!(tokens[4].span, Span::new(2, 3));
        assert_eq!(tokens[5].span, Span::new(2, 8));
    }

    #[test]
    fn test_unexpected_character() {
        let error = tokens("x = 1;\ny = #;").unwrap_err();
        assert_eq!(
            error,
            TokenizeError::UnexpectedCharacter {
                character: '#',
                span: Span::new(2, 5),
            }
        );
    }

    #[test]
    fn test_unterminated_string() {
        let error = tokens("print(\"oops);").unwrap_err();
        assert_eq!(
            error,
            TokenizeError::UnterminatedString {
                span: Span::new(1, 7)
            }
        );
    }

    #[test]
    fn test_eof_is_sticky() {
        let mut tokenizer = Tokenizer::new("x");
        assert_eq!(tokenizer.token().unwrap().token_type, TokenType::Identifier);
        assert_eq!(tokenizer.token().unwrap().token_type, TokenType::Eof);
        assert_eq!(tokenizer.token().unwrap().token_type, TokenType::Eof);
    }
}
