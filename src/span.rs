use std::fmt::Display;

/// A 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Position reached after reading `text` starting from `self`.
    pub fn advance(self, text: &str) -> Span {
        let mut span = self;
        for c in text.chars() {
            if c == '\n' {
                span.line += 1;
                span.column = 1;
            } else {
                span.column += 1;
            }
        }
        span
    }
}

impl Default for Span {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_tracks_lines_and_columns() {
        let span = Span::default().advance("ab\ncd");
        assert_eq!(span, Span::new(2, 3));
    }
}
