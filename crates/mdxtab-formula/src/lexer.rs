//! Expression lexer
//!
//! Turns an expression string into a flat token stream. Offsets are byte
//! offsets into the source and every stream ends with an [`TokenKind::Eof`]
//! token positioned at `source.len()`.

use crate::error::{FormulaError, FormulaResult};

/// Token types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    String,
    Boolean,
    Identifier,
    LeftParen,
    RightParen,
    Comma,
    Dot,
    LeftBracket,
    RightBracket,
    /// Arithmetic, comparison and logical (`and` / `or`) operators
    Operator,
    Eof,
}

/// A lexed token
///
/// `text` is the source slice, except for strings where it holds the
/// unescaped contents.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    fn new<S: Into<String>>(kind: TokenKind, text: S, start: usize, end: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            start,
            end,
        }
    }

    /// Check whether this is the given operator
    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == op
    }
}

const TWO_CHAR_OPERATORS: [&str; 4] = ["==", "!=", "<=", ">="];
const ONE_CHAR_OPERATORS: [char; 6] = ['+', '-', '*', '/', '<', '>'];

/// Lex an expression into tokens
///
/// # Example
/// ```rust
/// use mdxtab_formula::{lex, TokenKind};
///
/// let tokens = lex("rates[category].rate * 2").unwrap();
/// assert_eq!(tokens.first().unwrap().kind, TokenKind::Identifier);
/// assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
///
/// assert!(lex("{{ expenses.total }}").is_err());
/// ```
pub fn lex(source: &str) -> FormulaResult<Vec<Token>> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> FormulaResult<Vec<Token>> {
        loop {
            self.skip_whitespace();
            let c = match self.peek_char() {
                Some(c) => c,
                None => break,
            };

            if c == '{' && self.peek_char_at(1) == Some('{') {
                return Err(FormulaError::lex(
                    self.pos,
                    "'{{' is reserved for document interpolation and not allowed in expressions",
                ));
            }

            if c.is_ascii_digit()
                || (c == '.' && self.peek_char_at(1).map_or(false, |n| n.is_ascii_digit()))
            {
                self.scan_number();
                continue;
            }

            if c == '"' {
                self.scan_string()?;
                continue;
            }

            if c.is_ascii_alphabetic() || c == '_' {
                self.scan_word();
                continue;
            }

            if let Some(kind) = delimiter_kind(c) {
                self.push_slice(kind, self.pos, self.pos + 1);
                self.pos += 1;
                continue;
            }

            if let Some(op) = TWO_CHAR_OPERATORS
                .iter()
                .find(|op| self.input[self.pos..].starts_with(*op))
            {
                self.push_slice(TokenKind::Operator, self.pos, self.pos + op.len());
                self.pos += op.len();
                continue;
            }

            if ONE_CHAR_OPERATORS.contains(&c) {
                self.push_slice(TokenKind::Operator, self.pos, self.pos + 1);
                self.pos += 1;
                continue;
            }

            return Err(FormulaError::lex(
                self.pos,
                format!("unexpected character '{}' at offset {}", c, self.pos),
            ));
        }

        let end = self.input.len();
        self.tokens.push(Token::new(TokenKind::Eof, "", end, end));
        Ok(self.tokens)
    }

    fn scan_number(&mut self) {
        let start = self.pos;

        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // A dot belongs to the number only when a digit follows, so that
        // `1.foo` still lexes as member access.
        if self.peek_char() == Some('.')
            && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit())
        {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        self.push_slice(TokenKind::Number, start, self.pos);
    }

    fn scan_string(&mut self) -> FormulaResult<()> {
        let start = self.pos;
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Err(FormulaError::lex(
                        start,
                        format!("unterminated string starting at offset {}", start),
                    ))
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let escaped = self.peek_char().ok_or_else(|| {
                        FormulaError::lex(
                            start,
                            format!("unterminated string starting at offset {}", start),
                        )
                    })?;
                    s.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                    self.advance();
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }

        self.tokens
            .push(Token::new(TokenKind::String, s, start, self.pos));
        Ok(())
    }

    fn scan_word(&mut self) {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let kind = match &self.input[start..self.pos] {
            "true" | "false" => TokenKind::Boolean,
            "and" | "or" => TokenKind::Operator,
            _ => TokenKind::Identifier,
        };
        self.push_slice(kind, start, self.pos);
    }

    // === Helper methods ===

    fn push_slice(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens
            .push(Token::new(kind, &self.input[start..end], start, end));
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_ascii_whitespace()) {
            self.advance();
        }
    }
}

fn delimiter_kind(c: char) -> Option<TokenKind> {
    match c {
        '(' => Some(TokenKind::LeftParen),
        ')' => Some(TokenKind::RightParen),
        ',' => Some(TokenKind::Comma),
        '.' => Some(TokenKind::Dot),
        '[' => Some(TokenKind::LeftBracket),
        ']' => Some(TokenKind::RightBracket),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lex_arithmetic() {
        assert_eq!(
            kinds("1 + foo * 2"),
            vec![
                TokenKind::Number,
                TokenKind::Operator,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Number,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_numbers() {
        let tokens = lex("42 3.14 .5").unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["42", "3.14", ".5", ""]);
    }

    #[test]
    fn test_lex_number_then_member() {
        assert_eq!(
            kinds("1.x"),
            vec![
                TokenKind::Number,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_lex_offsets_and_eof() {
        let tokens = lex("ab <= 10").unwrap();
        assert_eq!((tokens[0].start, tokens[0].end), (0, 2));
        assert_eq!(tokens[1].text, "<=");
        assert_eq!((tokens[1].start, tokens[1].end), (3, 5));
        let eof = tokens.last().unwrap();
        assert_eq!((eof.kind, eof.start, eof.end), (TokenKind::Eof, 8, 8));
    }

    #[test]
    fn test_lex_two_char_operators_first() {
        let tokens = lex("a==b!=c>=d<e").unwrap();
        let ops: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Operator)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(ops, vec!["==", "!=", ">=", "<"]);
    }

    #[test]
    fn test_lex_keywords() {
        let tokens = lex("true and false or x").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Boolean);
        assert!(tokens[1].is_operator("and"));
        assert_eq!(tokens[2].kind, TokenKind::Boolean);
        assert!(tokens[3].is_operator("or"));
        assert_eq!(tokens[4].kind, TokenKind::Identifier);
    }

    #[test]
    fn test_lex_strings() {
        let tokens = lex(r#""a \"quoted\" \\ value""#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text, r#"a "quoted" \ value"#);
        assert_eq!(tokens[1].kind, TokenKind::Eof);
    }

    #[test]
    fn test_lex_unterminated_string() {
        let err = lex(r#"name == "abc"#).unwrap_err();
        assert!(matches!(err, FormulaError::Lex { offset: 8, .. }));
    }

    #[test]
    fn test_lex_rejects_interpolation() {
        assert!(matches!(
            lex("{{ foo }}"),
            Err(FormulaError::Lex { offset: 0, .. })
        ));
    }

    #[test]
    fn test_lex_unknown_character() {
        let err = lex("a % b").unwrap_err();
        assert_eq!(err.to_string(), "Lex error at offset 2: unexpected character '%' at offset 2");

        // A lone brace is just an unknown character
        assert!(lex("{ a }").is_err());
        assert!(lex("a = b").is_err());
    }

    #[test]
    fn test_lex_empty() {
        assert_eq!(kinds("   "), vec![TokenKind::Eof]);
    }

    proptest! {
        #[test]
        fn prop_interpolation_braces_never_lex(prefix in "[a-z0-9 +*]{0,12}", suffix in "[a-z0-9 }]{0,12}") {
            let source = format!("{}{{{{{}", prefix, suffix);
            prop_assert!(lex(&source).is_err());
        }

        #[test]
        fn prop_eof_at_end(source in "[a-z_][a-z0-9_]{0,8}( [+*/-] [0-9]{1,4}){0,4}") {
            let tokens = lex(&source).unwrap();
            let eof = tokens.last().unwrap();
            prop_assert_eq!(eof.kind, TokenKind::Eof);
            prop_assert_eq!(eof.start, source.len());
        }
    }
}
