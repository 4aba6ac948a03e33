//! Expression parser
//!
//! A Pratt parser over the token stream produced by [`lex`]. Binary operators
//! carry the binding powers defined on [`BinaryOperator`]; postfix call,
//! member and lookup forms bind tighter than any operator.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::lexer::{lex, Token, TokenKind};

/// Lex and parse an expression string
///
/// # Example
/// ```rust
/// use mdxtab_formula::{parse_expression, BinaryOperator, Expr};
///
/// let ast = parse_expression("1 + 2 * 3").unwrap();
/// assert!(matches!(ast, Expr::Binary { op: BinaryOperator::Add, .. }));
/// ```
pub fn parse_expression(source: &str) -> FormulaResult<Expr> {
    let tokens = lex(source)?;
    parse_tokens(&tokens)
}

/// Parse a token stream into an AST
///
/// The stream must end with an end-of-input token, as produced by [`lex`].
pub fn parse_tokens(tokens: &[Token]) -> FormulaResult<Expr> {
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr(0)?;

    let token = parser.current();
    if token.kind != TokenKind::Eof {
        return Err(FormulaError::parse(
            token.start,
            format!(
                "unexpected token '{}' at offset {} after end of expression",
                token.text, token.start
            ),
        ));
    }

    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    eof: Token,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        let end = tokens.last().map_or(0, |t| t.end);
        Self {
            tokens,
            pos: 0,
            eof: Token {
                kind: TokenKind::Eof,
                text: String::new(),
                start: end,
                end,
            },
        }
    }

    // === Token helpers ===

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    fn consume(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> FormulaResult<Token> {
        let token = self.current();
        if token.kind == kind {
            Ok(self.consume())
        } else {
            Err(FormulaError::parse(
                token.start,
                format!("expected {} at offset {}, found {}", what, token.start, describe(token)),
            ))
        }
    }

    // === Grammar ===

    fn parse_expr(&mut self, min_bp: u8) -> FormulaResult<Expr> {
        let mut left = self.parse_prefix()?;
        let mut left_is_comparison = false;

        loop {
            let token = self.current();
            if token.kind != TokenKind::Operator {
                break;
            }
            let op = match BinaryOperator::from_symbol(&token.text) {
                Some(op) => op,
                None => break,
            };

            let bp = op.binding_power();
            if bp <= min_bp {
                break;
            }

            // Comparisons do not chain: `a < b < c` must be parenthesized
            if op.is_comparison() && left_is_comparison {
                return Err(FormulaError::parse(
                    token.start,
                    format!(
                        "comparison '{}' at offset {} cannot be chained; add parentheses",
                        op, token.start
                    ),
                ));
            }

            self.consume();
            let right = self.parse_expr(bp)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
            left_is_comparison = op.is_comparison();
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> FormulaResult<Expr> {
        let token = self.consume();

        let primary = match token.kind {
            TokenKind::Number => {
                let value = token.text.parse::<f64>().map_err(|_| {
                    FormulaError::parse(token.start, format!("invalid number '{}'", token.text))
                })?;
                Expr::Number(value)
            }
            TokenKind::String => Expr::String(token.text),
            TokenKind::Boolean => Expr::Boolean(token.text == "true"),
            TokenKind::Identifier => {
                if self.current().kind == TokenKind::LeftParen {
                    self.parse_call(token.text)?
                } else {
                    Expr::Identifier(token.text)
                }
            }
            TokenKind::LeftParen => {
                let inner = self.parse_expr(0)?;
                self.expect(TokenKind::RightParen, "')'")?;
                inner
            }
            TokenKind::Operator if token.text == "+" || token.text == "-" => {
                let op = if token.text == "-" {
                    UnaryOperator::Negate
                } else {
                    UnaryOperator::Plus
                };
                let operand = self.parse_expr(UnaryOperator::BINDING_POWER)?;
                return Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                });
            }
            _ => {
                return Err(FormulaError::parse(
                    token.start,
                    format!("unexpected {} at offset {}", describe(&token), token.start),
                ))
            }
        };

        self.parse_postfix(primary)
    }

    fn parse_call(&mut self, name: String) -> FormulaResult<Expr> {
        self.expect(TokenKind::LeftParen, "'('")?;

        let mut args = Vec::new();
        if self.current().kind != TokenKind::RightParen {
            loop {
                args.push(self.parse_expr(0)?);
                if self.current().kind == TokenKind::Comma {
                    self.consume();
                } else {
                    break;
                }
            }
        }

        self.expect(TokenKind::RightParen, "')' to close argument list")?;
        Ok(Expr::Call { name, args })
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> FormulaResult<Expr> {
        loop {
            match self.current().kind {
                TokenKind::Dot => {
                    self.consume();
                    let field = self.expect(TokenKind::Identifier, "field name after '.'")?;
                    expr = Expr::Member {
                        base: Box::new(expr),
                        field: field.text,
                    };
                }
                TokenKind::LeftBracket => {
                    self.consume();
                    let key = self.parse_expr(0)?;
                    self.expect(TokenKind::RightBracket, "']'")?;
                    expr = Expr::Lookup {
                        table: Box::new(expr),
                        key: Box::new(key),
                    };
                }
                TokenKind::LeftParen => {
                    let token = self.current();
                    return Err(FormulaError::parse(
                        token.start,
                        format!(
                            "only a function name can be called (offset {})",
                            token.start
                        ),
                    ));
                }
                _ => return Ok(expr),
            }
        }
    }
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Eof => "end of expression".to_string(),
        TokenKind::String => format!("string \"{}\"", token.text),
        _ => format!("'{}'", token.text),
    }
}
