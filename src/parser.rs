use crate::Span;
use crate::lexer::{LexerError, Token, TokenKind, Tokenizer};
use crate::types::{DOT, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse Error [at {}]: Unexpected token '{}', expected {expected}", .found.span, .found.kind)]
    UnexpectedToken { found: Token, expected: String },
    #[error("Parse Error: Unexpected end of input during parsing. Expected {0}")]
    UnexpectedEof(String),
    #[error("Lexer Error during parse: {0}")]
    LexerError(#[from] LexerError),
    #[error("Parse Error: Invalid syntax for dotted pair at [{0}]")]
    InvalidDotSyntax(Span),
    #[error("Parse Error: Quote shorthand is not supported at [{0}], use (quote ...)")]
    UnsupportedQuote(Span),
}

// Result type alias for convenience
type ParseResult<T> = Result<T, ParseError>;

/// Recursive-descent reader over a lazy token stream.
pub struct Parser<'src> {
    tokenizer: Tokenizer<'src>,
}

impl<'src> Parser<'src> {
    pub fn new(input: &'src str) -> ParseResult<Self> {
        Ok(Parser {
            tokenizer: Tokenizer::new(input)?,
        })
    }

    pub fn is_end(&self) -> bool {
        self.tokenizer.is_end()
    }

    // Consumes the current token if available.
    fn next_token(&mut self) -> ParseResult<Option<Token>> {
        let token = self.tokenizer.token().cloned();
        if token.is_some() {
            self.tokenizer.advance()?;
        }
        Ok(token)
    }

    /// Reads a single datum from the token stream.
    pub fn read(&mut self) -> ParseResult<Value> {
        self.read_spanned().map(|(value, _)| value)
    }

    fn read_spanned(&mut self) -> ParseResult<(Value, Span)> {
        let Some(token) = self.next_token()? else {
            return Err(ParseError::UnexpectedEof("an expression".to_string()));
        };
        let span = token.span;
        let value = match token.kind {
            TokenKind::Integer(n) => Value::Integer(n),
            TokenKind::Symbol(name) => Value::Atom(name),
            TokenKind::LParen => return self.read_list(span),
            TokenKind::RParen => {
                return Err(ParseError::UnexpectedToken {
                    found: token,
                    expected: "an atom or '('".to_string(),
                });
            }
            TokenKind::Quote => return Err(ParseError::UnsupportedQuote(span)),
            // Only meaningful inside a list, where build_list checks its position
            TokenKind::Dot => Value::atom(DOT),
        };
        Ok((value, span))
    }

    /// Reads list elements up to the matching close bracket. `open` is the
    /// span of the opening bracket, which has already been consumed.
    fn read_list(&mut self, open: Span) -> ParseResult<(Value, Span)> {
        let mut items = Vec::new();
        loop {
            match self.tokenizer.token() {
                None => return Err(ParseError::UnexpectedEof("')'".to_string())),
                Some(Token {
                    kind: TokenKind::RParen,
                    span,
                }) => {
                    let span = open.merge(*span);
                    self.tokenizer.advance()?;
                    return Ok((build_list(&items, 0)?, span));
                }
                Some(_) => items.push(self.read_spanned()?),
            }
        }
    }

    /// Parses exactly one expression and requires the input to end there.
    pub fn parse(mut self) -> ParseResult<Value> {
        let expr = self.read()?;

        if let Some(found) = self.next_token()? {
            Err(ParseError::UnexpectedToken {
                found,
                expected: "end of input".to_string(),
            })
        } else {
            Ok(expr)
        }
    }
}

/// Right-folds `items[pos..]` into a pair chain. A dot atom is only allowed
/// as the second-to-last element (and not first), where it makes the final
/// element the tail of an improper list.
pub fn build_list(items: &[(Value, Span)], pos: usize) -> ParseResult<Value> {
    let elements = items.get(pos..).unwrap_or(&[]);
    let mut end = elements.len();
    let mut tail = Value::Nil;

    if let Some(dot) = elements.iter().position(|(value, _)| value.is_atom(DOT)) {
        let index = pos + dot;
        if index == 0 || index + 2 != items.len() {
            return Err(ParseError::InvalidDotSyntax(elements[dot].1));
        }
        tail = elements[dot + 1].0.clone();
        end = dot;
    }

    Ok(elements[..end]
        .iter()
        .rev()
        .fold(tail, |tail, (value, _)| Value::cons(value.clone(), tail)))
}

// Helper function to parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Value> {
    Parser::new(input)?.parse()
}
