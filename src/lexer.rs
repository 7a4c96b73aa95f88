use logos::{Lexer, Logos};
use std::fmt;
use thiserror::Error;

use crate::Span;

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\n\r]+")] // Skip whitespace
#[logos(skip r";[^\n\r]*")] // Skip comments
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("'")]
    Quote,
    #[token(".")]
    Dot,
    #[regex(r"[+-]?[0-9]+", parse_integer)]
    Integer(i64),
    // A sign that is not followed by a digit is a one-character symbol.
    #[regex(r"[+-]", |lex| lex.slice().to_string())]
    #[regex(r"[a-zA-Z<=>*/#][^ \t\n\r()';]*", parse_symbol)]
    Symbol(String),
}

const SYMBOL_CONTINUE: &str = "<=>*/#?!-";

pub fn is_symbol_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || SYMBOL_CONTINUE.contains(c)
}

fn parse_integer(lex: &mut Lexer<TokenKind>) -> LexerResult<i64> {
    let slice = lex.slice();
    slice
        .parse::<i64>()
        .map_err(|_| LexerErrorKind::InvalidNumberFormat(slice.to_string()))
}

// The regex swallows everything up to the next delimiter so that a stray
// character inside a symbol is reported instead of silently splitting it.
fn parse_symbol(lex: &mut Lexer<TokenKind>) -> LexerResult<String> {
    let slice = lex.slice();
    match slice.chars().skip(1).find(|c| !is_symbol_continue(*c)) {
        Some(bad) => Err(LexerErrorKind::InvalidCharacter(bad)),
        None => Ok(slice.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

// Implement Display for easy printing
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Quote => write!(f, "'"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::Symbol(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Error, Default, Debug, Clone, PartialEq, Eq)]
pub enum LexerErrorKind {
    #[error("Invalid number format: '{0}'")]
    InvalidNumberFormat(String),
    #[error("Invalid character encountered: '{0}'")]
    InvalidCharacter(char),
    #[default]
    #[error("Invalid Token")]
    InvalidToken,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{error}")]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
}

// Result type alias for convenience
type LexerResult<T> = Result<T, LexerErrorKind>;

// Result type alias for convenience
type LexerRangedResult<T> = Result<T, LexerError>;

/// A token stream with exactly one token of lookahead.
///
/// The current token is available through [`Tokenizer::token`] until
/// [`Tokenizer::advance`] moves past it. Tokens are produced lazily, so a
/// malformed character is only reported once the reader gets to it.
pub struct Tokenizer<'src> {
    lexer: Lexer<'src, TokenKind>,
    current: Option<Token>,
}

impl<'src> Tokenizer<'src> {
    pub fn new(input: &'src str) -> LexerRangedResult<Self> {
        let mut tokenizer = Tokenizer {
            lexer: TokenKind::lexer(input),
            current: None,
        };
        tokenizer.advance()?;
        Ok(tokenizer)
    }

    /// True once the input and the lookahead are both exhausted.
    pub fn is_end(&self) -> bool {
        self.current.is_none()
    }

    pub fn token(&self) -> Option<&Token> {
        self.current.as_ref()
    }

    pub fn advance(&mut self) -> LexerRangedResult<()> {
        self.current = match self.lexer.next() {
            None => None,
            Some(result) => {
                let span = Span::from(self.lexer.span());
                match result {
                    Ok(kind) => Some(Token { kind, span }),
                    Err(LexerErrorKind::InvalidToken) => {
                        let error = match self.lexer.slice().chars().next() {
                            Some(c) => LexerErrorKind::InvalidCharacter(c),
                            None => LexerErrorKind::InvalidToken,
                        };
                        return Err(LexerError { error, span });
                    }
                    Err(error) => return Err(LexerError { error, span }),
                }
            }
        };
        Ok(())
    }
}

// Helper function to tokenize a string directly (useful for tests and completion)
pub fn tokenize(input: &str) -> LexerRangedResult<Vec<Token>> {
    let mut tokenizer = Tokenizer::new(input)?;
    let mut tokens = Vec::new();
    while let Some(token) = tokenizer.token() {
        tokens.push(token.clone());
        tokenizer.advance()?;
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper to simplify testing token sequences
    fn assert_tokens(input: &str, expected: Vec<TokenKind>) {
        match tokenize(input) {
            Ok(tokens) => {
                let kinds: Vec<TokenKind> = tokens.into_iter().map(|t| t.kind).collect();
                assert_eq!(kinds, expected, "Input: '{}'", input);
            }
            Err(e) => panic!("Lexing failed for input '{}': {}", input, e.error),
        }
    }

    // Helper to simplify testing for lexer errors
    fn assert_lexer_error(input: &str, expected_error_variant: LexerErrorKind) {
        match tokenize(input) {
            Ok(tokens) => panic!(
                "Expected lexing to fail for input '{}', but got tokens: {:?}",
                input, tokens
            ),
            Err(e) => {
                assert_eq!(
                    std::mem::discriminant(&e.error),
                    std::mem::discriminant(&expected_error_variant),
                    "Input: '{}', Expected error variant like {:?}, got: {:?}",
                    input,
                    expected_error_variant,
                    e
                );
            }
        }
    }

    fn sym(s: &str) -> TokenKind {
        TokenKind::Symbol(s.to_string())
    }

    #[test]
    fn test_empty_input() {
        assert_tokens("", vec![]);
        assert_tokens("  \n  ", vec![]);
    }

    #[test]
    fn test_brackets_quote_and_dot() {
        assert_tokens("()", vec![TokenKind::LParen, TokenKind::RParen]);
        assert_tokens("( )", vec![TokenKind::LParen, TokenKind::RParen]);
        assert_tokens(" ' ", vec![TokenKind::Quote]);
        assert_tokens(
            "(1 . 2)",
            vec![
                TokenKind::LParen,
                TokenKind::Integer(1),
                TokenKind::Dot,
                TokenKind::Integer(2),
                TokenKind::RParen,
            ],
        );
    }

    #[test]
    fn test_integers() {
        assert_tokens("123", vec![TokenKind::Integer(123)]);
        assert_tokens("-45", vec![TokenKind::Integer(-45)]);
        assert_tokens("+10", vec![TokenKind::Integer(10)]);
        assert_tokens("0", vec![TokenKind::Integer(0)]);
    }

    #[test]
    fn test_lone_signs_are_symbols() {
        assert_tokens("+", vec![sym("+")]);
        assert_tokens("-", vec![sym("-")]);
        assert_tokens("(- 5)", vec![
            TokenKind::LParen,
            sym("-"),
            TokenKind::Integer(5),
            TokenKind::RParen,
        ]);
        // A sign only reads as part of a number when a digit follows it.
        assert_tokens("-x", vec![sym("-"), sym("x")]);
    }

    #[test]
    fn test_symbols() {
        assert_tokens("foo", vec![sym("foo")]);
        assert_tokens("set-car!", vec![sym("set-car!")]);
        assert_tokens("null?", vec![sym("null?")]);
        assert_tokens("<=", vec![sym("<=")]);
        assert_tokens(">=", vec![sym(">=")]);
        assert_tokens("*", vec![sym("*")]);
        assert_tokens("/", vec![sym("/")]);
        assert_tokens("#t #f", vec![sym("#t"), sym("#f")]);
        assert_tokens("list-ref", vec![sym("list-ref")]);
        assert_tokens("sym123", vec![sym("sym123")]);
    }

    #[test]
    fn test_symbol_followed_by_bracket() {
        assert_tokens(
            "(car x)",
            vec![TokenKind::LParen, sym("car"), sym("x"), TokenKind::RParen],
        );
    }

    #[test]
    fn test_comments() {
        let input = "
            (define x 10) ; Define x
            ; Another comment line
              x";
        assert_tokens(
            input,
            vec![
                TokenKind::LParen,
                sym("define"),
                sym("x"),
                TokenKind::Integer(10),
                TokenKind::RParen,
                sym("x"),
            ],
        );
        assert_tokens("; only comment", vec![]);
    }

    #[test]
    fn test_invalid_mid_symbol_character() {
        assert_lexer_error("ab.c", LexerErrorKind::InvalidCharacter('.'));
        assert_lexer_error("x+1", LexerErrorKind::InvalidCharacter('+'));
        assert_lexer_error("foo$", LexerErrorKind::InvalidCharacter('$'));
    }

    #[test]
    fn test_invalid_start_character() {
        assert_lexer_error("$abc", LexerErrorKind::InvalidCharacter('$'));
        assert_lexer_error("(+ 1 \"2\")", LexerErrorKind::InvalidCharacter('"'));
        assert_lexer_error("?", LexerErrorKind::InvalidCharacter('?'));
    }

    #[test]
    fn test_integer_overflow() {
        assert_lexer_error(
            "99999999999999999999",
            LexerErrorKind::InvalidNumberFormat(String::new()),
        );
    }

    #[test]
    fn test_tokenizer_lookahead() {
        let mut tokenizer = Tokenizer::new("(a 1)").expect("Should tokenize successfully");
        assert!(!tokenizer.is_end());
        assert_eq!(tokenizer.token().map(|t| &t.kind), Some(&TokenKind::LParen));
        tokenizer.advance().unwrap();
        assert_eq!(tokenizer.token().map(|t| &t.kind), Some(&sym("a")));
        tokenizer.advance().unwrap();
        tokenizer.advance().unwrap();
        assert_eq!(tokenizer.token().map(|t| &t.kind), Some(&TokenKind::RParen));
        tokenizer.advance().unwrap();
        assert!(tokenizer.is_end());
        assert!(tokenizer.token().is_none());
    }

    #[test]
    fn test_errors_are_lazy() {
        // The bad character is only reached after the first token is consumed.
        let mut tokenizer = Tokenizer::new("a $").expect("First token is fine");
        assert_eq!(tokenizer.token().map(|t| &t.kind), Some(&sym("a")));
        let err = tokenizer.advance().unwrap_err();
        assert_eq!(err.error, LexerErrorKind::InvalidCharacter('$'));
        assert_eq!(err.span, Span::new(2, 3));
    }

    #[test]
    fn test_tokenize_spans() {
        let input = "(+ 1)";
        let tokens = tokenize(input).expect("Should tokenize successfully");

        assert_eq!(tokens.len(), 4);

        assert_eq!(tokens[0].kind, TokenKind::LParen);
        assert_eq!(tokens[0].span, Span { start: 0, end: 1 });

        assert_eq!(tokens[1].kind, sym("+"));
        assert_eq!(tokens[1].span, Span { start: 1, end: 2 });

        assert_eq!(tokens[2].kind, TokenKind::Integer(1));
        assert_eq!(tokens[2].span, Span { start: 3, end: 4 });

        assert_eq!(tokens[3].kind, TokenKind::RParen);
        assert_eq!(tokens[3].span, Span { start: 4, end: 5 });
    }
}
