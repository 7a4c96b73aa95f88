use crate::environment::{EnvRef, Environment};
use crate::evaluator::{EvalError, evaluate};
use crate::parser::{ParseError, Parser};
use std::rc::Rc;
use thiserror::Error;

/// Anything that can go wrong in a single [`Interpreter::run`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("Nothing was entered")]
    EmptyInput,
}

/// The three families a host reports errors under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Name,
    Runtime,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse(_) => ErrorKind::Syntax,
            Error::Eval(EvalError::InvalidSpecialForm(_)) => ErrorKind::Syntax,
            Error::Eval(EvalError::EnvError(_)) => ErrorKind::Name,
            Error::Eval(_) | Error::EmptyInput => ErrorKind::Runtime,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Syntax => write!(f, "Syntax error"),
            ErrorKind::Name => write!(f, "Name error"),
            ErrorKind::Runtime => write!(f, "Runtime error"),
        }
    }
}

/// Owns one global scope and evaluates one expression per [`run`](Self::run).
///
/// State persists between runs: a `define` in one call is visible to the
/// next. Failing runs keep whatever they changed before the error.
#[derive(Debug)]
pub struct Interpreter {
    global_env: EnvRef,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            global_env: Environment::new(),
        }
    }

    pub fn global_env(&self) -> EnvRef {
        Rc::clone(&self.global_env)
    }

    /// Parses exactly one expression from `input`, evaluates it against the
    /// global scope and renders the result.
    pub fn run(&mut self, input: &str) -> Result<String, Error> {
        let parser = Parser::new(input)?;
        if parser.is_end() {
            return Err(Error::EmptyInput);
        }
        let expr = parser.parse()?;
        if expr.is_nil() {
            return Err(Error::EmptyInput);
        }
        tracing::debug!(expr = %expr.render(), "evaluating");

        let result = evaluate(&expr, &self.global_env)?;
        tracing::debug!(result = %result.render(), "evaluated");
        Ok(result.render())
    }
}
