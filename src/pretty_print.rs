use crate::{Error, EvalError, ParseError};
use ariadne::{Label, Report, ReportKind, Source};
use std::ops::Range;

type ReplReport<'a> = ariadne::ReportBuilder<'a, (&'static str, Range<usize>)>;

impl ParseError {
    fn report(&self, input: &str) -> ReplReport<'static> {
        match self {
            ParseError::UnexpectedToken { found, expected } => {
                Report::build(ReportKind::Error, ("REPL", found.span.to_range()))
                    .with_message(format!("Unexpected token: {}", found.kind))
                    .with_label(
                        Label::new(("REPL", found.span.to_range()))
                            .with_message(format!("Expected {expected}")),
                    )
            }
            ParseError::UnexpectedEof(expected) => {
                let idx = input.len();
                Report::build(ReportKind::Error, ("REPL", idx..idx))
                    .with_message("Unexpected EOF")
                    .with_label(
                        Label::new(("REPL", idx..idx)).with_message(format!("Expected {expected}")),
                    )
            }
            ParseError::LexerError(lex_err) => {
                Report::build(ReportKind::Error, ("REPL", lex_err.span.to_range()))
                    .with_message("Lexer Error")
                    .with_label(
                        Label::new(("REPL", lex_err.span.to_range()))
                            .with_message(lex_err.error.to_string()),
                    )
            }
            ParseError::InvalidDotSyntax(span) => {
                Report::build(ReportKind::Error, ("REPL", span.to_range()))
                    .with_message("Invalid Dot Syntax")
                    .with_label(
                        Label::new(("REPL", span.to_range()))
                            .with_message("A dot may only precede the last element of a list"),
                    )
            }
            ParseError::UnsupportedQuote(span) => {
                Report::build(ReportKind::Error, ("REPL", span.to_range()))
                    .with_message("Quote shorthand is not supported")
                    .with_label(
                        Label::new(("REPL", span.to_range())).with_message("Write (quote ...) instead"),
                    )
            }
        }
    }
}

impl EvalError {
    // Values carry no source positions, so the whole input is labelled.
    fn report(&self, input: &str) -> ReplReport<'static> {
        let whole = 0..input.len();
        let (title, hint) = match self {
            EvalError::EnvError(_) => ("Unbound symbol", "This symbol is not defined in the current scope"),
            EvalError::InvalidSpecialForm(_) => {
                ("Invalid special form", "This special form is malformed or incomplete")
            }
            EvalError::NoSuchFunction(_) => ("No such function", "This operator cannot be called"),
            EvalError::TypeMismatch { .. } => ("Type mismatch", "An argument has the wrong type"),
            _ => ("Evaluation failed", "While evaluating this expression"),
        };
        Report::build(ReportKind::Error, ("REPL", whole.clone()))
            .with_message(format!("{}: {}", title, self))
            .with_label(Label::new(("REPL", whole)).with_message(hint))
    }
}

impl Error {
    /// Writes a diagnostic for this error against `input` to stderr.
    pub fn pretty_print(&self, input: &str) -> std::io::Result<()> {
        let report = match self {
            Error::Parse(err) => err.report(input),
            Error::Eval(err) => err.report(input),
            Error::EmptyInput => Report::build(ReportKind::Error, ("REPL", 0..0))
                .with_message("Nothing was entered"),
        };
        report.finish().eprint(("REPL", Source::from(input)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Interpreter;

    fn render(error: &Error, input: &str) -> String {
        let report = match error {
            Error::Parse(err) => err.report(input),
            Error::Eval(err) => err.report(input),
            Error::EmptyInput => panic!("No report source for empty input"),
        };
        let mut out = Vec::new();
        report
            .with_config(ariadne::Config::default().with_color(false))
            .finish()
            .write(("REPL", Source::from(input)), &mut out)
            .expect("Writing to a Vec cannot fail");
        String::from_utf8(out).expect("Report is UTF-8")
    }

    #[test]
    fn test_parse_error_report_names_the_token() {
        let input = "(1 2))";
        let error = Interpreter::new().run(input).unwrap_err();
        let text = render(&error, input);
        assert!(text.contains("Unexpected token: )"), "{}", text);
        assert!(text.contains("Expected end of input"), "{}", text);
    }

    #[test]
    fn test_eval_error_report_contains_message() {
        let input = "(car 1)";
        let error = Interpreter::new().run(input).unwrap_err();
        let text = render(&error, input);
        assert!(text.contains("Type mismatch"), "{}", text);
        assert!(text.contains("car expects a pair, got integer"), "{}", text);
    }
}
