use std::borrow::Cow;

use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{EditMode, Helper, Highlighter, Hinter, Validator};
use schemelet::primitives::operator_names;
use schemelet::{EnvRef, Interpreter};
use tracing_subscriber::EnvFilter;

const DEFAULT_HISTORY_FILE: &str = "schemelet_history.txt";

/// REPL settings, read from `SCHEMELET_HISTORY` and `SCHEMELET_EDIT_MODE`.
#[derive(Debug, Clone, PartialEq)]
struct ReplConfig {
    history_file: String,
    edit_mode: EditMode,
}

impl ReplConfig {
    fn from_env() -> Self {
        Self::from_vars(
            std::env::var("SCHEMELET_HISTORY").ok(),
            std::env::var("SCHEMELET_EDIT_MODE").ok(),
        )
    }

    fn from_vars(history_file: Option<String>, edit_mode: Option<String>) -> Self {
        let edit_mode = match edit_mode.as_deref().map(str::trim) {
            Some(mode) if mode.eq_ignore_ascii_case("vi") => EditMode::Vi,
            _ => EditMode::Emacs,
        };
        ReplConfig {
            history_file: history_file
                .filter(|path| !path.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_HISTORY_FILE.to_string()),
            edit_mode,
        }
    }

    fn editor_config(&self) -> rustyline::Config {
        rustyline::Config::builder()
            .edit_mode(self.edit_mode)
            .build()
    }
}

struct SchemeletCompleter {
    env: EnvRef,
}

impl rustyline::completion::Completer for SchemeletCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        // The word under the cursor runs back to the last delimiter
        let start = line[..pos]
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace() || "()'".contains(*c))
            .map_or(0, |(i, c)| i + c.len_utf8());
        let prefix = &line[start..pos];
        if prefix.is_empty() {
            return Ok((pos, vec![]));
        }

        let mut candidates: Vec<String> = self
            .env
            .borrow()
            .get_identifiers()
            .into_iter()
            .chain(operator_names().map(str::to_string))
            .filter(|id| id.starts_with(prefix))
            .collect();
        candidates.sort();
        candidates.dedup();
        Ok((start, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputValidator {
    #[rustyline(Validator)]
    validator: SchemeletValidator,
    #[rustyline(Highlighter)]
    highlighter: SchemeletHighlighter,
    #[rustyline(Completer)]
    completer: SchemeletCompleter,
}

struct SchemeletValidator;

impl Validator for SchemeletValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let mut depth = 0usize;
        let mut in_comment = false;

        for (i, c) in ctx.input().char_indices() {
            if in_comment {
                in_comment = c != '\n';
                continue;
            }
            match c {
                ';' => in_comment = true,
                '(' => depth += 1,
                ')' => {
                    if depth == 0 {
                        return Ok(ValidationResult::Invalid(Some(format!(
                            "  - Unmatched ')' at position {}",
                            i
                        ))));
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }

        if depth > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct SchemeletHighlighter;

impl Highlighter for SchemeletHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        // (offset in `line`, offset in `highlighted`) of each open bracket
        let mut stack: Vec<(usize, usize)> = Vec::new();
        let mut highlighted = String::with_capacity(line.len());
        let mut in_comment = false;
        let at_cursor = |offset: usize| offset == pos || offset + 1 == pos;

        for (i, c) in line.char_indices() {
            if in_comment || c == ';' {
                in_comment = c != '\n';
                highlighted.push_str(&format!("\x1b[90m{}\x1b[0m", c)); // Grey for comments
                continue;
            }
            match c {
                '(' => {
                    stack.push((i, highlighted.len()));
                    highlighted.push(c);
                }
                ')' => match stack.pop() {
                    Some((open, matching_pos)) if at_cursor(open) || at_cursor(i) => {
                        highlighted.push_str(&format!("\x1b[1;34m{}\x1b[0m", c)); // Blue for matching brackets
                        highlighted.replace_range(matching_pos..matching_pos + 1, "\x1b[1;34m(\x1b[0m");
                    }
                    Some(_) => highlighted.push(c),
                    None => {
                        highlighted.push_str(&format!("\x1b[31m{}\x1b[0m", c)); // Red for unmatched closing brackets
                    }
                },
                _ => highlighted.push(c),
            }
        }

        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> rustyline::Result<()> {
    init_logging();
    let config = ReplConfig::from_env();
    tracing::debug!(?config, "starting repl");

    println!("Schemelet REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let mut interpreter = Interpreter::new();
    let h = InputValidator {
        highlighter: SchemeletHighlighter,
        validator: SchemeletValidator,
        completer: SchemeletCompleter {
            env: interpreter.global_env(),
        },
    };
    let mut rl = Editor::with_config(config.editor_config())?;
    rl.set_helper(Some(h));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(&config.history_file).is_err() {
        println!("No previous history.");
    }

    loop {
        let readline = rl.readline("schemelet> ");
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let trimmed_input = line.trim();
                if trimmed_input.is_empty() {
                    continue;
                }
                if trimmed_input.eq_ignore_ascii_case("exit") {
                    break;
                }

                match interpreter.run(trimmed_input) {
                    Ok(output) => println!("{}", output),
                    Err(e) => {
                        eprintln!("{}: {}", e.kind(), e);
                        if let Err(io_err) = e.pretty_print(trimmed_input) {
                            tracing::warn!(%io_err, "failed to render diagnostic");
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(&config.history_file)
}
