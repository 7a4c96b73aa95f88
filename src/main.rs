use std::process::ExitCode;

use schemelet::Interpreter;

// Evaluates each argument in order against one shared interpreter.
fn main() -> ExitCode {
    let inputs: Vec<String> = std::env::args().skip(1).collect();
    if inputs.is_empty() {
        eprintln!("Usage: schemelet <expression>...");
        eprintln!("Run the `repl` binary for an interactive session.");
        return ExitCode::FAILURE;
    }

    let mut interpreter = Interpreter::new();
    for input in &inputs {
        match interpreter.run(input) {
            Ok(output) => println!("{}", output),
            Err(e) => {
                eprintln!("{}: {}", e.kind(), e);
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}
