use crate::environment::{EnvError, EnvRef, Environment};
use crate::primitives::{Operator, lookup_operator};
use crate::types::{Closure, FALSE, TRUE, Value};
use std::rc::Rc;
use thiserror::Error;

// --- Evaluation Error ---
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error(transparent)]
    EnvError(#[from] EnvError), // Errors from environment lookup
    #[error("Evaluation Error: Invalid special form - {0}")]
    InvalidSpecialForm(String), // Malformed special form (e.g., (if cond))
    #[error("Evaluation Error: Invalid arguments - {0}")]
    InvalidArguments(String), // Mismatched arity
    #[error("Evaluation Error: {operator} expects {expected}, got {found}")]
    TypeMismatch {
        operator: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Evaluation Error: No such function: '{0}'")]
    NoSuchFunction(String),
    #[error("Evaluation Error: Missing operand")]
    MissingOperand,
    #[error("Evaluation Error: {operator}: index {index} is out of range")]
    IndexOutOfRange { operator: String, index: i64 },
    #[error("Evaluation Error: Division by zero")]
    DivisionByZero,
    #[error("Evaluation Error: Integer overflow in '{0}'")]
    Overflow(String),
}

// Result type alias for convenience
pub type EvalResult<T = Value> = Result<T, EvalError>;

/// Flattens a proper list into its elements. `what` names the construct for
/// the error raised on an improper tail.
pub fn list_to_vec(list: &Value, what: &str) -> EvalResult<Vec<Value>> {
    let mut items = Vec::new();
    let mut current = list.clone();
    loop {
        let next = match &current {
            Value::Nil => return Ok(items),
            Value::Pair(pair) => {
                let pair = pair.borrow();
                items.push(pair.car.clone());
                pair.cdr.clone()
            }
            other => {
                return Err(EvalError::InvalidArguments(format!(
                    "{} must be a proper list, found a dotted tail '{}'",
                    what, other
                )));
            }
        };
        current = next;
    }
}

// --- Evaluate Function ---

/// Evaluates `value` in the environment `env`.
///
/// The active scope travels as an argument, so returning from a closure call
/// (normally or through `?`) always leaves the caller on its own scope.
pub fn evaluate(value: &Value, env: &EnvRef) -> EvalResult {
    match value {
        // 1. Integers and closures evaluate to themselves
        Value::Integer(_) | Value::Closure(_) => Ok(value.shallow_clone()),

        // 2. Atoms: booleans are literals, anything else is a variable
        Value::Atom(name) if name == TRUE || name == FALSE => Ok(value.shallow_clone()),
        Value::Atom(name) => Ok(env.borrow().get(name)?),

        // 3. Nil in operand position means an operand was left out
        Value::Nil => Err(EvalError::MissingOperand),

        // 4. Pairs: special forms or procedure calls
        Value::Pair(pair) => {
            let (head, operands) = {
                let pair = pair.borrow();
                (pair.car.clone(), pair.cdr.clone())
            };
            evaluate_application(&head, &operands, env)
        }
    }
}

fn evaluate_application(head: &Value, operands: &Value, env: &EnvRef) -> EvalResult {
    // ((lambda (params) body...) args...)
    if let Value::Pair(form) = head {
        let lambda_rest = {
            let form = form.borrow();
            form.car.is_atom("lambda").then(|| form.cdr.clone())
        };
        return match lambda_rest {
            Some(rest) => {
                let closure = make_closure(&list_to_vec(&rest, "lambda")?, env)?;
                let args = evaluate_operands(operands, env)?;
                apply_closure(&closure, args)
            }
            None => Err(EvalError::NoSuchFunction(format!("({})", head))),
        };
    }

    let Some(name) = head.as_atom() else {
        return Err(EvalError::NoSuchFunction(head.to_string()));
    };

    if !matches!(operands, Value::Nil | Value::Pair(_)) {
        return Err(EvalError::InvalidArguments(format!(
            "operands of '{}' must form a list, got '{}'",
            name, operands
        )));
    }

    match lookup_operator(name) {
        Some(Operator::Special(form)) => form(&list_to_vec(operands, name)?, env),
        Some(Operator::Primitive(func)) => func(&evaluate_operands(operands, env)?),
        // User closures are only reachable when no builtin shares the name.
        None => {
            let callee = env.borrow().get(name);
            match callee {
                Ok(Value::Closure(closure)) => {
                    let args = evaluate_operands(operands, env)?;
                    apply_closure(&closure, args)
                }
                _ => Err(EvalError::NoSuchFunction(name.to_string())),
            }
        }
    }
}

/// Evaluates each operand left to right, stopping at the first error.
fn evaluate_operands(operands: &Value, env: &EnvRef) -> EvalResult<Vec<Value>> {
    list_to_vec(operands, "argument list")?
        .iter()
        .map(|operand| evaluate(operand, env))
        .collect()
}

/// Runs a closure body in a fresh frame enclosed by the captured scope.
pub fn apply_closure(closure: &Closure, args: Vec<Value>) -> EvalResult {
    if closure.params.len() != args.len() {
        return Err(EvalError::InvalidArguments(format!(
            "procedure expects {} arguments, got {}",
            closure.params.len(),
            args.len()
        )));
    }
    tracing::trace!(params = ?closure.params, "entering closure");

    let frame = Environment::new_enclosed(Rc::clone(&closure.env));
    {
        let mut frame = frame.borrow_mut();
        for (param, arg) in closure.params.iter().zip(args) {
            frame.define(param.clone(), arg);
        }
    }

    let mut result = Value::Nil;
    for expr in &closure.body {
        result = evaluate(expr, &frame)?;
    }
    Ok(result)
}

fn make_closure(operands: &[Value], env: &EnvRef) -> EvalResult<Rc<Closure>> {
    let [params, body @ ..] = operands else {
        return Err(EvalError::InvalidSpecialForm(
            "lambda expects a parameter list and a body".to_string(),
        ));
    };
    if body.is_empty() {
        return Err(EvalError::InvalidSpecialForm(
            "lambda expects at least one body expression".to_string(),
        ));
    }
    if !matches!(params, Value::Nil | Value::Pair(_)) {
        return Err(EvalError::InvalidSpecialForm(format!(
            "lambda parameters must be a list, got '{}'",
            params
        )));
    }

    let params = list_to_vec(params, "lambda parameter list")
        .map_err(|err| EvalError::InvalidSpecialForm(err.to_string()))?
        .into_iter()
        .map(|param| match param {
            Value::Atom(name) => Ok(name),
            other => Err(EvalError::InvalidSpecialForm(format!(
                "lambda parameter must be a symbol, got '{}'",
                other.render()
            ))),
        })
        .collect::<EvalResult<Vec<String>>>()?;

    Ok(Rc::new(Closure {
        params,
        body: body.to_vec(),
        env: Rc::clone(env),
    }))
}

// --- Special forms ---
// These receive their operands unevaluated.

pub fn eval_quote(operands: &[Value], _env: &EnvRef) -> EvalResult {
    match operands {
        [datum] => Ok(datum.clone()),
        _ => Err(EvalError::InvalidArguments(
            "quote expects exactly one argument".to_string(),
        )),
    }
}

// Shared shape check for `define` and `set!`
fn binding_operands<'a>(operands: &'a [Value], form: &str) -> EvalResult<(&'a str, &'a Value)> {
    match operands {
        [Value::Atom(name), value] => Ok((name, value)),
        [other, _] => Err(EvalError::InvalidSpecialForm(format!(
            "{} expects a symbol as its first argument, got '{}'",
            form,
            other.render()
        ))),
        _ => Err(EvalError::InvalidSpecialForm(format!(
            "{} expects a name and a value",
            form
        ))),
    }
}

pub fn eval_define(operands: &[Value], env: &EnvRef) -> EvalResult {
    let (name, expr) = binding_operands(operands, "define")?;
    let value = evaluate(expr, env)?;
    tracing::trace!(name, value = %value.render(), "define");
    env.borrow_mut().define(name.to_string(), value);
    Ok(Value::atom(name))
}

pub fn eval_set(operands: &[Value], env: &EnvRef) -> EvalResult {
    let (name, expr) = binding_operands(operands, "set!")?;
    if !env.borrow().contains_local(name) {
        return Err(EnvError::UnboundVariable(name.to_string()).into());
    }
    let value = evaluate(expr, env)?;
    env.borrow_mut().assign(name, value)?;
    Ok(Value::Nil)
}

pub fn eval_if(operands: &[Value], env: &EnvRef) -> EvalResult {
    let [condition, consequent, alternate @ ..] = operands else {
        return Err(EvalError::InvalidSpecialForm(
            "if expects condition, consequent, and optional alternate".to_string(),
        ));
    };
    if alternate.len() > 1 {
        return Err(EvalError::InvalidSpecialForm(
            "if expects condition, consequent, and optional alternate".to_string(),
        ));
    }

    let condition = evaluate(condition, env)?;
    if !condition.is_boolean() {
        return Err(EvalError::InvalidSpecialForm(format!(
            "if condition must be #t or #f, got '{}'",
            condition.render()
        )));
    }

    if !condition.is_false() {
        evaluate(consequent, env)
    } else if let [alternate] = alternate {
        evaluate(alternate, env)
    } else {
        Ok(Value::Nil)
    }
}

pub fn eval_lambda(operands: &[Value], env: &EnvRef) -> EvalResult {
    Ok(Value::Closure(make_closure(operands, env)?))
}

pub fn eval_and(operands: &[Value], env: &EnvRef) -> EvalResult {
    let mut last = Value::boolean(true);
    for operand in operands {
        last = evaluate(operand, env)?;
        if last.is_false() {
            break;
        }
    }
    Ok(last)
}

pub fn eval_or(operands: &[Value], env: &EnvRef) -> EvalResult {
    let mut last = Value::boolean(false);
    for operand in operands {
        last = evaluate(operand, env)?;
        if !last.is_false() {
            break;
        }
    }
    Ok(last)
}
