use crate::EnvRef;
use crate::evaluator::{
    EvalError, EvalResult, eval_and, eval_define, eval_if, eval_lambda, eval_or, eval_quote,
    eval_set,
};
use crate::types::{PairRef, Value};
use std::rc::Rc;

/// How an operator receives its operands.
#[derive(Clone, Copy)]
pub enum Operator {
    /// Gets the raw operand forms and the active scope.
    Special(fn(&[Value], &EnvRef) -> EvalResult),
    /// Gets operands already evaluated, left to right.
    Primitive(fn(&[Value]) -> EvalResult),
}

const OPERATOR_NAMES: &[&str] = &[
    "quote", "define", "set!", "if", "lambda", "and", "or", "+", "-", "*", "/", "max", "min",
    "abs", "=", "<", ">", "<=", ">=", "number?", "boolean?", "symbol?", "pair?", "null?",
    "list?", "not", "cons", "car", "cdr", "list", "list-ref", "list-tail", "set-car!",
    "set-cdr!",
];

/// Resolves a name in call position against the fixed operator table.
pub fn lookup_operator(name: &str) -> Option<Operator> {
    use Operator::{Primitive, Special};

    let operator = match name {
        "quote" => Special(eval_quote),
        "define" => Special(eval_define),
        "set!" => Special(eval_set),
        "if" => Special(eval_if),
        "lambda" => Special(eval_lambda),
        "and" => Special(eval_and),
        "or" => Special(eval_or),
        "+" => Primitive(prim_add),
        "-" => Primitive(prim_sub),
        "*" => Primitive(prim_mul),
        "/" => Primitive(prim_div),
        "max" => Primitive(prim_max),
        "min" => Primitive(prim_min),
        "abs" => Primitive(prim_abs),
        "=" => Primitive(prim_equals),
        "<" => Primitive(prim_less_than),
        ">" => Primitive(prim_greater_than),
        "<=" => Primitive(prim_less_than_or_equals),
        ">=" => Primitive(prim_greater_than_or_equals),
        "number?" => Primitive(prim_is_number),
        "boolean?" => Primitive(prim_is_boolean),
        "symbol?" => Primitive(prim_is_symbol),
        "pair?" => Primitive(prim_is_pair),
        "null?" => Primitive(prim_is_null),
        "list?" => Primitive(prim_is_list),
        "not" => Primitive(prim_not),
        "cons" => Primitive(prim_cons),
        "car" => Primitive(prim_car),
        "cdr" => Primitive(prim_cdr),
        "list" => Primitive(prim_list),
        "list-ref" => Primitive(prim_list_ref),
        "list-tail" => Primitive(prim_list_tail),
        "set-car!" => Primitive(prim_set_car),
        "set-cdr!" => Primitive(prim_set_cdr),
        _ => return None,
    };
    Some(operator)
}

/// Every name `lookup_operator` resolves, for completion.
pub fn operator_names() -> impl Iterator<Item = &'static str> {
    OPERATOR_NAMES.iter().copied()
}

// Checks the number of arguments
macro_rules! check_arity {
    // Variant for minimum number of args
    ($args:expr, min $expected:expr, $name:expr) => {
        if $args.len() < $expected {
            return Err(EvalError::InvalidArguments(format!(
                "Primitive '{}' expects at least {} arguments, got {}",
                $name,
                $expected,
                $args.len()
            )));
        }
    };
    ($args:expr, $expected:expr, $name:expr) => {
        if $args.len() != $expected {
            return Err(EvalError::InvalidArguments(format!(
                "Primitive '{}' expects exactly {} arguments, got {}",
                $name,
                $expected,
                $args.len()
            )));
        }
    };
}

fn type_mismatch(operator: &str, expected: &'static str, found: &Value) -> EvalError {
    EvalError::TypeMismatch {
        operator: operator.to_string(),
        expected,
        found: found.type_name(),
    }
}

fn expect_integer(value: &Value, operator: &str) -> EvalResult<i64> {
    match value {
        Value::Integer(n) => Ok(*n),
        other => Err(type_mismatch(operator, "an integer", other)),
    }
}

fn expect_pair<'a>(value: &'a Value, operator: &str) -> EvalResult<&'a PairRef> {
    match value {
        Value::Pair(pair) => Ok(pair),
        other => Err(type_mismatch(operator, "a pair", other)),
    }
}

fn expect_index(value: &Value, operator: &str) -> EvalResult<usize> {
    let index = expect_integer(value, operator)?;
    usize::try_from(index).map_err(|_| EvalError::IndexOutOfRange {
        operator: operator.to_string(),
        index,
    })
}

fn integers(args: &[Value], operator: &str) -> EvalResult<Vec<i64>> {
    args.iter()
        .map(|arg| expect_integer(arg, operator))
        .collect()
}

// --- Arithmetic ---

// Left fold with a checked step; `None` from the step means overflow.
fn fold_numbers<F: Fn(i64, i64) -> Option<i64>>(
    start: i64,
    numbers: &[i64],
    func: F,
    operator: &str,
) -> EvalResult {
    numbers
        .iter()
        .try_fold(start, |acc, &n| func(acc, n))
        .map(Value::Integer)
        .ok_or_else(|| EvalError::Overflow(operator.to_string()))
}

pub fn prim_add(args: &[Value]) -> EvalResult {
    fold_numbers(0, &integers(args, "+")?, i64::checked_add, "+")
}

pub fn prim_mul(args: &[Value]) -> EvalResult {
    fold_numbers(1, &integers(args, "*")?, i64::checked_mul, "*")
}

pub fn prim_sub(args: &[Value]) -> EvalResult {
    check_arity!(args, min 1, "-");
    let first = expect_integer(&args[0], "-")?;
    let rest = integers(&args[1..], "-")?;
    if rest.is_empty() {
        fold_numbers(0, &[first], i64::checked_sub, "-")
    } else {
        fold_numbers(first, &rest, i64::checked_sub, "-")
    }
}

fn checked_div(a: i64, b: i64) -> EvalResult<i64> {
    if b == 0 {
        return Err(EvalError::DivisionByZero);
    }
    a.checked_div(b)
        .ok_or_else(|| EvalError::Overflow("/".to_string()))
}

pub fn prim_div(args: &[Value]) -> EvalResult {
    check_arity!(args, min 1, "/");
    let first = expect_integer(&args[0], "/")?;
    let rest = integers(&args[1..], "/")?;
    // A single argument is divided into one
    let (start, divisors) = if rest.is_empty() {
        (1, vec![first])
    } else {
        (first, rest)
    };
    divisors
        .iter()
        .try_fold(start, |acc, &n| checked_div(acc, n))
        .map(Value::Integer)
}

pub fn prim_max(args: &[Value]) -> EvalResult {
    check_arity!(args, min 1, "max");
    let numbers = integers(args, "max")?;
    Ok(Value::Integer(numbers.into_iter().max().unwrap_or_default()))
}

pub fn prim_min(args: &[Value]) -> EvalResult {
    check_arity!(args, min 1, "min");
    let numbers = integers(args, "min")?;
    Ok(Value::Integer(numbers.into_iter().min().unwrap_or_default()))
}

pub fn prim_abs(args: &[Value]) -> EvalResult {
    check_arity!(args, 1, "abs");
    expect_integer(&args[0], "abs")?
        .checked_abs()
        .map(Value::Integer)
        .ok_or_else(|| EvalError::Overflow("abs".to_string()))
}

// --- Comparison ---

fn compare_numbers<F: Fn(i64, i64) -> bool>(args: &[Value], func: F, operator: &str) -> EvalResult {
    let numbers = integers(args, operator)?;
    Ok(Value::boolean(
        numbers.windows(2).all(|pair| func(pair[0], pair[1])),
    ))
}

pub fn prim_equals(args: &[Value]) -> EvalResult {
    compare_numbers(args, |a, b| a == b, "=")
}

pub fn prim_less_than(args: &[Value]) -> EvalResult {
    compare_numbers(args, |a, b| a < b, "<")
}

pub fn prim_less_than_or_equals(args: &[Value]) -> EvalResult {
    compare_numbers(args, |a, b| a <= b, "<=")
}

pub fn prim_greater_than(args: &[Value]) -> EvalResult {
    compare_numbers(args, |a, b| a > b, ">")
}

pub fn prim_greater_than_or_equals(args: &[Value]) -> EvalResult {
    compare_numbers(args, |a, b| a >= b, ">=")
}

// --- Predicates ---

macro_rules! is_type {
    ($args:expr, $name:expr, $pattern:pat) => {{
        check_arity!($args, 1, $name);
        Ok(Value::boolean(matches!(&$args[0], $pattern)))
    }};
}

pub fn prim_is_number(args: &[Value]) -> EvalResult {
    is_type!(args, "number?", Value::Integer(_))
}

pub fn prim_is_boolean(args: &[Value]) -> EvalResult {
    check_arity!(args, 1, "boolean?");
    Ok(Value::boolean(args[0].is_boolean()))
}

pub fn prim_is_symbol(args: &[Value]) -> EvalResult {
    is_type!(args, "symbol?", Value::Atom(_))
}

pub fn prim_is_pair(args: &[Value]) -> EvalResult {
    is_type!(args, "pair?", Value::Pair(_))
}

pub fn prim_is_null(args: &[Value]) -> EvalResult {
    is_type!(args, "null?", Value::Nil)
}

fn next_link(value: &Value) -> Option<Value> {
    match value {
        Value::Pair(pair) => Some(pair.borrow().cdr.clone()),
        _ => None,
    }
}

// Floyd's tortoise and hare: a circular chain is not a list.
pub fn prim_is_list(args: &[Value]) -> EvalResult {
    check_arity!(args, 1, "list?");
    let mut slow = args[0].clone();
    let mut fast = args[0].clone();
    loop {
        for _ in 0..2 {
            if fast.is_nil() {
                return Ok(Value::boolean(true));
            }
            match next_link(&fast) {
                Some(next) => fast = next,
                None => return Ok(Value::boolean(false)),
            }
        }
        if let Some(next) = next_link(&slow) {
            slow = next;
        }
        if let (Value::Pair(a), Value::Pair(b)) = (&slow, &fast)
            && Rc::ptr_eq(a, b)
        {
            return Ok(Value::boolean(false));
        }
    }
}

pub fn prim_not(args: &[Value]) -> EvalResult {
    check_arity!(args, 1, "not");
    Ok(Value::boolean(args[0].is_false()))
}

// --- Lists ---

pub fn prim_cons(args: &[Value]) -> EvalResult {
    check_arity!(args, 2, "cons");
    Ok(Value::cons(args[0].clone(), args[1].clone()))
}

pub fn prim_car(args: &[Value]) -> EvalResult {
    check_arity!(args, 1, "car");
    Ok(expect_pair(&args[0], "car")?.borrow().car.clone())
}

pub fn prim_cdr(args: &[Value]) -> EvalResult {
    check_arity!(args, 1, "cdr");
    Ok(expect_pair(&args[0], "cdr")?.borrow().cdr.clone())
}

pub fn prim_list(args: &[Value]) -> EvalResult {
    Ok(Value::list(args.to_vec()))
}

// Follows `k` cdr links from `list`; every link walked must be a pair.
fn drop_pairs(list: &Value, k: usize, operator: &str) -> EvalResult {
    let mut current = list.clone();
    for _ in 0..k {
        let next = match &current {
            Value::Pair(pair) => pair.borrow().cdr.clone(),
            Value::Nil => {
                return Err(EvalError::IndexOutOfRange {
                    operator: operator.to_string(),
                    index: k as i64,
                });
            }
            other => return Err(type_mismatch(operator, "a list", other)),
        };
        current = next;
    }
    Ok(current)
}

pub fn prim_list_ref(args: &[Value]) -> EvalResult {
    check_arity!(args, 2, "list-ref");
    let k = expect_index(&args[1], "list-ref")?;
    match drop_pairs(&args[0], k, "list-ref")? {
        Value::Pair(pair) => Ok(pair.borrow().car.clone()),
        Value::Nil => Err(EvalError::IndexOutOfRange {
            operator: "list-ref".to_string(),
            index: k as i64,
        }),
        other => Err(type_mismatch("list-ref", "a list", &other)),
    }
}

pub fn prim_list_tail(args: &[Value]) -> EvalResult {
    check_arity!(args, 2, "list-tail");
    let k = expect_index(&args[1], "list-tail")?;
    drop_pairs(&args[0], k, "list-tail")
}

pub fn prim_set_car(args: &[Value]) -> EvalResult {
    check_arity!(args, 2, "set-car!");
    expect_pair(&args[0], "set-car!")?.borrow_mut().car = args[1].clone();
    Ok(Value::Nil)
}

pub fn prim_set_cdr(args: &[Value]) -> EvalResult {
    check_arity!(args, 2, "set-cdr!");
    expect_pair(&args[0], "set-cdr!")?.borrow_mut().cdr = args[1].clone();
    Ok(Value::Nil)
}
