use crate::environment::EnvRef;
use std::cell::RefCell;
use std::fmt; // For custom display formatting
use std::rc::Rc;

pub const TRUE: &str = "#t";
pub const FALSE: &str = "#f";
pub const DOT: &str = ".";

/// Shared, mutable handle to a pair. Every clone of a `PairRef` aliases the
/// same node, so `set-car!`/`set-cdr!` are visible through all of them.
pub type PairRef = Rc<RefCell<Pair>>;

#[derive(Debug, Clone)]
pub struct Pair {
    pub car: Value,
    pub cdr: Value,
}

impl Pair {
    pub fn new(car: Value, cdr: Value) -> Self {
        Pair { car, cdr }
    }
}

// Unlinks the cdr chain one node at a time so long lists do not drop
// recursively. Stops at the first node something else still refers to.
impl Drop for Pair {
    fn drop(&mut self) {
        let mut tail = std::mem::replace(&mut self.cdr, Value::Nil);
        while let Value::Pair(next) = tail {
            match Rc::try_unwrap(next) {
                Ok(cell) => tail = std::mem::replace(&mut cell.into_inner().cdr, Value::Nil),
                Err(_) => break,
            }
        }
    }
}

// Structural equality, walking the cdr chain iteratively.
impl PartialEq for Pair {
    fn eq(&self, other: &Self) -> bool {
        if self.car != other.car {
            return false;
        }
        let mut left = self.cdr.clone();
        let mut right = other.cdr.clone();
        loop {
            let (next_left, next_right) = match (&left, &right) {
                (Value::Pair(a), Value::Pair(b)) => {
                    if Rc::ptr_eq(a, b) {
                        return true;
                    }
                    let (a, b) = (a.borrow(), b.borrow());
                    if a.car != b.car {
                        return false;
                    }
                    (a.cdr.clone(), b.cdr.clone())
                }
                (a, b) => return a == b,
            };
            left = next_left;
            right = next_right;
        }
    }
}

/// A user-defined procedure produced by evaluating a `lambda` form.
pub struct Closure {
    pub params: Vec<String>,
    pub body: Vec<Value>,
    pub env: EnvRef, // The scope that was active when the lambda was evaluated
}

// The captured environment usually contains the closure itself, so it is left
// out of the debug output.
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("params", &self.params)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

/// Represents a Scheme value. Code and data share this representation.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,              // The empty list '()
    Integer(i64),     // e.g., 42, -7
    Atom(String),     // e.g., +, variable-name, #t
    Pair(PairRef),    // e.g., (1 . 2), (+ 1 2)
    Closure(Rc<Closure>),
}

impl Value {
    pub fn atom(name: impl Into<String>) -> Self {
        Value::Atom(name.into())
    }

    pub fn boolean(b: bool) -> Self {
        Value::atom(if b { TRUE } else { FALSE })
    }

    pub fn cons(car: Value, cdr: Value) -> Self {
        Value::Pair(Rc::new(RefCell::new(Pair::new(car, cdr))))
    }

    /// Builds a proper, nil-terminated list.
    pub fn list(items: Vec<Value>) -> Self {
        items
            .into_iter()
            .rev()
            .fold(Value::Nil, |tail, item| Value::cons(item, tail))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_atom(&self, name: &str) -> bool {
        matches!(self, Value::Atom(s) if s == name)
    }

    pub fn is_false(&self) -> bool {
        self.is_atom(FALSE)
    }

    pub fn is_boolean(&self) -> bool {
        self.is_atom(TRUE) || self.is_atom(FALSE)
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Value::Atom(name) => Some(name),
            _ => None,
        }
    }

    /// Independent copy of a scalar, or a fresh pair node that shares the
    /// original's `car` and `cdr`. Closures keep their identity.
    pub fn shallow_clone(&self) -> Value {
        match self {
            Value::Nil => Value::Nil,
            Value::Integer(n) => Value::Integer(*n),
            Value::Atom(name) => Value::Atom(name.clone()),
            Value::Pair(pair) => {
                let pair = pair.borrow();
                Value::cons(pair.car.clone(), pair.cdr.clone())
            }
            Value::Closure(closure) => Value::Closure(Rc::clone(closure)),
        }
    }

    /// Renders a top-level result: pairs are wrapped in brackets, everything
    /// else uses its own printer.
    pub fn render(&self) -> String {
        match self {
            Value::Pair(_) => format!("({})", self),
            _ => self.to_string(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Integer(_) => "integer",
            Value::Atom(_) if self.is_boolean() => "boolean",
            Value::Atom(_) => "symbol",
            Value::Pair(_) => "pair",
            Value::Closure(_) => "procedure",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Atom(a), Value::Atom(b)) => a == b,
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

// Nested pairs keep their brackets when printed as an element.
fn fmt_element(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Value::Pair(_) => write!(f, "({})", value),
        other => write!(f, "{}", other),
    }
}

fn fmt_pair(pair: &Pair, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if pair.car.is_nil() {
        return write!(f, "()");
    }
    fmt_element(&pair.car, f)?;
    let mut tail = pair.cdr.clone();
    loop {
        let next = match &tail {
            Value::Nil => return Ok(()),
            Value::Pair(rest) => {
                let rest = rest.borrow();
                write!(f, " ")?;
                if rest.car.is_nil() {
                    return write!(f, "()");
                }
                fmt_element(&rest.car, f)?;
                rest.cdr.clone()
            }
            other => {
                write!(f, " . ")?;
                return fmt_element(other, f);
            }
        };
        tail = next;
    }
}

// Prints the bracket-less body of a list; see `Value::render` for results.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "()"),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Atom(name) => write!(f, "{}", name),
            Value::Pair(pair) => fmt_pair(&pair.borrow(), f),
            Value::Closure(_) => write!(f, "#<closure>"),
        }
    }
}
