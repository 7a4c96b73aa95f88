use crate::types::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

// --- Environment Error ---
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvError {
    #[error("Unbound variable: '{0}'")]
    UnboundVariable(String),
}

// --- Environment Definition ---

/// Shared handle to a scope frame. Closures keep one of these to the scope
/// they were created in.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    // Use Rc<RefCell<...>> to allow shared ownership and interior mutability.
    // Needed for closures capturing environments and for 'set!'.
    outer: Option<EnvRef>,
    bindings: HashMap<String, Value>, // Maps variable names to values
}

impl Environment {
    /// Creates a new, top-level (global) environment.
    pub fn new() -> EnvRef {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer_env: EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer_env),
            bindings: HashMap::new(),
        }))
    }

    /// Defines a variable in the *current* environment frame.
    /// Replaces the value if the variable already exists in this frame.
    pub fn define(&mut self, name: String, value: Value) {
        self.bindings.insert(name, value);
    }

    /// Looks up a variable's value.
    /// Checks the current environment first, then walks up the outer environment chain.
    pub fn get(&self, name: &str) -> Result<Value, EnvError> {
        if let Some(value) = self.bindings.get(name) {
            // Pairs and closures come back as aliases, not copies
            Ok(value.clone())
        } else {
            match &self.outer {
                Some(outer_env_ptr) => outer_env_ptr.borrow().get(name),
                None => Err(EnvError::UnboundVariable(name.to_string())),
            }
        }
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Overwrites a binding of the *current* frame. Outer frames are not
    /// searched: a name bound only further out is reported as unbound.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), EnvError> {
        match self.bindings.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(EnvError::UnboundVariable(name.to_string())),
        }
    }

    /// Gets every identifier visible from this frame
    pub fn get_identifiers(&self) -> HashSet<String> {
        let mut identifiers: HashSet<String> = self.bindings.keys().cloned().collect();
        if let Some(outer_env_ptr) = &self.outer {
            identifiers.extend(outer_env_ptr.borrow().get_identifiers());
        }
        identifiers
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: i64) -> Value {
        Value::Integer(n)
    }

    #[test]
    fn test_define_and_get_global() {
        let env = Environment::new();
        env.borrow_mut().define("x".to_string(), num(10));

        let result = env.borrow().get("x");
        assert_eq!(result, Ok(num(10)));
    }

    #[test]
    fn test_get_unbound_global() {
        let env = Environment::new();
        let result = env.borrow().get("y");
        assert!(matches!(result, Err(EnvError::UnboundVariable(s)) if s == "y"));
    }

    #[test]
    fn test_define_and_get_enclosed() {
        let global_env = Environment::new();
        global_env.borrow_mut().define("x".to_string(), num(10));

        let local_env = Environment::new_enclosed(global_env);
        local_env.borrow_mut().define("y".to_string(), num(20));

        assert_eq!(local_env.borrow().get("y"), Ok(num(20)));
        assert_eq!(local_env.borrow().get("x"), Ok(num(10)));
    }

    #[test]
    fn test_shadowing() {
        let global_env = Environment::new();
        global_env.borrow_mut().define("x".to_string(), num(10));

        let local_env = Environment::new_enclosed(global_env.clone());
        local_env.borrow_mut().define("x".to_string(), num(50)); // Shadow global x

        let inner_local_env = Environment::new_enclosed(local_env.clone());
        inner_local_env
            .borrow_mut()
            .define("y".to_string(), Value::atom("y-value"));

        assert_eq!(inner_local_env.borrow().get("x"), Ok(num(50)));
        assert_eq!(inner_local_env.borrow().get("y"), Ok(Value::atom("y-value")));
        assert_eq!(local_env.borrow().get("x"), Ok(num(50)));
        assert_eq!(global_env.borrow().get("x"), Ok(num(10)));
    }

    #[test]
    fn test_assign_current_frame() {
        let env = Environment::new();
        env.borrow_mut().define("x".to_string(), num(1));
        assert_eq!(env.borrow_mut().assign("x", num(2)), Ok(()));
        assert_eq!(env.borrow().get("x"), Ok(num(2)));
    }

    #[test]
    fn test_assign_does_not_reach_outer_frames() {
        let global_env = Environment::new();
        global_env.borrow_mut().define("x".to_string(), num(1));
        let local_env = Environment::new_enclosed(global_env.clone());

        assert!(!local_env.borrow().contains_local("x"));
        assert_eq!(
            local_env.borrow_mut().assign("x", num(2)),
            Err(EnvError::UnboundVariable("x".to_string()))
        );
        assert_eq!(global_env.borrow().get("x"), Ok(num(1)));
    }

    #[test]
    fn test_get_identifiers_walks_chain() {
        let global_env = Environment::new();
        global_env.borrow_mut().define("a".to_string(), num(1));
        let local_env = Environment::new_enclosed(global_env);
        local_env.borrow_mut().define("b".to_string(), num(2));

        let ids = local_env.borrow().get_identifiers();
        assert!(ids.contains("a"));
        assert!(ids.contains("b"));
        assert_eq!(ids.len(), 2);
    }
}
