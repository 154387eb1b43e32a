//! Runtime environments
//!
//! An environment maps names to values and points at the environment it was
//! created in. Closures keep their defining environment alive through the
//! shared handle; parents are fixed at creation, so chains never loop.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::value::Value;

pub type Env = Rc<Environment>;

#[derive(Default)]
pub struct Environment {
    values: RefCell<HashMap<String, Value>>,
    parent: Option<Env>,
}

impl Environment {
    pub fn global() -> Env {
        Rc::new(Self::default())
    }

    pub fn child(parent: &Env) -> Env {
        Rc::new(Self {
            values: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    /// Bind `name` in this environment, replacing any previous binding
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.values.borrow_mut().insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref()?.get(name)
    }

    /// Replace the nearest binding of `name`; false when unbound
    pub fn assign(&self, name: &str, value: Value) -> bool {
        self.update(name, |slot| *slot = value).is_some()
    }

    /// Run `f` on the nearest binding of `name` in place
    pub fn update<R>(&self, name: &str, f: impl FnOnce(&mut Value) -> R) -> Option<R> {
        if let Some(slot) = self.values.borrow_mut().get_mut(name) {
            return Some(f(slot));
        }
        self.parent.as_ref()?.update(name, f)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.values.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("names", &names)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_parents() {
        let global = Environment::global();
        global.define("x", Value::Int(1));
        let inner = Environment::child(&global);
        inner.define("y", Value::Int(2));
        assert_eq!(inner.get("x"), Some(Value::Int(1)));
        assert_eq!(inner.get("y"), Some(Value::Int(2)));
        assert_eq!(global.get("y"), None);
    }

    #[test]
    fn test_assign_updates_nearest_binding() {
        let global = Environment::global();
        global.define("x", Value::Int(1));
        let inner = Environment::child(&global);
        assert!(inner.assign("x", Value::Int(5)));
        assert_eq!(global.get("x"), Some(Value::Int(5)));
        assert!(!inner.assign("missing", Value::None));
    }

    #[test]
    fn test_shadowing() {
        let global = Environment::global();
        global.define("x", Value::Int(1));
        let inner = Environment::child(&global);
        inner.define("x", Value::Int(2));
        assert_eq!(inner.get("x"), Some(Value::Int(2)));
        assert_eq!(global.get("x"), Some(Value::Int(1)));
    }
}
