//! Runtime value representation
//!
//! Composite values (arrays, records) are reference-counted and copied on
//! write through `Rc::make_mut`, so assigning one never aliases it.

use std::fmt;
use std::rc::Rc;

use crate::async_runtime::Channel;
use crate::parser::{DeclId, FunctionDecl};
use crate::types::Builtin;
use crate::ui::{Stylesheet, UiElement};
use super::environment::Env;
use super::error::ErrorKind;

/// Runtime value
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    String(Rc<str>),
    Boolean(bool),
    None,
    Array(Rc<Vec<Value>>),
    Record(Rc<RecordValue>),
    Function(Rc<Closure>),
    Builtin(Builtin),
    Channel(Channel),
    Element(Rc<UiElement>),
    Stylesheet(Rc<Stylesheet>),
    Error(Rc<ErrorValue>),
}

/// Record instance; fields keep declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    pub type_id: DeclId,
    pub name: String,
    pub fields: Vec<(String, Value)>,
}

impl RecordValue {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == field).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.fields.iter_mut().find(|(n, _)| n == field).map(|(_, v)| v)
    }
}

/// Function value: declaration plus the environment it was created in
pub struct Closure {
    pub decl: Rc<FunctionDecl>,
    pub env: Env,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

impl Closure {
    pub fn name(&self) -> &str {
        if self.decl.name.is_empty() {
            "<anonymous>"
        } else {
            &self.decl.name
        }
    }
}

/// A caught runtime error as seen by a `catch` block
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorValue {
    pub kind: ErrorKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Value {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(items))
    }

    /// Only `false` and `none` are falsy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::None)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Boolean(_) => "Boolean",
            Value::None => "None",
            Value::Array(_) => "Array",
            Value::Record(_) => "Record",
            Value::Function(_) | Value::Builtin(_) => "Function",
            Value::Channel(_) => "Chan",
            Value::Element(_) => "Element",
            Value::Stylesheet(_) => "Stylesheet",
            Value::Error(_) => "Error",
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::None => write!(f, "none"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt_nested(f)?;
                }
                write!(f, "]")
            }
            Value::Record(record) => {
                write!(f, "{} {{ ", record.name)?;
                for (i, (name, value)) in record.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", name)?;
                    value.fmt_nested(f)?;
                }
                write!(f, " }}")
            }
            Value::Function(closure) => write!(f, "<fn {}>", closure.name()),
            Value::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name()),
            Value::Channel(_) => write!(f, "<chan>"),
            Value::Element(element) if element.is_fragment() => write!(f, "<fragment>"),
            Value::Element(element) => write!(f, "<{}>", element.tag),
            Value::Stylesheet(sheet) => write!(f, "<stylesheet: {} rules>", sheet.rules.len()),
            Value::Error(error) => write!(f, "{}: {}", error.kind, error.message),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::None, Value::None) => true,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a.type_id == b.type_id && a.fields == b.fields,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Channel(a), Value::Channel(b)) => a.same_channel(b),
            (Value::Element(a), Value::Element(b)) => a == b,
            (Value::Stylesheet(a), Value::Stylesheet(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::string("").is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Float(4.0).to_string(), "4.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        let items = Value::array(vec![Value::Int(1), Value::string("a")]);
        assert_eq!(items.to_string(), "[1, \"a\"]");
        let record = Value::Record(Rc::new(RecordValue {
            type_id: DeclId::fresh(),
            name: "Point".to_string(),
            fields: vec![("x".to_string(), Value::Int(1)), ("y".to_string(), Value::Int(2))],
        }));
        assert_eq!(record.to_string(), "Point { x: 1, y: 2 }");
    }

    #[test]
    fn test_structural_equality() {
        let a = Value::array(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(a, b);
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Int(1), Value::string("1"));
    }

    #[test]
    fn test_copy_on_write() {
        let original = Value::array(vec![Value::Int(1)]);
        let mut copy = original.clone();
        if let Value::Array(items) = &mut copy {
            Rc::make_mut(items).push(Value::Int(2));
        }
        assert_eq!(original.to_string(), "[1]");
        assert_eq!(copy.to_string(), "[1, 2]");
    }
}
