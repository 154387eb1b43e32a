//! Static type representation
//!
//! [`Type`] is a closed set of variants. Types compare structurally, except
//! records and interfaces which compare by declaration identity.

use std::fmt;

use crate::parser::DeclId;
use crate::runtime::ErrorKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int,
    Float,
    String,
    Boolean,
    Void,
    None,
    Array(Box<Type>),
    Optional(Box<Type>),
    /// Normalized: flattened, deduplicated, never contains `None` (that
    /// becomes an `Optional` around the union) and has at least two members
    Union(Vec<Type>),
    Function {
        params: Vec<Type>,
        /// Parameters without a default value
        required: usize,
        ret: Box<Type>,
    },
    /// Declared record type
    Record { id: DeclId, name: String },
    /// Declared interface
    Interface { id: DeclId, name: String },
    Channel(Box<Type>),
    Element,
    Stylesheet,
    /// `Error` when the kind is `None`, otherwise one specific error kind
    Error(Option<ErrorKind>),
    /// Accepts anything (builtin parameters only)
    Any,
    /// Placeholder for a type that is not known yet
    Unresolved,
    /// Sentinel produced after a reported error; compatible with everything
    Invalid,
}

impl Type {
    pub fn array(element: Type) -> Type {
        Type::Array(Box::new(element))
    }

    pub fn channel(element: Type) -> Type {
        Type::Channel(Box::new(element))
    }

    pub fn function(params: Vec<Type>, ret: Type) -> Type {
        Type::Function {
            required: params.len(),
            params,
            ret: Box::new(ret),
        }
    }

    /// `T?`, collapsing `None?`, `T??` and `Any?`
    pub fn optional(inner: Type) -> Type {
        match inner {
            Type::None | Type::Optional(_) | Type::Any | Type::Invalid => inner,
            other => Type::Optional(Box::new(other)),
        }
    }

    /// Build a normalized union of `members`
    pub fn union(members: Vec<Type>) -> Type {
        let mut flat: Vec<Type> = Vec::new();
        let mut has_none = false;

        fn collect(ty: Type, flat: &mut Vec<Type>, has_none: &mut bool) {
            match ty {
                Type::Union(inner) => {
                    for t in inner {
                        collect(t, flat, has_none);
                    }
                }
                Type::Optional(inner) => {
                    *has_none = true;
                    collect(*inner, flat, has_none);
                }
                Type::None => *has_none = true,
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }

        for member in members {
            collect(member, &mut flat, &mut has_none);
        }

        if flat.iter().any(|t| matches!(t, Type::Invalid)) {
            return Type::Invalid;
        }
        if flat.iter().any(|t| matches!(t, Type::Any)) {
            return Type::Any;
        }

        let base = match flat.len() {
            0 => return Type::None,
            1 => flat.remove(0),
            _ => Type::Union(flat),
        };
        if has_none {
            Type::Optional(Box::new(base))
        } else {
            base
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    /// Whether this type or any part of it is the error sentinel
    pub fn is_invalid(&self) -> bool {
        match self {
            Type::Invalid => true,
            Type::Array(t) | Type::Optional(t) | Type::Channel(t) => t.is_invalid(),
            Type::Union(members) => members.iter().any(Type::is_invalid),
            Type::Function { params, ret, .. } => {
                params.iter().any(Type::is_invalid) || ret.is_invalid()
            }
            _ => false,
        }
    }

    /// Whether a value of this type can be `none`
    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::None | Type::Optional(_) | Type::Any | Type::Invalid)
    }

    /// Strip one level of optionality
    pub fn non_null(&self) -> Type {
        match self {
            Type::Optional(inner) => (**inner).clone(),
            other => other.clone(),
        }
    }

    /// Element type when iterated with `for`
    pub fn iteration_type(&self) -> Option<Type> {
        match self {
            Type::Array(element) | Type::Channel(element) => Some((**element).clone()),
            Type::String => Some(Type::String),
            Type::Invalid => Some(Type::Invalid),
            _ => None,
        }
    }

    /// Whether `value` may be stored where `self` is expected.
    ///
    /// `implements(interface, record)` answers interface conformance,
    /// which only the checker knows.
    pub fn accepts<F>(&self, value: &Type, implements: &F) -> bool
    where
        F: Fn(DeclId, DeclId) -> bool,
    {
        if self == value {
            return true;
        }
        match (self, value) {
            (Type::Invalid, _) | (_, Type::Invalid) => true,
            (Type::Any, _) => true,
            (_, Type::Unresolved) => true,

            (Type::Optional(_), Type::None) => true,
            (Type::Optional(inner), Type::Optional(v)) => inner.accepts(v, implements),
            (target, Type::Union(values)) => values.iter().all(|v| target.accepts(v, implements)),
            (Type::Optional(inner), v) => inner.accepts(v, implements),
            (Type::Union(members), v) => members.iter().any(|m| m.accepts(v, implements)),

            // Arrays are copied on write, so covariance is sound.
            (Type::Array(t), Type::Array(v)) => t.accepts(v, implements),
            (Type::Channel(t), Type::Channel(v)) => t == v || **v == Type::Unresolved,

            (
                Type::Function { params: tp, ret: tr, .. },
                Type::Function { params: vp, ret: vr, required: vreq },
            ) => {
                tp.len() <= vp.len()
                    && *vreq <= tp.len()
                    && tp.iter().zip(vp.iter()).all(|(t, v)| v.accepts(t, implements))
                    && (**tr == Type::Void || tr.accepts(vr, implements))
            }

            (Type::Interface { id: iface, .. }, Type::Record { id: record, .. }) => {
                implements(*iface, *record)
            }

            (Type::Error(None), Type::Error(_)) => true,
            _ => false,
        }
    }

    /// Whether two types have any value in common (used by match patterns
    /// and equality checks)
    pub fn overlaps<F>(&self, other: &Type, implements: &F) -> bool
    where
        F: Fn(DeclId, DeclId) -> bool,
    {
        if self.accepts(other, implements) || other.accepts(self, implements) {
            return true;
        }
        match (self, other) {
            (Type::Union(members), o) | (o, Type::Union(members)) => {
                members.iter().any(|m| m.overlaps(o, implements))
            }
            (Type::Optional(inner), o) | (o, Type::Optional(inner)) => {
                inner.overlaps(o, implements)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Float => write!(f, "Float"),
            Type::String => write!(f, "String"),
            Type::Boolean => write!(f, "Boolean"),
            Type::Void => write!(f, "Void"),
            Type::None => write!(f, "None"),
            Type::Array(element) => write!(f, "Array<{}>", element),
            Type::Optional(inner) => match **inner {
                Type::Union(_) | Type::Function { .. } => write!(f, "({})?", inner),
                _ => write!(f, "{}?", inner),
            },
            Type::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    match member {
                        Type::Function { .. } => write!(f, "({})", member)?,
                        _ => write!(f, "{}", member)?,
                    }
                }
                Ok(())
            }
            Type::Function { params, ret, .. } => {
                write!(f, "fn(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ") -> {}", ret)
            }
            Type::Record { name, .. } | Type::Interface { name, .. } => write!(f, "{}", name),
            Type::Channel(element) => write!(f, "Chan<{}>", element),
            Type::Element => write!(f, "Element"),
            Type::Stylesheet => write!(f, "Stylesheet"),
            Type::Error(None) => write!(f, "Error"),
            Type::Error(Some(kind)) => write!(f, "{}", kind.name()),
            Type::Any => write!(f, "Any"),
            Type::Unresolved => write!(f, "<unresolved>"),
            Type::Invalid => write!(f, "<invalid>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_impls(_: DeclId, _: DeclId) -> bool {
        false
    }

    #[test]
    fn test_union_normalization() {
        let ty = Type::union(vec![
            Type::Int,
            Type::union(vec![Type::String, Type::Int]),
            Type::None,
        ]);
        assert_eq!(
            ty,
            Type::Optional(Box::new(Type::Union(vec![Type::Int, Type::String])))
        );
        assert_eq!(Type::union(vec![Type::Int, Type::Int]), Type::Int);
        assert_eq!(ty.to_string(), "(Int | String)?");
    }

    #[test]
    fn test_union_membership() {
        let id_type = Type::union(vec![Type::Int, Type::String]);
        assert!(id_type.accepts(&Type::Int, &no_impls));
        assert!(id_type.accepts(&Type::String, &no_impls));
        assert!(!id_type.accepts(&Type::Boolean, &no_impls));
        assert!(!Type::Int.accepts(&id_type, &no_impls));
    }

    #[test]
    fn test_optional_accepts_none_and_inner() {
        let opt = Type::optional(Type::Int);
        assert!(opt.accepts(&Type::None, &no_impls));
        assert!(opt.accepts(&Type::Int, &no_impls));
        assert!(!Type::Int.accepts(&opt, &no_impls));
        assert_eq!(Type::optional(opt.clone()), opt);
    }

    #[test]
    fn test_no_implicit_numeric_conversion() {
        assert!(!Type::Float.accepts(&Type::Int, &no_impls));
        assert!(!Type::Int.accepts(&Type::Float, &no_impls));
        let number = Type::union(vec![Type::Int, Type::Float]);
        assert!(number.accepts(&Type::Int, &no_impls));
    }

    #[test]
    fn test_records_compare_by_identity() {
        let a = Type::Record { id: DeclId::fresh(), name: "P".to_string() };
        let b = Type::Record { id: DeclId::fresh(), name: "P".to_string() };
        assert!(!a.accepts(&b, &no_impls));
        assert!(a.accepts(&a.clone(), &no_impls));
    }

    #[test]
    fn test_interface_conformance_is_delegated() {
        let iface = DeclId::fresh();
        let record = DeclId::fresh();
        let shape = Type::Interface { id: iface, name: "Shape".to_string() };
        let circle = Type::Record { id: record, name: "Circle".to_string() };
        let implements = |i: DeclId, r: DeclId| i == iface && r == record;
        assert!(shape.accepts(&circle, &implements));
        assert!(!shape.accepts(&circle, &no_impls));
    }

    #[test]
    fn test_error_hierarchy() {
        let any_error = Type::Error(None);
        let div = Type::Error(Some(ErrorKind::DivisionByZero));
        assert!(any_error.accepts(&div, &no_impls));
        assert!(!div.accepts(&any_error, &no_impls));
        assert_eq!(div.to_string(), "DivisionByZero");
    }

    #[test]
    fn test_function_display_and_assignability() {
        let f = Type::function(vec![Type::Int], Type::Int);
        assert_eq!(f.to_string(), "fn(Int) -> Int");
        let with_default = Type::Function {
            params: vec![Type::Int, Type::String],
            required: 1,
            ret: Box::new(Type::Int),
        };
        assert!(f.accepts(&with_default, &no_impls));
        assert!(!with_default.accepts(&f, &no_impls));
    }

    #[test]
    fn test_invalid_suppresses_mismatch() {
        assert!(Type::Int.accepts(&Type::Invalid, &no_impls));
        assert!(Type::array(Type::Invalid).is_invalid());
    }
}
