//! Builtin functions
//!
//! Builtins are polymorphic, so the checker types their calls here instead
//! of through a plain function signature. The interpreter implements them
//! in `runtime::interpreter`.

use super::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Print,
    Len,
    Str,
    Float,
    Push,
    Range,
    Close,
    Panic,
}

impl Builtin {
    pub const ALL: [Builtin; 8] = [
        Builtin::Print,
        Builtin::Len,
        Builtin::Str,
        Builtin::Float,
        Builtin::Push,
        Builtin::Range,
        Builtin::Close,
        Builtin::Panic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Float => "float",
            Builtin::Push => "push",
            Builtin::Range => "range",
            Builtin::Close => "close",
            Builtin::Panic => "panic",
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Signature shown on hover and in completions
    pub fn signature(&self) -> &'static str {
        match self {
            Builtin::Print => "fn print(...values: Any) -> Void",
            Builtin::Len => "fn len(value: Array<T> | String) -> Int",
            Builtin::Str => "fn str(value: Any) -> String",
            Builtin::Float => "fn float(value: Int) -> Float",
            Builtin::Push => "fn push(array: Array<T>, value: T) -> Array<T>",
            Builtin::Range => "fn range(start: Int, end: Int = ...) -> Array<Int>",
            Builtin::Close => "fn close(channel: Chan<T>) -> Void",
            Builtin::Panic => "fn panic(message: String) -> Void",
        }
    }

    /// Accepted argument counts, inclusive
    pub fn arity(&self) -> (usize, usize) {
        match self {
            Builtin::Print => (0, usize::MAX),
            Builtin::Push => (2, 2),
            Builtin::Range => (1, 2),
            _ => (1, 1),
        }
    }

    /// Type of the builtin when used as a value rather than called
    pub fn value_type(&self) -> Type {
        let (min, max) = self.arity();
        let params = vec![Type::Any; max.min(2)];
        let ret = match self {
            Builtin::Print | Builtin::Close | Builtin::Panic => Type::Void,
            Builtin::Len => Type::Int,
            Builtin::Str => Type::String,
            Builtin::Float => Type::Float,
            Builtin::Push => Type::array(Type::Any),
            Builtin::Range => Type::array(Type::Int),
        };
        Type::Function {
            required: min.min(params.len()),
            params,
            ret: Box::new(ret),
        }
    }

    /// Result type of a call with the given argument types, or the reason
    /// the arguments are rejected. Arity is checked by the caller.
    pub fn check(&self, args: &[Type]) -> Result<Type, String> {
        if args.iter().any(Type::is_invalid) {
            return Ok(self.result_for_invalid());
        }
        let none = |_: crate::parser::DeclId, _: crate::parser::DeclId| false;
        match self {
            Builtin::Print => {
                if let Some(void) = args.iter().find(|t| **t == Type::Void) {
                    return Err(format!("cannot print a value of type {}", void));
                }
                Ok(Type::Void)
            }
            Builtin::Len => match &args[0] {
                Type::Array(_) | Type::String => Ok(Type::Int),
                other => Err(format!("len expects an Array or String, found {}", other)),
            },
            Builtin::Str => match &args[0] {
                Type::Void => Err("cannot convert Void to String".to_string()),
                _ => Ok(Type::String),
            },
            Builtin::Float => match &args[0] {
                Type::Int | Type::Float => Ok(Type::Float),
                other => Err(format!("float expects a number, found {}", other)),
            },
            Builtin::Push => match &args[0] {
                Type::Array(element) if **element == Type::Unresolved => {
                    Ok(Type::array(args[1].clone()))
                }
                Type::Array(element) if element.accepts(&args[1], &none) => {
                    Ok(args[0].clone())
                }
                Type::Array(element) => Err(format!(
                    "cannot push {} onto Array<{}>",
                    args[1], element
                )),
                other => Err(format!("push expects an Array, found {}", other)),
            },
            Builtin::Range => {
                if let Some(bad) = args.iter().find(|t| **t != Type::Int) {
                    return Err(format!("range expects Int bounds, found {}", bad));
                }
                Ok(Type::array(Type::Int))
            }
            Builtin::Close => match &args[0] {
                Type::Channel(_) => Ok(Type::Void),
                other => Err(format!("close expects a channel, found {}", other)),
            },
            Builtin::Panic => match &args[0] {
                Type::String => Ok(Type::Void),
                other => Err(format!("panic expects a String message, found {}", other)),
            },
        }
    }

    fn result_for_invalid(&self) -> Type {
        match self {
            Builtin::Print | Builtin::Close | Builtin::Panic => Type::Void,
            Builtin::Len => Type::Int,
            Builtin::Str => Type::String,
            Builtin::Float => Type::Float,
            Builtin::Range => Type::array(Type::Int),
            Builtin::Push => Type::Invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(Builtin::from_name("push"), Some(Builtin::Push));
        assert_eq!(Builtin::from_name("println"), None);
    }

    #[test]
    fn test_push_checks_element_type() {
        let ints = Type::array(Type::Int);
        assert_eq!(Builtin::Push.check(&[ints.clone(), Type::Int]), Ok(ints.clone()));
        assert!(Builtin::Push.check(&[ints, Type::String]).is_err());
    }

    #[test]
    fn test_len_rejects_numbers() {
        assert_eq!(Builtin::Len.check(&[Type::String]), Ok(Type::Int));
        assert!(Builtin::Len.check(&[Type::Int]).is_err());
    }
}
