use std::fmt::{Display, Formatter, Result};


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int,
    Bool,
    String,
    Void,
    Unresolved, // used as a default
    Error,
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let type_name = match self {
            Type::Int => "int",
            Type::Bool => "bool",
            Type::String => "string",
            Type::Void => "void",
            Type::Unresolved => "unresolved",
            Type::Error => "???",
        };

        write!(f, "{}", type_name)
    }
}

impl Type {
    pub fn is_assignable_to(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Error, _) | (_, Type::Error) => true,
            (Type::Unresolved, _) | (_, Type::Unresolved) => false,
            (left, right) => left == right,
        }
    }

    pub fn from_str(s: &str) -> Option<Type> {
        match s {
            "int" => Some(Type::Int),
            "bool" => Some(Type::Bool),
            "string" => Some(Type::String),
            "void" => Some(Type::Void),
            _ => None,
        }
    }

    /// Whether a value of this type occupies a machine word at runtime
    pub fn has_value(&self) -> bool {
        !matches!(self, Type::Void | Type::Unresolved | Type::Error)
    }
}
