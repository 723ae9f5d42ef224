//! The tagged value variants that make up a coil tree.

use crate::arena::StructId;
use crate::location::Location;
use std::fmt::Display;

/// An immutable scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Str(String),
}

impl Display for Leaf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Leaf::Int(v) => write!(f, "{v}"),
            Leaf::Float(v) => write!(f, "{v}"),
            Leaf::Bool(v) => write!(f, "{}", if *v { "True" } else { "False" }),
            Leaf::Null => write!(f, "None"),
            Leaf::Str(v) => write!(f, "{v}"),
        }
    }
}

/// An unresolved symbolic reference. Exists only between parsing and the
/// end of expansion; `path` is the textual path exactly as written (already
/// translated across inheritance boundaries if it crossed one, see
/// [`crate::expand`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub path: String,
    pub location: Location,
}

/// A value: a leaf, an ordered list, an unresolved link, or a nested struct.
///
/// Lists may hold leaves and nested lists but never structs (rejected at
/// parse time). Structs are addressed indirectly by [`StructId`] into the
/// owning [`crate::arena::Arena`] rather than embedded inline, so that a
/// struct's identity (and its parent back-reference) stays stable as values
/// around it are replaced during expansion.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Leaf(Leaf),
    List(Vec<Value>),
    Link(Link),
    Struct(StructId),
}

impl Value {
    pub fn as_struct(&self) -> Option<StructId> {
        match self {
            Value::Struct(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<&Link> {
        match self {
            Value::Link(link) => Some(link),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Value::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// A short type name for diagnostics (`ValueType` errors).
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Leaf(Leaf::Int(_)) => "integer",
            Value::Leaf(Leaf::Float(_)) => "float",
            Value::Leaf(Leaf::Bool(_)) => "boolean",
            Value::Leaf(Leaf::Null) => "null",
            Value::Leaf(Leaf::Str(_)) => "string",
            Value::List(_) => "list",
            Value::Link(_) => "link",
            Value::Struct(_) => "struct",
        }
    }
}
