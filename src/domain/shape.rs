//! Declared type shapes: what the property-shape provider hands to the tree.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Specification of a leaf value, turned into a concrete value by the sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafSpec {
    Bool,
    Integer { min: i64, max: i64 },
    Float { min: f64, max: f64 },
    String { min_len: usize, max_len: usize },
    OneOf(Vec<Value>),
    Uuid,
}

impl LeafSpec {
    pub fn kind(&self) -> ValueKind {
        match self {
            LeafSpec::Bool => ValueKind::Bool,
            LeafSpec::Integer { .. } => ValueKind::Integer,
            LeafSpec::Float { .. } => ValueKind::Float,
            LeafSpec::String { .. } | LeafSpec::Uuid => ValueKind::String,
            LeafSpec::OneOf(_) => ValueKind::Any,
        }
    }
}

/// Declared shape of a property.
///
/// Objects are referenced by type name and resolved lazily, which is what
/// allows recursive types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeShape {
    Leaf(LeafSpec),
    Object(String),
    List(Box<TypeShape>),
    Map {
        key: Box<TypeShape>,
        value: Box<TypeShape>,
    },
    /// One map entry with `key` and `value` children; created by expansion only.
    #[serde(skip)]
    Entry {
        key: Box<TypeShape>,
        value: Box<TypeShape>,
    },
}

impl TypeShape {
    pub fn object(type_name: impl Into<String>) -> Self {
        TypeShape::Object(type_name.into())
    }

    pub fn list(element: TypeShape) -> Self {
        TypeShape::List(Box::new(element))
    }

    pub fn map(key: TypeShape, value: TypeShape) -> Self {
        TypeShape::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, TypeShape::List(_) | TypeShape::Map { .. })
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TypeShape::Leaf(_))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            TypeShape::Leaf(spec) => spec.kind(),
            TypeShape::Object(_) => ValueKind::Object,
            TypeShape::List(_) => ValueKind::Array,
            TypeShape::Map { .. } => ValueKind::Map,
            TypeShape::Entry { .. } => ValueKind::Object,
        }
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeShape::Leaf(spec) => write!(f, "{}", spec.kind()),
            TypeShape::Object(name) => f.write_str(name),
            TypeShape::List(element) => write!(f, "List<{element}>"),
            TypeShape::Map { key, value } => write!(f, "Map<{key}, {value}>"),
            TypeShape::Entry { key, value } => write!(f, "Entry<{key}, {value}>"),
        }
    }
}

/// One declared property of an object type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub shape: TypeShape,
    #[serde(default)]
    pub nullable: bool,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, shape: TypeShape) -> Self {
        Self {
            name: name.into(),
            shape,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Kind of a value, used for type-compatibility checks of manipulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Any,
    Bool,
    Integer,
    Float,
    String,
    Object,
    Array,
    Map,
}

impl ValueKind {
    /// `Any` on either side is compatible; integers also satisfy floats.
    pub fn is_compatible_with(self, declared: ValueKind) -> bool {
        match (self, declared) {
            (ValueKind::Any, _) | (_, ValueKind::Any) => true,
            (ValueKind::Float, ValueKind::Integer) => true,
            (a, b) => a == b,
        }
    }

    /// Whether a concrete JSON value can stand in for a node of this kind.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ValueKind::Any => true,
            ValueKind::Bool => value.is_boolean(),
            ValueKind::Integer => value.is_i64() || value.is_u64(),
            ValueKind::Float => value.is_number(),
            ValueKind::String => value.is_string(),
            ValueKind::Object | ValueKind::Map => value.is_object(),
            ValueKind::Array => value.is_array(),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Any => "Any",
            ValueKind::Bool => "Bool",
            ValueKind::Integer => "Integer",
            ValueKind::Float => "Float",
            ValueKind::String => "String",
            ValueKind::Object => "Object",
            ValueKind::Array => "Array",
            ValueKind::Map => "Map",
        };
        f.write_str(name)
    }
}
