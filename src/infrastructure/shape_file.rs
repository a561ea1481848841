//! Type shapes loaded from JSON shape files
//!
//! ```json
//! { "root": "Order",
//!   "types": { "Order": [ { "name": "id", "shape": { "leaf": "uuid" } } ] } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::application::ApplicationError;

use crate::domain::{DomainError, DomainResult, PropertyDescriptor, TypeShape};
use crate::infrastructure::error::{InfraError, InfraResult};
use crate::infrastructure::traits::PropertyShapeProvider;

/// In-memory property shape provider: type name to declared properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeRegistry {
    types: BTreeMap<String, Vec<PropertyDescriptor>>,
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a type.
    pub fn register(&mut self, type_name: impl Into<String>, properties: Vec<PropertyDescriptor>) {
        self.types.insert(type_name.into(), properties);
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Object types referenced by some property but never declared.
    pub fn dangling_references(&self) -> Vec<String> {
        let mut missing = Vec::new();
        for properties in self.types.values() {
            for property in properties {
                collect_missing(&property.shape, self, &mut missing);
            }
        }
        missing.sort();
        missing.dedup();
        missing
    }

    /// `Type.property` for every property name a path expression cannot address.
    pub fn unaddressable_properties(&self, pattern: &Regex) -> Vec<String> {
        self.types
            .iter()
            .flat_map(|(type_name, properties)| {
                properties
                    .iter()
                    .filter(|p| !pattern.is_match(&p.name))
                    .map(move |p| format!("{type_name}.{}", p.name))
            })
            .collect()
    }
}

/// Names usable as expression segments: no `.`, brackets, whitespace or a bare `$`.
const PROPERTY_NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_-]*$";

fn collect_missing(shape: &TypeShape, registry: &ShapeRegistry, missing: &mut Vec<String>) {
    match shape {
        TypeShape::Leaf(_) => {}
        TypeShape::Object(name) => {
            if !registry.contains(name) {
                missing.push(name.clone());
            }
        }
        TypeShape::List(element) => collect_missing(element, registry, missing),
        TypeShape::Map { key, value } | TypeShape::Entry { key, value } => {
            collect_missing(key, registry, missing);
            collect_missing(value, registry, missing);
        }
    }
}

impl PropertyShapeProvider for ShapeRegistry {
    fn properties(&self, type_name: &str) -> DomainResult<Vec<PropertyDescriptor>> {
        self.types
            .get(type_name)
            .cloned()
            .ok_or_else(|| DomainError::UnknownType(type_name.to_string()))
    }
}

/// Parsed shape file: the default root type plus the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeFile {
    pub root: String,
    pub types: ShapeRegistry,
}

impl ShapeFile {
    /// Parse and check that every referenced type is declared.
    pub fn from_json(content: &str) -> InfraResult<Self> {
        let file: ShapeFile =
            serde_json::from_str(content).map_err(|e| InfraError::ShapeFile {
                message: e.to_string(),
            })?;
        if !file.types.contains(&file.root) {
            return Err(InfraError::ShapeFile {
                message: format!("root type '{}' is not declared", file.root),
            });
        }
        let missing = file.types.dangling_references();
        if !missing.is_empty() {
            return Err(InfraError::ShapeFile {
                message: format!("undeclared types: {}", missing.join(", ")),
            });
        }
        let pattern = Regex::new(PROPERTY_NAME_PATTERN).map_err(|e| {
            InfraError::Application(ApplicationError::OperationFailed {
                context: "compile property name regex".to_string(),
                source: Box::new(e),
            })
        })?;
        let unaddressable = file.types.unaddressable_properties(&pattern);
        if !unaddressable.is_empty() {
            return Err(InfraError::ShapeFile {
                message: format!("property names not addressable: {}", unaddressable.join(", ")),
            });
        }
        Ok(file)
    }

    #[instrument(level = "debug")]
    pub fn load(path: &Path) -> InfraResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| InfraError::io(format!("read shape file {}", path.display()), e))?;
        let file = Self::from_json(&content).map_err(|e| match e {
            InfraError::ShapeFile { message } => InfraError::ShapeFile {
                message: format!("{}: {}", path.display(), message),
            },
            other => other,
        })?;
        debug!(types = file.types.types.len(), root = %file.root, "loaded shape file");
        Ok(file)
    }

    /// Root shape, optionally overriding the declared root type.
    pub fn root_shape(&self, type_name: Option<&str>) -> InfraResult<TypeShape> {
        let name = type_name.unwrap_or(&self.root);
        if !self.types.contains(name) {
            return Err(InfraError::ShapeFile {
                message: format!("type '{name}' is not declared"),
            });
        }
        Ok(TypeShape::object(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LeafSpec;

    const ORDER: &str = r#"{
        "root": "Order",
        "types": {
            "Order": [
                { "name": "id", "shape": { "leaf": { "integer": { "min": 1, "max": 9 } } } },
                { "name": "items", "shape": { "list": { "object": "Item" } } },
                { "name": "note", "shape": { "leaf": { "string": { "min_len": 0, "max_len": 8 } } }, "nullable": true }
            ],
            "Item": [
                { "name": "sku", "shape": { "leaf": "uuid" } }
            ]
        }
    }"#;

    #[test]
    fn given_shape_file_when_parsing_then_registry_serves_properties() {
        let file = ShapeFile::from_json(ORDER).unwrap();

        let props = file.types.properties("Order").unwrap();

        assert_eq!(file.root, "Order");
        assert_eq!(props.len(), 3);
        assert_eq!(
            props[0].shape,
            TypeShape::Leaf(LeafSpec::Integer { min: 1, max: 9 })
        );
        assert!(props[2].nullable);
        assert_eq!(file.root_shape(None).unwrap(), TypeShape::object("Order"));
        assert_eq!(file.root_shape(Some("Item")).unwrap(), TypeShape::object("Item"));
    }

    #[test]
    fn given_dangling_type_when_parsing_then_shape_file_error() {
        let content = r#"{ "root": "A", "types": { "A": [ { "name": "b", "shape": { "object": "B" } } ] } }"#;

        let err = ShapeFile::from_json(content).unwrap_err();

        assert!(err.to_string().contains("undeclared types: B"));
    }

    #[test]
    fn given_dotted_property_name_when_parsing_then_rejected() {
        let content = r#"{ "root": "A", "types": { "A": [ { "name": "a.b", "shape": { "leaf": "bool" } } ] } }"#;

        let err = ShapeFile::from_json(content).unwrap_err();

        assert!(err.to_string().contains("A.a.b"));
    }

    #[test]
    fn given_missing_type_when_asking_provider_then_unknown_type() {
        let registry = ShapeRegistry::new();
        assert_eq!(
            registry.properties("Ghost"),
            Err(DomainError::UnknownType("Ghost".into()))
        );
    }
}
