//! Manipulators: deferred requests applied to a tree by the engine

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::application::builder::ArbitraryBuilder;
use crate::application::error::ApplicationResult;
use crate::domain::{
    ContainerSizeConstraint, DomainResult, ManipulatorId, PathExpression, ValueKind, ValueSource,
};

/// Post condition on a materialized value.
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
/// Rewrite of a materialized value.
pub type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;
/// Callback of a composed apply: sees the sample and may add manipulators.
pub type ApplyCallback =
    Arc<dyn Fn(&Value, &mut ArbitraryBuilder) -> ApplicationResult<()> + Send + Sync>;

/// Application order class, applied Metadata first, Post last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PriorityClass {
    Metadata,
    Ordered,
    Post,
}

#[derive(Debug, Clone)]
pub struct Assign {
    pub id: ManipulatorId,
    pub expression: PathExpression,
    pub source: ValueSource,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SetNullity {
    pub id: ManipulatorId,
    pub expression: PathExpression,
    pub force_null: bool,
}

#[derive(Debug, Clone)]
pub struct ContainerSize {
    pub id: ManipulatorId,
    pub expression: PathExpression,
    pub constraint: ContainerSizeConstraint,
}

#[derive(Clone)]
pub struct PostTransform {
    pub id: ManipulatorId,
    pub expression: PathExpression,
    pub expected: ValueKind,
    pub predicate: Predicate,
    pub transform: Option<Transform>,
    pub limit: Option<usize>,
}

impl fmt::Debug for PostTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostTransform")
            .field("id", &self.id)
            .field("expression", &self.expression)
            .field("expected", &self.expected)
            .field("transform", &self.transform.is_some())
            .field("limit", &self.limit)
            .finish()
    }
}

#[derive(Clone)]
pub struct ComposedApply {
    pub id: ManipulatorId,
    pub nested: Box<ArbitraryBuilder>,
    pub callback: ApplyCallback,
}

impl fmt::Debug for ComposedApply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedApply")
            .field("id", &self.id)
            .field("nested", &self.nested.manipulators().len())
            .finish()
    }
}

/// Closed set of manipulator kinds.
#[derive(Debug, Clone)]
pub enum Manipulator {
    Assign(Assign),
    Nullity(SetNullity),
    ContainerSize(ContainerSize),
    PostTransform(PostTransform),
    ComposedApply(ComposedApply),
}

impl Manipulator {
    pub fn assign(expression: &str, source: ValueSource, limit: Option<usize>) -> DomainResult<Self> {
        Ok(Manipulator::Assign(Assign {
            id: ManipulatorId::new(),
            expression: PathExpression::from(expression)?,
            source,
            limit,
        }))
    }

    /// `Assign("$", value)`: pins the whole value.
    pub fn assign_root(value: Value) -> Self {
        Manipulator::Assign(Assign {
            id: ManipulatorId::new(),
            expression: PathExpression::root(),
            source: ValueSource::Fixed(value),
            limit: None,
        })
    }

    pub fn nullity(expression: &str, force_null: bool) -> DomainResult<Self> {
        Ok(Manipulator::Nullity(SetNullity {
            id: ManipulatorId::new(),
            expression: PathExpression::from(expression)?,
            force_null,
        }))
    }

    pub fn container_size(
        expression: &str,
        min: Option<usize>,
        max: Option<usize>,
    ) -> DomainResult<Self> {
        Ok(Manipulator::ContainerSize(ContainerSize {
            id: ManipulatorId::new(),
            expression: PathExpression::from(expression)?,
            constraint: ContainerSizeConstraint::new(min, max)?,
        }))
    }

    pub fn post_transform(
        expression: &str,
        expected: ValueKind,
        predicate: Predicate,
        transform: Option<Transform>,
        limit: Option<usize>,
    ) -> DomainResult<Self> {
        Ok(Manipulator::PostTransform(PostTransform {
            id: ManipulatorId::new(),
            expression: PathExpression::from(expression)?,
            expected,
            predicate,
            transform,
            limit,
        }))
    }

    pub fn composed(nested: ArbitraryBuilder, callback: ApplyCallback) -> Self {
        Manipulator::ComposedApply(ComposedApply {
            id: ManipulatorId::new(),
            nested: Box::new(nested),
            callback,
        })
    }

    pub fn id(&self) -> ManipulatorId {
        match self {
            Manipulator::Assign(m) => m.id,
            Manipulator::Nullity(m) => m.id,
            Manipulator::ContainerSize(m) => m.id,
            Manipulator::PostTransform(m) => m.id,
            Manipulator::ComposedApply(m) => m.id,
        }
    }

    /// Target expression; a composed apply targets the whole value through its nested list.
    pub fn expression(&self) -> Option<&PathExpression> {
        match self {
            Manipulator::Assign(m) => Some(&m.expression),
            Manipulator::Nullity(m) => Some(&m.expression),
            Manipulator::ContainerSize(m) => Some(&m.expression),
            Manipulator::PostTransform(m) => Some(&m.expression),
            Manipulator::ComposedApply(_) => None,
        }
    }

    pub fn priority_class(&self) -> PriorityClass {
        match self {
            Manipulator::ContainerSize(_) => PriorityClass::Metadata,
            Manipulator::PostTransform(_) => PriorityClass::Post,
            Manipulator::Assign(_) | Manipulator::Nullity(_) | Manipulator::ComposedApply(_) => {
                PriorityClass::Ordered
            }
        }
    }

    /// Same logical manipulator (same id); a nested builder is deep-copied.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Same request under a new identity.
    pub fn renew(mut self) -> Self {
        let id = match &mut self {
            Manipulator::Assign(m) => &mut m.id,
            Manipulator::Nullity(m) => &mut m.id,
            Manipulator::ContainerSize(m) => &mut m.id,
            Manipulator::PostTransform(m) => &mut m.id,
            Manipulator::ComposedApply(m) => &mut m.id,
        };
        *id = ManipulatorId::new();
        self
    }

    /// Rebases the target under `prefix`, e.g. `price` under `items[*]`.
    pub fn with_prefix(mut self, prefix: &str) -> DomainResult<Self> {
        let expression = match &mut self {
            Manipulator::Assign(m) => Some(&mut m.expression),
            Manipulator::Nullity(m) => Some(&mut m.expression),
            Manipulator::ContainerSize(m) => Some(&mut m.expression),
            Manipulator::PostTransform(m) => Some(&mut m.expression),
            Manipulator::ComposedApply(_) => None,
        };
        if let Some(expression) = expression {
            *expression = if expression.is_root() {
                PathExpression::from(prefix)?
            } else {
                expression.append_left(prefix)?
            };
        }
        Ok(self)
    }
}

impl fmt::Display for Manipulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Manipulator::Assign(m) => match &m.source {
                ValueSource::Fixed(v) => write!(f, "set {} = {v}", m.expression)?,
                ValueSource::Generated(_) => write!(f, "set {} = <generated>", m.expression)?,
            },
            Manipulator::Nullity(m) if m.force_null => write!(f, "null {}", m.expression)?,
            Manipulator::Nullity(m) => write!(f, "not-null {}", m.expression)?,
            Manipulator::ContainerSize(m) => {
                let lo = m.constraint.min().map(|v| v.to_string()).unwrap_or_default();
                let hi = m.constraint.max().map(|v| v.to_string()).unwrap_or_default();
                write!(f, "size {} = {lo}..{hi}", m.expression)?
            }
            Manipulator::PostTransform(m) => write!(f, "post {} : {}", m.expression, m.expected)?,
            Manipulator::ComposedApply(m) => write!(f, "apply ({} nested)", m.nested.manipulators().len())?,
        }
        if let Manipulator::Assign(Assign { limit: Some(n), .. })
        | Manipulator::PostTransform(PostTransform { limit: Some(n), .. }) = self
        {
            write!(f, " limit {n}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;
    use serde_json::json;

    #[test]
    fn given_manipulators_when_classifying_then_size_first_post_last() {
        let size = Manipulator::container_size("items", Some(1), None).unwrap();
        let set = Manipulator::assign("id", ValueSource::Fixed(json!(1)), None).unwrap();
        let post = Manipulator::post_transform(
            "id",
            ValueKind::Integer,
            Arc::new(|_| true),
            None,
            None,
        )
        .unwrap();

        assert_eq!(size.priority_class(), PriorityClass::Metadata);
        assert_eq!(set.priority_class(), PriorityClass::Ordered);
        assert_eq!(post.priority_class(), PriorityClass::Post);
    }

    #[test]
    fn given_copy_when_comparing_ids_then_identity_is_kept() {
        let original = Manipulator::nullity("note", true).unwrap();
        let copied = original.copy();
        assert_eq!(original.id(), copied.id());
        assert_ne!(original.id(), Manipulator::nullity("note", true).unwrap().id());
    }

    #[test]
    fn given_prefix_when_rebasing_then_expression_is_nested() {
        let m = Manipulator::assign("price", ValueSource::Fixed(json!(0)), Some(1))
            .unwrap()
            .with_prefix("items[*]")
            .unwrap();
        assert_eq!(m.expression().unwrap().to_string(), "items[*].price");
        assert_eq!(m.to_string(), "set items[*].price = 0 limit 1");

        let root = Manipulator::assign_root(json!(1)).with_prefix("items[0]").unwrap();
        assert_eq!(root.expression().unwrap().to_string(), "items[0]");
    }

    #[test]
    fn given_bad_input_when_constructing_then_domain_errors() {
        assert!(matches!(
            Manipulator::container_size("items", Some(3), Some(1)),
            Err(DomainError::InvalidSizeConstraint { .. })
        ));
        assert!(matches!(
            Manipulator::nullity("a[", true),
            Err(DomainError::ExpressionSyntax { .. })
        ));
    }
}
