//! Domain entities: small value types shared by the tree and the engine

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::error::{DomainError, DomainResult};

/// Identity token of a manipulator, assigned once at construction.
///
/// Copies of a manipulator keep the token: they are the same logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManipulatorId(Uuid);

impl ManipulatorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ManipulatorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ManipulatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // short form is enough to tell manipulators apart in logs
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

/// Bounds on the number of elements of a container node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerSizeConstraint {
    min: Option<usize>,
    max: Option<usize>,
}

impl ContainerSizeConstraint {
    /// At least one bound must be given, and `min <= max` when both are.
    pub fn new(min: Option<usize>, max: Option<usize>) -> DomainResult<Self> {
        match (min, max) {
            (None, None) => Err(DomainError::InvalidSizeConstraint { min, max }),
            (Some(lo), Some(hi)) if lo > hi => Err(DomainError::InvalidSizeConstraint { min, max }),
            _ => Ok(Self { min, max }),
        }
    }

    pub fn exact(size: usize) -> Self {
        Self {
            min: Some(size),
            max: Some(size),
        }
    }

    pub fn min(&self) -> Option<usize> {
        self.min
    }

    pub fn max(&self) -> Option<usize> {
        self.max
    }

    /// Concrete inclusive range, filling missing bounds from the defaults.
    pub fn resolve(&self, default_min: usize, default_max: usize) -> (usize, usize) {
        match (self.min, self.max) {
            (Some(lo), Some(hi)) => (lo, hi),
            (Some(lo), None) => (lo, lo.max(default_max)),
            (None, Some(hi)) => (default_min.min(hi), hi),
            (None, None) => (default_min, default_max.max(default_min)),
        }
    }
}

/// Forced nullity, overriding probabilistic null injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nullity {
    ForceNull,
    ForceNotNull,
}

impl Nullity {
    pub fn from_force_null(force_null: bool) -> Self {
        if force_null {
            Nullity::ForceNull
        } else {
            Nullity::ForceNotNull
        }
    }
}

/// Closure producing a value for a whole subtree at materialization time.
#[derive(Clone)]
pub struct ValueGenerator(Arc<dyn Fn(&mut StdRng) -> Value + Send + Sync>);

impl ValueGenerator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut StdRng) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn generate(&self, rng: &mut StdRng) -> Value {
        (self.0)(rng)
    }
}

impl fmt::Debug for ValueGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueGenerator(..)")
    }
}

/// Pending value of a node.
#[derive(Debug, Clone)]
pub enum ValueSource {
    Fixed(Value),
    Generated(ValueGenerator),
}

/// Expansion state machine of a node: `Unexpanded -> Expanded`.
///
/// Re-expansion discards the children and goes through `Unexpanded` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionState {
    Unexpanded,
    Expanded,
}

/// Position of a node relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Root,
    Field,
    Element(usize),
    MapKey,
    MapValue,
}
