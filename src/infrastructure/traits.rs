//! Collaborator boundary traits
//!
//! The engine only talks to its collaborators through these traits, allowing
//! services to be tested with stub implementations.

use std::fmt;

use rand::rngs::StdRng;
use serde_json::Value;

use crate::domain::{DomainResult, LeafSpec, PropertyDescriptor};

/// Property introspection: declared children of an object type.
///
/// Used only while expanding `Unexpanded` nodes.
pub trait PropertyShapeProvider: Send + Sync {
    /// Declared properties of `type_name`, in declaration order.
    fn properties(&self, type_name: &str) -> DomainResult<Vec<PropertyDescriptor>>;
}

/// Leaf value sampling.
///
/// Used only during materialization, for nodes without a pending value.
pub trait LeafSampler: Send + Sync {
    fn sample(&self, spec: &LeafSpec, rng: &mut StdRng) -> Value;
}

/// Reason given by a validator for rejecting a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: String,
}

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// End-result validation of a fully materialized value.
pub trait Validator: Send + Sync {
    /// Accept or reject one candidate.
    fn validate(&self, value: &Value) -> Result<(), Rejection>;

    /// Number of candidates to try before giving up.
    fn max_attempts(&self) -> usize {
        1
    }
}
