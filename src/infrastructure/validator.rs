//! Stock validators

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::infrastructure::traits::{Rejection, Validator};

/// Accepts every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _value: &Value) -> Result<(), Rejection> {
        Ok(())
    }
}

/// Validator from a closure, with its own attempt budget.
#[derive(Clone)]
pub struct PredicateValidator {
    predicate: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
    reason: String,
    max_attempts: usize,
}

impl PredicateValidator {
    pub fn new<F>(reason: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            reason: reason.into(),
            max_attempts: 1,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

impl fmt::Debug for PredicateValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateValidator")
            .field("reason", &self.reason)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl Validator for PredicateValidator {
    fn validate(&self, value: &Value) -> Result<(), Rejection> {
        if (self.predicate)(value) {
            Ok(())
        } else {
            Err(Rejection::new(self.reason.clone()))
        }
    }

    fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}
