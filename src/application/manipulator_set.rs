//! Reusable bundles of manipulators

use serde_json::Value;

use crate::application::error::ApplicationResult;
use crate::application::manipulator::Manipulator;
use crate::domain::ValueSource;

/// Manipulators written once and added to any number of builders.
///
/// Expressions are relative: [`ArbitraryBuilder::set_under`](crate::application::ArbitraryBuilder::set_under)
/// rebases them under a prefix.
#[derive(Debug, Clone, Default)]
pub struct ManipulatorSet {
    manipulators: Vec<Manipulator>,
}

impl ManipulatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, expression: &str, value: impl Into<Value>) -> ApplicationResult<Self> {
        let value = value.into();
        let manipulator = if value.is_null() {
            Manipulator::nullity(expression, true)?
        } else {
            Manipulator::assign(expression, ValueSource::Fixed(value), None)?
        };
        self.manipulators.push(manipulator);
        Ok(self)
    }

    pub fn set_null(mut self, expression: &str) -> ApplicationResult<Self> {
        self.manipulators.push(Manipulator::nullity(expression, true)?);
        Ok(self)
    }

    pub fn set_not_null(mut self, expression: &str) -> ApplicationResult<Self> {
        self.manipulators.push(Manipulator::nullity(expression, false)?);
        Ok(self)
    }

    pub fn size(mut self, expression: &str, min: usize, max: usize) -> ApplicationResult<Self> {
        self.manipulators
            .push(Manipulator::container_size(expression, Some(min), Some(max))?);
        Ok(self)
    }

    pub fn push(mut self, manipulator: Manipulator) -> Self {
        self.manipulators.push(manipulator);
        self
    }

    pub fn manipulators(&self) -> &[Manipulator] {
        &self.manipulators
    }

    pub fn len(&self) -> usize {
        self.manipulators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manipulators.is_empty()
    }
}
