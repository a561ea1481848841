//! Template builder facade and the built sample source

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::application::engine::{ManipulatorEngine, QueuedTransform};
use crate::application::error::{ApplicationError, ApplicationResult};
use crate::application::manipulator::Manipulator;
use crate::application::manipulator_set::ManipulatorSet;
use crate::application::materialize::Materializer;
use crate::application::tracker::ReuseTracker;
use crate::application::traverser::Traverser;
use crate::config::Settings;
use crate::domain::{ArbitraryTree, PathExpression, TypeShape, ValueGenerator, ValueKind, ValueSource};
use crate::infrastructure::{
    AcceptAll, LeafSampler, PredicateValidator, PropertyShapeProvider, RandomLeafSampler,
    Validator,
};

/// Rng of pull `n`: `seed + n` when seeded, OS entropy otherwise.
pub fn seeded_rng(seed: Option<u64>, pull: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(pull)),
        None => StdRng::from_os_rng(),
    }
}

/// Fallible producer of a whole root value, drawn once per pull.
type Derivation = Arc<dyn Fn(&mut StdRng) -> ApplicationResult<Value> + Send + Sync>;

/// Template of a value: a tree plus an ordered list of pending manipulators.
///
/// Manipulators are only recorded here; they are applied to a copy of the
/// tree on every pull.
#[derive(Clone)]
pub struct ArbitraryBuilder {
    tree: ArbitraryTree,
    pending: Vec<Manipulator>,
    tracker: ReuseTracker,
    /// Root value of a mapped or zipped template, pinned before the pending manipulators.
    derived: Option<Derivation>,
    provider: Arc<dyn PropertyShapeProvider>,
    sampler: Arc<dyn LeafSampler>,
    validator: Arc<dyn Validator>,
    settings: Settings,
}

impl fmt::Debug for ArbitraryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArbitraryBuilder")
            .field("pending", &self.pending.len())
            .field("applied", &self.tracker.len())
            .field("nodes", &self.tree.len())
            .field("derived", &self.derived.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

impl ArbitraryBuilder {
    pub fn new(root: TypeShape, provider: Arc<dyn PropertyShapeProvider>) -> Self {
        Self {
            tree: ArbitraryTree::new(root),
            pending: Vec::new(),
            tracker: ReuseTracker::new(),
            derived: None,
            provider,
            sampler: Arc::new(RandomLeafSampler),
            validator: Arc::new(AcceptAll),
            settings: Settings::default(),
        }
    }

    /// Builder for the object type `type_name`.
    pub fn for_type(type_name: &str, provider: Arc<dyn PropertyShapeProvider>) -> Self {
        Self::new(TypeShape::object(type_name), provider)
    }

    /// Replaces the settings; values a pull cannot work with are rejected here.
    pub fn with_settings(mut self, settings: Settings) -> ApplicationResult<Self> {
        settings.validate()?;
        self.settings = settings;
        Ok(self)
    }

    pub fn with_sampler(mut self, sampler: Arc<dyn LeafSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// Validator from a closure, budgeted by `validation.max_attempts`.
    pub fn validate_with<F>(self, reason: &str, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let validator = PredicateValidator::new(reason, predicate)
            .with_max_attempts(self.settings.validation.max_attempts);
        self.with_validator(Arc::new(validator))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tree(&self) -> &ArbitraryTree {
        &self.tree
    }

    pub fn manipulators(&self) -> &[Manipulator] {
        &self.pending
    }

    /// Whether some pending manipulator is not embodied in the template yet.
    pub fn is_dirty(&self) -> bool {
        self.tracker.is_dirty(&self.pending)
    }

    /// Appends a manipulator as-is.
    pub fn manipulate(&mut self, manipulator: Manipulator) -> &mut Self {
        self.pending.push(manipulator);
        self
    }

    /// Pins the value at `expression`; `null` forces null.
    pub fn set(&mut self, expression: &str, value: impl Into<Value>) -> ApplicationResult<&mut Self> {
        self.set_limited(expression, value, None)
    }

    /// Like [`set`](Self::set), touching at most `limit` matched nodes.
    pub fn set_limited(
        &mut self,
        expression: &str,
        value: impl Into<Value>,
        limit: Option<usize>,
    ) -> ApplicationResult<&mut Self> {
        let value = value.into();
        let manipulator = if value.is_null() {
            Manipulator::nullity(expression, true)?
        } else {
            Manipulator::assign(expression, ValueSource::Fixed(value), limit)?
        };
        Ok(self.manipulate(manipulator))
    }

    /// The subtree at `expression` comes from `generator` on every pull.
    pub fn set_generated<F>(&mut self, expression: &str, generator: F) -> ApplicationResult<&mut Self>
    where
        F: Fn(&mut StdRng) -> Value + Send + Sync + 'static,
    {
        let source = ValueSource::Generated(ValueGenerator::new(generator));
        Ok(self.manipulate(Manipulator::assign(expression, source, None)?))
    }

    /// Samples `other` once, now, and pins the result at `expression`.
    pub fn set_builder(
        &mut self,
        expression: &str,
        other: &ArbitraryBuilder,
    ) -> ApplicationResult<&mut Self> {
        let value = other.sample()?;
        self.set(expression, value)
    }

    pub fn set_null(&mut self, expression: &str) -> ApplicationResult<&mut Self> {
        Ok(self.manipulate(Manipulator::nullity(expression, true)?))
    }

    pub fn set_not_null(&mut self, expression: &str) -> ApplicationResult<&mut Self> {
        Ok(self.manipulate(Manipulator::nullity(expression, false)?))
    }

    pub fn size(&mut self, expression: &str, min: usize, max: usize) -> ApplicationResult<&mut Self> {
        Ok(self.manipulate(Manipulator::container_size(expression, Some(min), Some(max))?))
    }

    pub fn min_size(&mut self, expression: &str, min: usize) -> ApplicationResult<&mut Self> {
        Ok(self.manipulate(Manipulator::container_size(expression, Some(min), None)?))
    }

    pub fn max_size(&mut self, expression: &str, max: usize) -> ApplicationResult<&mut Self> {
        Ok(self.manipulate(Manipulator::container_size(expression, None, Some(max))?))
    }

    /// Resamples the nodes at `expression` until `predicate` holds.
    pub fn set_post_condition<F>(
        &mut self,
        expression: &str,
        expected: ValueKind,
        predicate: F,
    ) -> ApplicationResult<&mut Self>
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.set_post_condition_limited(expression, expected, predicate, None)
    }

    pub fn set_post_condition_limited<F>(
        &mut self,
        expression: &str,
        expected: ValueKind,
        predicate: F,
        limit: Option<usize>,
    ) -> ApplicationResult<&mut Self>
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let manipulator =
            Manipulator::post_transform(expression, expected, Arc::new(predicate), None, limit)?;
        Ok(self.manipulate(manipulator))
    }

    /// Rewrites the materialized value at `expression`.
    pub fn map_value<F>(
        &mut self,
        expression: &str,
        expected: ValueKind,
        transform: F,
    ) -> ApplicationResult<&mut Self>
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        let manipulator = Manipulator::post_transform(
            expression,
            expected,
            Arc::new(|_| true),
            Some(Arc::new(transform)),
            None,
        )?;
        Ok(self.manipulate(manipulator))
    }

    /// Wraps the current template: each pull samples it, then `callback` may add
    /// manipulators that see that sample.
    pub fn apply<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&Value, &mut ArbitraryBuilder) -> ApplicationResult<()> + Send + Sync + 'static,
    {
        let nested = self.copy();
        self.pending.clear();
        self.derived = None;
        self.manipulate(Manipulator::composed(nested, Arc::new(callback)))
    }

    /// [`apply`](Self::apply) that only runs `consumer` for samples matching `predicate`.
    pub fn accept_if<P, F>(&mut self, predicate: P, consumer: F) -> &mut Self
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
        F: Fn(&mut ArbitraryBuilder) -> ApplicationResult<()> + Send + Sync + 'static,
    {
        self.apply(move |value, builder| {
            if predicate(value) {
                consumer(builder)
            } else {
                Ok(())
            }
        })
    }

    /// Adds every manipulator of `set`, each under a fresh identity.
    pub fn apply_set(&mut self, set: &ManipulatorSet) -> &mut Self {
        for manipulator in set.manipulators() {
            self.pending.push(manipulator.copy().renew());
        }
        self
    }

    /// Adds every manipulator of `set` with its target rebased under `prefix`.
    pub fn set_under(&mut self, prefix: &str, set: &ManipulatorSet) -> ApplicationResult<&mut Self> {
        PathExpression::from(prefix)?;
        for manipulator in set.manipulators() {
            let rebased = manipulator.copy().renew().with_prefix(prefix)?;
            self.pending.push(rebased);
        }
        Ok(self)
    }

    /// Adds one of `sets`, picked at random when called; no sets is a no-op.
    pub fn apply_any_set(&mut self, sets: &[ManipulatorSet]) -> &mut Self {
        if sets.is_empty() {
            return self;
        }
        let mut rng = seeded_rng(self.settings.generation.seed, self.pending.len() as u64);
        let pick = rng.random_range(0..sets.len());
        debug!(pick, of = sets.len(), "picked manipulator set");
        self.apply_set(&sets[pick])
    }

    /// Template of `shape` whose root is `mapper` applied to a fresh sample of this one.
    ///
    /// Manipulators added to the result act on top of the mapped value.
    pub fn map<F>(&self, shape: TypeShape, mapper: F) -> ArbitraryBuilder
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        let source = self.copy();
        self.derive(shape, move |rng| Ok(mapper(source.sample_with(rng)?)))
    }

    /// Template of `shape` combining fresh samples of this template and `other`.
    pub fn zip_with<F>(
        &self,
        other: &ArbitraryBuilder,
        shape: TypeShape,
        combinator: F,
    ) -> ArbitraryBuilder
    where
        F: Fn(Value, Value) -> Value + Send + Sync + 'static,
    {
        let (left, right) = (self.copy(), other.copy());
        self.derive(shape, move |rng| {
            let first = left.sample_with(rng)?;
            let second = right.sample_with(rng)?;
            Ok(combinator(first, second))
        })
    }

    /// Like [`zip_with`](Self::zip_with) over any number of templates; samples arrive
    /// in order, this template's first.
    pub fn zip_all<F>(
        &self,
        others: &[ArbitraryBuilder],
        shape: TypeShape,
        combinator: F,
    ) -> ArbitraryBuilder
    where
        F: Fn(Vec<Value>) -> Value + Send + Sync + 'static,
    {
        let sources: Vec<ArbitraryBuilder> = std::iter::once(self.copy())
            .chain(others.iter().map(ArbitraryBuilder::copy))
            .collect();
        self.derive(shape, move |rng| {
            let samples = sources
                .iter()
                .map(|source| source.sample_with(rng))
                .collect::<ApplicationResult<Vec<_>>>()?;
            Ok(combinator(samples))
        })
    }

    /// Fresh template sharing this one's collaborators and settings, but not its validator.
    fn derive<F>(&self, shape: TypeShape, derivation: F) -> ArbitraryBuilder
    where
        F: Fn(&mut StdRng) -> ApplicationResult<Value> + Send + Sync + 'static,
    {
        let mut derived = ArbitraryBuilder::new(shape, self.provider.clone());
        derived.sampler = self.sampler.clone();
        derived.settings = self.settings.clone();
        derived.derived = Some(Arc::new(derivation));
        derived
    }

    /// Samples once and pins the template to that sample.
    ///
    /// Every current manipulator counts as applied afterwards; only later
    /// additions act on future pulls.
    #[instrument(level = "debug", skip(self))]
    pub fn fixed(&mut self) -> ApplicationResult<&mut Self> {
        let sample = self.sample()?;
        self.tracker
            .mark_applied(self.pending.iter().map(Manipulator::id));

        let assign = Manipulator::assign_root(sample);
        let mut rng = seeded_rng(self.settings.generation.seed, 0);
        let traverser = Traverser::new(self.provider.as_ref(), &self.settings.generation);
        let mut engine = ManipulatorEngine::new(traverser);
        engine.apply(&mut self.tree, &assign, &mut rng)?;

        self.tracker.mark_applied([assign.id()]);
        self.pending.push(assign);
        self.derived = None;
        debug!(applied = self.tracker.len(), "template fixed");
        Ok(self)
    }

    /// Pending list becomes exactly `[Assign("$", sample)]`.
    pub(crate) fn freeze(&mut self, sample: Value) {
        self.pending = vec![Manipulator::assign_root(sample)];
        self.tracker = ReuseTracker::new();
        self.derived = None;
    }

    /// Independent deep copy; manipulators keep their identity.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Snapshot of the template as a pull-based sample source.
    pub fn build(&self) -> Arbitrary {
        Arbitrary {
            template: self.copy(),
            pulls: AtomicU64::new(0),
        }
    }

    pub fn sample(&self) -> ApplicationResult<Value> {
        self.build().sample()
    }

    pub fn sample_list(&self, size: usize) -> ApplicationResult<Vec<Value>> {
        self.build().sample_stream().take(size).collect()
    }

    pub fn sample_stream(&self) -> SampleStream {
        self.build().sample_stream()
    }

    pub fn sample_as<T: DeserializeOwned>(&self) -> ApplicationResult<T> {
        self.build().sample_as()
    }

    /// Concrete paths `expression` resolves to after the pending manipulators.
    pub fn find_all(&self, expression: &str) -> ApplicationResult<Vec<PathExpression>> {
        let expression = PathExpression::from(expression)?;
        let mut rng = seeded_rng(self.settings.generation.seed, 0);
        let (mut tree, _) = self.prepare(&mut rng)?;
        let traverser = Traverser::new(self.provider.as_ref(), &self.settings.generation);
        let nodes = traverser.find_all(&mut tree, &expression, &mut rng)?;
        Ok(nodes.into_iter().map(|idx| tree.path_of(idx)).collect())
    }

    /// Fully expanded tree after the pending manipulators, before materialization.
    pub fn prepared_tree(&self) -> ApplicationResult<ArbitraryTree> {
        let mut rng = seeded_rng(self.settings.generation.seed, 0);
        let (mut tree, _) = self.prepare(&mut rng)?;
        Traverser::new(self.provider.as_ref(), &self.settings.generation)
            .expand_all(&mut tree, &mut rng)?;
        Ok(tree)
    }

    /// Copies the tree and applies the manipulators not yet embodied in it.
    ///
    /// A derived root value is pinned in a pass of its own, so even metadata
    /// manipulators act on top of it.
    fn prepare(&self, rng: &mut StdRng) -> ApplicationResult<(ArbitraryTree, Vec<QueuedTransform>)> {
        let mut tree = self.tree.copy();
        let traverser = Traverser::new(self.provider.as_ref(), &self.settings.generation);
        let mut engine = ManipulatorEngine::new(traverser);
        if let Some(derivation) = &self.derived {
            let root = Manipulator::assign_root(derivation(rng)?);
            engine.apply(&mut tree, &root, rng)?;
        }
        let active: Vec<Manipulator> = self
            .tracker
            .active(&self.pending)
            .into_iter()
            .map(Manipulator::copy)
            .collect();
        engine.apply_all(&mut tree, &active, rng)?;
        Ok((tree, engine.into_post_queue()))
    }

    fn generate(&self, rng: &mut StdRng) -> ApplicationResult<Value> {
        let (mut tree, queue) = self.prepare(rng)?;
        let traverser = Traverser::new(self.provider.as_ref(), &self.settings.generation);
        Materializer::new(traverser, self.sampler.as_ref()).materialize(&mut tree, &queue, rng)
    }

    /// One validated value, drawing candidates from `rng`.
    pub(crate) fn sample_with(&self, rng: &mut StdRng) -> ApplicationResult<Value> {
        let valid_only = self.settings.validation.valid_only;
        let budget = if valid_only {
            self.validator.max_attempts().max(1)
        } else {
            1
        };

        let mut reason = String::new();
        for attempt in 1..=budget {
            let candidate = self.generate(rng)?;
            if !valid_only {
                return Ok(candidate);
            }
            match self.validator.validate(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(rejection) => {
                    debug!(attempt, %rejection, "candidate rejected");
                    reason = rejection.reason;
                }
            }
        }
        Err(ApplicationError::ValidationExhausted {
            attempts: budget,
            reason,
        })
    }
}

/// Built sample source: every pull works on its own copy of the snapshot.
pub struct Arbitrary {
    template: ArbitraryBuilder,
    pulls: AtomicU64,
}

impl Arbitrary {
    pub fn sample(&self) -> ApplicationResult<Value> {
        let pull = self.pulls.fetch_add(1, Ordering::Relaxed);
        let mut rng = seeded_rng(self.template.settings.generation.seed, pull);
        self.template.sample_with(&mut rng)
    }

    pub fn sample_as<T: DeserializeOwned>(&self) -> ApplicationResult<T> {
        let value = self.sample()?;
        Ok(serde_json::from_value(value)?)
    }

    /// Unbounded stream of samples.
    pub fn sample_stream(self) -> SampleStream {
        SampleStream { arbitrary: self }
    }
}

impl fmt::Debug for Arbitrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arbitrary")
            .field("template", &self.template)
            .field("pulls", &self.pulls.load(Ordering::Relaxed))
            .finish()
    }
}

pub struct SampleStream {
    arbitrary: Arbitrary,
}

impl Iterator for SampleStream {
    type Item = ApplicationResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.arbitrary.sample())
    }
}
