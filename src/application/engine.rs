//! Manipulator engine: applies manipulators to a tree in priority order

use std::collections::VecDeque;

use rand::rngs::StdRng;
use serde_json::{Map, Value};
use tracing::{debug, instrument, trace};

use crate::application::error::ApplicationResult;
use crate::application::manipulator::{
    Assign, ComposedApply, ContainerSize, Manipulator, PostTransform, PriorityClass, SetNullity,
};
use crate::application::traverser::Traverser;
use crate::domain::{
    ArbitraryTree, ContainerSizeConstraint, DomainError, NodeId, Nullity, TypeShape, ValueKind,
    ValueSource,
};

/// Post transform bound to a concrete node, run after materialization.
#[derive(Debug, Clone)]
pub struct QueuedTransform {
    pub node: NodeId,
    pub transform: PostTransform,
}

/// Applies manipulator lists to one tree and collects the post-transform queue.
pub struct ManipulatorEngine<'a> {
    traverser: Traverser<'a>,
    post_queue: Vec<QueuedTransform>,
}

/// Work left in one `apply_all` pass.
///
/// `ordered` keeps insertion order for everything but metadata; post transforms
/// ride along in it and are moved to `deferred` when reached, so their targets
/// are resolved only after every structural change of the pass.
#[derive(Default)]
struct Pass {
    metadata: Vec<Manipulator>,
    ordered: VecDeque<Manipulator>,
    deferred: Vec<PostTransform>,
}

impl Pass {
    fn new(manipulators: &[Manipulator]) -> Self {
        let mut pass = Self::default();
        for manipulator in manipulators {
            match manipulator.priority_class() {
                PriorityClass::Metadata => pass.metadata.push(manipulator.clone()),
                PriorityClass::Ordered | PriorityClass::Post => {
                    pass.ordered.push_back(manipulator.clone())
                }
            }
        }
        pass
    }

    /// Spliced manipulators take the place of the apply that produced them.
    fn splice(&mut self, spliced: Vec<Manipulator>) {
        let (metadata, rest): (Vec<_>, Vec<_>) = spliced
            .into_iter()
            .partition(|m| m.priority_class() == PriorityClass::Metadata);
        self.metadata.extend(metadata);
        for manipulator in rest.into_iter().rev() {
            self.ordered.push_front(manipulator);
        }
    }

    /// Pending metadata, fewest steps first; ties by expression order.
    fn take_metadata(&mut self) -> Vec<Manipulator> {
        let mut metadata = std::mem::take(&mut self.metadata);
        metadata.sort_by(|a, b| {
            let steps = |m: &Manipulator| m.expression().map(|e| e.step_count()).unwrap_or(0);
            steps(a)
                .cmp(&steps(b))
                .then_with(|| a.expression().cmp(&b.expression()))
        });
        metadata
    }
}

impl<'a> ManipulatorEngine<'a> {
    pub fn new(traverser: Traverser<'a>) -> Self {
        Self {
            traverser,
            post_queue: Vec::new(),
        }
    }

    pub fn post_queue(&self) -> &[QueuedTransform] {
        &self.post_queue
    }

    pub fn into_post_queue(self) -> Vec<QueuedTransform> {
        self.post_queue
    }

    /// Metadata (by priority key), then the rest in insertion order, then post transforms.
    ///
    /// Manipulators spliced in by a composed apply join this same pass.
    #[instrument(level = "debug", skip_all, fields(count = manipulators.len()))]
    pub fn apply_all(
        &mut self,
        tree: &mut ArbitraryTree,
        manipulators: &[Manipulator],
        rng: &mut StdRng,
    ) -> ApplicationResult<()> {
        let mut pass = Pass::new(manipulators);
        loop {
            if !pass.metadata.is_empty() {
                for manipulator in pass.take_metadata() {
                    self.step(tree, manipulator, &mut pass, rng)?;
                }
                continue;
            }
            let Some(manipulator) = pass.ordered.pop_front() else {
                break;
            };
            self.step(tree, manipulator, &mut pass, rng)?;
        }

        for transform in std::mem::take(&mut pass.deferred) {
            self.enqueue_post(tree, &transform, rng)?;
        }
        Ok(())
    }

    /// Applies a single manipulator as a pass of its own.
    pub fn apply(
        &mut self,
        tree: &mut ArbitraryTree,
        manipulator: &Manipulator,
        rng: &mut StdRng,
    ) -> ApplicationResult<()> {
        self.apply_all(tree, std::slice::from_ref(manipulator), rng)
    }

    fn step(
        &mut self,
        tree: &mut ArbitraryTree,
        manipulator: Manipulator,
        pass: &mut Pass,
        rng: &mut StdRng,
    ) -> ApplicationResult<()> {
        trace!(%manipulator, "applying");
        match manipulator {
            Manipulator::ContainerSize(m) => self.apply_size(tree, &m, rng),
            Manipulator::Assign(m) => self.apply_assign(tree, &m, rng),
            Manipulator::Nullity(m) => self.apply_nullity(tree, &m, rng),
            Manipulator::PostTransform(m) => {
                pass.deferred.push(m);
                Ok(())
            }
            Manipulator::ComposedApply(m) => {
                let spliced = self.compose(&m, rng)?;
                pass.splice(spliced);
                Ok(())
            }
        }
    }

    fn apply_size(
        &mut self,
        tree: &mut ArbitraryTree,
        m: &ContainerSize,
        rng: &mut StdRng,
    ) -> ApplicationResult<()> {
        let targets = self.traverser.find_all(tree, &m.expression, rng)?;
        for idx in targets {
            let is_container = tree.get_node(idx).is_some_and(|n| n.is_container());
            if !is_container {
                return Err(DomainError::ContainerSizeOnNonContainer {
                    path: tree.path_of(idx).to_string(),
                }
                .into());
            }
            if let Some(node) = tree.get_node_mut(idx) {
                node.size_constraint = Some(m.constraint);
                node.applied.push(m.id);
            }
            self.traverser.reexpand(tree, idx, rng)?;
        }
        Ok(())
    }

    fn apply_assign(
        &mut self,
        tree: &mut ArbitraryTree,
        m: &Assign,
        rng: &mut StdRng,
    ) -> ApplicationResult<()> {
        let targets = self.traverser.find_all(tree, &m.expression, rng)?;
        let limit = m.limit.unwrap_or(usize::MAX);
        let mut count = 0;

        for idx in targets {
            if count >= limit {
                break;
            }
            if !tree.contains(idx) {
                continue;
            }
            let assigned = match &m.source {
                ValueSource::Fixed(value) => self.assign_value(tree, idx, value, rng)?,
                ValueSource::Generated(generator) => {
                    if let Some(node) = tree.get_node_mut(idx) {
                        node.source = Some(ValueSource::Generated(generator.clone()));
                        node.nullity = None;
                        node.null_inject = 0.0;
                    }
                    true
                }
            };
            if assigned {
                count += 1;
                if let Some(node) = tree.get_node_mut(idx) {
                    node.applied.push(m.id);
                }
            }
        }
        debug!(expression = %m.expression, assigned = count, "assign");
        Ok(())
    }

    /// Decomposes a fixed value into the subtree of `idx`.
    ///
    /// Returns false when the value does not fit the declared shape.
    fn assign_value(
        &mut self,
        tree: &mut ArbitraryTree,
        idx: NodeId,
        value: &Value,
        rng: &mut StdRng,
    ) -> ApplicationResult<bool> {
        let Some(node) = tree.get_node_mut(idx) else {
            return Ok(false);
        };

        if value.is_null() {
            node.nullity = Some(Nullity::ForceNull);
            node.source = None;
            return Ok(true);
        }

        let shape = node.shape().clone();
        if !shape.kind().accepts(value) {
            debug!(
                path = %tree.path_of(idx),
                declared = %shape.kind(),
                "value does not fit declared kind, skipping"
            );
            return Ok(false);
        }
        node.nullity = None;
        node.null_inject = 0.0;
        node.source = None;

        match (&shape, value) {
            (TypeShape::Leaf(_), _) => {
                if let Some(node) = tree.get_node_mut(idx) {
                    node.source = Some(ValueSource::Fixed(value.clone()));
                }
            }
            (TypeShape::Object(_) | TypeShape::Entry { .. }, Value::Object(fields)) => {
                self.traverser.expand(tree, idx, rng)?;
                self.assign_fields(tree, idx, fields, rng)?;
            }
            (TypeShape::List(_), Value::Array(elements)) => {
                self.resize_exact(tree, idx, elements.len(), rng)?;
                let children = tree.children(idx).to_vec();
                for (child, element) in children.into_iter().zip(elements) {
                    self.assign_value(tree, child, element, rng)?;
                }
            }
            (TypeShape::Map { key, .. }, Value::Object(entries)) => {
                let key_kind = key.kind();
                self.resize_exact(tree, idx, entries.len(), rng)?;
                let children = tree.children(idx).to_vec();
                for (entry, (k, v)) in children.into_iter().zip(entries) {
                    self.traverser.expand(tree, entry, rng)?;
                    let parts = tree.children(entry).to_vec();
                    if let [key_node, value_node] = parts[..] {
                        self.assign_value(tree, key_node, &map_key_value(k, key_kind), rng)?;
                        self.assign_value(tree, value_node, v, rng)?;
                    }
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn assign_fields(
        &mut self,
        tree: &mut ArbitraryTree,
        idx: NodeId,
        fields: &Map<String, Value>,
        rng: &mut StdRng,
    ) -> ApplicationResult<()> {
        let children = tree.children(idx).to_vec();
        for child in children {
            let Some(name) = tree.get_node(child).map(|n| n.name().to_string()) else {
                continue;
            };
            match fields.get(&name) {
                Some(field) => {
                    self.assign_value(tree, child, field, rng)?;
                }
                None => {
                    if let Some(node) = tree.get_node_mut(child) {
                        node.nullity = Some(Nullity::ForceNull);
                        node.source = None;
                    }
                }
            }
        }
        for name in fields.keys() {
            let declared = tree
                .children(idx)
                .iter()
                .any(|&c| tree.get_node(c).is_some_and(|n| n.name() == name));
            if !declared {
                debug!(path = %tree.path_of(idx), field = %name, "ignoring undeclared field");
            }
        }
        Ok(())
    }

    fn resize_exact(
        &mut self,
        tree: &mut ArbitraryTree,
        idx: NodeId,
        size: usize,
        rng: &mut StdRng,
    ) -> ApplicationResult<()> {
        if let Some(node) = tree.get_node_mut(idx) {
            node.size_constraint = Some(ContainerSizeConstraint::exact(size));
        }
        self.traverser.reexpand(tree, idx, rng)?;
        Ok(())
    }

    fn apply_nullity(
        &mut self,
        tree: &mut ArbitraryTree,
        m: &SetNullity,
        rng: &mut StdRng,
    ) -> ApplicationResult<()> {
        let targets = self.traverser.find_all(tree, &m.expression, rng)?;
        for idx in targets {
            if let Some(node) = tree.get_node_mut(idx) {
                node.nullity = Some(Nullity::from_force_null(m.force_null));
                if m.force_null {
                    node.source = None;
                }
                node.applied.push(m.id);
            }
        }
        Ok(())
    }

    fn enqueue_post(
        &mut self,
        tree: &mut ArbitraryTree,
        m: &PostTransform,
        rng: &mut StdRng,
    ) -> ApplicationResult<()> {
        let targets = self.traverser.find_all(tree, &m.expression, rng)?;
        let limit = m.limit.unwrap_or(usize::MAX);
        let mut queued = 0;

        for idx in targets {
            if queued >= limit {
                break;
            }
            let Some(node) = tree.get_node_mut(idx) else {
                continue;
            };
            let declared = node.shape().kind();
            if !m.expected.is_compatible_with(declared) {
                debug!(expected = %m.expected, %declared, "post transform kind mismatch, skipping");
                continue;
            }
            node.applied.push(m.id);
            self.post_queue.push(QueuedTransform {
                node: idx,
                transform: m.clone(),
            });
            queued += 1;
        }
        Ok(())
    }

    /// Samples the nested template, freezes it and lets the callback extend it.
    ///
    /// Returns the frozen builder's pending list, to be spliced into the running pass.
    fn compose(
        &self,
        m: &ComposedApply,
        rng: &mut StdRng,
    ) -> ApplicationResult<Vec<Manipulator>> {
        let sample = m.nested.sample_with(rng)?;
        let mut frozen = m.nested.copy();
        frozen.freeze(sample.clone());
        (m.callback)(&sample, &mut frozen)?;
        debug!(spliced = frozen.manipulators().len(), "composed apply");
        Ok(frozen.manipulators().to_vec())
    }
}

/// Map keys arrive as JSON object keys; convert them back to the declared key kind.
fn map_key_value(key: &str, kind: ValueKind) -> Value {
    match kind {
        ValueKind::Integer => key
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(key.to_string())),
        ValueKind::Float => key
            .parse::<f64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(key.to_string())),
        ValueKind::Bool => key
            .parse::<bool>()
            .map(Value::Bool)
            .unwrap_or_else(|_| Value::String(key.to_string())),
        _ => Value::String(key.to_string()),
    }
}
