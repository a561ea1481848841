//! Materialization: turns a manipulated tree into a JSON value

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::Rng;
use serde_json::{Map, Value};
use tracing::{debug, instrument, trace};

use crate::application::engine::QueuedTransform;
use crate::application::error::{ApplicationError, ApplicationResult};
use crate::application::traverser::Traverser;
use crate::domain::{ArbitraryTree, NodeId, NodeRole, Nullity, TypeShape, ValueSource};
use crate::infrastructure::LeafSampler;

/// Extra draws for a map key that collides with an earlier one.
const MAP_KEY_ATTEMPTS: usize = 10;

/// Locations of materialized nodes, as JSON pointers into the result.
type Locations = HashMap<NodeId, String>;

pub struct Materializer<'a> {
    traverser: Traverser<'a>,
    sampler: &'a dyn LeafSampler,
}

impl<'a> Materializer<'a> {
    pub fn new(traverser: Traverser<'a>, sampler: &'a dyn LeafSampler) -> Self {
        Self { traverser, sampler }
    }

    /// Produces the value of the whole tree, then runs the post-transform queue over it.
    #[instrument(level = "debug", skip_all, fields(queued = queue.len()))]
    pub fn materialize(
        &self,
        tree: &mut ArbitraryTree,
        queue: &[QueuedTransform],
        rng: &mut StdRng,
    ) -> ApplicationResult<Value> {
        let mut locations = Locations::new();
        let root = tree.root();
        let mut value = self.materialize_node(tree, root, "", &mut locations, rng)?;
        self.run_post_transforms(tree, &mut value, queue, &mut locations, rng)?;
        Ok(value)
    }

    fn materialize_node(
        &self,
        tree: &mut ArbitraryTree,
        idx: NodeId,
        pointer: &str,
        locations: &mut Locations,
        rng: &mut StdRng,
    ) -> ApplicationResult<Value> {
        let Some(node) = tree.get_node(idx) else {
            return Ok(Value::Null);
        };

        match node.nullity {
            Some(Nullity::ForceNull) => return Ok(Value::Null),
            Some(Nullity::ForceNotNull) => {}
            None => {
                if node.null_inject > 0.0
                    && node.source.is_none()
                    && rng.random_bool(node.null_inject)
                {
                    trace!(pointer, "null injected");
                    return Ok(Value::Null);
                }
            }
        }

        locations.insert(idx, pointer.to_string());
        match &node.source {
            Some(ValueSource::Fixed(value)) if node.shape().is_leaf() => return Ok(value.clone()),
            Some(ValueSource::Generated(generator)) => return Ok(generator.generate(rng)),
            _ => {}
        }

        let shape = node.shape().clone();
        self.traverser.expand(tree, idx, rng)?;
        let children = tree.children(idx).to_vec();

        let value = match shape {
            TypeShape::Leaf(spec) => self.sampler.sample(&spec, rng),
            TypeShape::Object(_) | TypeShape::Entry { .. } => {
                let mut fields = Map::new();
                for child in children {
                    let Some(name) = tree.get_node(child).map(|n| n.name().to_string()) else {
                        continue;
                    };
                    let child_pointer = format!("{pointer}/{}", escape(&name));
                    let child_value =
                        self.materialize_node(tree, child, &child_pointer, locations, rng)?;
                    fields.insert(name, child_value);
                }
                Value::Object(fields)
            }
            TypeShape::List(_) => {
                let mut elements = Vec::with_capacity(children.len());
                for (i, child) in children.into_iter().enumerate() {
                    let child_pointer = format!("{pointer}/{i}");
                    let element = self.materialize_node(tree, child, &child_pointer, locations, rng)?;
                    elements.push(element);
                }
                Value::Array(elements)
            }
            TypeShape::Map { .. } => {
                let mut entries = Map::new();
                for entry in children {
                    self.materialize_entry(tree, entry, pointer, &mut entries, locations, rng)?;
                }
                Value::Object(entries)
            }
        };
        Ok(value)
    }

    /// Adds one map entry; a key that stays duplicate after resampling drops the entry.
    fn materialize_entry(
        &self,
        tree: &mut ArbitraryTree,
        entry: NodeId,
        pointer: &str,
        entries: &mut Map<String, Value>,
        locations: &mut Locations,
        rng: &mut StdRng,
    ) -> ApplicationResult<()> {
        if tree.get_node(entry).map_or(true, |n| n.is_forced_null()) {
            return Ok(());
        }
        self.traverser.expand(tree, entry, rng)?;
        let parts = tree.children(entry).to_vec();
        let [key_node, value_node] = parts[..] else {
            return Ok(());
        };

        let mut scratch = Locations::new();
        let mut key = None;
        for _ in 0..=MAP_KEY_ATTEMPTS {
            let sampled = self.materialize_node(tree, key_node, "", &mut scratch, rng)?;
            let candidate = key_string(sampled);
            if !entries.contains_key(&candidate) {
                key = Some(candidate);
                break;
            }
        }
        let Some(key) = key else {
            debug!(pointer, "duplicate map key, dropping entry");
            return Ok(());
        };

        let value_pointer = format!("{pointer}/{}", escape(&key));
        let value = self.materialize_node(tree, value_node, &value_pointer, locations, rng)?;
        entries.insert(key, value);
        Ok(())
    }

    /// Runs the queue in order; each transform sees the result of the previous one.
    fn run_post_transforms(
        &self,
        tree: &mut ArbitraryTree,
        value: &mut Value,
        queue: &[QueuedTransform],
        locations: &mut Locations,
        rng: &mut StdRng,
    ) -> ApplicationResult<()> {
        let max_attempts = self.traverser.settings().post_condition_attempts;

        for queued in queue {
            if tree.get_node(queued.node).map_or(true, |n| n.role == NodeRole::MapKey) {
                continue;
            }
            let Some(pointer) = locations.get(&queued.node).cloned() else {
                continue;
            };

            let mut attempts = 0;
            loop {
                let Some(current) = value.pointer(&pointer) else {
                    break;
                };
                if (queued.transform.predicate)(current) {
                    break;
                }
                attempts += 1;
                if attempts >= max_attempts {
                    return Err(ApplicationError::PostConditionExhausted {
                        path: tree.path_of(queued.node).to_string(),
                        attempts,
                    });
                }
                let fresh = self.materialize_node(tree, queued.node, &pointer, locations, rng)?;
                if let Some(slot) = value.pointer_mut(&pointer) {
                    *slot = fresh;
                }
            }
            if attempts > 0 {
                debug!(pointer = %pointer, attempts, "post condition resampled");
            }

            if let Some(transform) = &queued.transform.transform {
                if let Some(slot) = value.pointer_mut(&pointer) {
                    let current = slot.take();
                    *slot = transform(current);
                }
            }
        }
        Ok(())
    }
}

/// JSON pointer escaping of a single reference token.
fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn key_string(key: Value) -> String {
    match key {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
