//! Lazy tree expansion and path matching

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, instrument, trace};

use crate::config::GenerationSettings;
use crate::domain::{
    ArbitraryNode, ArbitraryTree, ContainerSizeConstraint, DomainError, DomainResult, Index, NodeId,
    NodeRole, Nullity, PathExpression, PropertyDescriptor, TypeShape, ROOT_NAME,
};
use crate::infrastructure::PropertyShapeProvider;

const KEY_NAME: &str = "key";
const VALUE_NAME: &str = "value";

/// Expands `Unexpanded` nodes on demand and resolves path expressions.
#[derive(Clone, Copy)]
pub struct Traverser<'a> {
    provider: &'a dyn PropertyShapeProvider,
    settings: &'a GenerationSettings,
}

impl<'a> Traverser<'a> {
    pub fn new(provider: &'a dyn PropertyShapeProvider, settings: &'a GenerationSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &GenerationSettings {
        self.settings
    }

    /// `Unexpanded -> Expanded`; no-op for expanded or stale nodes.
    #[instrument(level = "trace", skip(self, tree, rng))]
    pub fn expand(&self, tree: &mut ArbitraryTree, idx: NodeId, rng: &mut StdRng) -> DomainResult<()> {
        let (shape, depth, constraint, name) = match tree.get_node(idx) {
            Some(node) if !node.is_expanded() => (
                node.shape().clone(),
                node.depth,
                node.size_constraint,
                node.name().to_string(),
            ),
            _ => return Ok(()),
        };

        match shape {
            TypeShape::Leaf(_) => {}
            TypeShape::Object(type_name) => {
                if depth > 2 * self.settings.max_depth {
                    return Err(DomainError::RecursionLimit {
                        path: tree.path_of(idx).to_string(),
                        depth,
                    });
                }
                for property in self.provider.properties(&type_name)? {
                    let null_inject = if property.nullable {
                        self.settings.null_inject
                    } else {
                        0.0
                    };
                    let mut child = ArbitraryNode::new(property, NodeRole::Field, null_inject);
                    if child.property.nullable
                        && matches!(child.shape(), TypeShape::Object(_))
                        && depth + 1 > self.settings.max_depth
                    {
                        child.nullity = Some(Nullity::ForceNull);
                    }
                    tree.insert_child(idx, child);
                }
            }
            TypeShape::List(element) => {
                let size = self.sample_size(constraint, depth, rng);
                for i in 0..size {
                    let property = PropertyDescriptor::new(name.clone(), (*element).clone());
                    tree.insert_child(idx, ArbitraryNode::new(property, NodeRole::Element(i), 0.0));
                }
            }
            TypeShape::Map { key, value } => {
                let size = self.sample_size(constraint, depth, rng);
                for i in 0..size {
                    let entry = PropertyDescriptor::new(
                        name.clone(),
                        TypeShape::Entry {
                            key: key.clone(),
                            value: value.clone(),
                        },
                    );
                    tree.insert_child(idx, ArbitraryNode::new(entry, NodeRole::Element(i), 0.0));
                }
            }
            TypeShape::Entry { key, value } => {
                let key_node = PropertyDescriptor::new(KEY_NAME, *key);
                tree.insert_child(idx, ArbitraryNode::new(key_node, NodeRole::MapKey, 0.0));
                let value_node = PropertyDescriptor::new(VALUE_NAME, *value);
                tree.insert_child(idx, ArbitraryNode::new(value_node, NodeRole::MapValue, 0.0));
            }
        }

        tree.mark_expanded(idx);
        trace!(children = tree.children(idx).len(), "expanded");
        Ok(())
    }

    /// Discards the subtree of `idx` and expands it again under its current constraint.
    #[instrument(level = "debug", skip(self, tree, rng))]
    pub fn reexpand(
        &self,
        tree: &mut ArbitraryTree,
        idx: NodeId,
        rng: &mut StdRng,
    ) -> DomainResult<()> {
        let removed = tree.reset_subtree(idx);
        debug!(removed, path = %tree.path_of(idx), "re-expanding");
        self.expand(tree, idx, rng)
    }

    /// Expands every reachable node.
    #[instrument(level = "debug", skip(self, tree, rng))]
    pub fn expand_all(&self, tree: &mut ArbitraryTree, rng: &mut StdRng) -> DomainResult<()> {
        let mut stack = vec![tree.root()];
        while let Some(idx) = stack.pop() {
            match tree.get_node(idx) {
                Some(node) if node.is_forced_null() || node.source.is_some() => continue,
                Some(_) => {}
                None => continue,
            }
            self.expand(tree, idx, rng)?;
            stack.extend(tree.children(idx).iter().rev());
        }
        Ok(())
    }

    /// All nodes matching `expression`, in document order.
    ///
    /// Unexpanded nodes along candidate paths are expanded first.
    #[instrument(level = "debug", skip(self, tree, rng), fields(expression = %expression))]
    pub fn find_all(
        &self,
        tree: &mut ArbitraryTree,
        expression: &PathExpression,
        rng: &mut StdRng,
    ) -> DomainResult<Vec<NodeId>> {
        let mut segments = expression.relative_segments();
        let mut current = vec![tree.root()];

        if let Some(first) = segments.first() {
            if first.name() == ROOT_NAME {
                current = self.descend_indices(tree, current, first.indices(), rng)?;
                segments = &segments[1..];
            }
        }

        for segment in segments {
            let mut next = Vec::new();
            for idx in current {
                self.expand(tree, idx, rng)?;
                let named: Vec<NodeId> = tree
                    .children(idx)
                    .iter()
                    .copied()
                    .filter(|&child| {
                        tree.get_node(child).is_some_and(|node| {
                            !matches!(node.role, NodeRole::Element(_))
                                && node.name() == segment.name()
                        })
                    })
                    .collect();
                next.extend(self.descend_indices(tree, named, segment.indices(), rng)?);
            }
            current = next;
        }

        debug!(matches = current.len(), "resolved");
        Ok(current)
    }

    fn descend_indices(
        &self,
        tree: &mut ArbitraryTree,
        start: Vec<NodeId>,
        indices: &[Index],
        rng: &mut StdRng,
    ) -> DomainResult<Vec<NodeId>> {
        let mut current = start;
        for index in indices {
            let mut next = Vec::new();
            for idx in current {
                self.expand(tree, idx, rng)?;
                for &child in tree.children(idx) {
                    if let Some(NodeRole::Element(i)) = tree.get_node(child).map(|n| n.role) {
                        if index.matches(Index::At(i)) {
                            next.push(child);
                        }
                    }
                }
            }
            current = next;
        }
        Ok(current)
    }

    fn sample_size(
        &self,
        constraint: Option<ContainerSizeConstraint>,
        depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let (lo, hi) = match constraint {
            Some(c) => c.resolve(self.settings.default_min_size, self.settings.default_max_size),
            None if depth >= self.settings.max_depth => (0, 0),
            None => (
                self.settings.default_min_size,
                self.settings.default_max_size.max(self.settings.default_min_size),
            ),
        };
        rng.random_range(lo..=hi)
    }
}
