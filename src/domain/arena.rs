use std::fmt;

use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::entities::{
    ContainerSizeConstraint, ExpansionState, ManipulatorId, NodeRole, Nullity, ValueSource,
};
use crate::domain::expression::{Index as ExpIndex, PathExpression, Segment, ROOT_NAME};
use crate::domain::shape::{PropertyDescriptor, TypeShape};

/// One property of the value under construction.
#[derive(Debug, Clone)]
pub struct ArbitraryNode {
    /// Name within the parent plus declared shape
    pub property: PropertyDescriptor,
    pub role: NodeRole,
    /// Index of parent node in the arena, None for the root
    pub parent: Option<Index>,
    /// Indices of child nodes in the arena, empty until expanded
    pub children: Vec<Index>,
    pub state: ExpansionState,
    pub depth: usize,
    /// Probability of injecting null when no nullity is forced
    pub null_inject: f64,
    pub size_constraint: Option<ContainerSizeConstraint>,
    pub nullity: Option<Nullity>,
    pub source: Option<ValueSource>,
    /// Manipulators already applied to this node
    pub applied: Vec<ManipulatorId>,
}

impl ArbitraryNode {
    pub fn new(property: PropertyDescriptor, role: NodeRole, null_inject: f64) -> Self {
        Self {
            property,
            role,
            parent: None,
            children: Vec::new(),
            state: ExpansionState::Unexpanded,
            depth: 0,
            null_inject,
            size_constraint: None,
            nullity: None,
            source: None,
            applied: Vec::new(),
        }
    }

    pub fn shape(&self) -> &TypeShape {
        &self.property.shape
    }

    pub fn name(&self) -> &str {
        &self.property.name
    }

    pub fn is_root(&self) -> bool {
        self.role == NodeRole::Root
    }

    pub fn is_expanded(&self) -> bool {
        self.state == ExpansionState::Expanded
    }

    pub fn is_container(&self) -> bool {
        self.property.shape.is_container()
    }

    pub fn is_forced_null(&self) -> bool {
        self.nullity == Some(Nullity::ForceNull)
    }

    pub fn is_map_key(&self) -> bool {
        self.role == NodeRole::MapKey
    }
}

impl fmt::Display for ArbitraryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            NodeRole::Element(i) => write!(f, "[{i}]")?,
            _ => f.write_str(self.name())?,
        }
        write!(f, ": {}", self.property.shape)?;
        if let Some(c) = self.size_constraint {
            let lo = c.min().map(|v| v.to_string()).unwrap_or_default();
            let hi = c.max().map(|v| v.to_string()).unwrap_or_default();
            write!(f, " size={lo}..{hi}")?;
        }
        match self.nullity {
            Some(Nullity::ForceNull) => f.write_str(" null")?,
            Some(Nullity::ForceNotNull) => f.write_str(" not-null")?,
            None => {}
        }
        match &self.source {
            Some(ValueSource::Fixed(v)) => write!(f, " = {v}")?,
            Some(ValueSource::Generated(_)) => f.write_str(" = <generated>")?,
            None => {}
        }
        if !self.applied.is_empty() {
            write!(f, " applied={}", self.applied.len())?;
        }
        if self.state == ExpansionState::Unexpanded && !self.property.shape.is_leaf() {
            f.write_str(" …")?;
        }
        Ok(())
    }
}

/// Arena-based tree of the value under construction.
///
/// Uses a generational arena: indices stay stable across re-expansion of other
/// subtrees, and indices of removed nodes resolve to `None` instead of aliasing.
#[derive(Debug, Clone)]
pub struct ArbitraryTree {
    arena: Arena<ArbitraryNode>,
    root: Index,
}

impl ArbitraryTree {
    pub fn new(root_shape: TypeShape) -> Self {
        let mut arena = Arena::new();
        let root = arena.insert(ArbitraryNode::new(
            PropertyDescriptor::new(ROOT_NAME, root_shape),
            NodeRole::Root,
            0.0,
        ));
        Self { arena, root }
    }

    /// Independent deep copy; indices remain valid in the copy.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn root(&self) -> Index {
        self.root
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn get_node(&self, idx: Index) -> Option<&ArbitraryNode> {
        self.arena.get(idx)
    }

    pub fn get_node_mut(&mut self, idx: Index) -> Option<&mut ArbitraryNode> {
        self.arena.get_mut(idx)
    }

    pub fn contains(&self, idx: Index) -> bool {
        self.arena.contains(idx)
    }

    pub fn children(&self, idx: Index) -> &[Index] {
        self.arena
            .get(idx)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    #[instrument(level = "trace", skip(self, node))]
    pub fn insert_child(&mut self, parent: Index, mut node: ArbitraryNode) -> Index {
        node.parent = Some(parent);
        node.depth = self.arena.get(parent).map(|p| p.depth + 1).unwrap_or(0);
        let node_idx = self.arena.insert(node);
        if let Some(parent) = self.arena.get_mut(parent) {
            parent.children.push(node_idx);
        }
        node_idx
    }

    pub fn mark_expanded(&mut self, idx: Index) {
        if let Some(node) = self.arena.get_mut(idx) {
            node.state = ExpansionState::Expanded;
        }
    }

    /// Drops every descendant of `idx` and puts the node back to `Unexpanded`.
    #[instrument(level = "trace", skip(self))]
    pub fn reset_subtree(&mut self, idx: Index) -> usize {
        let mut stack: Vec<Index> = match self.arena.get_mut(idx) {
            Some(node) => {
                node.state = ExpansionState::Unexpanded;
                std::mem::take(&mut node.children)
            }
            None => return 0,
        };
        let mut removed = 0;
        while let Some(current) = stack.pop() {
            if let Some(node) = self.arena.remove(current) {
                stack.extend(node.children);
                removed += 1;
            }
        }
        removed
    }

    /// False when the node or one of its ancestors is forced null.
    pub fn is_reachable(&self, idx: Index) -> bool {
        let mut current = Some(idx);
        while let Some(i) = current {
            match self.arena.get(i) {
                Some(node) if node.is_forced_null() => return false,
                Some(node) => current = node.parent,
                None => return false,
            }
        }
        true
    }

    /// Concrete path of a node, e.g. `orders[1].items[0].sku`.
    #[instrument(level = "trace", skip(self))]
    pub fn path_of(&self, idx: Index) -> PathExpression {
        let mut chain = Vec::new();
        let mut current = Some(idx);
        while let Some(i) = current {
            match self.arena.get(i) {
                Some(node) => {
                    chain.push(node);
                    current = node.parent;
                }
                None => break,
            }
        }

        let mut segments: Vec<(String, Vec<ExpIndex>)> = Vec::new();
        for node in chain.into_iter().rev() {
            match node.role {
                NodeRole::Root => {}
                NodeRole::Element(i) => match segments.last_mut() {
                    Some((_, indices)) => indices.push(ExpIndex::At(i)),
                    None => segments.push((ROOT_NAME.to_string(), vec![ExpIndex::At(i)])),
                },
                NodeRole::Field | NodeRole::MapKey | NodeRole::MapValue => {
                    segments.push((node.name().to_string(), Vec::new()))
                }
            }
        }

        PathExpression::from_segments(
            segments
                .into_iter()
                .map(|(name, indices)| Segment::new(name, indices))
                .collect(),
        )
    }

    pub fn iter(&self) -> TreeIterator {
        TreeIterator::new(self)
    }

    pub fn iter_postorder(&self) -> PostOrderIterator {
        PostOrderIterator::new(self)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.calculate_depth(self.root)
    }

    fn calculate_depth(&self, node_idx: Index) -> usize {
        if let Some(node) = self.get_node(node_idx) {
            1 + node
                .children
                .iter()
                .map(|&child| self.calculate_depth(child))
                .max()
                .unwrap_or(0)
        } else {
            0
        }
    }
}

/// Pre-order traversal, children left to right.
pub struct TreeIterator<'a> {
    tree: &'a ArbitraryTree,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a ArbitraryTree) -> Self {
        Self {
            tree,
            stack: vec![tree.root()],
        }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a ArbitraryNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.tree.get_node(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}

pub struct PostOrderIterator<'a> {
    tree: &'a ArbitraryTree,
    stack: Vec<(Index, bool)>,
}

impl<'a> PostOrderIterator<'a> {
    fn new(tree: &'a ArbitraryTree) -> Self {
        Self {
            tree,
            stack: vec![(tree.root(), false)],
        }
    }
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = (Index, &'a ArbitraryNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, visited)) = self.stack.pop() {
            if let Some(node) = self.tree.get_node(current_idx) {
                if !visited {
                    self.stack.push((current_idx, true));
                    for &child in node.children.iter().rev() {
                        self.stack.push((child, false));
                    }
                } else {
                    return Some((current_idx, node));
                }
            }
        }
        None
    }
}
