//! Domain layer: path expressions, type shapes and the arena tree
//!
//! This layer is independent of external concerns (no sampling, no config loading, no I/O).

pub mod arena;
pub mod entities;
pub mod error;
pub mod expression;
pub mod shape;
pub mod tree_traits;

pub use arena::{ArbitraryNode, ArbitraryTree};
pub use generational_arena::Index as NodeId;
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use expression::{Index, PathExpression, Segment, ALL_INDEX_TOKEN, ROOT_NAME};
pub use shape::{LeafSpec, PropertyDescriptor, TypeShape, ValueKind};
pub use tree_traits::TreeNodeConvert;
