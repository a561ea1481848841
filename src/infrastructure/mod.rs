//! Infrastructure layer: collaborator traits and their stock implementations
//!
//! Shape files, leaf sampling and validation live here.

pub mod error;
pub mod sampler;
pub mod shape_file;
pub mod traits;
pub mod validator;

pub use error::{InfraError, InfraResult};
pub use sampler::RandomLeafSampler;
pub use shape_file::{ShapeFile, ShapeRegistry};
pub use traits::{LeafSampler, PropertyShapeProvider, Rejection, Validator};
pub use validator::{AcceptAll, PredicateValidator};
