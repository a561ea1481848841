//! Application layer: tree expansion, the manipulator engine and the builder facade
//!
//! This layer orchestrates domain logic and depends on collaborator traits.

pub mod builder;
pub mod engine;
pub mod error;
pub mod manipulator;
pub mod manipulator_set;
pub mod materialize;
pub mod tracker;
pub mod traverser;

pub use builder::{seeded_rng, Arbitrary, ArbitraryBuilder, SampleStream};
pub use engine::{ManipulatorEngine, QueuedTransform};
pub use error::{ApplicationError, ApplicationResult};
pub use manipulator::{Manipulator, PriorityClass};
pub use manipulator_set::ManipulatorSet;
pub use materialize::Materializer;
pub use tracker::ReuseTracker;
pub use traverser::Traverser;
