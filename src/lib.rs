//! fixtree: path-addressed fixture generation.
//!
//! A value template is a lazily expanded tree of typed properties. Manipulators
//! addressed by path expressions (`items[*].price`, `$.owner`) pin values, force
//! nullity, bound container sizes and post-process sampled values.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use fixtree::application::ArbitraryBuilder;
//! use fixtree::infrastructure::ShapeFile;
//!
//! let shapes = ShapeFile::load(Path::new("shapes.json"))?;
//! let root = shapes.root_shape(None)?;
//! let mut builder = ArbitraryBuilder::new(root, Arc::new(shapes.types));
//! builder.set("items[*].price", 0)?.size("items", 2, 4)?;
//! let value = builder.sample()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;

pub use application::{Arbitrary, ArbitraryBuilder, ManipulatorSet};
pub use config::Settings;
pub use domain::PathExpression;
