#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod asset_paths;
pub mod builder;
pub mod bundle;
pub mod config;
pub mod context;
pub mod encoder;
pub mod error;
pub mod models;
pub mod optimizers;
pub mod overrides;
pub mod payload;
pub mod project;
pub mod replace;

#[cfg(test)]
mod test_support;

pub use builder::{InlineBuilder, InlineReport};
pub use config::InlineConfig;
pub use context::RunContext;
pub use error::{BuildResult, InlineError};
pub use models::{OptimizationResult, OptimizationStatus, StatsSnapshot};
pub use optimizers::{MediaCategory, MediaOptimizer, OptimizerSet, ScriptBundler};
pub use project::{EntryDocument, ProjectLayout};
