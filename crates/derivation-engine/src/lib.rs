//! On-Demand Feature Derivation
//!
//! Resolves caller contexts against a view's inputs and executes its
//! compiled transformation over a batch table or a single online row.

mod cache;
mod engine;
mod error;
mod resolver;

pub use cache::{CacheKey, TransformCache};
pub use engine::{DerivationEngine, DerivationInput, DerivationOutput, EngineConfig, ExecutionMode};
pub use error::EngineError;
pub use resolver::InputResolver;
