//! Hydration engine for the hydrant workspace.
//!
//! Takes a versioned [`TemplateSet`](hydrant_core::TemplateSet) and a
//! [`SourceOfTruth`](hydrant_core::SourceOfTruth) and produces the hydrated
//! artifact set deterministically. See [`engine::HydrationEngine`].

pub mod context;
pub mod engine;
pub mod error;

pub use context::EntityContext;
pub use engine::{HydrationEngine, OutputLayout, TEMPLATE_SUFFIX};
pub use error::EngineError;
