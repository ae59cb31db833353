//! Error types for hydration.
//!
//! Variants split along the boundary the CLI reports on: missing values and
//! missing overlays are data problems, everything else is a template
//! problem.

use std::path::PathBuf;

use thiserror::Error;

use hydrant_core::{EntityName, GroupName};

/// All errors that can arise while hydrating templates.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Template failed to parse when registered.
    #[error("template {template} failed to parse: {source}")]
    Syntax {
        template: PathBuf,
        source: tera::Error,
    },

    /// Template parsed but failed during rendering for reasons other than a
    /// missing value (bad filter, type mismatch in an expression, ...).
    #[error("template {template} failed to render for '{entity}': {source}")]
    Render {
        template: PathBuf,
        entity: EntityName,
        source: tera::Error,
    },

    /// Template referenced a key the entity record does not carry.
    #[error("template {template} references '{key}', which entity '{entity}' does not define")]
    MissingValue {
        template: PathBuf,
        entity: EntityName,
        key: String,
    },

    /// The entity's group has no overlay layer in the template set.
    #[error("entity '{entity}' belongs to group '{group}', which has no overlay layer")]
    MissingOverlay {
        entity: EntityName,
        group: GroupName,
    },

    /// A file with the template suffix is not valid UTF-8.
    #[error("template {template} is not valid UTF-8")]
    NonUtf8Template { template: PathBuf },

    /// A templated output path rendered to something outside the output
    /// root (absolute, empty, or containing `..`).
    #[error("template {template} rendered invalid output path '{rendered}'")]
    BadOutputPath { template: PathBuf, rendered: String },

    /// The entity record could not be serialized into a render context.
    #[error("failed to build render context for '{entity}': {source}")]
    Context {
        entity: EntityName,
        source: tera::Error,
    },

    /// Two renders targeted the same output path with different bytes. This
    /// is a layout misconfiguration, typically a flat layout with more than
    /// one entity.
    #[error(
        "output path collision at {path}: '{first}' and '{second}' rendered different contents"
    )]
    OutputCollision {
        path: PathBuf,
        first: EntityName,
        second: EntityName,
    },
}

impl EngineError {
    /// True when the fix belongs in the source of truth rather than in a
    /// template.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            EngineError::MissingValue { .. } | EngineError::MissingOverlay { .. }
        )
    }
}
