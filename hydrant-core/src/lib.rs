//! Core data model for the hydrant workspace.
//!
//! This crate owns the vocabulary the other crates speak: entity records and
//! their source of truth, layered template sets, hydrated artifact sets with
//! their content fingerprints, changesets, review units, and provenance
//! records. It also owns loading those inputs from disk. Rendering lives in
//! `hydrant-engine`; comparing, committing and recording live in
//! `hydrant-sync`.

pub mod error;
pub mod hash;
pub mod source;
pub mod store;
pub mod types;

pub use error::{SourceError, StoreError};
pub use types::{
    BranchName, Change, Changeset, CommitId, EntityName, EntityRecord, EntitySelector,
    Fingerprint, GroupName, HydratedArtifactSet, HydrationRun, ProvenanceRecord, ReviewUnit,
    ReviewUnitId, ReviewUnitState, RunOutcome, SourceOfTruth, TemplateLayer, TemplateSet,
};
