//! Shared domain types used across every hydrant crate.
//!
//! The model follows the flow of a hydration run: a [`TemplateSet`] and a
//! [`SourceOfTruth`] go in, a [`HydratedArtifactSet`] comes out, the
//! comparator turns two artifact sets into a [`Changeset`], and the
//! synchronizer lands that changeset on a [`ReviewUnit`], leaving a
//! [`ProvenanceRecord`] behind.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::hash;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Name of a target entity in the source of truth (e.g. a cluster name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityName(pub String);

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EntityName {
    fn from(s: String) -> Self {
        EntityName(s)
    }
}

impl From<&str> for EntityName {
    fn from(s: &str) -> Self {
        EntityName(s.to_string())
    }
}

/// Group an entity belongs to. Groups select the overlay layer and are
/// matched case-insensitively everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupName(pub String);

impl GroupName {
    /// Case-insensitive comparison, the only way groups are ever matched.
    pub fn matches(&self, other: &GroupName) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for GroupName {
    fn from(s: String) -> Self {
        GroupName(s)
    }
}

impl From<&str> for GroupName {
    fn from(s: &str) -> Self {
        GroupName(s.to_string())
    }
}

/// Branch name on the review host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchName(pub String);

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for BranchName {
    fn from(s: String) -> Self {
        BranchName(s)
    }
}

impl From<&str> for BranchName {
    fn from(s: &str) -> Self {
        BranchName(s.to_string())
    }
}

/// Opaque commit identifier assigned by the review host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommitId(pub String);

impl CommitId {
    pub fn short(&self) -> &str {
        hash::short(&self.0)
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CommitId {
    fn from(s: String) -> Self {
        CommitId(s)
    }
}

impl From<&str> for CommitId {
    fn from(s: &str) -> Self {
        CommitId(s.to_string())
    }
}

/// Identifier of an open review unit (change request) on the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReviewUnitId(pub String);

impl fmt::Display for ReviewUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ReviewUnitId {
    fn from(s: String) -> Self {
        ReviewUnitId(s)
    }
}

impl From<&str> for ReviewUnitId {
    fn from(s: &str) -> Self {
        ReviewUnitId(s.to_string())
    }
}

/// Content fingerprint of a full artifact set, lowercase hex SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn short(&self) -> &str {
        hash::short(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Fingerprint(s)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Fingerprint(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Source of truth
// ---------------------------------------------------------------------------

/// One entity entry from the source of truth.
///
/// `group` and `tags` are reserved attributes with structural meaning; every
/// other key from the entry lands in `attributes` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub name: EntityName,
    pub group: GroupName,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl EntityRecord {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Which entities a run should hydrate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EntitySelector {
    /// Every entity in the source of truth.
    #[default]
    All,
    /// A single entity, matched exactly by name.
    Name(EntityName),
    /// All entities whose group matches (case-insensitive).
    Group(GroupName),
    /// All entities carrying at least one of the given tags.
    AnyTag(Vec<String>),
}

impl fmt::Display for EntitySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntitySelector::All => write!(f, "all entities"),
            EntitySelector::Name(name) => write!(f, "entity '{name}'"),
            EntitySelector::Group(group) => write!(f, "group '{group}'"),
            EntitySelector::AnyTag(tags) => write!(f, "tags [{}]", tags.join(", ")),
        }
    }
}

/// Parsed source of truth: every entity record plus the hash of the raw
/// document it was loaded from. Entities are keyed by name and iterate in
/// name order.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOfTruth {
    entities: BTreeMap<EntityName, EntityRecord>,
    content_hash: String,
}

impl SourceOfTruth {
    pub fn new(entities: BTreeMap<EntityName, EntityRecord>, content_hash: String) -> Self {
        SourceOfTruth {
            entities,
            content_hash,
        }
    }

    /// Hash of the raw source document, the run-identity input for this side.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, name: &EntityName) -> Option<&EntityRecord> {
        self.entities.get(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityRecord> {
        self.entities.values()
    }

    /// Resolve a selector against the loaded records, in name order.
    ///
    /// A name that does not exist is an error; a group or tag filter that
    /// matches nothing yields an empty selection, which downstream treats as
    /// a no-op run.
    pub fn select(&self, selector: &EntitySelector) -> Result<Vec<&EntityRecord>, SourceError> {
        match selector {
            EntitySelector::All => Ok(self.entities.values().collect()),
            EntitySelector::Name(name) => match self.entities.get(name) {
                Some(record) => Ok(vec![record]),
                None => Err(SourceError::UnknownEntity { name: name.clone() }),
            },
            EntitySelector::Group(group) => Ok(self
                .entities
                .values()
                .filter(|r| r.group.matches(group))
                .collect()),
            EntitySelector::AnyTag(tags) => Ok(self
                .entities
                .values()
                .filter(|r| tags.iter().any(|t| r.has_tag(t)))
                .collect()),
        }
    }
}

// ---------------------------------------------------------------------------
// Template store
// ---------------------------------------------------------------------------

/// One layer of the template store: a named directory snapshot with files
/// keyed by their normalized relative path.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateLayer {
    pub name: String,
    pub files: BTreeMap<PathBuf, Vec<u8>>,
}

impl TemplateLayer {
    pub fn new(name: impl Into<String>) -> Self {
        TemplateLayer {
            name: name.into(),
            files: BTreeMap::new(),
        }
    }
}

/// Versioned snapshot of the template store: the shared base layer plus one
/// overlay layer per group. Overlay files shadow base files at the same
/// relative path.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSet {
    base: TemplateLayer,
    overlays: BTreeMap<GroupName, TemplateLayer>,
    version: String,
}

impl TemplateSet {
    pub fn new(base: TemplateLayer, overlays: BTreeMap<GroupName, TemplateLayer>) -> Self {
        let mut parts: Vec<(String, &[u8])> = Vec::new();
        for (path, contents) in &base.files {
            parts.push((format!("base/{}", path_key(path)), contents.as_slice()));
        }
        for (group, layer) in &overlays {
            for (path, contents) in &layer.files {
                parts.push((
                    format!("overlays/{}/{}", group, path_key(path)),
                    contents.as_slice(),
                ));
            }
        }
        let version = hash::sha256_hex_parts(parts.iter().map(|(l, b)| (l.as_str(), *b)));
        TemplateSet {
            base,
            overlays,
            version,
        }
    }

    /// Digest over every layered file, the run-identity input for this side.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn base(&self) -> &TemplateLayer {
        &self.base
    }

    pub fn overlay_groups(&self) -> impl Iterator<Item = &GroupName> {
        self.overlays.keys()
    }

    pub fn overlays(&self) -> impl Iterator<Item = (&GroupName, &TemplateLayer)> {
        self.overlays.iter()
    }

    /// Overlay layer for a group, matched case-insensitively.
    pub fn overlay_for(&self, group: &GroupName) -> Option<&TemplateLayer> {
        self.overlays
            .iter()
            .find(|(g, _)| g.matches(group))
            .map(|(_, layer)| layer)
    }

    /// Base and overlay files merged for one group, overlay wins on path
    /// collisions. `None` when the group has no overlay layer.
    pub fn resolved_for(&self, group: &GroupName) -> Option<BTreeMap<&Path, &[u8]>> {
        let overlay = self.overlay_for(group)?;
        let mut merged: BTreeMap<&Path, &[u8]> = BTreeMap::new();
        for (path, contents) in &self.base.files {
            merged.insert(path.as_path(), contents.as_slice());
        }
        for (path, contents) in &overlay.files {
            merged.insert(path.as_path(), contents.as_slice());
        }
        Some(merged)
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

// ---------------------------------------------------------------------------
// Hydrated artifacts
// ---------------------------------------------------------------------------

/// Output of a hydration run: rendered artifact bytes keyed by the relative
/// path they occupy under the output root. Iteration is always path-ordered,
/// which makes the fingerprint deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HydratedArtifactSet {
    artifacts: BTreeMap<PathBuf, Vec<u8>>,
}

impl HydratedArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: PathBuf, contents: Vec<u8>) {
        self.artifacts.insert(path, contents);
    }

    pub fn get(&self, path: &Path) -> Option<&[u8]> {
        self.artifacts.get(path).map(|c| c.as_slice())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.artifacts.contains_key(path)
    }

    pub fn remove(&mut self, path: &Path) -> Option<Vec<u8>> {
        self.artifacts.remove(path)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.artifacts.keys().map(|p| p.as_path())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &[u8])> {
        self.artifacts
            .iter()
            .map(|(p, c)| (p.as_path(), c.as_slice()))
    }

    /// Content fingerprint over every `(path, bytes)` pair in path order.
    ///
    /// Two artifact sets with the same fingerprint are byte-identical, so a
    /// fingerprint match is a sufficient no-op check.
    pub fn fingerprint(&self) -> Fingerprint {
        let parts: Vec<(String, &[u8])> = self
            .artifacts
            .iter()
            .map(|(path, contents)| (path_key(path), contents.as_slice()))
            .collect();
        Fingerprint(hash::sha256_hex_parts(
            parts.iter().map(|(l, b)| (l.as_str(), *b)),
        ))
    }
}

impl FromIterator<(PathBuf, Vec<u8>)> for HydratedArtifactSet {
    fn from_iter<T: IntoIterator<Item = (PathBuf, Vec<u8>)>>(iter: T) -> Self {
        HydratedArtifactSet {
            artifacts: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Changesets
// ---------------------------------------------------------------------------

/// One file-level difference between two artifact sets.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Added {
        path: PathBuf,
        contents: Vec<u8>,
    },
    Modified {
        path: PathBuf,
        previous: Vec<u8>,
        contents: Vec<u8>,
    },
    Removed {
        path: PathBuf,
        previous: Vec<u8>,
    },
}

impl Change {
    pub fn path(&self) -> &Path {
        match self {
            Change::Added { path, .. }
            | Change::Modified { path, .. }
            | Change::Removed { path, .. } => path,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Change::Added { .. } => "added",
            Change::Modified { .. } => "modified",
            Change::Removed { .. } => "removed",
        }
    }
}

/// Minimal difference between a previous and a next artifact set, ordered by
/// path. Empty means the run is a no-op.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Changeset {
    changes: Vec<Change>,
}

impl Changeset {
    /// Build from a list of changes; path order is restored here.
    pub fn from_changes(mut changes: Vec<Change>) -> Self {
        changes.sort_by(|a, b| a.path().cmp(b.path()));
        Changeset { changes }
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// `(added, modified, removed)` counts for summaries.
    pub fn counts(&self) -> (usize, usize, usize) {
        let mut added = 0;
        let mut modified = 0;
        let mut removed = 0;
        for change in &self.changes {
            match change {
                Change::Added { .. } => added += 1,
                Change::Modified { .. } => modified += 1,
                Change::Removed { .. } => removed += 1,
            }
        }
        (added, modified, removed)
    }

    /// Replay this changeset on top of a previous artifact set.
    ///
    /// `apply(diff(prev, next), prev) == next` holds by construction; the
    /// sync tests lean on that to prove no content is silently lost.
    pub fn apply(&self, previous: Option<&HydratedArtifactSet>) -> HydratedArtifactSet {
        let mut next = previous.cloned().unwrap_or_default();
        for change in &self.changes {
            match change {
                Change::Added { path, contents } | Change::Modified { path, contents, .. } => {
                    next.insert(path.clone(), contents.clone());
                }
                Change::Removed { path, .. } => {
                    next.remove(path);
                }
            }
        }
        next
    }
}

// ---------------------------------------------------------------------------
// Review units
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewUnitState {
    Open,
    Closed,
}

impl fmt::Display for ReviewUnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewUnitState::Open => write!(f, "open"),
            ReviewUnitState::Closed => write!(f, "closed"),
        }
    }
}

/// An in-review change on the host: source branch under review, target it
/// will merge into, and the current head commit of the source branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewUnit {
    pub id: ReviewUnitId,
    pub source_branch: BranchName,
    pub target_branch: BranchName,
    pub head: CommitId,
    pub state: ReviewUnitState,
}

impl ReviewUnit {
    pub fn is_open(&self) -> bool {
        self.state == ReviewUnitState::Open
    }
}

// ---------------------------------------------------------------------------
// Runs and provenance
// ---------------------------------------------------------------------------

/// Identity of one hydration run: what triggered it, which template and
/// source snapshots went in, and the fingerprint that came out. Built once
/// the artifact set exists and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HydrationRun {
    pub id: String,
    pub trigger_commit: CommitId,
    pub template_version: String,
    pub source_hash: String,
    pub fingerprint: Fingerprint,
    pub started_at: DateTime<Utc>,
}

impl HydrationRun {
    pub fn new(
        trigger_commit: CommitId,
        template_version: impl Into<String>,
        source_hash: impl Into<String>,
        fingerprint: Fingerprint,
        started_at: DateTime<Utc>,
    ) -> Self {
        let template_version = template_version.into();
        let source_hash = source_hash.into();
        let digest = hash::sha256_hex_parts([
            ("trigger", trigger_commit.0.as_bytes()),
            ("templates", template_version.as_bytes()),
            ("source", source_hash.as_bytes()),
            ("artifacts", fingerprint.0.as_bytes()),
        ]);
        let id = format!(
            "{}-{}",
            started_at.format("%Y%m%dT%H%M%SZ"),
            hash::short(&digest)
        );
        HydrationRun {
            id,
            trigger_commit,
            template_version,
            source_hash,
            fingerprint,
            started_at,
        }
    }
}

/// How a run ended, as recorded in provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    NoOp,
    Committed,
    Conflict,
    Failed,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::NoOp => "no-op",
            RunOutcome::Committed => "committed",
            RunOutcome::Conflict => "conflict",
            RunOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only metadata describing one run against one review unit. Enough
/// to answer "which inputs produced the artifacts at this commit" without
/// re-running anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub run_id: String,
    pub recorded_at: DateTime<Utc>,
    pub trigger_commit: CommitId,
    pub template_version: String,
    pub source_hash: String,
    pub outcome: RunOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint_before: Option<Fingerprint>,
    pub fingerprint_after: Fingerprint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_commit: Option<CommitId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
