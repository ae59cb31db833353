//! Hydration engine — merges a [`TemplateSet`] with entity records and
//! produces a [`HydratedArtifactSet`].
//!
//! Hydration is a pure function of its inputs: no clock, no environment, no
//! network. Running it twice over the same template set and source of truth
//! yields byte-identical artifacts and therefore the same fingerprint. The
//! pipeline leans on that to decide whether anything needs to be synced at
//! all.
//!
//! Files ending in `.tera` are rendered with the entity's context and lose
//! the suffix; every other file is carried through byte-for-byte. Output
//! paths may themselves contain placeholders (`{{ name }}.yaml.tera`), which
//! render with the same context.

use std::collections::BTreeMap;
use std::error::Error as _;
use std::path::{Component, Path, PathBuf};

use tera::Tera;

use hydrant_core::{
    EntityName, EntityRecord, HydratedArtifactSet, SourceOfTruth, TemplateLayer, TemplateSet,
};

use crate::context::EntityContext;
use crate::error::EngineError;

/// Files with this suffix are rendered; the suffix is stripped from the
/// output path.
pub const TEMPLATE_SUFFIX: &str = ".tera";

// ---------------------------------------------------------------------------
// Output layout
// ---------------------------------------------------------------------------

/// Where an entity's artifacts land under the output root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputLayout {
    /// `<group>/<artifact>` — the conventional layout.
    #[default]
    PerGroup,
    /// `<entity>/<artifact>` — required when a group holds several entities
    /// whose artifacts would otherwise collide.
    PerEntity,
    /// `<artifact>` directly under the root.
    Flat,
}

impl OutputLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputLayout::PerGroup => "group",
            OutputLayout::PerEntity => "entity",
            OutputLayout::Flat => "flat",
        }
    }

    fn prefix_for(&self, record: &EntityRecord) -> PathBuf {
        match self {
            OutputLayout::PerGroup => PathBuf::from(&record.group.0),
            OutputLayout::PerEntity => PathBuf::from(&record.name.0),
            OutputLayout::Flat => PathBuf::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Stateless hydrator. Construction only fixes the output layout; every
/// call re-registers the template set it is given, so one engine can serve
/// template sets of any version.
#[derive(Debug, Clone, Copy, Default)]
pub struct HydrationEngine {
    layout: OutputLayout,
}

impl HydrationEngine {
    pub fn new(layout: OutputLayout) -> Self {
        HydrationEngine { layout }
    }

    pub fn layout(&self) -> OutputLayout {
        self.layout
    }

    /// Hydrate every entity in the source of truth.
    pub fn hydrate(
        &self,
        set: &TemplateSet,
        sot: &SourceOfTruth,
    ) -> Result<HydratedArtifactSet, EngineError> {
        let entities: Vec<&EntityRecord> = sot.entities().collect();
        self.hydrate_entities(set, &entities)
    }

    /// Hydrate a pre-selected slice of entities.
    ///
    /// Entities are processed in name order and template files in path
    /// order, so the resulting artifact set is independent of caller
    /// ordering.
    pub fn hydrate_entities(
        &self,
        set: &TemplateSet,
        entities: &[&EntityRecord],
    ) -> Result<HydratedArtifactSet, EngineError> {
        let tera = build_tera(set)?;

        let mut entities: Vec<&EntityRecord> = entities.to_vec();
        entities.sort_by(|a, b| a.name.cmp(&b.name));

        let mut artifacts = HydratedArtifactSet::new();
        let mut producers: BTreeMap<PathBuf, EntityName> = BTreeMap::new();

        for record in entities {
            let overlay =
                set.overlay_for(&record.group)
                    .ok_or_else(|| EngineError::MissingOverlay {
                        entity: record.name.clone(),
                        group: record.group.clone(),
                    })?;
            let context = EntityContext::from_record(record).to_context()?;
            let prefix = self.layout.prefix_for(record);

            for (rel, layer_prefix, bytes) in merged_files(set.base(), overlay) {
                let rendered: Vec<u8>;
                let mut out_rel = normalize_rel(rel);
                if is_template(rel) {
                    let name = format!("{layer_prefix}/{out_rel}");
                    let text = tera
                        .render(&name, &context)
                        .map_err(|e| classify_render_error(rel, &record.name, e))?;
                    rendered = text.into_bytes();
                    out_rel.truncate(out_rel.len() - TEMPLATE_SUFFIX.len());
                } else {
                    rendered = bytes.to_vec();
                }

                let out_rel = render_output_path(rel, &record.name, &out_rel, &context)?;
                let full = prefix.join(out_rel);

                match artifacts.get(&full) {
                    Some(existing) if existing != rendered.as_slice() => {
                        return Err(EngineError::OutputCollision {
                            first: producers
                                .get(&full)
                                .cloned()
                                .unwrap_or_else(|| record.name.clone()),
                            second: record.name.clone(),
                            path: full,
                        });
                    }
                    Some(_) => {}
                    None => {
                        producers.insert(full.clone(), record.name.clone());
                        artifacts.insert(full, rendered);
                    }
                }
            }
        }

        Ok(artifacts)
    }
}

// ---------------------------------------------------------------------------
// Template registration and naming
// ---------------------------------------------------------------------------

fn is_template(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("tera")
}

fn normalize_rel(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn layer_tera_prefix(layer: &TemplateLayer, is_base: bool) -> String {
    if is_base {
        "base".to_string()
    } else {
        format!("overlays/{}", layer.name)
    }
}

/// Register every template file of every layer up front. Syntax and
/// encoding problems surface here, before any entity is touched, so a run
/// either starts from a fully valid template set or not at all.
fn build_tera(set: &TemplateSet) -> Result<Tera, EngineError> {
    let mut tera = Tera::default();
    tera.autoescape_on(Vec::new());

    let mut layers: Vec<(String, &TemplateLayer)> =
        vec![(layer_tera_prefix(set.base(), true), set.base())];
    for (_, layer) in set.overlays() {
        layers.push((layer_tera_prefix(layer, false), layer));
    }

    for (prefix, layer) in layers {
        for (rel, bytes) in &layer.files {
            if !is_template(rel) {
                continue;
            }
            let text =
                std::str::from_utf8(bytes).map_err(|_| EngineError::NonUtf8Template {
                    template: rel.clone(),
                })?;
            let name = format!("{prefix}/{}", normalize_rel(rel));
            tera.add_raw_template(&name, text)
                .map_err(|e| EngineError::Syntax {
                    template: rel.clone(),
                    source: e,
                })?;
        }
    }
    Ok(tera)
}

/// Base files first, then overlay files shadowing them, in path order.
fn merged_files<'a>(
    base: &'a TemplateLayer,
    overlay: &'a TemplateLayer,
) -> Vec<(&'a Path, String, &'a [u8])> {
    let base_prefix = layer_tera_prefix(base, true);
    let overlay_prefix = layer_tera_prefix(overlay, false);

    let mut merged: BTreeMap<&Path, (String, &[u8])> = BTreeMap::new();
    for (rel, bytes) in &base.files {
        merged.insert(rel.as_path(), (base_prefix.clone(), bytes.as_slice()));
    }
    for (rel, bytes) in &overlay.files {
        merged.insert(rel.as_path(), (overlay_prefix.clone(), bytes.as_slice()));
    }
    merged
        .into_iter()
        .map(|(rel, (prefix, bytes))| (rel, prefix, bytes))
        .collect()
}

// ---------------------------------------------------------------------------
// Output paths
// ---------------------------------------------------------------------------

/// Render placeholders in the output path, then check the result still
/// points inside the output root.
fn render_output_path(
    template: &Path,
    entity: &EntityName,
    out_rel: &str,
    context: &tera::Context,
) -> Result<PathBuf, EngineError> {
    let rendered = if out_rel.contains("{{") || out_rel.contains("{%") {
        Tera::one_off(out_rel, context, false)
            .map_err(|e| classify_render_error(template, entity, e))?
    } else {
        out_rel.to_string()
    };

    let path = PathBuf::from(&rendered);
    let escapes = rendered.trim().is_empty()
        || path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir));
    if escapes {
        return Err(EngineError::BadOutputPath {
            template: template.to_path_buf(),
            rendered,
        });
    }
    Ok(path)
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// Split render failures into "the record lacks a value" and "the template
/// is broken". Tera reports missing variables as a message in the error
/// source chain; everything else stays a template error.
fn classify_render_error(template: &Path, entity: &EntityName, err: tera::Error) -> EngineError {
    let mut chain: Vec<String> = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }

    for message in &chain {
        if message.contains("not found in context") {
            if let Some(key) = extract_backticked(message) {
                return EngineError::MissingValue {
                    template: template.to_path_buf(),
                    entity: entity.clone(),
                    key,
                };
            }
        }
    }

    EngineError::Render {
        template: template.to_path_buf(),
        entity: entity.clone(),
        source: err,
    }
}

fn extract_backticked(message: &str) -> Option<String> {
    let start = message.find('`')? + 1;
    let end = message[start..].find('`')? + start;
    if start == end {
        return None;
    }
    Some(message[start..end].to_string())
}
