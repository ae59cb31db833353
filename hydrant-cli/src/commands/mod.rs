//! Subcommand implementations and the argument structs they share.

pub mod diff;
pub mod render;
pub mod runs;
pub mod sync;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;

use hydrant_core::{EntityName, EntitySelector, GroupName, ReviewUnitId};
use hydrant_sync::{LocalHost, PipelineConfig, ReviewHost};

use super::LayoutArg;
use crate::config;
use crate::host_http::HttpHost;

// ---------------------------------------------------------------------------
// Shared pipeline inputs
// ---------------------------------------------------------------------------

/// Template, source, and output locations shared by render, diff, and sync.
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Base template layer directory.
    #[arg(long, value_name = "DIR")]
    pub base: PathBuf,

    /// Root holding one overlay directory per group.
    #[arg(long, value_name = "DIR")]
    pub overlays: PathBuf,

    /// Source-of-truth snapshot (YAML).
    #[arg(long, value_name = "FILE")]
    pub sot: PathBuf,

    /// Output root for hydrated artifacts.
    #[arg(long, value_name = "DIR")]
    pub output: PathBuf,

    /// Output layout: group | entity | flat.
    #[arg(long, value_name = "LAYOUT", default_value = "group")]
    pub layout: LayoutArg,
}

impl InputArgs {
    pub fn to_config(&self, selector: EntitySelector, dry_run: bool) -> PipelineConfig {
        PipelineConfig {
            base_root: self.base.clone(),
            overlays_root: self.overlays.clone(),
            source_path: self.sot.clone(),
            output_root: self.output.clone(),
            selector,
            layout: self.layout.0,
            dry_run,
        }
    }
}

/// Entity selection. At most one of `--entity` / `--group` / `--tag…`;
/// everything is hydrated when none is given.
#[derive(Args, Debug)]
pub struct SelectorArgs {
    /// Hydrate a single entity by name.
    #[arg(long, value_name = "NAME", conflicts_with_all = ["group", "tag"])]
    pub entity: Option<String>,

    /// Hydrate every entity in a group (case-insensitive).
    #[arg(long, value_name = "NAME", conflicts_with = "tag")]
    pub group: Option<String>,

    /// Hydrate entities carrying any of these tags (repeatable).
    #[arg(long, value_name = "TAG")]
    pub tag: Vec<String>,
}

impl SelectorArgs {
    pub fn to_selector(&self) -> EntitySelector {
        if let Some(name) = &self.entity {
            return EntitySelector::Name(EntityName::from(name.as_str()));
        }
        if let Some(group) = &self.group {
            return EntitySelector::Group(GroupName::from(group.as_str()));
        }
        if !self.tag.is_empty() {
            return EntitySelector::AnyTag(self.tag.clone());
        }
        EntitySelector::All
    }
}

// ---------------------------------------------------------------------------
// Review host selection
// ---------------------------------------------------------------------------

/// Where the review host lives. `--host-root` and `--host-url` are mutually
/// exclusive; with neither, the `url` from `~/.hydrant/host.yaml` applies.
#[derive(Args, Debug)]
pub struct HostArgs {
    /// Directory-backed review host (local runs and fixtures).
    #[arg(long, value_name = "DIR", group = "host")]
    pub host_root: Option<PathBuf>,

    /// Remote review host base URL.
    #[arg(long, value_name = "URL", group = "host")]
    pub host_url: Option<String>,

    /// Bearer token for the remote host (falls back to HYDRANT_TOKEN, then
    /// ~/.hydrant/host.yaml).
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,
}

/// A connected host, local or remote.
pub enum HostHandle {
    Local(LocalHost),
    Http(HttpHost),
}

impl HostHandle {
    pub fn as_review_host(&self) -> &dyn ReviewHost {
        match self {
            HostHandle::Local(host) => host,
            HostHandle::Http(host) => host,
        }
    }

    /// Committed artifacts at the unit's head, where the host can supply
    /// them. The remote protocol has no tree endpoint; sync falls back to
    /// reading the output root instead.
    pub fn previous_artifacts(
        &self,
        unit_id: &ReviewUnitId,
    ) -> Result<Option<hydrant_core::HydratedArtifactSet>, hydrant_sync::SyncError> {
        match self {
            HostHandle::Local(host) => host
                .artifact_tree(unit_id)
                .map_err(hydrant_sync::SyncError::Host),
            HostHandle::Http(_) => Ok(None),
        }
    }
}

impl HostArgs {
    pub fn connect(&self) -> Result<HostHandle> {
        if let Some(root) = &self.host_root {
            return Ok(HostHandle::Local(LocalHost::open(root.clone())));
        }

        let file = config::load_host_file()?;
        let url = match (&self.host_url, &file.url) {
            (Some(url), _) => url.clone(),
            (None, Some(url)) => url.clone(),
            (None, None) => bail!("provide --host-root or --host-url (or set `url` in ~/.hydrant/host.yaml)"),
        };
        let token = config::resolve_token(self.token.clone(), &file);
        Ok(HostHandle::Http(HttpHost::new(url, token)))
    }
}
