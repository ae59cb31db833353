//! Host credentials and defaults from `~/.hydrant/host.yaml`.
//!
//! ```yaml
//! url: https://review.example.com/api
//! token: hyd_xxxxxxxx
//! ```
//!
//! Both keys are optional. The API token resolves in order: `--token` flag,
//! `HYDRANT_TOKEN` environment variable, then the config file. The `url` key
//! backs `--host-url` when neither `--host-root` nor `--host-url` is given.
//! Resolution happens once at startup; nothing downstream reads the
//! environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment variable consulted between the flag and the config file.
pub const TOKEN_ENV: &str = "HYDRANT_TOKEN";

const CONFIG_DIR: &str = ".hydrant";
const HOST_FILE: &str = "host.yaml";

/// Parsed `host.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostFile {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// `~/.hydrant/host.yaml`, or `None` when no home directory exists.
pub fn host_file_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(HOST_FILE))
}

/// Load the config file at an explicit path.
pub fn load_host_file_at(path: &Path) -> Result<HostFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read host config '{}'", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("malformed host config '{}'", path.display()))
}

/// The config file from the home directory, or defaults when absent.
pub fn load_host_file() -> Result<HostFile> {
    match host_file_path() {
        Some(path) if path.exists() => load_host_file_at(&path),
        _ => Ok(HostFile::default()),
    }
}

/// Resolve the bearer token: flag, then environment, then config file.
pub fn resolve_token(flag: Option<String>, file: &HostFile) -> Option<String> {
    if flag.is_some() {
        return flag;
    }
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.is_empty() {
            return Some(token);
        }
    }
    file.token.clone()
}
