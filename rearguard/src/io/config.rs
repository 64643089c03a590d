//! Layered configuration resolution.
//!
//! Layers are applied in this order, later ones overriding earlier ones:
//!
//! 1. built-in defaults (`conf/default.conf`, compiled in)
//! 2. `os.conf` and `<workflow>.conf` from the configuration directory
//! 3. OS detection, then distribution layers from `<share_dir>/conf`
//! 4. `site.conf`, `local.conf`, `rescue.conf`
//! 5. files requested with `-C`
//!
//! Unreadable layers are skipped. A malformed layer, a reserved key, or a
//! carriage return in a user layer is fatal. `kernel_version`, `share_dir`
//! and `config_dir` may be set by any layer; the caller freezes them once
//! resolution returns.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use toml::{Table, Value};
use tracing::{debug, instrument};

use crate::core::layers::{
    LayerKind, LayerSource, append_candidates, distribution_layers, find_reserved_key, merge,
    pre_detection_layers, user_layers,
};
use crate::core::types::OsIdentity;
use crate::error::ConfigError;
use crate::io::log::RunLog;
use crate::io::os_detect::OsDetector;

/// Built-in defaults, always applied first.
pub const DEFAULT_CONF: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../conf/default.conf"
));

/// Retention policy for the build workspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum KeepBuildDir {
    #[default]
    Never,
    Always,
    /// Keep only when the run aborted.
    OnError,
}

impl KeepBuildDir {
    pub fn keeps(self, aborted: bool) -> bool {
        match self {
            KeepBuildDir::Never => false,
            KeepBuildDir::Always => true,
            KeepBuildDir::OnError => aborted,
        }
    }
}

impl TryFrom<Value> for KeepBuildDir {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match &value {
            Value::Boolean(true) => Ok(KeepBuildDir::Always),
            Value::Boolean(false) => Ok(KeepBuildDir::Never),
            Value::String(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "" | "no" | "n" | "false" => Ok(KeepBuildDir::Never),
                "yes" | "y" | "true" => Ok(KeepBuildDir::Always),
                "errors" => Ok(KeepBuildDir::OnError),
                other => Err(format!(
                    "keep_build_dir must be true, false or \"errors\", got \"{other}\""
                )),
            },
            other => Err(format!(
                "keep_build_dir must be true, false or \"errors\", got {other}"
            )),
        }
    }
}

impl From<KeepBuildDir> for Value {
    fn from(keep: KeepBuildDir) -> Self {
        match keep {
            KeepBuildDir::Never => Value::Boolean(false),
            KeepBuildDir::Always => Value::Boolean(true),
            KeepBuildDir::OnError => Value::String("errors".to_string()),
        }
    }
}

/// Effective configuration after all layers are merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Final log location; empty means the live log target is final.
    pub log_file: String,
    pub keep_build_dir: KeepBuildDir,
    /// Paths excluded from backups.
    pub backup_prog_exclude: Vec<String>,
    /// Kernel version to use when `-r` is not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_dir: Option<PathBuf>,
    /// Configuration directory reported to workflows. Layers are read from
    /// the directory fixed before resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<PathBuf>,
    /// Every other key, for workflows to read.
    #[serde(flatten)]
    pub extra: Table,
}

impl Settings {
    /// User-configured final log path, if any.
    pub fn final_log_path(&self) -> Option<PathBuf> {
        let trimmed = self.log_file.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }

    /// Typed lookup of a workflow-specific key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// Inputs for one resolution pass.
#[derive(Debug, Clone)]
pub struct ConfigRequest<'a> {
    pub config_dir: &'a Path,
    pub share_dir: &'a Path,
    pub workflow: &'a str,
    pub append_files: &'a [String],
}

/// Result of resolution.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub settings: Settings,
    pub os: OsIdentity,
    /// Layer files that were applied, in order.
    pub applied: Vec<PathBuf>,
}

/// Resolve all layers for `request`, logging each applied file to `log`.
#[instrument(skip_all, fields(workflow = request.workflow))]
pub fn resolve_configuration<D: OsDetector>(
    request: &ConfigRequest<'_>,
    detector: &D,
    log: &RunLog,
) -> Result<ResolvedConfig> {
    if !request.config_dir.is_dir() {
        return Err(ConfigError::NotADirectory(request.config_dir.to_path_buf()).into());
    }

    let mut merged = parse_layer(DEFAULT_CONF, Path::new("default.conf"))?;
    let mut applied = Vec::new();

    for layer in pre_detection_layers(request.config_dir, request.workflow) {
        merged = apply_layer(merged, &layer, log, &mut applied)?;
    }

    let os = detector.detect().context("detect OS identity")?;
    log.debug(format!(
        "Detected OS: arch={} os={} master_vendor={} vendor={} version={}",
        os.arch, os.os, os.os_master_vendor, os.os_vendor, os.os_version
    ));

    for layer in distribution_layers(request.share_dir, &os) {
        merged = apply_layer(merged, &layer, log, &mut applied)?;
    }
    for layer in user_layers(request.config_dir) {
        merged = apply_layer(merged, &layer, log, &mut applied)?;
    }

    for name in request.append_files {
        let candidates = append_candidates(request.config_dir, name);
        let found = candidates.iter().find(|path| is_readable_file(path));
        match found {
            Some(path) => {
                let layer = LayerSource {
                    kind: LayerKind::Append,
                    path: path.clone(),
                };
                merged = apply_layer(merged, &layer, log, &mut applied)?;
            }
            None => log.log_print_error(format!(
                "There is no config file '{}'",
                candidates[0].display()
            )),
        }
    }

    let settings = Value::Table(merged)
        .try_into::<Settings>()
        .context("interpret merged configuration")?;
    debug!(applied = applied.len(), "configuration resolved");
    Ok(ResolvedConfig {
        settings,
        os,
        applied,
    })
}

fn apply_layer(
    merged: Table,
    layer: &LayerSource,
    log: &RunLog,
    applied: &mut Vec<PathBuf>,
) -> Result<Table> {
    match read_layer(layer)? {
        Some(table) => {
            log.log(format!("Including {}", layer.path.display()));
            applied.push(layer.path.clone());
            Ok(merge(merged, table))
        }
        None => {
            log.debug(format!("Skipping {} (not readable)", layer.path.display()));
            Ok(merged)
        }
    }
}

/// Read one layer. `None` means the file is absent or unreadable.
pub fn read_layer(layer: &LayerSource) -> Result<Option<Table>> {
    let contents = match fs::read_to_string(&layer.path) {
        Ok(contents) => contents,
        Err(err) => {
            debug!(path = %layer.path.display(), err = %err, "layer not readable");
            return Ok(None);
        }
    };

    if layer.kind == LayerKind::UserOverride && contents.contains('\r') {
        return Err(ConfigError::CarriageReturn(layer.path.clone()).into());
    }

    parse_layer(&contents, &layer.path).map(Some)
}

fn parse_layer(contents: &str, path: &Path) -> Result<Table> {
    let table = toml::from_str::<Table>(contents).map_err(|err| ConfigError::Malformed {
        path: path.to_path_buf(),
        message: err.message().to_string(),
    })?;
    if let Some(key) = find_reserved_key(&table) {
        return Err(ConfigError::ReservedKey {
            key: key.to_string(),
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(table)
}

fn is_readable_file(path: &Path) -> bool {
    fs::File::open(path)
        .and_then(|file| file.metadata())
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
