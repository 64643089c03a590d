//! Configuration layer plans and the merge function.
//!
//! Layers are applied strictly in plan order. Each layer is a TOML table;
//! later tables override earlier ones key by key.

use std::path::{Path, PathBuf};

use toml::{Table, Value};

use crate::core::types::OsIdentity;

/// File name suffix shared by every layer file.
pub const LAYER_SUFFIX: &str = ".conf";

/// User override layers, in application order.
pub const USER_LAYERS: [&str; 3] = ["site", "local", "rescue"];

/// Keys fixed before the live log exists; no layer may set them.
///
/// `config_dir`, `share_dir` and `kernel_version` are not listed: layers may
/// set those and the result is frozen once resolution completes.
pub const RESERVED_KEYS: [&str; 2] = ["var_dir", "log_dir"];

/// How a layer behaves when it is missing or malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// `os.conf`, `<workflow>.conf` and distribution files. Missing is fine.
    Optional,
    /// `site`, `local`, `rescue`. Missing is fine; a carriage return is fatal.
    UserOverride,
    /// Requested with `-C`. Missing is reported as a warning.
    Append,
}

/// One planned layer file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSource {
    pub kind: LayerKind,
    pub path: PathBuf,
}

impl LayerSource {
    fn optional(path: PathBuf) -> Self {
        Self {
            kind: LayerKind::Optional,
            path,
        }
    }
}

/// Layers sourced before OS detection: `os.conf` then `<workflow>.conf`.
pub fn pre_detection_layers(config_dir: &Path, workflow: &str) -> Vec<LayerSource> {
    vec![
        LayerSource::optional(config_dir.join(format!("os{LAYER_SUFFIX}"))),
        LayerSource::optional(config_dir.join(format!("{workflow}{LAYER_SUFFIX}"))),
    ]
}

/// Distribution-scoped layers under `<share_dir>/conf`, most generic first.
pub fn distribution_layers(share_dir: &Path, os: &OsIdentity) -> Vec<LayerSource> {
    let conf_dir = share_dir.join("conf");
    distribution_names(os)
        .into_iter()
        .map(|name| LayerSource::optional(conf_dir.join(format!("{name}{LAYER_SUFFIX}"))))
        .collect()
}

/// Relative layer names keyed by the detected identifiers.
///
/// Order: arch, OS, master vendor, master vendor + arch, master vendor +
/// version, master vendor + version + arch, then the same four for the
/// vendor. Names whose identifiers were not detected are dropped.
pub fn distribution_names(os: &OsIdentity) -> Vec<String> {
    let arch = os.arch.as_str();
    let family = os.os.as_str();
    let master = os.os_master_vendor.as_str();
    let vendor = os.os_vendor.as_str();
    let version = os.os_version.as_str();

    let candidates: [&[&str]; 10] = [
        &[arch],
        &[family],
        &[master],
        &[master, arch],
        &[master, version],
        &[master, version, arch],
        &[vendor],
        &[vendor, arch],
        &[vendor, version],
        &[vendor, version, arch],
    ];

    candidates
        .iter()
        .filter(|parts| parts.iter().all(|part| !part.is_empty()))
        .map(|parts| parts.join("/"))
        .collect()
}

/// `site.conf`, `local.conf`, `rescue.conf` in the configuration directory.
pub fn user_layers(config_dir: &Path) -> Vec<LayerSource> {
    USER_LAYERS
        .iter()
        .map(|name| LayerSource {
            kind: LayerKind::UserOverride,
            path: config_dir.join(format!("{name}{LAYER_SUFFIX}")),
        })
        .collect()
}

/// Candidate paths for one `-C` name: the bare name, then with `.conf`.
///
/// Absolute names are used as given; relative names resolve against the
/// configuration directory.
pub fn append_candidates(config_dir: &Path, name: &str) -> [PathBuf; 2] {
    let bare = if Path::new(name).is_absolute() {
        PathBuf::from(name)
    } else {
        config_dir.join(name)
    };
    let mut with_suffix = bare.clone().into_os_string();
    with_suffix.push(LAYER_SUFFIX);
    [bare, PathBuf::from(with_suffix)]
}

/// Merge `overlay` over `base`, returning the new snapshot.
///
/// Tables merge recursively; every other value (including arrays) is replaced.
pub fn merge(mut base: Table, overlay: Table) -> Table {
    for (key, value) in overlay {
        let merged = match (base.remove(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => {
                Value::Table(merge(existing, incoming))
            }
            (_, incoming) => incoming,
        };
        base.insert(key, merged);
    }
    base
}

/// First reserved key present at the top level of `table`, if any.
pub fn find_reserved_key(table: &Table) -> Option<&'static str> {
    RESERVED_KEYS
        .iter()
        .copied()
        .find(|key| table.contains_key(*key))
}
