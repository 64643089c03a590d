//! OS/vendor detection feeding the distribution-scoped config layers.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

use crate::core::types::OsIdentity;

/// Produces the identifiers used to name distribution layers.
pub trait OsDetector {
    fn detect(&self) -> Result<OsIdentity>;
}

/// Detection from `os-release` plus the compile-time architecture.
#[derive(Debug, Clone)]
pub struct OsReleaseDetector {
    os_release: PathBuf,
}

impl Default for OsReleaseDetector {
    fn default() -> Self {
        Self {
            os_release: PathBuf::from("/etc/os-release"),
        }
    }
}

impl OsReleaseDetector {
    pub fn new(os_release: impl Into<PathBuf>) -> Self {
        Self {
            os_release: os_release.into(),
        }
    }
}

impl OsDetector for OsReleaseDetector {
    fn detect(&self) -> Result<OsIdentity> {
        // A missing os-release leaves vendor fields empty; those layers are skipped.
        let raw = fs::read_to_string(&self.os_release).unwrap_or_default();
        let identity = identity_from_os_release(&raw, std::env::consts::ARCH, std::env::consts::OS);
        debug!(?identity, "os identity detected");
        Ok(identity)
    }
}

fn identity_from_os_release(raw: &str, arch: &str, family: &str) -> OsIdentity {
    let field = |key: &str| -> String {
        raw.lines()
            .filter_map(|line| line.split_once('='))
            .find(|(name, _)| name.trim() == key)
            .map(|(_, value)| value.trim().trim_matches(['"', '\'']).to_string())
            .unwrap_or_default()
    };

    let os_vendor = capitalize(&field("ID"));
    let os_master_vendor = field("ID_LIKE")
        .split_whitespace()
        .next()
        .map(capitalize)
        .filter(|master| *master != os_vendor)
        .unwrap_or_default();

    OsIdentity {
        arch: arch.to_string(),
        os: if family == "linux" {
            "GNU/Linux".to_string()
        } else {
            family.to_string()
        },
        os_master_vendor,
        os_vendor,
        os_version: field("VERSION_ID"),
    }
}

fn capitalize(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UBUNTU: &str = "NAME=\"Ubuntu\"\nID=ubuntu\nID_LIKE=debian\nVERSION_ID=\"22.04\"\n";

    #[test]
    fn derives_vendor_master_vendor_and_version() {
        let identity = identity_from_os_release(UBUNTU, "x86_64", "linux");
        assert_eq!(
            identity,
            OsIdentity {
                arch: "x86_64".to_string(),
                os: "GNU/Linux".to_string(),
                os_master_vendor: "Debian".to_string(),
                os_vendor: "Ubuntu".to_string(),
                os_version: "22.04".to_string(),
            }
        );
    }

    #[test]
    fn master_vendor_equal_to_vendor_is_dropped() {
        let identity = identity_from_os_release("ID=fedora\nID_LIKE=fedora\n", "aarch64", "linux");
        assert_eq!(identity.os_vendor, "Fedora");
        assert_eq!(identity.os_master_vendor, "");
    }

    #[test]
    fn missing_os_release_keeps_arch_and_family() {
        let temp = tempfile::tempdir().expect("tempdir");
        let detector = OsReleaseDetector::new(temp.path().join("missing"));
        let identity = detector.detect().expect("detect");
        assert_eq!(identity.arch, std::env::consts::ARCH);
        assert!(identity.os_vendor.is_empty());
        assert!(identity.os_version.is_empty());
    }
}
