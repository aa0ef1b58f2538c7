//! RG-003: Platform fact detection.
//!
//! Reads /etc/os-release (fallback /usr/lib/os-release) and derives the
//! platform id, version, and family that gate the resource catalog. Facts can
//! be overridden from the config for lab boxes whose image metadata is wrong.

use crate::core::types::PlatformOverride;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Platform family, derived from ID and ID_LIKE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformFamily {
    Debian,
    Rhel,
    Amazon,
    Suse,
    Windows,
    Unknown,
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debian => write!(f, "debian"),
            Self::Rhel => write!(f, "rhel"),
            Self::Amazon => write!(f, "amazon"),
            Self::Suse => write!(f, "suse"),
            Self::Windows => write!(f, "windows"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl PlatformFamily {
    fn parse(s: &str) -> Self {
        match s {
            "debian" => Self::Debian,
            "rhel" => Self::Rhel,
            "amazon" => Self::Amazon,
            "suse" => Self::Suse,
            "windows" => Self::Windows,
            _ => Self::Unknown,
        }
    }
}

/// Detected platform facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Normalized platform id (ubuntu, debian, centos, redhat, oracle, amazon, ...)
    pub id: String,

    /// VERSION_ID from os-release
    pub version: String,

    /// Derived family
    pub family: PlatformFamily,
}

impl Platform {
    /// Detect facts for the local host. Never fails: unreadable metadata
    /// yields an unknown platform that the catalog's default branches handle.
    pub fn detect() -> Self {
        if cfg!(windows) {
            return Self {
                id: "windows".to_string(),
                version: String::new(),
                family: PlatformFamily::Windows,
            };
        }

        for candidate in ["/etc/os-release", "/usr/lib/os-release"] {
            if let Ok(content) = std::fs::read_to_string(Path::new(candidate)) {
                return Self::from_os_release(&content);
            }
        }

        Self {
            id: String::new(),
            version: String::new(),
            family: PlatformFamily::Unknown,
        }
    }

    /// Parse facts from os-release content.
    pub fn from_os_release(content: &str) -> Self {
        let mut id = String::new();
        let mut id_like = String::new();
        let mut version = String::new();

        for line in content.lines() {
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().trim_matches('"').to_string();
                match key.trim() {
                    "ID" => id = value,
                    "ID_LIKE" => id_like = value,
                    "VERSION_ID" => version = value,
                    _ => {}
                }
            }
        }

        let id = normalize_id(&id);
        let family = derive_family(&id, &id_like);

        Self { id, version, family }
    }

    /// Apply config overrides on top of detected facts.
    pub fn with_override(mut self, ov: &PlatformOverride) -> Self {
        if let Some(ref id) = ov.id {
            self.id = normalize_id(id);
        }
        if let Some(ref version) = ov.version {
            self.version = version.clone();
        }
        if let Some(ref family) = ov.family {
            self.family = PlatformFamily::parse(family);
        } else if ov.id.is_some() {
            // Re-derive the family when only the id was overridden
            self.family = derive_family(&self.id, "");
        }
        self
    }

    pub fn is_windows(&self) -> bool {
        self.family == PlatformFamily::Windows
    }

    /// Platforms where SELinux enforcement must be relaxed for the tests.
    pub fn is_rpm_family(&self) -> bool {
        self.family == PlatformFamily::Rhel
    }

    /// Platforms that run the testsuite inside a privileged container
    /// instead of against their own (unsupported) kernel toolchain.
    pub fn uses_host_containers(&self) -> bool {
        !matches!(self.id.as_str(), "redhat" | "suse" | "opensuseleap")
    }

    /// The package provider used by generated install scripts.
    pub fn package_provider(&self) -> &'static str {
        match self.id.as_str() {
            "fedora" => "dnf",
            _ => match self.family {
                PlatformFamily::Debian => "apt",
                PlatformFamily::Amazon => "dnf",
                PlatformFamily::Rhel => "yum",
                PlatformFamily::Suse => "zypper",
                _ => "apt",
            },
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({} family)", self.id, self.version, self.family)
    }
}

/// Map os-release IDs onto the names the catalog branches on.
fn normalize_id(id: &str) -> String {
    match id {
        "ol" => "oracle".to_string(),
        "amzn" => "amazon".to_string(),
        "rhel" => "redhat".to_string(),
        "sles" | "sled" => "suse".to_string(),
        "opensuse-leap" => "opensuseleap".to_string(),
        other => other.to_string(),
    }
}

fn derive_family(id: &str, id_like: &str) -> PlatformFamily {
    match id {
        "ubuntu" | "debian" => return PlatformFamily::Debian,
        "amazon" => return PlatformFamily::Amazon,
        "centos" | "redhat" | "oracle" | "fedora" | "rocky" | "almalinux" => {
            return PlatformFamily::Rhel
        }
        "suse" | "opensuseleap" => return PlatformFamily::Suse,
        "windows" => return PlatformFamily::Windows,
        _ => {}
    }

    for like in id_like.split_whitespace() {
        match like {
            "debian" | "ubuntu" => return PlatformFamily::Debian,
            "rhel" | "fedora" | "centos" => return PlatformFamily::Rhel,
            "suse" => return PlatformFamily::Suse,
            _ => {}
        }
    }

    PlatformFamily::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    const UBUNTU: &str = r#"
NAME="Ubuntu"
VERSION="22.04.3 LTS (Jammy Jellyfish)"
ID=ubuntu
ID_LIKE=debian
VERSION_ID="22.04"
"#;

    const AMAZON_2022: &str = r#"
NAME="Amazon Linux"
VERSION="2022"
ID="amzn"
ID_LIKE="fedora"
VERSION_ID="2022"
"#;

    const ORACLE: &str = r#"
NAME="Oracle Linux Server"
ID="ol"
ID_LIKE="fedora"
VERSION_ID="8.7"
"#;

    const LEAP: &str = r#"
NAME="openSUSE Leap"
ID="opensuse-leap"
ID_LIKE="suse opensuse"
VERSION_ID="15.4"
"#;

    #[test]
    fn test_rg003_parse_ubuntu() {
        let p = Platform::from_os_release(UBUNTU);
        assert_eq!(p.id, "ubuntu");
        assert_eq!(p.version, "22.04");
        assert_eq!(p.family, PlatformFamily::Debian);
        assert_eq!(p.package_provider(), "apt");
    }

    #[test]
    fn test_rg003_parse_amazon() {
        let p = Platform::from_os_release(AMAZON_2022);
        assert_eq!(p.id, "amazon");
        assert_eq!(p.version, "2022");
        assert_eq!(p.family, PlatformFamily::Amazon);
        assert_eq!(p.package_provider(), "dnf");
        assert!(!p.is_rpm_family(), "amazon is not gated for selinux");
    }

    #[test]
    fn test_rg003_parse_oracle() {
        let p = Platform::from_os_release(ORACLE);
        assert_eq!(p.id, "oracle");
        assert_eq!(p.family, PlatformFamily::Rhel);
        assert_eq!(p.package_provider(), "yum");
        assert!(p.is_rpm_family());
        assert!(p.uses_host_containers());
    }

    #[test]
    fn test_rg003_parse_leap() {
        let p = Platform::from_os_release(LEAP);
        assert_eq!(p.id, "opensuseleap");
        assert_eq!(p.family, PlatformFamily::Suse);
        assert_eq!(p.package_provider(), "zypper");
        assert!(!p.uses_host_containers());
    }

    #[test]
    fn test_rg003_rhel_skips_containers() {
        let p = Platform::from_os_release("ID=rhel\nVERSION_ID=\"9.2\"\n");
        assert_eq!(p.id, "redhat");
        assert!(!p.uses_host_containers());
        assert!(p.is_rpm_family());
    }

    #[test]
    fn test_rg003_centos_runs_containers() {
        let p = Platform::from_os_release("ID=centos\nVERSION_ID=\"7\"\n");
        assert!(p.uses_host_containers());
        assert!(p.is_rpm_family());
        assert_eq!(p.package_provider(), "yum");
    }

    #[test]
    fn test_rg003_fedora_uses_dnf() {
        let p = Platform::from_os_release("ID=fedora\nVERSION_ID=38\n");
        assert_eq!(p.package_provider(), "dnf");
        assert!(p.is_rpm_family());
    }

    #[test]
    fn test_rg003_unknown_falls_through() {
        let p = Platform::from_os_release("ID=voidlinux\n");
        assert_eq!(p.family, PlatformFamily::Unknown);
        assert!(p.uses_host_containers());
        assert!(!p.is_rpm_family());
    }

    #[test]
    fn test_rg003_id_like_fallback() {
        let p = Platform::from_os_release("ID=pop\nID_LIKE=\"ubuntu debian\"\n");
        assert_eq!(p.family, PlatformFamily::Debian);
    }

    #[test]
    fn test_rg003_override_id_rederives_family() {
        let p = Platform::from_os_release(UBUNTU);
        let ov = PlatformOverride {
            id: Some("centos".to_string()),
            family: None,
            version: Some("7".to_string()),
        };
        let p = p.with_override(&ov);
        assert_eq!(p.id, "centos");
        assert_eq!(p.version, "7");
        assert_eq!(p.family, PlatformFamily::Rhel);
    }

    #[test]
    fn test_rg003_override_family_explicit() {
        let p = Platform::from_os_release(UBUNTU);
        let ov = PlatformOverride {
            id: None,
            family: Some("windows".to_string()),
            version: None,
        };
        let p = p.with_override(&ov);
        assert!(p.is_windows());
    }

    #[test]
    fn test_rg003_display() {
        let p = Platform::from_os_release(UBUNTU);
        let s = p.to_string();
        assert!(s.contains("ubuntu"));
        assert!(s.contains("debian family"));
    }
}
