//! RG-012: Tmpfs remount handler — grow /tmp before large extractions.

use crate::core::types::Resource;

/// Generate shell to check the mount point exists.
pub fn check_script(resource: &Resource) -> String {
    let path = resource.path.as_deref().unwrap_or("/tmp");
    format!(
        "mountpoint -q '{}' 2>/dev/null && echo 'mounted:{}' || echo 'unmounted:{}'",
        path, path, path
    )
}

/// Generate shell to remount with the configured size floor.
pub fn apply_script(resource: &Resource) -> String {
    let path = resource.path.as_deref().unwrap_or("/tmp");
    let size_mb = resource.size_mb.unwrap_or(5120);

    format!(
        "set -euo pipefail\n\
         mount -o 'remount,size={}m' '{}'",
        size_mb, path
    )
}

/// Generate shell to query mount size (for hashing).
pub fn state_query_script(resource: &Resource) -> String {
    let path = resource.path.as_deref().unwrap_or("/tmp");
    format!(
        "findmnt -n -o SIZE,OPTIONS '{}' 2>/dev/null || echo 'UNMOUNTED'",
        path
    )
}
