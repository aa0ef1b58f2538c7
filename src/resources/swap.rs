//! RG-010: Swap file handler.

use crate::core::types::Resource;

/// Generate shell to check swap state.
pub fn check_script(resource: &Resource) -> String {
    let path = resource.path.as_deref().unwrap_or("/mnt/swapfile");
    format!(
        "grep -q '{}' /proc/swaps 2>/dev/null && echo 'active:{}' || echo 'inactive:{}'",
        path, path, path
    )
}

/// Generate shell to create and activate the swap file.
pub fn apply_script(resource: &Resource) -> String {
    let path = resource.path.as_deref().unwrap_or("/mnt/swapfile");
    let size_mb = resource.size_mb.unwrap_or(2048);

    let mut lines = vec!["set -euo pipefail".to_string()];
    lines.push(format!(
        "if ! grep -q '{path}' /proc/swaps 2>/dev/null; then\n\
         \x20 if [ ! -f '{path}' ]; then\n\
         \x20   fallocate -l {size_mb}M '{path}' 2>/dev/null || dd if=/dev/zero of='{path}' bs=1M count={size_mb}\n\
         \x20   chmod 0600 '{path}'\n\
         \x20   mkswap '{path}'\n\
         \x20 fi\n\
         \x20 swapon '{path}'\nfi"
    ));
    // Persist across reboots of long-lived lab boxes
    lines.push(format!(
        "if ! grep -q '{path}' /etc/fstab 2>/dev/null; then\n\
         \x20 echo '{path} none swap sw 0 0' >> /etc/fstab\nfi"
    ));

    lines.join("\n")
}

/// Generate shell to query swap state (for hashing).
pub fn state_query_script(resource: &Resource) -> String {
    let path = resource.path.as_deref().unwrap_or("/mnt/swapfile");
    format!(
        "grep '{}' /proc/swaps 2>/dev/null || echo 'INACTIVE'",
        path
    )
}
