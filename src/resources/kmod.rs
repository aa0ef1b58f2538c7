//! RG-011: Kernel module handler.

use crate::core::types::Resource;

/// Generate shell to check whether the module is loaded.
pub fn check_script(resource: &Resource) -> String {
    let name = resource.name.as_deref().unwrap_or("unknown");
    format!(
        "lsmod | grep -q '^{}\\b' && echo 'loaded:{}' || echo 'unloaded:{}'",
        name, name, name
    )
}

/// Generate shell to load the module.
pub fn apply_script(resource: &Resource) -> String {
    let name = resource.name.as_deref().unwrap_or("unknown");
    format!(
        "set -euo pipefail\n\
         if ! lsmod | grep -q '^{}\\b'; then\n\
         \x20 modprobe '{}'\nfi",
        name, name
    )
}

/// Generate shell to query module state (for hashing).
pub fn state_query_script(resource: &Resource) -> String {
    let name = resource.name.as_deref().unwrap_or("unknown");
    format!(
        "lsmod | grep '^{}\\b' 2>/dev/null || echo '{}=UNLOADED'",
        name, name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ResourceKind;

    fn make_kmod(name: &str) -> Resource {
        let mut r = Resource::new(ResourceKind::KernelModule);
        r.name = Some(name.to_string());
        r
    }

    #[test]
    fn test_rg011_apply_loop() {
        let script = apply_script(&make_kmod("loop"));
        assert!(script.contains("modprobe 'loop'"));
        assert!(script.contains("if ! lsmod | grep -q '^loop\\b'"));
    }

    #[test]
    fn test_rg011_apply_veth() {
        let script = apply_script(&make_kmod("veth"));
        assert!(script.contains("modprobe 'veth'"));
    }

    #[test]
    fn test_rg011_check() {
        let script = check_script(&make_kmod("loop"));
        assert!(script.contains("loaded:loop"));
        assert!(script.contains("unloaded:loop"));
    }

    #[test]
    fn test_rg011_state_query() {
        let script = state_query_script(&make_kmod("veth"));
        assert!(script.contains("veth=UNLOADED"));
    }
}
