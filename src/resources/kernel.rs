//! RG-014: Kernel security handlers — SELinux mode and lockdown.

use crate::core::types::Resource;
use regex::Regex;

// ----------------------------------------------------------------------------
// SELinux
// ----------------------------------------------------------------------------

/// Generate shell to check the current SELinux mode.
pub fn selinux_check_script(_resource: &Resource) -> String {
    "getenforce 2>/dev/null || echo 'UNAVAILABLE'".to_string()
}

/// Generate shell to relax SELinux to permissive, now and across reboots.
pub fn selinux_apply_script(_resource: &Resource) -> String {
    "set -euo pipefail\n\
     if command -v getenforce >/dev/null 2>&1; then\n\
     \x20 if [ \"$(getenforce)\" = 'Enforcing' ]; then\n\
     \x20   setenforce 0\n\
     \x20 fi\nfi\n\
     if [ -f /etc/selinux/config ]; then\n\
     \x20 sed -i 's/^SELINUX=enforcing/SELINUX=permissive/' /etc/selinux/config\nfi"
        .to_string()
}

/// Generate shell to query SELinux state (for hashing).
pub fn selinux_state_query_script(_resource: &Resource) -> String {
    "getenforce 2>/dev/null || echo 'UNAVAILABLE'".to_string()
}

// ----------------------------------------------------------------------------
// Kernel lockdown
// ----------------------------------------------------------------------------

const LOCKDOWN_PATH: &str = "/sys/kernel/security/lockdown";

/// Generate shell to check the lockdown file and its active mode.
pub fn lockdown_check_script(resource: &Resource) -> String {
    let path = resource.path.as_deref().unwrap_or(LOCKDOWN_PATH);
    format!("cat '{}' 2>/dev/null || echo 'ABSENT'", path)
}

/// Generate shell that sets the lockdown mode when the sysfs file exists and
/// the active mode differs. Re-running against an already-set kernel is a
/// no-op, and hosts without the file are skipped entirely.
pub fn lockdown_apply_script(resource: &Resource) -> String {
    let path = resource.path.as_deref().unwrap_or(LOCKDOWN_PATH);
    let mode = resource.state.as_deref().unwrap_or("integrity");
    format!(
        "set -euo pipefail\n\
         if [ -e '{path}' ]; then\n\
         \x20 case \"$(cat '{path}')\" in\n\
         \x20   *'[{mode}]'*) : ;;\n\
         \x20   *) echo '{mode}' > '{path}' ;;\n\
         \x20 esac\nfi"
    )
}

/// Generate shell to query lockdown state (for hashing).
pub fn lockdown_state_query_script(resource: &Resource) -> String {
    let path = resource.path.as_deref().unwrap_or(LOCKDOWN_PATH);
    format!("cat '{}' 2>/dev/null || echo 'ABSENT'", path)
}

/// Extract the active mode from lockdown file content, e.g.
/// `none [integrity] confidentiality` yields `integrity`.
pub fn active_lockdown_mode(content: &str) -> Option<String> {
    let re = Regex::new(r"\[(\w+)\]").ok()?;
    re.captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ResourceKind;

    #[test]
    fn test_rg014_selinux_apply() {
        let r = Resource::new(ResourceKind::Selinux);
        let script = selinux_apply_script(&r);
        assert!(script.contains("setenforce 0"));
        assert!(script.contains("SELINUX=permissive"));
        assert!(script.contains("if [ \"$(getenforce)\" = 'Enforcing' ]"));
    }

    #[test]
    fn test_rg014_lockdown_apply_guarded() {
        let mut r = Resource::new(ResourceKind::Lockdown);
        r.state = Some("integrity".to_string());
        let script = lockdown_apply_script(&r);
        assert!(script.contains("if [ -e '/sys/kernel/security/lockdown' ]"));
        assert!(script.contains("*'[integrity]'*"));
        assert!(script.contains("echo 'integrity' > '/sys/kernel/security/lockdown'"));
    }

    #[test]
    fn test_rg014_lockdown_check() {
        let r = Resource::new(ResourceKind::Lockdown);
        let script = lockdown_check_script(&r);
        assert!(script.contains("cat '/sys/kernel/security/lockdown'"));
        assert!(script.contains("ABSENT"));
    }

    #[test]
    fn test_rg014_active_mode_bracketed() {
        assert_eq!(
            active_lockdown_mode("none [integrity] confidentiality"),
            Some("integrity".to_string())
        );
        assert_eq!(
            active_lockdown_mode("[none] integrity confidentiality"),
            Some("none".to_string())
        );
    }

    #[test]
    fn test_rg014_active_mode_absent() {
        assert_eq!(active_lockdown_mode("ABSENT"), None);
        assert_eq!(active_lockdown_mode(""), None);
    }
}
