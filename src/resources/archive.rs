//! RG-009: Archive extraction handler (tar.gz staged on the target).

use crate::core::types::Resource;

/// Generate shell to check whether the destination holds extracted content.
pub fn check_script(resource: &Resource) -> String {
    let dest = resource.path.as_deref().unwrap_or("/dev/null");
    format!(
        "if [ -d '{}' ] && [ -n \"$(ls -A '{}' 2>/dev/null)\" ]; then echo 'extracted:{}'; else echo 'empty:{}'; fi",
        dest, dest, dest, dest
    )
}

/// Generate shell to extract the tarball into the destination.
pub fn apply_script(resource: &Resource) -> String {
    let source = resource.source.as_deref().unwrap_or("/dev/null");
    let dest = resource.path.as_deref().unwrap_or("/dev/null");

    // Re-extraction over identical content converges to the same end state
    format!(
        "set -euo pipefail\n\
         mkdir -p '{}'\n\
         tar -xzf '{}' -C '{}'",
        dest, source, dest
    )
}

/// Generate shell to query extracted state (for hashing).
pub fn state_query_script(resource: &Resource) -> String {
    let dest = resource.path.as_deref().unwrap_or("/dev/null");
    format!(
        "if [ -d '{}' ]; then\n\
           find '{}' -type f 2>/dev/null | sort | wc -l\n\
         else\n\
           echo 'MISSING'\n\
         fi",
        dest, dest
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ResourceKind;

    fn make_archive() -> Resource {
        let mut r = Resource::new(ResourceKind::Archive);
        r.source = Some("/tmp/security-agent/nikos.tar.gz".to_string());
        r.path = Some("/opt/datadog-agent/embedded/nikos/embedded".to_string());
        r
    }

    #[test]
    fn test_rg009_apply_extracts() {
        let script = apply_script(&make_archive());
        assert!(script.contains("mkdir -p '/opt/datadog-agent/embedded/nikos/embedded'"));
        assert!(script.contains(
            "tar -xzf '/tmp/security-agent/nikos.tar.gz' -C '/opt/datadog-agent/embedded/nikos/embedded'"
        ));
        assert!(script.contains("set -euo pipefail"));
    }

    #[test]
    fn test_rg009_check_nonempty() {
        let script = check_script(&make_archive());
        assert!(script.contains("ls -A"));
        assert!(script.contains("extracted:"));
    }

    #[test]
    fn test_rg009_state_query() {
        let script = state_query_script(&make_archive());
        assert!(script.contains("find '/opt/datadog-agent/embedded/nikos/embedded'"));
        assert!(script.contains("MISSING"));
    }
}
