//! RG-005: Script generation — dispatch to resource handlers.
//!
//! Each resource kind produces three scripts:
//! - check: read current state
//! - apply: converge to desired state
//! - state_query: query observable state for BLAKE3 hashing

use super::types::{Resource, ResourceKind};
use crate::resources;

/// Generate a check script for a resource.
pub fn check_script(resource: &Resource) -> Result<String, String> {
    Ok(match &resource.kind {
        ResourceKind::Package => resources::package::check_script(resource),
        ResourceKind::File => resources::file::check_script(resource),
        ResourceKind::StagedFile | ResourceKind::StagedTree => {
            resources::staging::check_script(resource)
        }
        ResourceKind::Archive => resources::archive::check_script(resource),
        ResourceKind::SwapFile => resources::swap::check_script(resource),
        ResourceKind::KernelModule => resources::kmod::check_script(resource),
        ResourceKind::TmpfsRemount => resources::tmpfs::check_script(resource),
        ResourceKind::DockerEngine => resources::docker::engine_check_script(resource),
        ResourceKind::DockerImage => resources::docker::image_check_script(resource),
        ResourceKind::DockerContainer => resources::docker::container_check_script(resource),
        ResourceKind::DockerExec => resources::docker::exec_check_script(resource),
        ResourceKind::Selinux => resources::kernel::selinux_check_script(resource),
        ResourceKind::Lockdown => resources::kernel::lockdown_check_script(resource),
    })
}

/// Generate an apply script for a resource.
pub fn apply_script(resource: &Resource) -> Result<String, String> {
    match &resource.kind {
        ResourceKind::Package => Ok(resources::package::apply_script(resource)),
        ResourceKind::File => Ok(resources::file::apply_script(resource)),
        ResourceKind::StagedFile => resources::staging::apply_script(resource),
        ResourceKind::StagedTree => resources::staging::tree_apply_script(resource),
        ResourceKind::Archive => Ok(resources::archive::apply_script(resource)),
        ResourceKind::SwapFile => Ok(resources::swap::apply_script(resource)),
        ResourceKind::KernelModule => Ok(resources::kmod::apply_script(resource)),
        ResourceKind::TmpfsRemount => Ok(resources::tmpfs::apply_script(resource)),
        ResourceKind::DockerEngine => Ok(resources::docker::engine_apply_script(resource)),
        ResourceKind::DockerImage => Ok(resources::docker::image_apply_script(resource)),
        ResourceKind::DockerContainer => Ok(resources::docker::container_apply_script(resource)),
        ResourceKind::DockerExec => Ok(resources::docker::exec_apply_script(resource)),
        ResourceKind::Selinux => Ok(resources::kernel::selinux_apply_script(resource)),
        ResourceKind::Lockdown => Ok(resources::kernel::lockdown_apply_script(resource)),
    }
}

/// Generate a state query script for a resource.
pub fn state_query_script(resource: &Resource) -> Result<String, String> {
    Ok(match &resource.kind {
        ResourceKind::Package => resources::package::state_query_script(resource),
        ResourceKind::File => resources::file::state_query_script(resource),
        ResourceKind::StagedFile | ResourceKind::StagedTree => {
            resources::staging::state_query_script(resource)
        }
        ResourceKind::Archive => resources::archive::state_query_script(resource),
        ResourceKind::SwapFile => resources::swap::state_query_script(resource),
        ResourceKind::KernelModule => resources::kmod::state_query_script(resource),
        ResourceKind::TmpfsRemount => resources::tmpfs::state_query_script(resource),
        ResourceKind::DockerEngine => resources::docker::engine_state_query_script(resource),
        ResourceKind::DockerImage => resources::docker::image_state_query_script(resource),
        ResourceKind::DockerContainer => {
            resources::docker::container_state_query_script(resource)
        }
        ResourceKind::DockerExec => resources::docker::exec_state_query_script(resource),
        ResourceKind::Selinux => resources::kernel::selinux_state_query_script(resource),
        ResourceKind::Lockdown => resources::kernel::lockdown_state_query_script(resource),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(kind: ResourceKind) -> Resource {
        Resource::new(kind)
    }

    #[test]
    fn test_rg005_check_dispatches_package() {
        let mut r = make(ResourceKind::Package);
        r.provider = Some("apt".to_string());
        r.packages = vec!["python3".to_string()];
        let script = check_script(&r).unwrap();
        assert!(script.contains("dpkg"));
    }

    #[test]
    fn test_rg005_check_dispatches_swap() {
        let mut r = make(ResourceKind::SwapFile);
        r.path = Some("/mnt/swapfile".to_string());
        let script = check_script(&r).unwrap();
        assert!(script.contains("/proc/swaps"));
    }

    #[test]
    fn test_rg005_apply_dispatches_kmod() {
        let mut r = make(ResourceKind::KernelModule);
        r.name = Some("loop".to_string());
        let script = apply_script(&r).unwrap();
        assert!(script.contains("modprobe 'loop'"));
    }

    #[test]
    fn test_rg005_apply_dispatches_file() {
        let mut r = make(ResourceKind::File);
        r.path = Some("/tmp/rig".to_string());
        r.content = Some("0".to_string());
        let script = apply_script(&r).unwrap();
        assert!(script.contains("cat >"));
        assert!(script.contains("RIG_EOF"));
    }

    #[test]
    fn test_rg005_apply_dispatches_lockdown() {
        let mut r = make(ResourceKind::Lockdown);
        r.state = Some("integrity".to_string());
        let script = apply_script(&r).unwrap();
        assert!(script.contains("lockdown"));
    }

    #[test]
    fn test_rg005_apply_dispatches_container() {
        let mut r = make(ResourceKind::DockerContainer);
        r.name = Some("docker-testsuite".to_string());
        r.image = Some("testsuite-img:latest".to_string());
        let script = apply_script(&r).unwrap();
        assert!(script.contains("docker run"));
    }

    #[test]
    fn test_rg005_staged_file_missing_source_errors() {
        let mut r = make(ResourceKind::StagedFile);
        r.path = Some("/tmp/security-agent/testsuite".to_string());
        r.source = Some("/nonexistent/testsuite".to_string());
        assert!(apply_script(&r).is_err());
    }

    #[test]
    fn test_rg005_state_query_dispatches() {
        let mut r = make(ResourceKind::TmpfsRemount);
        r.path = Some("/tmp".to_string());
        let script = state_query_script(&r).unwrap();
        assert!(script.contains("findmnt"));
    }

    #[test]
    fn test_rg005_state_query_selinux() {
        let r = make(ResourceKind::Selinux);
        let script = state_query_script(&r).unwrap();
        assert!(script.contains("getenforce"));
    }
}
