//! RG-016: Plan generation — diff desired state against lock state.

use super::types::*;
use crate::journal::hasher;
use indexmap::IndexMap;

/// Generate an execution plan by comparing the catalog to lock state.
pub fn plan(
    name: &str,
    catalog: &IndexMap<String, Resource>,
    execution_order: &[String],
    lock: Option<&StateLock>,
) -> ExecutionPlan {
    let mut changes = Vec::new();
    let mut to_create = 0u32;
    let mut to_update = 0u32;
    let mut unchanged = 0u32;

    for resource_id in execution_order {
        let resource = match catalog.get(resource_id) {
            Some(r) => r,
            None => continue,
        };

        let action = determine_action(resource_id, resource, lock);
        let description = describe_action(resource_id, resource, &action);

        match action {
            PlanAction::Create => to_create += 1,
            PlanAction::Update => to_update += 1,
            PlanAction::NoOp => unchanged += 1,
        }

        changes.push(PlannedChange {
            resource_id: resource_id.clone(),
            kind: resource.kind.clone(),
            action,
            description,
        });
    }

    ExecutionPlan {
        name: name.to_string(),
        changes,
        execution_order: execution_order.to_vec(),
        to_create,
        to_update,
        unchanged,
    }
}

/// Determine what action to take for a resource.
fn determine_action(resource_id: &str, resource: &Resource, lock: Option<&StateLock>) -> PlanAction {
    if let Some(lock) = lock {
        if let Some(rl) = lock.resources.get(resource_id) {
            if rl.status == ResourceStatus::Converged {
                // Check if desired state hash matches
                let desired_hash = hash_desired_state(resource);
                if rl.hash == desired_hash {
                    return PlanAction::NoOp;
                }
                return PlanAction::Update;
            }
            // Previously failed or drifted — re-apply
            return PlanAction::Update;
        }
    }

    PlanAction::Create
}

/// Compute a hash of the desired state for comparison.
pub fn hash_desired_state(resource: &Resource) -> String {
    let mut components = Vec::new();
    components.push(resource.kind.to_string());

    if let Some(ref s) = resource.state {
        components.push(s.clone());
    }
    if let Some(ref p) = resource.provider {
        components.push(p.clone());
    }
    for pkg in &resource.packages {
        components.push(pkg.clone());
    }
    if let Some(ref path) = resource.path {
        components.push(path.clone());
    }
    if let Some(ref content) = resource.content {
        components.push(content.clone());
    }
    if let Some(ref source) = resource.source {
        components.push(source.clone());
    }
    if let Some(ref mode) = resource.mode {
        components.push(mode.clone());
    }
    if let Some(ref owner) = resource.owner {
        components.push(owner.clone());
    }
    if let Some(ref name) = resource.name {
        components.push(name.clone());
    }
    if let Some(size_mb) = resource.size_mb {
        components.push(size_mb.to_string());
    }
    if let Some(ref content_hash) = resource.content_hash {
        components.push(content_hash.clone());
    }
    if let Some(ref image) = resource.image {
        components.push(image.clone());
    }
    if let Some(ref build_dir) = resource.build_dir {
        components.push(build_dir.clone());
    }
    for cap in &resource.caps {
        components.push(cap.clone());
    }
    for volume in &resource.volumes {
        components.push(volume.clone());
    }
    for env in &resource.env {
        components.push(env.clone());
    }
    components.push(resource.privileged.to_string());
    for arg in &resource.command {
        components.push(arg.clone());
    }
    components.push(resource.setup_repo.to_string());

    let joined = components.join("\0");
    hasher::hash_string(&joined)
}

/// Generate a human-readable description of a planned action.
fn describe_action(resource_id: &str, resource: &Resource, action: &PlanAction) -> String {
    match action {
        PlanAction::Create => match resource.kind {
            ResourceKind::Package => {
                let verb = if resource.state.as_deref() == Some("absent") {
                    "remove"
                } else {
                    "install"
                };
                format!("{}: {} {}", resource_id, verb, resource.packages.join(", "))
            }
            ResourceKind::File => {
                let path = resource.path.as_deref().unwrap_or("?");
                format!("{}: create {}", resource_id, path)
            }
            ResourceKind::StagedFile | ResourceKind::StagedTree => {
                let path = resource.path.as_deref().unwrap_or("?");
                format!("{}: stage {}", resource_id, path)
            }
            ResourceKind::Archive => {
                let path = resource.path.as_deref().unwrap_or("?");
                format!("{}: extract into {}", resource_id, path)
            }
            ResourceKind::SwapFile => {
                let path = resource.path.as_deref().unwrap_or("?");
                format!(
                    "{}: activate {} ({} MiB)",
                    resource_id,
                    path,
                    resource.size_mb.unwrap_or(0)
                )
            }
            ResourceKind::KernelModule => {
                let name = resource.name.as_deref().unwrap_or("?");
                format!("{}: load module {}", resource_id, name)
            }
            ResourceKind::TmpfsRemount => {
                let path = resource.path.as_deref().unwrap_or("?");
                format!(
                    "{}: remount {} (size={}m)",
                    resource_id,
                    path,
                    resource.size_mb.unwrap_or(0)
                )
            }
            ResourceKind::DockerEngine => format!("{}: install docker engine", resource_id),
            ResourceKind::DockerImage => {
                let image = resource.image.as_deref().unwrap_or("?");
                format!("{}: build {}", resource_id, image)
            }
            ResourceKind::DockerContainer => {
                let name = resource.name.as_deref().unwrap_or("?");
                format!("{}: run container {}", resource_id, name)
            }
            ResourceKind::DockerExec => {
                let cmd = resource.command.join(" ");
                format!("{}: exec {}", resource_id, cmd)
            }
            ResourceKind::Selinux => format!("{}: set selinux permissive", resource_id),
            ResourceKind::Lockdown => {
                let mode = resource.state.as_deref().unwrap_or("integrity");
                format!("{}: set lockdown mode {}", resource_id, mode)
            }
        },
        PlanAction::Update => format!("{}: update (state changed)", resource_id),
        PlanAction::NoOp => format!("{}: no changes", resource_id),
    }
}
