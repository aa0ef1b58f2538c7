//! RG-017: Executor — orchestration loop for provisioning.
//!
//! Applies the catalog in topological order:
//! catalog → DAG → plan → for each resource: codegen → transport → hash → lock → journal

use super::codegen;
use super::planner;
use super::resolver;
use super::state;
use super::types::*;
use crate::journal::{eventlog, hasher};
use crate::transport;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::time::Instant;

/// Configuration for a provisioning run.
pub struct ApplyConfig<'a> {
    pub config: &'a RigConfig,
    pub catalog: &'a IndexMap<String, Resource>,
    pub state_dir: &'a std::path::Path,
    pub force: bool,
    pub dry_run: bool,
    pub resource_filter: Option<&'a str>,
}

/// Execute the provisioning loop against the configured target.
pub fn apply(cfg: &ApplyConfig) -> Result<ApplyResult, String> {
    let start = Instant::now();
    let target = cfg.config.target.clone().unwrap_or_else(Target::local);

    // Build execution order (DAG toposort)
    let execution_order = resolver::build_execution_order(cfg.catalog)?;

    // Load existing lock and generate the plan
    let existing_lock = state::load_lock(cfg.state_dir, &target.name)?;
    let plan = planner::plan(&cfg.config.name, cfg.catalog, &execution_order, existing_lock.as_ref());

    if cfg.dry_run {
        return Ok(ApplyResult {
            target: "dry-run".to_string(),
            resources_converged: 0,
            resources_unchanged: plan.unchanged,
            resources_failed: 0,
            total_duration: start.elapsed(),
        });
    }

    let run_id = eventlog::generate_run_id();
    let mut lock = existing_lock.unwrap_or_else(|| state::new_lock(&target.name));

    log_journal(
        cfg.state_dir,
        &target.name,
        cfg.config.policy.journal,
        ProvenanceEvent::RunStarted {
            target: target.name.clone(),
            run_id: run_id.clone(),
            proberig_version: env!("CARGO_PKG_VERSION").to_string(),
        },
    );

    let mut converged = 0u32;
    let mut unchanged = 0u32;
    let mut failed = 0u32;

    let mut ctx = RecordCtx {
        lock: &mut lock,
        state_dir: cfg.state_dir,
        target_name: &target.name,
        journal: cfg.config.policy.journal,
        failure_policy: &cfg.config.policy.failure,
    };

    for change in &plan.changes {
        match apply_single_resource(cfg, change, &target, &mut ctx)? {
            ResourceOutcome::Converged => converged += 1,
            ResourceOutcome::Unchanged => unchanged += 1,
            ResourceOutcome::Skipped => {}
            ResourceOutcome::Failed { should_stop } => {
                failed += 1;
                if should_stop {
                    break;
                }
            }
        }
    }

    // Rebind lock from ctx for finalization
    let lock = ctx.lock;
    lock.generated_at = eventlog::now_iso8601();
    if cfg.config.policy.lock_file {
        state::save_lock(cfg.state_dir, lock)?;
    }

    log_journal(
        cfg.state_dir,
        &target.name,
        cfg.config.policy.journal,
        ProvenanceEvent::RunCompleted {
            target: target.name.clone(),
            run_id,
            resources_converged: converged,
            resources_unchanged: unchanged,
            resources_failed: failed,
            total_seconds: start.elapsed().as_secs_f64(),
        },
    );

    Ok(ApplyResult {
        target: target.name,
        resources_converged: converged,
        resources_unchanged: unchanged,
        resources_failed: failed,
        total_duration: start.elapsed(),
    })
}

/// Outcome of applying a single resource.
enum ResourceOutcome {
    /// Resource converged successfully.
    Converged,
    /// Resource was unchanged (NoOp, not forced).
    Unchanged,
    /// Resource was skipped (filtered out or not found).
    Skipped,
    /// Resource failed; includes whether the run stops here.
    Failed { should_stop: bool },
}

/// Shared context for recording resource outcomes.
struct RecordCtx<'a> {
    lock: &'a mut StateLock,
    state_dir: &'a std::path::Path,
    target_name: &'a str,
    journal: bool,
    failure_policy: &'a FailurePolicy,
}

/// Apply a single planned change, returning its outcome.
fn apply_single_resource(
    cfg: &ApplyConfig,
    change: &PlannedChange,
    target: &Target,
    ctx: &mut RecordCtx,
) -> Result<ResourceOutcome, String> {
    if let Some(filter) = cfg.resource_filter {
        if change.resource_id != filter {
            return Ok(ResourceOutcome::Skipped);
        }
    }

    if change.action == PlanAction::NoOp && !cfg.force {
        return Ok(ResourceOutcome::Unchanged);
    }

    let resource = match cfg.catalog.get(&change.resource_id) {
        Some(r) => r,
        None => return Ok(ResourceOutcome::Skipped),
    };

    if ctx.journal {
        let _ = eventlog::append_event(
            ctx.state_dir,
            ctx.target_name,
            ProvenanceEvent::ResourceStarted {
                target: ctx.target_name.to_string(),
                resource: change.resource_id.clone(),
                action: change.action.to_string(),
            },
        );
    }

    let resource_start = Instant::now();

    // Generate apply script and execute
    let script = match codegen::apply_script(resource) {
        Ok(s) => s,
        Err(e) => {
            let should_stop =
                record_failure(ctx, &change.resource_id, &resource.kind, 0.0, &e);
            return Ok(ResourceOutcome::Failed { should_stop });
        }
    };
    let output = transport::exec_script(target, &script);
    let duration = resource_start.elapsed().as_secs_f64();

    match output {
        Ok(out) if out.success() => {
            record_success(ctx, &change.resource_id, resource, target, duration);
            Ok(ResourceOutcome::Converged)
        }
        Ok(out) => {
            let error = format!("exit code {}: {}", out.exit_code, out.stderr.trim());
            let should_stop =
                record_failure(ctx, &change.resource_id, &resource.kind, duration, &error);
            Ok(ResourceOutcome::Failed { should_stop })
        }
        Err(e) => {
            let error = format!("transport error: {}", e);
            let should_stop =
                record_failure(ctx, &change.resource_id, &resource.kind, duration, &error);
            Ok(ResourceOutcome::Failed { should_stop })
        }
    }
}

/// Record a successful resource application into the lock and journal.
fn record_success(
    ctx: &mut RecordCtx,
    resource_id: &str,
    resource: &Resource,
    target: &Target,
    duration: f64,
) {
    let desired_hash = planner::hash_desired_state(resource);

    // Live state hash for drift detection
    let live_hash = match codegen::state_query_script(resource) {
        Ok(query) => match transport::exec_script(target, &query) {
            Ok(qout) if qout.success() => Some(hasher::hash_string(&qout.stdout)),
            _ => None,
        },
        Err(_) => None,
    };

    let mut details = build_resource_details(resource);
    if let Some(ref lh) = live_hash {
        details.insert(
            "live_hash".to_string(),
            serde_yaml_ng::Value::String(lh.clone()),
        );
    }

    ctx.lock.resources.insert(
        resource_id.to_string(),
        ResourceLock {
            kind: resource.kind.clone(),
            status: ResourceStatus::Converged,
            applied_at: Some(eventlog::now_iso8601()),
            duration_seconds: Some(duration),
            hash: desired_hash.clone(),
            details,
        },
    );

    if ctx.journal {
        let _ = eventlog::append_event(
            ctx.state_dir,
            ctx.target_name,
            ProvenanceEvent::ResourceConverged {
                target: ctx.target_name.to_string(),
                resource: resource_id.to_string(),
                duration_seconds: duration,
                hash: desired_hash,
            },
        );
    }
}

/// Record a resource failure into the lock and journal.
/// Returns true when the failure policy stops the run.
fn record_failure(
    ctx: &mut RecordCtx,
    resource_id: &str,
    kind: &ResourceKind,
    duration: f64,
    error: &str,
) -> bool {
    ctx.lock.resources.insert(
        resource_id.to_string(),
        ResourceLock {
            kind: kind.clone(),
            status: ResourceStatus::Failed,
            applied_at: Some(eventlog::now_iso8601()),
            duration_seconds: Some(duration),
            hash: String::new(),
            details: HashMap::new(),
        },
    );

    if ctx.journal {
        let _ = eventlog::append_event(
            ctx.state_dir,
            ctx.target_name,
            ProvenanceEvent::ResourceFailed {
                target: ctx.target_name.to_string(),
                resource: resource_id.to_string(),
                error: error.to_string(),
            },
        );
    }

    if *ctx.failure_policy == FailurePolicy::StopOnFirst {
        eprintln!(
            "STOP: failure on {}/{}: {}",
            ctx.target_name, resource_id, error
        );
        return true;
    }

    false
}

/// Log a journal event if the journal is enabled.
fn log_journal(
    state_dir: &std::path::Path,
    target: &str,
    journal: bool,
    event: ProvenanceEvent,
) {
    if journal {
        let _ = eventlog::append_event(state_dir, target, event);
    }
}

/// Build resource-specific details for the lock entry.
fn build_resource_details(resource: &Resource) -> HashMap<String, serde_yaml_ng::Value> {
    let mut details = HashMap::new();

    if let Some(ref path) = resource.path {
        details.insert(
            "path".to_string(),
            serde_yaml_ng::Value::String(path.clone()),
        );
    }
    if let Some(ref content) = resource.content {
        let hash = hasher::hash_string(content);
        details.insert(
            "content_hash".to_string(),
            serde_yaml_ng::Value::String(hash),
        );
    } else if let Some(ref content_hash) = resource.content_hash {
        details.insert(
            "content_hash".to_string(),
            serde_yaml_ng::Value::String(content_hash.clone()),
        );
    }
    if let Some(ref mode) = resource.mode {
        details.insert(
            "mode".to_string(),
            serde_yaml_ng::Value::String(mode.clone()),
        );
    }
    if let Some(ref name) = resource.name {
        details.insert(
            "object_name".to_string(),
            serde_yaml_ng::Value::String(name.clone()),
        );
    }
    if let Some(ref image) = resource.image {
        details.insert(
            "image".to_string(),
            serde_yaml_ng::Value::String(image.clone()),
        );
    }
    if !resource.packages.is_empty() {
        details.insert(
            "packages".to_string(),
            serde_yaml_ng::Value::String(resource.packages.join(",")),
        );
    }

    details
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_config;

    fn local_config() -> RigConfig {
        parse_config(
            r#"
version: "1.0"
name: rig-test
assets_dir: /tmp
"#,
        )
        .unwrap()
    }

    fn file_catalog(path: &std::path::Path, content: &str) -> IndexMap<String, Resource> {
        let mut r = Resource::new(ResourceKind::File);
        r.path = Some(path.to_string_lossy().to_string());
        r.content = Some(content.to_string());
        let mut catalog = IndexMap::new();
        catalog.insert("probe-file".to_string(), r);
        catalog
    }

    #[test]
    fn test_rg017_dry_run() {
        let config = local_config();
        let scratch = tempfile::tempdir().unwrap();
        let catalog = file_catalog(&scratch.path().join("out.txt"), "hello");
        let state = tempfile::tempdir().unwrap();

        let cfg = ApplyConfig {
            config: &config,
            catalog: &catalog,
            state_dir: state.path(),
            force: false,
            dry_run: true,
            resource_filter: None,
        };
        let result = apply(&cfg).unwrap();
        assert_eq!(result.target, "dry-run");
        assert!(!scratch.path().join("out.txt").exists());
    }

    #[test]
    fn test_rg017_apply_local_file() {
        let config = local_config();
        let scratch = tempfile::tempdir().unwrap();
        let out = scratch.path().join("out.txt");
        let catalog = file_catalog(&out, "hello from the rig");
        let state = tempfile::tempdir().unwrap();

        let cfg = ApplyConfig {
            config: &config,
            catalog: &catalog,
            state_dir: state.path(),
            force: false,
            dry_run: false,
            resource_filter: None,
        };
        let result = apply(&cfg).unwrap();
        assert_eq!(result.resources_converged, 1);
        assert_eq!(result.resources_failed, 0);

        // The file was actually written through the transport
        let written = std::fs::read_to_string(&out).unwrap();
        assert_eq!(written.trim_end(), "hello from the rig");

        // Lock was saved, journal exists
        let lock = state::load_lock(state.path(), "local").unwrap();
        assert!(lock.is_some());
        assert!(state.path().join("local").join("events.jsonl").exists());
    }

    #[test]
    fn test_rg017_apply_idempotent() {
        let config = local_config();
        let scratch = tempfile::tempdir().unwrap();
        let catalog = file_catalog(&scratch.path().join("out.txt"), "same");
        let state = tempfile::tempdir().unwrap();

        let cfg = ApplyConfig {
            config: &config,
            catalog: &catalog,
            state_dir: state.path(),
            force: false,
            dry_run: false,
            resource_filter: None,
        };
        let r1 = apply(&cfg).unwrap();
        assert_eq!(r1.resources_converged, 1);

        let r2 = apply(&cfg).unwrap();
        assert_eq!(r2.resources_unchanged, 1);
        assert_eq!(r2.resources_converged, 0);
        assert_eq!(r2.resources_failed, 0);
    }

    #[test]
    fn test_rg017_force_reapply() {
        let config = local_config();
        let scratch = tempfile::tempdir().unwrap();
        let catalog = file_catalog(&scratch.path().join("out.txt"), "force");
        let state = tempfile::tempdir().unwrap();

        let cfg = ApplyConfig {
            config: &config,
            catalog: &catalog,
            state_dir: state.path(),
            force: false,
            dry_run: false,
            resource_filter: None,
        };
        apply(&cfg).unwrap();

        let cfg2 = ApplyConfig { force: true, ..cfg };
        let r2 = apply(&cfg2).unwrap();
        assert_eq!(r2.resources_converged, 1);
    }

    #[test]
    fn test_rg017_resource_filter() {
        let config = local_config();
        let scratch = tempfile::tempdir().unwrap();
        let catalog = file_catalog(&scratch.path().join("out.txt"), "filtered");
        let state = tempfile::tempdir().unwrap();

        let cfg = ApplyConfig {
            config: &config,
            catalog: &catalog,
            state_dir: state.path(),
            force: false,
            dry_run: false,
            resource_filter: Some("nonexistent-resource"),
        };
        let result = apply(&cfg).unwrap();
        assert_eq!(result.resources_converged, 0);
        assert_eq!(result.resources_unchanged, 0);
        assert!(!scratch.path().join("out.txt").exists());
    }

    #[test]
    fn test_rg017_record_failure_stop_on_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut lock = state::new_lock("local");
        let mut ctx = RecordCtx {
            lock: &mut lock,
            state_dir: dir.path(),
            target_name: "local",
            journal: true,
            failure_policy: &FailurePolicy::StopOnFirst,
        };

        let should_stop = record_failure(
            &mut ctx,
            "docker-engine",
            &ResourceKind::DockerEngine,
            0.5,
            "exit code 1: no route to registry",
        );

        assert!(should_stop, "StopOnFirst should return true");
        let rl = &ctx.lock.resources["docker-engine"];
        assert_eq!(rl.status, ResourceStatus::Failed);
        assert_eq!(rl.hash, "");

        // Journal received the failure
        let events =
            std::fs::read_to_string(dir.path().join("local").join("events.jsonl")).unwrap();
        assert!(events.contains("resource_failed"));
        assert!(events.contains("docker-engine"));
    }

    #[test]
    fn test_rg017_record_failure_continue() {
        let dir = tempfile::tempdir().unwrap();
        let mut lock = state::new_lock("local");
        let mut ctx = RecordCtx {
            lock: &mut lock,
            state_dir: dir.path(),
            target_name: "local",
            journal: false,
            failure_policy: &FailurePolicy::ContinueIndependent,
        };

        let should_stop = record_failure(
            &mut ctx,
            "kmod-veth",
            &ResourceKind::KernelModule,
            1.0,
            "exit code 1: module not found",
        );

        assert!(!should_stop, "Continue policy should return false");
        assert_eq!(ctx.lock.resources["kmod-veth"].status, ResourceStatus::Failed);
    }

    #[test]
    fn test_rg017_failed_apply_halts_run() {
        let config = local_config();
        let state = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();

        // First resource fails (staged asset missing), second would succeed
        let mut broken = Resource::new(ResourceKind::StagedFile);
        broken.source = Some("/nonexistent/asset".to_string());
        broken.path = Some(scratch.path().join("staged").to_string_lossy().to_string());

        let mut ok = Resource::new(ResourceKind::File);
        ok.path = Some(scratch.path().join("later.txt").to_string_lossy().to_string());
        ok.content = Some("later".to_string());
        ok.depends_on = vec!["broken-stage".to_string()];

        let mut catalog = IndexMap::new();
        catalog.insert("broken-stage".to_string(), broken);
        catalog.insert("after".to_string(), ok);

        let cfg = ApplyConfig {
            config: &config,
            catalog: &catalog,
            state_dir: state.path(),
            force: false,
            dry_run: false,
            resource_filter: None,
        };
        let result = apply(&cfg).unwrap();
        assert_eq!(result.resources_failed, 1);
        assert_eq!(result.resources_converged, 0);
        assert!(!scratch.path().join("later.txt").exists());
    }

    #[test]
    fn test_rg017_build_resource_details() {
        let mut r = Resource::new(ResourceKind::StagedFile);
        r.path = Some("/tmp/security-agent/testsuite".to_string());
        r.mode = Some("755".to_string());
        r.content_hash = Some("blake3:abc".to_string());
        let details = build_resource_details(&r);
        assert!(details.contains_key("path"));
        assert!(details.contains_key("mode"));
        assert_eq!(
            details["content_hash"],
            serde_yaml_ng::Value::String("blake3:abc".to_string())
        );
    }

    #[test]
    fn test_rg017_build_details_container() {
        let mut r = Resource::new(ResourceKind::DockerContainer);
        r.name = Some("docker-testsuite".to_string());
        r.image = Some("testsuite-img:latest".to_string());
        let details = build_resource_details(&r);
        assert_eq!(
            details["object_name"],
            serde_yaml_ng::Value::String("docker-testsuite".to_string())
        );
        assert!(details.contains_key("image"));
    }
}
