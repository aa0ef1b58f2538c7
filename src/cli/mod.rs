//! RG-024: CLI subcommands — plan, provision, verify, status, init, validate, facts.

use crate::core::platform::Platform;
use crate::core::types::{ProvenanceEvent, Resource, RigConfig, Target};
use crate::core::{catalog, executor, parser, planner, resolver, state, types};
use crate::journal::eventlog;
use crate::verify;
use clap::{CommandFactory, Parser, Subcommand};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "proberig",
    version,
    about = "Provisions kernel-instrumentation test environments — idempotent resources, BLAKE3 state, provenance journal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new proberig project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show detected platform facts
    Facts {
        /// Path to proberig.yaml (overrides applied when present)
        #[arg(short, long, default_value = "proberig.yaml")]
        file: PathBuf,
    },

    /// Validate proberig.yaml without touching the target
    Validate {
        /// Path to proberig.yaml
        #[arg(short, long, default_value = "proberig.yaml")]
        file: PathBuf,
    },

    /// Show the provisioning plan (diff desired vs current)
    Plan {
        /// Path to proberig.yaml
        #[arg(short, long, default_value = "proberig.yaml")]
        file: PathBuf,

        /// Target specific resource
        #[arg(short, long)]
        resource: Option<String>,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,
    },

    /// Converge the target to the provisioned state
    Provision {
        /// Path to proberig.yaml
        #[arg(short, long, default_value = "proberig.yaml")]
        file: PathBuf,

        /// Target specific resource
        #[arg(short, long)]
        resource: Option<String>,

        /// Harness color index (overrides the config value)
        #[arg(long)]
        color_idx: Option<u32>,

        /// Force re-apply all resources
        #[arg(long)]
        force: bool,

        /// Show what would be executed without running
        #[arg(long)]
        dry_run: bool,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,
    },

    /// Assert the provisioned environment state and detect drift
    Verify {
        /// Path to proberig.yaml
        #[arg(short, long, default_value = "proberig.yaml")]
        file: PathBuf,

        /// Exit non-zero on any failed assertion (for CI/cron)
        #[arg(long)]
        strict: bool,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,
    },

    /// Show current state from lock files
    Status {
        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate for
        shell: clap_complete::Shell,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Facts { file } => cmd_facts(&file),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Plan {
            file,
            resource,
            state_dir,
        } => cmd_plan(&file, &state_dir, resource.as_deref()),
        Commands::Provision {
            file,
            resource,
            color_idx,
            force,
            dry_run,
            state_dir,
        } => cmd_provision(&file, &state_dir, resource.as_deref(), color_idx, force, dry_run),
        Commands::Verify {
            file,
            strict,
            state_dir,
        } => cmd_verify(&file, &state_dir, strict),
        Commands::Status { state_dir } => cmd_status(&state_dir),
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "proberig",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join("proberig.yaml");
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }

    let state_dir = path.join("state");
    std::fs::create_dir_all(&state_dir).map_err(|e| format!("cannot create state dir: {}", e))?;

    let template = r#"version: "1.0"
name: kernel-testsuite-rig
description: "Managed by proberig"

# Directory holding testsuite, clang-bpf, llc-bpf, nikos.tar.gz, ebpf_bytecode/
assets_dir: /opt/rig-assets

color_idx: 0

policy:
  failure: stop_on_first
  journal: true
  lock_file: true
"#;
    std::fs::write(&config_path, template)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;

    println!("Initialized proberig project at {}", path.display());
    println!("  Created: {}", config_path.display());
    println!("  Created: {}/", state_dir.display());
    Ok(())
}

fn cmd_facts(file: &Path) -> Result<(), String> {
    let platform = detect_platform(file);
    println!("Platform: {}", platform);
    println!("  package provider:   {}", platform.package_provider());
    println!("  container pipeline: {}", platform.uses_host_containers());
    println!("  selinux handling:   {}", platform.is_rpm_family());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let config = parser::parse_config_file(file)?;
    let errors = parser::validate_config(&config);

    if errors.is_empty() {
        println!(
            "OK: {} (assets: {}, target: {})",
            config.name,
            config.assets_dir,
            config
                .target
                .as_ref()
                .map(|t| t.name.as_str())
                .unwrap_or("local")
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

fn cmd_plan(file: &Path, state_dir: &Path, _resource_filter: Option<&str>) -> Result<(), String> {
    let (config, platform, rig_catalog) = load_rig(file, None)?;
    let target = config.target.clone().unwrap_or_else(Target::local);

    if platform.is_windows() {
        println!("Platform family is windows — nothing to provision.");
        return Ok(());
    }

    let execution_order = resolver::build_execution_order(&rig_catalog)?;
    let lock = if state_dir.exists() {
        state::load_lock(state_dir, &target.name)?
    } else {
        None
    };
    let plan = planner::plan(&config.name, &rig_catalog, &execution_order, lock.as_ref());

    print_plan(&plan, &target.name);
    Ok(())
}

fn cmd_provision(
    file: &Path,
    state_dir: &Path,
    resource_filter: Option<&str>,
    color_idx: Option<u32>,
    force: bool,
    dry_run: bool,
) -> Result<(), String> {
    let (config, platform, rig_catalog) = load_rig(file, color_idx)?;

    if platform.is_windows() {
        println!("Platform family is windows — nothing to provision.");
        return Ok(());
    }

    let cfg = executor::ApplyConfig {
        config: &config,
        catalog: &rig_catalog,
        state_dir,
        force,
        dry_run,
        resource_filter,
    };

    let result = executor::apply(&cfg)?;

    if dry_run {
        println!("Dry run — no changes applied.");
        return Ok(());
    }

    println!(
        "{}: {} converged, {} unchanged, {} failed ({:.1}s)",
        result.target,
        result.resources_converged,
        result.resources_unchanged,
        result.resources_failed,
        result.total_duration.as_secs_f64()
    );

    if result.resources_failed > 0 {
        return Err(format!("{} resource(s) failed", result.resources_failed));
    }

    println!(
        "Provisioning complete: {} converged, {} unchanged.",
        result.resources_converged, result.resources_unchanged
    );
    Ok(())
}

fn cmd_verify(file: &Path, state_dir: &Path, strict: bool) -> Result<(), String> {
    let (config, platform, rig_catalog) = load_rig(file, None)?;
    let target = config.target.clone().unwrap_or_else(Target::local);

    let findings = verify::run_checks(&config, &platform, &target)?;

    if findings.is_empty() {
        println!("All environment checks passed.");
    } else {
        for f in &findings {
            println!("  FAILED: {} ({})", f.check, f.detail);
            if config.policy.journal {
                let _ = eventlog::append_event(
                    state_dir,
                    &target.name,
                    ProvenanceEvent::CheckFailed {
                        target: target.name.clone(),
                        check: f.check.clone(),
                        detail: f.detail.clone(),
                    },
                );
            }
        }
    }

    // Drift against the last provisioning run, when one exists
    let mut drifted = 0;
    if let Some(lock) = state::load_lock(state_dir, &target.name)? {
        let drift = verify::detect_drift(&rig_catalog, &lock, &target);
        for d in &drift {
            println!("  DRIFTED: {}", d.resource_id);
            println!("    Expected: {}", d.expected_hash);
            println!("    Actual:   {}", d.actual_hash);
        }
        drifted = drift.len();
    }

    if !findings.is_empty() || drifted > 0 {
        println!();
        println!(
            "Verification: {} failed check(s), {} drifted resource(s)",
            findings.len(),
            drifted
        );
        if strict {
            return Err(format!(
                "{} finding(s) in strict mode",
                findings.len() + drifted
            ));
        }
    }

    Ok(())
}

fn cmd_status(state_dir: &Path) -> Result<(), String> {
    let entries = std::fs::read_dir(state_dir)
        .map_err(|e| format!("cannot read state dir {}: {}", state_dir.display(), e))?;

    let mut found = false;

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if !entry.path().is_dir() {
            continue;
        }

        if let Some(lock) = state::load_lock(state_dir, &name)? {
            found = true;
            println!("Target: {}", lock.target);
            println!("  Generated: {}", lock.generated_at);
            println!("  Generator: {}", lock.generator);
            println!("  Resources: {}", lock.resources.len());

            for (id, rl) in &lock.resources {
                let duration = rl
                    .duration_seconds
                    .map(|d| format!(" ({:.2}s)", d))
                    .unwrap_or_default();
                println!("    {}: {} [{}]{}", id, rl.status, rl.kind, duration);
            }
            println!();
        }
    }

    if !found {
        println!("No state found. Run `proberig provision` first.");
    }

    Ok(())
}

/// Parse, validate, detect platform, and build the catalog.
fn load_rig(
    file: &Path,
    color_idx: Option<u32>,
) -> Result<(RigConfig, Platform, IndexMap<String, Resource>), String> {
    let mut config = parser::parse_config_file(file)?;
    let errors = parser::validate_config(&config);
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        return Err("validation failed".to_string());
    }

    if let Some(idx) = color_idx {
        config.color_idx = idx;
    }

    let mut platform = Platform::detect();
    if let Some(ref ov) = config.platform {
        platform = platform.with_override(ov);
    }

    let rig_catalog = catalog::build(&config, &platform)?;
    Ok((config, platform, rig_catalog))
}

/// Detect platform facts, applying config overrides when the file parses.
fn detect_platform(file: &Path) -> Platform {
    let mut platform = Platform::detect();
    if let Ok(config) = parser::parse_config_file(file) {
        if let Some(ref ov) = config.platform {
            platform = platform.with_override(ov);
        }
    }
    platform
}

/// Display a plan to stdout.
fn print_plan(plan: &types::ExecutionPlan, target: &str) {
    println!("Planning: {} ({} resources)", plan.name, plan.changes.len());
    println!();
    println!("{}:", target);

    for change in &plan.changes {
        let symbol = match change.action {
            types::PlanAction::Create => "+",
            types::PlanAction::Update => "~",
            types::PlanAction::NoOp => " ",
        };
        println!("  {} {}", symbol, change.description);
    }

    println!();
    println!(
        "Plan: {} to add, {} to change, {} unchanged.",
        plan.to_create, plan.to_update, plan.unchanged
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(dir: &Path) -> PathBuf {
        std::fs::write(dir.join("testsuite"), b"suite").unwrap();
        std::fs::write(dir.join("clang-bpf"), b"clang").unwrap();
        std::fs::write(dir.join("llc-bpf"), b"llc").unwrap();
        std::fs::write(dir.join("nikos.tar.gz"), b"tarball").unwrap();
        std::fs::create_dir_all(dir.join("ebpf_bytecode")).unwrap();
        std::fs::write(dir.join("ebpf_bytecode/tracer.o"), b"obj").unwrap();

        let config_path = dir.join("proberig.yaml");
        let yaml = format!(
            "version: \"1.0\"\n\
             name: kernel-rig\n\
             assets_dir: {}\n\
             color_idx: 1\n\
             platform:\n\
             \x20 id: ubuntu\n\
             \x20 version: \"22.04\"\n",
            dir.display()
        );
        std::fs::write(&config_path, yaml).unwrap();
        config_path
    }

    #[test]
    fn test_rg024_init() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("rig-project");
        std::fs::create_dir_all(&sub).unwrap();
        cmd_init(&sub).unwrap();
        assert!(sub.join("proberig.yaml").exists());
        assert!(sub.join("state").is_dir());

        // The template parses and validates
        let config = parser::parse_config_file(&sub.join("proberig.yaml")).unwrap();
        assert!(parser::validate_config(&config).is_empty());
    }

    #[test]
    fn test_rg024_init_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("proberig.yaml"), "exists").unwrap();
        let result = cmd_init(dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_rg024_validate_valid() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_fixture(dir.path());
        assert!(cmd_validate(&config_path).is_ok());
    }

    #[test]
    fn test_rg024_validate_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("proberig.yaml");
        std::fs::write(&config_path, "version: \"9.9\"\nname: rig\nassets_dir: relative\n")
            .unwrap();
        let result = cmd_validate(&config_path);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("validation error"));
    }

    #[test]
    fn test_rg024_load_rig_builds_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_fixture(dir.path());
        let (config, platform, rig_catalog) = load_rig(&config_path, None).unwrap();

        assert_eq!(config.color_idx, 1);
        assert_eq!(platform.id, "ubuntu");
        assert!(rig_catalog.contains_key("testsuite-container"));
        assert!(rig_catalog.contains_key("kernel-lockdown"));
    }

    #[test]
    fn test_rg024_load_rig_color_override() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_fixture(dir.path());
        let (config, _, rig_catalog) = load_rig(&config_path, Some(6)).unwrap();

        assert_eq!(config.color_idx, 6);
        assert_eq!(rig_catalog["color-idx"].content.as_deref(), Some("6"));
    }

    #[test]
    fn test_rg024_plan_runs() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_fixture(dir.path());
        let state_dir = dir.path().join("state");
        assert!(cmd_plan(&config_path, &state_dir, None).is_ok());
    }

    #[test]
    fn test_rg024_provision_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_fixture(dir.path());
        let state_dir = dir.path().join("state");
        assert!(cmd_provision(&config_path, &state_dir, None, None, false, true).is_ok());
        // Dry run leaves no state behind
        assert!(state::load_lock(&state_dir, "local").unwrap().is_none());
    }

    #[test]
    fn test_rg024_status_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(cmd_status(dir.path()).is_ok());
    }

    #[test]
    fn test_rg024_status_missing_dir() {
        assert!(cmd_status(Path::new("/nonexistent/state-dir")).is_err());
    }
}
