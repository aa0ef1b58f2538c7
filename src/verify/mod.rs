//! RG-023: Post-provision verification — environment assertions and drift.
//!
//! Re-reads the provisioned environment through the transport and asserts
//! the end state the testsuite depends on: staged binaries with the right
//! modes, the extracted toolchain, swap, kernel modules, the privileged
//! container wiring, SELinux mode, and kernel lockdown. Also compares the
//! live state of locked resources against the hashes recorded at apply time.

use crate::core::codegen;
use crate::core::platform::Platform;
use crate::core::types::{Resource, ResourceStatus, RigConfig, StateLock, Target};
use crate::journal::hasher;
use crate::resources::kernel;
use crate::transport;
use indexmap::IndexMap;

/// A failed environment assertion.
#[derive(Debug, Clone)]
pub struct CheckFinding {
    pub check: String,
    pub detail: String,
}

/// A resource whose live state no longer matches its lock hash.
#[derive(Debug, Clone)]
pub struct DriftFinding {
    pub resource_id: String,
    pub expected_hash: String,
    pub actual_hash: String,
}

/// Run every environment assertion that applies to the platform.
/// Returns the failed checks (empty = the rig is sound).
pub fn run_checks(
    config: &RigConfig,
    platform: &Platform,
    target: &Target,
) -> Result<Vec<CheckFinding>, String> {
    let mut findings = Vec::new();

    if platform.is_windows() {
        return Ok(findings);
    }

    let work_dir = config.work_dir.trim_end_matches('/');
    let embedded_dir = config.embedded_dir.trim_end_matches('/');
    let tests_dir = config.tests_dir.trim_end_matches('/');

    // Staged binaries and their modes
    for (label, path, want) in [
        ("testsuite-mode", format!("{}/testsuite", work_dir), "755"),
        ("clang-bpf-mode", format!("{}/bin/clang-bpf", embedded_dir), "744"),
        ("llc-bpf-mode", format!("{}/bin/llc-bpf", embedded_dir), "744"),
    ] {
        let observed = observe(target, &format!("stat -c '%a' '{}' 2>/dev/null || echo 'MISSING'", path))?;
        if let Some(f) = eval_mode(label, &path, &observed, want) {
            findings.push(f);
        }
    }

    // Extracted toolchain
    let nikos_dir = format!("{}/nikos/embedded", embedded_dir);
    let observed = observe(
        target,
        &format!("ls -A '{}' 2>/dev/null | head -1", nikos_dir),
    )?;
    if let Some(f) = eval_nonempty("nikos-extracted", &nikos_dir, &observed) {
        findings.push(f);
    }

    // Swap and kernel modules
    let observed = observe(
        target,
        &format!("grep '{}' /proc/swaps 2>/dev/null || echo 'INACTIVE'", config.swap.path),
    )?;
    if let Some(f) = eval_swap(&config.swap.path, &observed) {
        findings.push(f);
    }

    for module in ["loop", "veth"] {
        let observed = observe(
            target,
            &format!("lsmod | grep '^{}\\b' 2>/dev/null || echo 'UNLOADED'", module),
        )?;
        if let Some(f) = eval_module(module, &observed) {
            findings.push(f);
        }
    }

    // Container wiring
    if platform.uses_host_containers() {
        let name = &config.container.name;

        let observed = observe(
            target,
            &format!(
                "docker container inspect -f '{{{{.State.Running}}}} {{{{.HostConfig.Privileged}}}}' '{}' 2>/dev/null || echo 'MISSING'",
                name
            ),
        )?;
        if let Some(f) = eval_container_running(name, &observed) {
            findings.push(f);
        }

        let observed = observe(
            target,
            &format!(
                "docker container inspect -f '{{{{range .HostConfig.CapAdd}}}}{{{{.}}}} {{{{end}}}}' '{}' 2>/dev/null || echo 'MISSING'",
                name
            ),
        )?;
        if let Some(f) = eval_container_caps(name, &observed) {
            findings.push(f);
        }

        let observed = observe(
            target,
            &format!(
                "docker container inspect -f '{{{{range .Config.Env}}}}{{{{.}}}}|{{{{end}}}}' '{}' 2>/dev/null || echo 'MISSING'",
                name
            ),
        )?;
        if let Some(f) = eval_container_env(name, &observed) {
            findings.push(f);
        }
    }

    // SELinux mode
    if platform.is_rpm_family() {
        let observed = observe(target, "getenforce 2>/dev/null || echo 'UNAVAILABLE'")?;
        if let Some(f) = eval_selinux(&observed) {
            findings.push(f);
        }
    }

    // Kernel lockdown (skipped when the sysfs file is absent)
    let observed = observe(
        target,
        "cat /sys/kernel/security/lockdown 2>/dev/null || echo 'ABSENT'",
    )?;
    if let Some(f) = eval_lockdown(&observed, "integrity") {
        findings.push(f);
    }

    // Harness bookkeeping
    let color_path = format!("{}/color_idx", tests_dir);
    let observed = observe(
        target,
        &format!("cat '{}' 2>/dev/null || echo 'MISSING'", color_path),
    )?;
    if let Some(f) = eval_color_idx(&color_path, &observed, config.color_idx) {
        findings.push(f);
    }

    Ok(findings)
}

/// Compare the live state of converged resources against their lock hashes.
pub fn detect_drift(
    catalog: &IndexMap<String, Resource>,
    lock: &StateLock,
    target: &Target,
) -> Vec<DriftFinding> {
    let mut findings = Vec::new();

    for (id, rl) in &lock.resources {
        if rl.status != ResourceStatus::Converged {
            continue;
        }
        let resource = match catalog.get(id) {
            Some(r) => r,
            None => continue,
        };
        let expected = match rl.details.get("live_hash") {
            Some(serde_yaml_ng::Value::String(s)) => s.clone(),
            _ => continue,
        };

        let query = match codegen::state_query_script(resource) {
            Ok(q) => q,
            Err(_) => continue,
        };
        let actual = match transport::query(target, &query) {
            Ok(out) if out.success() => hasher::hash_string(&out.stdout),
            _ => continue,
        };

        if actual != expected {
            findings.push(DriftFinding {
                resource_id: id.clone(),
                expected_hash: expected,
                actual_hash: actual,
            });
        }
    }

    findings
}

fn observe(target: &Target, script: &str) -> Result<String, String> {
    let out = transport::query(target, script)?;
    Ok(out.stdout.trim().to_string())
}

// ----------------------------------------------------------------------------
// Assertion evaluators — pure over observed output
// ----------------------------------------------------------------------------

fn eval_mode(check: &str, path: &str, observed: &str, want: &str) -> Option<CheckFinding> {
    if observed == want {
        return None;
    }
    Some(CheckFinding {
        check: check.to_string(),
        detail: format!("{}: expected mode {}, got {}", path, want, observed),
    })
}

fn eval_nonempty(check: &str, path: &str, observed: &str) -> Option<CheckFinding> {
    if !observed.is_empty() {
        return None;
    }
    Some(CheckFinding {
        check: check.to_string(),
        detail: format!("{} is empty or missing", path),
    })
}

fn eval_swap(path: &str, observed: &str) -> Option<CheckFinding> {
    if observed.contains(path) {
        return None;
    }
    Some(CheckFinding {
        check: "swap-active".to_string(),
        detail: format!("{} not present in /proc/swaps", path),
    })
}

fn eval_module(module: &str, observed: &str) -> Option<CheckFinding> {
    if observed.starts_with(module) {
        return None;
    }
    Some(CheckFinding {
        check: format!("kmod-{}", module),
        detail: format!("kernel module {} not loaded", module),
    })
}

fn eval_container_running(name: &str, observed: &str) -> Option<CheckFinding> {
    if observed == "true true" {
        return None;
    }
    Some(CheckFinding {
        check: "container-running".to_string(),
        detail: format!("{}: expected running+privileged, got '{}'", name, observed),
    })
}

const REQUIRED_CAPS: [&str; 6] = [
    "SYS_ADMIN",
    "SYS_RESOURCE",
    "SYS_PTRACE",
    "NET_ADMIN",
    "IPC_LOCK",
    "ALL",
];

fn eval_container_caps(name: &str, observed: &str) -> Option<CheckFinding> {
    let missing: Vec<&str> = REQUIRED_CAPS
        .iter()
        .filter(|cap| !observed.split_whitespace().any(|c| c == **cap))
        .copied()
        .collect();
    if missing.is_empty() {
        return None;
    }
    Some(CheckFinding {
        check: "container-caps".to_string(),
        detail: format!("{}: missing capabilities {}", name, missing.join(", ")),
    })
}

const REQUIRED_ENV: [&str; 3] = [
    "HOST_PROC=/host/proc",
    "HOST_ETC=/host/etc",
    "HOST_SYS=/host/sys",
];

fn eval_container_env(name: &str, observed: &str) -> Option<CheckFinding> {
    let missing: Vec<&str> = REQUIRED_ENV
        .iter()
        .filter(|entry| !observed.split('|').any(|e| e == **entry))
        .copied()
        .collect();
    if missing.is_empty() {
        return None;
    }
    Some(CheckFinding {
        check: "container-env".to_string(),
        detail: format!("{}: missing environment {}", name, missing.join(", ")),
    })
}

fn eval_selinux(observed: &str) -> Option<CheckFinding> {
    if observed == "Permissive" || observed == "Disabled" {
        return None;
    }
    Some(CheckFinding {
        check: "selinux-mode".to_string(),
        detail: format!("expected Permissive, got '{}'", observed),
    })
}

fn eval_lockdown(observed: &str, want: &str) -> Option<CheckFinding> {
    if observed == "ABSENT" {
        // Kernel without lockdown support — nothing to assert
        return None;
    }
    match kernel::active_lockdown_mode(observed) {
        Some(mode) if mode == want => None,
        Some(mode) => Some(CheckFinding {
            check: "lockdown-mode".to_string(),
            detail: format!("expected {}, active mode is {}", want, mode),
        }),
        None => Some(CheckFinding {
            check: "lockdown-mode".to_string(),
            detail: format!("cannot parse lockdown state '{}'", observed),
        }),
    }
}

fn eval_color_idx(path: &str, observed: &str, want: u32) -> Option<CheckFinding> {
    if observed == want.to_string() {
        return None;
    }
    Some(CheckFinding {
        check: "color-idx".to_string(),
        detail: format!("{}: expected {}, got '{}'", path, want, observed),
    })
}
