//! RG-001: All types from the proberig specification.
//!
//! Defines the YAML schema for the rig config, the resource catalog entries,
//! state locks, and provenance events. All persisted types derive
//! Serialize/Deserialize for YAML/JSON roundtripping.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Top-level proberig.yaml
// ============================================================================

/// Root configuration — where the test assets live and how the rig is wired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Human-readable rig name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Directory holding testsuite, clang-bpf, llc-bpf, nikos.tar.gz, ebpf_bytecode/
    pub assets_dir: String,

    /// Staging directory on the target
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    /// Agent embedded root on the target
    #[serde(default = "default_embedded_dir")]
    pub embedded_dir: String,

    /// Directory for harness bookkeeping files
    #[serde(default = "default_tests_dir")]
    pub tests_dir: String,

    /// Harness color index written to <tests_dir>/color_idx
    #[serde(default)]
    pub color_idx: u32,

    /// Swap file settings
    #[serde(default)]
    pub swap: SwapConfig,

    /// Container pipeline settings
    #[serde(default)]
    pub container: ContainerConfig,

    /// Override detected platform facts
    #[serde(default)]
    pub platform: Option<PlatformOverride>,

    /// Remote target; local host when absent
    #[serde(default)]
    pub target: Option<Target>,

    /// Execution policy
    #[serde(default)]
    pub policy: Policy,
}

fn default_work_dir() -> String {
    "/tmp/security-agent".to_string()
}

fn default_embedded_dir() -> String {
    "/opt/datadog-agent/embedded".to_string()
}

fn default_tests_dir() -> String {
    "/tmp/system-probe-tests".to_string()
}

/// Swap file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
    #[serde(default = "default_swap_path")]
    pub path: String,

    #[serde(default = "default_swap_size")]
    pub size_mb: u64,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            path: default_swap_path(),
            size_mb: default_swap_size(),
        }
    }
}

// `/swapfile` doesn't work on Oracle Linux, so the default lives under /mnt.
fn default_swap_path() -> String {
    "/mnt/swapfile".to_string()
}

fn default_swap_size() -> u64 {
    2048
}

/// Container pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(default = "default_image")]
    pub image: String,

    #[serde(default = "default_tag")]
    pub tag: String,

    #[serde(default = "default_container_name")]
    pub name: String,

    /// Pinned base image for the generated Dockerfile
    #[serde(default = "default_base_image")]
    pub base_image: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            tag: default_tag(),
            name: default_container_name(),
            base_image: default_base_image(),
        }
    }
}

fn default_image() -> String {
    "testsuite-img".to_string()
}

fn default_tag() -> String {
    "latest".to_string()
}

fn default_container_name() -> String {
    "docker-testsuite".to_string()
}

fn default_base_image() -> String {
    "ghcr.io/paulcacheux/cws-centos7@sha256:4fc1aac178b5c1690ce71c37f22b8a23cedfb969c7056702c21be50e848e554f"
        .to_string()
}

/// Platform fact overrides for boxes whose os-release metadata is wrong.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformOverride {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub family: Option<String>,

    #[serde(default)]
    pub version: Option<String>,
}

// ============================================================================
// Target
// ============================================================================

/// The machine being provisioned (local host or a lab box over SSH).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Target name (used for state/journal paths)
    #[serde(default = "default_target_name")]
    pub name: String,

    /// Network address (IP or DNS)
    pub addr: String,

    /// SSH user
    #[serde(default = "default_user")]
    pub user: String,

    /// Path to SSH private key
    #[serde(default)]
    pub ssh_key: Option<String>,
}

impl Target {
    /// The implicit local target used when the config names no remote.
    pub fn local() -> Self {
        Self {
            name: default_target_name(),
            addr: "127.0.0.1".to_string(),
            user: "root".to_string(),
            ssh_key: None,
        }
    }
}

fn default_target_name() -> String {
    "local".to_string()
}

fn default_user() -> String {
    "root".to_string()
}

// ============================================================================
// Resources
// ============================================================================

/// A single provisioning resource in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Resource kind
    pub kind: ResourceKind,

    /// Resource state (present/absent/directory/etc.)
    #[serde(default)]
    pub state: Option<String>,

    /// Catalog IDs that must converge before this resource
    #[serde(default)]
    pub depends_on: Vec<String>,

    // -- Package fields --
    /// Package provider (apt, dnf, yum, zypper)
    #[serde(default)]
    pub provider: Option<String>,

    /// Package list
    #[serde(default)]
    pub packages: Vec<String>,

    // -- Path fields --
    /// Target path (file, directory, mount point, archive destination)
    #[serde(default)]
    pub path: Option<String>,

    /// Inline file content
    #[serde(default)]
    pub content: Option<String>,

    /// Source path — local asset for staging, on-target tarball for archives
    #[serde(default)]
    pub source: Option<String>,

    /// File mode (e.g., "0744")
    #[serde(default)]
    pub mode: Option<String>,

    /// File owner
    #[serde(default)]
    pub owner: Option<String>,

    /// Named OS object (kernel module, service, container, engine package)
    #[serde(default)]
    pub name: Option<String>,

    /// Size in MiB (swap file, tmpfs floor)
    #[serde(default)]
    pub size_mb: Option<u64>,

    /// BLAKE3 of the staged asset or inline content, computed at catalog build
    #[serde(default)]
    pub content_hash: Option<String>,

    // -- Container fields --
    /// Image reference (repo:tag)
    #[serde(default)]
    pub image: Option<String>,

    /// Docker build context directory on the target
    #[serde(default)]
    pub build_dir: Option<String>,

    /// Capabilities added to the container
    #[serde(default)]
    pub caps: Vec<String>,

    /// Bind mounts (host:container)
    #[serde(default)]
    pub volumes: Vec<String>,

    /// Environment entries (KEY=value)
    #[serde(default)]
    pub env: Vec<String>,

    /// Run the container privileged
    #[serde(default)]
    pub privileged: bool,

    /// Exec argv inside the container
    #[serde(default)]
    pub command: Vec<String>,

    /// Exec tolerates already-exists failures
    #[serde(default)]
    pub tolerate_existing: bool,

    /// Docker engine install goes through the vendor repo
    #[serde(default)]
    pub setup_repo: bool,
}

impl Resource {
    /// A resource of the given kind with every other field empty.
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            state: None,
            depends_on: Vec::new(),
            provider: None,
            packages: Vec::new(),
            path: None,
            content: None,
            source: None,
            mode: None,
            owner: None,
            name: None,
            size_mb: None,
            content_hash: None,
            image: None,
            build_dir: None,
            caps: Vec::new(),
            volumes: Vec::new(),
            env: Vec::new(),
            privileged: false,
            command: Vec::new(),
            tolerate_existing: false,
            setup_repo: false,
        }
    }
}

/// Resource kind enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Package,
    File,
    StagedFile,
    StagedTree,
    Archive,
    SwapFile,
    KernelModule,
    TmpfsRemount,
    DockerEngine,
    DockerImage,
    DockerContainer,
    DockerExec,
    Selinux,
    Lockdown,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Package => write!(f, "package"),
            Self::File => write!(f, "file"),
            Self::StagedFile => write!(f, "staged_file"),
            Self::StagedTree => write!(f, "staged_tree"),
            Self::Archive => write!(f, "archive"),
            Self::SwapFile => write!(f, "swap_file"),
            Self::KernelModule => write!(f, "kernel_module"),
            Self::TmpfsRemount => write!(f, "tmpfs_remount"),
            Self::DockerEngine => write!(f, "docker_engine"),
            Self::DockerImage => write!(f, "docker_image"),
            Self::DockerContainer => write!(f, "docker_container"),
            Self::DockerExec => write!(f, "docker_exec"),
            Self::Selinux => write!(f, "selinux"),
            Self::Lockdown => write!(f, "lockdown"),
        }
    }
}

// ============================================================================
// Policy
// ============================================================================

/// Execution policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Failure handling
    #[serde(default)]
    pub failure: FailurePolicy,

    /// Append provenance events on every run
    #[serde(default = "default_true")]
    pub journal: bool,

    /// Persist BLAKE3 state after provisioning
    #[serde(default = "default_true")]
    pub lock_file: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            failure: FailurePolicy::default(),
            journal: true,
            lock_file: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Failure handling strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    StopOnFirst,
    ContinueIndependent,
}

// ============================================================================
// State / Lock file
// ============================================================================

/// Per-target state lock file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateLock {
    /// Schema version
    pub schema: String,

    /// Target name
    pub target: String,

    /// When the lock was generated
    pub generated_at: String,

    /// Generator version
    pub generator: String,

    /// BLAKE3 version
    pub blake3_version: String,

    /// Per-resource state
    pub resources: IndexMap<String, ResourceLock>,
}

/// Per-resource lock entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLock {
    /// Resource kind
    pub kind: ResourceKind,

    /// Convergence status
    pub status: ResourceStatus,

    /// When the resource was last applied
    #[serde(default)]
    pub applied_at: Option<String>,

    /// Duration of last apply in seconds
    #[serde(default)]
    pub duration_seconds: Option<f64>,

    /// BLAKE3 hash of the resource's desired state
    pub hash: String,

    /// Resource-specific details
    #[serde(default)]
    pub details: HashMap<String, serde_yaml_ng::Value>,
}

/// Resource convergence status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Converged,
    Failed,
    Drifted,
    Unknown,
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged => write!(f, "CONVERGED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Drifted => write!(f, "DRIFTED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Action to take on a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    Update,
    NoOp,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
            Self::NoOp => write!(f, "NO-OP"),
        }
    }
}

/// A single planned change.
#[derive(Debug, Clone)]
pub struct PlannedChange {
    /// Catalog ID
    pub resource_id: String,

    /// Resource kind
    pub kind: ResourceKind,

    /// Action to take
    pub action: PlanAction,

    /// Human-readable description
    pub description: String,
}

/// Full execution plan.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Config name
    pub name: String,

    /// Planned changes in execution order
    pub changes: Vec<PlannedChange>,

    /// Topological execution order (catalog IDs)
    pub execution_order: Vec<String>,

    /// Summary counts
    pub to_create: u32,
    pub to_update: u32,
    pub unchanged: u32,
}

// ============================================================================
// Provenance events
// ============================================================================

/// Provenance event for the JSONL journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    RunStarted {
        target: String,
        run_id: String,
        proberig_version: String,
    },
    ResourceStarted {
        target: String,
        resource: String,
        action: String,
    },
    ResourceConverged {
        target: String,
        resource: String,
        duration_seconds: f64,
        hash: String,
    },
    ResourceFailed {
        target: String,
        resource: String,
        error: String,
    },
    RunCompleted {
        target: String,
        run_id: String,
        resources_converged: u32,
        resources_unchanged: u32,
        resources_failed: u32,
        total_seconds: f64,
    },
    CheckFailed {
        target: String,
        check: String,
        detail: String,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: ProvenanceEvent,
}

// ============================================================================
// Apply result
// ============================================================================

/// Result of provisioning a target.
#[derive(Debug, Clone)]
pub struct ApplyResult {
    pub target: String,
    pub resources_converged: u32,
    pub resources_unchanged: u32,
    pub resources_failed: u32,
    pub total_duration: std::time::Duration,
}

// ============================================================================
// Tests
// ============================================================================
