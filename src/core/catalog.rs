//! RG-004: The provisioning catalog — ordered, platform-gated resources.
//!
//! Builds the fixed resource list that prepares a host for the
//! kernel-instrumentation testsuite: asset staging, host mutation, and the
//! conditional container pipeline. Branching happens only on platform facts;
//! ordering that matters is wired through explicit depends_on edges.

use super::platform::Platform;
use super::types::{ContainerConfig, Resource, ResourceKind, RigConfig};
use crate::journal::hasher;
use indexmap::IndexMap;
use std::path::Path;

/// Build the catalog for the given config and platform facts.
/// Returns an empty catalog on the windows family.
pub fn build(config: &RigConfig, platform: &Platform) -> Result<IndexMap<String, Resource>, String> {
    let mut catalog: IndexMap<String, Resource> = IndexMap::new();

    if platform.is_windows() {
        return Ok(catalog);
    }

    let work_dir = config.work_dir.trim_end_matches('/');
    let embedded_dir = config.embedded_dir.trim_end_matches('/');
    let tests_dir = config.tests_dir.trim_end_matches('/');
    let assets_dir = config.assets_dir.trim_end_matches('/');
    let asset = |name: &str| format!("{}/{}", assets_dir, name);

    // -- Asset staging --------------------------------------------------------

    let bytecode_src = asset("ebpf_bytecode");
    let mut bytecode = Resource::new(ResourceKind::StagedTree);
    bytecode.state = Some("tree".to_string());
    bytecode.source = Some(bytecode_src.clone());
    bytecode.path = Some(format!("{}/ebpf_bytecode", work_dir));
    bytecode.owner = Some("root".to_string());
    bytecode.content_hash = Some(
        hasher::hash_directory(Path::new(&bytecode_src))
            .map_err(|e| format!("missing asset ebpf_bytecode: {}", e))?,
    );
    catalog.insert("ebpf-bytecode".to_string(), bytecode);

    let testsuite_hash = hash_asset(&asset("testsuite"))?;
    catalog.insert(
        "testsuite".to_string(),
        staged_file(&asset("testsuite"), &format!("{}/testsuite", work_dir), "755", testsuite_hash),
    );

    let mut bin_dir = Resource::new(ResourceKind::File);
    bin_dir.state = Some("directory".to_string());
    bin_dir.path = Some(format!("{}/bin", embedded_dir));
    catalog.insert("embedded-bin-dir".to_string(), bin_dir);

    let clang_hash = hash_asset(&asset("clang-bpf"))?;
    let mut clang = staged_file(
        &asset("clang-bpf"),
        &format!("{}/bin/clang-bpf", embedded_dir),
        "0744",
        clang_hash.clone(),
    );
    clang.depends_on = vec!["embedded-bin-dir".to_string()];
    catalog.insert("clang-bpf".to_string(), clang);
    catalog.insert(
        "clang-bpf-staged".to_string(),
        staged_file(&asset("clang-bpf"), &format!("{}/clang-bpf", work_dir), "0744", clang_hash.clone()),
    );

    let llc_hash = hash_asset(&asset("llc-bpf"))?;
    let mut llc = staged_file(
        &asset("llc-bpf"),
        &format!("{}/bin/llc-bpf", embedded_dir),
        "0744",
        llc_hash.clone(),
    );
    llc.depends_on = vec!["embedded-bin-dir".to_string()];
    catalog.insert("llc-bpf".to_string(), llc);
    catalog.insert(
        "llc-bpf-staged".to_string(),
        staged_file(&asset("llc-bpf"), &format!("{}/llc-bpf", work_dir), "0744", llc_hash.clone()),
    );

    let tarball_hash = hash_asset(&asset("nikos.tar.gz"))?;
    catalog.insert(
        "nikos-tarball".to_string(),
        staged_file(
            &asset("nikos.tar.gz"),
            &format!("{}/nikos.tar.gz", work_dir),
            "755",
            tarball_hash.clone(),
        ),
    );

    // -- Host mutation --------------------------------------------------------

    // The 2022 AMI ships a /tmp too small for the extracted toolchain
    let resize_tmp = platform.id == "amazon" && platform.version == "2022";
    if resize_tmp {
        let mut remount = Resource::new(ResourceKind::TmpfsRemount);
        remount.path = Some("/tmp".to_string());
        remount.size_mb = Some(5120);
        catalog.insert("tmp-resize".to_string(), remount);
    }

    let mut extract = Resource::new(ResourceKind::Archive);
    extract.source = Some(format!("{}/nikos.tar.gz", work_dir));
    extract.path = Some(format!("{}/nikos/embedded", embedded_dir));
    extract.content_hash = Some(tarball_hash.clone());
    extract.depends_on = vec!["nikos-tarball".to_string()];
    if resize_tmp {
        extract.depends_on.push("tmp-resize".to_string());
    }
    catalog.insert("nikos-extract".to_string(), extract);

    let mut swap = Resource::new(ResourceKind::SwapFile);
    swap.path = Some(config.swap.path.clone());
    swap.size_mb = Some(config.swap.size_mb);
    catalog.insert("swap-file".to_string(), swap);

    for module in ["loop", "veth"] {
        let mut kmod = Resource::new(ResourceKind::KernelModule);
        kmod.name = Some(module.to_string());
        catalog.insert(format!("kmod-{}", module), kmod);
    }

    // Some functional tests identify interpreters at runtime and need both
    let mut interpreters = Resource::new(ResourceKind::Package);
    interpreters.provider = Some(platform.package_provider().to_string());
    interpreters.packages = vec!["python3".to_string(), "perl".to_string()];
    catalog.insert("interpreters".to_string(), interpreters);

    // -- Container pipeline ---------------------------------------------------

    if platform.uses_host_containers() {
        if matches!(platform.id.as_str(), "ubuntu" | "debian") {
            let mut gnupg = Resource::new(ResourceKind::Package);
            gnupg.provider = Some("apt".to_string());
            gnupg.packages = vec!["gnupg".to_string()];
            catalog.insert("gnupg".to_string(), gnupg);

            // Background upgrades race the package steps and hold the dpkg lock
            let mut unattended = Resource::new(ResourceKind::Package);
            unattended.provider = Some("apt".to_string());
            unattended.state = Some("absent".to_string());
            unattended.packages = vec!["unattended-upgrades".to_string()];
            catalog.insert("unattended-upgrades".to_string(), unattended);
        }

        if matches!(platform.id.as_str(), "ubuntu" | "debian" | "centos") {
            let mut xfsprogs = Resource::new(ResourceKind::Package);
            xfsprogs.provider = Some(platform.package_provider().to_string());
            xfsprogs.packages = vec!["xfsprogs".to_string()];
            catalog.insert("xfsprogs".to_string(), xfsprogs);
        }

        let mut engine = Resource::new(ResourceKind::DockerEngine);
        engine.provider = Some(platform.package_provider().to_string());
        match platform.id.as_str() {
            "oracle" => engine.name = Some("docker-engine".to_string()),
            "amazon" => engine.name = Some("docker".to_string()),
            "ubuntu" => engine.name = Some("docker.io".to_string()),
            _ => engine.setup_repo = true,
        }
        catalog.insert("docker-engine".to_string(), engine);

        let mut dockerfile = Resource::new(ResourceKind::File);
        dockerfile.path = Some(format!("{}/Dockerfile", work_dir));
        dockerfile.content = Some(dockerfile_content(&config.container, embedded_dir));
        catalog.insert("dockerfile".to_string(), dockerfile);

        let image_ref = format!("{}:{}", config.container.image, config.container.tag);

        let mut image = Resource::new(ResourceKind::DockerImage);
        image.image = Some(image_ref.clone());
        image.build_dir = Some(work_dir.to_string());
        // Rebuild whenever any build input changes
        image.content_hash = Some(hasher::composite_hash(&[
            &tarball_hash,
            &clang_hash,
            &llc_hash,
        ]));
        image.depends_on = vec![
            "docker-engine".to_string(),
            "dockerfile".to_string(),
            "nikos-tarball".to_string(),
            "clang-bpf-staged".to_string(),
            "llc-bpf-staged".to_string(),
        ];
        catalog.insert("testsuite-image".to_string(), image);

        let mut container = Resource::new(ResourceKind::DockerContainer);
        container.name = Some(config.container.name.clone());
        container.image = Some(image_ref);
        container.privileged = true;
        container.caps = ["SYS_ADMIN", "SYS_RESOURCE", "SYS_PTRACE", "NET_ADMIN", "IPC_LOCK", "ALL"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        container.volumes = vec![
            // work dir shared with the suite
            format!("{}:{}", work_dir, work_dir),
            // HOST_* paths
            "/proc:/host/proc".to_string(),
            "/etc:/host/etc".to_string(),
            "/sys:/host/sys".to_string(),
            // os-release
            "/etc/os-release:/host/etc/os-release".to_string(),
            "/usr/lib/os-release:/host/usr/lib/os-release".to_string(),
            // passwd and groups
            "/etc/passwd:/etc/passwd".to_string(),
            "/etc/group:/etc/group".to_string(),
        ];
        container.env = vec![
            "HOST_PROC=/host/proc".to_string(),
            "HOST_ETC=/host/etc".to_string(),
            "HOST_SYS=/host/sys".to_string(),
        ];
        container.depends_on = vec!["testsuite-image".to_string()];
        catalog.insert("testsuite-container".to_string(), container);

        let mut debugfs = Resource::new(ResourceKind::DockerExec);
        debugfs.name = Some(config.container.name.clone());
        debugfs.command = vec![
            "sh".to_string(),
            "-c".to_string(),
            "mountpoint -q /sys/kernel/debug || mount -t debugfs none /sys/kernel/debug".to_string(),
        ];
        debugfs.depends_on = vec!["testsuite-container".to_string()];
        catalog.insert("debugfs-mount".to_string(), debugfs);

        for i in 0..8 {
            let mut mknod = Resource::new(ResourceKind::DockerExec);
            mknod.name = Some(config.container.name.clone());
            mknod.command = vec![
                "bash".to_string(),
                "-c".to_string(),
                format!("mknod /dev/loop{} b 7 {} || true", i, i),
            ];
            mknod.tolerate_existing = true;
            mknod.depends_on = vec!["testsuite-container".to_string()];
            catalog.insert(format!("loop-device-{}", i), mknod);
        }
    }

    // -- Kernel security ------------------------------------------------------

    if platform.is_rpm_family() {
        catalog.insert(
            "selinux-permissive".to_string(),
            Resource::new(ResourceKind::Selinux),
        );
    }

    let mut lockdown = Resource::new(ResourceKind::Lockdown);
    lockdown.path = Some("/sys/kernel/security/lockdown".to_string());
    lockdown.state = Some("integrity".to_string());
    catalog.insert("kernel-lockdown".to_string(), lockdown);

    // -- Harness bookkeeping --------------------------------------------------

    let mut tests = Resource::new(ResourceKind::File);
    tests.state = Some("directory".to_string());
    tests.path = Some(tests_dir.to_string());
    catalog.insert("tests-dir".to_string(), tests);

    let mut color_idx = Resource::new(ResourceKind::File);
    color_idx.path = Some(format!("{}/color_idx", tests_dir));
    color_idx.content = Some(config.color_idx.to_string());
    color_idx.mode = Some("644".to_string());
    color_idx.depends_on = vec!["tests-dir".to_string()];
    catalog.insert("color-idx".to_string(), color_idx);

    Ok(catalog)
}

fn staged_file(source: &str, path: &str, mode: &str, content_hash: String) -> Resource {
    let mut r = Resource::new(ResourceKind::StagedFile);
    r.source = Some(source.to_string());
    r.path = Some(path.to_string());
    r.mode = Some(mode.to_string());
    r.content_hash = Some(content_hash);
    r
}

fn hash_asset(path: &str) -> Result<String, String> {
    hasher::hash_file(Path::new(path)).map_err(|e| format!("missing asset: {}", e))
}

fn dockerfile_content(container: &ContainerConfig, embedded_dir: &str) -> String {
    format!(
        "FROM {base}\n\
         \n\
         ADD nikos.tar.gz {emb}/nikos/embedded/\n\
         \n\
         COPY clang-bpf {emb}/bin/\n\
         COPY llc-bpf {emb}/bin/\n\
         \n\
         CMD sleep 7200\n",
        base = container.base_image,
        emb = embedded_dir,
    )
}
