//! RG-013: Docker resource handlers — engine, image, container, exec.
//!
//! Platforms without a usable native kernel toolchain run the testsuite
//! inside a privileged container; these handlers converge the engine, the
//! image built from the staged work dir, the long-lived container, and the
//! post-start exec commands.

use crate::core::types::Resource;

// ----------------------------------------------------------------------------
// Engine
// ----------------------------------------------------------------------------

/// Generate shell to check whether the docker engine is installed and running.
pub fn engine_check_script(_resource: &Resource) -> String {
    "command -v docker >/dev/null 2>&1 && echo 'installed:docker' || echo 'missing:docker'\n\
     docker info >/dev/null 2>&1 && echo 'running:docker' || echo 'stopped:docker'"
        .to_string()
}

/// Generate shell to install the engine and start its service.
pub fn engine_apply_script(resource: &Resource) -> String {
    let mut lines = vec!["set -euo pipefail".to_string()];

    if resource.setup_repo {
        // Default branch: vendor repo setup
        lines.push(
            "if ! command -v docker >/dev/null 2>&1; then\n\
             \x20 curl -fsSL https://get.docker.com | sh\nfi"
                .to_string(),
        );
    } else {
        let package = resource.name.as_deref().unwrap_or("docker");
        let provider = resource.provider.as_deref().unwrap_or("apt");
        let install = match provider {
            "apt" => format!(
                "apt-get update -qq\n\x20 DEBIAN_FRONTEND=noninteractive apt-get install -y -qq '{}'",
                package
            ),
            "dnf" => format!("dnf install -y -q '{}'", package),
            "yum" => format!("yum install -y -q '{}'", package),
            "zypper" => format!("zypper --non-interactive install '{}'", package),
            other => format!("echo 'unsupported provider: {}'; exit 1", other),
        };
        lines.push(format!(
            "if ! command -v docker >/dev/null 2>&1; then\n\x20 {}\nfi",
            install
        ));
    }

    lines.push(
        "if command -v systemctl >/dev/null 2>&1; then\n\
         \x20 systemctl enable docker\n\
         \x20 if ! systemctl is-active --quiet docker; then\n\
         \x20   systemctl start docker\n\
         \x20 fi\nfi"
            .to_string(),
    );

    lines.join("\n")
}

/// Generate shell to query engine state (for hashing).
pub fn engine_state_query_script(_resource: &Resource) -> String {
    "docker --version 2>/dev/null || echo 'MISSING'".to_string()
}

// ----------------------------------------------------------------------------
// Image
// ----------------------------------------------------------------------------

fn image_ref(resource: &Resource) -> String {
    resource
        .image
        .clone()
        .unwrap_or_else(|| "testsuite-img:latest".to_string())
}

/// Generate shell to check whether the image exists.
pub fn image_check_script(resource: &Resource) -> String {
    let image = image_ref(resource);
    format!(
        "docker image inspect '{}' >/dev/null 2>&1 && echo 'present:{}' || echo 'missing:{}'",
        image, image, image
    )
}

/// Generate shell to build the image from the staged work dir.
/// Always builds; the layer cache makes converged re-builds cheap and a
/// changed Dockerfile or payload is picked up without extra bookkeeping.
pub fn image_apply_script(resource: &Resource) -> String {
    let image = image_ref(resource);
    let build_dir = resource.build_dir.as_deref().unwrap_or(".");
    format!(
        "set -euo pipefail\n\
         docker build -t '{}' '{}'",
        image, build_dir
    )
}

/// Generate shell to query image identity (for hashing).
pub fn image_state_query_script(resource: &Resource) -> String {
    let image = image_ref(resource);
    format!(
        "docker image inspect -f '{{{{.Id}}}}' '{}' 2>/dev/null || echo 'MISSING'",
        image
    )
}

// ----------------------------------------------------------------------------
// Container
// ----------------------------------------------------------------------------

/// Generate shell to check whether the container is running.
pub fn container_check_script(resource: &Resource) -> String {
    let name = resource.name.as_deref().unwrap_or("docker-testsuite");
    format!(
        "[ \"$(docker container inspect -f '{{{{.State.Running}}}}' '{}' 2>/dev/null)\" = 'true' ] \
         && echo 'running:{}' || echo 'stopped:{}'",
        name, name, name
    )
}

/// Generate shell to (re)create the container with its capability, volume,
/// and environment wiring.
pub fn container_apply_script(resource: &Resource) -> String {
    let name = resource.name.as_deref().unwrap_or("docker-testsuite");
    let image = image_ref(resource);

    let mut run = format!("docker run -d --name '{}'", name);
    if resource.privileged {
        run.push_str(" --privileged");
    }
    for cap in &resource.caps {
        run.push_str(&format!(" --cap-add '{}'", cap));
    }
    for volume in &resource.volumes {
        run.push_str(&format!(" -v '{}'", volume));
    }
    for env in &resource.env {
        run.push_str(&format!(" -e '{}'", env));
    }
    run.push_str(&format!(" '{}'", image));

    format!(
        "set -euo pipefail\n\
         if [ \"$(docker container inspect -f '{{{{.State.Running}}}}' '{}' 2>/dev/null)\" != 'true' ]; then\n\
         \x20 docker rm -f '{}' >/dev/null 2>&1 || true\n\
         \x20 {}\nfi",
        name, name, run
    )
}

/// Generate shell to query container state (for hashing).
pub fn container_state_query_script(resource: &Resource) -> String {
    let name = resource.name.as_deref().unwrap_or("docker-testsuite");
    format!(
        "docker container inspect -f '{{{{.State.Running}}}} {{{{.HostConfig.Privileged}}}} {{{{.Image}}}}' '{}' 2>/dev/null || echo 'MISSING'",
        name
    )
}

// ----------------------------------------------------------------------------
// Exec
// ----------------------------------------------------------------------------

/// Generate shell to check the exec's container is up.
pub fn exec_check_script(resource: &Resource) -> String {
    let name = resource.name.as_deref().unwrap_or("docker-testsuite");
    format!(
        "[ \"$(docker container inspect -f '{{{{.State.Running}}}}' '{}' 2>/dev/null)\" = 'true' ] \
         && echo 'running:{}' || echo 'stopped:{}'",
        name, name, name
    )
}

/// Generate shell to run a command inside the container.
pub fn exec_apply_script(resource: &Resource) -> String {
    let name = resource.name.as_deref().unwrap_or("docker-testsuite");
    let argv: Vec<String> = resource
        .command
        .iter()
        .map(|a| format!("'{}'", a.replace('\'', "'\\''")))
        .collect();

    let mut line = format!("docker exec '{}' {}", name, argv.join(" "));
    if resource.tolerate_existing {
        line.push_str(" || true");
    }

    format!("set -euo pipefail\n{}", line)
}

/// Generate shell to query exec effect (for hashing).
pub fn exec_state_query_script(resource: &Resource) -> String {
    let name = resource.name.as_deref().unwrap_or("docker-testsuite");
    format!(
        "docker container inspect -f '{{{{.State.Running}}}}' '{}' 2>/dev/null || echo 'MISSING'",
        name
    )
}
