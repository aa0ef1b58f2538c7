//! RG-008: Staged asset handlers — binary files and directory trees.
//!
//! Assets live next to the controller, not on the target, so the payload is
//! embedded into the generated script (base64 for single binaries, a base64
//! tar.gz for trees). Staging then works unchanged over any transport.

use crate::core::types::Resource;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::io::Write;
use std::path::Path;

const PAYLOAD_WIDTH: usize = 76;

/// Generate shell to check staged asset state.
pub fn check_script(resource: &Resource) -> String {
    let path = resource.path.as_deref().unwrap_or("/dev/null");
    match resource.state.as_deref() {
        Some("tree") => format!(
            "test -d '{}' && echo 'exists:tree' || echo 'missing:tree'",
            path
        ),
        _ => format!(
            "test -f '{}' && echo 'exists:file' || echo 'missing:file'",
            path
        ),
    }
}

/// Generate shell that writes a staged binary onto the target.
pub fn apply_script(resource: &Resource) -> Result<String, String> {
    let source = resource
        .source
        .as_deref()
        .ok_or("staged file has no source")?;
    let path = resource.path.as_deref().ok_or("staged file has no path")?;

    let bytes = std::fs::read(source).map_err(|e| format!("cannot read asset {}: {}", source, e))?;
    let payload = wrap_payload(&BASE64.encode(&bytes));

    let mut lines = vec!["set -euo pipefail".to_string()];
    if let Some(parent) = Path::new(path).parent() {
        if parent != Path::new("/") {
            lines.push(format!("mkdir -p '{}'", parent.display()));
        }
    }
    lines.push(format!(
        "base64 -d > '{}' <<'RIG_EOF'\n{}\nRIG_EOF",
        path, payload
    ));
    if let Some(ref owner) = resource.owner {
        lines.push(format!("chown '{}' '{}'", owner, path));
    }
    if let Some(ref mode) = resource.mode {
        lines.push(format!("chmod '{}' '{}'", mode, path));
    }

    Ok(lines.join("\n"))
}

/// Generate shell that unpacks a staged directory tree onto the target.
pub fn tree_apply_script(resource: &Resource) -> Result<String, String> {
    let source = resource
        .source
        .as_deref()
        .ok_or("staged tree has no source")?;
    let path = resource.path.as_deref().ok_or("staged tree has no path")?;

    let bytes = pack_tree(Path::new(source))?;
    let payload = wrap_payload(&BASE64.encode(&bytes));

    let mut lines = vec!["set -euo pipefail".to_string()];
    lines.push(format!("mkdir -p '{}'", path));
    lines.push(format!(
        "base64 -d <<'RIG_EOF' | tar -xzf - -C '{}'\n{}\nRIG_EOF",
        path, payload
    ));
    if let Some(ref owner) = resource.owner {
        lines.push(format!("chown -R '{}' '{}'", owner, path));
    }
    if let Some(ref mode) = resource.mode {
        lines.push(format!("chmod -R '{}' '{}'", mode, path));
    }

    Ok(lines.join("\n"))
}

/// Generate shell to query staged asset state (for hashing).
pub fn state_query_script(resource: &Resource) -> String {
    let path = resource.path.as_deref().unwrap_or("/dev/null");
    match resource.state.as_deref() {
        Some("tree") => format!(
            "if [ -d '{}' ]; then\n\
               find '{}' -type f -exec sha256sum {{}} + 2>/dev/null | sort\n\
             else\n\
               echo 'MISSING'\n\
             fi",
            path, path
        ),
        _ => format!(
            "if [ -f '{}' ]; then\n\
               stat -c 'mode=%a' '{}' 2>/dev/null\n\
               sha256sum '{}' 2>/dev/null | cut -d' ' -f1\n\
             else\n\
               echo 'MISSING'\n\
             fi",
            path, path, path
        ),
    }
}

/// Pack a directory into an in-memory tar.gz for payload embedding.
pub fn pack_tree(dir: &Path) -> Result<Vec<u8>, String> {
    if !dir.is_dir() {
        return Err(format!("asset directory {} does not exist", dir.display()));
    }

    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut archive = tar::Builder::new(encoder);
    archive
        .append_dir_all(".", dir)
        .map_err(|e| format!("cannot pack {}: {}", dir.display(), e))?;
    let mut encoder = archive
        .into_inner()
        .map_err(|e| format!("tar finalize error: {}", e))?;
    encoder
        .flush()
        .map_err(|e| format!("gzip flush error: {}", e))?;
    encoder
        .finish()
        .map_err(|e| format!("gzip finalize error: {}", e))
}

/// Wrap base64 output so generated scripts stay line-oriented.
fn wrap_payload(encoded: &str) -> String {
    encoded
        .as_bytes()
        .chunks(PAYLOAD_WIDTH)
        .map(|chunk| String::from_utf8_lossy(chunk).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
