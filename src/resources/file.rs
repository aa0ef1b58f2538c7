//! RG-007: File/directory resource handler (inline content).

use crate::core::types::Resource;

/// Generate shell to check file state.
pub fn check_script(resource: &Resource) -> String {
    let path = resource.path.as_deref().unwrap_or("/dev/null");
    let state = resource.state.as_deref().unwrap_or("file");

    match state {
        "directory" => format!(
            "test -d '{}' && echo 'exists:directory' || echo 'missing:directory'",
            path
        ),
        _ => format!(
            "test -f '{}' && echo 'exists:file' || echo 'missing:file'",
            path
        ),
    }
}

/// Generate shell to converge file to desired state.
pub fn apply_script(resource: &Resource) -> String {
    let path = resource.path.as_deref().unwrap_or("/dev/null");
    let state = resource.state.as_deref().unwrap_or("file");

    let mut lines = vec!["set -euo pipefail".to_string()];

    match state {
        "directory" => {
            lines.push(format!("mkdir -p '{}'", path));
            if let Some(ref owner) = resource.owner {
                lines.push(format!("chown '{}' '{}'", owner, path));
            }
            if let Some(ref mode) = resource.mode {
                lines.push(format!("chmod '{}' '{}'", mode, path));
            }
        }
        _ => {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if parent != std::path::Path::new("/") {
                    lines.push(format!("mkdir -p '{}'", parent.display()));
                }
            }
            if let Some(ref content) = resource.content {
                // Write content via heredoc (safe, no injection)
                lines.push(format!(
                    "cat > '{}' <<'RIG_EOF'\n{}\nRIG_EOF",
                    path, content
                ));
            }
            if let Some(ref owner) = resource.owner {
                lines.push(format!("chown '{}' '{}'", owner, path));
            }
            if let Some(ref mode) = resource.mode {
                lines.push(format!("chmod '{}' '{}'", mode, path));
            }
        }
    }

    lines.join("\n")
}

/// Generate shell to query file state (for hashing).
pub fn state_query_script(resource: &Resource) -> String {
    let path = resource.path.as_deref().unwrap_or("/dev/null");
    format!(
        "if [ -e '{}' ]; then\n\
           stat -c 'owner=%U mode=%a size=%s' '{}' 2>/dev/null || \
           stat -f 'owner=%Su mode=%Lp size=%z' '{}' 2>/dev/null\n\
           if [ -f '{}' ]; then\n\
             sha256sum '{}' 2>/dev/null | cut -d' ' -f1\n\
           fi\n\
         else\n\
           echo 'MISSING'\n\
         fi",
        path, path, path, path, path
    )
}
