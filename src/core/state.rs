//! RG-018: Lock file management — load, save (atomic), path derivation.

use super::types::StateLock;
use std::path::{Path, PathBuf};

/// Derive the lock file path for a target within the state directory.
pub fn lock_file_path(state_dir: &Path, target: &str) -> PathBuf {
    state_dir.join(target).join("state.lock.yaml")
}

/// Load a lock file for a target. Returns None if the file doesn't exist.
pub fn load_lock(state_dir: &Path, target: &str) -> Result<Option<StateLock>, String> {
    let path = lock_file_path(state_dir, target);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let lock: StateLock = serde_yaml_ng::from_str(&content)
        .map_err(|e| format!("invalid lock file {}: {}", path.display(), e))?;
    Ok(Some(lock))
}

/// Save a lock file atomically (write to temp, then rename).
pub fn save_lock(state_dir: &Path, lock: &StateLock) -> Result<(), String> {
    let path = lock_file_path(state_dir, &lock.target);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create dir {}: {}", parent.display(), e))?;
    }

    let yaml =
        serde_yaml_ng::to_string(lock).map_err(|e| format!("serialize error: {}", e))?;

    // Atomic write: temp file + rename
    let tmp_path = path.with_extension("lock.yaml.tmp");
    std::fs::write(&tmp_path, &yaml)
        .map_err(|e| format!("cannot write {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| {
        format!(
            "cannot rename {} → {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })?;

    Ok(())
}

/// Create a new empty StateLock for a target.
pub fn new_lock(target: &str) -> StateLock {
    use crate::journal::eventlog::now_iso8601;
    StateLock {
        schema: "1.0".to_string(),
        target: target.to_string(),
        generated_at: now_iso8601(),
        generator: format!("proberig {}", env!("CARGO_PKG_VERSION")),
        blake3_version: "1.8".to_string(),
        resources: indexmap::IndexMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ResourceKind, ResourceLock, ResourceStatus};
    use std::collections::HashMap;

    fn make_lock() -> StateLock {
        let mut resources = indexmap::IndexMap::new();
        resources.insert(
            "testsuite".to_string(),
            ResourceLock {
                kind: ResourceKind::StagedFile,
                status: ResourceStatus::Converged,
                applied_at: Some("2026-08-06T14:00:00Z".to_string()),
                duration_seconds: Some(1.5),
                hash: "blake3:abc123".to_string(),
                details: HashMap::new(),
            },
        );
        StateLock {
            schema: "1.0".to_string(),
            target: "local".to_string(),
            generated_at: "2026-08-06T14:00:00Z".to_string(),
            generator: "proberig 0.4.1".to_string(),
            blake3_version: "1.8".to_string(),
            resources,
        }
    }

    #[test]
    fn test_rg018_lock_file_path() {
        let p = lock_file_path(Path::new("/state"), "lab-7");
        assert_eq!(p, PathBuf::from("/state/lab-7/state.lock.yaml"));
    }

    #[test]
    fn test_rg018_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let lock = make_lock();
        save_lock(dir.path(), &lock).unwrap();

        let loaded = load_lock(dir.path(), "local").unwrap().unwrap();
        assert_eq!(loaded.target, "local");
        assert_eq!(loaded.resources.len(), 1);
        assert_eq!(loaded.resources["testsuite"].status, ResourceStatus::Converged);
    }

    #[test]
    fn test_rg018_load_nonexistent() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_lock(dir.path(), "ghost").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_rg018_atomic_write() {
        let dir = tempfile::tempdir().unwrap();
        let lock = make_lock();
        save_lock(dir.path(), &lock).unwrap();

        // Verify temp file is cleaned up
        let tmp = dir.path().join("local").join("state.lock.yaml.tmp");
        assert!(!tmp.exists());

        // Verify actual file exists
        let actual = lock_file_path(dir.path(), "local");
        assert!(actual.exists());
    }

    #[test]
    fn test_rg018_new_lock() {
        let lock = new_lock("lab-7");
        assert_eq!(lock.target, "lab-7");
        assert!(lock.generated_at.contains('T'));
        assert!(lock.generator.starts_with("proberig"));
        assert!(lock.resources.is_empty());
    }

    #[test]
    fn test_rg018_roundtrip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut lock = make_lock();
        lock.resources.insert(
            "aaa-first".to_string(),
            ResourceLock {
                kind: ResourceKind::File,
                status: ResourceStatus::Converged,
                applied_at: None,
                duration_seconds: None,
                hash: "blake3:xxx".to_string(),
                details: HashMap::new(),
            },
        );
        save_lock(dir.path(), &lock).unwrap();
        let loaded = load_lock(dir.path(), "local").unwrap().unwrap();
        let keys: Vec<_> = loaded.resources.keys().collect();
        assert_eq!(keys, vec!["testsuite", "aaa-first"]);
    }
}
