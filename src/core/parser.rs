//! RG-002: YAML parsing and validation.
//!
//! Parses proberig.yaml and validates structural constraints:
//! - Version must be "1.0"
//! - All configured paths must be absolute
//! - Container names and image refs must be non-empty
//! - Remote targets need an address

use super::types::*;
use std::path::Path;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a proberig.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<RigConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse a proberig.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<RigConfig, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &RigConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // Version check
    if config.version != "1.0" {
        errors.push(ValidationError {
            message: format!("version must be \"1.0\", got \"{}\"", config.version),
        });
    }

    // Name check
    if config.name.is_empty() {
        errors.push(ValidationError {
            message: "name must not be empty".to_string(),
        });
    }

    // Path checks — everything the catalog writes to must be absolute
    for (label, path) in [
        ("assets_dir", &config.assets_dir),
        ("work_dir", &config.work_dir),
        ("embedded_dir", &config.embedded_dir),
        ("tests_dir", &config.tests_dir),
        ("swap.path", &config.swap.path),
    ] {
        if !path.starts_with('/') {
            errors.push(ValidationError {
                message: format!("{} must be an absolute path, got \"{}\"", label, path),
            });
        }
    }

    // Container wiring
    if config.container.image.is_empty() || config.container.tag.is_empty() {
        errors.push(ValidationError {
            message: "container.image and container.tag must not be empty".to_string(),
        });
    }
    if config.container.name.is_empty() {
        errors.push(ValidationError {
            message: "container.name must not be empty".to_string(),
        });
    }
    if config.container.base_image.is_empty() {
        errors.push(ValidationError {
            message: "container.base_image must not be empty".to_string(),
        });
    }

    // Swap sizing
    if config.swap.size_mb == 0 {
        errors.push(ValidationError {
            message: "swap.size_mb must be greater than zero".to_string(),
        });
    }

    // Remote target wiring
    if let Some(ref target) = config.target {
        if target.addr.is_empty() {
            errors.push(ValidationError {
                message: format!("target '{}' has no addr", target.name),
            });
        }
        if target.name.is_empty() {
            errors.push(ValidationError {
                message: "target.name must not be empty".to_string(),
            });
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
version: "1.0"
name: kernel-rig
assets_dir: /opt/rig-assets
"#
    }

    #[test]
    fn test_rg002_parse_valid() {
        let config = parse_config(minimal_yaml()).unwrap();
        assert_eq!(config.name, "kernel-rig");
        let errors = validate_config(&config);
        assert!(
            errors.is_empty(),
            "unexpected errors: {:?}",
            errors.iter().map(|e| &e.message).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_rg002_bad_version() {
        let yaml = r#"
version: "2.0"
name: rig
assets_dir: /assets
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.message.contains("version")));
    }

    #[test]
    fn test_rg002_relative_assets_dir() {
        let yaml = r#"
version: "1.0"
name: rig
assets_dir: relative/assets
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.message.contains("assets_dir")));
        assert!(errors.iter().any(|e| e.message.contains("absolute")));
    }

    #[test]
    fn test_rg002_empty_name() {
        let yaml = r#"
version: "1.0"
name: ""
assets_dir: /assets
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.message.contains("name")));
    }

    #[test]
    fn test_rg002_zero_swap() {
        let yaml = r#"
version: "1.0"
name: rig
assets_dir: /assets
swap:
  size_mb: 0
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.message.contains("swap.size_mb")));
    }

    #[test]
    fn test_rg002_target_missing_addr() {
        let yaml = r#"
version: "1.0"
name: rig
assets_dir: /assets
target:
  name: lab-7
  addr: ""
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.message.contains("no addr")));
    }

    #[test]
    fn test_rg002_empty_container_name() {
        let yaml = r#"
version: "1.0"
name: rig
assets_dir: /assets
container:
  name: ""
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.message.contains("container.name")));
    }

    #[test]
    fn test_rg002_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proberig.yaml");
        std::fs::write(&path, minimal_yaml()).unwrap();
        let config = parse_config_file(&path).unwrap();
        assert_eq!(config.name, "kernel-rig");
    }

    #[test]
    fn test_rg002_parse_invalid_yaml() {
        let result = parse_config("not: [valid: yaml: {{");
        assert!(result.is_err());
    }

    #[test]
    fn test_rg002_parse_missing_file() {
        let result = parse_config_file(Path::new("/nonexistent/proberig.yaml"));
        assert!(result.is_err());
    }
}
