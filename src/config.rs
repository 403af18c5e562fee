use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::GraphError;

fn default_grace_ms() -> u64 {
    5_000
}

/// Shutdown timing configuration: one default grace period plus per-resource
/// overrides keyed by registration name. Durations are in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
    #[serde(default)]
    pub resource_grace_ms: HashMap<String, u64>,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_ms: default_grace_ms(),
            resource_grace_ms: HashMap::new(),
        }
    }
}

impl ShutdownConfig {
    pub fn with_grace(grace: Duration) -> Self {
        Self {
            grace_ms: grace.as_millis() as u64,
            resource_grace_ms: HashMap::new(),
        }
    }

    pub fn override_for(mut self, name: impl Into<String>, grace: Duration) -> Self {
        self.resource_grace_ms
            .insert(name.into(), grace.as_millis() as u64);
        self
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| GraphError::Config(anyhow::anyhow!(e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, GraphError> {
        let config: Self =
            toml::from_str(content).map_err(|e| GraphError::Config(anyhow::anyhow!(e)))?;
        log::debug!(
            "Loaded shutdown config: grace {}ms, {} overrides",
            config.grace_ms,
            config.resource_grace_ms.len()
        );
        Ok(config)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn grace_for(&self, name: &str) -> Duration {
        self.resource_grace_ms
            .get(name)
            .map(|ms| Duration::from_millis(*ms))
            .unwrap_or_else(|| self.grace())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_apply_when_fields_missing() {
        let config = ShutdownConfig::from_toml_str("").unwrap();
        assert_eq!(config.grace(), Duration::from_millis(5_000));
        assert!(config.resource_grace_ms.is_empty());
    }

    #[test]
    fn test_load_overrides_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("shutdown.toml");
        fs::write(
            &file,
            r#"
grace_ms = 2000

[resource_grace_ms]
storage_writer = 10000
"#,
        )
        .unwrap();

        let config = ShutdownConfig::from_file(&file).unwrap();
        assert_eq!(config.grace(), Duration::from_millis(2_000));
        assert_eq!(
            config.grace_for("storage_writer"),
            Duration::from_millis(10_000)
        );
        assert_eq!(
            config.grace_for("anything_else"),
            Duration::from_millis(2_000)
        );
    }

    #[test]
    fn test_invalid_toml_is_a_config_error() {
        let err = ShutdownConfig::from_toml_str("grace_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, GraphError::Config(_)));
    }
}
