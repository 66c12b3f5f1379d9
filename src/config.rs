//! Engine configuration, persisted as TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::validate::SquadRules;

/// Engine-wide settings. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// External ontology schema. `None` uses the bundled schema.
    pub ontology_path: Option<PathBuf>,
    /// Cache TTL for named templates and the CLI, in seconds.
    pub default_ttl_secs: u64,
    /// Upper bound on cached query results.
    pub cache_max_entries: usize,
    pub squad: SquadRules,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ontology_path: None,
            default_ttl_secs: 300,
            cache_max_entries: 1024,
            squad: SquadRules::default(),
        }
    }
}

impl EngineConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Reject settings no engine could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_max_entries == 0 {
            return Err(ConfigError::Invalid {
                message: "cache_max_entries must be at least 1".into(),
            });
        }
        if !(self.squad.budget.is_finite() && self.squad.budget > 0.0) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "squad.budget must be a positive number, got {}",
                    self.squad.budget
                ),
            });
        }
        let positions = self.squad.goalkeepers
            + self.squad.defenders
            + self.squad.midfielders
            + self.squad.forwards;
        if positions != self.squad.size {
            return Err(ConfigError::Invalid {
                message: format!(
                    "squad position counts sum to {positions} but squad.size is {}",
                    self.squad.size
                ),
            });
        }
        Ok(())
    }

    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("smartplay.toml");
        let config = EngineConfig {
            ontology_path: Some(PathBuf::from("/srv/ontology.toml")),
            default_ttl_secs: 60,
            ..EngineConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smartplay.toml");
        std::fs::write(&path, "cache_max_entries = 16\n\n[squad]\nbudget = 95.5\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.cache_max_entries, 16);
        assert_eq!(config.squad.budget, 95.5);
        assert_eq!(config.squad.size, 15);
        assert_eq!(config.default_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn unknown_keys_and_bad_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smartplay.toml");
        std::fs::write(&path, "cache_size = 5\n").unwrap();
        assert!(matches!(EngineConfig::load(&path), Err(ConfigError::Parse { .. })));

        std::fs::write(&path, "[squad]\nforwards = 4\n").unwrap();
        assert!(matches!(EngineConfig::load(&path), Err(ConfigError::Invalid { .. })));

        let missing = dir.path().join("absent.toml");
        assert!(matches!(EngineConfig::load(&missing), Err(ConfigError::Read { .. })));
    }
}
