//! Engine configuration
//!
//! Configuration for the automaton limit, the restricted index classifier and
//! log output. Values can come from JSON, from the environment or from the
//! builder methods.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::automaton;
use crate::core::{AuthzError, AuthzResult};
use crate::permission::RestrictedIndices;

/// Overrides [`EngineConfig::max_determinized_states`]
pub const MAX_DETERMINIZED_STATES_ENV: &str = "SHADOW_AUTHZ_MAX_DETERMINIZED_STATES";

/// Overrides [`EngineConfig::restricted_indices`], comma separated
pub const RESTRICTED_INDICES_ENV: &str = "SHADOW_AUTHZ_RESTRICTED_INDICES";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// State limit for automaton construction
    #[serde(default = "default_max_determinized_states")]
    pub max_determinized_states: usize,

    /// Patterns of indices hidden from ordinary wildcard grants
    #[serde(default = "default_restricted_indices")]
    pub restricted_indices: Vec<String>,

    /// Directory for the JSON log file, if any
    #[serde(default)]
    pub log_directory: Option<PathBuf>,
}

fn default_max_determinized_states() -> usize {
    automaton::DEFAULT_MAX_DETERMINIZED_STATES
}

fn default_restricted_indices() -> Vec<String> {
    vec![
        ".security".to_string(),
        ".security-*".to_string(),
        ".async-search*".to_string(),
    ]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_determinized_states: default_max_determinized_states(),
            restricted_indices: default_restricted_indices(),
            log_directory: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_determinized_states(mut self, limit: usize) -> Self {
        self.max_determinized_states = limit;
        self
    }

    pub fn with_restricted_indices<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.restricted_indices = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_log_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.log_directory = Some(directory.into());
        self
    }

    pub fn from_json_str(json: &str) -> AuthzResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::from_json_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Defaults overridden by the environment
    pub fn from_env() -> AuthzResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of `self`
    pub fn with_env_overrides(mut self) -> AuthzResult<Self> {
        if let Ok(value) = std::env::var(MAX_DETERMINIZED_STATES_ENV) {
            self.max_determinized_states = value.trim().parse().map_err(|_| {
                AuthzError::InvalidConfig(format!(
                    "{} must be a positive integer, got [{}]",
                    MAX_DETERMINIZED_STATES_ENV, value
                ))
            })?;
        }
        if let Ok(value) = std::env::var(RESTRICTED_INDICES_ENV) {
            self.restricted_indices = parse_list(&value);
        }
        Ok(self)
    }

    /// Install the automaton state limit process-wide
    pub fn apply(&self) -> AuthzResult<()> {
        automaton::set_max_determinized_states(self.max_determinized_states)?;
        info!(
            "Automaton state limit set to {}",
            self.max_determinized_states
        );
        Ok(())
    }

    /// Compile the restricted index classifier
    pub fn restricted_indices(&self) -> AuthzResult<RestrictedIndices> {
        RestrictedIndices::new(&self.restricted_indices)
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_determinized_states, 100_000);
        assert_eq!(
            config.restricted_indices,
            vec![".security", ".security-*", ".async-search*"]
        );
        assert!(config.log_directory.is_none());
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = EngineConfig::new()
            .with_max_determinized_states(500)
            .with_restricted_indices([".internal-*"])
            .with_log_directory("/tmp/authz");
        assert_eq!(config.max_determinized_states, 500);
        assert_eq!(config.restricted_indices, vec![".internal-*"]);
        assert_eq!(config.log_directory, Some(PathBuf::from("/tmp/authz")));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"max_determinized_states": 2000, "restricted_indices": [".kibana*"]}}"#
        )
        .unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_determinized_states, 2000);
        assert_eq!(config.restricted_indices, vec![".kibana*"]);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = EngineConfig::from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("absent.json"));
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = EngineConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, AuthzError::Serialization(_)));
    }

    #[test]
    fn restricted_indices_compile() {
        let restricted = EngineConfig::default().restricted_indices().unwrap();
        assert!(restricted.is_restricted(".security"));
        assert!(restricted.is_restricted(".security-7"));
        assert!(restricted.is_restricted(".async-search-abc"));
        assert!(!restricted.is_restricted("logs"));
    }

    #[test]
    fn list_parsing_trims_and_skips_blanks() {
        assert_eq!(
            parse_list(" .a , ,.b*,"),
            vec![".a".to_string(), ".b*".to_string()]
        );
    }
}
