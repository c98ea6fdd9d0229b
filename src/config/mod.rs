//! Lowering configuration, read from `tapline.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::diagnostic::Diagnostic;
use crate::span::Span;

pub const CONFIG_FILE: &str = "tapline.json";

/// What happens to `equal_zero` constraints in execute functions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintMode {
    /// Keep every constraint so witness generation halts on the first
    /// violated one.
    #[default]
    Strict,
    /// Erase constraints from execute functions. Check functions always
    /// keep them.
    Relaxed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowerConfig {
    pub constraints: ConstraintMode,
    /// Bound on rewrite sweeps per driver run.
    pub max_rewrite_iterations: usize,
    /// Generate execute and lookback functions across components in parallel.
    pub parallel: bool,
    /// Also build test entry points into the check function.
    pub include_test_entries: bool,
}

impl Default for LowerConfig {
    fn default() -> Self {
        Self {
            constraints: ConstraintMode::Strict,
            max_rewrite_iterations: 100,
            parallel: true,
            include_test_entries: false,
        }
    }
}

impl LowerConfig {
    pub fn load(path: &Path) -> Result<LowerConfig, Diagnostic> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Diagnostic::error(
                format!("cannot read '{}': {}", path.display(), e),
                Span::dummy(),
            )
        })?;
        let config: LowerConfig = serde_json::from_str(&content).map_err(|e| {
            Diagnostic::error(
                format!("invalid config '{}': {}", path.display(), e),
                Span::dummy(),
            )
        })?;
        if config.max_rewrite_iterations == 0 {
            return Err(Diagnostic::error(
                format!("'{}': max_rewrite_iterations must be positive", path.display()),
                Span::dummy(),
            ));
        }
        Ok(config)
    }

    /// Search upward from `start_dir` for a `tapline.json`.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.exists() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = LowerConfig::default();
        assert_eq!(config.constraints, ConstraintMode::Strict);
        assert_eq!(config.max_rewrite_iterations, 100);
        assert!(config.parallel);
        assert!(!config.include_test_entries);
    }

    #[test]
    fn test_load_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{ "constraints": "relaxed", "parallel": false }"#).unwrap();

        let config = LowerConfig::load(&path).unwrap();
        assert_eq!(config.constraints, ConstraintMode::Relaxed);
        assert!(!config.parallel);
        assert_eq!(config.max_rewrite_iterations, 100);
    }

    #[test]
    fn test_load_rejects_zero_iterations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{ "max_rewrite_iterations": 0 }"#).unwrap();

        let err = LowerConfig::load(&path).unwrap_err();
        assert!(err.message.contains("max_rewrite_iterations"));
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "constraints = strict").unwrap();
        assert!(LowerConfig::load(&path).is_err());
    }

    #[test]
    fn test_find_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();
        let nested = dir.path().join("circuits").join("rv32");
        fs::create_dir_all(&nested).unwrap();

        let found = LowerConfig::find(&nested).unwrap();
        assert_eq!(found, dir.path().join(CONFIG_FILE));
    }

    #[test]
    fn test_find_missing() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a");
        fs::create_dir_all(&nested).unwrap();
        // A tapline.json further up the real filesystem would be found too;
        // only assert on what lives inside the temp dir.
        if let Some(found) = LowerConfig::find(&nested) {
            assert!(!found.starts_with(dir.path()));
        }
    }
}
