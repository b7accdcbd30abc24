// Analysis configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use sweeper_scanner::walker::DEFAULT_MAX_DEPTH;
use sweeper_scanner::{
    LivenessEvidence, LookupPolicy, ModuleScope, PathPolicy, WalkContext, WalkOptions,
};

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/sweeper/config.json";
pub const DEFAULT_REGISTRY_PATH: &str = "~/.config/sweeper/registry.db";
pub const DEFAULT_REPORT_PATH: &str = "~/Downloads/Report.csv";

/// Tunables for one analysis. Every field has a default, so a config file
/// only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub max_depth: usize,
    pub honor_exclusions: bool,
    pub skip_internal_assets: bool,
    /// Extra forced-include prefixes, added after the built-in ones.
    pub include: Vec<String>,
    /// Extra exclusion prefixes, added after the built-in ones.
    pub exclude: Vec<String>,
    pub lookup_policy: LookupPolicy,
    pub evidence: LivenessEvidence,
    pub workers: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            honor_exclusions: true,
            skip_internal_assets: false,
            include: Vec::new(),
            exclude: Vec::new(),
            lookup_policy: LookupPolicy::Skip,
            evidence: LivenessEvidence::Subtree,
            workers: 1,
        }
    }
}

impl AnalysisConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &str) -> Result<Self, ConfigError> {
        let path = expand_path(path);
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// The built-in rules plus this config's additions.
    pub fn policy(&self) -> PathPolicy {
        let mut policy = PathPolicy::default();
        for prefix in &self.include {
            policy = policy.with_include(prefix);
        }
        for prefix in &self.exclude {
            policy = policy.with_exclude(prefix);
        }
        policy
    }

    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            max_depth: self.max_depth,
            honor_exclusions: self.honor_exclusions,
            skip_internal_assets: self.skip_internal_assets,
            lookup_policy: self.lookup_policy,
            evidence: self.evidence,
        }
    }

    pub fn context(&self, mod_path: &str) -> WalkContext {
        WalkContext::new(ModuleScope::new(mod_path))
            .with_policy(self.policy())
            .with_options(self.walk_options())
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweeper_scanner::{AssetId, Classification};

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"max_depth": 4, "lookup_policy": "fail"}"#).unwrap();
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.lookup_policy, LookupPolicy::Fail);
        assert!(config.honor_exclusions);
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn test_extra_rules_are_appended() {
        let config = AnalysisConfig {
            exclude: vec!["/Vendor/".to_string()],
            include: vec!["/Engine/Shared".to_string()],
            ..AnalysisConfig::default()
        };
        let policy = config.policy();

        // built-in exclusions still apply
        assert!(policy.is_excluded(&AssetId::new("/Game/Thing")));
        assert!(policy.is_excluded(&AssetId::new("/vendor/lib")));
        assert_eq!(
            policy.classify(&AssetId::new("/Engine/Shared/Cube")),
            Classification::Included
        );
    }

    #[test]
    fn test_context_uses_mod_scope() {
        let ctx = AnalysisConfig::default().context("MyMod");
        assert_eq!(ctx.scope.prefix(), "/mymod/");
        assert_eq!(ctx.options.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = AnalysisConfig::load_or_default("/nonexistent/sweeper.json").unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }
}
