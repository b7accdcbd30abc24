// Path-prefix inclusion/exclusion rules applied to every dependency edge

use crate::asset::{AssetId, normalize};
use serde::{Deserialize, Serialize};

/// Engine-owned and effects namespaces skipped by default.
pub const DEFAULT_EXCLUSIONS: &[&str] = &["/engine/", "/script/", "/game/", "/content/", "/niagara/"];

/// Sub-paths that stay visible even though an exclusion covers them.
pub const DEFAULT_INCLUSIONS: &[&str] = &["/content/brushify"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Include,
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRule {
    pub prefix: String,
    pub verdict: Verdict,
}

impl PathRule {
    pub fn include(prefix: &str) -> Self {
        Self {
            prefix: normalize(prefix),
            verdict: Verdict::Include,
        }
    }

    pub fn exclude(prefix: &str) -> Self {
        Self {
            prefix: normalize(prefix),
            verdict: Verdict::Exclude,
        }
    }
}

/// Outcome of classifying one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Included,
    Excluded,
    Neutral,
}

impl Classification {
    pub fn is_excluded(self) -> bool {
        self == Classification::Excluded
    }
}

/// Two ordered rule lists. Include rules are always consulted first and
/// win over any exclude rule matching the same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPolicy {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl PathPolicy {
    /// A policy with no rules at all; every path is `Neutral`. Private so
    /// that every public policy starts from the default rule sets.
    fn empty() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    /// Append a rule. Defaults are never replaced, only extended.
    pub fn with_rule(mut self, rule: PathRule) -> Self {
        self.push(rule);
        self
    }

    pub fn with_include(self, prefix: &str) -> Self {
        self.with_rule(PathRule::include(prefix))
    }

    pub fn with_exclude(self, prefix: &str) -> Self {
        self.with_rule(PathRule::exclude(prefix))
    }

    pub fn extend<I: IntoIterator<Item = PathRule>>(mut self, rules: I) -> Self {
        for rule in rules {
            self.push(rule);
        }
        self
    }

    fn push(&mut self, rule: PathRule) {
        let prefix = normalize(&rule.prefix);
        let list = match rule.verdict {
            Verdict::Include => &mut self.include,
            Verdict::Exclude => &mut self.exclude,
        };
        if !prefix.is_empty() && !list.contains(&prefix) {
            list.push(prefix);
        }
    }

    pub fn include_rules(&self) -> &[String] {
        &self.include
    }

    pub fn exclude_rules(&self) -> &[String] {
        &self.exclude
    }

    pub fn classify(&self, asset: &AssetId) -> Classification {
        if self.include.iter().any(|p| asset.has_prefix(p)) {
            return Classification::Included;
        }
        if self.exclude.iter().any(|p| asset.has_prefix(p)) {
            return Classification::Excluded;
        }
        Classification::Neutral
    }

    pub fn is_excluded(&self, asset: &AssetId) -> bool {
        self.classify(asset).is_excluded()
    }
}

impl Default for PathPolicy {
    fn default() -> Self {
        let rules = DEFAULT_INCLUSIONS
            .iter()
            .map(|p| PathRule::include(p))
            .chain(DEFAULT_EXCLUSIONS.iter().map(|p| PathRule::exclude(p)));
        Self::empty().extend(rules)
    }
}
