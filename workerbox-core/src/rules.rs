//! Module rule matcher
//!
//! Ordered rules map resolved paths to module kinds. Each include glob is
//! compiled once; classification afterwards is a pure scan.

use crate::kind::ModuleKind;
use globset::GlobBuilder;
use regex::bytes::Regex;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use workerbox_config::ModuleRuleConfig;

/// Error raised while compiling module rules
#[derive(Debug, Clone, Error)]
pub enum RuleError {
    #[error("invalid glob '{pattern}' in {kind} rule: {message}")]
    InvalidGlob {
        kind: String,
        pattern: String,
        message: String,
    },
}

/// A module rule with its include globs compiled into matchers
#[derive(Debug, Clone)]
pub struct ProcessedModuleRule {
    kind: ModuleKind,
    patterns: Vec<String>,
    matchers: Vec<Regex>,
}

impl ProcessedModuleRule {
    /// Compile a declared rule
    pub fn compile(rule: &ModuleRuleConfig) -> Result<Self, RuleError> {
        let matchers = rule
            .include
            .iter()
            .map(|pattern| compile_contains(pattern, &rule.kind))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            kind: ModuleKind::parse(&rule.kind),
            patterns: rule.include.clone(),
            matchers,
        })
    }

    pub fn kind(&self) -> &ModuleKind {
        &self.kind
    }

    /// Include globs as declared
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether any include glob matches `path`
    pub fn matches(&self, path: &Path) -> bool {
        let subject = match_subject(path);
        self.matchers
            .iter()
            .any(|matcher| matcher.is_match(subject.as_bytes()))
    }
}

/// Compile a glob with suffix semantics: the pattern matches the whole
/// path or any tail of it that starts at a component boundary.
fn compile_contains(pattern: &str, kind: &str) -> Result<Regex, RuleError> {
    let invalid = |message: String| RuleError::InvalidGlob {
        kind: kind.to_string(),
        pattern: pattern.to_string(),
        message,
    };
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| invalid(e.to_string()))?;
    // globset emits "(?-u)^...$"; the start anchor is widened to any separator
    let anchored = glob.regex();
    let suffix = anchored
        .strip_prefix("(?-u)^")
        .and_then(|body| body.strip_suffix('$'))
        .map(|body| format!("(?-u)(?:^|/)(?:{body})$"))
        .unwrap_or_else(|| anchored.to_string());
    Regex::new(&suffix).map_err(|e| invalid(e.to_string()))
}

fn match_subject(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Ordered, compiled module rules
///
/// Cheap to clone; one compiled set can back many linker sessions.
#[derive(Debug, Clone, Default)]
pub struct ModuleRules {
    rules: Arc<[ProcessedModuleRule]>,
}

impl ModuleRules {
    /// Compile declared rules, keeping their order
    pub fn compile(rules: &[ModuleRuleConfig]) -> Result<Self, RuleError> {
        let rules = rules
            .iter()
            .map(ProcessedModuleRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            rules: rules.into(),
        })
    }

    /// Kind of the first rule with a matching include glob
    pub fn classify(&self, path: &Path) -> Option<&ModuleKind> {
        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .map(ProcessedModuleRule::kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessedModuleRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
