//! Workerbox Config - Pure configuration data structures
//!
//! This crate contains only data structures, no engine logic or global state.
//! It serves as the shared configuration vocabulary across all Workerbox crates.
//!
//! A project file looks like:
//!
//! ```json
//! {
//!   "entry": "worker.mjs",
//!   "modules": true,
//!   "rules": [
//!     { "type": "Text", "include": ["**/*.txt"] },
//!     { "type": "CompiledWasm", "include": ["**/*.wasm"] }
//!   ],
//!   "policy": { "allowCodeGeneration": false },
//!   "limits": { "maxRecursionDepth": 256 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Error raised while reading a project file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid project file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("project file has an empty entry path")]
    EmptyEntry,

    #[error("module rule #{index} ({kind}) has no include patterns")]
    EmptyRule { index: usize, kind: String },
}

/// Security policy applied to every execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SandboxPolicy {
    /// Whether `eval`, `new Function` and friends may compile strings
    pub allow_code_generation: bool,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            allow_code_generation: false,
        }
    }
}

/// Configuration for execution limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LimitConfig {
    /// Maximum iterations of a single loop
    pub loop_iteration_limit: u64,
    /// Maximum recursion depth
    pub max_recursion_depth: usize,
    /// Maximum stack size
    pub max_stack_size: usize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            loop_iteration_limit: u64::MAX,
            max_recursion_depth: 512,
            max_stack_size: 10 * 1024,
        }
    }
}

/// A module rule as declared in configuration
///
/// `kind` is a free-form string. Any name is legal to declare;
/// names without a loader only fail once a matching file is imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRuleConfig {
    /// Module kind tag, e.g. `ESModule`, `Text`, `PNG`
    #[serde(rename = "type")]
    pub kind: String,
    /// Glob patterns selecting files of this kind
    pub include: Vec<String>,
}

impl ModuleRuleConfig {
    /// Create a new rule declaration
    pub fn new<I, S>(kind: impl Into<String>, include: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: kind.into(),
            include: include.into_iter().map(Into::into).collect(),
        }
    }
}

/// Rules applied after user rules: `.mjs` files are ES modules,
/// `.js`/`.cjs` files are CommonJS.
pub fn default_module_rules() -> Vec<ModuleRuleConfig> {
    vec![
        ModuleRuleConfig::new("ESModule", ["**/*.mjs"]),
        ModuleRuleConfig::new("CommonJS", ["**/*.js", "**/*.cjs"]),
    ]
}

/// Project file consumed by the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    /// Entry script, relative to the project file
    pub entry: PathBuf,
    /// Build the entry as a module (true) or a plain script (false)
    #[serde(default = "default_modules")]
    pub modules: bool,
    /// User module rules, matched before the defaults
    #[serde(default)]
    pub rules: Vec<ModuleRuleConfig>,
    /// Sandbox policy
    #[serde(default)]
    pub policy: SandboxPolicy,
    /// Execution limits
    #[serde(default)]
    pub limits: LimitConfig,
}

fn default_modules() -> bool {
    true
}

impl WorkerConfig {
    /// Parse and validate a project file
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: WorkerConfig = serde_json::from_str(text)?;
        if config.entry.as_os_str().is_empty() {
            return Err(ConfigError::EmptyEntry);
        }
        for (index, rule) in config.rules.iter().enumerate() {
            if rule.include.is_empty() {
                return Err(ConfigError::EmptyRule {
                    index,
                    kind: rule.kind.clone(),
                });
            }
        }
        Ok(config)
    }

    /// User rules followed by [`default_module_rules`]
    pub fn effective_rules(&self) -> Vec<ModuleRuleConfig> {
        let mut rules = self.rules.clone();
        rules.extend(default_module_rules());
        rules
    }
}
