//! Workerbox Core - sandboxed script compiler and module linker
//!
//! Builds untrusted worker code inside an isolated `boa_engine` context and
//! links its imports into a single module graph:
//!
//! - [`Blueprint`]: source text plus logical path, built into a [`Script`]
//!   or a [`Module`] with code generation from strings disabled
//! - [`ModuleRules`]: ordered glob rules classifying files into [`ModuleKind`]s
//! - [`loaders`]: one strategy per module kind
//! - [`Linker`]: per-build session resolving imports, caching module records
//!   and recording every path it touched
//!
//! Configuration is passed explicitly via parameters, not via global state.
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use workerbox_core::{build_linker, Blueprint, Globals, LogicalPath, ModuleRules};
//! use workerbox_config::ModuleRuleConfig;
//! use workerbox_vfs::MemoryFileSystem;
//!
//! let fs = MemoryFileSystem::with_files([("/w/text.txt", b"hi\n".to_vec())]);
//! let rules = ModuleRules::compile(&[ModuleRuleConfig::new("Text", ["**/*.txt"])])?;
//! let (linker, referenced) = build_linker(&rules, Arc::new(fs));
//!
//! let blueprint = Blueprint::new(
//!     r#"import v from "./text.txt"; export default v;"#,
//!     LogicalPath::file("/w/index.mjs"),
//! );
//! let mut module = blueprint.build_module(&Globals::new(), &linker)?;
//! module.run()?;
//! assert_eq!(module.export_string("default")?.as_deref(), Some("hi\n"));
//! assert!(referenced.contains("/w/text.txt"));
//! ```

mod attribution;
pub mod blueprint;
pub mod error;
pub mod globals;
pub mod kind;
pub mod linker;
pub mod loaders;
pub mod rules;
pub mod sandbox;
pub mod single_flight;

pub use attribution::{CODE_GENERATION_DISALLOWED, STRING_SCRIPT_LABEL};
pub use blueprint::{Blueprint, Exports, LogicalPath, Module, Script};
pub use error::{ErrorKind, ErrorLocation, ErrorReport, SandboxError};
pub use globals::Globals;
pub use kind::ModuleKind;
pub use linker::{build_linker, resolve_specifier, Linker, ReferencedPaths};
pub use loaders::CompiledWasmModule;
pub use rules::{ModuleRules, ProcessedModuleRule, RuleError};
pub use sandbox::SandboxOptions;
pub use single_flight::SingleFlight;

// Re-export config types from workerbox-config
pub use workerbox_config::{LimitConfig, ModuleRuleConfig, SandboxPolicy};

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, SandboxError>;
