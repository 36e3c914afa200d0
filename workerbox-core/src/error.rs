//! Error types for sandbox builds, linking and execution
//!
//! Every failure the sandbox can produce is a [`SandboxError`]. Errors raised
//! by user code carry an [`ErrorLocation`] naming the logical path they came
//! from, so diagnostics point at the worker's own files.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use workerbox_vfs::VfsError;

/// Where in user source an error originated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorLocation {
    /// Logical path of the origin, or the string-origin label
    pub label: String,
    /// 1-based line, when the engine reported one
    pub line: Option<usize>,
    /// 1-based column, when the engine reported one
    pub column: Option<usize>,
}

impl ErrorLocation {
    /// A location with no position information
    pub fn unknown(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            line: None,
            column: None,
        }
    }

    /// A location at `line:column`
    pub fn at(label: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            label: label.into(),
            line: Some(line),
            column: Some(column),
        }
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        Ok(())
    }
}

/// Programmatic tag for a [`SandboxError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    CodeGenerationDisallowed,
    ImportFromNonFileScript,
    UnresolvableSpecifier,
    NoMatchingModuleRule,
    UnsupportedModuleKind,
    Read,
    Compile,
    Runtime,
    Wasm,
    ExportsUnavailable,
    LinkerReused,
    Engine,
}

/// Main sandbox error type
#[derive(Error, Debug, Clone)]
pub enum SandboxError {
    /// `eval`, `Function` or a sibling constructor ran under a policy that
    /// forbids compiling strings
    #[error("EvalError: Code generation from strings disallowed for this context\n    at {location}")]
    CodeGenerationDisallowed { location: ErrorLocation },

    /// An import was issued from a unit without file backing
    #[error("imports unsupported with string script (importing \"{specifier}\")")]
    ImportFromNonFileScript { specifier: String },

    #[error("cannot resolve \"{specifier}\" from {referrer}")]
    UnresolvableSpecifier { specifier: String, referrer: String },

    #[error("no matching module rules for {}", path.display())]
    NoMatchingModuleRule { path: PathBuf },

    #[error("{kind} modules are unsupported ({})", path.display())]
    UnsupportedModuleKind { kind: String, path: PathBuf },

    #[error("failed to read module: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: VfsError,
    },

    #[error("{message}\n    at {location}")]
    Compile {
        message: String,
        location: ErrorLocation,
    },

    #[error("{message}\n    at {location}")]
    Runtime {
        message: String,
        location: ErrorLocation,
    },

    #[error("failed to compile WebAssembly module {}: {message}", path.display())]
    Wasm { path: PathBuf, message: String },

    #[error("module exports are only available after a successful run()")]
    ExportsUnavailable,

    #[error("linker session is already bound to another module build")]
    LinkerReused,

    #[error("engine error: {0}")]
    Engine(String),
}

impl SandboxError {
    /// Programmatic tag of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SandboxError::CodeGenerationDisallowed { .. } => ErrorKind::CodeGenerationDisallowed,
            SandboxError::ImportFromNonFileScript { .. } => ErrorKind::ImportFromNonFileScript,
            SandboxError::UnresolvableSpecifier { .. } => ErrorKind::UnresolvableSpecifier,
            SandboxError::NoMatchingModuleRule { .. } => ErrorKind::NoMatchingModuleRule,
            SandboxError::UnsupportedModuleKind { .. } => ErrorKind::UnsupportedModuleKind,
            SandboxError::Read { .. } => ErrorKind::Read,
            SandboxError::Compile { .. } => ErrorKind::Compile,
            SandboxError::Runtime { .. } => ErrorKind::Runtime,
            SandboxError::Wasm { .. } => ErrorKind::Wasm,
            SandboxError::ExportsUnavailable => ErrorKind::ExportsUnavailable,
            SandboxError::LinkerReused => ErrorKind::LinkerReused,
            SandboxError::Engine(_) => ErrorKind::Engine,
        }
    }

    /// Source location, for errors raised by user code
    pub fn location(&self) -> Option<&ErrorLocation> {
        match self {
            SandboxError::CodeGenerationDisallowed { location }
            | SandboxError::Compile { location, .. }
            | SandboxError::Runtime { location, .. } => Some(location),
            _ => None,
        }
    }

    pub(crate) fn location_mut(&mut self) -> Option<&mut ErrorLocation> {
        match self {
            SandboxError::CodeGenerationDisallowed { location }
            | SandboxError::Compile { location, .. }
            | SandboxError::Runtime { location, .. } => Some(location),
            _ => None,
        }
    }

    /// Resolved path the error concerns, for link and load failures
    pub fn path(&self) -> Option<&Path> {
        match self {
            SandboxError::NoMatchingModuleRule { path }
            | SandboxError::UnsupportedModuleKind { path, .. }
            | SandboxError::Read { path, .. }
            | SandboxError::Wasm { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Stage that produced the error
    pub fn phase(&self) -> &'static str {
        match self {
            SandboxError::CodeGenerationDisallowed { .. } => "policy",
            SandboxError::ImportFromNonFileScript { .. }
            | SandboxError::UnresolvableSpecifier { .. }
            | SandboxError::NoMatchingModuleRule { .. }
            | SandboxError::UnsupportedModuleKind { .. }
            | SandboxError::LinkerReused => "link",
            SandboxError::Read { .. } | SandboxError::Wasm { .. } => "load",
            SandboxError::Compile { .. } => "compile",
            SandboxError::Runtime { .. } => "runtime",
            SandboxError::ExportsUnavailable | SandboxError::Engine(_) => "host",
        }
    }

    /// Structured report, suitable for printing or JSON serialisation
    ///
    /// # Example
    /// ```ignore
    /// if let Err(e) = module.run() {
    ///     let report = e.to_report();
    ///     eprintln!("{report}");
    ///     let json = serde_json::to_string(&report)?;
    /// }
    /// ```
    pub fn to_report(&self) -> ErrorReport {
        let message = match self {
            SandboxError::Compile { message, .. } | SandboxError::Runtime { message, .. } => {
                message.clone()
            }
            SandboxError::CodeGenerationDisallowed { .. } => {
                crate::CODE_GENERATION_DISALLOWED.to_string()
            }
            other => other.to_string(),
        };
        let location = self.location();
        ErrorReport {
            phase: self.phase(),
            kind: self.kind(),
            message,
            label: location
                .map(|l| l.label.clone())
                .or_else(|| self.path().map(|p| p.display().to_string())),
            line: location.and_then(|l| l.line),
            column: location.and_then(|l| l.column),
        }
    }
}

/// Structured form of a [`SandboxError`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub phase: &'static str,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {:?}: {}", self.phase, self.kind, self.message)?;
        if let Some(label) = &self.label {
            write!(f, " ({label}")?;
            if let Some(line) = self.line {
                write!(f, ":{line}")?;
                if let Some(column) = self.column {
                    write!(f, ":{column}")?;
                }
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        assert_eq!(ErrorLocation::at("/w/a.mjs", 3, 7).to_string(), "/w/a.mjs:3:7");
        assert_eq!(ErrorLocation::unknown("<anonymous>").to_string(), "<anonymous>");
        let line_only = ErrorLocation {
            label: "x.js".into(),
            line: Some(1),
            column: None,
        };
        assert_eq!(line_only.to_string(), "x.js:1");
    }

    #[test]
    fn test_unsupported_message_names_kind() {
        let err = SandboxError::UnsupportedModuleKind {
            kind: "PNG".into(),
            path: PathBuf::from("/w/img.png"),
        };
        assert!(err.to_string().starts_with("PNG modules are unsupported"));
        assert_eq!(err.kind(), ErrorKind::UnsupportedModuleKind);
        assert_eq!(err.path(), Some(Path::new("/w/img.png")));
        assert_eq!(err.phase(), "link");
    }

    #[test]
    fn test_no_matching_rule_message() {
        let err = SandboxError::NoMatchingModuleRule {
            path: PathBuf::from("/w/photo.jpg"),
        };
        assert!(err.to_string().contains("no matching module rules"));
        assert!(err.to_string().contains("/w/photo.jpg"));
    }

    #[test]
    fn test_runtime_error_to_report() {
        let err = SandboxError::Runtime {
            message: "Error: boom".into(),
            location: ErrorLocation::at("/w/index.mjs", 1, 7),
        };
        let report = err.to_report();
        assert_eq!(report.phase, "runtime");
        assert_eq!(report.kind, ErrorKind::Runtime);
        assert_eq!(report.message, "Error: boom");
        assert_eq!(report.label.as_deref(), Some("/w/index.mjs"));
        assert_eq!(report.line, Some(1));
        assert_eq!(report.column, Some(7));
        assert_eq!(
            report.to_string(),
            "[runtime] Runtime: Error: boom (/w/index.mjs:1:7)"
        );
    }

    #[test]
    fn test_code_generation_report_uses_fixed_diagnostic() {
        let err = SandboxError::CodeGenerationDisallowed {
            location: ErrorLocation::at("<anonymous>", 1, 1),
        };
        let report = err.to_report();
        assert_eq!(
            report.message,
            "Code generation from strings disallowed for this context"
        );
        assert_eq!(report.phase, "policy");
    }

    #[test]
    fn test_read_error_report_uses_path_as_label() {
        let err = SandboxError::Read {
            path: PathBuf::from("/w/missing.txt"),
            source: VfsError::NotFound {
                path: "/w/missing.txt".into(),
            },
        };
        let report = err.to_report();
        assert_eq!(report.label.as_deref(), Some("/w/missing.txt"));
        assert_eq!(report.line, None);
    }

    #[test]
    fn test_report_serializes_without_empty_fields() {
        let json = serde_json::to_value(SandboxError::ExportsUnavailable.to_report()).unwrap();
        assert_eq!(json["kind"], "ExportsUnavailable");
        assert_eq!(json["phase"], "host");
        assert!(json.get("line").is_none());
    }
}
