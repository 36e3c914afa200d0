//! Module kinds

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// How the bytes of a resolved file become a module record
///
/// Parsing a declared kind never fails. An unknown name becomes
/// [`ModuleKind::Unsupported`] and only errors once a file of that kind is
/// actually imported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// ECMAScript module source
    ESModule,
    /// CommonJS source exposing `module.exports` as the default export
    CommonJS,
    /// UTF-8 text exposed as a string default export
    Text,
    /// Raw bytes exposed as an `ArrayBuffer` default export
    Data,
    /// WebAssembly binary compiled (not instantiated) into a module object
    CompiledWasm,
    /// Declared kind with no loader
    Unsupported(String),
}

impl ModuleKind {
    /// Kind from its declared name
    pub fn parse(name: &str) -> Self {
        match name {
            "ESModule" => ModuleKind::ESModule,
            "CommonJS" => ModuleKind::CommonJS,
            "Text" => ModuleKind::Text,
            "Data" => ModuleKind::Data,
            "CompiledWasm" => ModuleKind::CompiledWasm,
            other => ModuleKind::Unsupported(other.to_string()),
        }
    }

    /// Declared name of this kind
    pub fn name(&self) -> &str {
        match self {
            ModuleKind::ESModule => "ESModule",
            ModuleKind::CommonJS => "CommonJS",
            ModuleKind::Text => "Text",
            ModuleKind::Data => "Data",
            ModuleKind::CompiledWasm => "CompiledWasm",
            ModuleKind::Unsupported(name) => name,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, ModuleKind::Unsupported(_))
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModuleKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ModuleKind::parse(s))
    }
}

impl From<&str> for ModuleKind {
    fn from(name: &str) -> Self {
        ModuleKind::parse(name)
    }
}
