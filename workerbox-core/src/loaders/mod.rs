//! Kind loaders
//!
//! One strategy per [`ModuleKind`]: each turns the bytes of a resolved file
//! into a module record inside the build's context. Source kinds produce
//! module records whose nested imports flow back through the linker; value
//! kinds produce synthetic records with a single `default` export.

pub(crate) mod commonjs;
mod data;
mod esmodule;
mod text;
mod wasm;

pub use commonjs::CommonJsLoader;
pub use data::DataLoader;
pub use esmodule::EsModuleLoader;
pub use text::TextLoader;
pub use wasm::{CompiledWasmLoader, CompiledWasmModule};

use crate::error::SandboxError;
use crate::kind::ModuleKind;
use boa_engine::module::{SyntheticModule, SyntheticModuleInitializer};
use boa_engine::{js_string, Context, JsValue, Module};
use std::path::Path;

/// Strategy turning file bytes into a module record
pub trait KindLoader {
    /// Kind this loader handles
    fn kind(&self) -> ModuleKind;

    /// Build the module record for `path` from its bytes
    fn load(&self, path: &Path, bytes: Vec<u8>, context: &mut Context)
        -> Result<Module, SandboxError>;
}

/// Result of looking a kind up in a [`LoaderRegistry`]
pub enum LoaderLookup<'a> {
    Loader(&'a dyn KindLoader),
    Unsupported(&'a str),
}

/// The loaders available to one linker session
#[derive(Default)]
pub struct LoaderRegistry {
    esmodule: EsModuleLoader,
    commonjs: CommonJsLoader,
    text: TextLoader,
    data: DataLoader,
    wasm: CompiledWasmLoader,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader for `kind`; total over every kind
    pub fn loader_for<'a>(&'a self, kind: &'a ModuleKind) -> LoaderLookup<'a> {
        match kind {
            ModuleKind::ESModule => LoaderLookup::Loader(&self.esmodule),
            ModuleKind::CommonJS => LoaderLookup::Loader(&self.commonjs),
            ModuleKind::Text => LoaderLookup::Loader(&self.text),
            ModuleKind::Data => LoaderLookup::Loader(&self.data),
            ModuleKind::CompiledWasm => LoaderLookup::Loader(&self.wasm),
            ModuleKind::Unsupported(name) => LoaderLookup::Unsupported(name),
        }
    }
}

/// Synthetic module record whose only export is `default = value`
pub(crate) fn default_export_module(value: JsValue, path: &Path, context: &mut Context) -> Module {
    Module::synthetic(
        &[js_string!("default")],
        SyntheticModuleInitializer::from_copy_closure_with_captures(
            |module: &SyntheticModule, value: &JsValue, _context: &mut Context| {
                module.set_export(&js_string!("default"), value.clone())
            },
            value,
        ),
        Some(path.to_path_buf()),
        None,
        context,
    )
}
