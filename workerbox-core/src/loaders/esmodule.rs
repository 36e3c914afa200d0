use super::KindLoader;
use crate::attribution::compile_error;
use crate::error::SandboxError;
use crate::kind::ModuleKind;
use boa_engine::{Context, Module, Source};
use std::path::Path;

/// Parses ECMAScript module source with its path attached, so nested
/// imports resolve relative to it
#[derive(Debug, Default, Clone, Copy)]
pub struct EsModuleLoader;

impl KindLoader for EsModuleLoader {
    fn kind(&self) -> ModuleKind {
        ModuleKind::ESModule
    }

    fn load(&self, path: &Path, bytes: Vec<u8>, context: &mut Context) -> Result<Module, SandboxError> {
        let source = Source::from_bytes(&bytes).with_path(path);
        Module::parse(source, None, context)
            .map_err(|err| compile_error(&err, &path.display().to_string()))
    }
}
