use super::{default_export_module, KindLoader};
use crate::error::SandboxError;
use crate::kind::ModuleKind;
use boa_engine::object::builtins::{AlignedVec, JsArrayBuffer};
use boa_engine::{Context, JsValue, Module};
use std::path::Path;

/// Exposes raw file bytes as the `default` `ArrayBuffer` export
#[derive(Debug, Default, Clone, Copy)]
pub struct DataLoader;

impl KindLoader for DataLoader {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Data
    }

    fn load(&self, path: &Path, bytes: Vec<u8>, context: &mut Context) -> Result<Module, SandboxError> {
        let buffer = JsArrayBuffer::from_byte_block(AlignedVec::from_slice(0, &bytes), context)
            .map_err(|err| SandboxError::Engine(err.to_string()))?;
        Ok(default_export_module(JsValue::from(buffer), path, context))
    }
}
