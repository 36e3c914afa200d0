use super::{default_export_module, KindLoader};
use crate::error::SandboxError;
use crate::kind::ModuleKind;
use boa_engine::{Context, JsString, JsValue, Module};
use std::path::Path;
use workerbox_vfs::VfsError;

/// Exposes a UTF-8 file verbatim as the `default` string export
#[derive(Debug, Default, Clone, Copy)]
pub struct TextLoader;

impl KindLoader for TextLoader {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Text
    }

    fn load(&self, path: &Path, bytes: Vec<u8>, context: &mut Context) -> Result<Module, SandboxError> {
        let text = String::from_utf8(bytes).map_err(|err| SandboxError::Read {
            path: path.to_path_buf(),
            source: VfsError::Io {
                path: path.display().to_string(),
                message: format!("invalid UTF-8: {err}"),
            },
        })?;
        let value = JsValue::from(JsString::from(text.as_str()));
        Ok(default_export_module(value, path, context))
    }
}
