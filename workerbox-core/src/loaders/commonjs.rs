use super::KindLoader;
use crate::attribution::compile_error;
use crate::error::{ErrorLocation, SandboxError};
use crate::kind::ModuleKind;
use boa_engine::module::{SyntheticModule, SyntheticModuleInitializer};
use boa_engine::object::JsObject;
use boa_engine::{js_string, Context, JsNativeError, JsResult, JsValue, Module, Script, Source};
use std::path::Path;

// The body starts on the wrapper's first line so line numbers are unchanged;
// columns on that line are shifted by the head
const WRAPPER_HEAD: &str = "(function (exports, module) {";
const WRAPPER_TAIL: &str = "\n})";

/// Wraps CommonJS source in a function of `(exports, module)`
///
/// The wrapper is compiled at load time and called when the module record
/// is evaluated; the final `module.exports` becomes the `default` export.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommonJsLoader;

impl KindLoader for CommonJsLoader {
    fn kind(&self) -> ModuleKind {
        ModuleKind::CommonJS
    }

    fn load(&self, path: &Path, bytes: Vec<u8>, context: &mut Context) -> Result<Module, SandboxError> {
        let label = path.display().to_string();
        let mut wrapped = Vec::with_capacity(WRAPPER_HEAD.len() + bytes.len() + WRAPPER_TAIL.len());
        wrapped.extend_from_slice(WRAPPER_HEAD.as_bytes());
        wrapped.extend_from_slice(&bytes);
        wrapped.extend_from_slice(WRAPPER_TAIL.as_bytes());

        let wrapper = Script::parse(Source::from_bytes(&wrapped).with_path(path), None, context)
            .and_then(|script| script.evaluate(context))
            .map_err(|err| {
                let mut err = compile_error(&err, &label);
                if let Some(location) = err.location_mut() {
                    unwrap_location(location);
                }
                err
            })?;

        Ok(Module::synthetic(
            &[js_string!("default")],
            SyntheticModuleInitializer::from_copy_closure_with_captures(
                |module: &SyntheticModule, wrapper: &JsValue, context: &mut Context| {
                    let exports = call_wrapper(wrapper, context)?;
                    module.set_export(&js_string!("default"), exports)
                },
                wrapper,
            ),
            Some(path.to_path_buf()),
            None,
            context,
        ))
    }
}

/// Map a location inside the wrapped source back to the original file
pub(crate) fn unwrap_location(location: &mut ErrorLocation) {
    if location.line != Some(1) {
        return;
    }
    if let Some(column) = location.column.as_mut() {
        *column = column.saturating_sub(WRAPPER_HEAD.len()).max(1);
    }
}

fn call_wrapper(wrapper: &JsValue, context: &mut Context) -> JsResult<JsValue> {
    let Some(function) = wrapper.as_callable() else {
        return Err(JsNativeError::typ()
            .with_message("CommonJS wrapper did not evaluate to a function")
            .into());
    };
    let exports = JsObject::with_object_proto(context.intrinsics());
    let module = JsObject::with_object_proto(context.intrinsics());
    module.set(js_string!("exports"), exports.clone(), true, context)?;
    function.call(
        &JsValue::undefined(),
        &[exports.into(), module.clone().into()],
        context,
    )?;
    module.get(js_string!("exports"), context)
}
